use std::{any::Any, time::Duration};

use futures::Future;

#[cfg(feature = "tokio")]
pub mod tokio;

/// The executor a [`Dialer`](crate::Dialer) spawns connection service loops
/// onto, and the timer those loops use for heartbeats.
pub trait RuntimeHandle: Clone + Send + Sync + 'static {
    type JoinErr: JoinError + std::error::Error + Send;
    type JoinFuture<O: Send + 'static>: Future<Output = Result<O, Self::JoinErr>> + Unpin + Send;
    type Sleep: Future<Output = ()> + Send + 'static;

    fn spawn<O, F>(&self, f: F) -> Self::JoinFuture<O>
    where
        O: Send + 'static,
        F: Future<Output = O> + Send + 'static;

    fn sleep(&self, duration: Duration) -> Self::Sleep;
}

pub trait JoinError {
    fn is_panic(&self) -> bool;
    fn into_panic(self) -> Box<dyn Any + Send + 'static>;
}
