//! Scripted transports for exercising the dialer without a network.
//!
//! A [`ScriptedTransport`] plays back a [`Script`] every time it is dialed
//! and reports everything that happens to its connections to a shared
//! [`Recorder`], so tests can assert on the order of dials, closes and
//! frame reader releases across several transports.
use std::{
    collections::VecDeque,
    io::{Cursor, Read},
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use eio::{BoxError, Conn, Frame, FrameReader, Opener, Transport};
use eio_core::{ConnParameters, FrameType, PacketType};
use futures::{
    FutureExt,
    future::{self, BoxFuture},
};
use http::HeaderMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Dialed { transport: String, url: Url },
    ConnClosed { transport: String },
    ReaderClosed { transport: String, packet_type: PacketType },
    Sent {
        transport: String,
        packet_type: PacketType,
        payload: Bytes,
    },
}

/// A shared log of [`Event`]s
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: Event) {
        tracing::trace!(?event, "recording");
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// The names of the transports dialed, in the order they were dialed
    pub fn dialed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Dialed { transport, .. } => Some(transport),
                _ => None,
            })
            .collect()
    }

    pub fn dialed_urls(&self) -> Vec<Url> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Dialed { url, .. } => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn closes(&self, transport: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::ConnClosed { transport: t } if t == transport))
            .count()
    }

    pub fn reader_closes(&self, transport: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::ReaderClosed { transport: t, .. } if t == transport))
            .count()
    }

    pub fn sent(&self, transport: &str) -> Vec<(PacketType, Bytes)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Sent {
                    transport: t,
                    packet_type,
                    payload,
                } if t == transport => Some((packet_type, payload)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedFrame {
    pub frame_type: FrameType,
    pub packet_type: PacketType,
    pub payload: Bytes,
}

impl ScriptedFrame {
    pub fn text<B: Into<Bytes>>(packet_type: PacketType, payload: B) -> Self {
        Self {
            frame_type: FrameType::Text,
            packet_type,
            payload: payload.into(),
        }
    }
}

/// What a [`ScriptedTransport`] does each time it is dialed
#[derive(Debug, Clone)]
pub enum Script {
    /// The network level connect fails
    FailDial(String),
    /// Connects and then delivers these frames in order. Once they run out
    /// reads wait forever.
    Frames(Vec<ScriptedFrame>),
    /// Connects and opens itself with these parameters
    SelfOpen(ConnParameters),
    /// Connects, but opening it fails
    SelfOpenFails(String),
    /// Connects, but every read fails
    ReadFails(String),
}

impl Script {
    /// Connects and sends a well formed OPEN frame
    pub fn handshake(params: &ConnParameters) -> Self {
        Script::Frames(vec![open_frame(params)])
    }
}

pub fn params(sid: &str, ping_interval: Duration, ping_timeout: Duration) -> ConnParameters {
    ConnParameters {
        sid: sid.to_string(),
        upgrades: Vec::new(),
        ping_interval,
        ping_timeout,
    }
}

pub fn open_frame(params: &ConnParameters) -> ScriptedFrame {
    let payload = params.encode().expect("encoding parameters");
    ScriptedFrame::text(PacketType::Open, payload)
}

pub struct ScriptedTransport {
    name: String,
    script: Script,
    recorder: Recorder,
    fail_close: bool,
}

impl ScriptedTransport {
    pub fn new<S: Into<String>>(name: S, script: Script, recorder: &Recorder) -> Self {
        Self {
            name: name.into(),
            script,
            recorder: recorder.clone(),
            fail_close: false,
        }
    }

    /// Make closing a connection, and closing any frame reader it hands
    /// out, fail. The close is still recorded.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Transport for ScriptedTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn dial(&self, url: &Url, _headers: &HeaderMap) -> BoxFuture<'static, Result<Box<dyn Conn>, BoxError>> {
        self.recorder.record(Event::Dialed {
            transport: self.name.clone(),
            url: url.clone(),
        });
        let result: Result<Box<dyn Conn>, BoxError> = match &self.script {
            Script::FailDial(reason) => Err(reason.clone().into()),
            script => Ok(Box::new(ScriptedConn {
                name: self.name.clone(),
                script: script.clone(),
                frames: Mutex::new(match script {
                    Script::Frames(frames) => frames.iter().cloned().collect(),
                    _ => VecDeque::new(),
                }),
                recorder: self.recorder.clone(),
                fail_close: self.fail_close,
            }) as Box<dyn Conn>),
        };
        future::ready(result).boxed()
    }
}

struct ScriptedConn {
    name: String,
    script: Script,
    frames: Mutex<VecDeque<ScriptedFrame>>,
    recorder: Recorder,
    fail_close: bool,
}

impl Conn for ScriptedConn {
    fn next_reader(&self) -> BoxFuture<'_, Result<Frame, BoxError>> {
        if let Script::ReadFails(reason) = &self.script {
            let err: BoxError = reason.clone().into();
            return future::ready(Err(err)).boxed();
        }
        let next = self.frames.lock().unwrap().pop_front();
        match next {
            Some(frame) => {
                let reader = RecordingReader {
                    inner: Cursor::new(frame.payload),
                    transport: self.name.clone(),
                    packet_type: frame.packet_type,
                    recorder: self.recorder.clone(),
                    fail_close: self.fail_close,
                };
                future::ready(Ok(Frame::new(
                    frame.frame_type,
                    frame.packet_type,
                    Box::new(reader),
                )))
                .boxed()
            }
            None => future::pending().boxed(),
        }
    }

    fn send(
        &self,
        _frame_type: FrameType,
        packet_type: PacketType,
        payload: Bytes,
    ) -> BoxFuture<'_, Result<(), BoxError>> {
        self.recorder.record(Event::Sent {
            transport: self.name.clone(),
            packet_type,
            payload,
        });
        future::ready(Ok(())).boxed()
    }

    fn close(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        self.recorder.record(Event::ConnClosed {
            transport: self.name.clone(),
        });
        let result: Result<(), BoxError> = if self.fail_close {
            Err(format!("{} close failed", self.name).into())
        } else {
            Ok(())
        };
        future::ready(result).boxed()
    }

    fn opener(&self) -> Option<&dyn Opener> {
        match self.script {
            Script::SelfOpen(_) | Script::SelfOpenFails(_) => Some(self),
            _ => None,
        }
    }
}

impl Opener for ScriptedConn {
    fn open(&self) -> BoxFuture<'_, Result<ConnParameters, BoxError>> {
        let result = match &self.script {
            Script::SelfOpen(params) => Ok(params.clone()),
            Script::SelfOpenFails(reason) => Err(reason.clone().into()),
            _ => Err("not a self opening connection".into()),
        };
        future::ready(result).boxed()
    }
}

struct RecordingReader {
    inner: Cursor<Bytes>,
    transport: String,
    packet_type: PacketType,
    recorder: Recorder,
    fail_close: bool,
}

impl Read for RecordingReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl FrameReader for RecordingReader {
    fn close(&mut self) -> Result<(), BoxError> {
        self.recorder.record(Event::ReaderClosed {
            transport: self.transport.clone(),
            packet_type: self.packet_type,
        });
        if self.fail_close {
            return Err(format!("{} reader close failed", self.transport).into());
        }
        Ok(())
    }
}
