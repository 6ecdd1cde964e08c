/// Why a connection's service loop stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnFinishedReason {
    /// [`ClientConnection::close`](crate::ClientConnection::close) was called
    WeDisconnected,
    /// The server sent a CLOSE packet or the transport ended cleanly
    TheyDisconnected,
    /// No PONG arrived within the ping timeout
    Timeout,
    /// There was some error on the transport when receiving data
    ErrorReceiving(String),
    /// There was some error on the transport when sending data
    ErrorSending(String),
    /// The service loop was cancelled by the runtime before it finished
    Aborted,
}

impl std::fmt::Display for ConnFinishedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnFinishedReason::WeDisconnected => write!(f, "We are disconnecting"),
            ConnFinishedReason::TheyDisconnected => write!(f, "They disconnected gracefully"),
            ConnFinishedReason::Timeout => write!(f, "Ping timeout"),
            ConnFinishedReason::ErrorReceiving(msg) => write!(f, "Error receiving: {msg}"),
            ConnFinishedReason::ErrorSending(msg) => write!(f, "Error sending: {msg}"),
            ConnFinishedReason::Aborted => write!(f, "Service loop aborted"),
        }
    }
}
