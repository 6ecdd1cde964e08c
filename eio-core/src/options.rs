use std::{fmt, str::FromStr, time::Duration};

/// A wire transport built into the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportType {
    /// HTTP long-polling
    Polling,
    /// A persistent websocket
    Websocket,
}

impl TransportType {
    pub fn name(&self) -> &'static str {
        match self {
            TransportType::Polling => "polling",
            TransportType::Websocket => "websocket",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport {0:?}")]
pub struct UnknownTransport(pub String);

impl FromStr for TransportType {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "polling" => Ok(TransportType::Polling),
            "websocket" => Ok(TransportType::Websocket),
            other => Err(UnknownTransport(other.to_string())),
        }
    }
}

/// Static configuration for dialing.
///
/// `transports` is in ascending order of preference: the last entry is
/// tried first. `ping_interval` and `ping_timeout` are only used when a
/// server hands out zero durations in its handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
    pub transports: Vec<TransportType>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(60),
            transports: vec![TransportType::Polling, TransportType::Websocket],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_prefer_websocket() {
        let options = Options::default();
        assert_eq!(options.transports.last(), Some(&TransportType::Websocket));
        assert_eq!(options.ping_timeout, Duration::from_secs(60));
    }

    #[test]
    fn parse_transport_names() {
        assert_eq!("polling".parse::<TransportType>().unwrap(), TransportType::Polling);
        assert_eq!(
            "websocket".parse::<TransportType>().unwrap(),
            TransportType::Websocket
        );
        assert_eq!(
            "carrier-pigeon".parse::<TransportType>(),
            Err(UnknownTransport("carrier-pigeon".to_string()))
        );
    }
}
