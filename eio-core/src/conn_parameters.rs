use std::{io::Read, time::Duration};

use serde::{Deserialize, Serialize};

/// Session parameters issued by the server in the OPEN packet.
///
/// On the wire these are a JSON object:
///
/// ```json
/// {"sid":"xyz","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":60000}
/// ```
///
/// Intervals are integer milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnParameters {
    pub sid: String,
    pub upgrades: Vec<String>,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireParameters {
    sid: String,
    #[serde(default)]
    upgrades: Vec<String>,
    ping_interval: u64,
    ping_timeout: u64,
}

impl ConnParameters {
    /// Decode parameters from a reader positioned at an OPEN packet's payload
    pub fn decode<R: Read>(reader: R) -> Result<Self, serde_json::Error> {
        let wire: WireParameters = serde_json::from_reader(reader)?;
        Ok(ConnParameters {
            sid: wire.sid,
            upgrades: wire.upgrades,
            ping_interval: Duration::from_millis(wire.ping_interval),
            ping_timeout: Duration::from_millis(wire.ping_timeout),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&WireParameters {
            sid: self.sid.clone(),
            upgrades: self.upgrades.clone(),
            ping_interval: self.ping_interval.as_millis() as u64,
            ping_timeout: self.ping_timeout.as_millis() as u64,
        })
    }
}
