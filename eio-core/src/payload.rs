//! Text payload framing used by the polling transport.
//!
//! A payload is a sequence of `<length>:<packet>` records where `<length>`
//! is the length of the text encoded packet in UTF-16 code units. This
//! matches what JavaScript servers compute with `String.prototype.length`.

use crate::packet::{Packet, PacketError};

pub fn encode_payload(packets: &[Packet]) -> Result<String, PacketError> {
    let mut out = String::new();
    for packet in packets {
        let encoded = packet.encode_text()?;
        let len = encoded.encode_utf16().count();
        out.push_str(&len.to_string());
        out.push(':');
        out.push_str(&encoded);
    }
    Ok(out)
}

pub fn decode_payload(payload: &str) -> Result<Vec<Packet>, PacketError> {
    let mut packets = Vec::new();
    let mut rest = payload;
    while !rest.is_empty() {
        let Some(colon) = rest.find(':') else {
            return Err(PacketError::MalformedPayload(
                "missing length separator".to_string(),
            ));
        };
        let len: usize = rest[..colon]
            .parse()
            .map_err(|_| PacketError::MalformedPayload(format!("bad length {:?}", &rest[..colon])))?;
        let body = &rest[colon + 1..];

        let mut units = 0;
        let mut end = None;
        for (idx, c) in body.char_indices() {
            if units == len {
                end = Some(idx);
                break;
            }
            units += c.len_utf16();
        }
        let end = match end {
            Some(end) => end,
            None if units == len => body.len(),
            None => {
                return Err(PacketError::MalformedPayload(format!(
                    "record claims {len} units but only {units} remain"
                )));
            }
        };

        packets.push(Packet::decode_text(&body[..end])?);
        rest = &body[end..];
    }
    Ok(packets)
}
