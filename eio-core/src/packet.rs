use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;

/// The kind of an Engine.IO packet.
///
/// On the wire a packet type is a single digit when the packet is text
/// encoded and a single byte when the packet is binary encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Open = 0,
    Close = 1,
    Ping = 2,
    Pong = 3,
    Message = 4,
    Upgrade = 5,
    Noop = 6,
}

impl PacketType {
    pub fn from_byte(b: u8) -> Result<Self, PacketError> {
        match b {
            0 => Ok(PacketType::Open),
            1 => Ok(PacketType::Close),
            2 => Ok(PacketType::Ping),
            3 => Ok(PacketType::Pong),
            4 => Ok(PacketType::Message),
            5 => Ok(PacketType::Upgrade),
            6 => Ok(PacketType::Noop),
            other => Err(PacketError::UnknownPacketType(other)),
        }
    }

    pub fn from_char(c: char) -> Result<Self, PacketError> {
        match c.to_digit(10) {
            Some(d) => Self::from_byte(d as u8),
            None => Err(PacketError::InvalidTypeChar(c)),
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    pub fn as_char(self) -> char {
        char::from(b'0' + self as u8)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketType::Open => "OPEN",
            PacketType::Close => "CLOSE",
            PacketType::Ping => "PING",
            PacketType::Pong => "PONG",
            PacketType::Message => "MESSAGE",
            PacketType::Upgrade => "UPGRADE",
            PacketType::Noop => "NOOP",
        };
        f.write_str(name)
    }
}

/// Whether a frame carries UTF-8 text or raw bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    Text,
    Binary,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown packet type {0:#04x}")]
    UnknownPacketType(u8),
    #[error("packet type {0:?} is not a digit")]
    InvalidTypeChar(char),
    #[error("text packet payload is not valid utf-8")]
    InvalidUtf8,
    #[error("invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

/// A single decoded Engine.IO packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub frame_type: FrameType,
    pub packet_type: PacketType,
    pub data: Bytes,
}

impl Packet {
    pub fn new(frame_type: FrameType, packet_type: PacketType, data: impl Into<Bytes>) -> Self {
        Packet {
            frame_type,
            packet_type,
            data: data.into(),
        }
    }

    pub fn text(packet_type: PacketType, data: impl Into<String>) -> Self {
        Self::new(FrameType::Text, packet_type, data.into())
    }

    /// Decode a text encoded packet.
    ///
    /// A leading `b` marks a base64 encoded binary packet, which is how
    /// binary data travels over text-only transports.
    pub fn decode_text(s: &str) -> Result<Packet, PacketError> {
        let mut chars = s.chars();
        match chars.next() {
            None => Err(PacketError::Empty),
            Some('b') => {
                let type_char = chars.next().ok_or(PacketError::Empty)?;
                let packet_type = PacketType::from_char(type_char)?;
                let data = STANDARD.decode(chars.as_str())?;
                Ok(Packet::new(FrameType::Binary, packet_type, data))
            }
            Some(c) => {
                let packet_type = PacketType::from_char(c)?;
                Ok(Packet::new(
                    FrameType::Text,
                    packet_type,
                    Bytes::copy_from_slice(chars.as_str().as_bytes()),
                ))
            }
        }
    }

    /// Decode a binary encoded packet, where the first byte is the raw
    /// packet type.
    pub fn decode_binary(b: &[u8]) -> Result<Packet, PacketError> {
        let (first, rest) = b.split_first().ok_or(PacketError::Empty)?;
        let packet_type = PacketType::from_byte(*first)?;
        Ok(Packet::new(
            FrameType::Binary,
            packet_type,
            Bytes::copy_from_slice(rest),
        ))
    }

    /// Text encoding of this packet. Binary packets are base64 encoded.
    pub fn encode_text(&self) -> Result<String, PacketError> {
        match self.frame_type {
            FrameType::Text => {
                let body = std::str::from_utf8(&self.data).map_err(|_| PacketError::InvalidUtf8)?;
                let mut out = String::with_capacity(body.len() + 1);
                out.push(self.packet_type.as_char());
                out.push_str(body);
                Ok(out)
            }
            FrameType::Binary => {
                let mut out = String::from("b");
                out.push(self.packet_type.as_char());
                STANDARD.encode_string(&self.data, &mut out);
                Ok(out)
            }
        }
    }

    pub fn encode_binary(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 1);
        out.push(self.packet_type.as_byte());
        out.extend_from_slice(&self.data);
        out
    }
}
