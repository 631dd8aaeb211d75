//! pkt-line framing
//!
//! Each line is prefixed by its length as four hex digits, the prefix included.
//! `0000` is a flush packet and `0001` a delimiter packet.

use crate::transport::TransportError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Longest pkt-line git sends, prefix included
pub const MAX_PKT_LEN: usize = 65520;

pub const FLUSH_PKT: &[u8; 4] = b"0000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    Data(Bytes),
    Flush,
    Delimiter,
}

impl PktLine {
    /// Payload as text with the trailing newline removed
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PktLine::Data(data) => std::str::from_utf8(data)
                .ok()
                .map(|text| text.strip_suffix('\n').unwrap_or(text)),
            _ => None,
        }
    }
}

/// Take the next pkt-line off the front of `buffer`, `None` once it is empty
pub fn read_pkt_line(buffer: &mut Bytes) -> Result<Option<PktLine>, TransportError> {
    if buffer.is_empty() {
        return Ok(None);
    }
    if buffer.len() < 4 {
        return Err(TransportError::Protocol(format!(
            "truncated pkt-line length {:?}",
            String::from_utf8_lossy(buffer)
        )));
    }

    let prefix = buffer.copy_to_bytes(4);
    let length = std::str::from_utf8(&prefix)
        .ok()
        .filter(|digits| digits.chars().all(|c| c.is_ascii_hexdigit()))
        .and_then(|digits| usize::from_str_radix(digits, 16).ok())
        .ok_or_else(|| {
            TransportError::Protocol(format!(
                "invalid pkt-line length {:?}",
                String::from_utf8_lossy(&prefix)
            ))
        })?;

    match length {
        0 => Ok(Some(PktLine::Flush)),
        1 => Ok(Some(PktLine::Delimiter)),
        2 | 3 => Err(TransportError::Protocol(format!(
            "invalid pkt-line length {length}"
        ))),
        _ if length > MAX_PKT_LEN => Err(TransportError::Protocol(format!(
            "pkt-line length {length} exceeds {MAX_PKT_LEN}"
        ))),
        _ if length - 4 > buffer.len() => Err(TransportError::Protocol(format!(
            "pkt-line of length {length} truncated to {} bytes",
            buffer.len() + 4
        ))),
        _ => Ok(Some(PktLine::Data(buffer.copy_to_bytes(length - 4)))),
    }
}

pub fn write_pkt_line(buffer: &mut BytesMut, data: &[u8]) {
    buffer.put(format!("{:04x}", data.len() + 4).as_bytes());
    buffer.put(data);
}

pub fn write_pkt_text(buffer: &mut BytesMut, text: &str) {
    write_pkt_line(buffer, text.as_bytes());
}

pub fn write_flush(buffer: &mut BytesMut) {
    buffer.put(&FLUSH_PKT[..]);
}
