// src/core/protocol/line_codec.rs

//! Implements newline-delimited framing for the chat protocol as a
//! `tokio_util::codec` `Encoder`/`Decoder` pair.

use crate::core::TransportFault;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The line terminator written after every outbound line.
const CRLF: &[u8] = b"\r\n";

/// Protocol-level limit on a single inbound or outbound line.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Splits a byte stream into protocol lines.
///
/// Lines end at `\n`; a trailing `\r` is stripped and blank lines are skipped.
/// Invalid UTF-8 is replaced rather than rejected, since a single odd byte
/// from the server should not cost us the connection.
#[derive(Debug, Default)]
pub struct LineCodec {
    /// How far into the buffer we have already searched for a newline.
    next_index: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn finish_line(raw: &[u8]) -> Result<Option<String>, TransportFault> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        if raw.len() > MAX_LINE_LENGTH {
            return Err(TransportFault::Framing(format!(
                "line of {} bytes exceeds the {MAX_LINE_LENGTH} byte limit",
                raw.len()
            )));
        }
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(raw).into_owned()))
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = TransportFault;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');
            let Some(offset) = newline else {
                if src.len() > MAX_LINE_LENGTH + CRLF.len() {
                    return Err(TransportFault::Framing(format!(
                        "no line terminator within {MAX_LINE_LENGTH} bytes"
                    )));
                }
                self.next_index = src.len();
                return Ok(None);
            };

            let newline_index = self.next_index + offset;
            self.next_index = 0;
            let frame = src.split_to(newline_index + 1);
            if let Some(line) = Self::finish_line(&frame[..newline_index])? {
                return Ok(Some(line));
            }
            // Blank line; keep scanning what is left in the buffer.
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        Self::finish_line(&rest)
    }
}

impl Encoder<String> for LineCodec {
    type Error = TransportFault;

    /// Writes `line` followed by CRLF. Lines containing their own terminator
    /// characters are refused, they would split into two protocol lines.
    fn encode(&mut self, line: String, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if line.contains(['\r', '\n']) {
            return Err(TransportFault::Framing(
                "outbound line contains a line terminator".to_string(),
            ));
        }
        if line.len() > MAX_LINE_LENGTH {
            return Err(TransportFault::Framing(format!(
                "outbound line of {} bytes exceeds the {MAX_LINE_LENGTH} byte limit",
                line.len()
            )));
        }
        dst.reserve(line.len() + CRLF.len());
        dst.put_slice(line.as_bytes());
        dst.put_slice(CRLF);
        Ok(())
    }
}
