//! Incremental framing of self-delimiting JSON values over a byte stream.
//!
//! Reads from a socket can split a frame anywhere, including inside a
//! multi-byte UTF-8 sequence, or deliver several frames back to back. The
//! decoder therefore works on raw bytes and distinguishes three outcomes for
//! the head of its buffer: a complete value, an incomplete value that needs
//! more bytes, and input that can never become valid JSON.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Default upper bound for a single buffered frame.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Errors raised while framing JSON values.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The buffered bytes are not a prefix of any valid JSON value.
    #[error("malformed JSON frame: {source}")]
    Malformed {
        /// Parser error describing the offending input.
        #[source]
        source: serde_json::Error,
    },
    /// The buffered bytes exceed the configured frame limit.
    #[error("frame too large: {size} bytes exceeds {max_size} byte limit")]
    TooLarge {
        /// Number of bytes currently buffered.
        size: usize,
        /// Configured maximum.
        max_size: usize,
    },
    /// A complete JSON value did not have the shape of a command.
    #[error("invalid command frame: {source}")]
    InvalidCommand {
        /// Schema mismatch reported by serde.
        #[source]
        source: serde_json::Error,
    },
    /// Serialising an outgoing frame failed.
    #[error("failed to serialise frame: {source}")]
    Serialise {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing an outgoing frame failed.
    #[error("failed to write frame: {source}")]
    Io {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// A value decoded from the head of a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// The decoded JSON value.
    pub value: Value,
    /// Bytes covered by the value and any whitespace that follows it.
    pub consumed: usize,
}

/// Decodes one complete JSON value from the start of `bytes`.
///
/// Leading whitespace is skipped. Returns `Ok(None)` when the buffer is empty,
/// holds only whitespace, or ends before the first value is complete.
///
/// # Errors
///
/// Returns [`FrameError::Malformed`] when the bytes can never form a valid
/// JSON value no matter what is appended.
pub fn decode_frame(bytes: &[u8]) -> Result<Option<DecodedFrame>, FrameError> {
    let mut values = serde_json::Deserializer::from_slice(bytes).into_iter::<Value>();
    match values.next() {
        None => Ok(None),
        Some(Ok(value)) => {
            let end = values.byte_offset();
            let trailing = bytes
                .get(end..)
                .map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_whitespace()).count());
            Ok(Some(DecodedFrame {
                value,
                consumed: end + trailing,
            }))
        }
        Some(Err(error)) if error.is_eof() => Ok(None),
        Some(Err(source)) => Err(FrameError::Malformed { source }),
    }
}

/// Serialises `value` as a newline-terminated frame.
///
/// # Errors
///
/// Returns [`FrameError::Serialise`] when the value cannot be encoded.
pub fn encode_frame<T>(value: &T) -> Result<Vec<u8>, FrameError>
where
    T: Serialize + ?Sized,
{
    let mut bytes =
        serde_json::to_vec(value).map_err(|source| FrameError::Serialise { source })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Writes `value` as a newline-terminated frame and flushes the writer.
///
/// # Errors
///
/// Returns [`FrameError::Serialise`] or [`FrameError::Io`] on failure.
pub fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FrameError>
where
    W: Write + ?Sized,
    T: Serialize + ?Sized,
{
    let bytes = encode_frame(value)?;
    writer
        .write_all(&bytes)
        .and_then(|()| writer.flush())
        .map_err(|source| FrameError::Io { source })
}

/// Accumulation buffer that yields complete frames as they arrive.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame_bytes: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder with the default frame limit.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Creates a decoder that rejects buffers larger than `max_frame_bytes`.
    #[must_use]
    pub const fn with_limit(max_frame_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_bytes,
        }
    }

    /// Appends newly received bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] once the undecoded bytes exceed the
    /// frame limit. The buffer is left intact so callers can inspect it.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.max_frame_bytes {
            return Err(FrameError::TooLarge {
                size: self.buffer.len(),
                max_size: self.max_frame_bytes,
            });
        }
        Ok(())
    }

    /// Removes and returns the next complete value, if any.
    ///
    /// Call repeatedly until it returns `Ok(None)` to drain pipelined frames.
    /// Incomplete input stays buffered; whitespace-only residue is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] when the head of the buffer can never
    /// become valid JSON.
    pub fn decode(&mut self) -> Result<Option<Value>, FrameError> {
        match decode_frame(&self.buffer)? {
            Some(DecodedFrame { value, consumed }) => {
                self.buffer.drain(..consumed);
                Ok(Some(value))
            }
            None => {
                if self.buffer.iter().all(u8::is_ascii_whitespace) {
                    self.buffer.clear();
                }
                Ok(None)
            }
        }
    }

    /// Bytes received but not yet decoded.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns `true` when no undecoded bytes remain.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discards any buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Configured frame limit in bytes.
    #[must_use]
    pub const fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Command, Response};
    use rstest::rstest;
    use serde_json::json;

    fn sample_command() -> Command {
        Command::new("create_object")
            .param("type", "torus")
            .param("name", "Ring ✓")
            .param("location", json!([1.5, -2, 0]))
    }

    #[test]
    fn decodes_single_frame_and_reports_consumed_bytes() {
        let bytes = b"{\"type\":\"get_scene_info\"}\n\n";
        let frame = decode_frame(bytes)
            .expect("decode")
            .expect("complete frame");
        assert_eq!(frame.value, json!({"type": "get_scene_info"}));
        assert_eq!(frame.consumed, bytes.len());
    }

    #[rstest]
    #[case::empty(b"")]
    #[case::whitespace(b"  \n\t")]
    #[case::open_object(b"{\"type\":")]
    #[case::open_string(b"{\"type\":\"get_sce")]
    #[case::open_array(b"[1, 2")]
    fn incomplete_input_needs_more_data(#[case] bytes: &[u8]) {
        assert!(decode_frame(bytes).expect("not malformed").is_none());
    }

    #[rstest]
    #[case::bare_word(b"not json")]
    #[case::stray_brace(b"}")]
    #[case::bad_separator(b"{\"type\";1}")]
    fn malformed_input_is_reported(#[case] bytes: &[u8]) {
        assert!(matches!(
            decode_frame(bytes),
            Err(FrameError::Malformed { .. })
        ));
    }

    #[test]
    fn encode_then_decode_preserves_command() {
        let command = sample_command();
        let mut decoder = FrameDecoder::new();
        decoder
            .push(&encode_frame(&command).expect("encode"))
            .expect("push");
        let value = decoder.decode().expect("decode").expect("frame");
        assert_eq!(Command::from_value(value).expect("command"), command);
        assert!(decoder.is_empty());
    }

    #[test]
    fn reassembles_frame_split_at_every_boundary() {
        let bytes = encode_frame(&sample_command()).expect("encode");
        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            let mut decoder = FrameDecoder::new();
            decoder.push(head).expect("push head");
            let early = decoder.decode().expect("head is a prefix");
            let value = match early {
                Some(value) => value,
                None => {
                    decoder.push(tail).expect("push tail");
                    decoder.decode().expect("decode").expect("complete frame")
                }
            };
            assert_eq!(
                Command::from_value(value).expect("command"),
                sample_command(),
                "split at byte {split}"
            );
        }
    }

    #[test]
    fn drains_pipelined_frames_in_order() {
        let mut decoder = FrameDecoder::new();
        decoder
            .push(b"{\"type\":\"a\"} {\"type\":\"b\"}\n{\"type\":\"c\"")
            .expect("push");
        let first = decoder.decode().expect("decode").expect("first");
        let second = decoder.decode().expect("decode").expect("second");
        assert_eq!(first, json!({"type": "a"}));
        assert_eq!(second, json!({"type": "b"}));
        assert!(decoder.decode().expect("decode").is_none());
        assert_eq!(decoder.buffered(), b"{\"type\":\"c\"");
    }

    #[test]
    fn whitespace_residue_is_discarded() {
        let mut decoder = FrameDecoder::new();
        decoder.push(b"\n \r\n").expect("push");
        assert!(decoder.decode().expect("decode").is_none());
        assert!(decoder.is_empty());
    }

    #[test]
    fn rejects_buffers_beyond_limit() {
        let mut decoder = FrameDecoder::with_limit(8);
        decoder.push(b"{\"a\":").expect("within limit");
        let error = decoder.push(b"\"bcdef\"}").expect_err("over limit");
        assert!(matches!(
            error,
            FrameError::TooLarge {
                size: 13,
                max_size: 8
            }
        ));
    }

    #[test]
    fn write_frame_appends_newline() {
        let mut output = Vec::new();
        write_frame(&mut output, &Response::error("Command execution timeout")).expect("write");
        assert_eq!(
            output,
            b"{\"status\":\"error\",\"message\":\"Command execution timeout\"}\n"
        );
    }
}
