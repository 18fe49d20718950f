use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::error::{HeaderDecodeError, Result};

/// Terminator of the header length field.
pub const HEADER_SIZE_TERMINATOR: u8 = b',';

/// Terminator of the body length field.
pub const BODY_SIZE_TERMINATOR: u8 = b':';

/// Default maximum header segment size: 1 MiB.
pub const DEFAULT_MAX_HEADER: usize = 1024 * 1024;

/// Default maximum body segment size: 16 MiB.
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// Default number of frames a single `parse()` call may return.
pub const DEFAULT_MAX_FRAMES_PER_PARSE: usize = 100;

/// JSON object carried in a frame header.
pub type Header = Map<String, Value>;

/// One complete header + body message unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Byte length of the header segment as it appeared on the wire.
    pub header_size: usize,
    /// Byte length of the body segment.
    pub body_size: usize,
    /// Decoded header, or `None` when the header bytes were not a JSON object.
    pub header: Option<Header>,
    /// Raw body bytes, exactly `body_size` long.
    pub body: Bytes,
}

impl Frame {
    /// Create a frame, deriving `header_size` from the serialized header.
    pub fn new(header: Option<Header>, body: impl Into<Bytes>) -> Result<Self> {
        let header_size = match &header {
            Some(map) => serde_json::to_vec(map)?.len(),
            None => 0,
        };
        let body = body.into();
        Ok(Self {
            header_size,
            body_size: body.len(),
            header,
            body,
        })
    }

    /// Look up a single header field.
    pub fn header_value(&self, key: &str) -> Option<&Value> {
        self.header.as_ref().and_then(|h| h.get(key))
    }

    /// The total wire size of this frame (length prefixes + segments).
    pub fn wire_size(&self) -> usize {
        prefix_len(self.header_size, self.body_size) + self.header_size + self.body_size
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// <header_size>,<body_size>:<header bytes><body bytes>
///
/// 15,5:{"type":"ping"}hello
/// ```
///
/// Both sizes are ASCII decimal. The header is compact JSON.
pub fn encode_frame(header: &Header, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let header = serde_json::to_vec(header)?;
    encode_raw_frame(&header, body, dst);
    Ok(())
}

/// Encode a frame whose header segment is already serialized.
///
/// The header bytes are written verbatim, valid JSON or not.
pub fn encode_raw_frame(header: &[u8], body: &[u8], dst: &mut BytesMut) {
    let header_len = header.len().to_string();
    let body_len = body.len().to_string();

    dst.reserve(header_len.len() + body_len.len() + 2 + header.len() + body.len());
    dst.put_slice(header_len.as_bytes());
    dst.put_u8(HEADER_SIZE_TERMINATOR);
    dst.put_slice(body_len.as_bytes());
    dst.put_u8(BODY_SIZE_TERMINATOR);
    dst.put_slice(header);
    dst.put_slice(body);
}

/// Decode header bytes into a JSON object.
pub fn decode_header(raw: &[u8]) -> std::result::Result<Header, HeaderDecodeError> {
    let text = std::str::from_utf8(raw)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        Value::Null => Err(HeaderDecodeError::NotAnObject("null")),
        Value::Bool(_) => Err(HeaderDecodeError::NotAnObject("boolean")),
        Value::Number(_) => Err(HeaderDecodeError::NotAnObject("number")),
        Value::String(_) => Err(HeaderDecodeError::NotAnObject("string")),
        Value::Array(_) => Err(HeaderDecodeError::NotAnObject("array")),
    }
}

fn prefix_len(header_size: usize, body_size: usize) -> usize {
    decimal_digits(header_size) + decimal_digits(body_size) + 2
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum header segment size in bytes. Default: 1 MiB.
    pub max_header_size: usize,
    /// Maximum body segment size in bytes. Default: 16 MiB.
    pub max_body_size: usize,
    /// Upper bound on frames returned by one `parse()` call. Default: 100.
    pub max_frames_per_parse: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER,
            max_body_size: DEFAULT_MAX_BODY,
            max_frames_per_parse: DEFAULT_MAX_FRAMES_PER_PARSE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
