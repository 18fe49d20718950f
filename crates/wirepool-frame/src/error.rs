use std::fmt;

/// The length field being scanned when a framing error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthField {
    /// The `<header_size>,` prefix.
    Header,
    /// The `<body_size>:` prefix.
    Body,
}

impl LengthField {
    /// The byte that terminates this length field on the wire.
    pub fn terminator(self) -> u8 {
        match self {
            LengthField::Header => b',',
            LengthField::Body => b':',
        }
    }
}

impl fmt::Display for LengthField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LengthField::Header => f.write_str("header size"),
            LengthField::Body => f.write_str("body size"),
        }
    }
}

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A non-digit byte appeared where a decimal length was expected.
    #[error("malformed {field} field: unexpected byte 0x{byte:02x}")]
    MalformedLength { field: LengthField, byte: u8 },

    /// A length terminator appeared before any digit.
    #[error("malformed {field} field: no digits before terminator")]
    EmptyLength { field: LengthField },

    /// The decimal length does not fit in `usize`.
    #[error("malformed {field} field: value overflows")]
    LengthOverflow { field: LengthField },

    /// A declared or supplied segment exceeds the configured maximum.
    #[error("{field} too large ({size} bytes, max {max})")]
    SegmentTooLarge {
        field: LengthField,
        size: usize,
        max: usize,
    },

    /// The header could not be serialized to JSON.
    #[error("header serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// Returns true for errors after which the parser resynchronizes
    /// instead of giving up on the stream.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FrameError::MalformedLength { .. }
                | FrameError::EmptyLength { .. }
                | FrameError::LengthOverflow { .. }
                | FrameError::SegmentTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Why a frame's header bytes could not be turned into a JSON object.
///
/// Not fatal: the frame is still emitted, with its header set to `None`.
#[derive(Debug, thiserror::Error)]
pub enum HeaderDecodeError {
    #[error("header is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("header is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("header JSON is a {0}, expected an object")]
    NotAnObject(&'static str),
}
