//! Incremental header/body stream framing.
//!
//! Every message on the wire is:
//! - The header length in ASCII decimal, terminated by `,`
//! - The body length in ASCII decimal, terminated by `:`
//! - The header bytes (a JSON object)
//! - The body bytes (opaque)
//!
//! Bytes may arrive in arbitrary fragments; the parser only ever hands out
//! complete frames.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_header, encode_frame, encode_raw_frame, Frame, FrameConfig, Header,
    DEFAULT_MAX_BODY, DEFAULT_MAX_FRAMES_PER_PARSE, DEFAULT_MAX_HEADER,
};
pub use error::{FrameError, HeaderDecodeError, LengthField, Result};
pub use parser::{FrameParser, ParseState, ParserStats};
pub use reader::{FrameReader, Frames};
pub use writer::FrameWriter;
