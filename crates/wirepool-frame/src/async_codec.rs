//! `tokio_util::codec` adapter over [`FrameParser`].

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_raw_frame, Frame, FrameConfig};
use crate::error::{FrameError, LengthField, Result};
use crate::parser::FrameParser;

/// Frame codec for `FramedRead` / `FramedWrite`.
///
/// Decoding moves incoming bytes into an internal [`FrameParser`], so
/// resynchronization and header tolerance behave exactly as in the
/// blocking reader.
#[derive(Debug, Default)]
pub struct FrameCodec {
    parser: FrameParser,
}

impl FrameCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            parser: FrameParser::with_config(config),
        }
    }

    /// The parser backing this codec.
    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if !src.is_empty() {
            self.parser.feed_owned(src.split());
        }
        loop {
            match self.parser.next_frame() {
                Ok(frame) => return Ok(frame),
                Err(err) if err.is_recoverable() => continue,
                Err(err) => return Err(err),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if self.parser.is_idle() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<&Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: &Frame, dst: &mut BytesMut) -> Result<()> {
        let header = match &frame.header {
            Some(header) => serde_json::to_vec(header)?,
            None => Vec::new(),
        };
        let config = self.parser.config();
        if header.len() > config.max_header_size {
            return Err(FrameError::SegmentTooLarge {
                field: LengthField::Header,
                size: header.len(),
                max: config.max_header_size,
            });
        }
        if frame.body.len() > config.max_body_size {
            return Err(FrameError::SegmentTooLarge {
                field: LengthField::Body,
                size: frame.body.len(),
                max: config.max_body_size,
            });
        }
        encode_raw_frame(&header, &frame.body, dst);
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        Encoder::<&Frame>::encode(self, &frame, dst)
    }
}
