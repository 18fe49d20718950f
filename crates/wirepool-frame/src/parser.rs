use bytes::{Buf, BytesMut};
use tracing::{error, trace, warn};

use crate::codec::{decode_header, Frame, FrameConfig};
use crate::error::{FrameError, LengthField, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Where the parser is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Scanning decimal digits up to `,`.
    HeaderSize,
    /// Scanning decimal digits up to `:`.
    BodySize,
    /// Accumulating `header_size` header bytes.
    HeaderData,
    /// Accumulating `body_size` body bytes.
    BodyData,
    /// Both segments complete; the frame is emitted and the parser resets.
    Done,
}

/// Counters describing what a parser has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames emitted.
    pub frames: u64,
    /// Frames dropped because of a malformed or oversized length field.
    pub resyncs: u64,
    /// Frames emitted without a header because the header did not decode.
    pub malformed_headers: u64,
}

/// Incremental parser for `<header_size>,<body_size>:<header><body>` frames.
///
/// Bytes are pushed in with [`feed`](Self::feed) as they arrive and complete
/// frames are pulled out with [`parse`](Self::parse). A frame may span any
/// number of `feed` calls; partial state survives between `parse` calls.
///
/// A malformed length field drops the frame in progress and the parser
/// resumes scanning at the next byte. A header that is not a JSON object is
/// tolerated: the frame is emitted with `header == None`.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    state: ParseState,
    pending_len: usize,
    digits: usize,
    header_size: usize,
    body_size: usize,
    header: BytesMut,
    body: BytesMut,
    config: FrameConfig,
    stats: ParserStats,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a parser with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            state: ParseState::HeaderSize,
            pending_len: 0,
            digits: 0,
            header_size: 0,
            body_size: 0,
            header: BytesMut::new(),
            body: BytesMut::new(),
            config,
            stats: ParserStats::default(),
        }
    }

    /// Append raw bytes to the unconsumed buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take ownership of an already-filled buffer, appending it.
    #[cfg(feature = "async")]
    pub(crate) fn feed_owned(&mut self, data: BytesMut) {
        if self.buf.is_empty() {
            self.buf = data;
        } else {
            self.buf.unsplit(data);
        }
    }

    /// Extract every complete frame currently buffered, in arrival order.
    ///
    /// Each call takes at most `max_frames_per_parse` steps, where a step
    /// either emits a frame or drops a malformed one. Anything beyond that
    /// stays buffered for the next call, so a buffer full of garbage is
    /// worked off across calls. Malformed frames are logged and skipped.
    pub fn parse(&mut self) -> Vec<Frame> {
        let cap = self.config.max_frames_per_parse.max(1);
        let mut frames = Vec::new();

        for _ in 0..cap {
            match self.next_frame() {
                Ok(Some(frame)) => frames.push(frame),
                Ok(None) => break,
                // Already logged and reset.
                Err(_) => continue,
            }
        }

        frames
    }

    /// Advance until one frame completes or the buffer runs dry.
    ///
    /// Returns `Ok(None)` when more bytes are needed. On a malformed length
    /// the in-progress frame is discarded and the parser has already reset
    /// by the time the error is returned.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match self.step() {
            Ok(frame) => Ok(frame),
            Err(err) => {
                self.stats.resyncs += 1;
                error!(error = %err, "dropping malformed frame, resynchronizing");
                self.reset_frame();
                Err(err)
            }
        }
    }

    fn step(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.state {
                ParseState::HeaderSize => match self.scan_length(LengthField::Header)? {
                    Some(len) => {
                        self.header_size = len;
                        self.state = ParseState::BodySize;
                    }
                    None => return Ok(None),
                },
                ParseState::BodySize => match self.scan_length(LengthField::Body)? {
                    Some(len) => {
                        self.body_size = len;
                        self.state = ParseState::HeaderData;
                    }
                    None => return Ok(None),
                },
                ParseState::HeaderData => {
                    if !fill_segment(&mut self.buf, &mut self.header, self.header_size) {
                        return Ok(None);
                    }
                    self.state = if self.body_size > 0 {
                        ParseState::BodyData
                    } else {
                        ParseState::Done
                    };
                }
                ParseState::BodyData => {
                    if !fill_segment(&mut self.buf, &mut self.body, self.body_size) {
                        return Ok(None);
                    }
                    self.state = ParseState::Done;
                }
                ParseState::Done => return Ok(Some(self.emit())),
            }
        }
    }

    /// Scan digits of a length field. Returns the value once the terminator
    /// is consumed, `None` if the buffer ran out first.
    fn scan_length(&mut self, field: LengthField) -> Result<Option<usize>> {
        while self.buf.has_remaining() {
            let byte = self.buf.get_u8();

            if byte.is_ascii_digit() {
                self.pending_len = self
                    .pending_len
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(usize::from(byte - b'0')))
                    .ok_or(FrameError::LengthOverflow { field })?;
                self.digits += 1;
                continue;
            }

            if byte != field.terminator() {
                return Err(FrameError::MalformedLength { field, byte });
            }
            if self.digits == 0 {
                return Err(FrameError::EmptyLength { field });
            }

            let len = self.pending_len;
            let max = match field {
                LengthField::Header => self.config.max_header_size,
                LengthField::Body => self.config.max_body_size,
            };
            if len > max {
                return Err(FrameError::SegmentTooLarge {
                    field,
                    size: len,
                    max,
                });
            }

            self.pending_len = 0;
            self.digits = 0;
            return Ok(Some(len));
        }

        Ok(None)
    }

    fn emit(&mut self) -> Frame {
        let header = if self.header_size == 0 {
            None
        } else {
            match decode_header(&self.header) {
                Ok(map) => Some(map),
                Err(err) => {
                    warn!(
                        header_size = self.header_size,
                        error = %err,
                        "undecodable frame header, emitting frame without header"
                    );
                    self.stats.malformed_headers += 1;
                    None
                }
            }
        };

        let frame = Frame {
            header_size: self.header_size,
            body_size: self.body_size,
            header,
            body: self.body.split().freeze(),
        };

        self.stats.frames += 1;
        trace!(
            header_size = frame.header_size,
            body_size = frame.body_size,
            "frame parsed"
        );
        self.reset_frame();
        frame
    }

    fn reset_frame(&mut self) {
        self.state = ParseState::HeaderSize;
        self.pending_len = 0;
        self.digits = 0;
        self.header_size = 0;
        self.body_size = 0;
        self.header.clear();
        self.body.clear();
    }

    /// Drop all buffered bytes and any frame in progress.
    pub fn reset(&mut self) {
        self.reset_frame();
        self.buf.clear();
    }

    /// Current position within the frame being parsed.
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Bytes fed but not yet consumed by the state machine.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// True when no bytes are buffered and no frame is partially parsed.
    pub fn is_idle(&self) -> bool {
        self.buf.is_empty() && self.state == ParseState::HeaderSize && self.digits == 0
    }

    /// Counters accumulated since construction.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Current parser configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update the per-call frame cap.
    pub fn set_max_frames_per_parse(&mut self, max: usize) {
        self.config.max_frames_per_parse = max;
    }
}

/// Move bytes from `src` into `segment` until it holds `target` bytes.
fn fill_segment(src: &mut BytesMut, segment: &mut BytesMut, target: usize) -> bool {
    let missing = target - segment.len();
    let take = missing.min(src.len());
    if take > 0 {
        let chunk = src.split_to(take);
        if segment.is_empty() {
            *segment = chunk;
        } else {
            segment.unsplit(chunk);
        }
    }
    segment.len() == target
}
