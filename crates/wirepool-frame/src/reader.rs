use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::parser::{FrameParser, ParserStats};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete frames.
/// Malformed length fields are skipped the same way [`FrameParser`] skips
/// them; the reader only fails on I/O errors and end of stream.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
    ready: VecDeque<Frame>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::with_config(config),
            ready: VecDeque::new(),
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.ready.pop_front() {
                return Ok(frame);
            }

            let buffered = self.parser.buffered_len();
            let parsed = self.parser.parse();
            if !parsed.is_empty() {
                self.ready.extend(parsed);
                continue;
            }
            // A capped parse pass may stop with bytes still buffered.
            if self.parser.buffered_len() < buffered {
                continue;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.parser.is_idle() {
                    tracing::debug!(
                        state = ?self.parser.state(),
                        buffered = self.parser.buffered_len(),
                        "stream ended mid-frame"
                    );
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.parser.feed(&chunk[..read]);
        }
    }

    /// Iterate over frames until the stream ends.
    ///
    /// A clean EOF between frames ends the iteration. EOF inside a frame
    /// yields one final `Err(FrameError::ConnectionClosed)`.
    pub fn frames(&mut self) -> Frames<'_, T> {
        Frames {
            reader: self,
            done: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Any bytes already buffered but not yet framed are lost.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Counters from the underlying parser.
    pub fn stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        self.parser.config()
    }
}

#[cfg(unix)]
impl FrameReader<std::os::unix::net::UnixStream> {
    /// Create a frame reader for a Unix stream and apply read timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_read_timeout(config.read_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

/// Iterator returned by [`FrameReader::frames`].
pub struct Frames<'a, T> {
    reader: &'a mut FrameReader<T>,
    done: bool,
}

impl<T: Read> Iterator for Frames<'_, T> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_frame() {
            Ok(frame) => Some(Ok(frame)),
            Err(FrameError::ConnectionClosed) if self.reader.parser.is_idle() => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
