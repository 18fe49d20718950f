use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::{encode_raw_frame, Frame, FrameConfig, Header};
use crate::error::{FrameError, LengthField, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    ///
    /// A frame without a header is written with an empty header segment.
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        match &frame.header {
            Some(header) => self.send(header, frame.body.as_ref()),
            None => self.send_raw(b"", frame.body.as_ref()),
        }
    }

    /// Encode and send a JSON header and body.
    pub fn send(&mut self, header: &Header, body: &[u8]) -> Result<()> {
        let header = serde_json::to_vec(header)?;
        self.send_raw(&header, body)
    }

    /// Send pre-serialized header bytes and a body.
    pub fn send_raw(&mut self, header: &[u8], body: &[u8]) -> Result<()> {
        check_size(LengthField::Header, header.len(), self.config.max_header_size)?;
        check_size(LengthField::Body, body.len(), self.config.max_body_size)?;

        self.buf.clear();
        encode_raw_frame(header, body, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
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

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum body size for subsequent frames.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.config.max_body_size = max_body_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameWriter<std::os::unix::net::UnixStream> {
    /// Create a frame writer for a Unix stream and apply write timeout from config.
    pub fn with_config_unix(
        inner: std::os::unix::net::UnixStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

fn check_size(field: LengthField, size: usize, max: usize) -> Result<()> {
    if size > max {
        return Err(FrameError::SegmentTooLarge { field, size, max });
    }
    Ok(())
}
