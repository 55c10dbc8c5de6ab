use std::io::{ErrorKind, Read};
use std::time::Duration;

use eiscp_transport::DeviceStream;
use tracing::trace;

use crate::assembler::FrameAssembler;
use crate::codec::{Frame, FrameConfig};
use crate::error::{FrameError, Result};

/// Reads complete frames from any `Read` stream.
///
/// The socket is read in fixed-size blocks. A short read ends one burst of
/// device output; a full block is followed, after the configured settle
/// delay, by another read whenever the buffered bytes still end inside a
/// frame. Callers always get complete frames.
pub struct FrameReader<T> {
    inner: T,
    assembler: FrameAssembler,
    block: Vec<u8>,
    config: FrameConfig,
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
            assembler: FrameAssembler::new(config.max_data_size),
            block: vec![0u8; config.block_size.max(1)],
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::TimedOut)` when the stream's read deadline
    /// expires with nothing buffered and `Err(FrameError::ConnectionClosed)`
    /// when EOF is reached. Structural failures are returned for the bad
    /// frame only; the next call continues with the following bytes.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(result) = self.assembler.next_frame() {
                return result;
            }
            self.fill()?;
        }
    }

    /// Read one burst of device output into the assembler.
    fn fill(&mut self) -> Result<()> {
        let mut received = false;
        loop {
            let read = match self.inner.read(&mut self.block) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => {
                    return if received {
                        Ok(())
                    } else {
                        Err(FrameError::TimedOut)
                    };
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return if received {
                    Ok(())
                } else {
                    Err(FrameError::ConnectionClosed)
                };
            }

            self.assembler.extend(&self.block[..read]);
            received = true;
            trace!(read, buffered = self.assembler.buffered(), "block read");

            if read < self.block.len() || !self.assembler.needs_more() {
                return Ok(());
            }
            if !self.config.settle_delay.is_zero() {
                std::thread::sleep(self.config.settle_delay);
            }
        }
    }

    /// Discard buffered bytes.
    pub fn reset(&mut self) {
        self.assembler.clear();
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
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<DeviceStream> {
    /// Create a frame reader for a device stream and apply the read timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }

    /// Change the socket read deadline for subsequent reads.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        // A zero duration would mean "block forever" to the OS.
        let timeout = timeout.map(|t| t.max(Duration::from_millis(1)));
        self.inner
            .set_read_timeout(timeout)
            .map_err(transport_to_frame_error)
    }
}

/// A socket deadline surfaces as `WouldBlock` on Unix and `TimedOut` on Windows.
pub(crate) fn is_timeout(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

pub(crate) fn transport_to_frame_error(err: eiscp_transport::TransportError) -> FrameError {
    match err {
        eiscp_transport::TransportError::Io(io)
        | eiscp_transport::TransportError::Connect { source: io, .. } => FrameError::Io(io),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
