use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use eiscp_transport::DeviceStream;
use tracing::trace;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::command::{CommandCode, DestinationType};
use crate::error::{FrameError, Result};
use crate::reader::{is_timeout, transport_to_frame_error};

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to any `Write` stream.
///
/// Each frame is encoded into one contiguous buffer and written in full
/// before `send` returns, so two frames never interleave on the wire.
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
    pub fn send(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;
        trace!(command = %frame.command, bytes = self.buf.len(), "writing frame");

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Err(FrameError::TimedOut),
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Encode and send a command addressed to `destination`.
    pub fn send_command(
        &mut self,
        destination: DestinationType,
        version: u8,
        command: CommandCode,
        argument: &str,
    ) -> Result<()> {
        let frame = Frame {
            version,
            destination,
            command,
            argument: argument.to_string(),
        };
        self.send(&frame)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_timeout(&err) => return Err(FrameError::TimedOut),
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

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<DeviceStream> {
    /// Create a frame writer for a device stream and apply the write timeout from config.
    pub fn with_config_device(inner: DeviceStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::{parse_frame, HEADER_SIZE};

    fn code(s: &str) -> CommandCode {
        s.parse().unwrap()
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send(&Frame::new(code("PWR"), "01")).unwrap();

        let wire = writer.into_inner().into_inner();
        let frame = parse_frame(&wire).unwrap();
        assert_eq!(frame.command, code("PWR"));
        assert_eq!(frame.argument, "01");
    }

    #[test]
    fn send_command_uses_destination_and_version() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer
            .send_command(DestinationType::RECEIVER, 1, code("MVL"), "QSTN")
            .unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(&wire[..4], b"ISCP");
        assert_eq!(wire[12], 1);
        assert_eq!(&wire[HEADER_SIZE..HEADER_SIZE + 2], b"!1");
        assert_eq!(&wire[HEADER_SIZE + 2..], b"MVLQSTN\r");
    }

    #[test]
    fn invalid_argument_is_not_written() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.send(&Frame::new(code("PWR"), "0\r1")).unwrap_err();
        assert!(matches!(err, FrameError::InvalidArgument(_)));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send(&Frame::new(code("PWR"), "00")).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_short_writes() {
        let mut writer = FrameWriter::new(TrickleWriter {
            interrupted: false,
            data: Vec::new(),
        });
        writer.send(&Frame::new(code("SLI"), "2B")).unwrap();

        let data = writer.into_inner().data;
        assert_eq!(parse_frame(&data).unwrap().argument, "2B");
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(&Frame::new(code("PWR"), "01")).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn write_deadline_is_reported_not_retried() {
        let mut writer = FrameWriter::new(StalledWriter { attempts: 0 });
        let err = writer.send(&Frame::new(code("NTC"), "PLAY")).unwrap_err();
        assert!(matches!(err, FrameError::TimedOut));
        assert_eq!(writer.get_ref().attempts, 1);
    }

    #[test]
    fn device_stream_write_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and never read, so the socket buffers fill up.
        let peer = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            std::thread::sleep(std::time::Duration::from_secs(10));
            drop(stream);
        });

        let stream = eiscp_transport::connect("127.0.0.1", port).unwrap();
        let config = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(100)),
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config_device(stream, config).unwrap();
        let argument = "x".repeat(200_000);

        let started = std::time::Instant::now();
        let err = loop {
            match writer.send(&Frame::new(code("NTC"), argument.as_str())) {
                Ok(()) => assert!(started.elapsed() < std::time::Duration::from_secs(8)),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, FrameError::TimedOut), "{err:?}");
        assert!(started.elapsed() < std::time::Duration::from_secs(8));
        drop(peer);
    }

    struct StalledWriter {
        attempts: usize,
    }

    impl Write for StalledWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            self.attempts += 1;
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct TrickleWriter {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            // Three bytes at a time.
            let n = buf.len().min(3);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
