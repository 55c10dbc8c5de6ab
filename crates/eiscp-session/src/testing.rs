//! A scriptable fake receiver for session tests.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use eiscp_frame::{Frame, FrameReader, MAGIC};

/// A reply the way a receiver sends it: `!1`, code, argument, EOF CR LF.
pub(crate) fn reply(code: &str, argument: &str) -> Vec<u8> {
    let mut data = vec![b'!', b'1'];
    data.extend_from_slice(code.as_bytes());
    data.extend_from_slice(argument.as_bytes());
    data.extend_from_slice(&[0x1A, 0x0D, 0x0A]);

    let mut raw = Vec::with_capacity(16 + data.len());
    raw.extend_from_slice(&MAGIC);
    raw.extend_from_slice(&16u32.to_be_bytes());
    raw.extend_from_slice(&(data.len() as u32).to_be_bytes());
    raw.extend_from_slice(&[1, 0, 0, 0]);
    raw.extend_from_slice(&data);
    raw
}

/// Several replies delivered in one write.
pub(crate) fn replies(frames: &[(&str, &str)]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|(code, argument)| reply(code, argument))
        .collect()
}

/// One accepted client connection, seen from the device side.
pub(crate) struct DeviceConn {
    reader: FrameReader<TcpStream>,
    stream: TcpStream,
}

impl DeviceConn {
    fn new(stream: TcpStream) -> Self {
        let reader_stream = stream.try_clone().expect("device stream should clone");
        Self {
            reader: FrameReader::new(reader_stream),
            stream,
        }
    }

    /// Block until the client sends a command.
    pub(crate) fn read_command(&mut self) -> Frame {
        self.reader.read_frame().expect("device should read a command")
    }

    /// The next command, or `None` once the client has gone away.
    pub(crate) fn next_command(&mut self) -> Option<Frame> {
        self.reader.read_frame().ok()
    }

    pub(crate) fn write(&mut self, bytes: &[u8]) {
        self.stream
            .write_all(bytes)
            .expect("device write should succeed");
        self.stream.flush().expect("device flush should succeed");
    }

    /// Keep the socket open for `period` without reading anything.
    pub(crate) fn stall(self, period: Duration) {
        thread::sleep(period);
        drop(self);
    }

    /// Keep the socket open until the client goes away.
    pub(crate) fn hold(mut self) {
        let mut sink = [0u8; 256];
        while matches!(self.stream.read(&mut sink), Ok(n) if n > 0) {}
    }
}

/// A fake receiver listening on an ephemeral loopback port.
pub(crate) struct FakeDevice {
    port: u16,
    _handle: JoinHandle<()>,
}

impl FakeDevice {
    /// Accept a single connection and hand it to `script`.
    pub(crate) fn spawn<F>(script: F) -> Self
    where
        F: FnOnce(DeviceConn) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("fake device should bind");
        let port = listener.local_addr().expect("fake device has addr").port();
        let handle = thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                script(DeviceConn::new(stream));
            }
        });
        Self {
            port,
            _handle: handle,
        }
    }

    /// Accept `count` connections one after another, running `script` on each.
    pub(crate) fn spawn_many<F>(count: usize, script: F) -> Self
    where
        F: Fn(DeviceConn) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("fake device should bind");
        let port = listener.local_addr().expect("fake device has addr").port();
        let handle = thread::spawn(move || {
            for _ in 0..count {
                match listener.accept() {
                    Ok((stream, _)) => script(DeviceConn::new(stream)),
                    Err(_) => break,
                }
            }
        });
        Self {
            port,
            _handle: handle,
        }
    }

    /// A loopback port with nothing listening on it.
    pub(crate) fn unused_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").expect("port finder should bind");
        listener.local_addr().expect("port finder has addr").port()
    }

    pub(crate) fn port(&self) -> u16 {
        self.port
    }
}
