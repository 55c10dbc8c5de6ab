use std::net::SocketAddrV4;
use std::time::Duration;

use eiscp_frame::{CommandCode, Frame, FrameError, FrameReader, FrameWriter};
use eiscp_transport::DeviceStream;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::correlator::FrameSource;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SessionError};

/// A blocking device connection: one reader and one dispatcher over a socket.
///
/// Any I/O failure drops the socket. Later operations fail with
/// [`SessionError::NotConnected`] until [`reconnect`](Self::reconnect)
/// succeeds; the connection never redials on its own.
#[derive(Debug)]
pub struct Connection {
    addr: SocketAddrV4,
    config: SessionConfig,
    link: Option<Link>,
}

struct Link {
    reader: FrameReader<DeviceStream>,
    dispatcher: Dispatcher<DeviceStream>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("stream", self.reader.get_ref())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Dial the configured device. No retry on failure.
    pub fn open(config: SessionConfig) -> Result<Self> {
        let addr = config.addr()?;
        let link = dial(addr, &config)?;
        Ok(Self {
            addr,
            config,
            link: Some(link),
        })
    }

    /// Drop any current socket and dial again.
    pub fn reconnect(&mut self) -> Result<()> {
        self.close();
        self.link = Some(dial(self.addr, &self.config)?);
        Ok(())
    }

    /// Shut the socket down. Idempotent.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            if let Err(err) = link.dispatcher.get_ref().shutdown() {
                debug!(error = %err, "shutdown failed");
            }
            debug!(addr = %self.addr, "connection closed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Write one command frame.
    pub fn send(&mut self, command: CommandCode, argument: &str) -> Result<()> {
        let link = self.link.as_mut().ok_or(SessionError::NotConnected)?;
        match link.dispatcher.send(command, argument) {
            Ok(()) => Ok(()),
            Err(err @ (FrameError::InvalidArgument(_) | FrameError::InvalidCommandCode(_))) => {
                Err(SessionError::Frame(err))
            }
            Err(err) => {
                self.drop_link(&err);
                Err(SessionError::from_io(err))
            }
        }
    }

    fn drop_link(&mut self, err: &FrameError) {
        warn!(addr = %self.addr, error = %err, "connection lost");
        self.close();
    }
}

impl FrameSource for Connection {
    fn next_frame(&mut self, wait: Duration) -> std::result::Result<Option<Frame>, FrameError> {
        let per_read = self.config.frame.read_timeout.map_or(wait, |t| t.min(wait));
        let Some(link) = self.link.as_mut() else {
            return Err(FrameError::ConnectionClosed);
        };
        let result = link
            .reader
            .set_read_timeout(Some(per_read))
            .and_then(|()| link.reader.read_frame());
        match result {
            Ok(frame) => {
                debug!(command = %frame.command, argument = %frame.argument, "frame received");
                Ok(Some(frame))
            }
            Err(FrameError::TimedOut) => Ok(None),
            Err(err) if err.is_decode_failure() => Err(err),
            Err(err) => {
                self.drop_link(&err);
                Err(err)
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

fn dial(addr: SocketAddrV4, config: &SessionConfig) -> Result<Link> {
    let stream =
        eiscp_transport::connect_timeout(&config.host, config.port, config.connect_timeout)?;
    debug!(%addr, "session link established");
    let reader = FrameReader::with_config_device(stream.try_clone()?, config.frame.clone())?;
    let writer = FrameWriter::with_config_device(stream, config.frame.clone())?;
    Ok(Link {
        reader,
        dispatcher: Dispatcher::new(writer, config.destination, config.version),
    })
}
