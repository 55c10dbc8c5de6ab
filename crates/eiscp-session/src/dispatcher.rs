//! Serialised command writes.
//!
//! The protocol has no request identifiers, so two commands must never be
//! interleaved mid-frame. In transactional mode the caller writes through a
//! [`Dispatcher`] while holding the session lock. In persistent mode every
//! caller goes through a [`CommandQueue`] whose single consumer, the writer
//! task, is the only code that touches the socket's write half.

use std::io::Write;
use std::time::Duration;

use bytes::Bytes;
use eiscp_frame::{CommandCode, DestinationType, Frame, FrameError, FrameWriter};
use eiscp_transport::TransportError;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{Result, SessionError};

/// Builds command frames and writes each with exactly one orderly write.
pub struct Dispatcher<W> {
    writer: FrameWriter<W>,
    destination: DestinationType,
    version: u8,
}

impl<W: Write> Dispatcher<W> {
    pub fn new(writer: FrameWriter<W>, destination: DestinationType, version: u8) -> Self {
        Self {
            writer,
            destination,
            version,
        }
    }

    /// The frame `send` would write for `command` and `argument`.
    pub fn frame(&self, command: CommandCode, argument: &str) -> Frame {
        command_frame(self.destination, self.version, command, argument)
    }

    /// Encode and write one command.
    pub fn send(
        &mut self,
        command: CommandCode,
        argument: &str,
    ) -> std::result::Result<(), FrameError> {
        debug!(%command, argument, "sending command");
        self.writer
            .send_command(self.destination, self.version, command, argument)
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

fn command_frame(
    destination: DestinationType,
    version: u8,
    command: CommandCode,
    argument: &str,
) -> Frame {
    Frame {
        version,
        destination,
        command,
        argument: argument.to_string(),
    }
}

/// One encoded command waiting for the writer task.
#[derive(Debug)]
pub(crate) struct WriteRequest {
    pub(crate) command: CommandCode,
    pub(crate) bytes: Bytes,
    pub(crate) done: oneshot::Sender<Result<()>>,
}

/// Cloneable handle that funnels commands to the persistent writer task.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    tx: mpsc::Sender<WriteRequest>,
    destination: DestinationType,
    version: u8,
}

impl CommandQueue {
    pub(crate) fn new(
        tx: mpsc::Sender<WriteRequest>,
        destination: DestinationType,
        version: u8,
    ) -> Self {
        Self {
            tx,
            destination,
            version,
        }
    }

    /// Queue one command and wait until the writer has put it on the wire.
    ///
    /// Encoding errors are reported before anything is queued. A write
    /// failure is returned to this caller only; the writer does not redial.
    pub async fn send(&self, command: CommandCode, argument: &str) -> Result<()> {
        let bytes = command_frame(self.destination, self.version, command, argument).to_bytes()?;
        let (done, ack) = oneshot::channel();
        self.tx
            .send(WriteRequest {
                command,
                bytes,
                done,
            })
            .await
            .map_err(|_| SessionError::Closed)?;
        ack.await.map_err(|_| SessionError::Closed)?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The persistent writer's end of the socket plumbing.
pub(crate) struct WriterLink {
    pub(crate) requests: mpsc::Receiver<WriteRequest>,
    pub(crate) handoff: mpsc::Receiver<OwnedWriteHalf>,
    /// Signalled after a failed write so the listener redials.
    pub(crate) link_lost: mpsc::Sender<()>,
    pub(crate) write_timeout: Option<Duration>,
}

/// Writer task: the sole owner of the socket's write half.
///
/// A fresh write half arrives on `handoff` after every reconnect. Queued
/// commands that find no live socket fail with [`SessionError::NotConnected`].
/// A write that fails or outlasts `write_timeout` drops the half and
/// signals `link_lost`.
pub(crate) async fn run_writer(
    mut sink: Option<OwnedWriteHalf>,
    link: WriterLink,
    cancel: CancellationToken,
) {
    let WriterLink {
        mut requests,
        mut handoff,
        link_lost,
        write_timeout,
    } = link;

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            fresh = handoff.recv() => match fresh {
                Some(half) => {
                    debug!("writer received new connection");
                    sink = Some(half);
                }
                None => break,
            },

            request = requests.recv() => {
                let Some(request) = request else { break };
                let outcome = match sink.as_mut() {
                    Some(half) => write_all(half, &request.bytes, write_timeout).await,
                    None => Err(SessionError::NotConnected),
                };
                if let Err(err) = &outcome {
                    warn!(command = %request.command, error = %err, "command write failed");
                    if !matches!(err, SessionError::NotConnected) {
                        sink = None;
                        // Full means a redial is already pending.
                        let _ = link_lost.try_send(());
                    }
                } else {
                    trace!(
                        command = %request.command,
                        bytes = request.bytes.len(),
                        "command written"
                    );
                }
                let _ = request.done.send(outcome);
            }
        }
    }
    debug!("writer stopped");
}

async fn write_all(
    half: &mut OwnedWriteHalf,
    bytes: &[u8],
    write_timeout: Option<Duration>,
) -> Result<()> {
    let write = async {
        half.write_all(bytes).await?;
        half.flush().await
    };
    let outcome = match write_timeout {
        Some(limit) => tokio::time::timeout(limit, write)
            .await
            .map_err(|_| SessionError::Frame(FrameError::TimedOut))?,
        None => write.await,
    };
    outcome.map_err(|err| SessionError::Connection(TransportError::Io(err)))
}
