//! The persistent-mode listener task.
//!
//! The listener is the only reader of the socket. It never waits on a
//! consumer: frames go to a bounded broadcast channel (lagging subscribers
//! lose the oldest frames) and, while a request is outstanding, to that
//! request's private unbounded feed. Read errors, EOF and a failed write
//! reported by the writer task trigger a redial loop; the fresh write half is
//! handed to the writer task.

use std::io::{self, ErrorKind};
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use eiscp_frame::{Frame, FrameAssembler, FrameConfig};
use tokio::io::AsyncReadExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use crate::error::{Result, SessionError};

/// Slot for the feed of the one outstanding request.
pub(crate) type FeedSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Frame>>>>;

pub(crate) struct Listener {
    pub(crate) addr: SocketAddrV4,
    pub(crate) frame: FrameConfig,
    pub(crate) connect_timeout: Duration,
    pub(crate) reconnect_delay: Duration,
    pub(crate) broadcast: broadcast::Sender<Frame>,
    pub(crate) feed: FeedSlot,
    pub(crate) handoff: mpsc::Sender<OwnedWriteHalf>,
    pub(crate) link_lost: mpsc::Receiver<()>,
    pub(crate) connected: Arc<AtomicBool>,
    pub(crate) cancel: CancellationToken,
}

impl Listener {
    pub(crate) async fn run(mut self, mut source: OwnedReadHalf) {
        info!(addr = %self.addr, "listener started");
        let mut assembler = FrameAssembler::new(self.frame.max_data_size);
        let mut block = vec![0u8; self.frame.block_size.max(1)];

        loop {
            let burst = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(()) = self.link_lost.recv() => {
                    Err(io::Error::new(ErrorKind::TimedOut, "command write failed"))
                }
                burst = read_burst(
                    &mut source,
                    &mut assembler,
                    &mut block,
                    self.frame.settle_delay,
                ) => burst,
            };

            match burst {
                Ok(()) => self.drain(&mut assembler),
                Err(err) => {
                    self.connected.store(false, Ordering::Release);
                    warn!(addr = %self.addr, error = %err, "listener lost connection");
                    // Anything still buffered belongs to the dead socket.
                    assembler.clear();
                    match self.redial().await {
                        Some(fresh) => source = fresh,
                        None => break,
                    }
                }
            }
        }

        self.connected.store(false, Ordering::Release);
        info!(addr = %self.addr, "listener stopped");
    }

    fn drain(&self, assembler: &mut FrameAssembler) {
        while let Some(result) = assembler.next_frame() {
            match result {
                Ok(frame) => self.publish(frame),
                Err(err) => warn!(error = %err, "skipping invalid frame"),
            }
        }
    }

    fn publish(&self, frame: Frame) {
        trace!(command = %frame.command, argument = %frame.argument, "frame received");
        if let Some(feed) = self
            .feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            let _ = feed.send(frame.clone());
        }
        // Err only means nobody is subscribed.
        let _ = self.broadcast.send(frame);
    }

    /// Redial until it works or the session is cancelled.
    async fn redial(&mut self) -> Option<OwnedReadHalf> {
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }

            match dial(self.addr, self.connect_timeout).await {
                Ok(stream) => {
                    let (read, write) = stream.into_split();
                    // Write failures reported so far concern the old socket.
                    while self.link_lost.try_recv().is_ok() {}
                    if self.handoff.send(write).await.is_err() {
                        return None;
                    }
                    self.connected.store(true, Ordering::Release);
                    info!(addr = %self.addr, "listener reconnected");
                    return Some(read);
                }
                Err(err) => warn!(addr = %self.addr, error = %err, "reconnect failed"),
            }
        }
    }
}

/// Connect with an upper bound on the handshake time.
pub(crate) async fn dial(
    addr: SocketAddrV4,
    timeout: Duration,
) -> Result<tokio::net::TcpStream> {
    match tokio::time::timeout(timeout, eiscp_transport::connect_async(addr)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SessionError::Connection(eiscp_transport::TransportError::Connect {
            addr,
            source: io::Error::from(ErrorKind::TimedOut),
        })),
    }
}

/// Read one burst of device output; mirrors the blocking reader without a deadline.
async fn read_burst(
    source: &mut OwnedReadHalf,
    assembler: &mut FrameAssembler,
    block: &mut [u8],
    settle_delay: Duration,
) -> io::Result<()> {
    let mut received = false;
    loop {
        let read = source.read(block).await?;
        if read == 0 {
            return if received {
                Ok(())
            } else {
                Err(io::Error::from(ErrorKind::UnexpectedEof))
            };
        }

        assembler.extend(&block[..read]);
        received = true;
        trace!(read, buffered = assembler.buffered(), "block read");

        if read < block.len() || !assembler.needs_more() {
            return Ok(());
        }
        if !settle_delay.is_zero() {
            tokio::time::sleep(settle_delay).await;
        }
    }
}
