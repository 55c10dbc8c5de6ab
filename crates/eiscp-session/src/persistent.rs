use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use eiscp_frame::{CommandCode, Frame, QUERY};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::correlator::{OutstandingRequest, StrictMatcher, Verdict};
use crate::dispatcher::{run_writer, CommandQueue, WriterLink};
use crate::error::{Result, SessionError};
use crate::listener::{dial, FeedSlot, Listener};

/// Persistent session.
///
/// A listener task owns every socket read and reconnects after errors; a
/// writer task owns every socket write. Callers talk to them only through
/// channels. Every decoded frame is published to all [`Subscription`]s in
/// wire order, whether or not a request is waiting for it.
///
/// Must be created inside a Tokio runtime. Dropping the session stops both
/// tasks.
#[derive(Debug)]
pub struct PersistentSession {
    config: SessionConfig,
    commands: CommandQueue,
    broadcast: broadcast::Sender<Frame>,
    feed: FeedSlot,
    request_lock: tokio::sync::Mutex<()>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PersistentSession {
    /// Connect and start the listener and writer tasks.
    ///
    /// The initial connect is not retried; only a connection lost later is
    /// redialled in the background.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let addr = config.addr()?;
        let stream = dial(addr, config.connect_timeout).await?;
        let (read, write) = stream.into_split();

        let cancel = CancellationToken::new();
        let (broadcast, _) = broadcast::channel(config.broadcast_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_capacity.max(1));
        let (handoff_tx, handoff_rx) = mpsc::channel(1);
        let feed: FeedSlot = Arc::new(Mutex::new(None));
        let connected = Arc::new(AtomicBool::new(true));
        let (link_lost_tx, link_lost_rx) = mpsc::channel(1);

        let listener = Listener {
            addr,
            frame: config.frame.clone(),
            connect_timeout: config.connect_timeout,
            reconnect_delay: config.reconnect_delay,
            broadcast: broadcast.clone(),
            feed: Arc::clone(&feed),
            handoff: handoff_tx,
            link_lost: link_lost_rx,
            connected: Arc::clone(&connected),
            cancel: cancel.clone(),
        };
        let writer = WriterLink {
            requests: command_rx,
            handoff: handoff_rx,
            link_lost: link_lost_tx,
            write_timeout: config.frame.write_timeout,
        };
        let tasks = vec![
            tokio::spawn(listener.run(read)),
            tokio::spawn(run_writer(Some(write), writer, cancel.clone())),
        ];
        debug!(%addr, "persistent session started");

        Ok(Self {
            commands: CommandQueue::new(command_tx, config.destination, config.version),
            config,
            broadcast,
            feed,
            request_lock: tokio::sync::Mutex::new(()),
            connected,
            cancel,
            tasks: Mutex::new(tasks),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// True while the listener holds a live socket.
    pub fn is_connected(&self) -> bool {
        !self.cancel.is_cancelled() && self.connected.load(Ordering::Acquire)
    }

    /// Observe every frame the listener decodes from now on.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.broadcast.subscribe(),
            cancel: self.cancel.clone(),
        }
    }

    /// A handle for queueing raw commands from other tasks.
    pub fn command_queue(&self) -> CommandQueue {
        self.commands.clone()
    }

    /// Send `command` and collect every frame up to and including its echo.
    ///
    /// Waits at most the configured reply timeout; an empty result is not
    /// an error.
    pub async fn request_all(&self, command: CommandCode, argument: &str) -> Result<Vec<Frame>> {
        let _turn = self.request_lock.lock().await;
        let mut feed = self.open_feed()?;
        self.commands.send(command, argument).await?;

        let mut request = OutstandingRequest::new(command, self.config.reply_timeout);
        while let Some(wait) = request.remaining() {
            match tokio::time::timeout(wait, feed.recv()).await {
                Ok(Some(frame)) => {
                    if request.offer(frame) == Verdict::Complete {
                        break;
                    }
                }
                Ok(None) => return Err(SessionError::Closed),
                Err(_) => break,
            }
        }
        debug!(%command, frames = request.collected().len(), "collection finished");
        Ok(request.into_frames())
    }

    /// Send `command` and return the last frame collected.
    pub async fn request_one(&self, command: CommandCode, argument: &str) -> Result<Frame> {
        self.request_all(command, argument)
            .await?
            .pop()
            .ok_or(SessionError::NoReply(command))
    }

    /// Send `command` and wait for its exact echo, skipping known chatter.
    pub async fn request_exact(&self, command: CommandCode, argument: &str) -> Result<Frame> {
        let _turn = self.request_lock.lock().await;
        let mut feed = self.open_feed()?;
        self.commands.send(command, argument).await?;

        let request = OutstandingRequest::new(command, self.config.reply_timeout);
        let mut matcher =
            StrictMatcher::new(command, &self.config.chatter, self.config.mismatch_budget);
        while let Some(wait) = request.remaining() {
            match tokio::time::timeout(wait, feed.recv()).await {
                Ok(Some(frame)) => {
                    if let Some(frame) = matcher.offer(frame)? {
                        return Ok(frame);
                    }
                }
                Ok(None) => return Err(SessionError::Closed),
                Err(_) => break,
            }
        }
        Err(SessionError::Timeout {
            command,
            timeout: request.timeout(),
        })
    }

    /// Send `command` without waiting for any reply.
    pub async fn send_only(&self, command: CommandCode, argument: &str) -> Result<()> {
        let _turn = self.request_lock.lock().await;
        self.ensure_open()?;
        self.commands.send(command, argument).await
    }

    /// Ask for the current value of `command`.
    pub async fn query(&self, command: CommandCode) -> Result<Frame> {
        self.request_one(command, QUERY).await
    }

    /// Stop both tasks and wait for them to finish. Idempotent.
    pub async fn close(&self) {
        self.cancel.cancel();
        let tasks = {
            let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *tasks)
        };
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "session task failed");
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    /// Install a private feed for the request about to be sent.
    fn open_feed(&self) -> Result<Feed> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        *self.feed.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        Ok(Feed {
            rx,
            slot: Arc::clone(&self.feed),
        })
    }
}

impl Drop for PersistentSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A request's view of the listener output; uninstalls itself on drop.
struct Feed {
    rx: mpsc::UnboundedReceiver<Frame>,
    slot: FeedSlot,
}

impl Feed {
    async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// A receiver of every frame published by a [`PersistentSession`].
///
/// Frames arrive in the order they were decoded. A subscriber that falls
/// more than the broadcast capacity behind loses the oldest frames; the gap
/// is logged and delivery resumes with the oldest frame still buffered.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Frame>,
    cancel: CancellationToken,
}

impl Subscription {
    /// The next frame, or `None` once the session has been closed and every
    /// buffered frame has been delivered.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            // Biased towards the channel so buffered frames drain before the
            // cancellation is noticed.
            let next = tokio::select! {
                biased;
                next = self.rx.recv() => next,
                _ = self.cancel.cancelled() => return None,
            };
            match next {
                Ok(frame) => return Some(frame),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber lagged; oldest frames dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Like [`recv`](Self::recv), giving up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Frame> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }
}
