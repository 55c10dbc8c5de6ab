use std::net::SocketAddrV4;
use std::time::Duration;

use eiscp_frame::{CommandCode, DestinationType, FrameConfig, PROTOCOL_VERSION};
use eiscp_transport::DEFAULT_PORT;

use crate::correlator::{DEFAULT_CHATTER, DEFAULT_MISMATCH_BUDGET};
use crate::error::Result;

/// Default wait for the replies to one command.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(3);

/// Default number of frames retained for slow broadcast subscribers.
pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Configuration for a device session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Literal IPv4 address of the device.
    pub host: String,
    /// TCP port. Default: 60128.
    pub port: u16,
    /// Destination type written into every command.
    pub destination: DestinationType,
    /// Protocol version written into every command.
    pub version: u8,
    /// Block size, settle delay and socket deadlines.
    pub frame: FrameConfig,
    /// Timeout for the initial connect and for reconnect attempts.
    pub connect_timeout: Duration,
    /// Overall wait for the replies to one command.
    pub reply_timeout: Duration,
    /// Unrelated replies tolerated by strict correlation.
    pub mismatch_budget: usize,
    /// Unsolicited codes strict correlation discards without counting.
    pub chatter: Vec<CommandCode>,
    /// Broadcast buffer size; the oldest frames are dropped for lagging subscribers.
    pub broadcast_capacity: usize,
    /// Pending commands queued for the persistent writer.
    pub command_queue_capacity: usize,
    /// Pause between reconnect attempts of the persistent listener.
    pub reconnect_delay: Duration,
}

impl SessionConfig {
    /// Configuration for the receiver at `host` with protocol defaults.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            destination: DestinationType::RECEIVER,
            version: PROTOCOL_VERSION,
            frame: FrameConfig::default(),
            connect_timeout: Duration::from_secs(5),
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            mismatch_budget: DEFAULT_MISMATCH_BUDGET,
            chatter: DEFAULT_CHATTER.to_vec(),
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            command_queue_capacity: 32,
            reconnect_delay: Duration::from_secs(1),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_destination(mut self, destination: DestinationType) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Per-read socket deadline used in transactional mode.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.frame.read_timeout = Some(timeout);
        self
    }

    /// Deadline for writing one command; a stalled write fails and drops the link.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.frame.write_timeout = Some(timeout);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.frame.settle_delay = delay;
        self
    }

    pub fn with_mismatch_budget(mut self, budget: usize) -> Self {
        self.mismatch_budget = budget;
        self
    }

    pub fn with_chatter(mut self, chatter: impl IntoIterator<Item = CommandCode>) -> Self {
        self.chatter = chatter.into_iter().collect();
        self
    }

    pub fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// The device address; fails unless `host` is a literal IPv4 address.
    pub fn addr(&self) -> Result<SocketAddrV4> {
        Ok(eiscp_transport::device_addr(&self.host, self.port)?)
    }
}
