use std::sync::{Mutex, MutexGuard, PoisonError};

use eiscp_frame::{CommandCode, Frame, QUERY};
use tracing::debug;

use crate::config::SessionConfig;
use crate::connection::Connection;
use crate::correlator::{collect_all, collect_exact, OutstandingRequest, StrictMatcher};
use crate::decoder::DecoderTable;
use crate::error::{Result, SessionError};

/// Transactional session.
///
/// Each call writes its command and reads the replies on the caller's
/// thread. The connection lock is held for the whole exchange, so one
/// command is outstanding at a time and concurrent callers queue up.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    conn: Mutex<Connection>,
}

impl Session {
    /// Connect to the device described by `config`.
    pub fn connect(config: SessionConfig) -> Result<Self> {
        let conn = Connection::open(config.clone())?;
        Ok(Self {
            config,
            conn: Mutex::new(conn),
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    /// Send `command` and collect every frame up to and including its echo.
    ///
    /// Stops early when a read times out. An empty or echo-less result is
    /// not an error.
    pub fn request_all(&self, command: CommandCode, argument: &str) -> Result<Vec<Frame>> {
        let mut conn = self.lock();
        conn.send(command, argument)?;
        let request = OutstandingRequest::new(command, self.config.reply_timeout);
        collect_all(&mut *conn, request)
    }

    /// Send `command` and return the last frame collected.
    pub fn request_one(&self, command: CommandCode, argument: &str) -> Result<Frame> {
        self.request_all(command, argument)?
            .pop()
            .ok_or(SessionError::NoReply(command))
    }

    /// Send `command` and wait for its exact echo, skipping known chatter.
    pub fn request_exact(&self, command: CommandCode, argument: &str) -> Result<Frame> {
        let mut conn = self.lock();
        conn.send(command, argument)?;
        let request = OutstandingRequest::new(command, self.config.reply_timeout);
        let mut matcher =
            StrictMatcher::new(command, &self.config.chatter, self.config.mismatch_budget);
        collect_exact(&mut *conn, request, &mut matcher)
    }

    /// Send `command` without reading anything.
    pub fn send_only(&self, command: CommandCode, argument: &str) -> Result<()> {
        self.lock().send(command, argument)
    }

    /// Ask for the current value of `command`.
    pub fn query(&self, command: CommandCode) -> Result<Frame> {
        self.request_one(command, QUERY)
    }

    /// Send `command` and decode its echo with the decoder registered in `table`.
    pub fn request_decoded<T>(
        &self,
        table: &DecoderTable<T>,
        command: CommandCode,
        argument: &str,
    ) -> Result<T> {
        if !table.contains(command) {
            return Err(SessionError::NoDecoder(command));
        }
        let frames = self.request_all(command, argument)?;
        let echo = frames
            .iter()
            .rev()
            .find(|frame| frame.command == command)
            .ok_or(SessionError::NoReply(command))?;
        table.decode(echo)
    }

    /// Drop the current socket, if any, and dial the device again.
    pub fn reconnect(&self) -> Result<()> {
        let mut conn = self.lock();
        conn.reconnect()?;
        debug!(addr = %conn.addr(), "session reconnected");
        Ok(())
    }

    /// Close the socket. Later requests fail with `NotConnected`.
    pub fn close(&self) {
        self.lock().close();
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // The connection stays consistent across a panicking caller: an
        // interrupted exchange at worst leaves replies in the read buffer.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
