//! Sessions with eISCP devices.
//!
//! This is the "just works" layer. It matches asynchronous device replies to
//! the command that requested them and offers two operating modes:
//!
//! - [`Session`]: transactional. The caller's thread writes the command and
//!   reads the replies under one lock; no background work exists.
//! - [`PersistentSession`]: a listener task owns all socket reads (and
//!   reconnects on error), a writer task owns all socket writes, and every
//!   decoded frame is published on a broadcast channel.
//!
//! Both expose the same primitives: collect every reply up to the echo of the
//! command ([`Session::request_all`]), return one reply
//! ([`Session::request_one`]), insist on the exact echo
//! ([`Session::request_exact`]) and fire-and-forget ([`Session::send_only`]).

pub mod config;
pub mod connection;
pub mod correlator;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod persistent;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::SessionConfig;
pub use connection::Connection;
pub use correlator::{
    collect_all, collect_exact, FrameSource, OutstandingRequest, StrictMatcher, Verdict,
    DEFAULT_CHATTER, DEFAULT_MISMATCH_BUDGET,
};
pub use decoder::DecoderTable;
pub use dispatcher::{CommandQueue, Dispatcher};
pub use error::{Result, SessionError};
pub use persistent::{PersistentSession, Subscription};
pub use session::Session;
