//! TCP transport for eISCP devices.
//!
//! eISCP receivers listen on a fixed TCP port and are addressed by a literal
//! IPv4 address; no name resolution is performed. This is the lowest layer of
//! eiscp. Everything else builds on top of the [`DeviceStream`] type provided
//! here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::DeviceStream;
pub use tcp::{connect, connect_timeout, device_addr, DEFAULT_PORT};

#[cfg(feature = "async")]
pub use tcp::connect_async;
