//! Client for Onkyo and Integra receivers speaking eISCP over TCP.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connect to a literal IPv4 address, device streams
//! - [`frame`]: eISCP framing, command codes, block-based frame reader
//! - [`session`]: reply correlation, transactional and persistent sessions
//!
//! ```no_run
//! use eiscp::frame::CommandCode;
//! use eiscp::session::{Session, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let session = Session::connect(SessionConfig::new("192.168.1.152"))?;
//! let power = session.query(CommandCode::from_static(b"PWR"))?;
//! println!("power: {}", power.argument);
//! # Ok(())
//! # }
//! ```

/// Re-export transport types.
pub mod transport {
    pub use eiscp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use eiscp_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use eiscp_session::*;
}
