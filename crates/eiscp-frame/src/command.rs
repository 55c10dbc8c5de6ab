//! Command codes, destination types and reserved argument tokens.

use std::fmt;
use std::str::FromStr;

use crate::error::FrameError;

/// Argument token meaning "report the current value".
pub const QUERY: &str = "QSTN";

/// Reply payload a device sends when a command is not available.
pub const NOT_AVAILABLE: &str = "N/A";

/// A 3-character ASCII command code such as `PWR` or `MVL`.
///
/// Every byte is printable ASCII (`0x21..=0x7E`); this is checked on
/// construction so the code can always be written to and read from the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandCode([u8; 3]);

impl CommandCode {
    /// Build a code from a literal, failing at compile time when used in a
    /// const context with an invalid code.
    pub const fn from_static(code: &[u8; 3]) -> Self {
        let mut i = 0;
        while i < 3 {
            assert!(
                code[i].is_ascii_graphic(),
                "command code must be printable ASCII"
            );
            i += 1;
        }
        Self(*code)
    }

    /// Validate and wrap raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        match <[u8; 3]>::try_from(bytes) {
            Ok(code) if code.iter().all(u8::is_ascii_graphic) => Ok(Self(code)),
            _ => Err(FrameError::InvalidCommandCode(
                String::from_utf8_lossy(bytes).into_owned(),
            )),
        }
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }

    /// The raw 3 bytes.
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

impl FromStr for CommandCode {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bytes(s.as_bytes())
    }
}

impl TryFrom<&str> for CommandCode {
    type Error = FrameError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandCode").field(&self.as_str()).finish()
    }
}

/// Logical target subsystem byte carried after the `!` start character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DestinationType(pub u8);

impl DestinationType {
    /// The receiver unit (ASCII `1`).
    pub const RECEIVER: Self = Self(b'1');

    /// Raw byte value.
    pub fn as_byte(self) -> u8 {
        self.0
    }
}

impl Default for DestinationType {
    fn default() -> Self {
        Self::RECEIVER
    }
}

impl fmt::Display for DestinationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_ascii_graphic() {
            write!(f, "{}", self.0 as char)
        } else {
            write!(f, "0x{:02X}", self.0)
        }
    }
}
