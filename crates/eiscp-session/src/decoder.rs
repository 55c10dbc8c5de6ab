use std::collections::HashMap;
use std::fmt;

use eiscp_frame::{CommandCode, Frame};

use crate::error::{Result, SessionError};

type DecodeFn<T> = Box<dyn Fn(&Frame) -> std::result::Result<T, String> + Send + Sync>;

/// Caller-owned mapping from command code to reply decoder.
///
/// Turning a raw argument into a typed value belongs to the layer above the
/// session. The table lets that layer register one decoder per code and have
/// [`Session::request_decoded`](crate::Session::request_decoded) apply it to
/// the echoed reply. Several sessions may share one table or own separate ones.
pub struct DecoderTable<T> {
    decoders: HashMap<CommandCode, DecodeFn<T>>,
}

impl<T> Default for DecoderTable<T> {
    fn default() -> Self {
        Self {
            decoders: HashMap::new(),
        }
    }
}

impl<T> DecoderTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the decoder for `command`.
    pub fn register<F>(&mut self, command: CommandCode, decode: F)
    where
        F: Fn(&Frame) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        self.decoders.insert(command, Box::new(decode));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, command: CommandCode, decode: F) -> Self
    where
        F: Fn(&Frame) -> std::result::Result<T, String> + Send + Sync + 'static,
    {
        self.register(command, decode);
        self
    }

    pub fn contains(&self, command: CommandCode) -> bool {
        self.decoders.contains_key(&command)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode `frame` with the decoder registered for its command code.
    pub fn decode(&self, frame: &Frame) -> Result<T> {
        let decode = self
            .decoders
            .get(&frame.command)
            .ok_or(SessionError::NoDecoder(frame.command))?;
        decode(frame).map_err(|message| SessionError::Decode {
            command: frame.command,
            message,
        })
    }
}

impl<T> fmt::Debug for DecoderTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut codes: Vec<&str> = self.decoders.keys().map(CommandCode::as_str).collect();
        codes.sort_unstable();
        f.debug_struct("DecoderTable").field("codes", &codes).finish()
    }
}
