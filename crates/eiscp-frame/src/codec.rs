use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{CommandCode, DestinationType, NOT_AVAILABLE, QUERY};
use crate::error::{FrameError, Result};

/// eISCP header: magic (4) + header size (4) + data size (4) + version (1) + reserved (3).
pub const HEADER_SIZE: usize = 16;

/// Magic bytes: "ISCP".
pub const MAGIC: [u8; 4] = *b"ISCP";

/// The only supported protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Start character of the ISCP data block.
const START: u8 = b'!';

/// Terminator written after the argument.
const CR: u8 = 0x0D;

/// Bytes devices append after the argument (EOF, CR, LF) plus NUL padding.
const TRAILER: [u8; 4] = [0x1A, 0x0D, 0x0A, 0x00];

/// `!` + destination + 3-byte command code.
const MIN_DATA_SIZE: usize = 5;

/// Offset of the command code within a frame.
const COMMAND_OFFSET: usize = HEADER_SIZE + 2;

/// Default upper bound on a declared data size: 1 MiB.
pub const DEFAULT_MAX_DATA_SIZE: usize = 1024 * 1024;

/// Default size of one socket read.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Default pause between two full-block reads.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Default read deadline for transactional exchanges.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// One decoded eISCP message.
///
/// A `Frame` only exists for bytes that passed structural validation; decode
/// failures are reported as [`FrameError`] and never produce a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version byte.
    pub version: u8,
    /// Destination-type byte.
    pub destination: DestinationType,
    /// The 3-character command code.
    pub command: CommandCode,
    /// ASCII payload, without the terminator.
    pub argument: String,
}

impl Frame {
    /// Create a version-1 frame addressed to the receiver.
    pub fn new(command: CommandCode, argument: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            destination: DestinationType::RECEIVER,
            command,
            argument: argument.into(),
        }
    }

    /// Override the destination type.
    pub fn with_destination(mut self, destination: DestinationType) -> Self {
        self.destination = destination;
        self
    }

    /// True if the argument is the `QSTN` query token.
    pub fn is_query(&self) -> bool {
        self.argument == QUERY
    }

    /// True if the device answered "not available".
    ///
    /// The frame is still valid on the wire; turning this into an error is up
    /// to whoever interprets the argument.
    pub fn is_not_available(&self) -> bool {
        self.argument == NOT_AVAILABLE
    }

    /// Size of the data block this frame encodes to.
    pub fn data_size(&self) -> usize {
        MIN_DATA_SIZE + self.argument.len() + 1
    }

    /// The total wire size of this frame (header + data).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.data_size()
    }

    /// Encode into a fresh buffer ready for a single write.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.wire_size());
        encode_frame(self, &mut dst)?;
        Ok(dst.freeze())
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬─────────────┬───────────┬─────────┬──────────┬──────────────────────────────┐
/// │ "ISCP" │ Header size │ Data size │ Version │ Reserved │ Data                         │
/// │ (4B)   │ (4B BE, 16) │ (4B BE)   │ (1B, 1) │ (3B, 0)  │ '!' dest code argument '\r'  │
/// └────────┴─────────────┴───────────┴─────────┴──────────┴──────────────────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    if !frame
        .argument
        .bytes()
        .all(|b| b.is_ascii() && !b.is_ascii_control())
    {
        return Err(FrameError::InvalidArgument(frame.argument.clone()));
    }

    let data_size = frame.data_size();
    if data_size > u32::MAX as usize {
        return Err(FrameError::InvalidArgument(frame.argument.clone()));
    }

    dst.reserve(HEADER_SIZE + data_size);
    dst.put_slice(&MAGIC);
    dst.put_u32(HEADER_SIZE as u32);
    dst.put_u32(data_size as u32);
    dst.put_u8(frame.version);
    dst.put_bytes(0, 3);

    dst.put_u8(START);
    dst.put_u8(frame.destination.as_byte());
    dst.put_slice(frame.command.as_bytes());
    dst.put_slice(frame.argument.as_bytes());
    dst.put_u8(CR);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes the frame bytes from the buffer. On failure the
/// buffer is left untouched; see [`crate::FrameAssembler`] for recovery.
pub fn decode_frame(src: &mut BytesMut, max_data_size: usize) -> Result<Option<Frame>> {
    let total = match frame_len(src, max_data_size)? {
        Some(total) => total,
        None => return Ok(None),
    };
    if src.len() < total {
        return Ok(None); // Need more data
    }

    let frame = parse_complete(&src[..total])?;
    src.advance(total);
    Ok(Some(frame))
}

/// Parse exactly one frame from a buffer that is expected to hold it whole.
///
/// Trailing bytes after the declared frame are ignored. A buffer shorter than
/// its header declares is rejected rather than read out of range.
pub fn parse_frame(raw: &[u8]) -> Result<Frame> {
    match frame_len(raw, DEFAULT_MAX_DATA_SIZE)? {
        Some(total) if raw.len() >= total => parse_complete(&raw[..total]),
        _ => Err(FrameError::Malformed("truncated frame")),
    }
}

/// Validate the header and return the total frame length it declares.
///
/// `Ok(None)` means more bytes are needed before the header can be judged.
pub(crate) fn frame_len(src: &[u8], max_data_size: usize) -> Result<Option<usize>> {
    let magic_len = src.len().min(MAGIC.len());
    if src[..magic_len] != MAGIC[..magic_len] {
        return Err(FrameError::Malformed("missing ISCP magic"));
    }
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let header_size = read_u32_be(&src[4..8]);
    if header_size != HEADER_SIZE as u32 {
        return Err(FrameError::Malformed("header size is not 16"));
    }

    let version = src[12];
    if version != PROTOCOL_VERSION {
        return Err(FrameError::UnsupportedVersion(version));
    }

    let data_size = read_u32_be(&src[8..12]) as usize;
    if data_size < MIN_DATA_SIZE {
        return Err(FrameError::Malformed("data size too small for a command"));
    }
    if data_size > max_data_size {
        return Err(FrameError::Malformed("data size exceeds limit"));
    }

    Ok(Some(HEADER_SIZE + data_size))
}

fn parse_complete(raw: &[u8]) -> Result<Frame> {
    if raw[HEADER_SIZE] != START {
        return Err(FrameError::Malformed("missing start character"));
    }
    let command = CommandCode::from_bytes(&raw[COMMAND_OFFSET..COMMAND_OFFSET + 3])
        .map_err(|_| FrameError::Malformed("command code is not printable ASCII"))?;

    let mut end = raw.len();
    while end > COMMAND_OFFSET + 3 && TRAILER.contains(&raw[end - 1]) {
        end -= 1;
    }
    let argument = String::from_utf8_lossy(&raw[COMMAND_OFFSET + 3..end]).into_owned();

    Ok(Frame {
        version: raw[12],
        destination: DestinationType(raw[HEADER_SIZE + 1]),
        command,
        argument,
    })
}

fn read_u32_be(bytes: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[..4]);
    u32::from_be_bytes(word)
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Size of one socket read. Default: 1024 bytes.
    pub block_size: usize,
    /// Pause between two full-block reads so a long reply can finish arriving.
    pub settle_delay: Duration,
    /// Largest data size accepted from a header. Default: 1 MiB.
    pub max_data_size: usize,
    /// Read deadline for blocking reads. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Write deadline for blocking writes.
    pub write_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_data_size: DEFAULT_MAX_DATA_SIZE,
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: Some(DEFAULT_READ_TIMEOUT),
        }
    }
}
