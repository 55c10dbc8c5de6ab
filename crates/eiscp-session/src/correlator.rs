//! Matching device replies to the command that requested them.
//!
//! The protocol carries no request identifiers; the only link between a
//! command and its answer is the echoed command code. Devices also push
//! unsolicited updates (menu lines, titles, play status) at any time, so the
//! reply stream for one command is usually a mix of both.
//!
//! Two waiting policies are provided:
//!
//! - **Collect until echo** ([`OutstandingRequest`]): keep every frame in
//!   arrival order and stop at the first frame carrying the awaited code, or
//!   at the deadline. Running out of time is not an error; some commands
//!   legitimately produce no reply.
//! - **Exact echo** ([`StrictMatcher`]): return the first frame carrying the
//!   awaited code, silently discarding known chatter and failing once too many
//!   other frames have been seen.
//!
//! Both are plain state machines; [`collect_all`] and [`collect_exact`] drive
//! them from any [`FrameSource`].

use std::time::{Duration, Instant};

use eiscp_frame::{CommandCode, Frame, FrameError};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};

/// Unrelated replies tolerated by strict correlation.
pub const DEFAULT_MISMATCH_BUDGET: usize = 5;

/// Unsolicited menu, title and list-update codes.
pub const DEFAULT_CHATTER: [CommandCode; 4] = [
    CommandCode::from_static(b"NLS"),
    CommandCode::from_static(b"NLT"),
    CommandCode::from_static(b"NMS"),
    CommandCode::from_static(b"NLU"),
];

/// Ceiling for deadlines whose timeout does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Outcome of offering one frame to an outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Keep waiting.
    Pending,
    /// The awaited code was echoed; the request is finished.
    Complete,
}

/// One command waiting for its replies.
#[derive(Debug)]
pub struct OutstandingRequest {
    command: CommandCode,
    collected: Vec<Frame>,
    timeout: Duration,
    deadline: Instant,
}

impl OutstandingRequest {
    /// Start waiting for `command`; give up after `timeout`.
    ///
    /// A timeout too large to represent waits until a far-future deadline
    /// instead.
    pub fn new(command: CommandCode, timeout: Duration) -> Self {
        let now = Instant::now();
        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        Self {
            command,
            collected: Vec::new(),
            timeout,
            deadline,
        }
    }

    pub fn command(&self) -> CommandCode {
        self.command
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, or `None` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    /// Record a frame. The echo of the awaited code is kept as the last element.
    pub fn offer(&mut self, frame: Frame) -> Verdict {
        let is_echo = frame.command == self.command;
        self.collected.push(frame);
        if is_echo {
            Verdict::Complete
        } else {
            Verdict::Pending
        }
    }

    /// Frames received so far, in arrival order.
    pub fn collected(&self) -> &[Frame] {
        &self.collected
    }

    pub fn into_frames(self) -> Vec<Frame> {
        self.collected
    }
}

/// Waits for exactly one frame echoing the awaited code.
#[derive(Debug)]
pub struct StrictMatcher<'a> {
    command: CommandCode,
    chatter: &'a [CommandCode],
    budget: usize,
    mismatches: usize,
}

impl<'a> StrictMatcher<'a> {
    pub fn new(command: CommandCode, chatter: &'a [CommandCode], budget: usize) -> Self {
        Self {
            command,
            chatter,
            budget,
            mismatches: 0,
        }
    }

    /// Offer a frame.
    ///
    /// Returns the frame once it matches, `Ok(None)` to keep reading, or
    /// [`SessionError::TooManyMismatches`] when the budget is exhausted.
    pub fn offer(&mut self, frame: Frame) -> Result<Option<Frame>> {
        if frame.command == self.command {
            return Ok(Some(frame));
        }
        if self.chatter.contains(&frame.command) {
            debug!(command = %frame.command, awaited = %self.command, "discarding chatter");
            return Ok(None);
        }
        self.mismatch()?;
        Ok(None)
    }

    /// Count a frame that could not be decoded against the budget.
    pub fn offer_invalid(&mut self) -> Result<()> {
        self.mismatch()
    }

    pub fn mismatches(&self) -> usize {
        self.mismatches
    }

    fn mismatch(&mut self) -> Result<()> {
        self.mismatches += 1;
        if self.mismatches > self.budget {
            return Err(SessionError::TooManyMismatches {
                command: self.command,
                mismatches: self.mismatches,
            });
        }
        Ok(())
    }
}

/// A blocking supply of decoded frames.
pub trait FrameSource {
    /// Wait up to `wait` for the next frame.
    ///
    /// `Ok(None)` means nothing arrived in time. Structural decode failures
    /// are returned as errors for which [`FrameError::is_decode_failure`] is
    /// true; any other error ends the exchange.
    fn next_frame(&mut self, wait: Duration) -> std::result::Result<Option<Frame>, FrameError>;
}

/// Collect every frame until the awaited code is echoed or time runs out.
///
/// Frames that fail to decode are logged and skipped.
pub fn collect_all<S: FrameSource + ?Sized>(
    source: &mut S,
    mut request: OutstandingRequest,
) -> Result<Vec<Frame>> {
    while let Some(wait) = request.remaining() {
        match source.next_frame(wait) {
            Ok(Some(frame)) => {
                if request.offer(frame) == Verdict::Complete {
                    break;
                }
            }
            Ok(None) => break,
            Err(err) if err.is_decode_failure() => {
                warn!(command = %request.command(), error = %err, "skipping invalid frame");
            }
            Err(err) => return Err(SessionError::from_io(err)),
        }
    }
    debug!(
        command = %request.command(),
        frames = request.collected().len(),
        "collection finished"
    );
    Ok(request.into_frames())
}

/// Wait for the exact echo of the awaited code.
pub fn collect_exact<S: FrameSource + ?Sized>(
    source: &mut S,
    request: OutstandingRequest,
    matcher: &mut StrictMatcher<'_>,
) -> Result<Frame> {
    while let Some(wait) = request.remaining() {
        match source.next_frame(wait) {
            Ok(Some(frame)) => {
                if let Some(frame) = matcher.offer(frame)? {
                    return Ok(frame);
                }
            }
            Ok(None) => break,
            Err(err) if err.is_decode_failure() => {
                warn!(
                    command = %request.command(),
                    error = %err,
                    "invalid frame while awaiting echo"
                );
                matcher.offer_invalid()?;
            }
            Err(err) => return Err(SessionError::from_io(err)),
        }
    }
    Err(SessionError::Timeout {
        command: request.command(),
        timeout: request.timeout(),
    })
}
