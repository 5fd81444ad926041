//! Text frame parsing and delimiting.
//!
//! Frames look like `COMMAND,arg1,arg2,...,argN`. The server protocol has no
//! length prefix, so frames are delimited by `\n` here. Servers that write
//! exactly one frame per transport write can be read with
//! [`FramingMode::ReadBoundary`], which treats every read as a boundary.

use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Field separator inside a frame.
pub const FIELD_DELIMITER: char = ',';

/// Frame terminator appended by [`encode_frame`].
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Largest partial frame kept while waiting for a terminator (bytes).
pub const MAX_FRAME_LEN: usize = 1024;

/// A command token plus its ordered, uninterpreted arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command name (first token).
    pub command: String,
    /// Remaining tokens in wire order.
    pub args: Vec<String>,
}

impl Frame {
    /// Number of arguments after the command token.
    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Borrow argument `index` if present.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).map(String::as_str)
    }
}

/// Split a raw line into a [`Frame`].
///
/// Empty tokens are dropped, so `"GAME_START,"` is a zero-argument frame.
/// Returns `None` when the line carries no command token at all.
pub fn parse_frame(line: &str) -> Option<Frame> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut tokens = line
        .split(FIELD_DELIMITER)
        .filter(|token| !token.is_empty());

    let command = tokens.next()?.trim();
    if command.is_empty() {
        return None;
    }

    Some(Frame {
        command: command.to_owned(),
        args: tokens.map(str::to_owned).collect(),
    })
}

/// Append the frame terminator to an outgoing message.
pub fn encode_frame(message: &str) -> String {
    let mut framed = String::with_capacity(message.len() + 1);
    framed.push_str(message);
    framed.push(FRAME_TERMINATOR as char);
    framed
}

/// How transport reads map onto frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingMode {
    /// Frames end at `\n`; reads may split or coalesce frames.
    #[default]
    Newline,
    /// Every transport read also ends a frame.
    ReadBoundary,
}

/// Reassembles frames from arbitrary transport reads.
#[derive(Debug)]
pub struct FrameBuffer {
    mode: FramingMode,
    pending: Vec<u8>,
    /// Skipping the rest of an oversized line.
    discarding: bool,
    dropped: u64,
}

impl FrameBuffer {
    /// Create an empty buffer using `mode`.
    pub fn new(mode: FramingMode) -> Self {
        Self {
            mode,
            pending: Vec::with_capacity(MAX_FRAME_LEN),
            discarding: false,
            dropped: 0,
        }
    }

    /// Feed one transport read and collect every frame it completes.
    ///
    /// Lines without a command token are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in bytes {
            if byte == FRAME_TERMINATOR {
                if self.discarding {
                    self.discarding = false;
                } else {
                    self.take_pending(&mut frames);
                }
                continue;
            }
            if byte == 0 || self.discarding {
                continue;
            }
            if self.pending.len() >= MAX_FRAME_LEN {
                warn!(
                    len = self.pending.len(),
                    "Discarding oversized frame up to the next terminator"
                );
                self.pending.clear();
                self.discarding = true;
                self.dropped += 1;
                continue;
            }
            self.pending.push(byte);
        }

        if self.mode == FramingMode::ReadBoundary {
            self.discarding = false;
            self.take_pending(&mut frames);
        }

        frames
    }

    /// Emit whatever is buffered as a final frame (stream closed).
    pub fn finish(&mut self) -> Option<Frame> {
        self.discarding = false;
        let mut frames = Vec::with_capacity(1);
        self.take_pending(&mut frames);
        frames.pop()
    }

    /// Bytes currently waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of oversized partial frames discarded so far.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    fn take_pending(&mut self, frames: &mut Vec<Frame>) {
        if self.pending.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        match parse_frame(&line) {
            Some(frame) => {
                trace!(command = %frame.command, args = frame.args.len(), "Frame assembled");
                frames.push(frame);
            }
            None => trace!("Skipping empty frame"),
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(FramingMode::default())
    }
}
