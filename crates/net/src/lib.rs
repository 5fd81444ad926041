#![warn(missing_docs)]
//! Wire layer for the holdfast client: text frames in, text frames out.

mod bits;
mod command;
mod frame;
mod outbound;

pub use bits::{CombatStateByte, PlayerStateFlags, SiteMask, SITE_COUNT};
pub use command::{
    ArgCount, BuildingMasks, CombatReport, DecodeError, FullState, OwnershipMasks,
    ResourceCounts, ServerCommand,
};
pub use frame::{
    encode_frame, parse_frame, Frame, FrameBuffer, FramingMode, FIELD_DELIMITER,
    FRAME_TERMINATOR, MAX_FRAME_LEN,
};
pub use outbound::{
    is_direct, wire_message, ClientCommand, Improvement, OutboundQueue, CLIENT_DATA_PREFIX,
    DIRECT_COMMANDS,
};

use serde::{Deserialize, Serialize};

/// Integer pixel-space coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

impl Point {
    /// Construct a point.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    ///
    /// Computed in 64-bit so any pair of wire coordinates is valid.
    pub fn distance(self, other: Point) -> f32 {
        let dx = (i64::from(other.x) - i64::from(self.x)) as f64;
        let dy = (i64::from(other.y) - i64::from(self.y)) as f64;
        (dx * dx + dy * dy).sqrt() as f32
    }
}
