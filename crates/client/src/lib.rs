#![warn(missing_docs)]
//! Client core: decoded server frames in, predicted game state out.

mod combat;
mod dispatch;
mod intent;
mod prediction;
mod shared;
mod state;

pub use combat::{ActionKind, CombatState, RETREAT_COUNTDOWN};
pub use dispatch::Applied;
pub use intent::{IntentRejected, PlayerIntent};
pub use prediction::{
    integrate_movement, update_capture, MovePrediction, PredictionMetrics,
    ReconciliationResult, ARRIVAL_SNAP_DISTANCE, CAPTURE_DURATION, MAX_FRAME_DT,
    MOVEMENT_SPEED, RECONCILIATION_THRESHOLD, SITE_PROXIMITY,
};
pub use shared::{ReceiveOutcome, SharedClient};
pub use state::{GameSnapshot, GameState, Owner, Phase, Player, Site, ROOM_CAPACITY, ROOM_COUNT};

use holdfast_net::{parse_frame, DecodeError, Frame, OutboundQueue, ServerCommand};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Delta-time reported with moves issued before the first frame (seconds).
const INITIAL_FRAME_DT: f32 = 0.016;

/// Single-owner client: game state plus the queue it feeds.
///
/// Wrap in [`SharedClient`] to use it from several threads.
#[derive(Debug)]
pub struct Client {
    state: GameState,
    outbound: Arc<OutboundQueue>,
    last_dt: f32,
}

impl Client {
    /// Create a client that assumes it is `local_player` until a room says otherwise.
    pub fn new(local_player: u8) -> Self {
        Self::with_queue(local_player, Arc::new(OutboundQueue::new()))
    }

    /// Create a client feeding an existing outbound queue.
    pub fn with_queue(local_player: u8, outbound: Arc<OutboundQueue>) -> Self {
        debug!(local_player, "Client initialized; waiting for lobby information");
        Self {
            state: GameState::new(local_player),
            outbound,
            last_dt: INITIAL_FRAME_DT,
        }
    }

    /// Read-only view of the game state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Copy of the collaborator-facing state.
    pub fn snapshot(&self) -> GameSnapshot {
        self.state.snapshot()
    }

    /// Queue drained by the send activity.
    pub fn outbound(&self) -> &Arc<OutboundQueue> {
        &self.outbound
    }

    /// Parse and apply one raw text line.
    pub fn handle_line(&mut self, line: &str) -> Applied {
        match parse_frame(line) {
            Some(frame) => self.handle_frame(&frame),
            None => {
                trace!("Ignoring empty line");
                Applied::Ignored
            }
        }
    }

    /// Decode and apply one frame; undecodable frames leave state untouched.
    pub fn handle_frame(&mut self, frame: &Frame) -> Applied {
        trace!(command = %frame.command, args = frame.arg_count(), "Frame received");
        match ServerCommand::decode(frame) {
            Ok(command) => self.state.apply(command),
            Err(err @ DecodeError::Unknown { .. }) => {
                debug!(%err, "Ignoring frame");
                Applied::Ignored
            }
            Err(err) => {
                warn!(%err, "Skipping malformed frame");
                Applied::Ignored
            }
        }
    }

    /// Run one frame of local simulation.
    pub fn tick(&mut self, dt: f32) {
        self.last_dt = dt.clamp(0.0, MAX_FRAME_DT);
        self.state.advance(dt);
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(1)
    }
}
