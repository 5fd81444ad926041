//! Client-side prediction and server reconciliation.
//!
//! The local player starts moving as soon as a move is issued. Later
//! `POSITIONS` reports correct any player whose tracked position has drifted
//! too far, except the local player while it is still mid-prediction.

use crate::state::{GameState, Phase, Player};
use holdfast_net::Point;
use serde::Serialize;
use tracing::{debug, warn};

/// Travel speed in distance units per second.
pub const MOVEMENT_SPEED: f32 = 300.0;

/// Remaining distance below which a mover snaps onto its target.
pub const ARRIVAL_SNAP_DISTANCE: f32 = 5.0;

/// Divergence above which a server position overrides the local one.
pub const RECONCILIATION_THRESHOLD: f32 = 50.0;

/// Radius within which a resting player occupies a site.
pub const SITE_PROXIMITY: f32 = 50.0;

/// Seconds of capturing for the local estimate to reach 1.0.
pub const CAPTURE_DURATION: f32 = 10.0;

/// Largest delta-time a single frame may advance (seconds).
pub const MAX_FRAME_DT: f32 = 0.05;

/// A speculative move applied before the server confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePrediction {
    /// Site the move heads for.
    pub site: usize,
    /// Centre of that site.
    pub target: Point,
}

/// Outcome of reconciling one player against a server position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconciliationResult {
    /// Within tolerance; nothing changed.
    Match {
        /// Distance between local and server positions.
        divergence: f32,
    },
    /// Local player is mid-prediction; correction deferred.
    Deferred,
    /// Position snapped to the server value.
    Corrected {
        /// Position before the snap.
        from: Point,
        /// Server position.
        to: Point,
        /// Distance that triggered the snap.
        divergence: f32,
    },
}

/// Counters for prediction accuracy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PredictionMetrics {
    /// Moves predicted locally.
    pub total_predictions: u64,
    /// Reconciliation passes processed.
    pub total_reconciliations: u64,
    /// Positions snapped to the server value.
    pub total_corrections: u64,
    /// Largest divergence that caused a snap.
    pub max_correction: f32,
}

/// Step `player` toward its target by `dt` seconds.
///
/// Each axis advances by `direction * speed * dt`, truncated toward zero. A
/// step that would pass the target stops on it.
pub fn integrate_movement(player: &mut Player, dt: f32) {
    if !player.moving {
        return;
    }

    let remaining = player.position.distance(player.target);
    if remaining < ARRIVAL_SNAP_DISTANCE {
        player.position = player.target;
        player.moving = false;
        return;
    }

    // Land on the target instead of overshooting; arrival is declared next frame.
    if MOVEMENT_SPEED * dt >= remaining {
        player.position = player.target;
        return;
    }

    let dx = (i64::from(player.target.x) - i64::from(player.position.x)) as f32;
    let dy = (i64::from(player.target.y) - i64::from(player.position.y)) as f32;
    let step_x = (dx / remaining) * MOVEMENT_SPEED * dt;
    let step_y = (dy / remaining) * MOVEMENT_SPEED * dt;
    player.position.x = offset(player.position.x, step_x);
    player.position.y = offset(player.position.y, step_y);
}

/// `coord + step` truncated toward zero, saturating at the `i32` range.
fn offset(coord: i32, step: f32) -> i32 {
    let moved = i64::from(coord) + step as i64;
    moved.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

/// Advance or reset the local capture estimate.
pub fn update_capture(player: &mut Player, dt: f32) {
    if player.capturing {
        player.capture_progress = (player.capture_progress + dt / CAPTURE_DURATION).min(1.0);
    } else {
        player.capture_progress = 0.0;
    }
}

impl GameState {
    /// Start moving the local player toward the site nearest `click`.
    ///
    /// Returns `None` until sites are known.
    pub fn predict_move(&mut self, click: Point) -> Option<MovePrediction> {
        let site = self.closest_site(click)?;
        let target = self.sites.get(site)?.center;

        let player = self.local_player_mut();
        player.target = target;
        player.moving = true;
        let number = player.number;
        self.metrics.total_predictions += 1;

        debug!(player = number, site, x = target.x, y = target.y, "Predicted move");
        Some(MovePrediction { site, target })
    }

    /// Recompute which site each resting player stands on.
    ///
    /// A moving player is always off-site.
    pub fn update_occupancy(&mut self) {
        if !self.sites_ready() {
            return;
        }
        for index in 0..self.players.len() {
            let player = &self.players[index];
            let occupied = if player.moving {
                None
            } else {
                self.closest_site(player.position).filter(|&site| {
                    player.position.distance(self.sites[site].center) < SITE_PROXIMITY
                })
            };
            self.players[index].current_site = occupied;
        }
    }

    /// Compare tracked positions with authoritative ones.
    ///
    /// A player is snapped when it diverges by more than
    /// [`RECONCILIATION_THRESHOLD`], unless it is the local player and still
    /// moving. Targets are left untouched.
    pub fn reconcile(&mut self, server: [Point; 2]) -> [ReconciliationResult; 2] {
        self.metrics.total_reconciliations += 1;
        let local = self.local_player;

        let mut results = [ReconciliationResult::Deferred; 2];
        for (index, player) in self.players.iter_mut().enumerate() {
            let reported = server[index];
            if player.number == local && player.moving {
                results[index] = ReconciliationResult::Deferred;
                continue;
            }

            let divergence = player.position.distance(reported);
            if divergence > RECONCILIATION_THRESHOLD {
                let from = player.position;
                player.position = reported;
                warn!(
                    player = player.number,
                    divergence,
                    "Position corrected by server"
                );
                self.metrics.total_corrections += 1;
                self.metrics.max_correction = self.metrics.max_correction.max(divergence);
                results[index] = ReconciliationResult::Corrected {
                    from,
                    to: reported,
                    divergence,
                };
            } else {
                results[index] = ReconciliationResult::Match { divergence };
            }
        }
        results
    }

    /// Run one frame of local simulation.
    ///
    /// Does nothing outside [`Phase::Playing`]. `dt` is clamped to
    /// [`MAX_FRAME_DT`].
    pub fn advance(&mut self, dt: f32) {
        if self.phase != Phase::Playing {
            return;
        }
        let dt = dt.clamp(0.0, MAX_FRAME_DT);

        self.combat.tick(dt);
        for player in &mut self.players {
            integrate_movement(player, dt);
        }
        self.update_occupancy();
        for player in &mut self.players {
            update_capture(player, dt);
        }
    }

    /// Prediction accuracy counters.
    pub fn prediction_metrics(&self) -> &PredictionMetrics {
        &self.metrics
    }
}
