//! Combat sub-state-machine.
//!
//! The retreat countdown runs locally off frame delta-time so the server does
//! not need to send per-tick timer updates. Any authoritative report
//! overwrites the local estimate.

use holdfast_net::CombatReport;

/// Seconds of combat before retreat becomes possible.
pub const RETREAT_COUNTDOWN: f32 = 5.0;

/// Kinds of player action gated by combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Join a lobby room.
    JoinRoom,
    /// Move toward a site.
    Move,
    /// Build an improvement.
    Build,
    /// Leave combat.
    Retreat,
}

/// Combat state. Site, timer and retreat eligibility exist only in combat.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CombatState {
    /// No combat.
    #[default]
    Idle,
    /// Combat in progress.
    InCombat {
        /// Contested site; unknown when combat was only flagged by `PLAYER_STATES`.
        site: Option<u8>,
        /// Seconds elapsed.
        timer: f32,
        /// Whether the local player may retreat.
        can_retreat: bool,
    },
}

impl CombatState {
    /// Enter combat at `site` with a fresh countdown.
    pub fn start(&mut self, site: u8) {
        *self = CombatState::InCombat {
            site: Some(site),
            timer: 0.0,
            can_retreat: false,
        };
    }

    /// Leave combat, clearing site, timer and retreat together.
    pub fn end(&mut self) {
        *self = CombatState::Idle;
    }

    /// Advance the local countdown.
    pub fn tick(&mut self, dt: f32) {
        if let CombatState::InCombat {
            timer, can_retreat, ..
        } = self
        {
            *timer += dt;
            if *timer >= RETREAT_COUNTDOWN {
                *can_retreat = true;
            }
        }
    }

    /// Overwrite with an authoritative `COMBAT_STATE` report.
    pub fn apply_report(&mut self, report: CombatReport) {
        *self = match report.state.site() {
            Some(site) => CombatState::InCombat {
                site: Some(site),
                timer: report.timer,
                can_retreat: report.state.can_retreat(),
            },
            None => CombatState::Idle,
        };
    }

    /// Apply the combat bit of `PLAYER_STATES`.
    ///
    /// Setting it while already in combat keeps the current details.
    pub fn set_flag(&mut self, in_combat: bool) {
        match (in_combat, self.in_combat()) {
            (true, false) => {
                *self = CombatState::InCombat {
                    site: None,
                    timer: 0.0,
                    can_retreat: false,
                }
            }
            (false, true) => self.end(),
            _ => {}
        }
    }

    /// Whether combat is in progress.
    pub fn in_combat(&self) -> bool {
        matches!(self, CombatState::InCombat { .. })
    }

    /// Contested site, if known.
    pub fn site(&self) -> Option<u8> {
        match self {
            CombatState::InCombat { site, .. } => *site,
            CombatState::Idle => None,
        }
    }

    /// Contested site as a wire-style index, `-1` when none.
    pub fn site_index(&self) -> i32 {
        self.site().map_or(-1, i32::from)
    }

    /// Seconds elapsed; zero outside combat.
    pub fn timer(&self) -> f32 {
        match self {
            CombatState::InCombat { timer, .. } => *timer,
            CombatState::Idle => 0.0,
        }
    }

    /// Whether retreat is allowed.
    pub fn can_retreat(&self) -> bool {
        matches!(
            self,
            CombatState::InCombat {
                can_retreat: true,
                ..
            }
        )
    }

    /// Whether `action` may be issued in the current state.
    ///
    /// In combat only an eligible retreat goes through; outside combat
    /// everything but retreat does.
    pub fn permits(&self, action: ActionKind) -> bool {
        match action {
            ActionKind::Retreat => self.can_retreat(),
            _ => !self.in_combat(),
        }
    }
}
