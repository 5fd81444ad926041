//! Player intents: validation against phase and combat, then prediction and
//! outbound messages.

use crate::combat::ActionKind;
use crate::state::{Phase, ROOM_CAPACITY};
use crate::Client;
use holdfast_net::{ClientCommand, Improvement, Point};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Something the local player wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum PlayerIntent {
    /// Join a lobby room.
    JoinRoom {
        /// Room index.
        room: u8,
    },
    /// Move toward the site nearest a map position.
    MoveToward {
        /// Map x.
        x: i32,
        /// Map y.
        y: i32,
    },
    /// Build on the occupied site.
    Build {
        /// Improvement to build.
        improvement: Improvement,
    },
    /// Leave combat.
    Retreat,
}

impl PlayerIntent {
    /// Action class used for combat gating.
    pub fn kind(&self) -> ActionKind {
        match self {
            PlayerIntent::JoinRoom { .. } => ActionKind::JoinRoom,
            PlayerIntent::MoveToward { .. } => ActionKind::Move,
            PlayerIntent::Build { .. } => ActionKind::Build,
            PlayerIntent::Retreat => ActionKind::Retreat,
        }
    }
}

/// Why an intent was not acted on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentRejected {
    /// The match has ended.
    #[error("the game is over")]
    GameOver,
    /// Not available in the current phase.
    #[error("{action:?} is not available while in the {phase:?} phase")]
    WrongPhase {
        /// Current phase.
        phase: Phase,
        /// Attempted action.
        action: ActionKind,
    },
    /// Room index out of range.
    #[error("room {room} does not exist")]
    NoSuchRoom {
        /// Requested room.
        room: u8,
    },
    /// Room already holds two players.
    #[error("room {room} is full")]
    RoomFull {
        /// Requested room.
        room: u8,
    },
    /// Sites have not been received yet.
    #[error("site positions have not arrived")]
    SitesNotReady,
    /// Only retreat is possible during combat.
    #[error("cannot perform actions during combat")]
    InCombat,
    /// Retreat requested outside combat or before the countdown ends.
    #[error("retreat is not available")]
    RetreatUnavailable,
    /// Building needs the local player to stand on a site.
    #[error("the local player is not on a site")]
    NotOnSite,
}

impl Client {
    /// Validate `intent`, apply any local prediction, and queue its message.
    pub fn submit(&mut self, intent: PlayerIntent) -> Result<(), IntentRejected> {
        let result = self.try_submit(intent);
        if let Err(err) = &result {
            debug!(?intent, %err, "Intent rejected");
        }
        result
    }

    fn try_submit(&mut self, intent: PlayerIntent) -> Result<(), IntentRejected> {
        if self.state.is_game_over() {
            return Err(IntentRejected::GameOver);
        }

        let phase = self.state.phase();
        let action = intent.kind();
        match (phase, intent) {
            (Phase::Lobby, PlayerIntent::JoinRoom { room }) => self.join_room(room),
            (Phase::Playing, PlayerIntent::JoinRoom { .. })
            | (Phase::Lobby | Phase::Waiting, _) => {
                Err(IntentRejected::WrongPhase { phase, action })
            }
            (Phase::Playing, intent) => self.play(intent),
        }
    }

    fn join_room(&mut self, room: u8) -> Result<(), IntentRejected> {
        let Some(&count) = self.state.rooms.get(usize::from(room)) else {
            return Err(IntentRejected::NoSuchRoom { room });
        };
        if count >= ROOM_CAPACITY {
            return Err(IntentRejected::RoomFull { room });
        }

        self.outbound.push(&ClientCommand::JoinRoom { room });
        self.state.selected_room = Some(room);
        info!(room, "Requesting to join room");
        Ok(())
    }

    fn play(&mut self, intent: PlayerIntent) -> Result<(), IntentRejected> {
        if !self.state.sites_ready() {
            return Err(IntentRejected::SitesNotReady);
        }

        let combat = *self.state.combat();
        if !combat.permits(intent.kind()) {
            return Err(match intent {
                PlayerIntent::Retreat => IntentRejected::RetreatUnavailable,
                _ => IntentRejected::InCombat,
            });
        }

        let player = self.state.local_player_number();
        match intent {
            PlayerIntent::Retreat => {
                self.outbound.push(&ClientCommand::Retreat { player });
                info!("Requested retreat from combat");
            }
            PlayerIntent::Build { improvement } => {
                let site = self
                    .state
                    .local_player()
                    .current_site
                    .and_then(|site| u8::try_from(site).ok())
                    .ok_or(IntentRejected::NotOnSite)?;
                self.outbound.push(&ClientCommand::Build {
                    player,
                    site,
                    improvement,
                });
                info!(site, ?improvement, "Requested build");
            }
            PlayerIntent::MoveToward { x, y } => {
                let prediction = self
                    .state
                    .predict_move(Point::new(x, y))
                    .ok_or(IntentRejected::SitesNotReady)?;
                self.outbound.push(&ClientCommand::Move {
                    player,
                    target: prediction.target,
                    dt: self.last_dt,
                });
            }
            PlayerIntent::JoinRoom { .. } => {
                return Err(IntentRejected::WrongPhase {
                    phase: Phase::Playing,
                    action: ActionKind::JoinRoom,
                })
            }
        }
        Ok(())
    }
}
