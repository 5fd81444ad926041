//! Typed inbound commands.
//!
//! Decoding is all-or-nothing: every field of a frame is parsed before a
//! command is produced, so a malformed field never leaves state half-updated.

use crate::bits::{CombatStateByte, PlayerStateFlags, SiteMask, SITE_COUNT};
use crate::frame::Frame;
use crate::Point;
use std::fmt;
use thiserror::Error;

/// Argument count rule for a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCount {
    /// Exactly `n` arguments.
    Exactly(usize),
    /// At least `n` arguments; extras are ignored.
    AtLeast(usize),
}

impl ArgCount {
    fn accepts(self, found: usize) -> bool {
        match self {
            ArgCount::Exactly(n) => found == n,
            ArgCount::AtLeast(n) => found >= n,
        }
    }
}

impl fmt::Display for ArgCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgCount::Exactly(n) => write!(f, "exactly {n}"),
            ArgCount::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Why a frame did not become a [`ServerCommand`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Command name not part of the protocol.
    #[error("unknown command {command:?}")]
    Unknown {
        /// Name as received.
        command: String,
    },
    /// Recognized command with an unusable argument count.
    #[error("{command} expects {expected} arguments, got {found}")]
    ArgCount {
        /// Command name.
        command: &'static str,
        /// Rule the command enforces.
        expected: ArgCount,
        /// Arguments present.
        found: usize,
    },
    /// An argument that should be numeric is not.
    #[error("{command} argument {index} is not a valid number: {value:?}")]
    InvalidNumber {
        /// Command name.
        command: &'static str,
        /// Zero-based argument index.
        index: usize,
        /// Offending text.
        value: String,
    },
}

/// Ownership masks for both players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnershipMasks {
    /// Sites owned by player 1.
    pub player1: SiteMask,
    /// Sites owned by player 2.
    pub player2: SiteMask,
}

/// Improvement masks, one bit per site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildingMasks {
    /// Sites with a castle.
    pub castles: SiteMask,
    /// Sites with a gold mine.
    pub gold_mines: SiteMask,
    /// Sites with barracks.
    pub barracks: SiteMask,
}

/// Gold and levy counters for both players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResourceCounts {
    /// Player 1 gold.
    pub player1_gold: i32,
    /// Player 1 levies.
    pub player1_levies: i32,
    /// Player 2 gold.
    pub player2_gold: i32,
    /// Player 2 levies.
    pub player2_levies: i32,
}

/// Authoritative combat report: packed state plus elapsed seconds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CombatReport {
    /// Packed state byte.
    pub state: CombatStateByte,
    /// Server timer in seconds.
    pub timer: f32,
}

/// Snapshot carried by `FULL_STATE`.
#[derive(Debug, Clone, PartialEq)]
pub struct FullState {
    /// Ownership (args 0-1).
    pub ownership: OwnershipMasks,
    /// Improvements (args 2-4).
    pub buildings: BuildingMasks,
    /// Player flags (arg 5).
    pub player_states: PlayerStateFlags,
    /// Scores (args 6-7).
    pub scores: [i32; 2],
    /// Resources (args 8-11).
    pub resources: ResourceCounts,
    /// Movement targets of player 1 and 2 (args 12-15).
    pub targets: [Point; 2],
    /// Combat (args 16-17).
    pub combat: CombatReport,
}

/// A decoded server frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommand {
    /// `LOBBY_INFO`: occupancy of the three rooms.
    LobbyInfo {
        /// Joined players per room.
        rooms: [i32; 3],
    },
    /// `JOINED_ROOM`: join accepted.
    JoinedRoom {
        /// Room index.
        room: i32,
        /// Player number assigned to this client.
        player: i32,
    },
    /// `ROOM_FULL`: join rejected.
    RoomFull {
        /// Room index.
        room: i32,
    },
    /// `GAME_START`.
    GameStart,
    /// `SITE_POSITIONS`: centres of all eight sites.
    SitePositions {
        /// Site centres in index order.
        centers: [Point; SITE_COUNT],
    },
    /// `OWNERSHIP`.
    Ownership(OwnershipMasks),
    /// `SCORES`.
    Scores {
        /// Player 1 and 2 scores.
        scores: [i32; 2],
    },
    /// `RESOURCES`.
    Resources(ResourceCounts),
    /// `PLAYER_POS`: position report for one player.
    PlayerPos {
        /// Reported player number.
        player: i32,
        /// Reported position.
        position: Point,
    },
    /// `BUILDINGS`.
    Buildings(BuildingMasks),
    /// `PLAYER_STATES`.
    PlayerStates(PlayerStateFlags),
    /// `COMBAT_STATE`.
    CombatState(CombatReport),
    /// `FULL_STATE`.
    FullState(Box<FullState>),
    /// `GAME_OVER`.
    GameOver {
        /// Winning player number.
        winner: i32,
    },
    /// `COMBAT_START`.
    CombatStart {
        /// Contested site.
        site: i32,
    },
    /// `COMBAT_INTERRUPT`.
    CombatInterrupt,
    /// `COMBAT_END`.
    CombatEnd {
        /// Victorious player number.
        victor: i32,
    },
    /// `RETREAT`: informational echo.
    Retreat {
        /// Retreating player.
        player: i32,
        /// Destination site.
        site: i32,
    },
    /// `POSITIONS`: authoritative positions for reconciliation.
    Positions {
        /// Player 1 and 2 positions.
        positions: [Point; 2],
    },
    /// `exit`: stop the receive path.
    Exit,
}

impl ServerCommand {
    /// Decode a parsed frame into a typed command.
    pub fn decode(frame: &Frame) -> Result<Self, DecodeError> {
        let command = match frame.command.as_str() {
            "LOBBY_INFO" => {
                let args = Args::check(frame, "LOBBY_INFO", ArgCount::Exactly(3))?;
                ServerCommand::LobbyInfo {
                    rooms: [args.int(0)?, args.int(1)?, args.int(2)?],
                }
            }
            "JOINED_ROOM" => {
                let args = Args::check(frame, "JOINED_ROOM", ArgCount::AtLeast(2))?;
                ServerCommand::JoinedRoom {
                    room: args.int(0)?,
                    player: args.int(1)?,
                }
            }
            "ROOM_FULL" => {
                let args = Args::check(frame, "ROOM_FULL", ArgCount::AtLeast(1))?;
                ServerCommand::RoomFull { room: args.int(0)? }
            }
            "GAME_START" => ServerCommand::GameStart,
            "SITE_POSITIONS" => {
                let args = Args::check(frame, "SITE_POSITIONS", ArgCount::Exactly(16))?;
                let mut centers = [Point::default(); SITE_COUNT];
                for (i, center) in centers.iter_mut().enumerate() {
                    *center = args.point(i * 2)?;
                }
                ServerCommand::SitePositions { centers }
            }
            "OWNERSHIP" => {
                let args = Args::check(frame, "OWNERSHIP", ArgCount::AtLeast(2))?;
                ServerCommand::Ownership(args.ownership(0)?)
            }
            "SCORES" => {
                let args = Args::check(frame, "SCORES", ArgCount::Exactly(2))?;
                ServerCommand::Scores {
                    scores: [args.int(0)?, args.int(1)?],
                }
            }
            "RESOURCES" => {
                let args = Args::check(frame, "RESOURCES", ArgCount::AtLeast(4))?;
                ServerCommand::Resources(args.resources(0)?)
            }
            "PLAYER_POS" => {
                let args = Args::check(frame, "PLAYER_POS", ArgCount::AtLeast(3))?;
                ServerCommand::PlayerPos {
                    player: args.int(0)?,
                    position: args.point(1)?,
                }
            }
            "BUILDINGS" => {
                let args = Args::check(frame, "BUILDINGS", ArgCount::AtLeast(3))?;
                ServerCommand::Buildings(args.buildings(0)?)
            }
            "PLAYER_STATES" => {
                let args = Args::check(frame, "PLAYER_STATES", ArgCount::AtLeast(1))?;
                ServerCommand::PlayerStates(PlayerStateFlags::from_wire(args.byte(0)?))
            }
            "COMBAT_STATE" => {
                let args = Args::check(frame, "COMBAT_STATE", ArgCount::AtLeast(2))?;
                ServerCommand::CombatState(args.combat(0)?)
            }
            "FULL_STATE" => {
                let args = Args::check(frame, "FULL_STATE", ArgCount::AtLeast(18))?;
                ServerCommand::FullState(Box::new(FullState {
                    ownership: args.ownership(0)?,
                    buildings: args.buildings(2)?,
                    player_states: PlayerStateFlags::from_wire(args.byte(5)?),
                    scores: [args.int(6)?, args.int(7)?],
                    resources: args.resources(8)?,
                    targets: [args.point(12)?, args.point(14)?],
                    combat: args.combat(16)?,
                }))
            }
            "GAME_OVER" => {
                let args = Args::check(frame, "GAME_OVER", ArgCount::AtLeast(1))?;
                ServerCommand::GameOver {
                    winner: args.int(0)?,
                }
            }
            "COMBAT_START" => {
                let args = Args::check(frame, "COMBAT_START", ArgCount::AtLeast(1))?;
                ServerCommand::CombatStart { site: args.int(0)? }
            }
            "COMBAT_INTERRUPT" => ServerCommand::CombatInterrupt,
            "COMBAT_END" => {
                let args = Args::check(frame, "COMBAT_END", ArgCount::AtLeast(1))?;
                ServerCommand::CombatEnd {
                    victor: args.int(0)?,
                }
            }
            "RETREAT" => {
                let args = Args::check(frame, "RETREAT", ArgCount::AtLeast(2))?;
                ServerCommand::Retreat {
                    player: args.int(0)?,
                    site: args.int(1)?,
                }
            }
            "POSITIONS" => {
                let args = Args::check(frame, "POSITIONS", ArgCount::AtLeast(4))?;
                ServerCommand::Positions {
                    positions: [args.point(0)?, args.point(2)?],
                }
            }
            "exit" => ServerCommand::Exit,
            other => {
                return Err(DecodeError::Unknown {
                    command: other.to_owned(),
                })
            }
        };
        Ok(command)
    }

    /// Wire name of this command.
    pub fn name(&self) -> &'static str {
        match self {
            ServerCommand::LobbyInfo { .. } => "LOBBY_INFO",
            ServerCommand::JoinedRoom { .. } => "JOINED_ROOM",
            ServerCommand::RoomFull { .. } => "ROOM_FULL",
            ServerCommand::GameStart => "GAME_START",
            ServerCommand::SitePositions { .. } => "SITE_POSITIONS",
            ServerCommand::Ownership(_) => "OWNERSHIP",
            ServerCommand::Scores { .. } => "SCORES",
            ServerCommand::Resources(_) => "RESOURCES",
            ServerCommand::PlayerPos { .. } => "PLAYER_POS",
            ServerCommand::Buildings(_) => "BUILDINGS",
            ServerCommand::PlayerStates(_) => "PLAYER_STATES",
            ServerCommand::CombatState(_) => "COMBAT_STATE",
            ServerCommand::FullState(_) => "FULL_STATE",
            ServerCommand::GameOver { .. } => "GAME_OVER",
            ServerCommand::CombatStart { .. } => "COMBAT_START",
            ServerCommand::CombatInterrupt => "COMBAT_INTERRUPT",
            ServerCommand::CombatEnd { .. } => "COMBAT_END",
            ServerCommand::Retreat { .. } => "RETREAT",
            ServerCommand::Positions { .. } => "POSITIONS",
            ServerCommand::Exit => "exit",
        }
    }
}

/// Argument accessor bound to one frame.
struct Args<'a> {
    command: &'static str,
    frame: &'a Frame,
}

impl<'a> Args<'a> {
    fn check(frame: &'a Frame, command: &'static str, rule: ArgCount) -> Result<Self, DecodeError> {
        let found = frame.arg_count();
        if !rule.accepts(found) {
            return Err(DecodeError::ArgCount {
                command,
                expected: rule,
                found,
            });
        }
        Ok(Self { command, frame })
    }

    fn raw(&self, index: usize) -> &'a str {
        self.frame.arg(index).unwrap_or_default()
    }

    fn invalid(&self, index: usize) -> DecodeError {
        DecodeError::InvalidNumber {
            command: self.command,
            index,
            value: self.raw(index).to_owned(),
        }
    }

    fn int(&self, index: usize) -> Result<i32, DecodeError> {
        self.raw(index)
            .trim()
            .parse::<i32>()
            .map_err(|_| self.invalid(index))
    }

    /// Packed fields are truncated to their low eight bits.
    fn byte(&self, index: usize) -> Result<u8, DecodeError> {
        self.int(index).map(|value| value as u8)
    }

    fn mask(&self, index: usize) -> Result<SiteMask, DecodeError> {
        self.byte(index).map(SiteMask::from_bits)
    }

    fn float(&self, index: usize) -> Result<f32, DecodeError> {
        match self.raw(index).trim().parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(self.invalid(index)),
        }
    }

    fn point(&self, index: usize) -> Result<Point, DecodeError> {
        Ok(Point::new(self.int(index)?, self.int(index + 1)?))
    }

    fn ownership(&self, index: usize) -> Result<OwnershipMasks, DecodeError> {
        Ok(OwnershipMasks {
            player1: self.mask(index)?,
            player2: self.mask(index + 1)?,
        })
    }

    fn buildings(&self, index: usize) -> Result<BuildingMasks, DecodeError> {
        Ok(BuildingMasks {
            castles: self.mask(index)?,
            gold_mines: self.mask(index + 1)?,
            barracks: self.mask(index + 2)?,
        })
    }

    fn resources(&self, index: usize) -> Result<ResourceCounts, DecodeError> {
        Ok(ResourceCounts {
            player1_gold: self.int(index)?,
            player1_levies: self.int(index + 1)?,
            player2_gold: self.int(index + 2)?,
            player2_levies: self.int(index + 3)?,
        })
    }

    fn combat(&self, index: usize) -> Result<CombatReport, DecodeError> {
        Ok(CombatReport {
            state: CombatStateByte::from_bits(self.byte(index)?),
            timer: self.float(index + 1)?,
        })
    }
}
