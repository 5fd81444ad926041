//! Outgoing message formatting and the send queue.

use crate::Point;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Prefix for client messages the server does not treat as directives.
pub const CLIENT_DATA_PREFIX: &str = "CLIENT_DATA";

/// Commands the server understands directly; these are never wrapped.
pub const DIRECT_COMMANDS: [&str; 6] = [
    "JOIN_ROOM",
    "PLAYER_CURRENT_POS",
    "BUILD_CASTLE",
    "BUILD_GOLD_MINE",
    "BUILD_BARRACKS",
    "RETREAT",
];

/// Site improvement a player can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Improvement {
    /// Castle.
    Castle,
    /// Gold mine.
    GoldMine,
    /// Barracks.
    Barracks,
}

impl Improvement {
    /// Wire command that requests this improvement.
    pub fn command_name(self) -> &'static str {
        match self {
            Improvement::Castle => "BUILD_CASTLE",
            Improvement::GoldMine => "BUILD_GOLD_MINE",
            Improvement::Barracks => "BUILD_BARRACKS",
        }
    }
}

/// A message the client sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    /// Ask to join a lobby room.
    JoinRoom {
        /// Room index.
        room: u8,
    },
    /// Movement intent toward a site centre.
    Move {
        /// Local player number.
        player: u8,
        /// Target position.
        target: Point,
        /// Frame delta-time when the intent was issued.
        dt: f32,
    },
    /// Build an improvement on a site.
    Build {
        /// Local player number.
        player: u8,
        /// Site index.
        site: u8,
        /// What to build.
        improvement: Improvement,
    },
    /// Leave combat.
    Retreat {
        /// Local player number.
        player: u8,
    },
}

impl fmt::Display for ClientCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCommand::JoinRoom { room } => write!(f, "JOIN_ROOM,{room}"),
            ClientCommand::Move { player, target, dt } => {
                write!(f, "MOVE,{player},{},{},{dt:.6}", target.x, target.y)
            }
            ClientCommand::Build {
                player,
                site,
                improvement,
            } => write!(f, "{},{player},{site}", improvement.command_name()),
            ClientCommand::Retreat { player } => write!(f, "RETREAT,{player}"),
        }
    }
}

/// Whether `message` names a command the server accepts verbatim.
pub fn is_direct(message: &str) -> bool {
    let command = message.split(',').next().unwrap_or_default();
    DIRECT_COMMANDS.contains(&command)
}

/// Final wire text for a queued message.
pub fn wire_message(message: &str) -> String {
    if is_direct(message) {
        message.to_owned()
    } else {
        format!("{CLIENT_DATA_PREFIX},{message}")
    }
}

/// Non-blocking FIFO of outgoing messages.
///
/// Producers push from the frame loop; the send activity drains. Neither
/// side touches game state.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    messages: Mutex<Vec<String>>,
}

impl OutboundQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a typed command.
    pub fn push(&self, command: &ClientCommand) {
        self.push_raw(command.to_string());
    }

    /// Queue arbitrary text; it is wrapped on drain unless direct.
    pub fn push_raw(&self, message: impl Into<String>) {
        let message = message.into();
        debug!(%message, "Queued outbound message");
        self.lock().push(message);
    }

    /// Take every queued message in insertion order, already wrapped.
    pub fn drain(&self) -> Vec<String> {
        let pending = std::mem::take(&mut *self.lock());
        pending.iter().map(|m| wire_message(m)).collect()
    }

    /// Messages waiting to be sent.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("Outbound queue lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}
