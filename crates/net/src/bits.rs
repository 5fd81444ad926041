//! Bit-packed wire fields.
//!
//! Every packed field travels as the decimal value of an 8-bit mask. Bit
//! positions below are part of the wire contract and must not move.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Number of contested sites on the map.
pub const SITE_COUNT: usize = 8;

/// One bit per site; bit `i` is site `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteMask(u8);

impl SiteMask {
    /// No sites set.
    pub const EMPTY: Self = Self(0);

    /// Wrap a raw wire byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw wire byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether `site` is set. Out-of-range sites are never set.
    pub fn contains(self, site: usize) -> bool {
        site < SITE_COUNT && self.0 & (1 << site) != 0
    }

    /// Set `site`; out-of-range indices are ignored.
    pub fn insert(&mut self, site: usize) {
        if site < SITE_COUNT {
            self.0 |= 1 << site;
        }
    }

    /// Clear `site`; out-of-range indices are ignored.
    pub fn remove(&mut self, site: usize) {
        if site < SITE_COUNT {
            self.0 &= !(1 << site);
        }
    }

    /// Sites set in both masks.
    pub fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }

    /// Sites set in `self` but not in `other`.
    pub fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether no site is set.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of sites set.
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Indices of set sites in increasing order.
    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..SITE_COUNT).filter(move |&site| self.contains(site))
    }
}

bitflags! {
    /// Movement, capture and combat flags from `PLAYER_STATES`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PlayerStateFlags: u8 {
        /// Player 1 is moving.
        const P1_MOVING = 1 << 0;
        /// Player 2 is moving.
        const P2_MOVING = 1 << 1;
        /// Player 1 is capturing a site.
        const P1_CAPTURING = 1 << 2;
        /// Player 2 is capturing a site.
        const P2_CAPTURING = 1 << 3;
        /// A combat is in progress.
        const IN_COMBAT = 1 << 4;
    }
}

impl PlayerStateFlags {
    /// Decode a wire byte, dropping undefined bits.
    pub fn from_wire(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }

    /// Whether player `number` (1 or 2) is moving.
    pub fn moving(self, number: u8) -> bool {
        match number {
            1 => self.contains(Self::P1_MOVING),
            2 => self.contains(Self::P2_MOVING),
            _ => false,
        }
    }

    /// Whether player `number` (1 or 2) is capturing.
    pub fn capturing(self, number: u8) -> bool {
        match number {
            1 => self.contains(Self::P1_CAPTURING),
            2 => self.contains(Self::P2_CAPTURING),
            _ => false,
        }
    }

    /// Whether the combat bit is set.
    pub fn in_combat(self) -> bool {
        self.contains(Self::IN_COMBAT)
    }
}

/// The `COMBAT_STATE` byte.
///
/// Layout: bits 0-2 site index, bit 3 in-combat, bit 4 retreat-eligible.
/// The site and retreat bits only mean something while bit 3 is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CombatStateByte(u8);

impl CombatStateByte {
    const SITE_MASK: u8 = 0x07;
    const IN_COMBAT: u8 = 1 << 3;
    const CAN_RETREAT: u8 = 1 << 4;

    /// Wrap a raw wire byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Build the byte for a given combat state.
    pub fn encode(site: Option<u8>, can_retreat: bool) -> Self {
        match site {
            Some(site) => {
                let mut bits = Self::IN_COMBAT | (site & Self::SITE_MASK);
                if can_retreat {
                    bits |= Self::CAN_RETREAT;
                }
                Self(bits)
            }
            None => Self(0),
        }
    }

    /// Raw wire byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Bit 3.
    pub fn in_combat(self) -> bool {
        self.0 & Self::IN_COMBAT != 0
    }

    /// Combat site, only when in combat.
    pub fn site(self) -> Option<u8> {
        self.in_combat().then_some(self.0 & Self::SITE_MASK)
    }

    /// Retreat eligibility; always false outside combat.
    pub fn can_retreat(self) -> bool {
        self.in_combat() && self.0 & Self::CAN_RETREAT != 0
    }
}
