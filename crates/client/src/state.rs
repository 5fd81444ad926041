//! The client's mutable game snapshot and its read-only queries.

use crate::combat::CombatState;
use crate::prediction::PredictionMetrics;
use holdfast_net::{OwnershipMasks, Point, SiteMask, SITE_COUNT};
use serde::Serialize;
use tracing::warn;

/// Number of lobby rooms.
pub const ROOM_COUNT: usize = 3;

/// Players a room holds.
pub const ROOM_CAPACITY: i32 = 2;

/// Client lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Choosing a room.
    #[default]
    Lobby,
    /// In a room, waiting for an opponent.
    Waiting,
    /// Match running.
    Playing,
}

/// A contested map location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Site {
    /// Centre in pixel space; fixed once assigned.
    pub center: Point,
    /// RGB used when nobody owns the site.
    pub neutral_color: [u8; 3],
    /// Castle built.
    pub has_castle: bool,
    /// Gold mine built.
    pub has_gold_mine: bool,
    /// Barracks built.
    pub has_barracks: bool,
}

impl Site {
    /// New site at `center` with no improvements.
    pub fn new(center: Point) -> Self {
        let channel = |v: i32| (100 + v.rem_euclid(155)) as u8;
        Self {
            center,
            neutral_color: [
                channel(center.x),
                channel(center.y),
                channel(center.x.wrapping_add(center.y)),
            ],
            has_castle: false,
            has_gold_mine: false,
            has_barracks: false,
        }
    }
}

/// One of the two players.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Player {
    /// Player number, 1 or 2.
    pub number: u8,
    /// Interpolated position.
    pub position: Point,
    /// Where movement is converging.
    pub target: Point,
    /// Whether the player is travelling toward `target`.
    pub moving: bool,
    /// Site the player stands on, if any.
    pub current_site: Option<usize>,
    /// Whether the player is capturing its site.
    pub capturing: bool,
    /// Local capture estimate in `[0, 1]`.
    pub capture_progress: f32,
}

impl Player {
    /// A stationary player at the origin.
    pub fn new(number: u8) -> Self {
        Self {
            number,
            position: Point::default(),
            target: Point::default(),
            moving: false,
            current_site: None,
            capturing: false,
            capture_progress: 0.0,
        }
    }

    /// Current site as a wire-style index, `-1` when off-site.
    pub fn current_site_index(&self) -> i32 {
        self.current_site.map_or(-1, |site| site as i32)
    }

    /// Put the player at rest on `point`.
    pub(crate) fn place(&mut self, point: Point) {
        self.position = point;
        self.target = point;
    }
}

/// Which player owns a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Owner {
    /// Nobody.
    Neutral,
    /// Player 1 or 2.
    Player(u8),
}

/// Whole client-side game state.
#[derive(Debug, Clone)]
pub struct GameState {
    pub(crate) phase: Phase,
    pub(crate) local_player: u8,
    pub(crate) rooms: [i32; ROOM_COUNT],
    pub(crate) selected_room: Option<u8>,
    pub(crate) sites: Vec<Site>,
    pub(crate) ownership: OwnershipMasks,
    pub(crate) players: [Player; 2],
    pub(crate) scores: [i32; 2],
    pub(crate) gold: [i32; 2],
    pub(crate) levies: [i32; 2],
    pub(crate) combat: CombatState,
    pub(crate) game_over: bool,
    pub(crate) winner: Option<i32>,
    pub(crate) metrics: PredictionMetrics,
}

impl GameState {
    /// Fresh state in the lobby; `local_player` is replaced when a room is joined.
    pub fn new(local_player: u8) -> Self {
        Self {
            phase: Phase::Lobby,
            local_player: if local_player == 2 { 2 } else { 1 },
            rooms: [0; ROOM_COUNT],
            selected_room: None,
            sites: Vec::with_capacity(SITE_COUNT),
            ownership: OwnershipMasks::default(),
            players: [Player::new(1), Player::new(2)],
            scores: [0; 2],
            gold: [0; 2],
            levies: [0; 2],
            combat: CombatState::Idle,
            game_over: false,
            winner: None,
            metrics: PredictionMetrics::default(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// This client's player number.
    pub fn local_player_number(&self) -> u8 {
        self.local_player
    }

    /// Joined-player counts for each lobby room.
    pub fn room_counts(&self) -> [i32; ROOM_COUNT] {
        self.rooms
    }

    /// Room this client asked to join, if any.
    pub fn selected_room(&self) -> Option<u8> {
        self.selected_room
    }

    /// All sites; empty until `SITE_POSITIONS` arrives.
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Site `index`, if populated.
    pub fn site(&self, index: usize) -> Option<&Site> {
        self.sites.get(index)
    }

    /// Whether all eight sites have positions.
    pub fn sites_ready(&self) -> bool {
        self.sites.len() == SITE_COUNT
    }

    /// Raw ownership masks.
    pub fn ownership(&self) -> OwnershipMasks {
        self.ownership
    }

    /// Whether player `number` owns `site`.
    pub fn is_owned_by(&self, number: u8, site: usize) -> bool {
        match number {
            1 => self.ownership.player1.contains(site),
            2 => self.ownership.player2.contains(site),
            _ => false,
        }
    }

    /// Whether no player owns `site`.
    pub fn is_neutral(&self, site: usize) -> bool {
        self.owner(site) == Owner::Neutral
    }

    /// Owner of `site`.
    pub fn owner(&self, site: usize) -> Owner {
        if self.ownership.player1.contains(site) {
            Owner::Player(1)
        } else if self.ownership.player2.contains(site) {
            Owner::Player(2)
        } else {
            Owner::Neutral
        }
    }

    /// Give `site` to player `number`, taking it from the other player.
    pub fn set_owner(&mut self, number: u8, site: usize) {
        let (mine, theirs) = match number {
            1 => (&mut self.ownership.player1, &mut self.ownership.player2),
            2 => (&mut self.ownership.player2, &mut self.ownership.player1),
            _ => return,
        };
        mine.insert(site);
        theirs.remove(site);
    }

    /// Clear ownership of `site`.
    pub fn set_neutral(&mut self, site: usize) {
        self.ownership.player1.remove(site);
        self.ownership.player2.remove(site);
    }

    /// Replace both masks, clearing any site claimed by both.
    pub(crate) fn replace_ownership(&mut self, masks: OwnershipMasks) {
        let contested = masks.player1.intersection(masks.player2);
        if !contested.is_empty() {
            warn!(
                sites = ?contested.iter().collect::<Vec<_>>(),
                "Ownership claimed by both players; treating as neutral"
            );
        }
        self.ownership = OwnershipMasks {
            player1: masks.player1.difference(contested),
            player2: masks.player2.difference(contested),
        };
    }

    /// Player `number` (1 or 2).
    pub fn player(&self, number: u8) -> Option<&Player> {
        match number {
            1 | 2 => self.players.get(usize::from(number - 1)),
            _ => None,
        }
    }

    pub(crate) fn player_mut(&mut self, number: u8) -> Option<&mut Player> {
        match number {
            1 | 2 => self.players.get_mut(usize::from(number - 1)),
            _ => None,
        }
    }

    /// Both players, player 1 first.
    pub fn players(&self) -> &[Player; 2] {
        &self.players
    }

    /// The player this client controls.
    pub fn local_player(&self) -> &Player {
        &self.players[usize::from(self.local_player - 1)]
    }

    pub(crate) fn local_player_mut(&mut self) -> &mut Player {
        &mut self.players[usize::from(self.local_player - 1)]
    }

    /// Score of player `number`.
    pub fn score(&self, number: u8) -> i32 {
        Self::per_player(&self.scores, number)
    }

    /// Gold of player `number`.
    pub fn gold(&self, number: u8) -> i32 {
        Self::per_player(&self.gold, number)
    }

    /// Levies of player `number`.
    pub fn levies(&self, number: u8) -> i32 {
        Self::per_player(&self.levies, number)
    }

    fn per_player(values: &[i32; 2], number: u8) -> i32 {
        match number {
            1 | 2 => values[usize::from(number - 1)],
            _ => 0,
        }
    }

    /// Combat sub-state.
    pub fn combat(&self) -> &CombatState {
        &self.combat
    }

    /// Whether the match has ended.
    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    /// Winning player number once the match has ended.
    pub fn winner(&self) -> Option<i32> {
        self.winner
    }

    /// Nearest site to `point`; ties go to the lowest index.
    ///
    /// `None` until all eight sites are known.
    pub fn closest_site(&self, point: Point) -> Option<usize> {
        if !self.sites_ready() {
            return None;
        }
        let mut closest = 0;
        let mut best = f32::MAX;
        for (index, site) in self.sites.iter().enumerate() {
            let distance = point.distance(site.center);
            if distance < best {
                best = distance;
                closest = index;
            }
        }
        Some(closest)
    }

    /// Copy of everything the presentation layer reads.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            phase: self.phase,
            local_player: self.local_player,
            rooms: self.rooms,
            sites: self.sites.clone(),
            player1_ownership: self.ownership.player1,
            player2_ownership: self.ownership.player2,
            players: self.players.clone(),
            scores: self.scores,
            gold: self.gold,
            levies: self.levies,
            in_combat: self.combat.in_combat(),
            combat_site: self.combat.site_index(),
            combat_timer: self.combat.timer(),
            can_retreat: self.combat.can_retreat(),
            game_over: self.game_over,
            winner: self.winner,
            prediction: self.metrics.clone(),
        }
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Point-in-time copy of the state for render and logging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSnapshot {
    /// Lifecycle phase.
    pub phase: Phase,
    /// Local player number.
    pub local_player: u8,
    /// Lobby room occupancy.
    pub rooms: [i32; ROOM_COUNT],
    /// Sites in index order.
    pub sites: Vec<Site>,
    /// Sites owned by player 1.
    pub player1_ownership: SiteMask,
    /// Sites owned by player 2.
    pub player2_ownership: SiteMask,
    /// Both players.
    pub players: [Player; 2],
    /// Scores.
    pub scores: [i32; 2],
    /// Gold.
    pub gold: [i32; 2],
    /// Levies.
    pub levies: [i32; 2],
    /// Combat flag.
    pub in_combat: bool,
    /// Combat site, `-1` when none.
    pub combat_site: i32,
    /// Seconds of combat elapsed.
    pub combat_timer: f32,
    /// Retreat eligibility.
    pub can_retreat: bool,
    /// Match ended.
    pub game_over: bool,
    /// Winner when the match ended.
    pub winner: Option<i32>,
    /// Prediction accuracy so far.
    pub prediction: PredictionMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_sites(centers: [(i32, i32); SITE_COUNT]) -> GameState {
        let mut state = GameState::new(1);
        state.sites = centers
            .iter()
            .map(|&(x, y)| Site::new(Point::new(x, y)))
            .collect();
        state
    }

    #[test]
    fn neutral_color_is_derived_from_coordinates() {
        let site = Site::new(Point::new(200, 50));
        assert_eq!(site.neutral_color, [145, 150, 195]);
        let negative = Site::new(Point::new(-1, 0));
        assert_eq!(negative.neutral_color, [254, 100, 254]);
    }

    #[test]
    fn set_owner_clears_other_player() {
        let mut state = GameState::new(1);
        state.set_owner(1, 3);
        assert!(state.is_owned_by(1, 3));
        state.set_owner(2, 3);
        assert!(state.is_owned_by(2, 3));
        assert!(!state.is_owned_by(1, 3));
        state.set_neutral(3);
        assert!(state.is_neutral(3));
    }

    #[test]
    fn replace_ownership_drops_contested_bits() {
        let mut state = GameState::new(1);
        state.replace_ownership(OwnershipMasks {
            player1: SiteMask::from_bits(0b0000_0111),
            player2: SiteMask::from_bits(0b0000_1100),
        });
        assert_eq!(state.owner(0), Owner::Player(1));
        assert_eq!(state.owner(2), Owner::Neutral);
        assert_eq!(state.owner(3), Owner::Player(2));
    }

    #[test]
    fn closest_site_requires_all_sites() {
        let state = GameState::new(1);
        assert_eq!(state.closest_site(Point::new(0, 0)), None);
    }

    #[test]
    fn closest_site_ties_go_to_lowest_index() {
        let state = state_with_sites([
            (1000, 1000),
            (1000, 1000),
            (100, 0),
            (1000, 1000),
            (1000, 1000),
            (-100, 0),
            (1000, 1000),
            (1000, 1000),
        ]);
        assert_eq!(state.closest_site(Point::new(0, 0)), Some(2));
        assert_eq!(state.closest_site(Point::new(-90, 0)), Some(5));
    }

    #[test]
    fn unknown_player_numbers_read_as_zero() {
        let state = GameState::new(1);
        assert!(state.player(0).is_none());
        assert!(state.player(3).is_none());
        assert_eq!(state.gold(7), 0);
        assert!(!state.is_owned_by(3, 0));
    }

    #[test]
    fn fresh_state_is_idle_lobby() {
        let state = GameState::default();
        assert_eq!(state.phase(), Phase::Lobby);
        assert_eq!(state.local_player_number(), 1);
        assert_eq!(state.local_player().current_site_index(), -1);
        let snapshot = state.snapshot();
        assert!(!snapshot.in_combat);
        assert_eq!(snapshot.combat_site, -1);
    }
}
