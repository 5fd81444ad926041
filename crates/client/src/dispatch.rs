//! Inbound command dispatch: one handler per [`ServerCommand`] variant.

use crate::prediction::ReconciliationResult;
use crate::state::{GameState, Owner, Phase, Site};
use holdfast_net::{
    BuildingMasks, FullState, OwnershipMasks, PlayerStateFlags, Point, ResourceCounts,
    ServerCommand, SITE_COUNT,
};
use tracing::{debug, info, warn};

/// What applying a command did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// State changed (or was overwritten with identical values).
    Updated,
    /// Nothing changed: informational command or failed precondition.
    Ignored,
    /// The receive path should stop.
    Exit,
}

fn player_number(raw: i32) -> Option<u8> {
    match raw {
        1 => Some(1),
        2 => Some(2),
        _ => None,
    }
}

fn site_index(raw: i32) -> Option<u8> {
    u8::try_from(raw)
        .ok()
        .filter(|&site| usize::from(site) < SITE_COUNT)
}

impl GameState {
    /// Apply one decoded server command.
    pub fn apply(&mut self, command: ServerCommand) -> Applied {
        match command {
            ServerCommand::LobbyInfo { rooms } => {
                self.rooms = rooms;
                info!(
                    room1 = rooms[0],
                    room2 = rooms[1],
                    room3 = rooms[2],
                    "Lobby info received"
                );
                Applied::Updated
            }
            ServerCommand::JoinedRoom { room, player } => {
                let Some(number) = player_number(player) else {
                    warn!(player, "JOINED_ROOM assigned an invalid player number");
                    return Applied::Ignored;
                };
                self.local_player = number;
                self.selected_room = u8::try_from(room).ok();
                self.phase = Phase::Waiting;
                info!(room, player = number, "Joined room; waiting for opponent");
                Applied::Updated
            }
            ServerCommand::RoomFull { room } => {
                self.phase = Phase::Lobby;
                self.selected_room = None;
                info!(room, "Room is full");
                Applied::Updated
            }
            ServerCommand::GameStart => {
                self.phase = Phase::Playing;
                info!("Game starting");
                Applied::Updated
            }
            ServerCommand::SitePositions { centers } => {
                self.apply_site_positions(centers);
                Applied::Updated
            }
            ServerCommand::Ownership(masks) => {
                self.apply_ownership(masks);
                Applied::Updated
            }
            ServerCommand::Scores { scores } => {
                self.scores = scores;
                Applied::Updated
            }
            ServerCommand::Resources(resources) => {
                self.apply_resources(resources);
                Applied::Updated
            }
            ServerCommand::PlayerPos { player, position } => {
                self.apply_player_pos(player, position)
            }
            ServerCommand::Buildings(masks) => {
                if self.apply_buildings(masks) {
                    Applied::Updated
                } else {
                    Applied::Ignored
                }
            }
            ServerCommand::PlayerStates(flags) => {
                self.apply_player_states(flags);
                Applied::Updated
            }
            ServerCommand::CombatState(report) => {
                self.combat.apply_report(report);
                Applied::Updated
            }
            ServerCommand::FullState(full) => {
                self.apply_full_state(&full);
                info!("Full state received");
                Applied::Updated
            }
            ServerCommand::GameOver { winner } => {
                self.game_over = true;
                self.winner = Some(winner);
                info!(winner, "Game over");
                Applied::Updated
            }
            ServerCommand::CombatStart { site } => {
                let Some(site) = site_index(site) else {
                    warn!(site, "COMBAT_START names an invalid site");
                    return Applied::Ignored;
                };
                self.combat.start(site);
                info!(site, "Combat started");
                Applied::Updated
            }
            ServerCommand::CombatInterrupt => {
                self.combat.end();
                info!("Combat interrupted");
                Applied::Updated
            }
            ServerCommand::CombatEnd { victor } => {
                self.combat.end();
                info!(victor, "Combat ended");
                Applied::Updated
            }
            ServerCommand::Retreat { player, site } => {
                info!(player, site, "Player retreated");
                Applied::Ignored
            }
            ServerCommand::Positions { positions } => {
                let results = self.reconcile(positions);
                if results
                    .iter()
                    .any(|result| matches!(result, ReconciliationResult::Corrected { .. }))
                {
                    Applied::Updated
                } else {
                    Applied::Ignored
                }
            }
            ServerCommand::Exit => Applied::Exit,
        }
    }

    fn apply_site_positions(&mut self, centers: [Point; SITE_COUNT]) {
        self.sites = centers.iter().copied().map(Site::new).collect();
        for (index, site) in self.sites.iter().enumerate() {
            debug!(site = index, x = site.center.x, y = site.center.y, "Site position");
        }
        // Default spawns: player 1 on the first site, player 2 on the last.
        self.players[0].place(centers[0]);
        self.players[1].place(centers[SITE_COUNT - 1]);
        info!("Site positions synchronized with server");
    }

    fn apply_ownership(&mut self, masks: OwnershipMasks) {
        let before: Vec<Owner> = (0..SITE_COUNT).map(|site| self.owner(site)).collect();
        self.replace_ownership(masks);

        for (site, old) in before.into_iter().enumerate() {
            let new = self.owner(site);
            if old != new {
                debug!(site, from = ?old, to = ?new, "Site ownership changed");
            }
        }
    }

    fn apply_resources(&mut self, resources: ResourceCounts) {
        self.gold = [resources.player1_gold, resources.player2_gold];
        self.levies = [resources.player1_levies, resources.player2_levies];
    }

    fn apply_player_pos(&mut self, player: i32, position: Point) -> Applied {
        let Some(number) = player_number(player) else {
            debug!(player, "PLAYER_POS for unknown player");
            return Applied::Ignored;
        };
        let local = number == self.local_player;
        let Some(tracked) = self.player_mut(number) else {
            return Applied::Ignored;
        };

        if local {
            // Server-confirmed arrival.
            tracked.place(position);
            tracked.moving = false;
        } else {
            // Remote motion is always interpolated, never snapped.
            tracked.target = position;
            tracked.moving = true;
        }
        Applied::Updated
    }

    /// Returns `false` when sites are not known yet.
    fn apply_buildings(&mut self, masks: BuildingMasks) -> bool {
        if !self.sites_ready() {
            warn!("Building update before site positions; skipping");
            return false;
        }
        for (index, site) in self.sites.iter_mut().enumerate() {
            site.has_castle = masks.castles.contains(index);
            site.has_gold_mine = masks.gold_mines.contains(index);
            site.has_barracks = masks.barracks.contains(index);
            if site.has_castle || site.has_gold_mine || site.has_barracks {
                debug!(
                    site = index,
                    castle = site.has_castle,
                    gold_mine = site.has_gold_mine,
                    barracks = site.has_barracks,
                    "Site improvements"
                );
            }
        }
        true
    }

    fn apply_player_states(&mut self, flags: PlayerStateFlags) {
        for player in &mut self.players {
            player.moving = flags.moving(player.number);
            player.capturing = flags.capturing(player.number);
        }
        self.combat.set_flag(flags.in_combat());
    }

    fn apply_full_state(&mut self, full: &FullState) {
        self.apply_ownership(full.ownership);
        self.apply_buildings(full.buildings);
        self.apply_player_states(full.player_states);
        self.scores = full.scores;
        self.apply_resources(full.resources);
        for (player, target) in self.players.iter_mut().zip(full.targets) {
            player.target = target;
        }
        self.combat.apply_report(full.combat);
    }
}
