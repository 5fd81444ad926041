//! End-to-end protocol sessions driven through [`Client::handle_line`].

use holdfast_client::{Applied, Client, GameSnapshot, Phase, PlayerIntent, SharedClient};
use holdfast_net::{FramingMode, Point};
use proptest::prelude::*;
use std::io::Cursor;

const SITES: &str =
    "SITE_POSITIONS,100,100,300,100,500,100,700,100,100,500,300,500,500,500,700,500";

fn feed(client: &mut Client, lines: &[&str]) {
    for line in lines {
        client.handle_line(line);
    }
}

fn started(local: u8) -> Client {
    let mut client = Client::new(local);
    feed(
        &mut client,
        &[
            "LOBBY_INFO,0,0,0",
            &format!("JOINED_ROOM,0,{local}"),
            "GAME_START",
            SITES,
        ],
    );
    client
}

/// Snapshot with movement targets cleared; incremental commands never set them.
fn without_targets(mut snapshot: GameSnapshot) -> GameSnapshot {
    for player in &mut snapshot.players {
        player.target = Point::default();
    }
    snapshot
}

#[test]
fn full_state_matches_incremental_updates() {
    let mut incremental = started(1);
    feed(
        &mut incremental,
        &[
            "OWNERSHIP,3,192",
            "BUILDINGS,1,2,128",
            "PLAYER_STATES,18",
            "SCORES,5,7",
            "RESOURCES,100,4,80,2",
            "COMBAT_STATE,29,2.5",
        ],
    );

    let mut snapshot = started(1);
    snapshot.handle_line("FULL_STATE,3,192,1,2,128,18,5,7,100,4,80,2,300,100,700,500,29,2.5");

    assert_eq!(
        without_targets(snapshot.snapshot()),
        without_targets(incremental.snapshot())
    );

    let state = snapshot.state();
    assert_eq!(state.players()[0].target, Point::new(300, 100));
    assert_eq!(state.players()[1].target, Point::new(700, 500));
    assert_eq!(state.combat().site(), Some(5));
    assert!(state.combat().can_retreat());
    assert!(state.site(7).expect("site 7").has_barracks);
}

#[test]
fn full_state_on_fresh_client_matches_incremental_updates() {
    let mut incremental = Client::new(1);
    feed(
        &mut incremental,
        &[
            "OWNERSHIP,5,10",
            "BUILDINGS,1,2,4",
            "PLAYER_STATES,22",
            "SCORES,3,1",
            "RESOURCES,50,2,60,3",
            "COMBAT_STATE,12,0.5",
        ],
    );

    let mut snapshot = Client::new(1);
    snapshot.handle_line("FULL_STATE,5,10,1,2,4,22,3,1,50,2,60,3,0,0,0,0,12,0.5");

    // Targets are sent as the initial (0, 0), so the whole snapshot must agree.
    assert_eq!(snapshot.snapshot(), incremental.snapshot());
    assert!(snapshot.state().sites().is_empty());
    assert_eq!(snapshot.state().combat().site(), Some(4));
}

#[test]
fn malformed_full_state_changes_nothing() {
    let mut client = started(1);
    client.handle_line("OWNERSHIP,1,128");
    client.handle_line("PLAYER_POS,2,500,500");
    let before = client.snapshot();

    let applied =
        client.handle_line("FULL_STATE,255,0,7,7,7,31,9,9,x,9,9,9,1,2,3,4,29,1.0");
    assert_eq!(applied, Applied::Ignored);
    assert_eq!(client.snapshot(), before);
    assert_eq!(client.state().players()[1].target, Point::new(500, 500));
}

#[test]
fn extreme_move_target_does_not_overflow() {
    let mut client = started(1);
    client
        .submit(PlayerIntent::MoveToward { x: i32::MIN, y: 0 })
        .expect("move accepted");
    assert_eq!(client.state().local_player().target, Point::new(100, 100));
    client.handle_line("POSITIONS,-2147483648,0,0,0");
    client.tick(0.05);
}

#[test]
fn full_state_without_combat_bit_returns_to_idle() {
    let mut client = started(1);
    client.handle_line("COMBAT_START,2");
    assert!(client.state().combat().in_combat());

    client.handle_line("FULL_STATE,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,5,1.0");
    assert!(!client.state().combat().in_combat());
    assert_eq!(client.state().combat().site_index(), -1);
    assert_eq!(client.state().combat().timer(), 0.0);
}

#[test]
fn full_state_before_sites_still_updates_everything_else() {
    let mut client = Client::new(1);
    client.handle_line("FULL_STATE,1,2,255,0,0,0,9,8,7,6,5,4,0,0,0,0,0,0");
    assert!(client.state().sites().is_empty());
    assert_eq!(client.state().score(1), 9);
    assert_eq!(client.state().gold(2), 5);
    assert!(client.state().is_owned_by(2, 1));
}

#[test]
fn session_moves_reconciles_and_captures() {
    let mut client = started(1);
    assert_eq!(client.state().phase(), Phase::Playing);
    assert_eq!(client.state().local_player().position, Point::new(100, 100));
    assert_eq!(client.state().players()[1].position, Point::new(700, 500));

    client
        .submit(PlayerIntent::MoveToward { x: 310, y: 90 })
        .expect("move accepted");
    client.tick(0.05);
    client.tick(0.05);
    let mid = client.state().local_player().position;
    assert_eq!(mid, Point::new(130, 100));

    // The local player is mid-move, so the server's stale view is ignored.
    client.handle_line("POSITIONS,500,500,700,500");
    assert_eq!(client.state().local_player().position, mid);

    for _ in 0..20 {
        client.tick(0.05);
    }
    let local = client.state().local_player();
    assert_eq!(local.position, Point::new(300, 100));
    assert!(!local.moving);
    assert_eq!(local.current_site, Some(1));

    // Resting players are corrected; targets stay put.
    client.handle_line("POSITIONS,300,100,600,500");
    let remote = &client.state().players()[1];
    assert_eq!(remote.position, Point::new(600, 500));
    assert_eq!(remote.target, Point::new(700, 500));
    assert_eq!(client.state().prediction_metrics().total_corrections, 1);

    client.handle_line("PLAYER_STATES,4");
    for _ in 0..10 {
        client.tick(0.05);
    }
    let progress = client.state().local_player().capture_progress;
    assert!((progress - 0.05).abs() < 1e-4, "progress = {progress}");

    client.handle_line("PLAYER_STATES,0");
    client.tick(0.05);
    assert_eq!(client.state().local_player().capture_progress, 0.0);

    client.handle_line("OWNERSHIP,2,0");
    assert!(client.state().is_owned_by(1, 1));
    client.handle_line("GAME_OVER,1");
    assert!(client.state().is_game_over());
    assert_eq!(client.state().winner(), Some(1));
}

#[test]
fn remote_player_pos_only_retargets() {
    let mut client = started(1);
    client.handle_line("PLAYER_POS,2,500,500");
    let remote = &client.state().players()[1];
    assert_eq!(remote.position, Point::new(700, 500));
    assert_eq!(remote.target, Point::new(500, 500));
    assert!(remote.moving);

    client.handle_line("PLAYER_POS,1,300,100");
    let local = client.state().local_player();
    assert_eq!(local.position, Point::new(300, 100));
    assert!(!local.moving);
}

#[test]
fn contested_ownership_bits_are_cleared() {
    let mut client = started(1);
    client.handle_line("OWNERSHIP,3,2");
    assert!(client.state().is_owned_by(1, 0));
    assert!(client.state().is_neutral(1));
}

#[test]
fn shared_client_receives_split_reads() {
    struct Chunked(Vec<Vec<u8>>);
    impl std::io::Read for Chunked {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    let shared = SharedClient::new(Client::new(1));
    let reader = Chunked(vec![
        b"LOBBY_INFO,1,".to_vec(),
        b"1,1\nJOINED_ROOM,1,1\nGAME_".to_vec(),
        b"START\n".to_vec(),
    ]);
    let handle = shared
        .spawn_receiver(reader, FramingMode::Newline)
        .expect("spawn receiver");
    handle.join().expect("receiver thread");

    assert_eq!(shared.with_state(|s| s.room_counts()), [1, 1, 1]);
    assert_eq!(shared.with_state(|s| s.phase()), Phase::Playing);
}

#[test]
fn read_boundary_framing_treats_each_read_as_a_frame() {
    let shared = SharedClient::new(Client::new(1));
    shared.receive(Cursor::new(b"SCORES,2,3".to_vec()), FramingMode::ReadBoundary);
    assert_eq!(shared.with_state(|s| s.score(2)), 3);
}

const COMMANDS: &[&str] = &[
    "LOBBY_INFO",
    "JOINED_ROOM",
    "ROOM_FULL",
    "GAME_START",
    "SITE_POSITIONS",
    "OWNERSHIP",
    "SCORES",
    "RESOURCES",
    "PLAYER_POS",
    "BUILDINGS",
    "PLAYER_STATES",
    "COMBAT_STATE",
    "FULL_STATE",
    "GAME_OVER",
    "COMBAT_START",
    "COMBAT_INTERRUPT",
    "COMBAT_END",
    "RETREAT",
    "POSITIONS",
];

fn arb_line() -> impl Strategy<Value = String> {
    (
        prop::sample::select(COMMANDS),
        prop::collection::vec(-1000i32..1000, 0..20),
    )
        .prop_map(|(command, args)| {
            let mut line = command.to_owned();
            for arg in args {
                line.push(',');
                line.push_str(&arg.to_string());
            }
            line
        })
}

proptest! {
    /// Property: any command sequence keeps the state model consistent
    #[test]
    fn arbitrary_sessions_keep_state_consistent(
        steps in prop::collection::vec((arb_line(), 0.0f32..0.2), 0..60),
    ) {
        let mut client = Client::new(1);
        for (line, dt) in &steps {
            client.handle_line(line);
            client.tick(*dt);

            let state = client.state();
            let owned = state.ownership();
            prop_assert!(owned.player1.intersection(owned.player2).is_empty());
            prop_assert!(state.sites().is_empty() || state.sites_ready());
            for player in state.players() {
                prop_assert!((0.0..=1.0).contains(&player.capture_progress));
                if player.moving && state.phase() == Phase::Playing {
                    prop_assert!(player.current_site.is_none());
                }
            }
            if !state.combat().in_combat() {
                prop_assert_eq!(state.combat().site_index(), -1);
                prop_assert!(!state.combat().can_retreat());
            }
        }
    }
}
