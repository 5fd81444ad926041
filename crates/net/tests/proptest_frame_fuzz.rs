//! Fuzz-style property tests for the text protocol.
//!
//! Arbitrary server input must never panic the frame reader or decoder.

use holdfast_net::{
    parse_frame, CombatStateByte, FrameBuffer, FramingMode, ServerCommand, SiteMask,
};
use proptest::prelude::*;

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

proptest! {
    /// Property: arbitrary bytes don't crash the frame buffer
    #[test]
    fn arbitrary_bytes_dont_crash_frame_buffer(
        chunks in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 0..8),
    ) {
        let mut buffer = FrameBuffer::new(FramingMode::Newline);
        for chunk in &chunks {
            for frame in buffer.push(chunk) {
                let _ = ServerCommand::decode(&frame);
            }
        }
        let _ = buffer.finish();
    }

    /// Property: known commands with random argument text decode or fail cleanly
    #[test]
    fn known_commands_with_random_args_dont_crash(
        index in 0..COMMANDS.len(),
        args in prop::collection::vec("[-0-9a-z.]{0,6}", 0..24),
    ) {
        let line = format!("{},{}", COMMANDS[index], args.join(","));
        if let Some(frame) = parse_frame(&line) {
            let _ = ServerCommand::decode(&frame);
        }
    }

    /// Property: parsed args never contain the delimiter and keep their order
    #[test]
    fn parse_preserves_non_empty_tokens(
        tokens in prop::collection::vec("[A-Z0-9_]{1,8}", 1..12),
    ) {
        let line = tokens.join(",");
        let frame = parse_frame(&line).unwrap();
        prop_assert_eq!(&frame.command, &tokens[0]);
        prop_assert_eq!(&frame.args[..], &tokens[1..]);
    }

    /// Property: frames survive arbitrary split points between reads
    #[test]
    fn split_reads_reassemble(split in 0usize..40) {
        let wire = b"SCORES,1,2\nRESOURCES,5,6,7,8\n";
        let split = split.min(wire.len());
        let mut buffer = FrameBuffer::default();
        let mut frames = buffer.push(&wire[..split]);
        frames.extend(buffer.push(&wire[split..]));
        prop_assert_eq!(frames.len(), 2);
        prop_assert_eq!(&frames[0].command, "SCORES");
        prop_assert_eq!(&frames[1].command, "RESOURCES");
    }

    /// Property: combat byte site/retreat are hidden without the combat bit
    #[test]
    fn combat_byte_gates_on_bit_three(bits in any::<u8>()) {
        let byte = CombatStateByte::from_bits(bits);
        if bits & 0x08 == 0 {
            prop_assert_eq!(byte.site(), None);
            prop_assert!(!byte.can_retreat());
        } else {
            prop_assert_eq!(byte.site(), Some(bits & 0x07));
        }
    }

    /// Property: mask iteration agrees with contains
    #[test]
    fn site_mask_iter_matches_contains(bits in any::<u8>()) {
        let mask = SiteMask::from_bits(bits);
        let listed: Vec<usize> = mask.iter().collect();
        for site in 0..8 {
            prop_assert_eq!(listed.contains(&site), mask.contains(site));
        }
    }
}
