//! Headless replay of scripted sessions.
//!
//! A script is JSONL: one [`ScriptEntry`] per line. Entries run in order
//! against a fresh [`Client`]; the resulting snapshots can be logged as JSONL
//! for later comparison.

use anyhow::{Context, Result};
use holdfast_client::{Applied, Client, GameSnapshot, PlayerIntent};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, info, warn};

/// One scripted step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScriptEntry {
    /// Raw server line, exactly as it would arrive on the wire.
    Frame { line: String },
    /// Advance local simulation.
    Tick { dt: f32 },
    /// Local player input.
    Intent {
        #[serde(flatten)]
        intent: PlayerIntent,
    },
}

/// Load a script, skipping blank lines.
pub fn load_script(path: impl AsRef<Path>) -> Result<Vec<ScriptEntry>> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open replay script: {}", path.display()))?;

    let mut entries = Vec::new();
    for (line_num, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: ScriptEntry = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse line {}: {}", line_num + 1, line))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// One line of the state log.
#[derive(Debug, Serialize)]
pub struct StateLogEntry<'a> {
    /// Zero-based script step that produced this state.
    pub step: usize,
    /// Messages the step put on the wire.
    pub outbound: &'a [String],
    /// State after the step.
    pub state: &'a GameSnapshot,
}

/// JSONL writer for [`StateLogEntry`] lines.
pub struct StateLogger {
    writer: BufWriter<File>,
    entries_written: u64,
}

impl StateLogger {
    /// Create (or truncate) a state log.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create state log: {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            entries_written: 0,
        })
    }

    /// Append one entry.
    pub fn log(&mut self, entry: &StateLogEntry<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.writer, entry)?;
        writeln!(&mut self.writer)?;
        self.entries_written += 1;
        Ok(())
    }

    /// Flush buffered writes.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }
}

/// Counters for a finished replay.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplaySummary {
    pub frames: usize,
    pub ticks: usize,
    pub intents_accepted: usize,
    pub intents_rejected: usize,
    /// Every wire message in send order.
    pub outbound: Vec<String>,
    /// The script contained an `exit` frame; later entries were not run.
    pub exited: bool,
}

/// Run `entries` against `client`, optionally logging state after every step.
pub fn run(
    client: &mut Client,
    entries: &[ScriptEntry],
    max_frame_dt: f32,
    mut log: Option<&mut StateLogger>,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    for (step, entry) in entries.iter().enumerate() {
        match entry {
            ScriptEntry::Frame { line } => {
                summary.frames += 1;
                if client.handle_line(line) == Applied::Exit {
                    info!(step, "Server requested exit; stopping replay");
                    summary.exited = true;
                }
            }
            ScriptEntry::Tick { dt } => {
                summary.ticks += 1;
                client.tick(dt.min(max_frame_dt));
            }
            ScriptEntry::Intent { intent } => match client.submit(*intent) {
                Ok(()) => summary.intents_accepted += 1,
                Err(err) => {
                    debug!(step, %err, "Scripted intent rejected");
                    summary.intents_rejected += 1;
                }
            },
        }

        let sent = client.outbound().drain();
        if let Some(log) = log.as_deref_mut() {
            log.log(&StateLogEntry {
                step,
                outbound: &sent,
                state: &client.snapshot(),
            })?;
        }
        summary.outbound.extend(sent);

        if summary.exited {
            break;
        }
    }

    if let Some(log) = log {
        log.flush()?;
    }
    if summary.intents_rejected > 0 {
        warn!(rejected = summary.intents_rejected, "Some scripted intents were rejected");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use holdfast_client::Phase;
    use holdfast_net::Improvement;

    fn frame(line: &str) -> ScriptEntry {
        ScriptEntry::Frame {
            line: line.to_owned(),
        }
    }

    #[test]
    fn entries_parse_from_json_lines() {
        let entry: ScriptEntry =
            serde_json::from_str(r#"{"type":"intent","intent":"join_room","room":2}"#)
                .expect("intent entry");
        assert_eq!(
            entry,
            ScriptEntry::Intent {
                intent: PlayerIntent::JoinRoom { room: 2 }
            }
        );

        let entry: ScriptEntry =
            serde_json::from_str(r#"{"type":"intent","intent":"build","improvement":"gold_mine"}"#)
                .expect("build entry");
        assert_eq!(
            entry,
            ScriptEntry::Intent {
                intent: PlayerIntent::Build {
                    improvement: Improvement::GoldMine
                }
            }
        );

        let entry: ScriptEntry =
            serde_json::from_str(r#"{"type":"tick","dt":0.25}"#).expect("tick entry");
        assert_eq!(entry, ScriptEntry::Tick { dt: 0.25 });
    }

    #[test]
    fn replay_collects_outbound_and_stops_at_exit() {
        let mut client = Client::new(1);
        let script = vec![
            frame("LOBBY_INFO,0,1,2"),
            ScriptEntry::Intent {
                intent: PlayerIntent::JoinRoom { room: 2 },
            },
            ScriptEntry::Intent {
                intent: PlayerIntent::JoinRoom { room: 1 },
            },
            frame("JOINED_ROOM,1,2"),
            frame("exit"),
            frame("GAME_START"),
        ];

        let summary = run(&mut client, &script, 0.05, None).expect("replay");
        assert!(summary.exited);
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.intents_accepted, 1);
        assert_eq!(summary.intents_rejected, 1);
        assert_eq!(summary.outbound, vec!["JOIN_ROOM,1".to_owned()]);
        assert_eq!(client.state().phase(), Phase::Waiting);
        assert_eq!(client.state().local_player_number(), 2);
    }

    #[test]
    fn state_log_has_one_line_per_step() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.jsonl");
        let mut logger = StateLogger::create(&path).expect("logger");

        let mut client = Client::new(1);
        let script = vec![frame("SCORES,3,4"), ScriptEntry::Tick { dt: 0.016 }];
        run(&mut client, &script, 0.05, Some(&mut logger)).expect("replay");
        assert_eq!(logger.entries_written(), 2);

        let contents = std::fs::read_to_string(&path).expect("read log");
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["step"], 0);
        assert_eq!(lines[0]["state"]["scores"], serde_json::json!([3, 4]));
        assert_eq!(lines[1]["state"]["phase"], "lobby");
        assert_eq!(lines[1]["state"]["prediction"]["total_corrections"], 0);
    }
}
