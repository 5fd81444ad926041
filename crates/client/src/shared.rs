//! Thread-safe handle around [`Client`] for the receive, frame and send
//! activities.

use crate::dispatch::Applied;
use crate::intent::{IntentRejected, PlayerIntent};
use crate::state::{GameSnapshot, GameState};
use crate::Client;
use holdfast_net::{encode_frame, Frame, FrameBuffer, FramingMode, OutboundQueue, MAX_FRAME_LEN};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// How a receive thread ended.
#[derive(Debug)]
pub enum ReceiveOutcome {
    /// The server sent `exit`.
    ExitCommand,
    /// The stream reached end of file.
    Closed,
    /// The transport failed.
    Failed(io::Error),
}

/// Cloneable handle; every operation holds the lock for exactly one step.
#[derive(Debug, Clone)]
pub struct SharedClient {
    inner: Arc<Mutex<Client>>,
    outbound: Arc<OutboundQueue>,
}

impl SharedClient {
    /// Share `client` between threads.
    pub fn new(client: Client) -> Self {
        let outbound = Arc::clone(client.outbound());
        Self {
            inner: Arc::new(Mutex::new(client)),
            outbound,
        }
    }

    /// Apply one inbound frame.
    pub fn handle_frame(&self, frame: &Frame) -> Applied {
        self.lock().handle_frame(frame)
    }

    /// Run one frame of local simulation.
    pub fn tick(&self, dt: f32) {
        self.lock().tick(dt);
    }

    /// Submit a local intent.
    pub fn submit(&self, intent: PlayerIntent) -> Result<(), IntentRejected> {
        self.lock().submit(intent)
    }

    /// Copy of the collaborator-facing state.
    pub fn snapshot(&self) -> GameSnapshot {
        self.lock().snapshot()
    }

    /// Run `f` against the state under the lock.
    pub fn with_state<R>(&self, f: impl FnOnce(&GameState) -> R) -> R {
        f(self.lock().state())
    }

    /// Outbound queue; draining it never takes the state lock.
    pub fn outbound(&self) -> &Arc<OutboundQueue> {
        &self.outbound
    }

    /// Write every queued message to `writer`, returning how many were sent.
    pub fn flush_outbound<W: Write>(&self, writer: &mut W, mode: FramingMode) -> io::Result<usize> {
        let messages = self.outbound.drain();
        for message in &messages {
            match mode {
                FramingMode::Newline => writer.write_all(encode_frame(message).as_bytes())?,
                FramingMode::ReadBoundary => writer.write_all(message.as_bytes())?,
            }
        }
        writer.flush()?;
        if !messages.is_empty() {
            debug!(count = messages.len(), "Flushed outbound messages");
        }
        Ok(messages.len())
    }

    /// Start a thread that feeds everything read from `reader` into the client.
    pub fn spawn_receiver<R>(&self, reader: R, mode: FramingMode) -> io::Result<JoinHandle<ReceiveOutcome>>
    where
        R: Read + Send + 'static,
    {
        let client = self.clone();
        thread::Builder::new()
            .name("holdfast-recv".into())
            .spawn(move || client.receive(reader, mode))
    }

    /// Blocking receive loop; returns when the stream ends or says `exit`.
    pub fn receive<R: Read>(&self, mut reader: R, mode: FramingMode) -> ReceiveOutcome {
        let mut frames = FrameBuffer::new(mode);
        let mut buf = [0u8; MAX_FRAME_LEN];

        let outcome = loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => {
                    if let Some(frame) = frames.finish() {
                        if self.handle_frame(&frame) == Applied::Exit {
                            break ReceiveOutcome::ExitCommand;
                        }
                    }
                    break ReceiveOutcome::Closed;
                }
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => break ReceiveOutcome::Failed(err),
            };

            let exited = frames
                .push(&buf[..n])
                .iter()
                .any(|frame| self.handle_frame(frame) == Applied::Exit);
            if exited {
                break ReceiveOutcome::ExitCommand;
            }
        };

        match &outcome {
            ReceiveOutcome::Failed(err) => warn!(%err, "Receive loop failed"),
            other => info!(outcome = ?other, dropped = frames.dropped_frames(), "Receive loop finished"),
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Client> {
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("Client lock poisoned; recovering");
            poisoned.into_inner()
        })
    }
}
