//! Pad Handle - background polling for a controller port
//!
//! Runs `SnesPad::poll` on a blocking tokio thread at a fixed interval and
//! publishes every state change through a `watch` channel. Keyboard scancodes
//! are events rather than state, so every non-empty batch also goes out on
//! the caller's `mpsc` sender in poll order. Rumble, caps lock and
//! re-detection requests travel the other way over an `mpsc` channel.
//!
//! # Threading Model
//!
//! Polling busy-waits for the bus delays, so it runs on
//! `tokio::task::spawn_blocking` instead of the async worker threads. The
//! loop owns the pad exclusively; callers only see snapshots.

use super::device::PadReport;
use super::snespad::{Ready, SnesPad};
use crate::bus::PadIo;
use crate::config::PadConfig;
use crate::error::PadError;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Requests for the polling loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PadCommand {
    SetRumble { left: u8, right: u8 },
    SetCapsLock(bool),
    /// Drop the current device and run detection on the next cycle
    Redetect,
    Shutdown,
}

/// State published after a poll
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PadSnapshot {
    pub report: PadReport,
    pub caps_locked: bool,
    /// Scaled rumble intensities (left, right), 0-15
    pub rumble: (u8, u8),
    pub polled_at: DateTime<Local>,
    /// Number of the poll cycle that produced this snapshot
    pub sequence: u64,
}

impl Default for PadSnapshot {
    fn default() -> Self {
        Self {
            report: PadReport::None,
            caps_locked: false,
            rumble: (0, 0),
            polled_at: Local::now(),
            sequence: 0,
        }
    }
}

impl PadSnapshot {
    fn capture(pad: &SnesPad<Ready>, sequence: u64) -> Self {
        Self {
            report: pad.report(),
            caps_locked: pad.caps_locked(),
            rumble: (pad.rumble().left(), pad.rumble().right()),
            polled_at: Local::now(),
            sequence,
        }
    }

    /// Whether consumers need to hear about `next`
    ///
    /// Only level state counts, scancode batches travel on their own channel.
    fn differs(&self, next: &PadSnapshot) -> bool {
        self.report != next.report
            || self.caps_locked != next.caps_locked
            || self.rumble != next.rumble
    }
}

/// Handle to a running poll loop
pub struct PadHandle {
    state_receiver: watch::Receiver<PadSnapshot>,
    command_sender: mpsc::Sender<PadCommand>,
    task: JoinHandle<()>,
}

impl PadHandle {
    /// Configure the port and start polling on the current tokio runtime
    ///
    /// Every scancode batch the keyboard sends is forwarded to
    /// `scancode_sender`. A full channel stalls polling until the consumer
    /// catches up, so no prefix byte is ever dropped.
    pub fn spawn(
        config: &PadConfig,
        io: Box<dyn PadIo + Send>,
        scancode_sender: mpsc::Sender<Vec<u8>>,
    ) -> Result<Self, PadError> {
        info!(
            "Spawning pad poller on {:?} every {} ms",
            config.pins, config.poll_interval_ms
        );

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| PadError::InitializationError(format!("No tokio runtime: {}", e)))?;

        let pad = SnesPad::create(config.pins, io, Some(config.settings.clone())).begin()?;

        let (state_sender, state_receiver) = watch::channel(PadSnapshot::default());
        let (command_sender, command_receiver) = mpsc::channel(32);
        let interval = Duration::from_millis(config.poll_interval_ms);

        let task = runtime.spawn_blocking(move || {
            info!("Pad poll loop started");
            run_poll_loop(pad, interval, state_sender, scancode_sender, command_receiver);
            info!("Pad poll loop finished");
        });

        Ok(Self {
            state_receiver,
            command_sender,
            task,
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<PadSnapshot> {
        debug!("New subscriber to pad state");
        self.state_receiver.clone()
    }

    pub async fn send_command(&self, command: PadCommand) -> Result<(), PadError> {
        self.command_sender
            .send(command)
            .await
            .map_err(|e| PadError::ChannelError(e.to_string()))
    }

    pub fn set_rumble(&self, left: u8, right: u8) -> Result<(), PadError> {
        self.command_sender
            .try_send(PadCommand::SetRumble { left, right })
            .map_err(|e| PadError::ChannelError(e.to_string()))
    }

    /// Stop the loop and wait for it to release the bus
    pub async fn shutdown(self) -> Result<(), PadError> {
        info!("Shutting down pad poller");
        // the loop also stops once every sender is gone
        let _ = self.command_sender.send(PadCommand::Shutdown).await;
        drop(self.command_sender);

        self.task
            .await
            .map_err(|e| PadError::ChannelError(format!("Poll task failed: {}", e)))
    }
}

/// Apply one command, returns false when the loop should stop
fn apply_command(pad: &mut SnesPad<Ready>, command: PadCommand) -> bool {
    debug!("Applying command {:?}", command);
    match command {
        PadCommand::SetRumble { left, right } => pad.set_rumble(left, right),
        PadCommand::SetCapsLock(enabled) => pad.set_caps_lock_led(enabled),
        PadCommand::Redetect => pad.start(),
        PadCommand::Shutdown => return false,
    }
    true
}

fn run_poll_loop(
    mut pad: SnesPad<Ready>,
    interval: Duration,
    state_sender: watch::Sender<PadSnapshot>,
    scancode_sender: mpsc::Sender<Vec<u8>>,
    mut command_receiver: mpsc::Receiver<PadCommand>,
) {
    let mut sequence = 0u64;
    let mut scancodes_dropped = false;

    // Stats for performance monitoring
    let mut cycles = 0u64;
    let mut changes = 0u64;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        loop {
            match command_receiver.try_recv() {
                Ok(command) => {
                    if !apply_command(&mut pad, command) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("All command senders dropped, stopping poll loop");
                    return;
                }
            }
        }

        let cycle_start = Instant::now();
        pad.poll();
        sequence += 1;
        cycles += 1;

        if !pad.scancodes().is_empty() && !scancodes_dropped {
            if let Err(e) = scancode_sender.blocking_send(pad.scancodes().to_vec()) {
                warn!("Scancode receiver dropped, no longer forwarding: {}", e);
                scancodes_dropped = true;
            }
        }

        let snapshot = PadSnapshot::capture(&pad, sequence);
        let published = state_sender.send_if_modified(|current| {
            if current.differs(&snapshot) {
                *current = snapshot;
                true
            } else {
                false
            }
        });
        if published {
            changes += 1;
        }

        if state_sender.is_closed() {
            error!("No state receivers left, stopping poll loop");
            return;
        }

        let now = Local::now();
        if now - last_stats_time > stats_interval {
            info!(
                "Pad stats: {} cycles, {} published changes, device {:?}",
                cycles,
                changes,
                pad.device_type()
            );
            cycles = 0;
            changes = 0;
            last_stats_time = now;
        }

        std::thread::sleep(interval.saturating_sub(cycle_start.elapsed()));
    }
}
