//! Playback Controller — the IDLE → PRINTING → FINISHED state machine.
//!
//! This type holds no timers. `Session` owns the scheduling and calls
//! `reveal_next` when each tick fires, passing the epoch the tick was scheduled
//! under. Any start or reset bumps the epoch, so ticks from an earlier run are
//! reported as `Tick::Stale` and never touch the revealed lines.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::receipt::{DisplayName, ReceiptExport, ReceiptImage, ReceiptLine, ReceiptLineSequence};

/// Delay between `start` and the first reveal tick.
pub const START_DELAY: Duration = Duration::from_millis(500);
/// Hold after the last line before the run is marked finished.
pub const LAST_LINE_HOLD: Duration = Duration::from_millis(1000);
/// Length of the per-line feedback pulse.
pub const FEEDBACK_PULSE: Duration = Duration::from_millis(150);

// ────────────────────────────────────────────────────────────────────────────
// State types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlaybackState {
    Idle,
    Printing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// A message for the client to render next to the upload control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: StatusKind::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("cannot {op} while playback is {state:?}")]
    InvalidTransition {
        op: &'static str,
        state: PlaybackState,
    },

    #[error("a photo is already being analyzed")]
    AnalysisInProgress,

    #[error("cannot play an empty receipt")]
    EmptySequence,

    #[error("the session was reset while the photo was being analyzed")]
    Superseded,
}

/// Outcome of one reveal tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    /// A line was appended; schedule the next tick after `next_delay`.
    Revealed {
        index: usize,
        next_delay: Duration,
        pulse: u64,
    },
    /// No lines remained; the run is now finished.
    Finished,
    /// The tick belongs to a run that was reset or replaced.
    Stale,
}

/// The active run: everything discarded together on reset.
#[derive(Debug, Clone)]
struct PlaybackRun {
    id: Uuid,
    name: DisplayName,
    sequence: ReceiptLineSequence,
    image: Option<ReceiptImage>,
    started_at: DateTime<Utc>,
}

/// Serializable view of the session for polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub analyzing: bool,
    pub status: Option<StatusMessage>,
    pub run_id: Option<Uuid>,
    pub recipient: Option<DisplayName>,
    pub lines: Vec<ReceiptLine>,
    pub total_lines: usize,
    pub feedback_active: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct PlaybackController {
    state: PlaybackState,
    run: Option<PlaybackRun>,
    revealed: Vec<ReceiptLine>,
    status: Option<StatusMessage>,
    analyzing: bool,
    epoch: u64,
    pulse: u64,
    feedback_active: bool,
}

impl PlaybackController {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            run: None,
            revealed: Vec::new(),
            status: None,
            analyzing: false,
            epoch: 0,
            pulse: 0,
            feedback_active: false,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing
    }

    pub fn status(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn revealed(&self) -> &[ReceiptLine] {
        &self.revealed
    }

    pub fn feedback_active(&self) -> bool {
        self.feedback_active
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run.as_ref().map(|r| r.id)
    }

    /// Marks a photo as under analysis. Returns the epoch the result must match.
    pub fn begin_analysis(&mut self, message: StatusMessage) -> Result<u64, PlaybackError> {
        if self.state != PlaybackState::Idle {
            return Err(PlaybackError::InvalidTransition {
                op: "analyze a photo",
                state: self.state,
            });
        }
        if self.analyzing {
            return Err(PlaybackError::AnalysisInProgress);
        }
        self.analyzing = true;
        self.status = Some(message);
        Ok(self.epoch)
    }

    /// Records a rejected photo and re-enables submissions.
    pub fn reject_analysis(&mut self, message: StatusMessage) {
        self.analyzing = false;
        self.status = Some(message);
    }

    /// Records a matched photo. `analyzing` stays set until `start` runs.
    pub fn accept_analysis(&mut self, message: StatusMessage) {
        self.status = Some(message);
    }

    /// Begins a run. Returns the epoch its ticks must carry.
    pub fn start(
        &mut self,
        name: DisplayName,
        sequence: ReceiptLineSequence,
        image: Option<ReceiptImage>,
    ) -> Result<u64, PlaybackError> {
        if self.state != PlaybackState::Idle {
            return Err(PlaybackError::InvalidTransition {
                op: "start",
                state: self.state,
            });
        }
        if sequence.is_empty() {
            return Err(PlaybackError::EmptySequence);
        }

        self.epoch += 1;
        self.state = PlaybackState::Printing;
        self.revealed.clear();
        self.revealed.reserve(sequence.len());
        self.status = None;
        self.analyzing = false;
        self.feedback_active = false;
        self.run = Some(PlaybackRun {
            id: Uuid::new_v4(),
            name,
            sequence,
            image,
            started_at: Utc::now(),
        });

        Ok(self.epoch)
    }

    /// Appends the next line of the active run, or finishes it when none remain.
    pub fn reveal_next(&mut self, epoch: u64) -> Tick {
        if epoch != self.epoch || self.state != PlaybackState::Printing {
            return Tick::Stale;
        }
        let Some(run) = self.run.as_ref() else {
            return Tick::Stale;
        };

        let index = self.revealed.len();
        let Some(line) = run.sequence.get(index) else {
            self.state = PlaybackState::Finished;
            return Tick::Finished;
        };

        let next_delay = match run.sequence.get(index + 1) {
            Some(next) => Duration::from_millis(next.offset_ms.saturating_sub(line.offset_ms)),
            None => LAST_LINE_HOLD,
        };

        self.revealed.push(line.clone());
        self.pulse += 1;
        self.feedback_active = true;

        Tick::Revealed {
            index,
            next_delay,
            pulse: self.pulse,
        }
    }

    /// Reverts the feedback pulse unless a newer one has started.
    pub fn end_pulse(&mut self, pulse: u64) {
        if pulse == self.pulse {
            self.feedback_active = false;
        }
    }

    /// Returns to IDLE from any state, discarding the run.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state = PlaybackState::Idle;
        self.run = None;
        self.revealed.clear();
        self.status = None;
        self.analyzing = false;
        self.feedback_active = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            analyzing: self.analyzing,
            status: self.status.clone(),
            run_id: self.run_id(),
            recipient: self.run.as_ref().map(|r| r.name.clone()),
            lines: self.revealed.clone(),
            total_lines: self.run.as_ref().map_or(0, |r| r.sequence.len()),
            feedback_active: self.feedback_active,
        }
    }

    /// The export view; only available once every line has been revealed.
    pub fn export(&self) -> Result<ReceiptExport, PlaybackError> {
        match (&self.run, self.state) {
            (Some(run), PlaybackState::Finished) => Ok(ReceiptExport::new(
                run.id,
                &run.name,
                run.started_at,
                self.revealed.clone(),
                run.image.is_some(),
            )),
            _ => Err(PlaybackError::InvalidTransition {
                op: "export the receipt",
                state: self.state,
            }),
        }
    }

    pub fn export_image(&self) -> Result<Option<ReceiptImage>, PlaybackError> {
        match (&self.run, self.state) {
            (Some(run), PlaybackState::Finished) => Ok(run.image.clone()),
            _ => Err(PlaybackError::InvalidTransition {
                op: "export the photo",
                state: self.state,
            }),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
