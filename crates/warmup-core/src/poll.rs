use serde::{Deserialize, Serialize};

use crate::probe::ProbeOutcome;

// ─── PollStatus ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Probing,
    Ready,
    Failed,
}

impl PollStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, PollStatus::Probing)
    }
}

/// Why the poll ended in [`PollStatus::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// `max_attempts` probes completed without a success.
    AttemptsExhausted,
    /// Elapsed time passed the failure margin first.
    ElapsedOverrun,
    /// The controller task panicked; nothing is polling any more.
    Crashed,
}

/// Result of folding one event into [`PollState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Still probing; the attempt was counted.
    Continue,
    Ready,
    Failed(FailureCause),
    /// The state was already terminal; nothing changed.
    Discarded,
}

// ─── PollState ────────────────────────────────────────────────────────────

/// Attempt counter plus a status that only ever moves forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: PollStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureCause>,
}

impl PollState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            status: PollStatus::Probing,
            failure: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    /// Count one completed probe and move the status accordingly.
    pub fn apply(&mut self, outcome: &ProbeOutcome) -> Transition {
        if self.is_terminal() {
            return Transition::Discarded;
        }
        self.attempt += 1;
        if outcome.is_success() {
            self.status = PollStatus::Ready;
            return Transition::Ready;
        }
        if self.attempts_exhausted() {
            return self.fail(FailureCause::AttemptsExhausted);
        }
        Transition::Continue
    }

    /// Force the terminal failure state. No-op once terminal.
    pub fn fail(&mut self, cause: FailureCause) -> Transition {
        if self.is_terminal() {
            return Transition::Discarded;
        }
        self.status = PollStatus::Failed;
        self.failure = Some(cause);
        Transition::Failed(cause)
    }
}
