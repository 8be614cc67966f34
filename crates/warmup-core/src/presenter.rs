//! Pure derivation of what the waiting screen shows.
//!
//! Nothing here looks at the network. Apart from the terminal Ready/Failed
//! states, every value is a function of elapsed time and the message cycle.

use serde::Serialize;

use crate::clock::Clock;
use crate::config::WarmupConfig;
use crate::poll::{PollState, PollStatus};

pub const TITLE: &str = "PortofAI";
pub const READY_MESSAGE: &str = "Ready to chat!";
pub const FAILED_MESSAGE: &str = "Server is taking longer than expected. Please refresh the page.";
pub const FREE_TIER_NOTE: &str = "Using free tier • Startup time: ~60 seconds";
pub const TIP_TEXT: &str = "Did you know? This AI assistant has real-time access to my latest \
GitHub projects and can answer questions about my skills, experience, and availability.";
pub const ERROR_TEXT: &str =
    "The server is taking longer than expected. Please refresh the page or try again later.";
pub const RELOAD_LABEL: &str = "Refresh Page";

pub const STATUS_MESSAGES: [&str; 10] = [
    "Initializing AI Assistant",
    "Waking up the backend server",
    "Loading portfolio data from GitHub",
    "Connecting to AI services",
    "Preparing conversation engine",
    "Almost ready to chat",
    "Starting up (free tier takes ~60s)",
    "Thank you for your patience",
    "Configuring AI personality",
    "Loading your conversation history",
];

// ─── MessageCycle ─────────────────────────────────────────────────────────

/// Time-driven morale messages, advanced with wraparound.
#[derive(Debug, Clone)]
pub struct MessageCycle {
    messages: &'static [&'static str],
    index: usize,
}

impl MessageCycle {
    pub fn new(messages: &'static [&'static str]) -> Self {
        Self { messages, index: 0 }
    }

    pub fn advance(&mut self) -> &'static str {
        if !self.messages.is_empty() {
            self.index = (self.index + 1) % self.messages.len();
        }
        self.current()
    }

    pub fn current(&self) -> &'static str {
        self.messages.get(self.index).copied().unwrap_or("")
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl Default for MessageCycle {
    fn default() -> Self {
        Self::new(&STATUS_MESSAGES)
    }
}

// ─── ViewModel ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub message: String,
    pub progress_percent: f64,
    pub elapsed_seconds: u64,
    pub show_tip: bool,
    pub show_error: bool,
    pub show_free_tier_note: bool,
    pub attempt: u32,
    pub max_attempts: u32,
    pub status: PollStatus,
}

impl ViewModel {
    /// Progress as shown to the user: rounded to a whole percent.
    pub fn display_percent(&self) -> u32 {
        self.progress_percent.round() as u32
    }
}

/// Linear estimate up to the horizon, then held at the cap.
///
/// This is a display artifact; it says nothing about how close the backend
/// actually is to being ready.
pub fn progress_estimate(elapsed_seconds: u64, config: &WarmupConfig) -> f64 {
    let horizon = config.progress_horizon_secs.max(1) as f64;
    let cap = config.progress_cap;
    (elapsed_seconds as f64 / horizon * cap).min(cap)
}

pub fn present(
    clock: &Clock,
    poll: &PollState,
    cycle: &MessageCycle,
    config: &WarmupConfig,
) -> ViewModel {
    let elapsed = clock.elapsed_seconds();
    let status = poll.status;

    let message = match status {
        PollStatus::Probing => cycle.current(),
        PollStatus::Ready => READY_MESSAGE,
        PollStatus::Failed => FAILED_MESSAGE,
    };

    let progress_percent = match status {
        PollStatus::Ready => 100.0,
        // Failed freezes with the clock: no tick runs after the transition.
        PollStatus::Probing | PollStatus::Failed => progress_estimate(elapsed, config),
    };

    ViewModel {
        message: message.to_string(),
        progress_percent,
        elapsed_seconds: elapsed,
        show_tip: status == PollStatus::Probing
            && elapsed > config.tip_after_secs
            && elapsed < config.tip_before_secs,
        show_error: status == PollStatus::Failed || elapsed > config.failure_margin_secs,
        show_free_tier_note: status != PollStatus::Ready
            && elapsed > config.free_tier_note_after_secs,
        attempt: poll.attempt,
        max_attempts: poll.max_attempts,
        status,
    }
}
