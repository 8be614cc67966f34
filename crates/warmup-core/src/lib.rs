//! `warmup-core` — the waiting screen shown while a cold-starting chat
//! backend wakes up.
//!
//! The interesting part is the readiness poller: probes bounded by a
//! per-probe timeout, dispatched on a fixed cadence up to an attempt budget,
//! plus a time-based safety net. Everything the user sees is derived from
//! elapsed time and the poll state by the presenter.
//!
//! # Architecture
//!
//! ```text
//! WarmupScreen::mount(config, prober, on_ready)
//!     │
//!     ▼
//! Controller task  ← owns Clock, MessageCycle, Poller and all timers
//!     │              tokio::select! over tick / rotate / dispatch / probe done
//!     ├─► Poller   ← JoinSet of probes, outcomes applied in dispatch order
//!     │
//!     ▼
//! watch::Sender<Frame> ← presenter output, one frame per event
//!     │
//!     ▼
//! host renders frames; on_ready fires once after the grace delay
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warmup_core::{HttpProber, Outcome, WarmupConfig, WarmupScreen};
//!
//! let config = WarmupConfig::default();
//! let prober = Arc::new(HttpProber::new(&config)?);
//! let mut screen = WarmupScreen::mount(config, prober, || println!("ready"))?;
//! match screen.finished().await {
//!     Outcome::Ready => {}
//!     Outcome::Failed(cause) => eprintln!("gave up: {cause:?}"),
//!     Outcome::Unmounted => {}
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod poll;
pub mod poller;
pub mod presenter;
pub mod probe;

pub use config::{ConfigWarning, WarmupConfig, WarnLevel};
pub use error::{Result, WarmupError};
pub use lifecycle::{Frame, Outcome, Phase, ReadyCallback, WarmupScreen};
pub use poll::{FailureCause, PollState, PollStatus, Transition};
pub use presenter::{present, progress_estimate, MessageCycle, ViewModel};
pub use probe::{HttpProber, ProbeFailure, ProbeOutcome, Prober};
