//! # ClickGuard Core - Click-Fraud Rule Evaluation
//!
//! ClickGuard's core library: a fixed catalog of fraud signals, editable
//! threshold rules over click history, and two evaluation modes with
//! different appetites for blocking. Evaluation is pure and synchronous;
//! everything async (HTTP, agents) lives in the surrounding crates.
//!
//! ## Quick Start
//!
//! ```
//! use clickguard_core::{evaluate_visit, ModePolicy, Outcome, VisitEvent};
//!
//! # fn main() -> Result<(), clickguard_core::Error> {
//! let event = VisitEvent {
//!     vpn: Some(true),
//!     ..VisitEvent::default()
//! };
//!
//! let verdict = evaluate_visit(&event, &ModePolicy::aggressive_default())?;
//! assert_eq!(verdict.outcome, Outcome::Block);
//! assert_eq!(verdict.triggered_signals.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Signal Catalog**: sixteen binary fraud indicators, fixed at build time
//! - **Tagged Threshold Rules**: bounce rate, click/IP ratio, and spam-click
//!   rules whose parameters cannot be mixed up
//! - **Two Modes**: Aggressive blocks on sight, Smart flags for review
//! - **Copy-on-Write Policies**: readers evaluate against immutable
//!   snapshots while edits swap in atomically

pub mod agent;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod policy;
pub mod rule;
pub mod signal;
pub mod store;
pub mod verdict;
pub mod whitelist;

pub use agent::{Activation, Agent};
pub use config::ClickGuardConfig;
pub use error::{Error, Result};
pub use evaluator::evaluate_visit;
pub use event::VisitEvent;
pub use policy::{Mode, ModePolicy, OnViolation, PolicySet};
pub use rule::{RuleParams, RuleSet, ThresholdRule, TimeSpan, TimeUnit, SPAM_CLICK_PRESETS};
pub use signal::{Severity, Signal, SignalKey};
pub use store::PolicyStore;
pub use verdict::{Outcome, Verdict};
pub use whitelist::Whitelist;
