//! The seam between evaluation and the actions taken on flagged traffic.
//!
//! Core produces [`Activation`]s; what happens next (logging, webhooks)
//! lives behind the [`Agent`] trait in a separate crate, so evaluation
//! stays pure and synchronous while actions are async.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::policy::Mode;
use crate::signal::SignalKey;
use crate::verdict::{Outcome, Verdict};

/// Everything an agent needs to act on one flagged visit.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub evaluation_id: Uuid,
    pub at: DateTime<Utc>,
    pub mode: Mode,
    pub outcome: Outcome,
    pub triggered_signals: Vec<SignalKey>,
    pub triggered_rules: Vec<String>,
    pub ip: Option<String>,
    pub user_id: Option<String>,
}

impl Activation {
    pub fn from_verdict(
        mode: Mode,
        verdict: &Verdict,
        ip: Option<String>,
        user_id: Option<String>,
    ) -> Self {
        Self {
            evaluation_id: Uuid::new_v4(),
            at: Utc::now(),
            mode,
            outcome: verdict.outcome,
            triggered_signals: verdict.triggered_signals.clone(),
            triggered_rules: verdict.triggered_rules.clone(),
            ip,
            user_id,
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, activation: &Activation) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_copies_the_verdict() {
        let verdict = Verdict {
            outcome: Outcome::Review,
            triggered_signals: vec![SignalKey::TimezoneMismatch],
            triggered_rules: vec!["bounce_rate".to_string()],
        };
        let activation = Activation::from_verdict(
            Mode::Smart,
            &verdict,
            Some("203.0.113.9".to_string()),
            None,
        );
        assert_eq!(activation.outcome, Outcome::Review);
        assert_eq!(activation.triggered_rules, verdict.triggered_rules);
        assert_eq!(activation.ip.as_deref(), Some("203.0.113.9"));
    }
}
