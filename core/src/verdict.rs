//! Evaluation results.

use serde::{Deserialize, Serialize};

use crate::signal::SignalKey;

/// Final disposition for one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Allow,
    Block,
    Review,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Allow => "allow",
            Outcome::Block => "block",
            Outcome::Review => "review",
        }
    }
}

/// The outcome plus everything that fired on the way to it.
///
/// `triggered_signals` is in catalog order and `triggered_rules` in the
/// rule set's stored order, so equal inputs produce byte-equal verdicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub outcome: Outcome,
    pub triggered_signals: Vec<SignalKey>,
    pub triggered_rules: Vec<String>,
}

impl Verdict {
    /// A clean pass: nothing matched, nothing triggered.
    pub fn allow() -> Self {
        Self {
            outcome: Outcome::Allow,
            triggered_signals: Vec::new(),
            triggered_rules: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.outcome == Outcome::Allow
            && self.triggered_signals.is_empty()
            && self.triggered_rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_verdict_is_clean() {
        assert!(Verdict::allow().is_clean());
    }

    #[test]
    fn test_outcome_wire_names() {
        assert_eq!(serde_json::to_string(&Outcome::Block).unwrap(), "\"block\"");
        assert_eq!(Outcome::Review.as_str(), "review");
    }
}
