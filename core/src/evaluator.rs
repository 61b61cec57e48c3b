//! Pure visit evaluation.
//!
//! `evaluate_visit` reads one event and one policy and produces a verdict.
//! No clocks, no I/O, no shared state: the same event against the same
//! policy snapshot always yields the same verdict, which is what makes
//! snapshot-based concurrency safe and replayed audits exact.

use crate::error::Result;
use crate::event::VisitEvent;
use crate::policy::{ModePolicy, OnViolation};
use crate::rule::{RuleParams, ThresholdRule};
use crate::signal::{self, Severity, SignalKey};
use crate::verdict::{Outcome, Verdict};

/// Evaluate one visit against one policy.
///
/// Signals run first, in catalog order, restricted to the policy's active
/// set. Under a blocking policy a matching hard signal is already the
/// answer: evaluation stops there with the signals collected so far and no
/// rules evaluated. Otherwise the enabled threshold rules run in stored
/// order and the outcome is derived from what triggered.
pub fn evaluate_visit(event: &VisitEvent, policy: &ModePolicy) -> Result<Verdict> {
    event.validate()?;

    let mut triggered_signals = Vec::new();
    for signal in signal::catalog() {
        if !policy.active_signals.contains(&signal.key) {
            continue;
        }
        if policy.allow_vpn && signal.key == SignalKey::VpnDetected {
            continue;
        }
        if !signal.key.matches(event) {
            continue;
        }
        triggered_signals.push(signal.key);
        if signal.severity == Severity::Hard && policy.on_violation == OnViolation::Block {
            return Ok(Verdict {
                outcome: Outcome::Block,
                triggered_signals,
                triggered_rules: Vec::new(),
            });
        }
    }

    let triggered_rules: Vec<String> = policy
        .rules
        .normalize()
        .filter(|rule| rule_triggers(rule, event))
        .map(|rule| rule.id.clone())
        .collect();

    // Past the short-circuit, any matched signals are soft (or the policy
    // reviews instead of blocking), so only triggered rules can still
    // cause a block.
    let outcome = if policy.on_violation == OnViolation::Block && !triggered_rules.is_empty() {
        Outcome::Block
    } else if triggered_signals.is_empty() && triggered_rules.is_empty() {
        Outcome::Allow
    } else {
        Outcome::Review
    };

    Ok(Verdict {
        outcome,
        triggered_signals,
        triggered_rules,
    })
}

fn rule_triggers(rule: &ThresholdRule, event: &VisitEvent) -> bool {
    match &rule.params {
        // Strictly less than the minimum: a visit of exactly the minimum
        // length is not a bounce, and an unknown duration never is.
        RuleParams::BounceRate { min_visit_secs } => event
            .visit_duration_secs
            .map_or(false, |duration| duration < f64::from(*min_visit_secs)),
        // An empty window never triggers: a zero threshold still needs at
        // least one observed click.
        RuleParams::ClickIpRatio { clicks, window }
        | RuleParams::SpamClicks { clicks, window } => {
            let count = event.clicks_within(window.as_secs());
            count > 0 && count >= u64::from(*clicks)
        }
    }
}
