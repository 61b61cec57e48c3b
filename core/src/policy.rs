//! Mode policies: named bundles of active signals, threshold rules, and a
//! violation action.
//!
//! Exactly two modes exist. Aggressive blocks on sight and watches every
//! hard signal; Smart tolerates VPNs, watches a narrow behavioural set,
//! and only flags traffic for review.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::rule::{RuleSet, ThresholdRule, TimeSpan, TimeUnit, SPAM_CLICK_PRESETS};
use crate::signal::{self, Severity, SignalKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Aggressive,
    Smart,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Aggressive => "aggressive",
            Mode::Smart => "smart",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.to_ascii_lowercase().as_str() {
            "aggressive" => Ok(Mode::Aggressive),
            "smart" => Ok(Mode::Smart),
            other => Err(Error::not_found("mode", other)),
        }
    }
}

/// What a violation does to the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnViolation {
    Block,
    Review,
}

/// One mode's complete evaluation posture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModePolicy {
    pub mode: Mode,
    pub on_violation: OnViolation,
    /// Treat VPN traffic as acceptable and skip the `vpn_detected` signal.
    pub allow_vpn: bool,
    pub active_signals: BTreeSet<SignalKey>,
    pub rules: RuleSet,
}

impl ModePolicy {
    /// Block mode: every hard signal armed, tight thresholds, VPNs hostile.
    pub fn aggressive_default() -> Self {
        let active_signals = signal::catalog()
            .iter()
            .filter(|s| s.severity == Severity::Hard)
            .map(|s| s.key)
            .collect();
        let (spam_clicks, spam_window) = SPAM_CLICK_PRESETS[0];
        Self {
            mode: Mode::Aggressive,
            on_violation: OnViolation::Block,
            allow_vpn: false,
            active_signals,
            rules: RuleSet {
                rules: vec![
                    ThresholdRule::bounce_rate("bounce_rate", 6),
                    ThresholdRule::click_ip_ratio(
                        "click_ip_ratio",
                        2,
                        TimeSpan::new(1, TimeUnit::Hour),
                    ),
                    ThresholdRule::spam_clicks("spam_clicks", spam_clicks, spam_window),
                ],
            },
        }
    }

    /// Review mode: behavioural signals only, looser thresholds, VPNs
    /// tolerated. Never blocks.
    pub fn smart_default() -> Self {
        let active_signals = [
            SignalKey::GeoMismatch,
            SignalKey::EmulatorDetected,
            SignalKey::NoMouseMovement,
            SignalKey::NoScroll,
            SignalKey::SuperhumanTyping,
            SignalKey::TimezoneMismatch,
        ]
        .into_iter()
        .collect();
        let (spam_clicks, spam_window) = SPAM_CLICK_PRESETS[0];
        Self {
            mode: Mode::Smart,
            on_violation: OnViolation::Review,
            allow_vpn: true,
            active_signals,
            rules: RuleSet {
                rules: vec![
                    ThresholdRule::bounce_rate("bounce_rate", 10),
                    ThresholdRule::click_ip_ratio(
                        "click_ip_ratio",
                        5,
                        TimeSpan::new(1, TimeUnit::Hour),
                    ),
                    ThresholdRule::spam_clicks("spam_clicks", spam_clicks, spam_window),
                ],
            },
        }
    }
}

/// Both policies plus the mode evaluation currently runs under.
///
/// Holding one policy per mode as a plain field keeps lookups infallible;
/// unknown mode names are rejected earlier, when parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySet {
    pub active: Mode,
    pub aggressive: ModePolicy,
    pub smart: ModePolicy,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            active: Mode::Smart,
            aggressive: ModePolicy::aggressive_default(),
            smart: ModePolicy::smart_default(),
        }
    }
}

impl PolicySet {
    pub fn activate(&mut self, mode: Mode) {
        self.active = mode;
    }

    pub fn active_policy(&self) -> &ModePolicy {
        self.policy(self.active)
    }

    pub fn policy(&self, mode: Mode) -> &ModePolicy {
        match mode {
            Mode::Aggressive => &self.aggressive,
            Mode::Smart => &self.smart,
        }
    }

    pub fn policy_mut(&mut self, mode: Mode) -> &mut ModePolicy {
        match mode {
            Mode::Aggressive => &mut self.aggressive,
            Mode::Smart => &mut self.smart,
        }
    }
}
