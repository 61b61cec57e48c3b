//! Threshold rules over visit history.
//!
//! Unlike catalog signals, rules are editable at runtime: each policy owns a
//! rule set that can be upserted and toggled through the API. Every rule
//! carries its parameters in a tagged variant, so a bounce rule physically
//! cannot hold click-ratio fields.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Granularity of a rule window. Each window uses exactly one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
}

impl TimeUnit {
    pub fn seconds(&self) -> u64 {
        match self {
            TimeUnit::Second => 1,
            TimeUnit::Minute => 60,
            TimeUnit::Hour => 3_600,
            TimeUnit::Day => 86_400,
            TimeUnit::Week => 604_800,
        }
    }
}

/// A duration expressed as `value` of a single [`TimeUnit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub value: u32,
    pub unit: TimeUnit,
}

impl TimeSpan {
    pub fn new(value: u32, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn as_secs(&self) -> u64 {
        u64::from(self.value) * self.unit.seconds()
    }
}

/// Spam-click escalation ladder: burst detection over progressively longer
/// windows with higher tolerances. The first entry is the built-in
/// `spam_clicks` default; subsequent entries suit stricter campaign audits.
pub const SPAM_CLICK_PRESETS: [(u32, TimeSpan); 4] = [
    (6, TimeSpan { value: 3, unit: TimeUnit::Second }),
    (16, TimeSpan { value: 2, unit: TimeUnit::Hour }),
    (70, TimeSpan { value: 4, unit: TimeUnit::Day }),
    (200, TimeSpan { value: 2, unit: TimeUnit::Week }),
];

/// Parameters for one rule kind. The tag keeps parameters and kind fused:
/// deserializing a `spam_clicks` rule with bounce fields is a type error,
/// not a silently ignored field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleParams {
    /// Visits shorter than `min_visit_secs` count as bounces.
    BounceRate { min_visit_secs: u32 },
    /// Too many clicks from one IP across a long window.
    ClickIpRatio { clicks: u32, window: TimeSpan },
    /// A burst of clicks inside a short window.
    SpamClicks { clicks: u32, window: TimeSpan },
}

impl RuleParams {
    pub fn kind(&self) -> &'static str {
        match self {
            RuleParams::BounceRate { .. } => "bounce_rate",
            RuleParams::ClickIpRatio { .. } => "click_ip_ratio",
            RuleParams::SpamClicks { .. } => "spam_clicks",
        }
    }
}

/// One editable rule: identity, switch, parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub params: RuleParams,
}

fn default_enabled() -> bool {
    true
}

impl ThresholdRule {
    pub fn bounce_rate(id: impl Into<String>, min_visit_secs: u32) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            params: RuleParams::BounceRate { min_visit_secs },
        }
    }

    pub fn click_ip_ratio(id: impl Into<String>, clicks: u32, window: TimeSpan) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            params: RuleParams::ClickIpRatio { clicks, window },
        }
    }

    pub fn spam_clicks(id: impl Into<String>, clicks: u32, window: TimeSpan) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            params: RuleParams::SpamClicks { clicks, window },
        }
    }

    /// Reject zero-width windows. Thresholds themselves may be zero (an
    /// unsigned zero is the floor, not an error), but a window of no
    /// length could never hold a click. Disabled rules are held to the
    /// same standard so that enabling one later cannot introduce a bad
    /// configuration.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::invalid_rule(&self.id, "id must not be empty"));
        }
        match &self.params {
            RuleParams::BounceRate { .. } => {}
            RuleParams::ClickIpRatio { window, .. } | RuleParams::SpamClicks { window, .. } => {
                if window.value == 0 {
                    return Err(Error::invalid_rule(
                        &self.id,
                        "window value must be greater than zero",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// An ordered collection of threshold rules with unique ids.
///
/// Mutations validate before touching the collection, so a failed upsert
/// leaves the set exactly as it was.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    pub(crate) rules: Vec<ThresholdRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from rules, rejecting invalid entries and duplicate ids.
    pub fn from_rules(rules: Vec<ThresholdRule>) -> Result<Self> {
        let mut set = Self::new();
        for rule in rules {
            if set.get(&rule.id).is_some() {
                return Err(Error::invalid_rule(&rule.id, "duplicate rule id"));
            }
            set.upsert(rule)?;
        }
        Ok(set)
    }

    /// Insert a rule, or replace the existing rule with the same id in
    /// place. Replacement keeps the rule's position stable.
    pub fn upsert(&mut self, rule: ThresholdRule) -> Result<()> {
        rule.validate()?;
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
        Ok(())
    }

    /// Enable or disable a rule by id.
    pub fn toggle(&mut self, id: &str, enabled: bool) -> Result<()> {
        match self.rules.iter_mut().find(|r| r.id == id) {
            Some(rule) => {
                rule.enabled = enabled;
                Ok(())
            }
            None => Err(Error::not_found("rule", id)),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ThresholdRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThresholdRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rules that actually apply to evaluation: enabled ones, in
    /// declaration order.
    pub fn normalize(&self) -> impl Iterator<Item = &ThresholdRule> {
        self.rules.iter().filter(|r| r.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_span_as_secs() {
        assert_eq!(TimeSpan::new(3, TimeUnit::Second).as_secs(), 3);
        assert_eq!(TimeSpan::new(2, TimeUnit::Hour).as_secs(), 7_200);
        assert_eq!(TimeSpan::new(4, TimeUnit::Day).as_secs(), 345_600);
        assert_eq!(TimeSpan::new(2, TimeUnit::Week).as_secs(), 1_209_600);
    }

    #[test]
    fn test_spam_click_presets_build_valid_rules() {
        for (i, (clicks, window)) in SPAM_CLICK_PRESETS.iter().enumerate() {
            let rule = ThresholdRule::spam_clicks(format!("preset_{}", i), *clicks, *window);
            assert!(rule.validate().is_ok());
        }
        // The ladder starts at the built-in default.
        assert_eq!(SPAM_CLICK_PRESETS[0], (6, TimeSpan::new(3, TimeUnit::Second)));
    }

    #[test]
    fn test_rule_kind_tag_on_the_wire() {
        let rule = ThresholdRule::spam_clicks("spam_clicks", 6, TimeSpan::new(3, TimeUnit::Second));
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["kind"], "spam_clicks");
        assert_eq!(json["clicks"], 6);
        assert_eq!(json["window"]["unit"], "second");

        let back: ThresholdRule = serde_json::from_value(json).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_mismatched_fields_fail_to_deserialize() {
        let json = serde_json::json!({
            "id": "bounce_rate",
            "kind": "bounce_rate",
            "clicks": 6,
            "window": {"value": 3, "unit": "second"}
        });
        assert!(serde_json::from_value::<ThresholdRule>(json).is_err());
    }

    #[test]
    fn test_enabled_defaults_to_true() {
        let json = serde_json::json!({
            "id": "bounce_rate",
            "kind": "bounce_rate",
            "min_visit_secs": 6
        });
        let rule: ThresholdRule = serde_json::from_value(json).unwrap();
        assert!(rule.enabled);
    }

    #[test]
    fn test_validate_rejects_zero_window() {
        let rule = ThresholdRule::spam_clicks("spam_clicks", 6, TimeSpan::new(0, TimeUnit::Second));
        let err = rule.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }

    #[test]
    fn test_validate_rejects_blank_id() {
        let rule = ThresholdRule::bounce_rate("  ", 6);
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_zero_thresholds_are_storable() {
        // Unsigned zero is a floor, not a configuration error.
        let rule = ThresholdRule::click_ip_ratio("click_ip_ratio", 0, TimeSpan::new(1, TimeUnit::Hour));
        assert!(rule.validate().is_ok());

        let rule = ThresholdRule::bounce_rate("bounce_rate", 0);
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_failed_upsert_leaves_set_unchanged() {
        let mut set =
            RuleSet::from_rules(vec![ThresholdRule::bounce_rate("bounce_rate", 6)]).unwrap();
        let before = set.clone();

        let err = set
            .upsert(ThresholdRule::spam_clicks(
                "spam_clicks",
                6,
                TimeSpan::new(0, TimeUnit::Second),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
        assert_eq!(set, before);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut set = RuleSet::from_rules(vec![
            ThresholdRule::bounce_rate("bounce_rate", 6),
            ThresholdRule::spam_clicks("spam_clicks", 6, TimeSpan::new(3, TimeUnit::Second)),
        ])
        .unwrap();

        set.upsert(ThresholdRule::bounce_rate("bounce_rate", 10)).unwrap();
        let ids: Vec<_> = set.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["bounce_rate", "spam_clicks"]);
        assert_eq!(
            set.get("bounce_rate").unwrap().params,
            RuleParams::BounceRate { min_visit_secs: 10 }
        );
    }

    #[test]
    fn test_toggle_unknown_rule_is_not_found() {
        let mut set = RuleSet::new();
        let err = set.toggle("ghost", false).unwrap_err();
        assert_eq!(err, Error::not_found("rule", "ghost"));
    }

    #[test]
    fn test_normalize_skips_disabled() {
        let mut set = RuleSet::from_rules(vec![
            ThresholdRule::bounce_rate("bounce_rate", 6),
            ThresholdRule::spam_clicks("spam_clicks", 6, TimeSpan::new(3, TimeUnit::Second)),
        ])
        .unwrap();
        set.toggle("bounce_rate", false).unwrap();

        let active: Vec<_> = set.normalize().map(|r| r.id.as_str()).collect();
        assert_eq!(active, vec!["spam_clicks"]);
    }

    #[test]
    fn test_from_rules_rejects_duplicates() {
        let err = RuleSet::from_rules(vec![
            ThresholdRule::bounce_rate("bounce_rate", 6),
            ThresholdRule::bounce_rate("bounce_rate", 10),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidRule { .. }));
    }
}
