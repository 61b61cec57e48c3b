use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::policy::{Mode, ModePolicy, OnViolation, PolicySet};
use crate::rule::{RuleSet, ThresholdRule};
use crate::signal::SignalKey;
use crate::whitelist::Whitelist;

/// The whole configuration document. Every section is optional; an empty
/// file yields the built-in policies.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClickGuardConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default = "default_active_mode")]
    pub active_mode: Mode,
    #[serde(default)]
    pub policies: PoliciesConfig,
    #[serde(default)]
    pub whitelist: Whitelist,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl Default for ClickGuardConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            active_mode: default_active_mode(),
            policies: PoliciesConfig::default(),
            whitelist: Whitelist::default(),
            agents: Vec::new(),
            actions: ActionsConfig::default(),
        }
    }
}

fn default_active_mode() -> Mode {
    Mode::Smart
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Ring-buffer capacity for flagged verdicts kept in memory.
    #[serde(default = "default_verdict_log_size")]
    pub verdict_log_size: usize,
    #[serde(default)]
    pub rate_limit_per_second: Option<u32>, // None = unlimited
    #[serde(default)]
    pub api_keys: Vec<String>, // API keys from config file
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            verdict_log_size: default_verdict_log_size(),
            rate_limit_per_second: None,
            api_keys: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_verdict_log_size() -> usize {
    512
}

/// One section per mode; a missing section falls back to that mode's
/// built-in defaults.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PoliciesConfig {
    #[serde(default = "default_aggressive")]
    pub aggressive: PolicyConfig,
    #[serde(default = "default_smart")]
    pub smart: PolicyConfig,
}

impl Default for PoliciesConfig {
    fn default() -> Self {
        Self {
            aggressive: default_aggressive(),
            smart: default_smart(),
        }
    }
}

fn default_aggressive() -> PolicyConfig {
    ModePolicy::aggressive_default().into()
}

fn default_smart() -> PolicyConfig {
    ModePolicy::smart_default().into()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PolicyConfig {
    pub on_violation: OnViolation,
    #[serde(default)]
    pub allow_vpn: bool,
    #[serde(default)]
    pub active_signals: Vec<SignalKey>,
    #[serde(default)]
    pub rules: Vec<ThresholdRule>,
}

impl From<ModePolicy> for PolicyConfig {
    fn from(policy: ModePolicy) -> Self {
        Self {
            on_violation: policy.on_violation,
            allow_vpn: policy.allow_vpn,
            active_signals: policy.active_signals.into_iter().collect(),
            rules: policy.rules.rules,
        }
    }
}

impl PolicyConfig {
    fn build_policy(&self, mode: Mode) -> Result<ModePolicy> {
        let rules = RuleSet::from_rules(self.rules.clone())?;
        Ok(ModePolicy {
            mode,
            on_violation: self.on_violation,
            allow_vpn: self.allow_vpn,
            active_signals: self.active_signals.iter().copied().collect(),
            rules,
        })
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub r#type: String, // "logger", "webhook"
    pub url: Option<String>,
    pub template: Option<String>, // Handlebars template for webhook payloads
}

/// Which agents fire on which outcome.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ActionsConfig {
    #[serde(default)]
    pub on_block: Vec<String>,
    #[serde(default)]
    pub on_review: Vec<String>,
}

impl ClickGuardConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let config: ClickGuardConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        use std::collections::HashSet;

        if self.service.verdict_log_size == 0 {
            anyhow::bail!("verdict_log_size must be greater than zero");
        }

        // Validate agents
        let mut agent_names = HashSet::new();
        for agent in &self.agents {
            if !agent_names.insert(&agent.name) {
                anyhow::bail!("Duplicate agent name: {}", agent.name);
            }
            match agent.r#type.as_str() {
                "logger" => {}
                "webhook" => {
                    if agent.url.is_none() {
                        anyhow::bail!("Webhook agent '{}' missing URL", agent.name);
                    }
                }
                other => {
                    anyhow::bail!("Agent '{}' has unknown type '{}'", agent.name, other);
                }
            }
        }

        // Validate action bindings
        for name in self.actions.on_block.iter().chain(&self.actions.on_review) {
            if !agent_names.contains(name) {
                anyhow::bail!("Action binding references unknown agent '{}'", name);
            }
        }

        // Validate rules per policy
        for policy in [&self.policies.aggressive, &self.policies.smart] {
            let mut rule_ids = HashSet::new();
            for rule in &policy.rules {
                if !rule_ids.insert(&rule.id) {
                    anyhow::bail!("Duplicate rule ID: {}", rule.id);
                }
                rule.validate()?;
            }
        }

        Ok(())
    }

    /// Assemble the core policy set this document describes.
    pub fn build_policy_set(&self) -> Result<PolicySet> {
        Ok(PolicySet {
            active: self.active_mode,
            aggressive: self.policies.aggressive.build_policy(Mode::Aggressive)?,
            smart: self.policies.smart.build_policy(Mode::Smart)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_reproduces_builtin_policies() {
        let config: ClickGuardConfig = serde_yaml::from_str("{}").unwrap();
        config.validate().unwrap();

        let set = config.build_policy_set().unwrap();
        assert_eq!(set, PolicySet::default());
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.verdict_log_size, 512);
        assert!(config.service.rate_limit_per_second.is_none());
    }

    #[test]
    fn test_full_document() {
        let yaml = r#"
service:
  host: "127.0.0.1"
  port: 9090
  verdict_log_size: 64
  rate_limit_per_second: 200

active_mode: aggressive

policies:
  smart:
    on_violation: review
    allow_vpn: true
    active_signals: ["no_mouse_movement", "timezone_mismatch"]
    rules:
      - id: "bounce_rate"
        kind: "bounce_rate"
        min_visit_secs: 12
      - id: "spam_clicks"
        kind: "spam_clicks"
        clicks: 4
        window: { value: 10, unit: "second" }
        enabled: false

whitelist:
  ips: ["10.0.0.7"]
  user_ids: ["partner-qa"]

agents:
  - name: "audit"
    type: "logger"
  - name: "ops"
    type: "webhook"
    url: "https://hooks.example.com/fraud"

actions:
  on_block: ["audit", "ops"]
  on_review: ["audit"]
"#;

        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.service.port, 9090);
        assert_eq!(config.active_mode, Mode::Aggressive);
        assert_eq!(config.actions.on_block, vec!["audit", "ops"]);

        let set = config.build_policy_set().unwrap();
        assert_eq!(set.active, Mode::Aggressive);
        // Aggressive section omitted, so it stays at the built-in default.
        assert_eq!(set.aggressive, ModePolicy::aggressive_default());

        let smart = &set.smart;
        assert_eq!(smart.active_signals.len(), 2);
        assert_eq!(smart.rules.len(), 2);
        assert!(!smart.rules.get("spam_clicks").unwrap().enabled);
    }

    #[test]
    fn test_duplicate_agent_name_rejected() {
        let yaml = r#"
agents:
  - name: "audit"
    type: "logger"
  - name: "audit"
    type: "logger"
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate agent name"));
    }

    #[test]
    fn test_webhook_agent_requires_url() {
        let yaml = r#"
agents:
  - name: "ops"
    type: "webhook"
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("missing URL"));
    }

    #[test]
    fn test_unknown_agent_type_rejected() {
        let yaml = r#"
agents:
  - name: "pager"
    type: "carrier_pigeon"
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_action_binding_must_name_a_known_agent() {
        let yaml = r#"
actions:
  on_review: ["ghost"]
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_zero_window_rule_rejected() {
        let yaml = r#"
policies:
  smart:
    on_violation: review
    rules:
      - id: "spam_clicks"
        kind: "spam_clicks"
        clicks: 6
        window: { value: 0, unit: "second" }
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_rule_id_rejected() {
        let yaml = r#"
policies:
  aggressive:
    on_violation: block
    rules:
      - id: "bounce_rate"
        kind: "bounce_rate"
        min_visit_secs: 6
      - id: "bounce_rate"
        kind: "bounce_rate"
        min_visit_secs: 8
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate rule ID"));
    }

    #[test]
    fn test_unknown_signal_key_fails_to_parse() {
        let yaml = r#"
policies:
  smart:
    on_violation: review
    active_signals: ["mind_reading"]
"#;
        assert!(serde_yaml::from_str::<ClickGuardConfig>(yaml).is_err());
    }

    #[test]
    fn test_zero_verdict_log_rejected() {
        let yaml = r#"
service:
  verdict_log_size: 0
"#;
        let config: ClickGuardConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }
}
