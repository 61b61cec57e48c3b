use async_trait::async_trait;
use clickguard_core::agent::{Activation, Agent};
use clickguard_core::config::AgentConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Writes a structured record of every activation to the log stream.
pub struct LoggerAgent;

#[async_trait]
impl Agent for LoggerAgent {
    fn name(&self) -> &str {
        "logger"
    }

    async fn execute(&self, activation: &Activation) -> anyhow::Result<()> {
        let signals: Vec<&str> = activation
            .triggered_signals
            .iter()
            .map(|key| key.as_str())
            .collect();

        info!(
            agent = self.name(),
            evaluation_id = %activation.evaluation_id,
            mode = activation.mode.as_str(),
            outcome = activation.outcome.as_str(),
            signals = ?signals,
            rules = ?activation.triggered_rules,
            ip = activation.ip.as_deref().unwrap_or("-"),
            user_id = activation.user_id.as_deref().unwrap_or("-"),
            "Suspicious visit flagged"
        );
        Ok(())
    }
}

/// POSTs each activation as JSON to a configured URL, optionally shaped by
/// a Handlebars template.
pub struct WebhookAgent {
    pub url: String,
    client: reqwest::Client,
    template: Option<handlebars::Handlebars<'static>>,
}

impl WebhookAgent {
    pub fn new(url: String, template: Option<String>) -> Self {
        // Use connection pooling with proper configuration
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        // Compile Handlebars template if provided
        let compiled_template = template.and_then(|t| {
            let mut handlebars = handlebars::Handlebars::new();
            handlebars.set_strict_mode(true);
            if handlebars.register_template_string("webhook", &t).is_ok() {
                Some(handlebars)
            } else {
                None
            }
        });

        Self {
            url,
            client,
            template: compiled_template,
        }
    }
}

#[async_trait]
impl Agent for WebhookAgent {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn execute(&self, activation: &Activation) -> anyhow::Result<()> {
        let signals: Vec<&str> = activation
            .triggered_signals
            .iter()
            .map(|key| key.as_str())
            .collect();

        // Build template context
        let context = serde_json::json!({
            "evaluation_id": activation.evaluation_id,
            "timestamp": activation.at.to_rfc3339(),
            "mode": activation.mode.as_str(),
            "outcome": activation.outcome.as_str(),
            "triggered_signals": signals,
            "triggered_rules": activation.triggered_rules,
            "trigger_count": signals.len() + activation.triggered_rules.len(),
            "ip": activation.ip,
            "user_id": activation.user_id,
        });

        // Render payload using template or default JSON
        let payload: serde_json::Value = if let Some(ref template) = self.template {
            match template.render("webhook", &context) {
                Ok(rendered) => {
                    // Try to parse as JSON, fallback to string
                    serde_json::from_str(&rendered)
                        .unwrap_or_else(|_| serde_json::json!({ "text": rendered }))
                }
                Err(e) => {
                    warn!(error = %e, "Template rendering failed, using default payload");
                    context
                }
            }
        } else {
            context
        };

        debug!(
            url = %self.url,
            evaluation_id = %activation.evaluation_id,
            "Sending webhook"
        );

        self.client.post(&self.url).json(&payload).send().await?;

        Ok(())
    }
}

/// Construct the configured agents, keyed by their configured names.
pub fn build_agents(configs: &[AgentConfig]) -> anyhow::Result<HashMap<String, Arc<dyn Agent>>> {
    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    for cfg in configs {
        let agent: Arc<dyn Agent> = match cfg.r#type.as_str() {
            "logger" => Arc::new(LoggerAgent),
            "webhook" => {
                let url = cfg
                    .url
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Webhook agent '{}' missing URL", cfg.name))?;
                Arc::new(WebhookAgent::new(url, cfg.template.clone()))
            }
            other => anyhow::bail!("Agent '{}' has unknown type '{}'", cfg.name, other),
        };
        agents.insert(cfg.name.clone(), agent);
    }
    Ok(agents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clickguard_core::policy::Mode;
    use clickguard_core::signal::SignalKey;
    use clickguard_core::verdict::{Outcome, Verdict};

    fn activation() -> Activation {
        let verdict = Verdict {
            outcome: Outcome::Review,
            triggered_signals: vec![SignalKey::NoScroll],
            triggered_rules: vec!["bounce_rate".to_string()],
        };
        Activation::from_verdict(Mode::Smart, &verdict, Some("203.0.113.9".to_string()), None)
    }

    #[tokio::test]
    async fn test_logger_agent_executes() {
        LoggerAgent.execute(&activation()).await.unwrap();
    }

    #[test]
    fn test_build_agents_from_config() {
        let configs = vec![
            AgentConfig {
                name: "audit".to_string(),
                r#type: "logger".to_string(),
                url: None,
                template: None,
            },
            AgentConfig {
                name: "ops".to_string(),
                r#type: "webhook".to_string(),
                url: Some("https://hooks.example.com/fraud".to_string()),
                template: Some(r#"{"text": "{{outcome}} from {{ip}}"}"#.to_string()),
            },
        ];

        let agents = build_agents(&configs).unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents["audit"].name(), "logger");
        assert_eq!(agents["ops"].name(), "webhook");
    }

    #[test]
    fn test_build_agents_rejects_unknown_type() {
        let configs = vec![AgentConfig {
            name: "pager".to_string(),
            r#type: "carrier_pigeon".to_string(),
            url: None,
            template: None,
        }];
        assert!(build_agents(&configs).is_err());
    }

    #[test]
    fn test_webhook_requires_url() {
        let configs = vec![AgentConfig {
            name: "ops".to_string(),
            r#type: "webhook".to_string(),
            url: None,
            template: None,
        }];
        let err = build_agents(&configs).err().unwrap();
        assert!(err.to_string().contains("missing URL"));
    }
}
