pub mod metrics;
pub mod server;
pub mod verdict_log;

use crate::metrics::METRICS;
use crate::verdict_log::{VerdictLog, VerdictRecord};
use anyhow::Result;
use clickguard_core::config::ActionsConfig;
use clickguard_core::{
    evaluate_visit, Activation, Agent, ClickGuardConfig, Mode, Outcome, PolicyStore, Verdict,
    VisitEvent, Whitelist,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info, warn};

/// What happened to a single visit, as reported to API callers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EvaluationReport {
    pub mode: Mode,
    pub whitelisted: bool,
    pub verdict: Verdict,
}

/// The reloadable, non-policy parts of the configuration. Swapped
/// wholesale on SIGHUP so in-flight evaluations keep a coherent view.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub whitelist: Whitelist,
    pub actions: ActionsConfig,
    pub agents: HashMap<String, Arc<dyn Agent>>,
}

impl RuntimeConfig {
    pub fn from_config(config: &ClickGuardConfig) -> Result<Self> {
        Ok(Self {
            whitelist: config.whitelist.clone(),
            actions: config.actions.clone(),
            agents: clickguard_agents::build_agents(&config.agents)?,
        })
    }
}

pub struct ClickGuardService {
    pub policies: PolicyStore,
    runtime: RwLock<Arc<RuntimeConfig>>,
    pub verdict_log: VerdictLog,
    pub started_at: Instant,
}

impl ClickGuardService {
    pub fn from_config(config: &ClickGuardConfig) -> Result<Self> {
        Ok(Self {
            policies: PolicyStore::new(config.build_policy_set()?),
            runtime: RwLock::new(Arc::new(RuntimeConfig::from_config(config)?)),
            verdict_log: VerdictLog::new(config.service.verdict_log_size),
            started_at: Instant::now(),
        })
    }

    pub fn runtime(&self) -> Arc<RuntimeConfig> {
        self.runtime.read().unwrap().clone()
    }

    pub fn add_agent(&self, name: impl Into<String>, agent: Arc<dyn Agent>) {
        let mut guard = self.runtime.write().unwrap();
        let mut next = RuntimeConfig::clone(&guard);
        next.agents.insert(name.into(), agent);
        *guard = Arc::new(next);
    }

    /// Validate the incoming configuration and swap in new policies,
    /// whitelist, actions, and agents. Fails without touching the
    /// running state.
    pub fn reload_from_config(&self, config: &ClickGuardConfig) -> Result<()> {
        info!("🔄 Reloading service configuration...");
        config.validate()?;
        let policy_set = config.build_policy_set()?;
        let runtime = RuntimeConfig::from_config(config)?;

        self.policies.replace(policy_set);
        *self.runtime.write().unwrap() = Arc::new(runtime);

        info!(
            "✅ Service reloaded: active mode '{}', {} agents",
            self.policies.snapshot().active.as_str(),
            self.runtime().agents.len()
        );
        Ok(())
    }

    /// Run one visit through the active policy. Records metrics, logs
    /// flagged verdicts, and fires the agents bound to the outcome.
    pub fn evaluate(&self, event: &VisitEvent) -> clickguard_core::Result<EvaluationReport> {
        let runtime = self.runtime();
        let snapshot = self.policies.snapshot();

        // Whitelisted traffic bypasses evaluation entirely.
        if runtime.whitelist.matches(event) {
            METRICS.record_whitelist_hit();
            return Ok(EvaluationReport {
                mode: snapshot.active,
                whitelisted: true,
                verdict: Verdict::allow(),
            });
        }

        let policy = snapshot.active_policy();
        let started = Instant::now();
        let verdict = match evaluate_visit(event, policy) {
            Ok(verdict) => verdict,
            Err(err) => {
                METRICS.record_invalid_event();
                return Err(err);
            }
        };
        METRICS.record_evaluation_duration(started.elapsed().as_secs_f64());
        METRICS.record_verdict(&verdict);

        if verdict.outcome != Outcome::Allow {
            let activation = Activation::from_verdict(
                policy.mode,
                &verdict,
                event.ip.clone(),
                event.user_id.clone(),
            );
            self.verdict_log
                .push(VerdictRecord::from_activation(&activation));
            self.dispatch_agents(&runtime, activation);
        }

        Ok(EvaluationReport {
            mode: policy.mode,
            whitelisted: false,
            verdict,
        })
    }

    /// Fire the agents bound to this outcome. Failures are logged and
    /// counted; they never change the verdict already returned to the
    /// caller.
    fn dispatch_agents(&self, runtime: &RuntimeConfig, activation: Activation) {
        let bound = match activation.outcome {
            Outcome::Block => &runtime.actions.on_block,
            Outcome::Review => &runtime.actions.on_review,
            Outcome::Allow => return,
        };

        for name in bound {
            let Some(agent) = runtime.agents.get(name) else {
                warn!(agent = %name, "Agent not found for dispatch");
                METRICS.record_agent_failure();
                continue;
            };
            let agent = Arc::clone(agent);
            let activation = activation.clone();
            tokio::spawn(async move {
                if let Err(e) = agent.execute(&activation).await {
                    error!(agent = agent.name(), error = %e, "Agent execution failed");
                    METRICS.record_agent_failure();
                }
            });
        }
    }
}
