use clickguard_core::{Outcome, Verdict};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// Simple histogram for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<(f64, AtomicU64)>, // (upper_bound, count)
}

impl Histogram {
    fn new() -> Self {
        // Standard Prometheus buckets: 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1, 2.5, 5, 10
        let bounds = vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
        Self {
            buckets: bounds.into_iter().map(|b| (b, AtomicU64::new(0))).collect(),
        }
    }

    fn record(&self, value: f64) {
        for (bound, count) in &self.buckets {
            if value <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets - increment the last one (infinity bucket)
        if let Some((_, count)) = self.buckets.last() {
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .map(|(bound, count)| (*bound, count.load(Ordering::Relaxed)))
            .collect()
    }

    fn to_prometheus(&self, name: &str, labels: &str) -> String {
        let snapshot = self.snapshot();
        let total: u64 = snapshot.iter().map(|(_, c)| c).sum();
        let mut output = format!("# HELP {}_seconds Duration histogram.\n", name);
        output.push_str(&format!("# TYPE {}_seconds histogram\n", name));
        for (bound, count) in snapshot {
            output.push_str(&format!(
                "{}{{le=\"{}\",{}}} {}\n",
                name, bound, labels, count
            ));
        }
        output.push_str(&format!("{}{{le=\"+Inf\",{}}} {}\n", name, labels, total));
        output
    }
}

pub struct SystemMetrics {
    pub evaluations_total: AtomicU64,
    pub allowed_total: AtomicU64,
    pub blocked_total: AtomicU64,
    pub reviewed_total: AtomicU64,
    pub invalid_events: AtomicU64,
    pub whitelist_hits: AtomicU64,
    pub agent_failures: AtomicU64,
    pub signal_triggers: Mutex<HashMap<String, AtomicU64>>,
    pub rule_triggers: Mutex<HashMap<String, AtomicU64>>,
    pub evaluation_duration: Histogram,
}

impl SystemMetrics {
    pub fn new() -> Self {
        Self {
            evaluations_total: AtomicU64::new(0),
            allowed_total: AtomicU64::new(0),
            blocked_total: AtomicU64::new(0),
            reviewed_total: AtomicU64::new(0),
            invalid_events: AtomicU64::new(0),
            whitelist_hits: AtomicU64::new(0),
            agent_failures: AtomicU64::new(0),
            signal_triggers: Mutex::new(HashMap::new()),
            rule_triggers: Mutex::new(HashMap::new()),
            evaluation_duration: Histogram::new(),
        }
    }

    /// Count one finished evaluation: the outcome plus everything that
    /// triggered on the way to it.
    pub fn record_verdict(&self, verdict: &Verdict) {
        self.evaluations_total.fetch_add(1, Ordering::Relaxed);
        match verdict.outcome {
            Outcome::Allow => &self.allowed_total,
            Outcome::Block => &self.blocked_total,
            Outcome::Review => &self.reviewed_total,
        }
        .fetch_add(1, Ordering::Relaxed);

        let mut signals = self.signal_triggers.lock().unwrap();
        for key in &verdict.triggered_signals {
            signals
                .entry(key.as_str().to_string())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
        drop(signals);

        let mut rules = self.rule_triggers.lock().unwrap();
        for id in &verdict.triggered_rules {
            rules
                .entry(id.clone())
                .or_insert_with(|| AtomicU64::new(0))
                .fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_evaluation_duration(&self, duration_secs: f64) {
        self.evaluation_duration.record(duration_secs);
    }

    pub fn record_invalid_event(&self) {
        self.invalid_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_whitelist_hit(&self) {
        self.whitelist_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_agent_failure(&self) {
        self.agent_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let signal_triggers: HashMap<String, u64> = self
            .signal_triggers
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        let rule_triggers: HashMap<String, u64> = self
            .rule_triggers
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        MetricsSnapshot {
            evaluations_total: self.evaluations_total.load(Ordering::Relaxed),
            allowed_total: self.allowed_total.load(Ordering::Relaxed),
            blocked_total: self.blocked_total.load(Ordering::Relaxed),
            reviewed_total: self.reviewed_total.load(Ordering::Relaxed),
            invalid_events: self.invalid_events.load(Ordering::Relaxed),
            whitelist_hits: self.whitelist_hits.load(Ordering::Relaxed),
            agent_failures: self.agent_failures.load(Ordering::Relaxed),
            signal_triggers,
            rule_triggers,
        }
    }

    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = format!(
            "# HELP clickguard_evaluations_total Total number of visits evaluated.\n\
             # TYPE clickguard_evaluations_total counter\n\
             clickguard_evaluations_total {}\n\
             # HELP clickguard_allowed_total Total number of visits allowed.\n\
             # TYPE clickguard_allowed_total counter\n\
             clickguard_allowed_total {}\n\
             # HELP clickguard_blocked_total Total number of visits blocked.\n\
             # TYPE clickguard_blocked_total counter\n\
             clickguard_blocked_total {}\n\
             # HELP clickguard_reviewed_total Total number of visits flagged for review.\n\
             # TYPE clickguard_reviewed_total counter\n\
             clickguard_reviewed_total {}\n\
             # HELP clickguard_invalid_events_total Total number of malformed events rejected.\n\
             # TYPE clickguard_invalid_events_total counter\n\
             clickguard_invalid_events_total {}\n\
             # HELP clickguard_whitelist_hits_total Total number of whitelisted visits.\n\
             # TYPE clickguard_whitelist_hits_total counter\n\
             clickguard_whitelist_hits_total {}\n\
             # HELP clickguard_agent_failures_total Total number of failed agent executions.\n\
             # TYPE clickguard_agent_failures_total counter\n\
             clickguard_agent_failures_total {}\n",
            snapshot.evaluations_total,
            snapshot.allowed_total,
            snapshot.blocked_total,
            snapshot.reviewed_total,
            snapshot.invalid_events,
            snapshot.whitelist_hits,
            snapshot.agent_failures
        );

        // Add per-signal metrics
        output.push_str("# HELP clickguard_signal_triggers_total Total triggers per signal.\n");
        output.push_str("# TYPE clickguard_signal_triggers_total counter\n");
        for (key, count) in &snapshot.signal_triggers {
            output.push_str(&format!(
                "clickguard_signal_triggers_total{{signal=\"{}\"}} {}\n",
                key, count
            ));
        }

        // Add per-rule metrics
        output.push_str("# HELP clickguard_rule_triggers_total Total triggers per rule.\n");
        output.push_str("# TYPE clickguard_rule_triggers_total counter\n");
        for (rule_id, count) in &snapshot.rule_triggers {
            output.push_str(&format!(
                "clickguard_rule_triggers_total{{rule_id=\"{}\"}} {}\n",
                rule_id, count
            ));
        }

        // Add histogram metrics
        output.push_str(
            &self
                .evaluation_duration
                .to_prometheus("clickguard_evaluation_duration", ""),
        );

        output
    }
}

#[derive(Debug, serde::Serialize)]
pub struct MetricsSnapshot {
    pub evaluations_total: u64,
    pub allowed_total: u64,
    pub blocked_total: u64,
    pub reviewed_total: u64,
    pub invalid_events: u64,
    pub whitelist_hits: u64,
    pub agent_failures: u64,
    pub signal_triggers: HashMap<String, u64>,
    pub rule_triggers: HashMap<String, u64>,
}

lazy_static::lazy_static! {
    pub static ref METRICS: SystemMetrics = SystemMetrics::new();
}
