//! Bounded in-memory log of flagged traffic.
//!
//! Holds the most recent non-Allow verdicts for review over the HTTP API.
//! This is a diagnostic window, not persistence: durable storage of
//! verdicts belongs to whatever consumes the webhook stream.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use clickguard_core::{Activation, Mode, Outcome, SignalKey};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct VerdictRecord {
    pub id: Uuid,
    pub at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_id: Option<String>,
    pub mode: Mode,
    pub outcome: Outcome,
    pub triggered_signals: Vec<SignalKey>,
    pub triggered_rules: Vec<String>,
}

impl VerdictRecord {
    pub fn from_activation(activation: &Activation) -> Self {
        Self {
            id: activation.evaluation_id,
            at: activation.at,
            ip: activation.ip.clone(),
            user_id: activation.user_id.clone(),
            mode: activation.mode,
            outcome: activation.outcome,
            triggered_signals: activation.triggered_signals.clone(),
            triggered_rules: activation.triggered_rules.clone(),
        }
    }
}

pub struct VerdictLog {
    capacity: usize,
    entries: Mutex<VecDeque<VerdictRecord>>,
}

impl VerdictLog {
    /// Config validation keeps the capacity non-zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn push(&self, record: VerdictRecord) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(record);
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<VerdictRecord> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
