//! Copy-on-write policy storage.
//!
//! Readers grab an `Arc` snapshot and evaluate against it for as long as
//! they like; writers clone the whole set, edit the clone, and swap the
//! pointer. An in-flight evaluation therefore never observes a half-applied
//! edit, and a failed edit leaves the published set untouched.

use std::sync::{Arc, RwLock};

use crate::error::Result;
use crate::policy::{Mode, PolicySet};
use crate::rule::ThresholdRule;

#[derive(Debug, Default)]
pub struct PolicyStore {
    inner: RwLock<Arc<PolicySet>>,
}

impl PolicyStore {
    pub fn new(set: PolicySet) -> Self {
        Self {
            inner: RwLock::new(Arc::new(set)),
        }
    }

    /// The current immutable snapshot. Cheap; clones a pointer.
    pub fn snapshot(&self) -> Arc<PolicySet> {
        self.inner.read().unwrap().clone()
    }

    /// Publish a whole new set, e.g. after a config reload.
    pub fn replace(&self, set: PolicySet) {
        *self.inner.write().unwrap() = Arc::new(set);
    }

    /// Clone, edit, swap. The closure's error discards the clone, so the
    /// published set changes only on success. Mutations are serialized by
    /// the write lock.
    pub fn mutate<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut PolicySet) -> Result<()>,
    {
        let mut guard = self.inner.write().unwrap();
        let mut next = PolicySet::clone(&guard);
        f(&mut next)?;
        *guard = Arc::new(next);
        Ok(())
    }

    pub fn upsert_rule(&self, mode: Mode, rule: ThresholdRule) -> Result<()> {
        self.mutate(|set| set.policy_mut(mode).rules.upsert(rule))
    }

    pub fn toggle_rule(&self, mode: Mode, id: &str, enabled: bool) -> Result<()> {
        self.mutate(|set| set.policy_mut(mode).rules.toggle(id, enabled))
    }

    pub fn activate(&self, mode: Mode) {
        let mut guard = self.inner.write().unwrap();
        let mut next = PolicySet::clone(&guard);
        next.activate(mode);
        *guard = Arc::new(next);
    }
}
