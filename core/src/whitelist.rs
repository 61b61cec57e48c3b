//! Known-good traffic that bypasses evaluation entirely.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::event::VisitEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Whitelist {
    pub ips: BTreeSet<String>,
    pub user_ids: BTreeSet<String>,
}

impl Whitelist {
    /// True when the event's IP or user id is whitelisted. Events without
    /// either field never match.
    pub fn matches(&self, event: &VisitEvent) -> bool {
        let ip_hit = event
            .ip
            .as_deref()
            .map_or(false, |ip| self.ips.contains(ip));
        let user_hit = event
            .user_id
            .as_deref()
            .map_or(false, |id| self.user_ids.contains(id));
        ip_hit || user_hit
    }

    pub fn is_empty(&self) -> bool {
        self.ips.is_empty() && self.user_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn whitelist() -> Whitelist {
        Whitelist {
            ips: ["10.0.0.7".to_string()].into_iter().collect(),
            user_ids: ["partner-qa".to_string()].into_iter().collect(),
        }
    }

    #[test]
    fn test_matches_on_ip_or_user_id() {
        let by_ip = VisitEvent {
            ip: Some("10.0.0.7".to_string()),
            ..VisitEvent::default()
        };
        assert!(whitelist().matches(&by_ip));

        let by_user = VisitEvent {
            user_id: Some("partner-qa".to_string()),
            ..VisitEvent::default()
        };
        assert!(whitelist().matches(&by_user));
    }

    #[test]
    fn test_unlisted_and_anonymous_events_do_not_match() {
        let unlisted = VisitEvent {
            ip: Some("203.0.113.50".to_string()),
            user_id: Some("someone-else".to_string()),
            ..VisitEvent::default()
        };
        assert!(!whitelist().matches(&unlisted));
        assert!(!whitelist().matches(&VisitEvent::default()));
    }

    #[test]
    fn test_empty_whitelist_matches_nothing() {
        let event = VisitEvent {
            ip: Some("10.0.0.7".to_string()),
            ..VisitEvent::default()
        };
        assert!(!Whitelist::default().matches(&event));
        assert!(Whitelist::default().is_empty());
    }
}
