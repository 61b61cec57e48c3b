//! The visit event: one observed click/visit plus the telemetry the
//! tracking pixel managed to collect.
//!
//! Every telemetry field is optional. Collection is best-effort in hostile
//! environments, so a missing field means "unknown" and degrades toward
//! no-trigger; only values that are present but malformed are rejected.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitEvent {
    // Identity, used for whitelisting and per-IP click grouping.
    pub ip: Option<String>,
    pub user_id: Option<String>,

    // Geo telemetry.
    pub country_claimed: Option<String>,
    pub country_detected: Option<String>,
    pub language: Option<String>,
    pub country_language: Option<String>,
    pub timezone_offset_minutes: Option<i32>,
    pub geo_timezone_offset_minutes: Option<i32>,

    // Environment flags.
    pub vpn: Option<bool>,
    pub headless: Option<bool>,
    pub device_spoofed: Option<bool>,
    pub emulator: Option<bool>,
    pub incognito: Option<bool>,
    pub js_loaded: Option<bool>,
    pub dom_interacted: Option<bool>,
    pub os_browser_mismatch: Option<bool>,
    pub pixel_perfect_clicks: Option<bool>,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,

    // Behaviour.
    pub mouse_moves: Option<u64>,
    pub scroll_events: Option<u64>,
    pub typing_cps: Option<f64>,
    pub visit_duration_secs: Option<f64>,

    // Same-IP click timestamps supplied by the caller, newest or oldest
    // first; order does not matter.
    pub click_history: Vec<DateTime<Utc>>,

    /// Reference point for trailing windows. Defaults to the moment the
    /// event was constructed, so re-evaluating a decoded event is
    /// idempotent.
    pub observed_at: DateTime<Utc>,
}

impl Default for VisitEvent {
    fn default() -> Self {
        Self {
            ip: None,
            user_id: None,
            country_claimed: None,
            country_detected: None,
            language: None,
            country_language: None,
            timezone_offset_minutes: None,
            geo_timezone_offset_minutes: None,
            vpn: None,
            headless: None,
            device_spoofed: None,
            emulator: None,
            incognito: None,
            js_loaded: None,
            dom_interacted: None,
            os_browser_mismatch: None,
            pixel_perfect_clicks: None,
            screen_width: None,
            screen_height: None,
            mouse_moves: None,
            scroll_events: None,
            typing_cps: None,
            visit_duration_secs: None,
            click_history: Vec::new(),
            observed_at: Utc::now(),
        }
    }
}

impl VisitEvent {
    /// Reject values that are present but meaningless. Absent fields are
    /// always fine.
    pub fn validate(&self) -> Result<()> {
        if let Some(duration) = self.visit_duration_secs {
            if !duration.is_finite() || duration < 0.0 {
                return Err(Error::invalid_event(
                    "visit_duration_secs must be a non-negative finite number",
                ));
            }
        }
        if let Some(cps) = self.typing_cps {
            if !cps.is_finite() || cps < 0.0 {
                return Err(Error::invalid_event(
                    "typing_cps must be a non-negative finite number",
                ));
            }
        }
        Ok(())
    }

    /// Count click timestamps inside `(observed_at - window, observed_at]`.
    ///
    /// Timestamps after `observed_at` fall outside the window rather than
    /// counting toward it.
    pub fn clicks_within(&self, window_secs: u64) -> u64 {
        let window_ms = i64::try_from(window_secs.saturating_mul(1000)).unwrap_or(i64::MAX);
        let window = Duration::milliseconds(window_ms);
        self.click_history
            .iter()
            .filter(|click| {
                // Full-duration comparison: truncating to milliseconds would
                // round a just-future click down to age zero.
                let age = self.observed_at.signed_duration_since(**click);
                age >= Duration::zero() && age < window
            })
            .count() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_event_is_valid() {
        assert!(VisitEvent::default().validate().is_ok());
    }

    #[test]
    fn test_negative_duration_is_invalid() {
        let event = VisitEvent {
            visit_duration_secs: Some(-1.0),
            ..VisitEvent::default()
        };
        let err = event.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidEvent { .. }));
    }

    #[test]
    fn test_non_finite_values_are_invalid() {
        let event = VisitEvent {
            visit_duration_secs: Some(f64::NAN),
            ..VisitEvent::default()
        };
        assert!(event.validate().is_err());

        let event = VisitEvent {
            typing_cps: Some(f64::INFINITY),
            ..VisitEvent::default()
        };
        assert!(event.validate().is_err());
    }

    #[test]
    fn test_clicks_within_counts_trailing_window() {
        let now = Utc::now();
        let event = VisitEvent {
            observed_at: now,
            click_history: vec![
                now,
                now - Duration::milliseconds(500),
                now - Duration::seconds(2),
                now - Duration::seconds(10),
            ],
            ..VisitEvent::default()
        };
        assert_eq!(event.clicks_within(3), 3);
        assert_eq!(event.clicks_within(60), 4);
    }

    #[test]
    fn test_click_exactly_at_window_edge_is_outside() {
        let now = Utc::now();
        let event = VisitEvent {
            observed_at: now,
            click_history: vec![now - Duration::seconds(3)],
            ..VisitEvent::default()
        };
        assert_eq!(event.clicks_within(3), 0);
        assert_eq!(event.clicks_within(4), 1);
    }

    #[test]
    fn test_future_clicks_do_not_count() {
        let now = Utc::now();
        // The second timestamp is under a millisecond ahead of the
        // reference point; it must stay outside the window too.
        let event = VisitEvent {
            observed_at: now,
            click_history: vec![
                now + Duration::seconds(1),
                now + Duration::microseconds(500),
            ],
            ..VisitEvent::default()
        };
        assert_eq!(event.clicks_within(60), 0);
        assert_eq!(event.clicks_within(3_600), 0);
    }

    #[test]
    fn test_no_history_counts_zero() {
        assert_eq!(VisitEvent::default().clicks_within(3_600), 0);
    }
}
