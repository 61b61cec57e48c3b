use chrono::{Duration, Utc};
use clickguard_core::{
    evaluate_visit, ModePolicy, OnViolation, Outcome, RuleSet, SignalKey, ThresholdRule, TimeSpan,
    TimeUnit, VisitEvent,
};
use proptest::prelude::*;

fn bounce_only_policy(min_visit_secs: u32, enabled: bool) -> ModePolicy {
    let mut rule = ThresholdRule::bounce_rate("bounce_rate", min_visit_secs);
    rule.enabled = enabled;
    let mut policy = ModePolicy::smart_default();
    policy.rules = RuleSet::from_rules(vec![rule]).unwrap();
    policy
}

proptest! {
    #[test]
    fn test_bounce_rate_matches_manual_calculation(
        duration in 0.0f64..60.0f64,
        threshold in 1u32..30u32,
    ) {
        let policy = bounce_only_policy(threshold, true);
        let event = VisitEvent {
            visit_duration_secs: Some(duration),
            ..VisitEvent::default()
        };

        let verdict = evaluate_visit(&event, &policy).unwrap();

        // A bounce is a visit strictly shorter than the threshold.
        let expected = duration < f64::from(threshold);
        let actual = verdict.triggered_rules.contains(&"bounce_rate".to_string());
        prop_assert_eq!(
            expected, actual,
            "Rule firing should match manual calculation. Duration: {}, Threshold: {}",
            duration, threshold
        );
        prop_assert_eq!(
            verdict.outcome,
            if expected { Outcome::Review } else { Outcome::Allow }
        );
    }

    #[test]
    fn test_disabled_rules_never_fire(
        duration in 0.0f64..60.0f64,
        threshold in 1u32..30u32,
    ) {
        let policy = bounce_only_policy(threshold, false);
        let event = VisitEvent {
            visit_duration_secs: Some(duration),
            ..VisitEvent::default()
        };

        let verdict = evaluate_visit(&event, &policy).unwrap();
        prop_assert!(verdict.triggered_rules.is_empty());
        prop_assert_eq!(verdict.outcome, Outcome::Allow);
    }

    #[test]
    fn test_click_threshold_meets_or_exceeds(
        clicks in 0i64..20i64,
        threshold in 1u32..10u32,
        window_secs in 2u32..10u32,
    ) {
        let mut policy = ModePolicy::smart_default();
        policy.rules = RuleSet::from_rules(vec![ThresholdRule::spam_clicks(
            "spam_clicks",
            threshold,
            TimeSpan::new(window_secs, TimeUnit::Second),
        )])
        .unwrap();

        // 50ms spacing keeps every click well inside the trailing window.
        let observed_at = Utc::now();
        let event = VisitEvent {
            click_history: (1..=clicks)
                .map(|i| observed_at - Duration::milliseconds(i * 50))
                .collect(),
            observed_at,
            ..VisitEvent::default()
        };

        let verdict = evaluate_visit(&event, &policy).unwrap();

        let expected = clicks as u64 >= u64::from(threshold);
        let actual = verdict.triggered_rules.contains(&"spam_clicks".to_string());
        prop_assert_eq!(
            expected, actual,
            "Click velocity should match manual calculation. Clicks: {}, Threshold: {}",
            clicks, threshold
        );
    }

    #[test]
    fn test_hard_signal_always_blocks_under_aggressive(
        key in prop::sample::select(vec![
            SignalKey::VpnDetected,
            SignalKey::HeadlessBrowser,
            SignalKey::DeviceSpoofing,
            SignalKey::EmulatorDetected,
            SignalKey::IncognitoMode,
            SignalKey::PixelPerfectClicks,
        ]),
        duration in 0.0f64..60.0f64,
    ) {
        let mut event = VisitEvent {
            visit_duration_secs: Some(duration),
            ..VisitEvent::default()
        };
        match key {
            SignalKey::VpnDetected => event.vpn = Some(true),
            SignalKey::HeadlessBrowser => event.headless = Some(true),
            SignalKey::DeviceSpoofing => event.device_spoofed = Some(true),
            SignalKey::EmulatorDetected => event.emulator = Some(true),
            SignalKey::IncognitoMode => event.incognito = Some(true),
            SignalKey::PixelPerfectClicks => event.pixel_perfect_clicks = Some(true),
            _ => unreachable!(),
        }

        let verdict = evaluate_visit(&event, &ModePolicy::aggressive_default()).unwrap();
        prop_assert_eq!(verdict.outcome, Outcome::Block);
        prop_assert_eq!(verdict.triggered_signals, vec![key]);
        // The hard-signal short circuit fires before rules are consulted.
        prop_assert!(verdict.triggered_rules.is_empty());
    }

    #[test]
    fn test_soft_signals_never_block_alone(
        offset in -720i32..720i32,
        geo_offset in -720i32..720i32,
    ) {
        // A policy that blocks on violations but only watches the soft
        // timezone signal.
        let mut policy = ModePolicy::aggressive_default();
        policy.on_violation = OnViolation::Block;
        policy.active_signals = [SignalKey::TimezoneMismatch].into_iter().collect();
        policy.rules = RuleSet::new();

        let event = VisitEvent {
            timezone_offset_minutes: Some(offset),
            geo_timezone_offset_minutes: Some(geo_offset),
            ..VisitEvent::default()
        };

        let verdict = evaluate_visit(&event, &policy).unwrap();
        if offset == geo_offset {
            prop_assert_eq!(verdict.outcome, Outcome::Allow);
        } else {
            prop_assert_eq!(verdict.outcome, Outcome::Review);
            prop_assert_eq!(verdict.triggered_signals, vec![SignalKey::TimezoneMismatch]);
        }
    }

    #[test]
    fn test_evaluation_is_pure(
        duration in prop::option::of(0.0f64..60.0f64),
        clicks in 0i64..10i64,
        vpn in any::<bool>(),
        mouse_moves in prop::option::of(0u64..500u64),
    ) {
        let observed_at = Utc::now();
        let event = VisitEvent {
            vpn: Some(vpn),
            visit_duration_secs: duration,
            mouse_moves,
            click_history: (1..=clicks)
                .map(|i| observed_at - Duration::milliseconds(i * 200))
                .collect(),
            observed_at,
            ..VisitEvent::default()
        };

        for policy in [ModePolicy::aggressive_default(), ModePolicy::smart_default()] {
            let first = evaluate_visit(&event, &policy).unwrap();
            let second = evaluate_visit(&event, &policy).unwrap();
            prop_assert_eq!(&first, &second, "Same event and policy must yield the same verdict");
        }
    }
}
