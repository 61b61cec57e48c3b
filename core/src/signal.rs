//! The signal catalog: binary fraud indicators detectable on a single visit.
//!
//! Signals are defined once, in a fixed order, and never mutated at runtime;
//! updating the catalog means shipping a new build. Each signal knows how to
//! test itself against a [`VisitEvent`], treating missing telemetry as
//! non-matching so that sparse events degrade toward "clean" instead of
//! erroring.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::event::VisitEvent;

/// Screen dimensions outside this range do not exist on real hardware.
pub const MIN_SCREEN_DIMENSION: u32 = 64;
pub const MAX_SCREEN_DIMENSION: u32 = 15_360;

/// Sustained characters-per-second above this is not human typing.
pub const SUPERHUMAN_TYPING_CPS: f64 = 18.0;

/// Stable identifier for a catalog signal.
///
/// Variants are declared in catalog order; the derived `Ord` therefore
/// matches evaluation order, which keeps triggered-signal lists
/// deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKey {
    VpnDetected,
    GeoMismatch,
    HeadlessBrowser,
    PixelPerfectClicks,
    DeviceSpoofing,
    EmulatorDetected,
    NoJavascript,
    NoDomInteraction,
    ImpossibleResolution,
    OsBrowserMismatch,
    IncognitoMode,
    LanguageGeoMismatch,
    NoMouseMovement,
    NoScroll,
    SuperhumanTyping,
    TimezoneMismatch,
}

impl SignalKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKey::VpnDetected => "vpn_detected",
            SignalKey::GeoMismatch => "geo_mismatch",
            SignalKey::HeadlessBrowser => "headless_browser",
            SignalKey::PixelPerfectClicks => "pixel_perfect_clicks",
            SignalKey::DeviceSpoofing => "device_spoofing",
            SignalKey::EmulatorDetected => "emulator_detected",
            SignalKey::NoJavascript => "no_javascript",
            SignalKey::NoDomInteraction => "no_dom_interaction",
            SignalKey::ImpossibleResolution => "impossible_resolution",
            SignalKey::OsBrowserMismatch => "os_browser_mismatch",
            SignalKey::IncognitoMode => "incognito_mode",
            SignalKey::LanguageGeoMismatch => "language_geo_mismatch",
            SignalKey::NoMouseMovement => "no_mouse_movement",
            SignalKey::NoScroll => "no_scroll",
            SignalKey::SuperhumanTyping => "superhuman_typing",
            SignalKey::TimezoneMismatch => "timezone_mismatch",
        }
    }

    /// Test this signal's condition against one event.
    ///
    /// A condition only fires when the telemetry it needs is present; an
    /// absent field never matches.
    pub fn matches(&self, event: &VisitEvent) -> bool {
        match self {
            SignalKey::VpnDetected => event.vpn == Some(true),
            SignalKey::GeoMismatch => match (&event.country_claimed, &event.country_detected) {
                (Some(claimed), Some(detected)) => !claimed.eq_ignore_ascii_case(detected),
                _ => false,
            },
            SignalKey::HeadlessBrowser => event.headless == Some(true),
            SignalKey::PixelPerfectClicks => event.pixel_perfect_clicks == Some(true),
            SignalKey::DeviceSpoofing => event.device_spoofed == Some(true),
            SignalKey::EmulatorDetected => event.emulator == Some(true),
            SignalKey::NoJavascript => event.js_loaded == Some(false),
            SignalKey::NoDomInteraction => event.dom_interacted == Some(false),
            SignalKey::ImpossibleResolution => match (event.screen_width, event.screen_height) {
                (Some(w), Some(h)) => {
                    w < MIN_SCREEN_DIMENSION
                        || h < MIN_SCREEN_DIMENSION
                        || w > MAX_SCREEN_DIMENSION
                        || h > MAX_SCREEN_DIMENSION
                }
                _ => false,
            },
            SignalKey::OsBrowserMismatch => event.os_browser_mismatch == Some(true),
            SignalKey::IncognitoMode => event.incognito == Some(true),
            SignalKey::LanguageGeoMismatch => match (&event.language, &event.country_language) {
                (Some(reported), Some(expected)) => {
                    !primary_subtag(reported).eq_ignore_ascii_case(primary_subtag(expected))
                }
                _ => false,
            },
            SignalKey::NoMouseMovement => event.mouse_moves == Some(0),
            SignalKey::NoScroll => event.scroll_events == Some(0),
            SignalKey::SuperhumanTyping => event
                .typing_cps
                .map_or(false, |cps| cps > SUPERHUMAN_TYPING_CPS),
            SignalKey::TimezoneMismatch => {
                match (event.timezone_offset_minutes, event.geo_timezone_offset_minutes) {
                    (Some(reported), Some(expected)) => reported != expected,
                    _ => false,
                }
            }
        }
    }
}

/// "en-US" and "en_GB" both reduce to "en".
fn primary_subtag(tag: &str) -> &str {
    tag.split(['-', '_']).next().unwrap_or(tag)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Sufficient cause for an immediate block under a blocking policy.
    Hard,
    /// Flags the visit for review, never blocks on its own.
    Soft,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Signal {
    pub key: SignalKey,
    pub description: &'static str,
    pub severity: Severity,
}

pub static CATALOG: [Signal; 16] = [
    Signal {
        key: SignalKey::VpnDetected,
        description: "VPN or proxy connection detected",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::GeoMismatch,
        description: "IP address does not match claimed geo location",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::HeadlessBrowser,
        description: "Headless browser detected",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::PixelPerfectClicks,
        description: "Pixel-perfect repeated clicks",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::DeviceSpoofing,
        description: "Device fingerprint spoofing",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::EmulatorDetected,
        description: "Emulator or virtual device detected",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::NoJavascript,
        description: "Page JavaScript never loaded",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::NoDomInteraction,
        description: "No DOM interaction during the visit",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::ImpossibleResolution,
        description: "Impossible screen resolution",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::OsBrowserMismatch,
        description: "Operating system and browser fingerprint disagree",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::IncognitoMode,
        description: "Incognito mode with a suspicious browser profile",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::LanguageGeoMismatch,
        description: "Browser language does not match geo location",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::NoMouseMovement,
        description: "No mouse movement recorded",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::NoScroll,
        description: "No scroll activity recorded",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::SuperhumanTyping,
        description: "Typing speed beyond human capability",
        severity: Severity::Hard,
    },
    Signal {
        key: SignalKey::TimezoneMismatch,
        description: "Browser timezone does not match geo timezone",
        severity: Severity::Soft,
    },
];

/// All catalog signals, in evaluation order.
pub fn catalog() -> &'static [Signal] {
    &CATALOG
}

/// Look up one signal by its wire key.
pub fn get(key: &str) -> Result<&'static Signal> {
    CATALOG
        .iter()
        .find(|s| s.key.as_str() == key)
        .ok_or_else(|| Error::not_found("signal", key))
}
