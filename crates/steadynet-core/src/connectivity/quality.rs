//! Link quality classification from host-reported network characteristics.

use std::fmt;
use std::str::FromStr;

/// Round-trip time above which a link is considered slow.
const SLOW_RTT_MS: u32 = 2000;
/// Round-trip time above which a link is considered moderate.
const MODERATE_RTT_MS: u32 = 1000;
/// Downlink estimate below which a link is considered slow.
const SLOW_DOWNLINK: f64 = 0.5;
/// Downlink estimate below which a link is considered moderate.
const MODERATE_DOWNLINK: f64 = 1.5;

/// Coarse link quality used to scale retry backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectivityQuality {
    Fast,
    Moderate,
    Slow,
    #[default]
    Unknown,
}

impl ConnectivityQuality {
    /// Factor applied to computed backoff delays on this kind of link.
    pub fn backoff_multiplier(self) -> f64 {
        match self {
            ConnectivityQuality::Fast => 1.0,
            ConnectivityQuality::Moderate => 1.5,
            ConnectivityQuality::Slow => 2.0,
            ConnectivityQuality::Unknown => 1.2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityQuality::Fast => "fast",
            ConnectivityQuality::Moderate => "moderate",
            ConnectivityQuality::Slow => "slow",
            ConnectivityQuality::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectivityQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a quality or generation label is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized label: {0:?}")]
pub struct ParseLabelError(pub String);

impl FromStr for ConnectivityQuality {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(ConnectivityQuality::Fast),
            "moderate" => Ok(ConnectivityQuality::Moderate),
            "slow" => Ok(ConnectivityQuality::Slow),
            "unknown" => Ok(ConnectivityQuality::Unknown),
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// Effective cellular generation tier reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectiveType {
    Slow2g,
    TwoG,
    ThreeG,
    FourG,
}

impl FromStr for EffectiveType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => Ok(EffectiveType::Slow2g),
            "2g" => Ok(EffectiveType::TwoG),
            "3g" => Ok(EffectiveType::ThreeG),
            "4g" => Ok(EffectiveType::FourG),
            _ => Err(ParseLabelError(s.to_string())),
        }
    }
}

/// Latest network characteristics reported by the host. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkSnapshot {
    /// Estimated round-trip time in milliseconds.
    pub rtt_ms: Option<u32>,
    /// Estimated downlink bandwidth (Mbit/s).
    pub downlink_mbps: Option<f64>,
    /// Effective generation label.
    pub effective_type: Option<EffectiveType>,
    /// User asked the host to reduce data usage.
    pub save_data: Option<bool>,
}

impl LinkSnapshot {
    /// True when the host supplied no signal at all.
    pub fn is_empty(&self) -> bool {
        self.rtt_ms.is_none()
            && self.downlink_mbps.is_none()
            && self.effective_type.is_none()
            && self.save_data.is_none()
    }
}

/// Classify link quality. Rules are evaluated in order; the first match wins.
/// Absent data degrades to [`ConnectivityQuality::Unknown`].
pub fn estimate(snapshot: Option<&LinkSnapshot>) -> ConnectivityQuality {
    let Some(link) = snapshot.filter(|s| !s.is_empty()) else {
        return ConnectivityQuality::Unknown;
    };

    if link.save_data == Some(true) {
        return ConnectivityQuality::Slow;
    }

    let rtt_over = |limit: u32| link.rtt_ms.is_some_and(|rtt| rtt > limit);
    let downlink_under = |limit: f64| link.downlink_mbps.is_some_and(|d| d < limit);

    if rtt_over(SLOW_RTT_MS) || downlink_under(SLOW_DOWNLINK) {
        return ConnectivityQuality::Slow;
    }
    if rtt_over(MODERATE_RTT_MS) || downlink_under(MODERATE_DOWNLINK) {
        return ConnectivityQuality::Moderate;
    }

    match link.effective_type {
        Some(EffectiveType::Slow2g | EffectiveType::TwoG) => ConnectivityQuality::Slow,
        Some(EffectiveType::ThreeG) => ConnectivityQuality::Moderate,
        _ => ConnectivityQuality::Fast,
    }
}
