//! `steadynet estimate` – classify link quality.

use steadynet_core::{estimate, EffectiveType, LinkSnapshot};

pub fn run_estimate(
    rtt_ms: Option<u32>,
    downlink: Option<f64>,
    effective_type: Option<EffectiveType>,
    save_data: bool,
) {
    let link = LinkSnapshot {
        rtt_ms,
        downlink_mbps: downlink,
        effective_type,
        save_data: save_data.then_some(true),
    };
    let quality = estimate(Some(&link));
    println!(
        "quality: {} (backoff multiplier {:.1})",
        quality,
        quality.backoff_multiplier()
    );
}
