//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Frame timing
//! - Launch parameters (query string on web)
//! - Cash-out handoff redirect (web)

#[cfg(target_arch = "wasm32")]
pub mod web;

use crate::consts::SIM_DT;

/// Seconds between two animation-frame timestamps (milliseconds)
///
/// The first frame (`last_ms <= 0`) counts as one fixed step. Clock jumps
/// backwards yield zero.
pub fn frame_dt(last_ms: f64, now_ms: f64) -> f32 {
    if last_ms <= 0.0 {
        return SIM_DT;
    }
    (((now_ms - last_ms) / 1000.0) as f32).max(0.0)
}
