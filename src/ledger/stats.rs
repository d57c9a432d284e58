//! Statistics derived from the win log
//!
//! Nothing here is stored. Each value is rebuilt from `&[WinRecord]` when
//! asked for, so it can never drift from the log.

use serde::{Deserialize, Serialize};

use super::WinRecord;
use crate::money::Amount;
use crate::tuning::RowCount;

/// Fraction of landings per bin on a board of `rows` rows
///
/// Only records made on that board count. With no such records every entry
/// is zero; otherwise the entries sum to 1.
pub fn bin_probabilities(records: &[WinRecord], rows: RowCount) -> Vec<f64> {
    let mut counts = vec![0u64; rows.bin_count()];
    let mut total = 0u64;
    for record in records.iter().filter(|r| r.row_count == rows) {
        if let Some(count) = counts.get_mut(record.bin_index) {
            *count += 1;
            total += 1;
        }
    }
    if total == 0 {
        return vec![0.0; counts.len()];
    }
    counts
        .into_iter()
        .map(|c| c as f64 / total as f64)
        .collect()
}

/// Running profit after each record, starting from zero
pub fn total_profit_history(records: &[WinRecord]) -> Vec<Amount> {
    let mut history = Vec::with_capacity(records.len() + 1);
    let mut running = Amount::ZERO;
    history.push(running);
    for record in records {
        running = running + record.profit();
        history.push(running);
    }
    history
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS `rgb(r, g, b)` form
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Per-bin face and shadow colours
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinColors {
    pub background: Vec<Rgb>,
    pub shadow: Vec<Rgb>,
}

const BACKGROUND_EDGE: Rgb = Rgb::new(255, 0, 63);
const BACKGROUND_CENTRE: Rgb = Rgb::new(255, 192, 0);
const SHADOW_EDGE: Rgb = Rgb::new(166, 0, 4);
const SHADOW_CENTRE: Rgb = Rgb::new(171, 121, 0);

/// Bin colours for a board: red at the edges fading to yellow in the middle,
/// mirrored around the centre bin
pub fn bin_colors(rows: RowCount) -> BinColors {
    let bins = rows.bin_count();
    BinColors {
        background: mirrored_gradient(BACKGROUND_EDGE, BACKGROUND_CENTRE, bins),
        shadow: mirrored_gradient(SHADOW_EDGE, SHADOW_CENTRE, bins),
    }
}

fn mirrored_gradient(edge: Rgb, centre: Rgb, bins: usize) -> Vec<Rgb> {
    let half_len = bins.div_ceil(2);
    let half = gradient(edge, centre, half_len);
    let skip = bins % 2;
    half.iter()
        .copied()
        .chain(half.iter().rev().skip(skip).copied())
        .collect()
}

fn gradient(from: Rgb, to: Rgb, len: usize) -> Vec<Rgb> {
    if len <= 1 {
        return vec![from; len];
    }
    let steps = (len - 1) as f64;
    let channel = |a: u8, b: u8, i: usize| -> u8 {
        let v = a as f64 + (b as f64 - a as f64) / steps * i as f64;
        v.round().clamp(0.0, 255.0) as u8
    };
    (0..len)
        .map(|i| {
            Rgb::new(
                channel(from.r, to.r, i),
                channel(from.g, to.g, i),
                channel(from.b, to.b, i),
            )
        })
        .collect()
}
