//! Bin resolution and payout lookup for landed balls

use serde::{Deserialize, Serialize};

use super::lattice::Lattice;
use super::tick::LandingKind;
use crate::error::Result;
use crate::money::Multiplier;
use crate::tuning::{RiskLevel, payout_multiplier};

/// Where a ball ended up and what it pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub bin_index: usize,
    pub multiplier: Multiplier,
    /// True when the ball had to be forced to the floor
    pub forced: bool,
}

/// Map a final x position to a bin
///
/// A ball exactly on the boundary between two bins goes to the lower index.
/// Positions off the board clamp to the nearest edge bin; NaN goes to the
/// centre bin.
pub fn bin_index_for_x(lattice: &Lattice, x: f32) -> usize {
    let last = lattice.bin_count() - 1;
    if x.is_nan() {
        return last / 2;
    }
    lattice
        .bins
        .iter()
        .position(|bin| x <= bin.hi)
        .unwrap_or(last)
}

/// Resolve a landing at `x` into a bin and multiplier
pub fn resolve(lattice: &Lattice, risk: RiskLevel, x: f32, kind: LandingKind) -> Result<Outcome> {
    let bin_index = bin_index_for_x(lattice, x);
    let multiplier = payout_multiplier(risk, lattice.rows, bin_index)?;
    Ok(Outcome {
        bin_index,
        multiplier,
        forced: kind == LandingKind::Forced,
    })
}
