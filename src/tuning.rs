//! Data-driven game balance: row counts, risk levels and payout tables
//!
//! Tables are stored edge-to-centre (one half of the board) and mirrored at
//! lookup time, so symmetry holds by construction.

use serde::{Deserialize, Serialize};

use crate::error::{PlinkoError, Result};
use crate::money::Multiplier;

/// Number of peg rows, restricted to `MIN..=MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct RowCount(u8);

impl RowCount {
    pub const MIN: u8 = 8;
    pub const MAX: u8 = 16;

    /// Every allowed row count, ascending
    pub fn all() -> impl Iterator<Item = RowCount> {
        (Self::MIN..=Self::MAX).map(RowCount)
    }

    pub fn new(rows: u8) -> Result<Self> {
        if (Self::MIN..=Self::MAX).contains(&rows) {
            Ok(Self(rows))
        } else {
            Err(PlinkoError::config(format!(
                "row count {} outside {}..={}",
                rows,
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Number of bins (rows + 1)
    pub const fn bin_count(self) -> usize {
        self.0 as usize + 1
    }
}

impl Default for RowCount {
    fn default() -> Self {
        Self(16)
    }
}

impl TryFrom<u8> for RowCount {
    type Error = PlinkoError;

    fn try_from(rows: u8) -> Result<Self> {
        Self::new(rows)
    }
}

impl From<RowCount> for u8 {
    fn from(rows: RowCount) -> u8 {
        rows.0
    }
}

/// Risk level, selects the payout table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" | "med" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Half-table for a (risk, rows) pair, in basis points, edge bin first.
/// Length is `rows / 2 + 1`.
fn half_table(risk: RiskLevel, rows: RowCount) -> Option<&'static [u32]> {
    use RiskLevel::*;

    let table: &'static [u32] = match (rows.get(), risk) {
        (8, Low) => &[56_000, 21_000, 11_000, 10_000, 5_000],
        (8, Medium) => &[130_000, 30_000, 13_000, 7_000, 4_000],
        (8, High) => &[290_000, 40_000, 15_000, 3_000, 2_000],

        (9, Low) => &[56_000, 20_000, 16_000, 10_000, 7_000],
        (9, Medium) => &[180_000, 40_000, 17_000, 9_000, 5_000],
        (9, High) => &[430_000, 70_000, 20_000, 6_000, 2_000],

        (10, Low) => &[89_000, 30_000, 14_000, 11_000, 10_000, 5_000],
        (10, Medium) => &[220_000, 50_000, 20_000, 14_000, 6_000, 4_000],
        (10, High) => &[760_000, 100_000, 30_000, 9_000, 3_000, 2_000],

        (11, Low) => &[84_000, 30_000, 19_000, 13_000, 10_000, 7_000],
        (11, Medium) => &[240_000, 60_000, 30_000, 18_000, 7_000, 5_000],
        (11, High) => &[1_200_000, 140_000, 52_000, 14_000, 4_000, 2_000],

        (12, Low) => &[100_000, 30_000, 16_000, 14_000, 11_000, 10_000, 5_000],
        (12, Medium) => &[330_000, 110_000, 40_000, 20_000, 11_000, 6_000, 3_000],
        (12, High) => &[1_700_000, 240_000, 81_000, 20_000, 7_000, 2_500, 2_000],

        (13, Low) => &[81_000, 40_000, 30_000, 19_000, 12_000, 9_000, 7_000],
        (13, Medium) => &[430_000, 130_000, 60_000, 30_000, 13_000, 7_000, 4_000],
        (13, High) => &[2_600_000, 370_000, 110_000, 40_000, 10_000, 3_000, 2_000],

        (14, Low) => &[71_000, 40_000, 19_000, 14_000, 13_000, 11_000, 10_000, 5_000],
        (14, Medium) => &[580_000, 150_000, 70_000, 40_000, 19_000, 10_000, 5_000, 2_000],
        (14, High) => &[4_200_000, 560_000, 180_000, 50_000, 19_000, 4_000, 3_000, 2_000],

        (15, Low) => &[150_000, 80_000, 30_000, 20_000, 15_000, 11_000, 10_000, 7_000],
        (15, Medium) => &[880_000, 180_000, 110_000, 50_000, 30_000, 13_000, 5_000, 3_000],
        (15, High) => &[6_200_000, 830_000, 270_000, 80_000, 30_000, 5_000, 3_000, 2_000],

        (16, Low) => &[160_000, 90_000, 20_000, 15_000, 14_000, 12_000, 11_000, 10_000, 5_000],
        (16, Medium) => &[
            1_100_000, 410_000, 100_000, 50_000, 30_000, 15_000, 10_000, 5_000, 3_000,
        ],
        (16, High) => &[
            10_000_000, 1_300_000, 260_000, 90_000, 40_000, 20_000, 4_000, 3_000, 2_000,
        ],

        _ => return None,
    };
    Some(table)
}

/// Largest multiplier in any table (16 rows, high risk, edge bin)
pub const MAX_MULTIPLIER: Multiplier = Multiplier::from_basis_points(10_000_000);

/// Payout multiplier for landing in `bin` on a board with `rows` rows
pub fn payout_multiplier(risk: RiskLevel, rows: RowCount, bin: usize) -> Result<Multiplier> {
    let n = rows.get() as usize;
    if bin > n {
        return Err(PlinkoError::config(format!(
            "bin {} outside 0..={} for {} rows",
            bin, n, n
        )));
    }
    let table = half_table(risk, rows).ok_or_else(|| {
        PlinkoError::config(format!(
            "no payout table for {} risk with {} rows",
            risk.as_str(),
            n
        ))
    })?;

    let from_edge = bin.min(n - bin);
    table
        .get(from_edge)
        .copied()
        .map(Multiplier::from_basis_points)
        .ok_or_else(|| {
            PlinkoError::config(format!(
                "payout table for {} risk with {} rows is short",
                risk.as_str(),
                n
            ))
        })
}

/// Full multiplier row for display, one entry per bin
pub fn payout_row(risk: RiskLevel, rows: RowCount) -> Result<Vec<Multiplier>> {
    (0..rows.bin_count())
        .map(|bin| payout_multiplier(risk, rows, bin))
        .collect()
}
