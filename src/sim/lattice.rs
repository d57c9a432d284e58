//! Peg lattice geometry
//!
//! Triangular layout: row `r` holds `r + 3` pegs spaced evenly and centred on
//! the board, so the last row has `rows + 2` pegs and `rows + 1` gaps. The
//! gaps under the last row are the bins.

use std::sync::OnceLock;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::tuning::RowCount;

/// A straight wall segment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    /// Closest point on the segment to `p`
    pub fn closest_point(&self, p: Vec2) -> Vec2 {
        let ab = self.b - self.a;
        let len_sq = ab.length_squared();
        if len_sq < 0.0001 {
            return self.a;
        }
        let t = ((p - self.a).dot(ab) / len_sq).clamp(0.0, 1.0);
        self.a + ab * t
    }

    /// x of the segment's supporting line at height `y`
    pub fn x_at(&self, y: f32) -> f32 {
        let dy = self.b.y - self.a.y;
        if dy.abs() < 0.0001 {
            return self.a.x;
        }
        self.a.x + (self.b.x - self.a.x) * (y - self.a.y) / dy
    }
}

/// Horizontal extent of one bin. `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinRange {
    pub lo: f32,
    pub hi: f32,
}

impl BinRange {
    pub fn width(&self) -> f32 {
        self.hi - self.lo
    }

    pub fn center(&self) -> f32 {
        (self.lo + self.hi) * 0.5
    }
}

/// Immutable board geometry for one row count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lattice {
    pub rows: RowCount,
    pub width: f32,
    pub height: f32,
    /// Horizontal distance between neighbouring pegs
    pub peg_spacing: f32,
    /// Vertical distance between rows
    pub row_spacing: f32,
    pub peg_radius: f32,
    pub ball_radius: f32,
    /// Peg centres, one Vec per row (top row first)
    pub pegs: Vec<Vec<Vec2>>,
    /// Left and right side walls
    pub walls: [Segment; 2],
    /// Settlement threshold (ball bottom crossing this settles)
    pub floor_y: f32,
    /// `rows + 1` contiguous ranges covering `0..=width`
    pub bins: Vec<BinRange>,
}

impl Lattice {
    /// Build the lattice for `rows`. Pure.
    pub fn build(rows: RowCount) -> Self {
        let n = rows.get() as usize;
        let width = BOARD_WIDTH;
        let height = BOARD_HEIGHT;

        let peg_spacing = (width - PADDING_X * 2.0) / (n as f32 + 1.0);
        let row_spacing = (height - PADDING_TOP - PADDING_BOTTOM) / (n as f32 - 1.0);
        let peg_radius = (24.0 - n as f32) / 2.0;
        let ball_radius = peg_radius * 2.0;

        let pegs: Vec<Vec<Vec2>> = (0..n)
            .map(|row| {
                let y = PADDING_TOP + row as f32 * row_spacing;
                let count = row + 3;
                let row_padding = PADDING_X + (n - 1 - row) as f32 * peg_spacing / 2.0;
                (0..count)
                    .map(|col| Vec2::new(row_padding + col as f32 * peg_spacing, y))
                    .collect()
            })
            .collect();

        let top = &pegs[0];
        let bottom = &pegs[n - 1];
        let walls = [
            Self::wall_through(top[0], bottom[0], height),
            Self::wall_through(top[top.len() - 1], bottom[bottom.len() - 1], height),
        ];

        let bins = (0..=n)
            .map(|i| BinRange {
                lo: if i == 0 { 0.0 } else { bottom[i].x },
                hi: if i == n { width } else { bottom[i + 1].x },
            })
            .collect();

        Self {
            rows,
            width,
            height,
            peg_spacing,
            row_spacing,
            peg_radius,
            ball_radius,
            pegs,
            walls,
            floor_y: height,
            bins,
        }
    }

    /// Shared lattice for `rows`, built once per process
    pub fn for_rows(rows: RowCount) -> &'static Lattice {
        static CACHE: OnceLock<Vec<Lattice>> = OnceLock::new();
        let cache = CACHE.get_or_init(|| RowCount::all().map(Lattice::build).collect());
        &cache[(rows.get() - RowCount::MIN) as usize]
    }

    /// Extend the line through two outer pegs from the board top to the floor
    fn wall_through(top: Vec2, bottom: Vec2, floor_y: f32) -> Segment {
        let line = Segment { a: top, b: bottom };
        Segment {
            a: Vec2::new(line.x_at(0.0), 0.0),
            b: Vec2::new(line.x_at(floor_y), floor_y),
        }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Board x where balls are dropped
    pub fn drop_center(&self) -> f32 {
        self.width / 2.0
    }

    /// Rows whose pegs could touch a ball centred at height `y`
    pub fn rows_near(&self, y: f32) -> impl Iterator<Item = &[Vec2]> {
        let reach = self.peg_radius + self.ball_radius;
        self.pegs
            .iter()
            .filter(move |row| (row[0].y - y).abs() <= reach)
            .map(Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_peg_counts_and_spacing() {
        let lattice = Lattice::build(RowCount::new(16).unwrap());
        assert_eq!(lattice.pegs.len(), 16);
        for (r, row) in lattice.pegs.iter().enumerate() {
            assert_eq!(row.len(), r + 3);
            for pair in row.windows(2) {
                assert!((pair[1].x - pair[0].x - lattice.peg_spacing).abs() < 0.001);
            }
            // Centred on the board
            let mid = (row[0].x + row[row.len() - 1].x) / 2.0;
            assert!((mid - BOARD_WIDTH / 2.0).abs() < 0.001);
        }
        assert!((lattice.pegs[15][0].x - PADDING_X).abs() < 0.001);
        assert!((lattice.pegs[15][0].y - (BOARD_HEIGHT - PADDING_BOTTOM)).abs() < 0.001);
    }

    #[test]
    fn test_radii_by_rows() {
        let eight = Lattice::build(RowCount::new(8).unwrap());
        assert_eq!(eight.peg_radius, 8.0);
        assert_eq!(eight.ball_radius, 16.0);
        let sixteen = Lattice::build(RowCount::new(16).unwrap());
        assert_eq!(sixteen.peg_radius, 4.0);
        assert_eq!(sixteen.ball_radius, 8.0);
    }

    #[test]
    fn test_walls_pass_through_outer_pegs() {
        let lattice = Lattice::build(RowCount::new(12).unwrap());
        for row in &lattice.pegs {
            let left = row[0];
            let right = row[row.len() - 1];
            assert!((lattice.walls[0].x_at(left.y) - left.x).abs() < 0.01);
            assert!((lattice.walls[1].x_at(right.y) - right.x).abs() < 0.01);
        }
    }

    #[test]
    fn test_memoized_lattice_matches_build() {
        for rows in RowCount::all() {
            let cached = Lattice::for_rows(rows);
            assert_eq!(cached.rows, rows);
            assert_eq!(cached.bins, Lattice::build(rows).bins);
        }
    }

    #[test]
    fn test_segment_closest_point() {
        let seg = Segment {
            a: Vec2::new(0.0, 0.0),
            b: Vec2::new(10.0, 0.0),
        };
        assert_eq!(seg.closest_point(Vec2::new(5.0, 3.0)), Vec2::new(5.0, 0.0));
        assert_eq!(seg.closest_point(Vec2::new(-4.0, 1.0)), Vec2::new(0.0, 0.0));
        assert_eq!(seg.closest_point(Vec2::new(14.0, 1.0)), Vec2::new(10.0, 0.0));
    }

    proptest! {
        #[test]
        fn prop_bins_cover_board(rows in RowCount::MIN..=RowCount::MAX) {
            let rows = RowCount::new(rows).unwrap();
            let lattice = Lattice::build(rows);
            prop_assert_eq!(lattice.bins.len(), rows.get() as usize + 1);
            prop_assert_eq!(lattice.bins[0].lo, 0.0);
            prop_assert_eq!(lattice.bins[lattice.bins.len() - 1].hi, lattice.width);
            for bin in &lattice.bins {
                prop_assert!(bin.width() > 0.0);
            }
            for pair in lattice.bins.windows(2) {
                // Contiguous and non-overlapping
                prop_assert_eq!(pair[0].hi, pair[1].lo);
            }
        }
    }
}
