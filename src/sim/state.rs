//! Drop world state and core simulation types

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::lattice::Lattice;
use crate::consts::*;
use crate::ledger::BetHandle;
use crate::tuning::{RiskLevel, RowCount};

/// A ball in flight
///
/// Owns the bet that paid for it, so it is deliberately not `Clone`: one
/// ball settles exactly once.
#[derive(Debug)]
pub struct Ball {
    pub id: u32,
    pub pos: Vec2,
    pub vel: Vec2,
    pub radius: f32,
    /// Risk level at drop time
    pub risk: RiskLevel,
    /// Ticks since the drop
    pub ticks: u32,
    /// Where the ball was when it last started resting
    pub anchor: Vec2,
    /// Consecutive ticks spent within `REST_DISTANCE` of `anchor`
    pub rest_ticks: u32,
    /// Peg contacts so far
    pub bounces: u32,
    pub bet: BetHandle,
}

impl Ball {
    pub fn new(id: u32, pos: Vec2, radius: f32, risk: RiskLevel, bet: BetHandle) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            radius,
            risk,
            ticks: 0,
            anchor: pos,
            rest_ticks: 0,
            bounces: 0,
            bet,
        }
    }
}

/// All balls in flight on one board, plus the seeded RNG that drives them
#[derive(Debug)]
pub struct DropWorld {
    /// Seed for reproducibility
    pub seed: u64,
    pub lattice: &'static Lattice,
    /// Active balls (sorted by id for determinism)
    pub balls: Vec<Ball>,
    /// Simulation tick counter
    pub time_ticks: u64,
    rng: Pcg32,
    /// Next entity ID
    next_id: u32,
}

impl DropWorld {
    /// Create an empty board with the given seed
    pub fn new(rows: RowCount, seed: u64) -> Self {
        Self {
            seed,
            lattice: Lattice::for_rows(rows),
            balls: Vec::new(),
            time_ticks: 0,
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
        }
    }

    pub fn rows(&self) -> RowCount {
        self.lattice.rows
    }

    /// Swap the board. Only valid with no balls in flight.
    pub fn set_rows(&mut self, rows: RowCount) -> bool {
        if !self.balls.is_empty() {
            return false;
        }
        self.lattice = Lattice::for_rows(rows);
        true
    }

    pub fn in_flight(&self) -> usize {
        self.balls.len()
    }

    pub fn is_idle(&self) -> bool {
        self.balls.is_empty()
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Drop a new ball above the board centre with a random horizontal offset
    pub fn spawn_ball(&mut self, risk: RiskLevel, bet: BetHandle) -> u32 {
        let id = self.next_entity_id();
        let spread = self.lattice.peg_spacing * DROP_SPREAD;
        let x = self.lattice.drop_center() + self.rng.random_range(-spread..=spread);
        let pos = Vec2::new(x, 0.0);
        self.balls
            .push(Ball::new(id, pos, self.lattice.ball_radius, risk, bet));
        id
    }

    /// Uniform sample in `-max..=max`
    pub(crate) fn jitter(&mut self, max: f32) -> f32 {
        if max <= 0.0 {
            return 0.0;
        }
        self.rng.random_range(-max..=max)
    }

    /// Random sign
    pub(crate) fn coin(&mut self) -> f32 {
        if self.rng.random_bool(0.5) { 1.0 } else { -1.0 }
    }

    /// Ensure balls are sorted by ID for deterministic iteration
    pub fn normalize_order(&mut self) {
        self.balls.sort_by_key(|b| b.id);
    }
}
