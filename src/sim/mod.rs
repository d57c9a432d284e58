//! Deterministic simulation module
//!
//! The drop simulation lives here. This module must be pure and deterministic:
//! - Fixed timestep only
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, network or platform dependencies

pub mod collision;
pub mod lattice;
pub mod outcome;
pub mod state;
pub mod tick;

pub use collision::{CollisionResult, ball_peg_collision, ball_wall_collision, bounce_velocity};
pub use lattice::{BinRange, Lattice, Segment};
pub use outcome::{Outcome, bin_index_for_x, resolve};
pub use state::{Ball, DropWorld};
pub use tick::{Landing, LandingKind, step};
