//! Plinko - drop simulation, session ledger and wallet cash-out
//!
//! Core modules:
//! - `sim`: Deterministic simulation (peg lattice, physics, bin resolution)
//! - `tuning`: Data-driven payout tables
//! - `ledger`: Session balance, win history and derived statistics
//! - `cashout`: Cash-out handshake with the external wallet authority
//! - `session`: Session context tying the above together
//! - `config`: Launch parameters and session defaults
//! - `persistence`: Balance snapshot save/load
//! - `platform`: Frame timing and the browser bridge (wasm32)

pub mod cashout;
pub mod config;
pub mod error;
pub mod ledger;
pub mod money;
pub mod persistence;
pub mod platform;
pub mod session;
pub mod sim;
pub mod tuning;

pub use cashout::{CashOutCoordinator, CashOutError, CashOutState, HttpTransport, WalletTransport};
pub use config::{CashOutConfig, LaunchParams, SessionConfig};
pub use error::{PlinkoError, Result};
pub use ledger::{Ledger, WinRecord};
pub use money::{Amount, Multiplier};
pub use session::{Refund, Session};
pub use tuning::{RiskLevel, RowCount};

/// Simulation constants
pub mod consts {
    /// Fixed simulation timestep (120 Hz for smooth physics)
    pub const SIM_DT: f32 = 1.0 / 120.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Board dimensions (y grows downward)
    pub const BOARD_WIDTH: f32 = 760.0;
    pub const BOARD_HEIGHT: f32 = 570.0;
    pub const PADDING_X: f32 = 52.0;
    pub const PADDING_TOP: f32 = 36.0;
    pub const PADDING_BOTTOM: f32 = 28.0;

    // Speeds and accelerations below are in peg spacings; the tick scales
    // them by the board's `peg_spacing`.

    /// Downward acceleration (spacings/s²)
    pub const GRAVITY: f32 = 108.0;
    /// Linear air drag (fraction of velocity lost per second)
    pub const AIR_DRAG: f32 = 1.2;
    /// Hard speed cap (spacings/s). Keeps per-tick travel below the smallest
    /// peg+ball radius.
    pub const BALL_MAX_SPEED: f32 = 15.0;
    /// Cap on horizontal speed (spacings/s)
    pub const MAX_LATERAL_SPEED: f32 = 5.0;

    /// Fraction of normal velocity kept after a peg bounce
    pub const RESTITUTION: f32 = 0.8;
    /// Fraction of tangential velocity lost on a peg bounce
    pub const PEG_FRICTION: f32 = 0.4;
    /// Fraction of horizontal velocity kept after a peg bounce
    pub const LATERAL_DAMPING: f32 = 0.3;
    /// Restitution against the side walls
    pub const WALL_RESTITUTION: f32 = 0.4;
    /// Normal speed (spacings/s) below which a peg contact is rolling, not a bounce
    pub const MIN_IMPACT_SPEED: f32 = 0.3;

    /// Max horizontal kick added on every peg bounce (spacings/s)
    pub const MAX_PERTURBATION: f32 = 0.3;
    /// Sideways push for near-centre hits and resting balls (spacings/s)
    pub const NUDGE_SPEED: f32 = 1.5;
    /// |normal.x| below this counts as a near-centre hit
    pub const CENTER_HIT_EPSILON: f32 = 0.35;

    /// A ball that stays within this distance of where it came to rest is resting
    pub const REST_DISTANCE: f32 = 1.5;
    /// Consecutive resting ticks before a nudge
    pub const REST_TICKS_LIMIT: u32 = 30;
    /// Ticks before a ball is forcibly resolved (20 s at 120 Hz)
    pub const MAX_BALL_TICKS: u32 = 20 * 120;

    /// Horizontal drop spread around the board centre, in peg spacings
    pub const DROP_SPREAD: f32 = 0.2;
}
