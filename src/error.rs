use thiserror::Error;

use crate::cashout::CashOutError;
use crate::money::Amount;

pub type Result<T> = std::result::Result<T, PlinkoError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlinkoError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid bet amount: {0}")]
    InvalidAmount(Amount),

    #[error("Insufficient balance: need {need}, have {available}")]
    InsufficientBalance { need: Amount, available: Amount },

    #[error("Unknown bet: {0}")]
    UnknownBet(u64),

    #[error("{0} ball(s) still in flight")]
    BallsInFlight(usize),

    #[error("Session already cashed out")]
    SessionClosed,

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Arithmetic overflow: {0}")]
    Overflow(&'static str),

    #[error("Cash out error: {0}")]
    CashOut(#[from] CashOutError),
}

impl PlinkoError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn snapshot(msg: impl Into<String>) -> Self {
        Self::Snapshot(msg.into())
    }
}
