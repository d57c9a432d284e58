//! Session ledger
//!
//! Holds the balance, the current bet amount, the stakes of balls still in
//! flight and the append-only win log. Everything else (probabilities, bin
//! colours, profit history) is recomputed from the log on demand, see
//! [`stats`].
//!
//! Every mutation goes through `&mut self` and computes its new values with
//! checked arithmetic before writing any field, so a failed call leaves the
//! ledger exactly as it was.

pub mod stats;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cashout::CashOutError;
use crate::error::{PlinkoError, Result};
use crate::money::{Amount, Multiplier};
use crate::sim::Outcome;
use crate::tuning::{MAX_MULTIPLIER, RiskLevel, RowCount};

pub use stats::{BinColors, Rgb, bin_colors, bin_probabilities, total_profit_history};

pub type BetId = u64;

/// Proof that a bet was debited. Consumed by [`Ledger::settle`] or
/// [`Ledger::refund`].
#[derive(Debug, PartialEq, Eq)]
pub struct BetHandle {
    id: BetId,
    amount: Amount,
}

impl BetHandle {
    pub fn id(&self) -> BetId {
        self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// A settlement that did not happen. The stake is still outstanding and the
/// handle comes back with the reason.
#[derive(Debug, PartialEq, Eq)]
pub struct Unsettled {
    pub bet: BetHandle,
    pub error: PlinkoError,
}

/// Everything the ledger needs to know about a landed ball
#[derive(Debug, Clone, Copy)]
pub struct Landed {
    pub ball_id: u32,
    pub row_count: RowCount,
    pub risk_level: RiskLevel,
    pub outcome: Outcome,
}

/// One settled ball. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRecord {
    /// Position in settlement order (0-based)
    pub sequence: u64,
    pub ball_id: u32,
    pub bin_index: usize,
    pub bet_amount: Amount,
    pub multiplier: Multiplier,
    /// `bet_amount * multiplier`, floored to the hundredth
    pub payout: Amount,
    pub row_count: RowCount,
    pub risk_level: RiskLevel,
    /// Ball had to be forced to the floor
    pub forced: bool,
}

impl WinRecord {
    pub fn profit(&self) -> Amount {
        self.payout - self.bet_amount
    }
}

#[derive(Debug, Clone)]
pub struct Ledger {
    initial_balance: Amount,
    balance: Amount,
    bet_amount: Amount,
    /// Stakes of balls still in flight
    outstanding: BTreeMap<BetId, Amount>,
    records: Vec<WinRecord>,
    cashed_out: Amount,
    /// Stakes handed back to the balance without a record
    refunded: Amount,
    /// A cash-out is waiting on the wallet; the balance is frozen
    held: bool,
    closed: bool,
    next_bet_id: BetId,
}

impl Ledger {
    /// Default stake per ball
    pub const DEFAULT_BET: Amount = Amount::from_tokens(1);

    pub fn new(initial_balance: Amount) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            bet_amount: Self::DEFAULT_BET,
            outstanding: BTreeMap::new(),
            records: Vec::new(),
            cashed_out: Amount::ZERO,
            refunded: Amount::ZERO,
            held: false,
            closed: false,
            next_bet_id: 1,
        }
    }

    pub fn initial_balance(&self) -> Amount {
        self.initial_balance
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn bet_amount(&self) -> Amount {
        self.bet_amount
    }

    pub fn set_bet_amount(&mut self, amount: Amount) -> Result<()> {
        if !amount.is_positive() {
            return Err(PlinkoError::InvalidAmount(amount));
        }
        self.bet_amount = amount;
        Ok(())
    }

    /// Stakes of balls still in flight, by bet id
    pub fn outstanding_bets(&self) -> &BTreeMap<BetId, Amount> {
        &self.outstanding
    }

    pub fn win_records(&self) -> &[WinRecord] {
        &self.records
    }

    /// Total paid out through cash-out
    pub fn cashed_out(&self) -> Amount {
        self.cashed_out
    }

    /// Total of stakes returned by [`Ledger::refund`]
    pub fn refunded(&self) -> Amount {
        self.refunded
    }

    /// True while a cash-out holds the balance
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// True once a cash-out has succeeded
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Debit `amount` for a new ball
    ///
    /// Refused while a cash-out holds the balance, and when the largest
    /// possible payout of every stake in flight would no longer fit.
    pub fn place_bet(&mut self, amount: Amount) -> Result<BetHandle> {
        if self.closed {
            return Err(PlinkoError::SessionClosed);
        }
        if self.held {
            return Err(CashOutError::AlreadyInFlight.into());
        }
        if !amount.is_positive() {
            return Err(PlinkoError::InvalidAmount(amount));
        }
        if amount > self.balance {
            return Err(PlinkoError::InsufficientBalance {
                need: amount,
                available: self.balance,
            });
        }
        let balance = self
            .balance
            .checked_sub(amount)
            .ok_or(PlinkoError::Overflow("balance"))?;
        self.worst_case_balance(balance, amount)
            .ok_or(PlinkoError::Overflow("exposure"))?;

        let id = self.next_bet_id;
        self.next_bet_id += 1;
        self.balance = balance;
        self.outstanding.insert(id, amount);
        log::debug!("Bet {} placed: {} (balance {})", id, amount, self.balance);

        Ok(BetHandle { id, amount })
    }

    /// Balance if every stake in flight plus `extra` paid the top multiplier
    fn worst_case_balance(&self, balance: Amount, extra: Amount) -> Option<Amount> {
        self.outstanding
            .values()
            .copied()
            .chain(std::iter::once(extra))
            .try_fold(balance, |total, stake| {
                total.checked_add(stake.payout(MAX_MULTIPLIER)?)
            })
    }

    /// Append the win record for a landed ball and credit its payout
    ///
    /// Records are kept in settlement order, which may differ from the order
    /// the bets were placed in. On failure nothing changes and the handle is
    /// returned so the stake can still be settled or refunded.
    pub fn settle(
        &mut self,
        bet: BetHandle,
        landed: Landed,
    ) -> std::result::Result<&WinRecord, Unsettled> {
        let (stake, payout, balance) = match self.settlement(&bet, &landed) {
            Ok(values) => values,
            Err(error) => return Err(Unsettled { bet, error }),
        };
        let multiplier = landed.outcome.multiplier;

        self.outstanding.remove(&bet.id);
        self.balance = balance;

        let index = self.records.len();
        self.records.push(WinRecord {
            sequence: index as u64,
            ball_id: landed.ball_id,
            bin_index: landed.outcome.bin_index,
            bet_amount: stake,
            multiplier,
            payout,
            row_count: landed.row_count,
            risk_level: landed.risk_level,
            forced: landed.outcome.forced,
        });
        log::debug!(
            "Ball {} settled in bin {} at {}: paid {} (balance {})",
            landed.ball_id,
            landed.outcome.bin_index,
            multiplier,
            payout,
            self.balance
        );

        Ok(&self.records[index])
    }

    /// Stake, payout and new balance for a settlement, without writing
    fn settlement(&self, bet: &BetHandle, landed: &Landed) -> Result<(Amount, Amount, Amount)> {
        let stake = *self
            .outstanding
            .get(&bet.id)
            .ok_or(PlinkoError::UnknownBet(bet.id))?;
        let payout = stake
            .payout(landed.outcome.multiplier)
            .ok_or(PlinkoError::Overflow("payout"))?;
        let balance = self
            .balance
            .checked_add(payout)
            .ok_or(PlinkoError::Overflow("balance"))?;
        Ok((stake, payout, balance))
    }

    /// Give a stake back without a win record. Used when a landed ball cannot
    /// be settled.
    pub fn refund(&mut self, bet: BetHandle) -> Result<Amount> {
        let stake = *self
            .outstanding
            .get(&bet.id)
            .ok_or(PlinkoError::UnknownBet(bet.id))?;
        let balance = self
            .balance
            .checked_add(stake)
            .ok_or(PlinkoError::Overflow("balance"))?;
        let refunded = self
            .refunded
            .checked_add(stake)
            .ok_or(PlinkoError::Overflow("refunded"))?;

        self.outstanding.remove(&bet.id);
        self.balance = balance;
        self.refunded = refunded;
        log::warn!("Bet {} refunded: {} (balance {})", bet.id, stake, self.balance);
        Ok(stake)
    }

    /// Freeze the balance for a cash-out and return it
    ///
    /// Needs an idle board: every stake must be settled first, so the amount
    /// reported to the wallet is final.
    pub fn hold_for_cash_out(&mut self) -> Result<Amount> {
        if self.closed {
            return Err(PlinkoError::SessionClosed);
        }
        if self.held {
            return Err(CashOutError::AlreadyInFlight.into());
        }
        if !self.outstanding.is_empty() {
            return Err(PlinkoError::BallsInFlight(self.outstanding.len()));
        }
        self.held = true;
        log::debug!("Balance {} held for cash out", self.balance);
        Ok(self.balance)
    }

    /// Lift the hold after a failed cash-out
    pub fn release_hold(&mut self) {
        if self.held {
            log::debug!("Cash out hold released (balance {})", self.balance);
        }
        self.held = false;
    }

    /// Move `amount` out after the wallet accepted it and stop taking bets
    ///
    /// `amount` must be the balance that was held.
    pub fn record_cash_out(&mut self, amount: Amount) -> Result<Amount> {
        if self.closed {
            return Err(PlinkoError::SessionClosed);
        }
        if !self.held {
            return Err(CashOutError::NotInFlight.into());
        }
        if amount != self.balance {
            return Err(PlinkoError::InvalidAmount(amount));
        }
        let cashed_out = self
            .cashed_out
            .checked_add(amount)
            .ok_or(PlinkoError::Overflow("cashed_out"))?;
        self.cashed_out = cashed_out;
        self.balance = Amount::ZERO;
        self.held = false;
        self.closed = true;
        log::info!("Cashed out {}, ledger closed", amount);
        Ok(amount)
    }

/// Balance implied by the log:
    /// `initial - stakes in flight - settled stakes + payouts - cashed out`
    pub fn expected_balance(&self) -> Amount {
        let in_flight: Amount = self.outstanding.values().copied().sum();
        let staked: Amount = self.records.iter().map(|r| r.bet_amount).sum();
        let paid: Amount = self.records.iter().map(|r| r.payout).sum();
        self.initial_balance - in_flight - staked + paid - self.cashed_out
    }

    /// Empirical bin frequencies for `rows`, see [`stats::bin_probabilities`]
    pub fn bin_probabilities(&self, rows: RowCount) -> Vec<f64> {
        bin_probabilities(&self.records, rows)
    }

    /// Running total profit, seeded with zero
    pub fn total_profit_history(&self) -> Vec<Amount> {
        total_profit_history(&self.records)
    }

    pub fn total_profit(&self) -> Amount {
        self.records.iter().map(WinRecord::profit).sum()
    }
}
