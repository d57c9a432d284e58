//! Session context
//!
//! One `Session` owns everything a player's visit needs: the drop world, the
//! ledger, the current risk level and the cash-out coordinator. Hosts drive
//! it with [`Session::advance`] (frame time) or [`Session::tick`] (one fixed
//! step); both return the win records settled during the call. A landed ball
//! that cannot be settled gets its stake back and shows up in
//! [`Session::refunds`] instead.

use crate::cashout::{
    CashOutCoordinator, CashOutError, CashOutResponse, CashOutState, CashOutTicket, Handoff,
    WalletTransport,
};
use crate::config::{LaunchParams, SessionConfig};
use crate::consts::*;
use crate::error::{PlinkoError, Result};
use crate::ledger::{BetHandle, BetId, BinColors, Landed, Ledger, WinRecord, bin_colors};
use crate::money::{Amount, Multiplier};
use crate::persistence::BalanceSnapshot;
use crate::sim::{DropWorld, Lattice, resolve, step};
use crate::tuning::{RiskLevel, RowCount, payout_row};

/// A landed ball whose stake went back to the balance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub ball_id: u32,
    /// Zero when the stake could not be found either
    pub amount: Amount,
    pub reason: PlinkoError,
}

#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    params: LaunchParams,
    world: DropWorld,
    ledger: Ledger,
    risk: RiskLevel,
    cash_out: CashOutCoordinator,
    refunds: Vec<Refund>,
    accumulator: f32,
}

impl Session {
    /// Start a session with the balance named in the launch parameters
    pub fn new(config: SessionConfig, params: LaunchParams) -> Result<Self> {
        let initial = params.initial_balance();
        Self::with_balance(config, params, initial)
    }

    /// Start a session with an explicit opening balance
    pub fn with_balance(
        config: SessionConfig,
        params: LaunchParams,
        initial: Amount,
    ) -> Result<Self> {
        config.validate()?;
        if initial < Amount::ZERO {
            return Err(PlinkoError::InvalidAmount(initial));
        }

        let mut ledger = Ledger::new(initial);
        ledger.set_bet_amount(config.bet_amount)?;

        log::info!(
            "Session started: balance {}, {} rows, {} risk, seed {}",
            initial,
            config.rows.get(),
            config.risk.as_str(),
            config.seed
        );

        Ok(Self {
            world: DropWorld::new(config.rows, config.seed),
            risk: config.risk,
            cash_out: CashOutCoordinator::new(config.cash_out.clone()),
            config,
            params,
            ledger,
            refunds: Vec::new(),
            accumulator: 0.0,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn params(&self) -> &LaunchParams {
        &self.params
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn world(&self) -> &DropWorld {
        &self.world
    }

    pub fn lattice(&self) -> &'static Lattice {
        self.world.lattice
    }

    pub fn balance(&self) -> Amount {
        self.ledger.balance()
    }

    pub fn bet_amount(&self) -> Amount {
        self.ledger.bet_amount()
    }

    pub fn set_bet_amount(&mut self, amount: Amount) -> Result<()> {
        self.ledger.set_bet_amount(amount)
    }

    pub fn risk_level(&self) -> RiskLevel {
        self.risk
    }

    /// Applies to the next drop; balls in flight keep their own risk level
    pub fn set_risk_level(&mut self, risk: RiskLevel) {
        self.risk = risk;
    }

    pub fn row_count(&self) -> RowCount {
        self.world.rows()
    }

    /// Rebuilds the board. Refused while any ball is in flight.
    pub fn set_row_count(&mut self, rows: RowCount) -> Result<()> {
        if !self.world.set_rows(rows) {
            return Err(PlinkoError::BallsInFlight(self.world.in_flight()));
        }
        log::info!("Board set to {} rows", rows.get());
        Ok(())
    }

    pub fn balls_in_flight(&self) -> usize {
        self.world.in_flight()
    }

    pub fn is_idle(&self) -> bool {
        self.world.is_idle()
    }

    /// Stakes of balls still in flight, by bet id
    pub fn outstanding_bets(&self) -> Vec<(BetId, Amount)> {
        self.ledger
            .outstanding_bets()
            .iter()
            .map(|(&id, &amount)| (id, amount))
            .collect()
    }

    pub fn win_records(&self) -> &[WinRecord] {
        self.ledger.win_records()
    }

    /// Landed balls that were refunded instead of settled
    pub fn refunds(&self) -> &[Refund] {
        &self.refunds
    }

    /// Place a bet at the current bet amount and drop a ball for it
    pub fn drop_ball(&mut self) -> Result<u32> {
        let bet = self.ledger.place_bet(self.ledger.bet_amount())?;
        let id = self.world.spawn_ball(self.risk, bet);
        log::debug!("Dropped ball {} ({} risk)", id, self.risk.as_str());
        Ok(id)
    }

    /// One fixed simulation step
    ///
    /// Every ball that lands is either settled or refunded before this
    /// returns; no stake stays outstanding for a ball that left the board.
    pub fn tick(&mut self) -> Vec<WinRecord> {
        let rows = self.world.rows();
        let lattice = self.world.lattice;
        let mut settled = Vec::new();

        for landing in step(&mut self.world, SIM_DT) {
            let ball = landing.ball;
            let outcome = match resolve(lattice, ball.risk, landing.x, landing.kind) {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.refund(ball.id, ball.bet, e);
                    continue;
                }
            };
            let landed = Landed {
                ball_id: ball.id,
                row_count: rows,
                risk_level: ball.risk,
                outcome,
            };
            match self.ledger.settle(ball.bet, landed) {
                Ok(record) => settled.push(record.clone()),
                Err(unsettled) => self.refund(ball.id, unsettled.bet, unsettled.error),
            }
        }
        settled
    }

    fn refund(&mut self, ball_id: u32, bet: BetHandle, reason: PlinkoError) {
        log::error!("Ball {} could not be settled: {}", ball_id, reason);
        let amount = match self.ledger.refund(bet) {
            Ok(amount) => amount,
            Err(e) => {
                log::error!("Ball {} stake not refunded: {}", ball_id, e);
                Amount::ZERO
            }
        };
        self.refunds.push(Refund {
            ball_id,
            amount,
            reason,
        });
    }

    /// Run as many fixed steps as `frame_dt` seconds cover
    pub fn advance(&mut self, frame_dt: f32) -> Vec<WinRecord> {
        self.accumulator += frame_dt.clamp(0.0, 0.1);

        let mut settled = Vec::new();
        let mut substeps = 0;
        while self.accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
            settled.extend(self.tick());
            self.accumulator -= SIM_DT;
            substeps += 1;
        }
        settled
    }

    /// Tick until no ball is in flight
    ///
    /// Terminates because every ball is forced down after `MAX_BALL_TICKS`.
    pub fn run_until_idle(&mut self) -> Vec<WinRecord> {
        let mut settled = Vec::new();
        let mut ticks = 0;
        while !self.world.is_idle() && ticks <= MAX_BALL_TICKS {
            settled.extend(self.tick());
            ticks += 1;
        }
        settled
    }

    pub fn bin_probabilities(&self) -> Vec<f64> {
        self.ledger.bin_probabilities(self.row_count())
    }

    pub fn bin_colors(&self) -> BinColors {
        bin_colors(self.row_count())
    }

    pub fn total_profit_history(&self) -> Vec<Amount> {
        self.ledger.total_profit_history()
    }

    /// Multipliers for the current board and risk level, one per bin
    pub fn payouts(&self) -> Result<Vec<Multiplier>> {
        payout_row(self.risk, self.row_count())
    }

    pub fn cash_out_state(&self) -> &CashOutState {
        self.cash_out.state()
    }

    /// Start a cash-out. Needs an idle board; no ball can be dropped until
    /// it completes.
    pub fn begin_cash_out(&mut self) -> Result<CashOutTicket> {
        self.cash_out.begin(&self.params, &mut self.ledger)
    }

    pub fn complete_cash_out(
        &mut self,
        ticket: CashOutTicket,
        result: std::result::Result<CashOutResponse, CashOutError>,
    ) -> Result<Handoff> {
        self.cash_out.complete(ticket, result, &mut self.ledger)
    }

    /// Full cash-out through `transport`
    pub async fn cash_out(&mut self, transport: &dyn WalletTransport) -> Result<Handoff> {
        self.cash_out
            .request_cash_out(&self.params, &mut self.ledger, transport)
            .await
    }

    /// Snapshot of the balance for persistence
    pub fn end(&self) -> BalanceSnapshot {
        log::info!(
            "Session ended: balance {}, {} drops, profit {}",
            self.ledger.balance(),
            self.ledger.win_records().len(),
            self.ledger.total_profit()
        );
        BalanceSnapshot::new(self.ledger.balance())
    }
}
