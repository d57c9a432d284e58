//! Browser bridge
//!
//! Exposes a [`PlinkoGame`] handle to JavaScript. The session lives in an
//! `Rc<RefCell<_>>`; the cash-out borrows it only to begin and to complete,
//! never across the network await, so the page keeps animating meanwhile.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, future_to_promise};

use super::frame_dt;
use crate::cashout::{HttpTransport, WalletTransport, with_timeout};
use crate::config::{LaunchParams, SessionConfig};
use crate::money::Amount;
use crate::persistence::BalanceSnapshot;
use crate::session::Session;
use crate::tuning::{RiskLevel, RowCount};

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(js_err)
}

/// Read launch parameters from `window.location.search`
pub fn launch_params() -> LaunchParams {
    let search = web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default();
    LaunchParams::from_query(&search)
}

/// Resolves after `duration` on the window's `setTimeout`
async fn sleep(duration: Duration) {
    let ms = i32::try_from(duration.as_millis()).unwrap_or(i32::MAX);
    let promise = js_sys::Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window().map(|window| {
            window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
        });
        match scheduled {
            Some(Ok(_)) => {}
            Some(Err(e)) => log::error!("setTimeout failed: {:?}", e),
            None => log::error!("No window to schedule the cash out timeout on"),
        }
    });
    if let Err(e) = JsFuture::from(promise).await {
        log::error!("Timeout promise rejected: {:?}", e);
    }
}

fn redirect(uri: &str) {
    match web_sys::window() {
        Some(window) => {
            if let Err(e) = window.location().set_href(uri) {
                log::error!("Redirect to {} failed: {:?}", uri, e);
            }
        }
        None => log::error!("No window to redirect to {}", uri),
    }
}

#[wasm_bindgen]
pub struct PlinkoGame {
    session: Rc<RefCell<Session>>,
    last_time: f64,
}

#[wasm_bindgen]
impl PlinkoGame {
    /// New session seeded from the clock, using the page's query string
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<PlinkoGame, JsValue> {
        let seed = js_sys::Date::now() as u64;
        let session =
            Session::new(SessionConfig::with_seed(seed), launch_params()).map_err(js_err)?;
        Ok(Self {
            session: Rc::new(RefCell::new(session)),
            last_time: 0.0,
        })
    }

    /// Balance as a decimal string
    pub fn balance(&self) -> String {
        self.session.borrow().balance().to_string()
    }

    #[wasm_bindgen(js_name = setBetAmount)]
    pub fn set_bet_amount(&self, tokens: &str) -> Result<(), JsValue> {
        let amount = Amount::parse_tokens(tokens)
            .ok_or_else(|| JsValue::from_str("Bet amount must be a number"))?;
        self.session.borrow_mut().set_bet_amount(amount).map_err(js_err)
    }

    #[wasm_bindgen(js_name = setRiskLevel)]
    pub fn set_risk_level(&self, risk: &str) -> Result<(), JsValue> {
        let risk = RiskLevel::parse(risk)
            .ok_or_else(|| JsValue::from_str("Unknown risk level"))?;
        self.session.borrow_mut().set_risk_level(risk);
        Ok(())
    }

    #[wasm_bindgen(js_name = setRowCount)]
    pub fn set_row_count(&self, rows: u8) -> Result<(), JsValue> {
        let rows = RowCount::new(rows).map_err(js_err)?;
        self.session.borrow_mut().set_row_count(rows).map_err(js_err)
    }

    /// Drop one ball at the current bet; returns its id
    #[wasm_bindgen(js_name = dropBall)]
    pub fn drop_ball(&self) -> Result<u32, JsValue> {
        self.session.borrow_mut().drop_ball().map_err(js_err)
    }

    /// Advance to animation-frame time `time` (ms). Returns the newly settled
    /// win records as JSON.
    pub fn frame(&mut self, time: f64) -> Result<String, JsValue> {
        let dt = frame_dt(self.last_time, time);
        self.last_time = time;
        let settled = self.session.borrow_mut().advance(dt);
        to_json(&settled)
    }

    /// Ball positions for drawing: `[[id, x, y, radius], ...]`
    pub fn balls(&self) -> Result<String, JsValue> {
        let session = self.session.borrow();
        let balls: Vec<(u32, f32, f32, f32)> = session
            .world()
            .balls
            .iter()
            .map(|b| (b.id, b.pos.x, b.pos.y, b.radius))
            .collect();
        to_json(&balls)
    }

    /// Peg rows and bins (`[lo, hi, centre]`) of the current board
    pub fn lattice(&self) -> Result<String, JsValue> {
        let lattice = self.session.borrow().lattice();
        let pegs: Vec<Vec<(f32, f32)>> = lattice
            .pegs
            .iter()
            .map(|row| row.iter().map(|p| (p.x, p.y)).collect())
            .collect();
        let bins: Vec<(f32, f32, f32)> = lattice
            .bins
            .iter()
            .map(|b| (b.lo, b.hi, b.center()))
            .collect();
        to_json(&serde_json::json!({
            "width": lattice.width,
            "height": lattice.height,
            "pegRadius": lattice.peg_radius,
            "ballRadius": lattice.ball_radius,
            "pegs": pegs,
            "bins": bins,
        }))
    }

    /// Derived statistics for the HUD
    pub fn stats(&self) -> Result<String, JsValue> {
        let session = self.session.borrow();
        let payouts: Vec<f64> = session
            .payouts()
            .map_err(js_err)?
            .iter()
            .map(|m| m.as_f64())
            .collect();
        let colors = session.bin_colors();
        to_json(&serde_json::json!({
            "balance": session.balance().as_f64(),
            "betAmount": session.bet_amount().as_f64(),
            "binProbabilities": session.bin_probabilities(),
            "binColors": {
                "background": colors.background.iter().map(|c| c.css()).collect::<Vec<_>>(),
                "shadow": colors.shadow.iter().map(|c| c.css()).collect::<Vec<_>>(),
            },
            "payouts": payouts,
            "totalProfitHistory": session
                .total_profit_history()
                .iter()
                .map(|a| a.as_f64())
                .collect::<Vec<_>>(),
            "ballsInFlight": session.balls_in_flight(),
        }))
    }

    /// Save the balance snapshot (page unload)
    #[wasm_bindgen(js_name = saveBalance)]
    pub fn save_balance(&self) -> Result<(), JsValue> {
        self.session.borrow().end().save().map_err(js_err)
    }

    /// Last stored balance, if any
    #[wasm_bindgen(js_name = storedBalance)]
    pub fn stored_balance() -> Option<String> {
        BalanceSnapshot::load().map(|s| s.balance.to_string())
    }

    /// Cash out through the wallet; resolves after the redirect is issued,
    /// rejects with the error message otherwise. A wallet that does not answer
    /// within the configured timeout counts as a failed attempt.
    #[wasm_bindgen(js_name = cashOut)]
    pub fn cash_out(&self) -> js_sys::Promise {
        let session = Rc::clone(&self.session);
        future_to_promise(async move {
            let ticket = session.borrow_mut().begin_cash_out().map_err(js_err)?;
            let config = session.borrow().config().cash_out.clone();
            let result = match HttpTransport::new(&config) {
                Ok(transport) => {
                    let call = transport.post_cash_out(&ticket.url, &ticket.request);
                    with_timeout(call, sleep(config.timeout)).await
                }
                Err(e) => Err(e),
            };
            let handoff = session
                .borrow_mut()
                .complete_cash_out(ticket, result)
                .map_err(js_err)?;
            redirect(&handoff.redirect_uri);
            Ok(JsValue::from_f64(handoff.final_balance as f64))
        })
    }
}
