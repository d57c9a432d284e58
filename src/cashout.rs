//! Cash-out handshake with the external wallet
//!
//! The coordinator is a small state machine:
//!
//! ```text
//! Idle -> InFlight -> Succeeded
//!            |
//!            +-----> Failed(reason) -> InFlight (retry)
//! ```
//!
//! [`CashOutCoordinator::begin`] needs an idle board and holds the ledger
//! balance: no bet is taken until [`CashOutCoordinator::complete`] either
//! moves exactly the reported amount out or lifts the hold. The two calls are
//! separate so the caller can keep rendering while the request is
//! outstanding. [`CashOutCoordinator::request_cash_out`] runs both around a
//! [`WalletTransport`] call for callers that can hold the ledger across the
//! await.

use std::future::Future;

use async_trait::async_trait;
use futures::future::{self, Either};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CashOutConfig, LaunchParams};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::money::Amount;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CashOutError {
    #[error("Missing required parameter for cash out: {0}")]
    MissingParameters(&'static str),

    #[error("A cash out is already in progress")]
    AlreadyInFlight,

    #[error("Balance has already been cashed out")]
    AlreadySettled,

    #[error("No cash out is in progress for this ticket")]
    NotInFlight,

    #[error("Wallet request failed: {0}")]
    Transport(String),

    #[error("Cash out failed")]
    Rejected,
}

impl CashOutError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CashOutState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    /// Last attempt failed; a retry is allowed
    Failed(CashOutError),
}

/// Body POSTed to the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashOutRequest {
    pub uid: String,
    /// Whole tokens, floored
    #[serde(rename = "finalBalance")]
    pub final_balance: i64,
    pub has_cashed_out_plinko: bool,
}

/// Wallet reply. Anything without `"success": true` is a rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashOutResponse {
    #[serde(default)]
    pub success: bool,
}

/// One POST to the wallet endpoint
#[async_trait(?Send)]
pub trait WalletTransport {
    async fn post_cash_out(
        &self,
        url: &str,
        request: &CashOutRequest,
    ) -> std::result::Result<CashOutResponse, CashOutError>;
}

/// `reqwest`-backed transport. Works natively and in the browser.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[cfg_attr(target_arch = "wasm32", allow(unused_variables))]
    pub fn new(config: &CashOutConfig) -> std::result::Result<Self, CashOutError> {
        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(config.timeout);
        let client = builder
            .build()
            .map_err(|e| CashOutError::transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait(?Send)]
impl WalletTransport for HttpTransport {
    async fn post_cash_out(
        &self,
        url: &str,
        request: &CashOutRequest,
    ) -> std::result::Result<CashOutResponse, CashOutError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| CashOutError::transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CashOutError::transport(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json::<CashOutResponse>()
            .await
            .map_err(|e| CashOutError::transport(format!("Invalid response body: {}", e)))
    }
}

/// Race a wallet call against `timer`. If the timer finishes first the call
/// is dropped and the result is `Transport("timeout")`.
pub async fn with_timeout<C, T>(
    call: C,
    timer: T,
) -> std::result::Result<CashOutResponse, CashOutError>
where
    C: Future<Output = std::result::Result<CashOutResponse, CashOutError>>,
    T: Future<Output = ()>,
{
    match future::select(Box::pin(call), Box::pin(timer)).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => {
            log::warn!("Wallet request timed out");
            Err(CashOutError::transport("timeout"))
        }
    }
}

/// An outstanding cash-out. Not `Clone`: it completes exactly once.
#[derive(Debug)]
pub struct CashOutTicket {
    id: u64,
    pub url: String,
    pub request: CashOutRequest,
    /// Exact balance held when the request was built
    amount: Amount,
    redirect_uri: String,
}

impl CashOutTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// What the host should do after a successful cash-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub redirect_uri: String,
    /// Whole tokens reported to the wallet
    pub final_balance: i64,
    /// Exact amount removed from the ledger
    pub cashed_out: Amount,
}

#[derive(Debug, Default)]
pub struct CashOutCoordinator {
    config: CashOutConfig,
    state: CashOutState,
    /// Id of the ticket currently in flight
    current: Option<u64>,
    next_ticket: u64,
}

impl CashOutCoordinator {
    pub fn new(config: CashOutConfig) -> Self {
        Self {
            config,
            state: CashOutState::Idle,
            current: None,
            next_ticket: 1,
        }
    }

    pub fn state(&self) -> &CashOutState {
        &self.state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state == CashOutState::InFlight
    }

    /// Last failure, if the most recent attempt failed
    pub fn last_error(&self) -> Option<&CashOutError> {
        match &self.state {
            CashOutState::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn config(&self) -> &CashOutConfig {
        &self.config
    }

    /// Validate the parameters, hold the ledger balance and enter `InFlight`
    ///
    /// Fails with `BallsInFlight` unless every bet has settled.
    pub fn begin(&mut self, params: &LaunchParams, ledger: &mut Ledger) -> Result<CashOutTicket> {
        match self.state {
            CashOutState::InFlight => return Err(CashOutError::AlreadyInFlight.into()),
            CashOutState::Succeeded => return Err(CashOutError::AlreadySettled.into()),
            CashOutState::Idle | CashOutState::Failed(_) => {}
        }
        if ledger.is_closed() {
            return Err(CashOutError::AlreadySettled.into());
        }
        let target = params.validate_for_cash_out()?;
        let amount = ledger.hold_for_cash_out()?;

        let id = self.next_ticket.max(1);
        self.next_ticket = id + 1;
        self.current = Some(id);
        self.state = CashOutState::InFlight;

        let final_balance = amount.floor_tokens();
        log::info!("Cash out {} started: {} tokens", id, final_balance);

        Ok(CashOutTicket {
            id,
            url: target.url,
            request: CashOutRequest {
                uid: target.uid,
                final_balance,
                has_cashed_out_plinko: true,
            },
            amount,
            redirect_uri: self.config.redirect_uri.clone(),
        })
    }

    /// Apply the wallet's answer
    ///
    /// On acceptance the held amount is moved out and the ledger closed. On
    /// any failure the hold is lifted, the balance is left alone and the
    /// coordinator moves to `Failed`.
    pub fn complete(
        &mut self,
        ticket: CashOutTicket,
        result: std::result::Result<CashOutResponse, CashOutError>,
        ledger: &mut Ledger,
    ) -> Result<Handoff> {
        if self.state != CashOutState::InFlight || self.current != Some(ticket.id) {
            return Err(CashOutError::NotInFlight.into());
        }
        self.current = None;

        let failure = match result {
            Ok(CashOutResponse { success: true }) => None,
            Ok(_) => {
                log::warn!("Cash out {} rejected by wallet", ticket.id);
                Some(CashOutError::Rejected)
            }
            Err(e) => {
                log::error!("Cash out {} failed: {}", ticket.id, e);
                Some(e)
            }
        };
        if let Some(reason) = failure {
            ledger.release_hold();
            self.state = CashOutState::Failed(reason.clone());
            return Err(reason.into());
        }

        let cashed_out = match ledger.record_cash_out(ticket.amount) {
            Ok(amount) => amount,
            Err(e) => {
                ledger.release_hold();
                self.state = CashOutState::Failed(CashOutError::transport(e.to_string()));
                return Err(e);
            }
        };
        self.state = CashOutState::Succeeded;
        log::info!(
            "Cash out {} accepted, handing off to {}",
            ticket.id,
            ticket.redirect_uri
        );

        Ok(Handoff {
            redirect_uri: ticket.redirect_uri,
            final_balance: ticket.request.final_balance,
            cashed_out,
        })
    }

    /// `begin`, one POST through `transport`, then `complete`
    pub async fn request_cash_out(
        &mut self,
        params: &LaunchParams,
        ledger: &mut Ledger,
        transport: &dyn WalletTransport,
    ) -> Result<Handoff> {
        let ticket = self.begin(params, ledger)?;
        let result = transport.post_cash_out(&ticket.url, &ticket.request).await;
        self.complete(ticket, result, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlinkoError;
    use std::cell::RefCell;
    use std::time::Duration;

    /// Replays canned replies and remembers what was sent
    struct MockTransport {
        replies: RefCell<Vec<std::result::Result<CashOutResponse, CashOutError>>>,
        sent: RefCell<Vec<(String, CashOutRequest)>>,
    }

    impl MockTransport {
        fn new(replies: Vec<std::result::Result<CashOutResponse, CashOutError>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl WalletTransport for MockTransport {
        async fn post_cash_out(
            &self,
            url: &str,
            request: &CashOutRequest,
        ) -> std::result::Result<CashOutResponse, CashOutError> {
            self.sent
                .borrow_mut()
                .push((url.to_string(), request.clone()));
            self.replies.borrow_mut().remove(0)
        }
    }

    fn params() -> LaunchParams {
        LaunchParams::from_query("tokens=500&cloudFunction=https://wallet.test/cash&uid=abc")
    }

    fn accepted() -> std::result::Result<CashOutResponse, CashOutError> {
        Ok(CashOutResponse { success: true })
    }

    #[tokio::test]
    async fn test_missing_uid_never_calls_transport() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(500));
        let transport = MockTransport::new(vec![accepted()]);
        let params = LaunchParams::from_query("cloudFunction=https://wallet.test/cash");

        let err = coordinator
            .request_cash_out(&params, &mut ledger, &transport)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PlinkoError::CashOut(CashOutError::MissingParameters("uid"))
        );
        assert!(transport.sent.borrow().is_empty());
        assert_eq!(coordinator.state(), &CashOutState::Idle);
        assert_eq!(ledger.balance(), Amount::from_tokens(500));
    }

    #[tokio::test]
    async fn test_success_zeroes_balance_and_hands_off() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_cents(50_075));
        let transport = MockTransport::new(vec![accepted()]);

        let handoff = coordinator
            .request_cash_out(&params(), &mut ledger, &transport)
            .await
            .unwrap();

        assert_eq!(handoff.final_balance, 500);
        assert_eq!(handoff.cashed_out, Amount::from_cents(50_075));
        assert_eq!(handoff.redirect_uri, "fitness305casino://cash-out-complete");
        assert_eq!(ledger.balance(), Amount::ZERO);
        assert!(ledger.is_closed());
        assert_eq!(coordinator.state(), &CashOutState::Succeeded);

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://wallet.test/cash");
        assert_eq!(
            sent[0].1,
            CashOutRequest {
                uid: "abc".to_string(),
                final_balance: 500,
                has_cashed_out_plinko: true,
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_keeps_balance_and_allows_retry() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(500));
        let transport = MockTransport::new(vec![
            Err(CashOutError::transport("HTTP 500: boom")),
            accepted(),
        ]);

        let err = coordinator
            .request_cash_out(&params(), &mut ledger, &transport)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PlinkoError::CashOut(CashOutError::Transport(_))
        ));
        assert_eq!(ledger.balance(), Amount::from_tokens(500));
        assert!(matches!(coordinator.last_error(), Some(CashOutError::Transport(_))));

        coordinator
            .request_cash_out(&params(), &mut ledger, &transport)
            .await
            .unwrap();
        assert_eq!(ledger.balance(), Amount::ZERO);
    }

    #[tokio::test]
    async fn test_unsuccessful_body_is_rejection() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(10));
        let transport = MockTransport::new(vec![Ok(CashOutResponse::default())]);

        let err = coordinator
            .request_cash_out(&params(), &mut ledger, &transport)
            .await
            .unwrap_err();
        assert_eq!(err, PlinkoError::CashOut(CashOutError::Rejected));
        assert_eq!(
            coordinator.state(),
            &CashOutState::Failed(CashOutError::Rejected)
        );
        assert_eq!(ledger.balance(), Amount::from_tokens(10));
        assert!(!ledger.is_closed());
    }

    #[test]
    fn test_no_bet_is_taken_while_in_flight() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(500));

        let ticket = coordinator.begin(&params(), &mut ledger).unwrap();
        assert_eq!(ticket.request.final_balance, 500);
        assert!(coordinator.is_in_flight());
        assert_eq!(
            coordinator.begin(&params(), &mut ledger).unwrap_err(),
            PlinkoError::CashOut(CashOutError::AlreadyInFlight)
        );

        // Staking the reported balance again must not go through
        assert_eq!(
            ledger.place_bet(Amount::from_tokens(500)).unwrap_err(),
            PlinkoError::CashOut(CashOutError::AlreadyInFlight)
        );
        assert_eq!(ledger.balance(), Amount::from_tokens(500));
        assert!(ledger.outstanding_bets().is_empty());

        let handoff = coordinator.complete(ticket, accepted(), &mut ledger).unwrap();
        assert_eq!(handoff.final_balance, 500);
        assert_eq!(handoff.cashed_out, Amount::from_tokens(500));
        assert_eq!(ledger.cashed_out(), Amount::from_tokens(500));
        assert_eq!(ledger.balance(), Amount::ZERO);
        assert_eq!(ledger.balance(), ledger.expected_balance());
        assert_eq!(
            coordinator.begin(&params(), &mut ledger).unwrap_err(),
            PlinkoError::CashOut(CashOutError::AlreadySettled)
        );
    }

    #[test]
    fn test_begin_refused_with_balls_in_flight() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(500));
        let _bet = ledger.place_bet(Amount::from_tokens(500)).unwrap();

        assert_eq!(
            coordinator.begin(&params(), &mut ledger).unwrap_err(),
            PlinkoError::BallsInFlight(1)
        );
        assert_eq!(coordinator.state(), &CashOutState::Idle);
        assert!(!ledger.is_held());
    }

    #[test]
    fn test_failure_lifts_hold_so_play_resumes() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(20));

        let ticket = coordinator.begin(&params(), &mut ledger).unwrap();
        assert!(ledger.is_held());
        coordinator
            .complete(ticket, Err(CashOutError::transport("timeout")), &mut ledger)
            .unwrap_err();

        assert!(!ledger.is_held());
        assert!(ledger.place_bet(Amount::from_tokens(5)).is_ok());
        assert_eq!(ledger.balance(), Amount::from_tokens(15));
    }

    #[test]
    fn test_foreign_ticket_is_refused() {
        let mut a = CashOutCoordinator::default();
        let mut b = CashOutCoordinator::default();
        let mut ledger_a = Ledger::new(Amount::from_tokens(5));
        let mut ledger_b = Ledger::new(Amount::from_tokens(5));

        let _ticket_a = a.begin(&params(), &mut ledger_a).unwrap();
        let ticket_b1 = b.begin(&params(), &mut ledger_b).unwrap();
        b.complete(ticket_b1, Err(CashOutError::Rejected), &mut ledger_b)
            .unwrap_err();
        let ticket_b2 = b.begin(&params(), &mut ledger_b).unwrap();

        // ticket 2 from `b` does not match ticket 1 in flight on `a`
        assert_eq!(
            a.complete(ticket_b2, accepted(), &mut ledger_a).unwrap_err(),
            PlinkoError::CashOut(CashOutError::NotInFlight)
        );
        assert_eq!(ledger_a.balance(), Amount::from_tokens(5));
        assert!(ledger_a.is_held());
        assert!(a.is_in_flight());
    }

    #[tokio::test]
    async fn test_handoff_ignores_launch_redirect() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(3));
        let transport = MockTransport::new(vec![accepted()]);
        let params = LaunchParams::from_query(
            "cloudFunction=https://wallet.test/cash&uid=abc&redirect=https%3A%2F%2Fevil.test",
        );

        let handoff = coordinator
            .request_cash_out(&params, &mut ledger, &transport)
            .await
            .unwrap();
        assert_eq!(handoff.redirect_uri, crate::config::DEFAULT_REDIRECT_URI);
    }

    #[tokio::test]
    async fn test_slow_wallet_times_out_and_keeps_balance() {
        let mut coordinator = CashOutCoordinator::default();
        let mut ledger = Ledger::new(Amount::from_tokens(40));
        let ticket = coordinator.begin(&params(), &mut ledger).unwrap();

        let never = future::pending::<std::result::Result<CashOutResponse, CashOutError>>();
        let timer = tokio::time::sleep(Duration::from_millis(20));
        let result = with_timeout(never, timer).await;
        assert_eq!(result, Err(CashOutError::transport("timeout")));

        let err = coordinator.complete(ticket, result, &mut ledger).unwrap_err();
        assert_eq!(
            err,
            PlinkoError::CashOut(CashOutError::Transport("timeout".to_string()))
        );
        assert_eq!(ledger.balance(), Amount::from_tokens(40));
        assert!(!ledger.is_held());
        assert!(matches!(coordinator.state(), CashOutState::Failed(_)));
    }

    #[tokio::test]
    async fn test_prompt_reply_beats_the_timer() {
        let reply = with_timeout(
            async { accepted() },
            tokio::time::sleep(Duration::from_secs(60)),
        )
        .await;
        assert_eq!(reply, accepted());
    }

    #[test]
    fn test_request_body_uses_wallet_field_names() {
        let request = CashOutRequest {
            uid: "u1".to_string(),
            final_balance: 42,
            has_cashed_out_plinko: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"uid": "u1", "finalBalance": 42, "has_cashed_out_plinko": true})
        );

        let reply: CashOutResponse = serde_json::from_str(r#"{"message":"ok"}"#).unwrap();
        assert!(!reply.success);
    }
}
