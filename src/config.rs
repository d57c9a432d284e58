//! Launch parameters and session configuration
//!
//! The host app opens the game with a query string such as
//! `?tokens=350&cloudFunction=https://...&uid=abc`. It is read once into
//! [`LaunchParams`] and never consulted again.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::cashout::CashOutError;
use crate::error::{PlinkoError, Result};
use crate::ledger::Ledger;
use crate::money::Amount;
use crate::tuning::{RiskLevel, RowCount};

/// Starting balance when `tokens` is absent or unusable
pub const DEFAULT_INITIAL_TOKENS: i64 = 200;

/// Where the host app expects to be sent after a successful cash-out
pub const DEFAULT_REDIRECT_URI: &str = "fitness305casino://cash-out-complete";

/// Default wallet request timeout
pub const DEFAULT_CASH_OUT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters the host app launches the game with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchParams {
    /// Starting balance in tokens, as given
    pub tokens: Option<String>,
    /// Wallet endpoint that receives the cash-out POST
    pub cloud_function: Option<String>,
    /// Player id forwarded to the wallet
    pub uid: Option<String>,
}

/// Cash-out parameters that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CashOutTarget {
    pub url: String,
    pub uid: String,
}

impl LaunchParams {
    /// Parse a URL query string (leading `?` optional). Unknown keys are ignored.
    ///
    /// There is no redirect key: the handoff target comes only from
    /// [`CashOutConfig::redirect_uri`].
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let Ok(mut url) = Url::parse("plinko://launch") else {
            return params;
        };
        url.set_query(Some(query.trim_start_matches('?')));

        for (key, value) in url.query_pairs() {
            let value = value.into_owned();
            match key.as_ref() {
                "tokens" => params.tokens = Some(value),
                "cloudFunction" => params.cloud_function = Some(value),
                "uid" => params.uid = Some(value),
                "redirect" | "redirectUri" => {
                    log::warn!("Ignoring launch redirect '{}'", value)
                }
                other => log::debug!("Ignoring launch parameter '{}'", other),
            }
        }
        params
    }

    /// Starting balance in whole tokens, falling back to
    /// [`DEFAULT_INITIAL_TOKENS`]
    ///
    /// Only the leading integer counts, so `"150abc"` is 150 and `"1.9"` is 1.
    pub fn initial_balance(&self) -> Amount {
        let default = Amount::from_tokens(DEFAULT_INITIAL_TOKENS);
        let Some(raw) = self.tokens.as_deref() else {
            return default;
        };
        let cents = leading_integer(raw).and_then(|tokens| tokens.checked_mul(100));
        match cents {
            Some(cents) if cents >= 0 => Amount::from_cents(cents),
            _ => {
                log::warn!(
                    "Unusable tokens parameter '{}', starting with {} tokens",
                    raw,
                    DEFAULT_INITIAL_TOKENS
                );
                default
            }
        }
    }

    /// Check the parameters a cash-out needs. Empty values count as missing.
    pub fn validate_for_cash_out(&self) -> std::result::Result<CashOutTarget, CashOutError> {
        let url = non_empty(&self.cloud_function)
            .ok_or(CashOutError::MissingParameters("cloudFunction"))?;
        let uid = non_empty(&self.uid).ok_or(CashOutError::MissingParameters("uid"))?;
        Ok(CashOutTarget {
            url: url.to_string(),
            uid: uid.to_string(),
        })
    }
}

/// Optional sign and digits at the start of `raw`, after leading whitespace
fn leading_integer(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let sign_len = usize::from(s.starts_with(['+', '-']));
    let digits_len = s[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits_len == 0 {
        return None;
    }
    s[..sign_len + digits_len].parse().ok()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Cash-out handoff settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CashOutConfig {
    pub redirect_uri: String,
    /// Wallet request timeout. Set on the reqwest client natively, raced
    /// against a `setTimeout` timer in the browser.
    pub timeout: Duration,
}

impl Default for CashOutConfig {
    fn default() -> Self {
        Self {
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            timeout: DEFAULT_CASH_OUT_TIMEOUT,
        }
    }
}

/// Defaults for a new session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// RNG seed for the drop world
    pub seed: u64,
    pub rows: RowCount,
    pub risk: RiskLevel,
    pub bet_amount: Amount,
    pub cash_out: CashOutConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            rows: RowCount::default(),
            risk: RiskLevel::default(),
            bet_amount: Ledger::DEFAULT_BET,
            cash_out: CashOutConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.bet_amount.is_positive() {
            return Err(PlinkoError::InvalidAmount(self.bet_amount));
        }
        if self.cash_out.redirect_uri.trim().is_empty() {
            return Err(PlinkoError::config("redirect URI is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_reads_known_keys() {
        let params = LaunchParams::from_query(
            "?tokens=350&cloudFunction=https%3A%2F%2Fwallet.test%2Fcash&uid=player%201&theme=dark",
        );
        assert_eq!(params.tokens.as_deref(), Some("350"));
        assert_eq!(
            params.cloud_function.as_deref(),
            Some("https://wallet.test/cash")
        );
        assert_eq!(params.uid.as_deref(), Some("player 1"));
        assert_eq!(params.initial_balance(), Amount::from_tokens(350));
    }

    #[test]
    fn test_initial_balance_fallbacks() {
        let mut params = LaunchParams::default();
        assert_eq!(params.initial_balance(), Amount::from_tokens(200));

        for bad in ["", "abc", "-5", "+", ".5", "99999999999999999999"] {
            params.tokens = Some(bad.to_string());
            assert_eq!(params.initial_balance(), Amount::from_tokens(200), "{bad}");
        }

        for (raw, tokens) in [
            ("0", 0),
            ("12.5", 12),
            ("1.234", 1),
            ("150abc", 150),
            ("  42", 42),
            ("+7", 7),
        ] {
            params.tokens = Some(raw.to_string());
            assert_eq!(params.initial_balance(), Amount::from_tokens(tokens), "{raw}");
        }
    }

    #[test]
    fn test_validate_for_cash_out() {
        let params = LaunchParams::from_query("uid=abc");
        assert_eq!(
            params.validate_for_cash_out(),
            Err(CashOutError::MissingParameters("cloudFunction"))
        );

        let params = LaunchParams::from_query("cloudFunction=https://w.test&uid=");
        assert_eq!(
            params.validate_for_cash_out(),
            Err(CashOutError::MissingParameters("uid"))
        );

        let params = LaunchParams::from_query("cloudFunction=https://w.test&uid=abc");
        let target = params.validate_for_cash_out().unwrap();
        assert_eq!(target.url, "https://w.test");
        assert_eq!(target.uid, "abc");
    }

    #[test]
    fn test_redirect_parameters_are_ignored() {
        let params = LaunchParams::from_query(
            "uid=abc&redirect=https%3A%2F%2Fevil.test&redirectUri=https%3A%2F%2Fevil.test",
        );
        assert_eq!(
            params,
            LaunchParams {
                uid: Some("abc".to_string()),
                ..LaunchParams::default()
            }
        );
    }

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.rows.get(), 16);
        assert_eq!(config.risk, RiskLevel::Medium);
        assert_eq!(config.bet_amount, Amount::from_tokens(1));
        assert!(config.validate().is_ok());

        let bad = SessionConfig {
            bet_amount: Amount::ZERO,
            ..SessionConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}
