//! Fixed-point money and multipliers
//!
//! Balances are integer hundredths of a token so the ledger identity
//! `initial - bets + payouts` holds exactly. Multipliers are basis points.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// Hundredths per whole token
pub const CENTS_PER_TOKEN: i64 = 100;

/// Basis points per 1.0x
pub const MULTIPLIER_SCALE: u32 = 10_000;

/// A signed amount of tokens, stored in hundredths
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_tokens(tokens: i64) -> Self {
        Self(tokens * CENTS_PER_TOKEN)
    }

    /// Parse a decimal token string such as `"12"`, `"0.5"` or `"3.25"`
    pub fn parse_tokens(s: &str) -> Option<Self> {
        let s = s.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if frac.len() > 2 || !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return None;
        }
        let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let frac: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().ok()? * 10,
            _ => frac.parse().ok()?,
        };
        let cents = whole.checked_mul(CENTS_PER_TOKEN)?.checked_add(frac)?;
        Some(Self(if negative { -cents } else { cents }))
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Whole tokens, rounded toward negative infinity
    pub const fn floor_tokens(self) -> i64 {
        self.0.div_euclid(CENTS_PER_TOKEN)
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / CENTS_PER_TOKEN as f64
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Payout of a bet at the given multiplier, floored to the nearest hundredth
    pub fn payout(self, multiplier: Multiplier) -> Option<Amount> {
        let scaled = (self.0 as i128).checked_mul(multiplier.basis_points() as i128)?;
        let payout = scaled.div_euclid(MULTIPLIER_SCALE as i128);
        i64::try_from(payout).ok().map(Amount)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = CENTS_PER_TOKEN as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}

/// Payout multiplier in basis points (10_000 = 1.0x)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Multiplier(u32);

impl Multiplier {
    pub const fn from_basis_points(bp: u32) -> Self {
        Self(bp)
    }

    pub const fn basis_points(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / MULTIPLIER_SCALE as f64
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payout_floors_to_cents() {
        // 0.01 at 0.3x is 0.003 -> 0.00
        let bet = Amount::from_cents(1);
        assert_eq!(bet.payout(Multiplier::from_basis_points(3_000)), Some(Amount::ZERO));

        let bet = Amount::from_tokens(10);
        assert_eq!(
            bet.payout(Multiplier::from_basis_points(3_000)),
            Some(Amount::from_tokens(3))
        );
        assert_eq!(
            bet.payout(Multiplier::from_basis_points(10_000_000)),
            Some(Amount::from_tokens(10_000))
        );
    }

    #[test]
    fn test_payout_overflow_is_none() {
        let bet = Amount::from_cents(i64::MAX);
        assert_eq!(bet.payout(Multiplier::from_basis_points(20_000)), None);
    }

    #[test]
    fn test_floor_tokens() {
        assert_eq!(Amount::from_cents(19_999).floor_tokens(), 199);
        assert_eq!(Amount::from_cents(0).floor_tokens(), 0);
        assert_eq!(Amount::from_cents(-1).floor_tokens(), -1);
    }

    #[test]
    fn test_parse_tokens() {
        assert_eq!(Amount::parse_tokens("12"), Some(Amount::from_tokens(12)));
        assert_eq!(Amount::parse_tokens("0.5"), Some(Amount::from_cents(50)));
        assert_eq!(Amount::parse_tokens("3.25"), Some(Amount::from_cents(325)));
        assert_eq!(Amount::parse_tokens("-1"), Some(Amount::from_tokens(-1)));
        assert_eq!(Amount::parse_tokens("1.234"), None);
        assert_eq!(Amount::parse_tokens("abc"), None);
        assert_eq!(Amount::parse_tokens(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::from_cents(12_345).to_string(), "123.45");
        assert_eq!(Amount::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Multiplier::from_basis_points(3_000).to_string(), "0.3x");
    }
}
