//! Accounts and holdings

use crate::ids::{AccountId, Ticker};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A trader account
///
/// Cash changes only through settlement or admin initialization. The raw
/// API key is never stored; only its SHA-256 hex digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    #[serde(with = "crate::numeric::decimal_str")]
    pub cash_balance: Decimal,
    /// SHA-256 hex digest of the API key. Row serialization keeps it for
    /// journal replay; handler DTOs never expose it on the wire.
    #[serde(default)]
    pub api_key_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: AccountId,
        cash_balance: Decimal,
        api_key_hash: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            cash_balance,
            api_key_hash,
            created_at,
        }
    }

    /// Debit cash; fails rather than going negative
    pub fn debit(&mut self, amount: Decimal) -> Result<(), &'static str> {
        if amount > self.cash_balance {
            return Err("insufficient cash");
        }
        self.cash_balance -= amount;
        Ok(())
    }

    /// Credit cash
    pub fn credit(&mut self, amount: Decimal) {
        self.cash_balance += amount;
    }
}

/// A share position, keyed by (account, ticker)
///
/// Rows with zero quantity are deleted, not stored: an account owns a
/// holding iff it has a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: AccountId,
    pub ticker: Ticker,
    pub quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn sample_account(cash: &str) -> Account {
        Account::new(
            AccountId::new("alice"),
            Decimal::from_str(cash).unwrap(),
            "deadbeef".to_string(),
            Utc.with_ymd_and_hms(2024, 2, 17, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_debit_credit() {
        let mut account = sample_account("1000.00");
        account.debit(Decimal::from_str("250.50").unwrap()).unwrap();
        assert_eq!(account.cash_balance, Decimal::from_str("749.50").unwrap());

        account.credit(Decimal::from_str("0.50").unwrap());
        assert_eq!(account.cash_balance, Decimal::from_str("750.00").unwrap());
    }

    #[test]
    fn test_debit_never_negative() {
        let mut account = sample_account("10.00");
        let result = account.debit(Decimal::from_str("10.01").unwrap());
        assert!(result.is_err());
        assert_eq!(account.cash_balance, Decimal::from_str("10.00").unwrap());
    }

    #[test]
    fn test_cash_serialized_as_string() {
        let account = sample_account("100.00");
        let json = serde_json::to_string(&account).unwrap();
        assert!(json.contains("\"100.00\""));
    }
}
