//! Listed companies

use crate::ids::Ticker;
use crate::numeric::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A company listed on the exchange
///
/// Immutable after creation. `float_shares` is the publicly tradeable
/// portion of `total_shares`; the remainder stays parked in the treasury
/// account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub ticker: Ticker,
    pub name: String,
    pub total_shares: u64,
    pub float_shares: u64,
    pub ipo_price: Option<Price>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Validate creation constraints: total > 0, 0 <= float <= total
    pub fn validate(total_shares: u64, float_shares: u64) -> Result<(), &'static str> {
        if total_shares == 0 {
            return Err("total_shares must be positive");
        }
        if float_shares > total_shares {
            return Err("float_shares cannot exceed total_shares");
        }
        Ok(())
    }
}
