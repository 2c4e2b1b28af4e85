//! Trade records
//!
//! A trade is one fill between a buy order and a sell order. Trades are
//! append-only and never modified after creation.

use crate::ids::{AccountId, OrderId, Ticker, TradeId};
use crate::numeric::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A completed fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub ticker: Ticker,
    pub price: Price,
    pub quantity: u64,
    pub buyer_id: AccountId,
    pub seller_id: AccountId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub timestamp: DateTime<Utc>,
    /// Store-issued monotone sequence; total order of fills per ticker
    #[serde(default)]
    pub seq: u64,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ticker: Ticker,
        price: Price,
        quantity: u64,
        buyer_id: AccountId,
        seller_id: AccountId,
        buy_order_id: OrderId,
        sell_order_id: OrderId,
        timestamp: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: TradeId::new(),
            ticker,
            price,
            quantity,
            buyer_id,
            seller_id,
            buy_order_id,
            sell_order_id,
            timestamp,
            seq,
        }
    }

    /// Cash moved by this trade (price × quantity)
    pub fn notional(&self) -> Decimal {
        self.price.notional(self.quantity)
    }

    /// A self-trade nets cash and shares to zero within one account
    pub fn is_self_trade(&self) -> bool {
        self.buyer_id == self.seller_id
    }
}
