//! Trading strategies
//!
//! A strategy is a pure decision function over a market snapshot: given a
//! `MarketContext` it returns order intents, and the runtime executes them.
//! Concrete strategies are a tagged sum so the runtime owns a single value
//! regardless of kind.

pub mod dsl;
pub mod random;
pub mod registry;

use crate::client::{AccountInfo, CompanyInfo, HoldingInfo, OrderBookInfo, OrderInfo, TradeInfo};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use types::ids::{OrderId, Ticker};
use types::numeric::Price;
use types::order::{OrderType, Side};

/// Snapshot of everything a strategy may look at during one tick
#[derive(Debug, Clone)]
pub struct MarketContext {
    pub account: AccountInfo,
    pub holdings: Vec<HoldingInfo>,
    pub companies: Vec<CompanyInfo>,
    pub orderbooks: HashMap<Ticker, OrderBookInfo>,
    pub open_orders: Vec<OrderInfo>,
    pub recent_trades: HashMap<Ticker, Vec<TradeInfo>>,
}

impl MarketContext {
    pub fn holding(&self, ticker: &Ticker) -> u64 {
        self.holdings
            .iter()
            .find(|h| h.ticker == *ticker)
            .map(|h| h.quantity)
            .unwrap_or(0)
    }

    pub fn best_bid(&self, ticker: &Ticker) -> Option<Price> {
        self.orderbooks
            .get(ticker)
            .and_then(|ob| ob.bids.first())
            .map(|l| l.price)
    }

    pub fn best_ask(&self, ticker: &Ticker) -> Option<Price> {
        self.orderbooks
            .get(ticker)
            .and_then(|ob| ob.asks.first())
            .map(|l| l.price)
    }

    pub fn last_price(&self, ticker: &Ticker) -> Option<Price> {
        self.orderbooks.get(ticker).and_then(|ob| ob.last_price)
    }

    pub fn open_orders_for(&self, ticker: &Ticker) -> usize {
        self.open_orders
            .iter()
            .filter(|o| o.ticker == *ticker)
            .count()
    }

    /// Reference price for sizing: the touch on the appropriate side,
    /// falling back to the last trade
    pub fn reference_price(&self, ticker: &Ticker, side: Side) -> Option<Price> {
        match side {
            Side::Buy => self.best_ask(ticker).or_else(|| self.last_price(ticker)),
            Side::Sell => self.best_bid(ticker).or_else(|| self.last_price(ticker)),
        }
    }
}

/// What a strategy wants done
#[derive(Debug, Clone, PartialEq)]
pub enum OrderIntent {
    Place {
        ticker: Ticker,
        side: Side,
        order_type: OrderType,
        quantity: u64,
        price: Option<Price>,
    },
    Cancel {
        order_id: OrderId,
    },
}

/// All strategy kinds the platform can run
#[derive(Debug)]
pub enum Strategy {
    Random(random::RandomStrategy),
    RuleBased(dsl::RuleBasedStrategy),
}

impl Strategy {
    /// One decision pass over a fresh snapshot
    pub fn on_tick(&mut self, ctx: &MarketContext, now: DateTime<Utc>) -> Vec<OrderIntent> {
        match self {
            Strategy::Random(s) => s.decide(ctx),
            Strategy::RuleBased(s) => s.decide(ctx, now),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Strategy::Random(_) => "random",
            Strategy::RuleBased(_) => "rule_based",
        }
    }
}

/// Round a decimal price down to cents and wrap it, if positive
pub(crate) fn price_from_decimal(value: Decimal) -> Option<Price> {
    Price::try_new(value.round_dp(2))
}
