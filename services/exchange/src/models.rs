//! Wire DTOs for the exchange API
//!
//! The handler layer translates these to and from internal types; rows never
//! serialize directly onto the wire. Money fields travel as decimal strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use types::prelude::*;

// ── Requests ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub ticker: String,
    pub side: String,
    pub order_type: String,
    pub quantity: u64,
    pub price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCompanyRequest {
    pub ticker: String,
    pub name: String,
    pub total_shares: u64,
    pub float_shares: u64,
    pub ipo_price: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAccountRequest {
    pub account_id: String,
    /// Decimal string; defaults to "0.00"
    pub initial_cash: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub ticker: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepthQuery {
    pub depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradesQuery {
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
}

// ── Responses ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyListResponse {
    pub companies: Vec<Company>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyDetailResponse {
    pub ticker: Ticker,
    pub name: String,
    pub total_shares: u64,
    pub float_shares: u64,
    pub ipo_price: Option<Price>,
    pub last_price: Option<Price>,
    #[serde(with = "types::numeric::decimal_str_opt")]
    pub market_cap: Option<Decimal>,
    pub volume_24h: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBookLevelDto {
    pub price: Price,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBookResponse {
    pub ticker: Ticker,
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<OrderBookLevelDto>,
    pub asks: Vec<OrderBookLevelDto>,
    #[serde(with = "types::numeric::decimal_str_opt")]
    pub spread: Option<Decimal>,
    pub last_price: Option<Price>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradePublicDto {
    pub id: TradeId,
    pub price: Price,
    pub quantity: u64,
    pub timestamp: DateTime<Utc>,
}

impl From<&Trade> for TradePublicDto {
    fn from(trade: &Trade) -> Self {
        Self {
            id: trade.id,
            price: trade.price,
            quantity: trade.quantity,
            timestamp: trade.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradesResponse {
    pub ticker: Ticker,
    pub trades: Vec<TradePublicDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketDataResponse {
    pub ticker: Ticker,
    pub last_price: Option<Price>,
    #[serde(with = "types::numeric::decimal_str_opt")]
    pub change_24h: Option<Decimal>,
    #[serde(with = "types::numeric::decimal_str_opt")]
    pub change_percent_24h: Option<Decimal>,
    pub volume_24h: u64,
    pub high_24h: Option<Price>,
    pub low_24h: Option<Price>,
    #[serde(with = "types::numeric::decimal_str_opt")]
    pub market_cap: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllMarketDataResponse {
    pub markets: Vec<MarketDataResponse>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountResponse {
    pub account_id: AccountId,
    #[serde(with = "types::numeric::decimal_str")]
    pub cash_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id.clone(),
            cash_balance: account.cash_balance,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AccountCreatedResponse {
    pub account_id: AccountId,
    #[serde(with = "types::numeric::decimal_str")]
    pub cash_balance: Decimal,
    /// Returned exactly once; only the hash is stored
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingDto {
    pub ticker: Ticker,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingsResponse {
    pub holdings: Vec<HoldingDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDto {
    pub id: OrderId,
    pub ticker: Ticker,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: u64,
    pub remaining_quantity: u64,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl From<&Order> for OrderDto {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            ticker: order.ticker.clone(),
            side: order.side,
            order_type: order.order_type,
            price: order.price,
            quantity: order.quantity,
            remaining_quantity: order.remaining_quantity,
            status: order.status,
            timestamp: order.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FillDto {
    pub trade_id: TradeId,
    pub price: Price,
    pub quantity: u64,
    pub timestamp: DateTime<Utc>,
}

impl From<&Trade> for FillDto {
    fn from(trade: &Trade) -> Self {
        Self {
            trade_id: trade.id,
            price: trade.price,
            quantity: trade.quantity,
            timestamp: trade.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderResponse {
    #[serde(flatten)]
    pub order: OrderDto,
    pub fills: Vec<FillDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub companies: usize,
    pub accounts: usize,
    pub orders: usize,
    pub open_orders: usize,
    pub trades: usize,
    #[serde(with = "types::numeric::decimal_str")]
    pub total_cash: Decimal,
    /// Lifetime traded share volume per ticker
    pub volume_by_ticker: BTreeMap<Ticker, u64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminBookEntryDto {
    pub price: Price,
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub remaining: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOrderBookResponse {
    pub ticker: Ticker,
    pub bids: Vec<AdminBookEntryDto>,
    pub asks: Vec<AdminBookEntryDto>,
}
