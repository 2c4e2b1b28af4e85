//! Public market-data endpoints (no authentication)
//!
//! Served from store snapshots; never takes a ticker's matching lock apart
//! from the brief book read for depth aggregation.

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use types::prelude::*;

const DEFAULT_DEPTH: usize = 10;
const MAX_DEPTH: usize = 50;
const DEFAULT_TRADE_LIMIT: usize = 50;
const MAX_TRADE_LIMIT: usize = 500;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn list_companies(State(state): State<AppState>) -> Json<CompanyListResponse> {
    let companies = state.store.read(|t| t.companies.values().cloned().collect());
    Json(CompanyListResponse { companies })
}

pub async fn get_company(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<CompanyDetailResponse>, ApiError> {
    let ticker = parse_ticker(&ticker)?;
    let now = Utc::now();

    state
        .store
        .read(|t| {
            let company = t.companies.get(&ticker)?;
            let last_price = t.last_price(&ticker);
            let (_, _, _, volume_24h) = t.stats_24h(&ticker, now);
            Some(CompanyDetailResponse {
                ticker: company.ticker.clone(),
                name: company.name.clone(),
                total_shares: company.total_shares,
                float_shares: company.float_shares,
                ipo_price: company.ipo_price,
                last_price,
                market_cap: last_price.map(|p| p.notional(company.total_shares)),
                volume_24h,
            })
        })
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("company '{}' not found", ticker)))
}

pub async fn get_orderbook(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<OrderBookResponse>, ApiError> {
    let ticker = parse_ticker(&ticker)?;
    require_company(&state, &ticker)?;
    let depth = query.depth.unwrap_or(DEFAULT_DEPTH).clamp(1, MAX_DEPTH);

    let (bids, asks) = state
        .engine
        .with_book(&ticker, |book| book.aggregate_levels(depth));

    let spread = match (bids.first(), asks.first()) {
        (Some(bid), Some(ask)) => Some(ask.price - bid.price),
        _ => None,
    };
    let last_price = state.store.read(|t| t.last_price(&ticker));

    Ok(Json(OrderBookResponse {
        ticker,
        timestamp: Utc::now(),
        bids: bids
            .into_iter()
            .map(|l| OrderBookLevelDto {
                price: l.price,
                quantity: l.quantity,
            })
            .collect(),
        asks: asks
            .into_iter()
            .map(|l| OrderBookLevelDto {
                price: l.price,
                quantity: l.quantity,
            })
            .collect(),
        spread,
        last_price,
    }))
}

pub async fn get_trades(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
    Query(query): Query<TradesQuery>,
) -> Result<Json<TradesResponse>, ApiError> {
    let ticker = parse_ticker(&ticker)?;
    require_company(&state, &ticker)?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_TRADE_LIMIT)
        .clamp(1, MAX_TRADE_LIMIT);

    let trades = state.store.read(|t| {
        t.trades_for(&ticker)
            .filter(|trade| query.since.map_or(true, |since| trade.timestamp > since))
            .take(limit)
            .map(TradePublicDto::from)
            .collect()
    });

    Ok(Json(TradesResponse { ticker, trades }))
}

pub async fn get_market_data(
    State(state): State<AppState>,
    Path(ticker): Path<String>,
) -> Result<Json<MarketDataResponse>, ApiError> {
    let ticker = parse_ticker(&ticker)?;
    let now = Utc::now();

    state
        .store
        .read(|t| {
            let company = t.companies.get(&ticker)?;
            Some(market_data_for(t, company, now))
        })
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("company '{}' not found", ticker)))
}

pub async fn get_all_market_data(State(state): State<AppState>) -> Json<AllMarketDataResponse> {
    let now = Utc::now();
    let markets = state.store.read(|t| {
        t.companies
            .values()
            .map(|company| market_data_for(t, company, now))
            .collect()
    });
    Json(AllMarketDataResponse {
        markets,
        timestamp: now,
    })
}

fn market_data_for(
    tables: &crate::store::Tables,
    company: &Company,
    now: chrono::DateTime<Utc>,
) -> MarketDataResponse {
    let ticker = &company.ticker;
    let last_price = tables.last_price(ticker);
    let (open, high, low, volume_24h) = tables.stats_24h(ticker, now);

    let change_24h = match (last_price, open) {
        (Some(last), Some(open)) => Some(last - open),
        _ => None,
    };
    let change_percent_24h = match (change_24h, open) {
        (Some(change), Some(open)) if open.as_decimal() > Decimal::ZERO => {
            Some(change / open.as_decimal() * Decimal::from(100))
        }
        _ => None,
    };

    MarketDataResponse {
        ticker: ticker.clone(),
        last_price,
        change_24h,
        change_percent_24h,
        volume_24h,
        high_24h: high,
        low_24h: low,
        market_cap: last_price.map(|p| p.notional(company.total_shares)),
        timestamp: now,
    }
}

pub(crate) fn parse_ticker(raw: &str) -> Result<Ticker, ApiError> {
    Ticker::try_new(raw)
        .ok_or_else(|| ApiError::InvalidParameters(format!("malformed ticker '{}'", raw)))
}

pub(crate) fn require_company(state: &AppState, ticker: &Ticker) -> Result<(), ApiError> {
    state
        .store
        .read(|t| t.companies.contains_key(ticker))
        .then_some(())
        .ok_or_else(|| ApiError::NotFound(format!("company '{}' not found", ticker)))
}
