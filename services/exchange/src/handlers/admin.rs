//! Admin endpoints (`X-Admin-Token`)

use crate::auth::{generate_api_key, hash_api_key, AdminAccess};
use crate::error::ApiError;
use crate::handlers::public::{parse_ticker, require_company};
use crate::models::*;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use types::prelude::*;

pub async fn create_company(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(payload): Json<CreateCompanyRequest>,
) -> Result<(StatusCode, Json<Company>), ApiError> {
    let ticker = parse_ticker(&payload.ticker)?;
    if payload.name.trim().is_empty() {
        return Err(ApiError::InvalidParameters("name must not be empty".into()));
    }
    let ipo_price = payload
        .ipo_price
        .as_deref()
        .map(|raw| {
            raw.parse::<Decimal>()
                .ok()
                .and_then(Price::try_new)
                .ok_or_else(|| {
                    ApiError::InvalidParameters(format!("invalid ipo_price '{}'", raw))
                })
        })
        .transpose()?;

    let company = state.engine.create_company(
        ticker,
        payload.name,
        payload.total_shares,
        payload.float_shares,
        ipo_price,
        Utc::now(),
    )?;

    tracing::info!(ticker = %company.ticker, "company created");
    Ok((StatusCode::CREATED, Json(company)))
}

pub async fn create_account(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<AccountCreatedResponse>), ApiError> {
    let account_id = AccountId::try_new(payload.account_id.as_str())
        .ok_or_else(|| ApiError::InvalidParameters("account_id must be 1..=64 chars".into()))?;

    let initial_cash = match payload.initial_cash.as_deref() {
        Some(raw) => raw
            .parse::<Decimal>()
            .map_err(|_| ApiError::InvalidParameters(format!("invalid initial_cash '{}'", raw)))?,
        None => Decimal::ZERO,
    };

    // The raw key exists only in this response; the store keeps the hash
    let api_key = generate_api_key();
    let account = state.engine.create_account(
        account_id,
        initial_cash,
        hash_api_key(&api_key),
        Utc::now(),
    )?;

    tracing::info!(account_id = %account.id, "account created");
    Ok((
        StatusCode::CREATED,
        Json(AccountCreatedResponse {
            account_id: account.id,
            cash_balance: account.cash_balance,
            api_key,
            created_at: account.created_at,
        }),
    ))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    _admin: AdminAccess,
) -> Json<Vec<AccountResponse>> {
    let accounts = state
        .store
        .read(|t| t.accounts.values().map(AccountResponse::from).collect());
    Json(accounts)
}

pub async fn get_account(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(account_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = AccountId::try_new(account_id.as_str())
        .ok_or_else(|| ApiError::InvalidParameters("malformed account id".into()))?;
    state
        .store
        .read(|t| t.accounts.get(&account_id).map(AccountResponse::from))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("account '{}' not found", account_id)))
}

pub async fn stats(State(state): State<AppState>, _admin: AdminAccess) -> Json<StatsResponse> {
    let response = state.store.read(|t| {
        let mut volume_by_ticker: BTreeMap<Ticker, u64> = BTreeMap::new();
        for trade in &t.trades {
            *volume_by_ticker.entry(trade.ticker.clone()).or_default() += trade.quantity;
        }
        StatsResponse {
            companies: t.companies.len(),
            accounts: t.accounts.len(),
            orders: t.orders.len(),
            open_orders: t.orders.values().filter(|o| o.status.is_resting()).count(),
            trades: t.trades.len(),
            total_cash: t.total_cash(),
            volume_by_ticker,
            timestamp: Utc::now(),
        }
    });
    Json(response)
}

pub async fn orderbook(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(ticker): Path<String>,
) -> Result<Json<AdminOrderBookResponse>, ApiError> {
    let ticker = parse_ticker(&ticker)?;
    require_company(&state, &ticker)?;

    let (bids, asks) = state.engine.with_book(&ticker, |book| {
        let flatten = |entries: Vec<(Price, Vec<crate::book::LevelEntry>)>| {
            entries
                .into_iter()
                .flat_map(|(price, level)| {
                    level.into_iter().map(move |e| AdminBookEntryDto {
                        price,
                        order_id: e.order_id,
                        account_id: e.account_id,
                        remaining: e.remaining,
                    })
                })
                .collect::<Vec<_>>()
        };
        (flatten(book.entries(Side::Buy)), flatten(book.entries(Side::Sell)))
    });

    Ok(Json(AdminOrderBookResponse {
        ticker,
        bids,
        asks,
    }))
}
