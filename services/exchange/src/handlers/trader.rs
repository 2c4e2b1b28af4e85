//! Authenticated trader endpoints (`X-API-Key`)

use crate::auth::AuthenticatedAccount;
use crate::error::ApiError;
use crate::handlers::public::parse_ticker;
use crate::matching::NewOrder;
use crate::models::*;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use types::prelude::*;

/// Order placement budget: 20 burst, 20/s sustained per account
const ORDER_RATE_CAPACITY: u32 = 20;
const ORDER_RATE_REFILL: f64 = 20.0;

pub async fn get_account(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
) -> Result<Json<AccountResponse>, ApiError> {
    state
        .store
        .read(|t| t.accounts.get(&auth.account_id).map(AccountResponse::from))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("account not found".into()))
}

pub async fn get_holdings(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
) -> Json<HoldingsResponse> {
    let holdings = state.store.read(|t| {
        t.holdings
            .iter()
            .filter(|((account_id, _), _)| *account_id == auth.account_id)
            .map(|((_, ticker), quantity)| HoldingDto {
                ticker: ticker.clone(),
                quantity: *quantity,
            })
            .collect()
    });
    Json(HoldingsResponse { holdings })
}

pub async fn list_orders(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(parse_status)
        .transpose()?;
    let ticker = query
        .ticker
        .as_deref()
        .map(parse_ticker)
        .transpose()?;

    let mut orders: Vec<Order> = state.store.read(|t| {
        t.orders
            .values()
            .filter(|o| o.account_id == auth.account_id)
            .filter(|o| status.map_or(true, |s| o.status == s))
            .filter(|o| ticker.as_ref().map_or(true, |tk| o.ticker == *tk))
            .cloned()
            .collect()
    });
    // Newest first
    orders.sort_by(|a, b| b.seq.cmp(&a.seq));

    Ok(Json(OrdersResponse {
        orders: orders.iter().map(OrderDto::from).collect(),
    }))
}

pub async fn get_order(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDto>, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let order = state
        .store
        .read(|t| t.orders.get(&order_id).cloned())
        .ok_or_else(|| ApiError::NotFound(format!("order '{}' not found", order_id)))?;

    if order.account_id != auth.account_id {
        return Err(ApiError::Forbidden("order belongs to another account".into()));
    }
    Ok(Json(OrderDto::from(&order)))
}

pub async fn place_order(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<PlaceOrderResponse>), ApiError> {
    state.rate_limiter.check(
        &format!("{}:orders", auth.account_id),
        ORDER_RATE_CAPACITY,
        ORDER_RATE_REFILL,
    )?;

    let new_order = parse_order_request(payload)?;
    let outcome = state.engine.submit(&auth.account_id, new_order, Utc::now())?;

    Ok((
        StatusCode::CREATED,
        Json(PlaceOrderResponse {
            order: OrderDto::from(&outcome.order),
            fills: outcome.fills.iter().map(FillDto::from).collect(),
        }),
    ))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    auth: AuthenticatedAccount,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDto>, ApiError> {
    let order_id = parse_order_id(&order_id)?;
    let order = state.engine.cancel(&auth.account_id, &order_id, Utc::now())?;
    Ok(Json(OrderDto::from(&order)))
}

fn parse_order_request(payload: CreateOrderRequest) -> Result<NewOrder, ApiError> {
    let ticker = parse_ticker(&payload.ticker)?;

    let side = match payload.side.as_str() {
        "BUY" => Side::Buy,
        "SELL" => Side::Sell,
        other => {
            return Err(ApiError::InvalidParameters(format!(
                "side must be BUY or SELL, got '{}'",
                other
            )))
        }
    };

    let order_type = match payload.order_type.as_str() {
        "LIMIT" => OrderType::Limit,
        "MARKET" => OrderType::Market,
        other => {
            return Err(ApiError::InvalidParameters(format!(
                "order_type must be LIMIT or MARKET, got '{}'",
                other
            )))
        }
    };

    let price = match (order_type, payload.price.as_deref()) {
        (OrderType::Limit, Some(raw)) => {
            let decimal = raw
                .parse::<rust_decimal::Decimal>()
                .map_err(|_| ApiError::InvalidParameters(format!("invalid price '{}'", raw)))?;
            Some(Price::try_new(decimal).ok_or_else(|| {
                ApiError::InvalidParameters("price must be positive".into())
            })?)
        }
        (OrderType::Limit, None) => {
            return Err(ApiError::InvalidParameters(
                "LIMIT orders require a price".into(),
            ))
        }
        (OrderType::Market, Some(_)) => {
            return Err(ApiError::InvalidParameters(
                "MARKET orders must not carry a price".into(),
            ))
        }
        (OrderType::Market, None) => None,
    };

    if payload.quantity == 0 {
        return Err(ApiError::InvalidParameters(
            "quantity must be positive".into(),
        ));
    }

    Ok(NewOrder {
        ticker,
        side,
        order_type,
        price,
        quantity: payload.quantity,
    })
}

fn parse_status(raw: &str) -> Result<OrderStatus, ApiError> {
    match raw {
        "OPEN" => Ok(OrderStatus::Open),
        "PARTIAL" => Ok(OrderStatus::Partial),
        "FILLED" => Ok(OrderStatus::Filled),
        "CANCELLED" => Ok(OrderStatus::Cancelled),
        other => Err(ApiError::InvalidParameters(format!(
            "unknown status '{}'",
            other
        ))),
    }
}

pub(crate) fn parse_order_id(raw: &str) -> Result<OrderId, ApiError> {
    raw.parse::<uuid::Uuid>()
        .map(OrderId::from_uuid)
        .map_err(|_| ApiError::InvalidParameters(format!("malformed order id '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(side: &str, order_type: &str, price: Option<&str>) -> CreateOrderRequest {
        CreateOrderRequest {
            ticker: "TECH".into(),
            side: side.into(),
            order_type: order_type.into(),
            quantity: 10,
            price: price.map(String::from),
        }
    }

    #[test]
    fn test_parse_valid_limit() {
        let order = parse_order_request(payload("BUY", "LIMIT", Some("100.50"))).unwrap();
        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.price, Some(Price::from_str("100.50").unwrap()));
    }

    #[test]
    fn test_market_with_price_rejected() {
        assert!(parse_order_request(payload("BUY", "MARKET", Some("100"))).is_err());
    }

    #[test]
    fn test_limit_without_price_rejected() {
        assert!(parse_order_request(payload("SELL", "LIMIT", None)).is_err());
    }

    #[test]
    fn test_bad_side_rejected() {
        assert!(parse_order_request(payload("HOLD", "LIMIT", Some("1"))).is_err());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut p = payload("BUY", "LIMIT", Some("100"));
        p.quantity = 0;
        assert!(parse_order_request(p).is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(parse_order_request(payload("BUY", "LIMIT", Some("-5"))).is_err());
    }
}
