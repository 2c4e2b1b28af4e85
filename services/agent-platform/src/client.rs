//! HTTP client for the exchange API
//!
//! Thin typed wrapper over reqwest: 5 s request timeout, up to 3 retries
//! with exponential backoff (100 ms → 1 s) on 5xx and transport errors,
//! never on 4xx. The agent's API key rides on every authenticated call.

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use types::ids::{OrderId, Ticker, TradeId};
use types::numeric::Price;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_RETRIES: u32 = 3;
const BACKOFF_BASE_MS: u64 = 100;
const BACKOFF_CAP_MS: u64 = 1_000;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("exchange error {status}: {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("malformed response: {0}")]
    Decode(String),
}

impl ClientError {
    /// 4xx responses are the caller's fault and are never retried
    pub fn is_client_error(&self) -> bool {
        matches!(self, ClientError::Api { status, .. } if *status < 500)
    }
}

// ── Response types ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub account_id: String,
    #[serde(with = "types::numeric::decimal_str")]
    pub cash_balance: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HoldingInfo {
    pub ticker: Ticker,
    pub quantity: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyInfo {
    pub ticker: Ticker,
    pub name: String,
    pub total_shares: u64,
    pub float_shares: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookLevel {
    pub price: Price,
    pub quantity: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookInfo {
    pub ticker: Ticker,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub last_price: Option<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeInfo {
    pub id: TradeId,
    pub price: Price,
    pub quantity: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderInfo {
    pub id: OrderId,
    pub ticker: Ticker,
    pub side: String,
    pub order_type: String,
    pub price: Option<Price>,
    pub quantity: u64,
    pub remaining_quantity: u64,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompaniesEnvelope {
    companies: Vec<CompanyInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct HoldingsEnvelope {
    holdings: Vec<HoldingInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct OrdersEnvelope {
    orders: Vec<OrderInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct TradesEnvelope {
    trades: Vec<TradeInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaceOrderBody {
    pub ticker: String,
    pub side: String,
    pub order_type: String,
    pub quantity: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

pub struct ExchangeClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl ExchangeClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        }
    }

    // ── Public endpoints ────────────────────────────────────────────

    pub async fn get_companies(&self) -> Result<Vec<CompanyInfo>, ClientError> {
        let envelope: CompaniesEnvelope = self.request(Method::GET, "/companies", false, None).await?;
        Ok(envelope.companies)
    }

    pub async fn get_orderbook(
        &self,
        ticker: &Ticker,
        depth: usize,
    ) -> Result<OrderBookInfo, ClientError> {
        self.request(
            Method::GET,
            &format!("/orderbook/{}?depth={}", ticker, depth),
            false,
            None,
        )
        .await
    }

    pub async fn get_trades(
        &self,
        ticker: &Ticker,
        limit: usize,
    ) -> Result<Vec<TradeInfo>, ClientError> {
        let envelope: TradesEnvelope = self
            .request(
                Method::GET,
                &format!("/trades/{}?limit={}", ticker, limit),
                false,
                None,
            )
            .await?;
        Ok(envelope.trades)
    }

    // ── Authenticated endpoints ─────────────────────────────────────

    pub async fn get_account(&self) -> Result<AccountInfo, ClientError> {
        self.request(Method::GET, "/account", true, None).await
    }

    pub async fn get_holdings(&self) -> Result<Vec<HoldingInfo>, ClientError> {
        let envelope: HoldingsEnvelope = self.request(Method::GET, "/holdings", true, None).await?;
        Ok(envelope.holdings)
    }

    pub async fn get_open_orders(&self) -> Result<Vec<OrderInfo>, ClientError> {
        let mut open: Vec<OrderInfo> = Vec::new();
        for status in ["OPEN", "PARTIAL"] {
            let envelope: OrdersEnvelope = self
                .request(Method::GET, &format!("/orders?status={}", status), true, None)
                .await?;
            open.extend(envelope.orders);
        }
        Ok(open)
    }

    pub async fn place_order(&self, body: &PlaceOrderBody) -> Result<OrderInfo, ClientError> {
        let payload =
            serde_json::to_value(body).map_err(|e| ClientError::Decode(e.to_string()))?;
        self.request(Method::POST, "/orders", true, Some(payload)).await
    }

    pub async fn cancel_order(&self, order_id: &OrderId) -> Result<OrderInfo, ClientError> {
        self.request(Method::DELETE, &format!("/orders/{}", order_id), true, None)
            .await
    }

    // ── Internals ───────────────────────────────────────────────────

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        authenticated: bool,
        body: Option<Value>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let mut req = self.http.request(method.clone(), &url);
            if authenticated {
                req = req.header("X-API-Key", &self.api_key);
            }
            if let Some(body) = &body {
                req = req.json(body);
            }

            let error = match req.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|e| ClientError::Decode(e.to_string()));
                    }
                    Self::api_error(status, response).await
                }
                Err(e) => ClientError::Transport(e),
            };

            if error.is_client_error() || attempt >= MAX_RETRIES {
                return Err(error);
            }
            let delay = backoff_delay(attempt);
            tracing::debug!(path, attempt, ?delay, error = %error, "retrying request");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    async fn api_error(status: StatusCode, response: reqwest::Response) -> ClientError {
        let (code, message) = match response.json::<Value>().await {
            Ok(body) => (
                body["error"]["code"].as_str().unwrap_or("UNKNOWN").to_string(),
                body["error"]["message"].as_str().unwrap_or("").to_string(),
            ),
            Err(_) => ("UNKNOWN".to_string(), String::new()),
        };
        ClientError::Api {
            status: status.as_u16(),
            code,
            message,
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let ms = (BACKOFF_BASE_MS << attempt).min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        assert_eq!(backoff_delay(0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1), Duration::from_millis(200));
        assert_eq!(backoff_delay(2), Duration::from_millis(400));
        assert_eq!(backoff_delay(5), Duration::from_millis(1000));
    }

    #[test]
    fn test_client_errors_not_retryable() {
        let err = ClientError::Api {
            status: 400,
            code: "INVALID_PARAMETERS".into(),
            message: String::new(),
        };
        assert!(err.is_client_error());

        let err = ClientError::Api {
            status: 503,
            code: "INTERNAL_ERROR".into(),
            message: String::new(),
        };
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let client = ExchangeClient::new("http://localhost:8000/", "sk_test");
        assert_eq!(client.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_place_order_body_omits_absent_price() {
        let body = PlaceOrderBody {
            ticker: "TECH".into(),
            side: "BUY".into(),
            order_type: "MARKET".into(),
            quantity: 10,
            price: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("price"));
    }
}
