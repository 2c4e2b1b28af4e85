//! Price-time-priority matching engine
//!
//! One mutex per ticker serializes all mutations of that ticker's book and
//! rows; different tickers match concurrently and readers never take book
//! locks. Matching rules:
//!
//! 1. BUY takers match the lowest-priced asks, SELL takers the highest bids
//! 2. At one price, the earliest resting order wins (FIFO)
//! 3. Execution price is the resting (maker) order's price
//! 4. Market orders walk the book; any residual is cancelled, never posted
//! 5. Self-trades are allowed and settle normally
//!
//! The store is the authority: matching mutates the book in place under the
//! ticker lock, and if the commit fails the book is rebuilt from the store.

use crate::book::TickerBook;
use crate::matching::settlement;
use crate::store::Store;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use types::prelude::*;

/// A validated order request, ready for matching
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub ticker: Ticker,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Option<Price>,
    pub quantity: u64,
}

/// Result of a submit: the final order row and the fills it produced
#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub order: Order,
    pub fills: Vec<Trade>,
}

/// The matching engine
pub struct Engine {
    store: Arc<Store>,
    books: DashMap<Ticker, Arc<Mutex<TickerBook>>>,
}

impl Engine {
    /// Create an engine over a store, rebuilding every ticker's book from
    /// the OPEN/PARTIAL orders it holds.
    pub fn new(store: Arc<Store>) -> Self {
        let books = DashMap::new();
        store.read(|tables| {
            for ticker in tables.companies.keys() {
                let book = TickerBook::rebuild(tables.resting_orders(ticker));
                books.insert(ticker.clone(), Arc::new(Mutex::new(book)));
            }
        });
        Self { store, books }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn book_handle(&self, ticker: &Ticker) -> Arc<Mutex<TickerBook>> {
        self.books
            .entry(ticker.clone())
            .or_insert_with(|| Arc::new(Mutex::new(TickerBook::new())))
            .clone()
    }

    /// Run a read-only closure against a ticker's book (market data)
    pub fn with_book<R>(&self, ticker: &Ticker, f: impl FnOnce(&TickerBook) -> R) -> R {
        let handle = self.book_handle(ticker);
        let book = handle.lock().expect("book lock poisoned");
        f(&book)
    }

    /// Submit an order: validate, pre-check, match, settle, rest or cancel
    /// the residual. Returns the final order row and its fills.
    pub fn submit(
        &self,
        account_id: &AccountId,
        new_order: NewOrder,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, ExchangeError> {
        validate_request(&new_order)?;

        let ticker = new_order.ticker.clone();
        self.store.read(|tables| {
            tables
                .companies
                .contains_key(&ticker)
                .then_some(())
                .ok_or_else(|| ExchangeError::UnknownTicker(ticker.to_string()))
        })?;

        let handle = self.book_handle(&ticker);
        let mut book = handle.lock().expect("book lock poisoned");

        let taker_seq = self.store.next_seq();
        let result = self.store.transaction(|txn| {
            let account = txn
                .account(account_id)
                .ok_or_else(|| ExchangeError::AccountNotFound(account_id.to_string()))?
                .clone();

            // Pre-checks: reserve against cash/shares not already committed
            // to this account's other resting orders
            match (new_order.side, new_order.order_type) {
                (Side::Sell, _) => {
                    let held = txn.holding_qty(account_id, &ticker);
                    let committed = txn.committed_sell_shares(account_id, &ticker, None);
                    let available = held.saturating_sub(committed);
                    if new_order.quantity > available {
                        return Err(ExchangeError::InsufficientShares {
                            available: available.to_string(),
                            required: new_order.quantity.to_string(),
                        });
                    }
                }
                (Side::Buy, OrderType::Limit) => {
                    let price = new_order.price.expect("validated: limit has price");
                    let required = price.notional(new_order.quantity);
                    let committed = txn.committed_buy_cash(account_id, None);
                    let available = account.cash_balance - committed;
                    if required > available {
                        return Err(ExchangeError::InsufficientFunds {
                            available: available.to_string(),
                            required: required.to_string(),
                        });
                    }
                }
                // Market buys are checked per fill below: the execution
                // price is unknown until a maker is in hand
                (Side::Buy, OrderType::Market) => {}
            }

            let mut taker = Order::new(
                account_id.clone(),
                ticker.clone(),
                new_order.side,
                new_order.order_type,
                new_order.price,
                new_order.quantity,
                now,
                taker_seq,
            );
            txn.put_order(taker.clone());

            let mut fills: Vec<Trade> = Vec::new();

            while taker.remaining_quantity > 0 {
                let Some((maker_price, maker)) = book.best(taker.side.opposite()) else {
                    break;
                };

                if taker.order_type == OrderType::Limit {
                    let limit = taker.price.expect("validated: limit has price");
                    let crosses = match taker.side {
                        Side::Buy => limit >= maker_price,
                        Side::Sell => limit <= maker_price,
                    };
                    if !crosses {
                        break;
                    }
                }

                let fill_qty = taker.remaining_quantity.min(maker.remaining);

                // Market buy: re-check affordability at this maker's price,
                // net of cash committed to the account's resting buy orders.
                // An unaffordable first fill is a rejection; mid-walk
                // exhaustion stops matching and cancels the residual.
                if taker.side == Side::Buy && taker.order_type == OrderType::Market {
                    let cash = txn
                        .account(account_id)
                        .map(|a| a.cash_balance)
                        .unwrap_or(Decimal::ZERO);
                    let committed = txn.committed_buy_cash(account_id, Some(taker.id));
                    let available = cash - committed;
                    if maker_price.notional(fill_qty) > available {
                        if fills.is_empty() {
                            return Err(ExchangeError::InsufficientFunds {
                                available: available.to_string(),
                                required: maker_price.notional(fill_qty).to_string(),
                            });
                        }
                        break;
                    }
                }

                let (buy_order_id, sell_order_id) = match taker.side {
                    Side::Buy => (taker.id, maker.order_id),
                    Side::Sell => (maker.order_id, taker.id),
                };

                let trade = settlement::apply_fill(
                    txn,
                    &ticker,
                    maker_price,
                    fill_qty,
                    buy_order_id,
                    sell_order_id,
                    now,
                    self.store.next_seq(),
                )?;

                tracing::info!(
                    trade_id = %trade.id,
                    ticker = %ticker,
                    price = %trade.price,
                    quantity = trade.quantity,
                    buyer = %trade.buyer_id,
                    seller = %trade.seller_id,
                    "trade executed"
                );
                fills.push(trade);

                taker = txn
                    .order(&taker.id)
                    .expect("taker row present in transaction")
                    .clone();
                book.reduce_best(taker.side.opposite(), fill_qty);
            }

            // Residual handling: market residuals are cancelled (IOC),
            // limit residuals rest in the book
            if taker.remaining_quantity > 0 && taker.order_type == OrderType::Market {
                taker.cancel();
                txn.put_order(taker.clone());
            }

            Ok(SubmitOutcome {
                order: taker,
                fills,
            })
        });

        match result {
            Ok(outcome) => {
                if outcome.order.order_type == OrderType::Limit
                    && outcome.order.status.is_resting()
                {
                    book.insert(&outcome.order);
                }
                tracing::debug!(
                    order_id = %outcome.order.id,
                    status = ?outcome.order.status,
                    fills = outcome.fills.len(),
                    "order submitted"
                );
                Ok(outcome)
            }
            Err(e) => {
                // The rollback discarded the rows; the book may have been
                // reduced mid-match, so restore it from the authority.
                *book = self
                    .store
                    .read(|tables| TickerBook::rebuild(tables.resting_orders(&ticker)));
                Err(e)
            }
        }
    }

    /// Cancel an order. 409 if already terminal, 403 if owned by another
    /// account.
    pub fn cancel(
        &self,
        account_id: &AccountId,
        order_id: &OrderId,
        _now: DateTime<Utc>,
    ) -> Result<Order, ExchangeError> {
        let ticker = self
            .store
            .read(|tables| tables.orders.get(order_id).map(|o| o.ticker.clone()))
            .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?;

        let handle = self.book_handle(&ticker);
        let mut book = handle.lock().expect("book lock poisoned");

        let order = self.store.transaction(|txn| {
            let mut order = txn
                .order(order_id)
                .ok_or_else(|| ExchangeError::OrderNotFound(order_id.to_string()))?
                .clone();
            if order.account_id != *account_id {
                return Err(ExchangeError::Forbidden(
                    "order belongs to another account".into(),
                ));
            }
            if !order.status.is_resting() {
                return Err(ExchangeError::Conflict(format!(
                    "order is already {:?}",
                    order.status
                )));
            }
            order.cancel();
            txn.put_order(order.clone());
            Ok(order)
        })?;

        book.remove(order_id);
        tracing::info!(order_id = %order.id, ticker = %ticker, "order cancelled");
        Ok(order)
    }

    /// Create a trader account seeded with `initial_cash`.
    pub fn create_account(
        &self,
        id: AccountId,
        initial_cash: Decimal,
        api_key_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Account, ExchangeError> {
        if initial_cash < Decimal::ZERO {
            return Err(ExchangeError::InvalidParameters(
                "initial_cash cannot be negative".into(),
            ));
        }
        self.store.transaction(|txn| {
            if txn.account(&id).is_some() {
                return Err(ExchangeError::Conflict(format!(
                    "account '{}' already exists",
                    id
                )));
            }
            let account = Account::new(id.clone(), initial_cash, api_key_hash.clone(), now);
            txn.put_account(account.clone());
            Ok(account)
        })
    }

    /// Create a company. With an `ipo_price`, the float is offered for sale
    /// at that price by a synthetic treasury account that starts out holding
    /// all `total_shares`.
    pub fn create_company(
        &self,
        ticker: Ticker,
        name: String,
        total_shares: u64,
        float_shares: u64,
        ipo_price: Option<Price>,
        now: DateTime<Utc>,
    ) -> Result<Company, ExchangeError> {
        Company::validate(total_shares, float_shares)
            .map_err(|e| ExchangeError::InvalidParameters(e.to_string()))?;

        let treasury_id = treasury_account_id(&ticker);
        let company = self.store.transaction(|txn| {
            if txn.company(&ticker).is_some() {
                return Err(ExchangeError::Conflict(format!(
                    "company '{}' already exists",
                    ticker
                )));
            }
            let company = Company {
                ticker: ticker.clone(),
                name: name.clone(),
                total_shares,
                float_shares,
                ipo_price,
                created_at: now,
            };
            txn.put_company(company.clone());
            txn.put_account(Account::new(
                treasury_id.clone(),
                Decimal::ZERO,
                String::new(),
                now,
            ));
            txn.set_holding(&treasury_id, &ticker, total_shares);
            Ok(company)
        })?;

        if let (Some(price), true) = (ipo_price, float_shares > 0) {
            self.submit(
                &treasury_id,
                NewOrder {
                    ticker: ticker.clone(),
                    side: Side::Sell,
                    order_type: OrderType::Limit,
                    price: Some(price),
                    quantity: float_shares,
                },
                now,
            )?;
            tracing::info!(ticker = %ticker, float = float_shares, price = %price, "IPO float offered");
        }

        Ok(company)
    }
}

/// The treasury account holding a company's unfloated shares
pub fn treasury_account_id(ticker: &Ticker) -> AccountId {
    AccountId::new(format!("TREASURY-{}", ticker))
}

fn validate_request(new_order: &NewOrder) -> Result<(), ExchangeError> {
    if new_order.quantity == 0 {
        return Err(ExchangeError::InvalidParameters(
            "quantity must be positive".into(),
        ));
    }
    match new_order.order_type {
        OrderType::Limit if new_order.price.is_none() => Err(ExchangeError::InvalidParameters(
            "LIMIT orders require a price".into(),
        )),
        OrderType::Market if new_order.price.is_some() => Err(ExchangeError::InvalidParameters(
            "MARKET orders must not carry a price".into(),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 17, 12, 0, 0).unwrap()
    }

    fn engine() -> Engine {
        Engine::new(Arc::new(Store::in_memory()))
    }

    fn seed_account(engine: &Engine, id: &str, cash: &str) -> AccountId {
        let account_id = AccountId::new(id);
        engine
            .create_account(
                account_id.clone(),
                Decimal::from_str(cash).unwrap(),
                format!("hash-{}", id),
                ts(),
            )
            .unwrap();
        account_id
    }

    fn list_company(engine: &Engine, ticker: &str, total: u64, float: u64, ipo: Option<u64>) {
        engine
            .create_company(
                Ticker::new(ticker),
                format!("{} Inc", ticker),
                total,
                float,
                ipo.map(Price::from_u64),
                ts(),
            )
            .unwrap();
    }

    fn limit(ticker: &str, side: Side, price: u64, qty: u64) -> NewOrder {
        NewOrder {
            ticker: Ticker::new(ticker),
            side,
            order_type: OrderType::Limit,
            price: Some(Price::from_u64(price)),
            quantity: qty,
        }
    }

    fn market(ticker: &str, side: Side, qty: u64) -> NewOrder {
        NewOrder {
            ticker: Ticker::new(ticker),
            side,
            order_type: OrderType::Market,
            price: None,
            quantity: qty,
        }
    }

    #[test]
    fn test_ipo_market_buy_fills_from_treasury() {
        let engine = engine();
        list_company(&engine, "TECH", 1_000_000, 1_000, Some(100));
        let alice = seed_account(&engine, "alice", "5000.00");

        let outcome = engine
            .submit(&alice, market("TECH", Side::Buy, 10), ts())
            .unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Filled);
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].price, Price::from_u64(100));
        assert_eq!(outcome.fills[0].quantity, 10);

        let ticker = Ticker::new("TECH");
        engine.store().read(|t| {
            assert_eq!(t.accounts[&alice].cash_balance, Decimal::from(4000));
            assert_eq!(t.holding_qty(&alice, &ticker), 10);
            assert_eq!(
                t.holding_qty(&treasury_account_id(&ticker), &ticker),
                999_990
            );
        });
    }

    #[test]
    fn test_partial_fill_rests_remainder() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "10000.00");
        let bob = seed_account(&engine, "bob", "0.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&bob, &Ticker::new("TECH"), 50);
                Ok(())
            })
            .unwrap();

        let sell = engine
            .submit(&bob, limit("TECH", Side::Sell, 105, 50), ts())
            .unwrap();
        assert_eq!(sell.order.status, OrderStatus::Open);

        let buy = engine
            .submit(&alice, limit("TECH", Side::Buy, 105, 80), ts())
            .unwrap();
        assert_eq!(buy.fills.len(), 1);
        assert_eq!(buy.fills[0].quantity, 50);
        assert_eq!(buy.order.status, OrderStatus::Partial);
        assert_eq!(buy.order.remaining_quantity, 30);

        // The residual rests as the best (and only) bid at 105
        engine.with_book(&Ticker::new("TECH"), |book| {
            assert_eq!(book.best_bid(), Some(Price::from_u64(105)));
        });
        engine.store().read(|t| {
            assert_eq!(t.orders[&sell.order.id].status, OrderStatus::Filled);
        });
    }

    #[test]
    fn test_price_time_priority_earlier_wins() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let a = seed_account(&engine, "seller-a", "0.00");
        let b = seed_account(&engine, "seller-b", "0.00");
        let taker = seed_account(&engine, "taker", "1000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&a, &Ticker::new("TECH"), 5);
                txn.set_holding(&b, &Ticker::new("TECH"), 5);
                Ok(())
            })
            .unwrap();

        let first = engine
            .submit(&a, limit("TECH", Side::Sell, 100, 5), ts())
            .unwrap();
        let second = engine
            .submit(&b, limit("TECH", Side::Sell, 100, 5), ts())
            .unwrap();

        let buy = engine
            .submit(&taker, market("TECH", Side::Buy, 5), ts())
            .unwrap();
        assert_eq!(buy.fills.len(), 1);
        assert_eq!(buy.fills[0].sell_order_id, first.order.id);

        engine.store().read(|t| {
            assert_eq!(t.orders[&first.order.id].status, OrderStatus::Filled);
            assert_eq!(t.orders[&second.order.id].status, OrderStatus::Open);
        });
    }

    #[test]
    fn test_market_order_walks_the_book() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let seller = seed_account(&engine, "seller", "0.00");
        let alice = seed_account(&engine, "alice", "2000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&seller, &Ticker::new("TECH"), 15);
                Ok(())
            })
            .unwrap();

        engine
            .submit(&seller, limit("TECH", Side::Sell, 100, 10), ts())
            .unwrap();
        engine
            .submit(&seller, limit("TECH", Side::Sell, 101, 5), ts())
            .unwrap();

        let buy = engine
            .submit(&alice, market("TECH", Side::Buy, 12), ts())
            .unwrap();
        assert_eq!(buy.order.status, OrderStatus::Filled);
        assert_eq!(buy.fills.len(), 2);
        assert_eq!(buy.fills[0].quantity, 10);
        assert_eq!(buy.fills[0].price, Price::from_u64(100));
        assert_eq!(buy.fills[1].quantity, 2);
        assert_eq!(buy.fills[1].price, Price::from_u64(101));

        engine.store().read(|t| {
            // 2000 - 1000 - 202 = 798
            assert_eq!(t.accounts[&alice].cash_balance, Decimal::from(798));
        });
    }

    #[test]
    fn test_insufficient_funds_creates_no_order_row() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "50.00");

        let result = engine.submit(&alice, limit("TECH", Side::Buy, 100, 1), ts());
        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientFunds { .. })
        ));

        engine.store().read(|t| {
            assert!(t.orders.is_empty());
        });
        engine.with_book(&Ticker::new("TECH"), |book| assert!(book.is_empty()));
    }

    #[test]
    fn test_insufficient_shares_rejected() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "0.00");

        let result = engine.submit(&alice, limit("TECH", Side::Sell, 100, 1), ts());
        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_committed_shares_block_double_listing() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "0.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&alice, &Ticker::new("TECH"), 10);
                Ok(())
            })
            .unwrap();

        engine
            .submit(&alice, limit("TECH", Side::Sell, 100, 10), ts())
            .unwrap();
        // The whole position is already committed to the resting order
        let result = engine.submit(&alice, limit("TECH", Side::Sell, 101, 1), ts());
        assert!(matches!(
            result,
            Err(ExchangeError::InsufficientShares { .. })
        ));
    }

    #[test]
    fn test_market_buy_empty_book_cancelled() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "1000.00");

        let outcome = engine
            .submit(&alice, market("TECH", Side::Buy, 10), ts())
            .unwrap();
        assert_eq!(outcome.order.status, OrderStatus::Cancelled);
        assert!(outcome.fills.is_empty());

        // The order row is persisted for audit; nothing else changed
        engine.store().read(|t| {
            assert_eq!(t.orders.len(), 1);
            assert_eq!(t.accounts[&alice].cash_balance, Decimal::from(1000));
            assert!(t.trades.is_empty());
        });
    }

    #[test]
    fn test_limit_buy_below_asks_rests() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let seller = seed_account(&engine, "seller", "0.00");
        let alice = seed_account(&engine, "alice", "1000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&seller, &Ticker::new("TECH"), 5);
                Ok(())
            })
            .unwrap();

        engine
            .submit(&seller, limit("TECH", Side::Sell, 105, 5), ts())
            .unwrap();
        let buy = engine
            .submit(&alice, limit("TECH", Side::Buy, 104, 5), ts())
            .unwrap();

        assert_eq!(buy.order.status, OrderStatus::Open);
        assert!(buy.fills.is_empty());
        engine.with_book(&Ticker::new("TECH"), |book| {
            assert_eq!(book.best_bid(), Some(Price::from_u64(104)));
            assert_eq!(book.best_ask(), Some(Price::from_u64(105)));
        });
    }

    #[test]
    fn test_limit_buy_at_ask_matches() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let seller = seed_account(&engine, "seller", "0.00");
        let alice = seed_account(&engine, "alice", "1000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&seller, &Ticker::new("TECH"), 5);
                Ok(())
            })
            .unwrap();

        engine
            .submit(&seller, limit("TECH", Side::Sell, 105, 5), ts())
            .unwrap();
        let buy = engine
            .submit(&alice, limit("TECH", Side::Buy, 105, 5), ts())
            .unwrap();
        assert_eq!(buy.order.status, OrderStatus::Filled);
        assert_eq!(buy.fills.len(), 1);
    }

    #[test]
    fn test_cancel_then_cancel_again_conflicts() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "1000.00");

        let outcome = engine
            .submit(&alice, limit("TECH", Side::Buy, 100, 1), ts())
            .unwrap();
        let cancelled = engine.cancel(&alice, &outcome.order.id, ts()).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        engine.with_book(&Ticker::new("TECH"), |book| assert!(book.is_empty()));

        let again = engine.cancel(&alice, &outcome.order.id, ts());
        assert!(matches!(again, Err(ExchangeError::Conflict(_))));
    }

    #[test]
    fn test_cancel_foreign_order_forbidden() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "1000.00");
        let mallory = seed_account(&engine, "mallory", "0.00");

        let outcome = engine
            .submit(&alice, limit("TECH", Side::Buy, 100, 1), ts())
            .unwrap();
        let result = engine.cancel(&mallory, &outcome.order.id, ts());
        assert!(matches!(result, Err(ExchangeError::Forbidden(_))));
    }

    #[test]
    fn test_self_trade_nets_out() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let alice = seed_account(&engine, "alice", "1000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&alice, &Ticker::new("TECH"), 10);
                Ok(())
            })
            .unwrap();

        engine
            .submit(&alice, limit("TECH", Side::Sell, 100, 10), ts())
            .unwrap();
        let buy = engine
            .submit(&alice, limit("TECH", Side::Buy, 100, 10), ts())
            .unwrap();

        assert_eq!(buy.order.status, OrderStatus::Filled);
        assert!(buy.fills[0].is_self_trade());
        engine.store().read(|t| {
            assert_eq!(t.accounts[&alice].cash_balance, Decimal::from(1000));
            assert_eq!(t.holding_qty(&alice, &Ticker::new("TECH")), 10);
        });
    }

    #[test]
    fn test_sell_entire_holding_deletes_row() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let seller = seed_account(&engine, "seller", "0.00");
        let buyer = seed_account(&engine, "buyer", "1000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&seller, &Ticker::new("TECH"), 5);
                Ok(())
            })
            .unwrap();

        engine
            .submit(&buyer, limit("TECH", Side::Buy, 100, 5), ts())
            .unwrap();
        engine
            .submit(&seller, limit("TECH", Side::Sell, 100, 5), ts())
            .unwrap();

        engine.store().read(|t| {
            assert!(!t
                .holdings
                .contains_key(&(seller.clone(), Ticker::new("TECH"))));
        });
    }

    #[test]
    fn test_unknown_ticker_rejected() {
        let engine = engine();
        let alice = seed_account(&engine, "alice", "1000.00");
        let result = engine.submit(&alice, limit("ZZZZ", Side::Buy, 100, 1), ts());
        assert!(matches!(result, Err(ExchangeError::UnknownTicker(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let engine = engine();
        let alice = seed_account(&engine, "alice", "1000.00");
        let result = engine.submit(&alice, limit("TECH", Side::Buy, 100, 0), ts());
        assert!(matches!(result, Err(ExchangeError::InvalidParameters(_))));
    }

    #[test]
    fn test_no_crossed_book_after_submits() {
        let engine = engine();
        list_company(&engine, "TECH", 1000, 0, None);
        let a = seed_account(&engine, "a", "100000.00");
        let b = seed_account(&engine, "b", "100000.00");
        engine
            .store()
            .transaction(|txn| {
                txn.set_holding(&a, &Ticker::new("TECH"), 100);
                txn.set_holding(&b, &Ticker::new("TECH"), 100);
                Ok(())
            })
            .unwrap();

        for (acct, side, price, qty) in [
            (&a, Side::Sell, 105, 10),
            (&b, Side::Buy, 103, 5),
            (&a, Side::Buy, 106, 8),
            (&b, Side::Sell, 101, 20),
            (&a, Side::Sell, 104, 3),
            (&b, Side::Buy, 104, 6),
        ] {
            let _ = engine.submit(acct, limit("TECH", side, price, qty), ts());
            engine.with_book(&Ticker::new("TECH"), |book| {
                if let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) {
                    assert!(bid < ask, "book crossed: bid {} >= ask {}", bid, ask);
                }
            });
        }
    }
}
