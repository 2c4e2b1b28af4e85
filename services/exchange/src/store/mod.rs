//! Persistent row store
//!
//! The single source of truth for companies, accounts, holdings, orders and
//! trades. Tables live in memory (`BTreeMap`s for deterministic iteration)
//! and every committed transaction is journaled; startup replays the journal
//! to rebuild them. The in-memory order book is a derived index rebuilt from
//! this store, never the other way around.
//!
//! Transactions are serialized by a single writer lock and buffer their
//! changes in an overlay with read-your-writes, so a failed step rolls the
//! whole transaction back by dropping the overlay.

pub mod journal;

use crate::store::journal::{JournalEntry, JournalReader, JournalWriter};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use types::prelude::*;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Journal error: {0}")]
    Journal(#[from] journal::JournalError),

    #[error("Replay error: {0}")]
    Replay(String),
}

/// One persisted mutation. Replaying the full event stream rebuilds the
/// tables exactly; all events carry absolute values, never deltas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreEvent {
    CompanyUpserted(Company),
    AccountUpserted(Account),
    HoldingSet {
        account_id: AccountId,
        ticker: Ticker,
        quantity: u64,
    },
    OrderUpserted(Order),
    TradeAppended(Trade),
}

/// The five durable tables, plus a per-ticker trade index for market data.
#[derive(Debug, Default)]
pub struct Tables {
    pub companies: BTreeMap<Ticker, Company>,
    pub accounts: BTreeMap<AccountId, Account>,
    /// (account, ticker) → quantity; rows with zero quantity are deleted
    pub holdings: BTreeMap<(AccountId, Ticker), u64>,
    pub orders: BTreeMap<OrderId, Order>,
    /// Append-only, in seq order
    pub trades: Vec<Trade>,
    trade_index: HashMap<Ticker, Vec<usize>>,
}

impl Tables {
    fn apply(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::CompanyUpserted(company) => {
                self.companies.insert(company.ticker.clone(), company.clone());
            }
            StoreEvent::AccountUpserted(account) => {
                self.accounts.insert(account.id.clone(), account.clone());
            }
            StoreEvent::HoldingSet {
                account_id,
                ticker,
                quantity,
            } => {
                let key = (account_id.clone(), ticker.clone());
                if *quantity == 0 {
                    self.holdings.remove(&key);
                } else {
                    self.holdings.insert(key, *quantity);
                }
            }
            StoreEvent::OrderUpserted(order) => {
                self.orders.insert(order.id, order.clone());
            }
            StoreEvent::TradeAppended(trade) => {
                let idx = self.trades.len();
                self.trade_index
                    .entry(trade.ticker.clone())
                    .or_default()
                    .push(idx);
                self.trades.push(trade.clone());
            }
        }
    }

    /// Quantity held, zero if no row
    pub fn holding_qty(&self, account_id: &AccountId, ticker: &Ticker) -> u64 {
        self.holdings
            .get(&(account_id.clone(), ticker.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// All OPEN/PARTIAL orders for a ticker, in seq order. Used to rebuild
    /// the in-memory book on startup.
    pub fn resting_orders(&self, ticker: &Ticker) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| o.ticker == *ticker && o.status.is_resting())
            .collect();
        orders.sort_by_key(|o| o.seq);
        orders
    }

    /// Trades for a ticker, newest first
    pub fn trades_for(&self, ticker: &Ticker) -> impl Iterator<Item = &Trade> {
        self.trade_index
            .get(ticker)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .rev()
            .map(|&i| &self.trades[i])
    }

    /// Last trade price for a ticker
    pub fn last_price(&self, ticker: &Ticker) -> Option<Price> {
        self.trades_for(ticker).next().map(|t| t.price)
    }

    /// 24h stats relative to `now`: (open, high, low, volume)
    pub fn stats_24h(
        &self,
        ticker: &Ticker,
        now: DateTime<Utc>,
    ) -> (Option<Price>, Option<Price>, Option<Price>, u64) {
        let cutoff = now - Duration::hours(24);
        let mut open: Option<&Trade> = None;
        let mut high: Option<Price> = None;
        let mut low: Option<Price> = None;
        let mut volume: u64 = 0;

        for trade in self.trades_for(ticker) {
            if trade.timestamp < cutoff {
                break;
            }
            volume += trade.quantity;
            high = Some(high.map_or(trade.price, |h| h.max(trade.price)));
            low = Some(low.map_or(trade.price, |l| l.min(trade.price)));
            open = Some(trade);
        }

        (open.map(|t| t.price), high, low, volume)
    }

    /// Total cash across all accounts (conservation checks)
    pub fn total_cash(&self) -> Decimal {
        self.accounts.values().map(|a| a.cash_balance).sum()
    }

    /// Total held shares for a ticker (conservation checks)
    pub fn total_holdings(&self, ticker: &Ticker) -> u64 {
        self.holdings
            .iter()
            .filter(|((_, t), _)| t == ticker)
            .map(|(_, qty)| qty)
            .sum()
    }
}

/// A buffered transaction over the tables.
///
/// Reads see the overlay first, then the base tables. Nothing is visible to
/// other readers until commit; dropping the transaction discards everything.
pub struct Transaction<'a> {
    base: &'a Tables,
    companies: BTreeMap<Ticker, Company>,
    accounts: BTreeMap<AccountId, Account>,
    holdings: BTreeMap<(AccountId, Ticker), u64>,
    orders: BTreeMap<OrderId, Order>,
    trades: Vec<Trade>,
}

impl<'a> Transaction<'a> {
    fn new(base: &'a Tables) -> Self {
        Self {
            base,
            companies: BTreeMap::new(),
            accounts: BTreeMap::new(),
            holdings: BTreeMap::new(),
            orders: BTreeMap::new(),
            trades: Vec::new(),
        }
    }

    pub fn company(&self, ticker: &Ticker) -> Option<&Company> {
        self.companies
            .get(ticker)
            .or_else(|| self.base.companies.get(ticker))
    }

    pub fn put_company(&mut self, company: Company) {
        self.companies.insert(company.ticker.clone(), company);
    }

    pub fn account(&self, id: &AccountId) -> Option<&Account> {
        self.accounts.get(id).or_else(|| self.base.accounts.get(id))
    }

    pub fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    pub fn holding_qty(&self, account_id: &AccountId, ticker: &Ticker) -> u64 {
        let key = (account_id.clone(), ticker.clone());
        self.holdings
            .get(&key)
            .copied()
            .unwrap_or_else(|| self.base.holdings.get(&key).copied().unwrap_or(0))
    }

    /// Set a holding quantity; zero deletes the row at commit
    pub fn set_holding(&mut self, account_id: &AccountId, ticker: &Ticker, quantity: u64) {
        self.holdings
            .insert((account_id.clone(), ticker.clone()), quantity);
    }

    pub fn order(&self, id: &OrderId) -> Option<&Order> {
        self.orders.get(id).or_else(|| self.base.orders.get(id))
    }

    pub fn put_order(&mut self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn append_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    /// All orders, overlay winning over base
    fn orders_iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values().chain(
            self.base
                .orders
                .values()
                .filter(|o| !self.orders.contains_key(&o.id)),
        )
    }

    /// Cash committed to the account's other resting BUY-LIMIT orders.
    /// Excludes `except`, the order currently being processed.
    pub fn committed_buy_cash(&self, account_id: &AccountId, except: Option<OrderId>) -> Decimal {
        self.orders_iter()
            .filter(|o| {
                o.account_id == *account_id
                    && o.side == Side::Buy
                    && o.status.is_resting()
                    && Some(o.id) != except
            })
            .filter_map(|o| o.price.map(|p| p.notional(o.remaining_quantity)))
            .sum()
    }

    /// Shares committed to the account's other resting SELL orders.
    pub fn committed_sell_shares(
        &self,
        account_id: &AccountId,
        ticker: &Ticker,
        except: Option<OrderId>,
    ) -> u64 {
        self.orders_iter()
            .filter(|o| {
                o.account_id == *account_id
                    && o.ticker == *ticker
                    && o.side == Side::Sell
                    && o.status.is_resting()
                    && Some(o.id) != except
            })
            .map(|o| o.remaining_quantity)
            .sum()
    }

    /// Flatten the overlay into the event list applied at commit.
    fn into_events(self) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        for company in self.companies.into_values() {
            events.push(StoreEvent::CompanyUpserted(company));
        }
        for account in self.accounts.into_values() {
            events.push(StoreEvent::AccountUpserted(account));
        }
        for ((account_id, ticker), quantity) in self.holdings {
            events.push(StoreEvent::HoldingSet {
                account_id,
                ticker,
                quantity,
            });
        }
        for order in self.orders.into_values() {
            events.push(StoreEvent::OrderUpserted(order));
        }
        for trade in self.trades {
            events.push(StoreEvent::TradeAppended(trade));
        }
        events
    }
}

/// The store: tables + journal + monotone sequence source.
pub struct Store {
    tables: RwLock<Tables>,
    journal: Option<Mutex<JournalWriter>>,
    seq: AtomicU64,
}

impl Store {
    /// Ephemeral store with no journal (tests, benchmarks)
    pub fn in_memory() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            journal: None,
            seq: AtomicU64::new(1),
        }
    }

    /// Open a durable store, replaying any existing journal.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        let mut tables = Tables::default();
        let mut replayed: u64 = 0;

        let mut reader = JournalReader::open(dir)?;
        while let Some(entry) = reader.next_entry()? {
            let event: StoreEvent = bincode::deserialize(&entry.payload)
                .map_err(|e| StoreError::Replay(format!("seq {}: {}", entry.sequence, e)))?;
            tables.apply(&event);
            replayed += 1;
        }

        let mut writer = JournalWriter::open(dir)?;
        writer.set_next_sequence(replayed + 1);

        // Restore the order/trade priority sequence
        let max_seq = tables
            .orders
            .values()
            .map(|o| o.seq)
            .chain(tables.trades.iter().map(|t| t.seq))
            .max()
            .unwrap_or(0);

        if replayed > 0 {
            tracing::info!(events = replayed, "journal replayed");
        }

        Ok(Self {
            tables: RwLock::new(tables),
            journal: Some(Mutex::new(writer)),
            seq: AtomicU64::new(max_seq + 1),
        })
    }

    /// Next order/trade priority sequence number
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Run a read-only closure against a consistent snapshot of the tables.
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        let tables = self.tables.read().expect("store lock poisoned");
        f(&tables)
    }

    /// Run a transaction. The closure's error rolls everything back; on
    /// success the events are journaled (fsync) and applied to the tables.
    pub fn transaction<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<R, ExchangeError>,
    ) -> Result<R, ExchangeError> {
        let mut tables = self.tables.write().expect("store lock poisoned");

        let (events, result) = {
            let mut txn = Transaction::new(&tables);
            let result = f(&mut txn)?;
            (txn.into_events(), result)
        };

        // Journal first: the tables are only mutated once the events are
        // durable, so memory never runs ahead of disk.
        if let Some(journal) = &self.journal {
            let mut writer = journal.lock().expect("journal lock poisoned");
            let now_nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
            for event in &events {
                let payload = bincode::serialize(event)
                    .map_err(|e| ExchangeError::Internal(format!("journal encode: {}", e)))?;
                let entry = JournalEntry::new(writer.next_sequence().max(1), now_nanos, payload);
                writer
                    .append(&entry)
                    .map_err(|e| ExchangeError::Internal(format!("journal append: {}", e)))?;
            }
            // Transient sync failures get one retry before the whole
            // transaction surfaces as an internal error
            if writer.sync().is_err() {
                writer
                    .sync()
                    .map_err(|e| ExchangeError::Internal(format!("journal sync: {}", e)))?;
            }
        }

        for event in &events {
            tables.apply(event);
        }

        Ok(result)
    }
}
