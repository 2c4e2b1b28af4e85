//! Per-ticker order book index
//!
//! A derived, rebuildable index over the store's OPEN/PARTIAL orders: bids
//! and asks as price-keyed ordered maps of FIFO levels, plus an order-id
//! locator for O(log n) cancel and reduce. The store stays the authority;
//! every mutation here mirrors a committed row change.

pub mod price_level;

pub use price_level::{LevelEntry, PriceLevel};

use std::collections::{BTreeMap, HashMap};
use types::ids::{OrderId, Ticker};
use types::numeric::Price;
use types::order::{Order, Side};

/// One aggregated price level for public market data
#[derive(Debug, Clone, PartialEq)]
pub struct DepthLevel {
    pub price: Price,
    pub quantity: u64,
}

/// The live book for a single ticker
///
/// Bids iterate best-first via `iter().rev()` (highest price), asks via
/// `iter()` (lowest price). BTreeMap keeps iteration deterministic.
#[derive(Debug, Default)]
pub struct TickerBook {
    bids: BTreeMap<Price, PriceLevel>,
    asks: BTreeMap<Price, PriceLevel>,
    /// order_id → (side, price) locator for cancel/reduce
    index: HashMap<OrderId, (Side, Price)>,
}

impl TickerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from the store's resting orders (startup, or after a failed
    /// commit left the index suspect). Orders must be given in seq order.
    pub fn rebuild<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut book = Self::new();
        for order in orders {
            book.insert(order);
        }
        book
    }

    /// Insert a resting order. Market orders never rest, so `price` is
    /// always present here.
    pub fn insert(&mut self, order: &Order) {
        let price = order.price.expect("resting order must have a price");
        let side_map = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        side_map.entry(price).or_default().insert(LevelEntry {
            order_id: order.id,
            account_id: order.account_id.clone(),
            seq: order.seq,
            remaining: order.remaining_quantity,
        });
        self.index.insert(order.id, (order.side, price));
    }

    /// Remove an order by id (cancellation). Returns false if absent.
    pub fn remove(&mut self, order_id: &OrderId) -> bool {
        let Some((side, price)) = self.index.remove(order_id) else {
            return false;
        };
        let side_map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if let Some(level) = side_map.get_mut(&price) {
            level.remove(order_id);
            if level.is_empty() {
                side_map.remove(&price);
            }
        }
        true
    }

    /// Best resting entry on a side: (price, front entry)
    pub fn best(&self, side: Side) -> Option<(Price, &LevelEntry)> {
        let level = match side {
            Side::Buy => self.bids.iter().next_back(),
            Side::Sell => self.asks.iter().next(),
        };
        level.and_then(|(price, level)| level.peek_front().map(|e| (*price, e)))
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.keys().next().copied()
    }

    /// Reduce the front order of the best level on `side` by `qty`,
    /// removing it when fully consumed.
    pub fn reduce_best(&mut self, side: Side, qty: u64) {
        let (price, level) = match side {
            Side::Buy => self
                .bids
                .iter_mut()
                .next_back()
                .expect("reduce_best on empty side"),
            Side::Sell => self
                .asks
                .iter_mut()
                .next()
                .expect("reduce_best on empty side"),
        };
        let price = *price;
        let front_id = level.peek_front().expect("empty level in book").order_id;
        if level.reduce_front(qty) {
            self.index.remove(&front_id);
        }
        let side_map = match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        if side_map.get(&price).is_some_and(|l| l.is_empty()) {
            side_map.remove(&price);
        }
    }

    /// Top `depth` aggregated levels: bids best-first, asks best-first
    pub fn aggregate_levels(&self, depth: usize) -> (Vec<DepthLevel>, Vec<DepthLevel>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|(price, level)| DepthLevel {
                price: *price,
                quantity: level.total_quantity(),
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|(price, level)| DepthLevel {
                price: *price,
                quantity: level.total_quantity(),
            })
            .collect();
        (bids, asks)
    }

    /// Non-aggregated entries per side, best-first (admin view)
    pub fn entries(&self, side: Side) -> Vec<(Price, Vec<LevelEntry>)> {
        let collect = |level: &PriceLevel| level.iter().cloned().collect::<Vec<_>>();
        match side {
            Side::Buy => self
                .bids
                .iter()
                .rev()
                .map(|(p, l)| (*p, collect(l)))
                .collect(),
            Side::Sell => self.asks.iter().map(|(p, l)| (*p, collect(l))).collect(),
        }
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        self.index.contains_key(order_id)
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
