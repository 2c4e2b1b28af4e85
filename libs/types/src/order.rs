//! Order lifecycle types

use crate::ids::{AccountId, OrderId, Ticker};
use crate::numeric::Price;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    Buy,
    /// Sell order (ask)
    Sell,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order type determines how price is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Execute at the specified price or better
    Limit,
    /// Execute immediately at the best available maker price
    Market,
}

/// Order lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// No fills yet, full quantity remaining
    Open,
    /// Some fills, quantity remaining
    Partial,
    /// Completely executed (terminal)
    Filled,
    /// Cancelled by user or IOC residual (terminal)
    Cancelled,
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Check if the order is resident in the book
    pub fn is_resting(&self) -> bool {
        matches!(self, OrderStatus::Open | OrderStatus::Partial)
    }
}

/// A buy or sell order
///
/// `seq` is a store-issued monotone sequence used as the time-priority key;
/// wall-clock `timestamp` is what goes on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub account_id: AccountId,
    pub ticker: Ticker,
    pub side: Side,
    pub order_type: OrderType,
    /// Limit price; None for market orders
    pub price: Option<Price>,
    pub quantity: u64,
    pub remaining_quantity: u64,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub seq: u64,
}

impl Order {
    pub fn new(
        account_id: AccountId,
        ticker: Ticker,
        side: Side,
        order_type: OrderType,
        price: Option<Price>,
        quantity: u64,
        timestamp: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: OrderId::new(),
            account_id,
            ticker,
            side,
            order_type,
            price,
            quantity,
            remaining_quantity: quantity,
            status: OrderStatus::Open,
            timestamp,
            seq,
        }
    }

    /// Check quantity invariant: remaining never exceeds total
    pub fn check_invariant(&self) -> bool {
        self.remaining_quantity <= self.quantity
            && match self.status {
                OrderStatus::Open => self.remaining_quantity == self.quantity,
                OrderStatus::Partial => {
                    self.remaining_quantity > 0 && self.remaining_quantity < self.quantity
                }
                OrderStatus::Filled => self.remaining_quantity == 0,
                OrderStatus::Cancelled => true,
            }
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Check if order has any fills
    pub fn has_fills(&self) -> bool {
        self.remaining_quantity < self.quantity
    }

    /// Apply a fill: decrement remaining and adjust status
    ///
    /// # Panics
    /// Panics if the fill exceeds the remaining quantity
    pub fn apply_fill(&mut self, fill_quantity: u64) {
        assert!(
            fill_quantity <= self.remaining_quantity,
            "Fill would exceed remaining quantity"
        );
        self.remaining_quantity -= fill_quantity;
        self.status = if self.remaining_quantity == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
    }

    /// Transition to CANCELLED
    ///
    /// # Panics
    /// Panics if the order is already terminal
    pub fn cancel(&mut self) {
        assert!(!self.status.is_terminal(), "Cannot cancel terminal order");
        self.status = OrderStatus::Cancelled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 17, 12, 0, 0).unwrap()
    }

    fn sample_order(quantity: u64) -> Order {
        Order::new(
            AccountId::new("alice"),
            Ticker::new("TECH"),
            Side::Buy,
            OrderType::Limit,
            Some(Price::from_u64(100)),
            quantity,
            ts(),
            1,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::Buy.opposite(), Side::Sell);
        assert_eq!(Side::Sell.opposite(), Side::Buy);
    }

    #[test]
    fn test_order_creation() {
        let order = sample_order(10);
        assert_eq!(order.status, OrderStatus::Open);
        assert_eq!(order.remaining_quantity, 10);
        assert!(order.check_invariant());
        assert!(!order.has_fills());
    }

    #[test]
    fn test_order_fill_transitions() {
        let mut order = sample_order(10);

        order.apply_fill(4);
        assert_eq!(order.status, OrderStatus::Partial);
        assert_eq!(order.remaining_quantity, 6);
        assert!(order.check_invariant());

        order.apply_fill(6);
        assert_eq!(order.status, OrderStatus::Filled);
        assert!(order.is_filled());
        assert!(order.check_invariant());
    }

    #[test]
    #[should_panic(expected = "Fill would exceed remaining quantity")]
    fn test_overfill_panics() {
        let mut order = sample_order(5);
        order.apply_fill(6);
    }

    #[test]
    fn test_order_cancel() {
        let mut order = sample_order(5);
        order.cancel();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert!(order.status.is_terminal());
    }

    #[test]
    #[should_panic(expected = "Cannot cancel terminal order")]
    fn test_cancel_terminal_panics() {
        let mut order = sample_order(5);
        order.apply_fill(5);
        order.cancel();
    }

    #[test]
    fn test_status_literals() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            "\"CANCELLED\""
        );
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(
            serde_json::to_string(&OrderType::Market).unwrap(),
            "\"MARKET\""
        );
    }

    #[test]
    fn test_order_serialization_roundtrip() {
        let order = sample_order(10);
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(order.id, deserialized.id);
        assert_eq!(order.price, deserialized.price);
        assert_eq!(order.quantity, deserialized.quantity);
    }
}
