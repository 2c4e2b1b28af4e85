//! Atomic fill settlement
//!
//! One call per fill, inside the engine's open transaction: cash moves from
//! buyer to seller, shares move from seller to buyer, both order rows
//! advance, and a trade row is appended. Any step failing rolls the whole
//! submit back; the matching pre-checks make such failures unreachable, so a
//! settlement error is a bug and surfaces as `SETTLEMENT_FAILED`.

use crate::store::Transaction;
use chrono::{DateTime, Utc};
use types::prelude::*;

/// Settle one fill. Self-trades are legal: the same account is read and
/// written on both sides and the deltas net out.
#[allow(clippy::too_many_arguments)]
pub fn apply_fill(
    txn: &mut Transaction<'_>,
    ticker: &Ticker,
    price: Price,
    quantity: u64,
    buy_order_id: OrderId,
    sell_order_id: OrderId,
    timestamp: DateTime<Utc>,
    seq: u64,
) -> Result<Trade, ExchangeError> {
    let buy_order = txn
        .order(&buy_order_id)
        .ok_or_else(|| ExchangeError::SettlementFailed("buy order vanished".into()))?
        .clone();
    let sell_order = txn
        .order(&sell_order_id)
        .ok_or_else(|| ExchangeError::SettlementFailed("sell order vanished".into()))?
        .clone();

    let buyer_id = buy_order.account_id.clone();
    let seller_id = sell_order.account_id.clone();
    let notional = price.notional(quantity);

    // 1. Buyer cash down; never below zero
    let mut buyer = txn
        .account(&buyer_id)
        .ok_or_else(|| ExchangeError::SettlementFailed("buyer account vanished".into()))?
        .clone();
    buyer
        .debit(notional)
        .map_err(|_| ExchangeError::SettlementFailed("buyer cash would go negative".into()))?;
    txn.put_account(buyer);

    // 2. Seller cash up (re-read so a self-trade credits the debited row)
    let mut seller = txn
        .account(&seller_id)
        .ok_or_else(|| ExchangeError::SettlementFailed("seller account vanished".into()))?
        .clone();
    seller.credit(notional);
    txn.put_account(seller);

    // 3./4. Shares: seller down (row deleted at zero), buyer up
    let seller_qty = txn.holding_qty(&seller_id, ticker);
    if seller_qty < quantity {
        return Err(ExchangeError::SettlementFailed(
            "seller holding would go negative".into(),
        ));
    }
    txn.set_holding(&seller_id, ticker, seller_qty - quantity);

    let buyer_qty = txn.holding_qty(&buyer_id, ticker);
    txn.set_holding(&buyer_id, ticker, buyer_qty + quantity);

    // 5. Advance both order rows
    let mut buy_order = buy_order;
    buy_order.apply_fill(quantity);
    txn.put_order(buy_order);

    let mut sell_order = sell_order;
    sell_order.apply_fill(quantity);
    txn.put_order(sell_order);

    // 6. Append the trade
    let trade = Trade::new(
        ticker.clone(),
        price,
        quantity,
        buyer_id,
        seller_id,
        buy_order_id,
        sell_order_id,
        timestamp,
        seq,
    );
    txn.append_trade(trade.clone());

    Ok(trade)
}
