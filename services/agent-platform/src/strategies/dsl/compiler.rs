//! DSL compiler and rule engine
//!
//! Compilation validates the document and orders the rules by
//! (priority desc, document order). Evaluation runs the compiled rules
//! against a `MarketContext` snapshot with per-(rule, ticker) cooldowns,
//! sizes the actions, and clamps them to the strategy's budget settings.

use crate::strategies::dsl::schema::*;
use crate::strategies::{price_from_decimal, MarketContext, OrderIntent};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;
use types::ids::Ticker;
use types::numeric::Price;
use types::order::{OrderType, Side};

/// Upper bound on tickers visited per tick for `ticker: all` rules
pub const MAX_TICKERS_PER_TICK: usize = 64;

/// Window for `price_change_pct`: mean of the last 20 trades
pub const PRICE_CHANGE_WINDOW: usize = 20;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("invalid strategy document: {0}")]
    Parse(String),

    #[error("strategy must have at least one rule")]
    NoRules,

    #[error("rule '{rule}': {message}")]
    Rule { rule: String, message: String },
}

impl CompileError {
    fn rule(rule: &str, message: impl Into<String>) -> Self {
        Self::Rule {
            rule: rule.to_string(),
            message: message.into(),
        }
    }
}

/// Compile a JSON strategy document
pub fn compile(source: &str) -> Result<RuleBasedStrategy, CompileError> {
    let doc: StrategyDoc =
        serde_json::from_str(source).map_err(|e| CompileError::Parse(e.to_string()))?;
    compile_doc(doc)
}

/// Compile an already-parsed document
pub fn compile_doc(doc: StrategyDoc) -> Result<RuleBasedStrategy, CompileError> {
    validate(&doc)?;

    // Stable sort: priority desc, then document order
    let mut order: Vec<usize> = (0..doc.rules.len()).collect();
    order.sort_by_key(|&i| -doc.rules[i].priority);

    Ok(RuleBasedStrategy {
        doc,
        rule_order: order,
        cooldowns: HashMap::new(),
    })
}

fn validate(doc: &StrategyDoc) -> Result<(), CompileError> {
    if doc.rules.is_empty() {
        return Err(CompileError::NoRules);
    }

    for rule in &doc.rules {
        if rule.when.is_empty() {
            return Err(CompileError::rule(
                &rule.name,
                "must have at least one condition",
            ));
        }
        if rule.then.is_empty() {
            return Err(CompileError::rule(
                &rule.name,
                "must have at least one action",
            ));
        }
        if rule.ticker != "all" && Ticker::try_new(rule.ticker.as_str()).is_none() {
            return Err(CompileError::rule(
                &rule.name,
                format!("malformed ticker '{}'", rule.ticker),
            ));
        }

        let reads_holdings = rule.when.iter().any(|c| c.metric == Metric::MyHoldings);

        for action in &rule.then {
            if let Some(ticker) = &action.ticker {
                if Ticker::try_new(ticker.as_str()).is_none() {
                    return Err(CompileError::rule(
                        &rule.name,
                        format!("malformed action ticker '{}'", ticker),
                    ));
                }
            }

            if action.action == ActionKind::CancelOrders {
                continue;
            }

            let sizings = [
                action.quantity.is_some(),
                action.quantity_pct.is_some(),
                action.quantity_all,
            ]
            .iter()
            .filter(|&&set| set)
            .count();
            if sizings == 0 {
                return Err(CompileError::rule(
                    &rule.name,
                    "action needs one of quantity, quantity_pct, quantity_all",
                ));
            }
            if sizings > 1 {
                return Err(CompileError::rule(
                    &rule.name,
                    "contradictory sizing: set only one of quantity, quantity_pct, quantity_all",
                ));
            }

            if let Some(pct) = action.quantity_pct {
                if pct <= Decimal::ZERO || pct > Decimal::ONE {
                    return Err(CompileError::rule(
                        &rule.name,
                        "quantity_pct must be in (0, 1]",
                    ));
                }
            }

            if action.price.is_some() && action.price_offset_pct.is_some() {
                return Err(CompileError::rule(
                    &rule.name,
                    "contradictory pricing: set only one of price, price_offset_pct",
                ));
            }
            if action.order_type == DslOrderType::Market
                && (action.price.is_some() || action.price_offset_pct.is_some())
            {
                return Err(CompileError::rule(
                    &rule.name,
                    "market actions must not carry a price",
                ));
            }

            // A proportional sell is meaningless unless the rule has just
            // observed its own inventory
            if action.action == ActionKind::Sell
                && (action.quantity_pct.is_some() || action.quantity_all)
                && !reads_holdings
            {
                return Err(CompileError::rule(
                    &rule.name,
                    "sell with quantity_pct/quantity_all requires a my_holdings condition",
                ));
            }
        }
    }

    Ok(())
}

/// A compiled, runnable rule-based strategy
#[derive(Debug)]
pub struct RuleBasedStrategy {
    pub doc: StrategyDoc,
    /// Rule indices in (priority desc, document order)
    rule_order: Vec<usize>,
    /// (rule index, ticker) → last firing time
    cooldowns: HashMap<(usize, Ticker), DateTime<Utc>>,
}

impl RuleBasedStrategy {
    /// Evaluate all rules against the snapshot
    pub fn decide(&mut self, ctx: &MarketContext, now: DateTime<Utc>) -> Vec<OrderIntent> {
        let all_tickers: Vec<Ticker> = ctx
            .companies
            .iter()
            .take(MAX_TICKERS_PER_TICK)
            .map(|c| c.ticker.clone())
            .collect();

        let doc = &self.doc;
        let cooldowns = &mut self.cooldowns;
        let mut intents = Vec::new();

        for &rule_idx in &self.rule_order {
            let rule = &doc.rules[rule_idx];
            let rule_tickers: Vec<Ticker> = if rule.ticker == "all" {
                all_tickers.clone()
            } else {
                match Ticker::try_new(rule.ticker.as_str()) {
                    Some(t) => vec![t],
                    None => continue,
                }
            };

            for ticker in rule_tickers {
                let key = (rule_idx, ticker.clone());
                let on_cooldown = cooldowns.get(&key).is_some_and(|last| {
                    now - *last < Duration::seconds(rule.cooldown_seconds as i64)
                });
                if on_cooldown {
                    continue;
                }

                let all_met = rule
                    .when
                    .iter()
                    .all(|cond| evaluate_condition(cond, ctx, &ticker));
                if !all_met {
                    continue;
                }

                let generated = generate_actions(&rule.then, &doc.settings, ctx, &ticker);
                if !generated.is_empty() {
                    tracing::debug!(
                        rule = %rule.name,
                        ticker = %ticker,
                        actions = generated.len(),
                        "rule fired"
                    );
                    intents.extend(generated);
                    cooldowns.insert(key, now);
                }
            }
        }

        intents
    }
}

fn generate_actions(
    actions: &[ActionDoc],
    settings: &Settings,
    ctx: &MarketContext,
    rule_ticker: &Ticker,
) -> Vec<OrderIntent> {
    let mut intents = Vec::new();

    for action in actions {
        let ticker = action
            .ticker
            .as_deref()
            .and_then(Ticker::try_new)
            .unwrap_or_else(|| rule_ticker.clone());

        if action.action == ActionKind::CancelOrders {
            intents.extend(
                ctx.open_orders
                    .iter()
                    .filter(|o| o.ticker == ticker)
                    .map(|o| OrderIntent::Cancel { order_id: o.id }),
            );
            continue;
        }

        let side = match action.action {
            ActionKind::Buy => Side::Buy,
            ActionKind::Sell => Side::Sell,
            ActionKind::CancelOrders => unreachable!(),
        };

        let Some(quantity) = sized_quantity(action, settings, ctx, &ticker, side) else {
            continue;
        };
        let price = match sized_price(action, ctx, &ticker, side) {
            Ok(price) => price,
            Err(()) => continue,
        };

        let order_type = match action.order_type {
            DslOrderType::Limit => OrderType::Limit,
            DslOrderType::Market => OrderType::Market,
        };

        intents.push(OrderIntent::Place {
            ticker,
            side,
            order_type,
            quantity,
            price,
        });
    }

    intents
}

/// Resolve the action's quantity, clamped to the budget settings.
/// None means the action is skipped, not an error.
fn sized_quantity(
    action: &ActionDoc,
    settings: &Settings,
    ctx: &MarketContext,
    ticker: &Ticker,
    side: Side,
) -> Option<u64> {
    let reference = ctx.reference_price(ticker, side);

    let raw = match side {
        Side::Sell => {
            let held = ctx.holding(ticker);
            if action.quantity_all {
                held
            } else if let Some(pct) = action.quantity_pct {
                decimal_floor(Decimal::from(held) * pct)
            } else {
                action.quantity.unwrap_or(0).min(held)
            }
        }
        Side::Buy => {
            let price = reference?;
            let affordable =
                (ctx.account.cash_balance - settings.min_cash_reserve).min(settings.max_order_value);
            if affordable <= Decimal::ZERO {
                return None;
            }
            if action.quantity_all {
                decimal_floor(affordable / price.as_decimal())
            } else if let Some(pct) = action.quantity_pct {
                decimal_floor(affordable * pct / price.as_decimal())
            } else {
                action.quantity.unwrap_or(0)
            }
        }
    };

    // Budget clamp: price × qty ≤ max_order_value (when a price is known)
    let clamped = match reference {
        Some(price) if price.as_decimal() > Decimal::ZERO => {
            let cap = decimal_floor(settings.max_order_value / price.as_decimal());
            raw.min(cap)
        }
        _ => raw,
    };

    (clamped >= 1).then_some(clamped)
}

/// Resolve the action's price. Ok(None) means a market order;
/// Err(()) means no usable reference price, skip the action.
fn sized_price(
    action: &ActionDoc,
    ctx: &MarketContext,
    ticker: &Ticker,
    side: Side,
) -> Result<Option<Price>, ()> {
    if action.order_type == DslOrderType::Market {
        return Ok(None);
    }
    if let Some(exact) = action.price {
        return price_from_decimal(exact).map(Some).ok_or(());
    }

    let reference = ctx.reference_price(ticker, side).ok_or(())?;
    let priced = match action.price_offset_pct {
        Some(offset) => reference.as_decimal() * (Decimal::ONE + offset),
        None => reference.as_decimal(),
    };
    price_from_decimal(priced).map(Some).ok_or(())
}

/// Evaluate one condition clause; a null metric is false
fn evaluate_condition(cond: &Condition, ctx: &MarketContext, ticker: &Ticker) -> bool {
    metric_value(cond.metric, ctx, ticker)
        .map(|value| cond.operator.compare(value, cond.value))
        .unwrap_or(false)
}

/// Current value of a metric, or None when undefined
fn metric_value(metric: Metric, ctx: &MarketContext, ticker: &Ticker) -> Option<Decimal> {
    match metric {
        Metric::Price => ctx.last_price(ticker).map(|p| p.as_decimal()),
        Metric::BidPrice => ctx.best_bid(ticker).map(|p| p.as_decimal()),
        Metric::AskPrice => ctx.best_ask(ticker).map(|p| p.as_decimal()),
        Metric::SpreadPct => {
            let bid = ctx.best_bid(ticker)?.as_decimal();
            let ask = ctx.best_ask(ticker)?.as_decimal();
            let mid = (bid + ask) / Decimal::from(2);
            if mid > Decimal::ZERO {
                Some((ask - bid) / mid * Decimal::from(100))
            } else {
                None
            }
        }
        Metric::MyCash => Some(ctx.account.cash_balance),
        Metric::MyHoldings => Some(Decimal::from(ctx.holding(ticker))),
        Metric::MyPositionValue => {
            let held = Decimal::from(ctx.holding(ticker));
            match ctx.last_price(ticker) {
                Some(price) => Some(held * price.as_decimal()),
                None => Some(Decimal::ZERO),
            }
        }
        Metric::MyOpenOrders => Some(Decimal::from(ctx.open_orders_for(ticker) as u64)),
        Metric::PriceChangePct => {
            let trades = ctx.recent_trades.get(ticker)?;
            if trades.len() < 2 {
                return Some(Decimal::ZERO);
            }
            let current = trades.first()?.price.as_decimal();
            let window = trades.len().min(PRICE_CHANGE_WINDOW);
            let sum: Decimal = trades[..window].iter().map(|t| t.price.as_decimal()).sum();
            let avg = sum / Decimal::from(window as u64);
            if avg > Decimal::ZERO {
                Some((current - avg) / avg * Decimal::from(100))
            } else {
                Some(Decimal::ZERO)
            }
        }
    }
}

fn decimal_floor(value: Decimal) -> u64 {
    value.floor().to_u64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{AccountInfo, BookLevel, CompanyInfo, OrderBookInfo, TradeInfo};
    use chrono::TimeZone;
    use std::str::FromStr;
    use types::ids::TradeId;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 17, 12, 0, 0).unwrap()
    }

    fn base_ctx() -> MarketContext {
        let ticker = Ticker::new("TECH");
        let mut orderbooks = HashMap::new();
        orderbooks.insert(
            ticker.clone(),
            OrderBookInfo {
                ticker: ticker.clone(),
                bids: vec![BookLevel {
                    price: Price::from_u64(99),
                    quantity: 10,
                }],
                asks: vec![BookLevel {
                    price: Price::from_u64(101),
                    quantity: 10,
                }],
                last_price: Some(Price::from_u64(100)),
            },
        );
        MarketContext {
            account: AccountInfo {
                account_id: "bot".into(),
                cash_balance: Decimal::from(10_000),
                created_at: ts(),
            },
            holdings: vec![],
            companies: vec![CompanyInfo {
                ticker,
                name: "Tech Inc".into(),
                total_shares: 1_000_000,
                float_shares: 1_000,
            }],
            orderbooks,
            open_orders: vec![],
            recent_trades: HashMap::new(),
        }
    }

    fn with_trades(mut ctx: MarketContext, prices: &[u64]) -> MarketContext {
        // prices[0] is the newest trade
        let trades = prices
            .iter()
            .map(|&p| TradeInfo {
                id: TradeId::new(),
                price: Price::from_u64(p),
                quantity: 1,
                timestamp: ts(),
            })
            .collect();
        ctx.recent_trades.insert(Ticker::new("TECH"), trades);
        ctx
    }

    fn doc(json: &str) -> RuleBasedStrategy {
        compile(json).unwrap()
    }

    const DIP_BUYER: &str = r#"{
        "name": "Dip Buyer",
        "settings": {"max_order_value": 1000, "min_cash_reserve": 100},
        "rules": [{
            "name": "buy-dip",
            "ticker": "TECH",
            "when": [{"metric": "price_change_pct", "operator": "<", "value": -5}],
            "then": [{"action": "buy", "quantity": 5}],
            "cooldown_seconds": 300
        }]
    }"#;

    #[test]
    fn test_compile_rejects_empty_when() {
        let err = compile(
            r#"{"name": "x", "rules": [{"name": "r", "when": [], "then": [{"action": "buy", "quantity": 1}]}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Rule { .. }));
    }

    #[test]
    fn test_compile_rejects_contradictory_sizing() {
        let err = compile(
            r#"{"name": "x", "rules": [{
                "name": "r",
                "when": [{"metric": "price", "operator": ">", "value": 0}],
                "then": [{"action": "buy", "quantity": 1, "quantity_pct": 0.5}]
            }]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("contradictory sizing"));
    }

    #[test]
    fn test_compile_rejects_pct_sell_without_holdings_clause() {
        let err = compile(
            r#"{"name": "x", "rules": [{
                "name": "r",
                "when": [{"metric": "price", "operator": ">", "value": 0}],
                "then": [{"action": "sell", "quantity_pct": 0.5}]
            }]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("my_holdings"));
    }

    #[test]
    fn test_compile_rejects_unknown_metric() {
        let err = compile(
            r#"{"name": "x", "rules": [{
                "name": "r",
                "when": [{"metric": "volume_weighted_magic", "operator": ">", "value": 0}],
                "then": [{"action": "buy", "quantity": 1}]
            }]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CompileError::Parse(_)));
    }

    #[test]
    fn test_dip_rule_fires_on_drop() {
        let mut strategy = doc(DIP_BUYER);
        // avg of (90,100,100,100) = 97.5, current 90 → −7.7%
        let ctx = with_trades(base_ctx(), &[90, 100, 100, 100]);

        let intents = strategy.decide(&ctx, ts());
        assert_eq!(intents.len(), 1);
        match &intents[0] {
            OrderIntent::Place {
                side, quantity, price, ..
            } => {
                assert_eq!(*side, Side::Buy);
                assert_eq!(*quantity, 5);
                // limit at the touch: best ask 101
                assert_eq!(*price, Some(Price::from_u64(101)));
            }
            other => panic!("unexpected intent: {:?}", other),
        }
    }

    #[test]
    fn test_dip_rule_quiet_market_does_not_fire() {
        let mut strategy = doc(DIP_BUYER);
        let ctx = with_trades(base_ctx(), &[100, 100, 100]);
        assert!(strategy.decide(&ctx, ts()).is_empty());
    }

    #[test]
    fn test_cooldown_suppresses_then_expires() {
        let mut strategy = doc(DIP_BUYER);
        let ctx = with_trades(base_ctx(), &[90, 100, 100, 100]);

        // Fires at t=0
        assert_eq!(strategy.decide(&ctx, ts()).len(), 1);
        // Suppressed at t=100s
        assert!(strategy
            .decide(&ctx, ts() + Duration::seconds(100))
            .is_empty());
        // Fires again at t=350s
        assert_eq!(
            strategy.decide(&ctx, ts() + Duration::seconds(350)).len(),
            1
        );
    }

    #[test]
    fn test_budget_clamps_quantity() {
        // max_order_value 1000, ask 101 → cap is 9 shares even though the
        // rule asks for 50
        let mut strategy = doc(
            r#"{
                "name": "big spender",
                "settings": {"max_order_value": 1000, "min_cash_reserve": 0},
                "rules": [{
                    "name": "r",
                    "ticker": "TECH",
                    "when": [{"metric": "price", "operator": ">", "value": 0}],
                    "then": [{"action": "buy", "quantity": 50}]
                }]
            }"#,
        );
        let ctx = with_trades(base_ctx(), &[100, 100]);
        let intents = strategy.decide(&ctx, ts());
        match &intents[0] {
            OrderIntent::Place { quantity, .. } => assert_eq!(*quantity, 9),
            other => panic!("unexpected intent: {:?}", other),
        }
    }

    #[test]
    fn test_cash_reserve_skips_unaffordable_action() {
        let mut strategy = doc(
            r#"{
                "name": "broke",
                "settings": {"max_order_value": 1000, "min_cash_reserve": 9990},
                "rules": [{
                    "name": "r",
                    "ticker": "TECH",
                    "when": [{"metric": "price", "operator": ">", "value": 0}],
                    "then": [{"action": "buy", "quantity": 5}]
                }]
            }"#,
        );
        // cash 10000 − reserve 9990 = 10 < ask 101 → qty 0 → skipped
        let ctx = with_trades(base_ctx(), &[100, 100]);
        assert!(strategy.decide(&ctx, ts()).is_empty());
    }

    #[test]
    fn test_sell_quantity_all_uses_holdings() {
        let mut strategy = doc(
            r#"{
                "name": "exit",
                "rules": [{
                    "name": "dump",
                    "ticker": "TECH",
                    "when": [{"metric": "my_holdings", "operator": ">", "value": 0}],
                    "then": [{"action": "sell", "quantity_all": true, "order_type": "market"}]
                }]
            }"#,
        );
        let mut ctx = with_trades(base_ctx(), &[100, 100]);
        ctx.holdings.push(crate::client::HoldingInfo {
            ticker: Ticker::new("TECH"),
            quantity: 7,
        });

        let intents = strategy.decide(&ctx, ts());
        assert_eq!(
            intents,
            vec![OrderIntent::Place {
                ticker: Ticker::new("TECH"),
                side: Side::Sell,
                order_type: OrderType::Market,
                quantity: 7,
                price: None,
            }]
        );
    }

    #[test]
    fn test_priority_order_evaluation() {
        let mut strategy = doc(
            r#"{
                "name": "ordered",
                "rules": [
                    {
                        "name": "low",
                        "ticker": "TECH",
                        "priority": 1,
                        "when": [{"metric": "price", "operator": ">", "value": 0}],
                        "then": [{"action": "buy", "quantity": 1}]
                    },
                    {
                        "name": "high",
                        "ticker": "TECH",
                        "priority": 10,
                        "when": [{"metric": "price", "operator": ">", "value": 0}],
                        "then": [{"action": "buy", "quantity": 2}]
                    }
                ]
            }"#,
        );
        let ctx = with_trades(base_ctx(), &[100, 100]);
        let intents = strategy.decide(&ctx, ts());
        // Higher priority rule's intent comes first
        match &intents[0] {
            OrderIntent::Place { quantity, .. } => assert_eq!(*quantity, 2),
            other => panic!("unexpected intent: {:?}", other),
        }
    }

    #[test]
    fn test_null_metric_clause_is_false() {
        let mut strategy = doc(
            r#"{
                "name": "needs a bid",
                "rules": [{
                    "name": "r",
                    "ticker": "TECH",
                    "when": [{"metric": "bid_price", "operator": ">", "value": 0}],
                    "then": [{"action": "buy", "quantity": 1}]
                }]
            }"#,
        );
        let mut ctx = base_ctx();
        ctx.orderbooks.get_mut(&Ticker::new("TECH")).unwrap().bids.clear();
        assert!(strategy.decide(&ctx, ts()).is_empty());
    }

    #[test]
    fn test_cancel_orders_action_targets_ticker() {
        let mut strategy = doc(
            r#"{
                "name": "cleaner",
                "rules": [{
                    "name": "r",
                    "ticker": "TECH",
                    "when": [{"metric": "my_open_orders", "operator": ">", "value": 1}],
                    "then": [{"action": "cancel_orders"}]
                }]
            }"#,
        );
        let mut ctx = base_ctx();
        let mk_order = |ticker: &str| crate::client::OrderInfo {
            id: types::ids::OrderId::new(),
            ticker: Ticker::new(ticker),
            side: "BUY".into(),
            order_type: "LIMIT".into(),
            price: Some(Price::from_u64(90)),
            quantity: 1,
            remaining_quantity: 1,
            status: "OPEN".into(),
            timestamp: ts(),
        };
        ctx.open_orders.push(mk_order("TECH"));
        ctx.open_orders.push(mk_order("TECH"));

        let intents = strategy.decide(&ctx, ts());
        assert_eq!(intents.len(), 2);
        assert!(intents
            .iter()
            .all(|i| matches!(i, OrderIntent::Cancel { .. })));
    }

    #[test]
    fn test_price_offset_pct_applied() {
        let mut strategy = doc(
            r#"{
                "name": "undercut",
                "rules": [{
                    "name": "r",
                    "ticker": "TECH",
                    "when": [{"metric": "price", "operator": ">", "value": 0}],
                    "then": [{"action": "buy", "quantity": 1, "price_offset_pct": -0.02}]
                }]
            }"#,
        );
        let ctx = with_trades(base_ctx(), &[100, 100]);
        let intents = strategy.decide(&ctx, ts());
        match &intents[0] {
            OrderIntent::Place { price, .. } => {
                // ask 101 × 0.98 = 98.98
                assert_eq!(*price, Some(Price::from_str("98.98").unwrap()));
            }
            other => panic!("unexpected intent: {:?}", other),
        }
    }

    #[test]
    fn test_price_change_window_is_bounded() {
        let mut strategy = doc(DIP_BUYER);
        // 30 trades: newest 90, then 29 × 100. Only the first 20 count:
        // avg = (90 + 19×100)/20 = 99.5 → change −9.55%
        let mut prices = vec![90u64];
        prices.extend(std::iter::repeat(100).take(29));
        let ctx = with_trades(base_ctx(), &prices);
        assert_eq!(strategy.decide(&ctx, ts()).len(), 1);
    }
}
