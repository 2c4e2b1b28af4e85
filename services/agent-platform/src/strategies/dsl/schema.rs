//! Strategy DSL document types
//!
//! A strategy document is JSON: a name, safety settings, and an ordered
//! list of IF/THEN rules. Unknown metrics, operators and actions fail at
//! deserialization, before compilation ever sees them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Complete DSL strategy definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub rules: Vec<RuleDoc>,
}

/// Global safety settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Cap on price × quantity per order
    #[serde(default = "default_max_order_value")]
    pub max_order_value: Decimal,
    /// Cash floor the strategy must never trade below
    #[serde(default = "default_min_cash_reserve")]
    pub min_cash_reserve: Decimal,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_order_value: default_max_order_value(),
            min_cash_reserve: default_min_cash_reserve(),
        }
    }
}

fn default_max_order_value() -> Decimal {
    Decimal::from(10_000)
}

fn default_min_cash_reserve() -> Decimal {
    Decimal::from(100)
}

/// One IF/THEN rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDoc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// "all" or a specific symbol
    #[serde(default = "default_ticker")]
    pub ticker: String,
    /// Conjunction: every clause must hold
    #[serde(default)]
    pub when: Vec<Condition>,
    #[serde(default)]
    pub then: Vec<ActionDoc>,
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
    /// Higher fires first; document order breaks ties
    #[serde(default)]
    pub priority: i64,
}

fn default_ticker() -> String {
    "all".to_string()
}

fn default_cooldown() -> u64 {
    60
}

/// A single condition clause
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub metric: Metric,
    pub operator: Operator,
    pub value: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Price,
    PriceChangePct,
    BidPrice,
    AskPrice,
    SpreadPct,
    MyCash,
    MyHoldings,
    MyPositionValue,
    MyOpenOrders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Operator {
    pub fn compare(&self, lhs: Decimal, rhs: Decimal) -> bool {
        match self {
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
        }
    }
}

/// An action executed when a rule fires
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDoc {
    pub action: ActionKind,
    /// Target ticker; defaults to the rule's ticker
    #[serde(default)]
    pub ticker: Option<String>,
    /// Sizing: exactly one of quantity / quantity_pct / quantity_all
    #[serde(default)]
    pub quantity: Option<u64>,
    #[serde(default)]
    pub quantity_pct: Option<Decimal>,
    #[serde(default)]
    pub quantity_all: bool,
    /// Pricing: at most one of price / price_offset_pct; absent with
    /// order_type market means a market order
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub price_offset_pct: Option<Decimal>,
    #[serde(default = "default_order_type")]
    pub order_type: DslOrderType,
}

fn default_order_type() -> DslOrderType {
    DslOrderType::Limit
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Buy,
    Sell,
    CancelOrders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DslOrderType {
    Limit,
    Market,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_document_parses_with_defaults() {
        let doc: StrategyDoc = serde_json::from_str(
            r#"{
                "name": "Buy the Dip",
                "rules": [{
                    "name": "dip",
                    "when": [{"metric": "price_change_pct", "operator": "<", "value": -5}],
                    "then": [{"action": "buy", "quantity": 10}]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.rules.len(), 1);
        let rule = &doc.rules[0];
        assert_eq!(rule.ticker, "all");
        assert_eq!(rule.cooldown_seconds, 60);
        assert_eq!(rule.priority, 0);
        assert_eq!(rule.when[0].metric, Metric::PriceChangePct);
        assert_eq!(rule.when[0].operator, Operator::Lt);
        assert_eq!(doc.settings.max_order_value, Decimal::from(10_000));
    }

    #[test]
    fn test_unknown_metric_rejected_at_parse() {
        let result: Result<Condition, _> = serde_json::from_str(
            r#"{"metric": "moon_phase", "operator": "<", "value": 1}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_operator_rejected_at_parse() {
        let result: Result<Condition, _> =
            serde_json::from_str(r#"{"metric": "price", "operator": "~=", "value": 1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_operator_compare() {
        assert!(Operator::Lt.compare(Decimal::from(1), Decimal::from(2)));
        assert!(Operator::Ge.compare(Decimal::from(2), Decimal::from(2)));
        assert!(Operator::Ne.compare(Decimal::from(1), Decimal::from(2)));
        assert!(!Operator::Eq.compare(Decimal::from(1), Decimal::from(2)));
    }

    #[test]
    fn test_action_kinds_parse() {
        let action: ActionDoc =
            serde_json::from_str(r#"{"action": "cancel_orders"}"#).unwrap();
        assert_eq!(action.action, ActionKind::CancelOrders);
        assert_eq!(action.order_type, DslOrderType::Limit);
    }
}
