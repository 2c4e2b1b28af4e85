//! Strategy catalog
//!
//! Built-in strategy definitions with parameter schemas, plus the factory
//! that turns an agent's configuration into a runnable `Strategy` value.

use crate::strategies::dsl;
use crate::strategies::random::{RandomConfig, RandomStrategy};
use crate::strategies::Strategy;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("unknown strategy '{0}'")]
    Unknown(String),

    #[error("parameter '{name}': {message}")]
    Parameter { name: String, message: String },

    #[error("rule-based strategy requires a source document")]
    MissingSource,

    #[error(transparent)]
    Compile(#[from] dsl::CompileError),
}

/// Schema for a single strategy parameter
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSchema {
    pub name: &'static str,
    pub param_type: &'static str,
    pub description: &'static str,
    pub default: Value,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

/// A registered strategy kind
#[derive(Debug, Clone, Serialize)]
pub struct StrategyDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSchema>,
    /// True when the strategy is configured by a DSL document
    pub is_dsl: bool,
}

/// All built-in strategies
pub fn definitions() -> Vec<StrategyDefinition> {
    vec![
        StrategyDefinition {
            id: "random",
            name: "Random Strategy",
            description: "Makes random buy/sell decisions around the market price. \
                          Good for seeding activity and testing.",
            parameters: vec![
                ParameterSchema {
                    name: "max_order_value",
                    param_type: "decimal",
                    description: "Maximum value per order",
                    default: Value::from(1000),
                    min_value: Some(10.0),
                    max_value: Some(100_000.0),
                },
                ParameterSchema {
                    name: "price_offset_pct",
                    param_type: "decimal",
                    description: "Distance from market price for limit orders (0.02 = 2%)",
                    default: Value::from(0.02),
                    min_value: Some(0.001),
                    max_value: Some(0.5),
                },
                ParameterSchema {
                    name: "cancel_probability",
                    param_type: "float",
                    description: "Chance per tick to cancel an open order (0.0-1.0)",
                    default: Value::from(0.1),
                    min_value: Some(0.0),
                    max_value: Some(1.0),
                },
                ParameterSchema {
                    name: "market_order_probability",
                    param_type: "float",
                    description: "Chance a generated order is a market order (0.0-1.0)",
                    default: Value::from(0.3),
                    min_value: Some(0.0),
                    max_value: Some(1.0),
                },
                ParameterSchema {
                    name: "seed",
                    param_type: "int",
                    description: "RNG seed for reproducible behavior",
                    default: Value::from(0),
                    min_value: None,
                    max_value: None,
                },
            ],
            is_dsl: false,
        },
        StrategyDefinition {
            id: "rule_based",
            name: "Rule-Based Strategy",
            description: "Declarative IF/THEN rules with cooldowns, priorities and \
                          budget limits, defined as a JSON document.",
            parameters: vec![],
            is_dsl: true,
        },
    ]
}

pub fn definition(id: &str) -> Option<StrategyDefinition> {
    definitions().into_iter().find(|d| d.id == id)
}

/// Build a runnable strategy from an agent's configuration.
///
/// `params` configures built-ins; `source` is the DSL document for
/// rule-based strategies.
pub fn build(
    strategy_type: &str,
    params: &Value,
    source: Option<&str>,
) -> Result<Strategy, StrategyError> {
    match strategy_type {
        "random" => {
            let defaults = RandomConfig::default();
            let config = RandomConfig {
                max_order_value: decimal_param(params, "max_order_value")?
                    .unwrap_or(defaults.max_order_value),
                price_offset_pct: decimal_param(params, "price_offset_pct")?
                    .unwrap_or(defaults.price_offset_pct),
                cancel_probability: probability_param(params, "cancel_probability")?
                    .unwrap_or(defaults.cancel_probability),
                market_order_probability: probability_param(params, "market_order_probability")?
                    .unwrap_or(defaults.market_order_probability),
            };
            let seed = params
                .get("seed")
                .and_then(Value::as_u64)
                .unwrap_or_default();
            Ok(Strategy::Random(RandomStrategy::new(config, seed)))
        }
        "rule_based" => {
            let source = source.ok_or(StrategyError::MissingSource)?;
            Ok(Strategy::RuleBased(dsl::compile(source)?))
        }
        other => Err(StrategyError::Unknown(other.to_string())),
    }
}

/// Validate configuration without building (POST /strategies/validate)
pub fn validate(
    strategy_type: &str,
    params: &Value,
    source: Option<&str>,
) -> Result<(), StrategyError> {
    build(strategy_type, params, source).map(|_| ())
}

fn decimal_param(params: &Value, name: &str) -> Result<Option<Decimal>, StrategyError> {
    let Some(value) = params.get(name) else {
        return Ok(None);
    };
    let parsed = match value {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        _ => None,
    };
    let decimal = parsed.ok_or_else(|| StrategyError::Parameter {
        name: name.to_string(),
        message: "must be a decimal number".to_string(),
    })?;
    if decimal <= Decimal::ZERO {
        return Err(StrategyError::Parameter {
            name: name.to_string(),
            message: "must be positive".to_string(),
        });
    }
    Ok(Some(decimal.round_dp(4)))
}

fn probability_param(params: &Value, name: &str) -> Result<Option<f64>, StrategyError> {
    let Some(value) = params.get(name) else {
        return Ok(None);
    };
    let p = value.as_f64().ok_or_else(|| StrategyError::Parameter {
        name: name.to_string(),
        message: "must be a number".to_string(),
    })?;
    if !(0.0..=1.0).contains(&p) {
        return Err(StrategyError::Parameter {
            name: name.to_string(),
            message: "must be between 0.0 and 1.0".to_string(),
        });
    }
    Ok(Some(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_definitions_include_both_kinds() {
        let defs = definitions();
        assert!(defs.iter().any(|d| d.id == "random" && !d.is_dsl));
        assert!(defs.iter().any(|d| d.id == "rule_based" && d.is_dsl));
    }

    #[test]
    fn test_build_random_with_defaults() {
        let strategy = build("random", &json!({}), None).unwrap();
        assert_eq!(strategy.kind(), "random");
    }

    #[test]
    fn test_build_unknown_strategy() {
        let err = build("galaxy_brain", &json!({}), None).unwrap_err();
        assert_eq!(err, StrategyError::Unknown("galaxy_brain".into()));
    }

    #[test]
    fn test_rule_based_requires_source() {
        let err = build("rule_based", &json!({}), None).unwrap_err();
        assert_eq!(err, StrategyError::MissingSource);
    }

    #[test]
    fn test_bad_probability_rejected() {
        let err = build("random", &json!({"cancel_probability": 1.5}), None).unwrap_err();
        assert!(matches!(err, StrategyError::Parameter { .. }));
    }

    #[test]
    fn test_negative_decimal_rejected() {
        let err = build("random", &json!({"max_order_value": -10}), None).unwrap_err();
        assert!(matches!(err, StrategyError::Parameter { .. }));
    }

    #[test]
    fn test_rule_based_compile_error_propagates() {
        let err = build("rule_based", &json!({}), Some(r#"{"name": "x", "rules": []}"#))
            .unwrap_err();
        assert!(matches!(
            err,
            StrategyError::Compile(dsl::CompileError::NoRules)
        ));
    }
}
