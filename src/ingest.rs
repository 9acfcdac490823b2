//! Strategy-record normalization.
//!
//! Strategy definitions arrive as loosely-shaped JSON objects whose field
//! names drifted across several config generations ("ticker" / "Ticker" /
//! "TICKER", "SHORT_WINDOW" / "Window Short" / "Short Window", ...). Each
//! logical field has one ordered candidate-key table, consulted once here at
//! ingestion; the rest of the crate only ever sees the canonical
//! `StrategyRecord`.

use serde_json::Value;
use thiserror::Error;

use crate::domain::ParameterCombination;

/// Candidate keys per logical field, in priority order.
const TICKER_KEYS: &[&str] = &["ticker", "Ticker", "TICKER", "symbol", "Symbol", "SYMBOL"];
const STRATEGY_TYPE_KEYS: &[&str] = &[
    "strategy_type",
    "Strategy Type",
    "STRATEGY_TYPE",
    "strategy",
    "Strategy",
    "type",
];
const SHORT_KEYS: &[&str] = &[
    "short_window",
    "SHORT_WINDOW",
    "Short Window",
    "Window Short",
    "fast_period",
    "fast",
    "short",
];
const LONG_KEYS: &[&str] = &[
    "long_window",
    "LONG_WINDOW",
    "Long Window",
    "Window Long",
    "slow_period",
    "slow",
    "long",
];
const SIGNAL_KEYS: &[&str] = &[
    "signal_window",
    "SIGNAL_WINDOW",
    "Signal Window",
    "signal_period",
    "signal",
];

/// Defaults for non-mandatory fields missing from a record.
const DEFAULT_TICKER: &str = "UNKNOWN";
const DEFAULT_SHORT: u32 = 20;
const DEFAULT_LONG: u32 = 50;

/// Errors from record normalization. These are configuration errors: the
/// orchestrator raises them before scheduling any work.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("strategy record {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("strategy record {index} is missing a strategy type")]
    MissingStrategyType { index: usize },
}

/// A strategy definition in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRecord {
    pub ticker: String,
    pub strategy_type: String,
    pub short_window: u32,
    pub long_window: u32,
    pub signal_window: Option<u32>,
    /// The original record, passed through to the performance evaluator.
    pub raw: Value,
}

impl StrategyRecord {
    /// Canonical identity key: `{ticker}_{strategy_type}_{fast}_{slow}_{signal_or_0}`.
    pub fn canonical_key(&self) -> String {
        format!(
            "{}_{}_{}_{}_{}",
            self.ticker,
            self.strategy_type,
            self.short_window,
            self.long_window,
            self.signal_window.unwrap_or(0)
        )
    }

    /// The declared parameter combination.
    pub fn combination(&self) -> ParameterCombination {
        ParameterCombination {
            fast: self.short_window,
            slow: self.long_window,
            signal: self.signal_window,
        }
    }
}

/// Normalize one raw strategy record.
///
/// The strategy type is mandatory; everything else falls back to defaults
/// (ticker `"UNKNOWN"`, windows 20/50, no signal period). Numeric fields
/// accept JSON numbers or numeric strings — the historical configs mixed
/// both.
pub fn normalize_strategy_record(
    record: &Value,
    index: usize,
) -> Result<StrategyRecord, IngestError> {
    if !record.is_object() {
        return Err(IngestError::NotAnObject { index });
    }

    let strategy_type = lookup_string(record, STRATEGY_TYPE_KEYS)
        .ok_or(IngestError::MissingStrategyType { index })?;

    Ok(StrategyRecord {
        ticker: lookup_string(record, TICKER_KEYS).unwrap_or_else(|| DEFAULT_TICKER.to_string()),
        strategy_type,
        short_window: lookup_u32(record, SHORT_KEYS).unwrap_or(DEFAULT_SHORT),
        long_window: lookup_u32(record, LONG_KEYS).unwrap_or(DEFAULT_LONG),
        signal_window: lookup_u32(record, SIGNAL_KEYS),
        raw: record.clone(),
    })
}

fn lookup<'a>(record: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| record.get(key))
}

fn lookup_string(record: &Value, keys: &[&str]) -> Option<String> {
    let value = lookup(record, keys)?;
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

fn lookup_u32(record: &Value, keys: &[&str]) -> Option<u32> {
    let value = lookup(record, keys)?;
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .map(|n| n as u32),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_snake_case_record() {
        let record = json!({
            "ticker": "AAPL",
            "strategy_type": "sma_crossover",
            "short_window": 10,
            "long_window": 50,
        });
        let normalized = normalize_strategy_record(&record, 0).unwrap();
        assert_eq!(normalized.ticker, "AAPL");
        assert_eq!(normalized.strategy_type, "sma_crossover");
        assert_eq!(normalized.short_window, 10);
        assert_eq!(normalized.long_window, 50);
        assert_eq!(normalized.signal_window, None);
        assert_eq!(normalized.canonical_key(), "AAPL_sma_crossover_10_50_0");
    }

    #[test]
    fn normalizes_legacy_spaced_keys() {
        let record = json!({
            "Ticker": "MSFT",
            "Strategy Type": "macd",
            "Short Window": 12,
            "Long Window": 26,
            "Signal Window": 9,
        });
        let normalized = normalize_strategy_record(&record, 0).unwrap();
        assert_eq!(normalized.ticker, "MSFT");
        assert_eq!(normalized.signal_window, Some(9));
        assert_eq!(normalized.canonical_key(), "MSFT_macd_12_26_9");
    }

    #[test]
    fn normalizes_screaming_keys_and_string_numbers() {
        let record = json!({
            "TICKER": "SPY",
            "STRATEGY_TYPE": "ema_crossover",
            "SHORT_WINDOW": "15",
            "LONG_WINDOW": "45",
        });
        let normalized = normalize_strategy_record(&record, 0).unwrap();
        assert_eq!(normalized.ticker, "SPY");
        assert_eq!(normalized.short_window, 15);
        assert_eq!(normalized.long_window, 45);
    }

    #[test]
    fn missing_strategy_type_is_an_error() {
        let record = json!({ "ticker": "AAPL", "short_window": 10 });
        let err = normalize_strategy_record(&record, 3).unwrap_err();
        assert!(matches!(err, IngestError::MissingStrategyType { index: 3 }));
    }

    #[test]
    fn non_object_record_is_an_error() {
        let err = normalize_strategy_record(&json!([1, 2, 3]), 1).unwrap_err();
        assert!(matches!(err, IngestError::NotAnObject { index: 1 }));
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let record = json!({ "strategy_type": "sma_crossover" });
        let normalized = normalize_strategy_record(&record, 0).unwrap();
        assert_eq!(normalized.ticker, "UNKNOWN");
        assert_eq!(normalized.short_window, 20);
        assert_eq!(normalized.long_window, 50);
    }

    #[test]
    fn candidate_keys_respect_priority_order() {
        // Both spellings present: the earlier table entry wins.
        let record = json!({
            "strategy_type": "sma_crossover",
            "short_window": 10,
            "fast": 99,
        });
        let normalized = normalize_strategy_record(&record, 0).unwrap();
        assert_eq!(normalized.short_window, 10);
    }

    #[test]
    fn combination_carries_signal() {
        let record = json!({
            "ticker": "X",
            "strategy_type": "macd",
            "fast": 12,
            "slow": 26,
            "signal": 9,
        });
        let normalized = normalize_strategy_record(&record, 0).unwrap();
        assert_eq!(
            normalized.combination(),
            ParameterCombination::with_signal(12, 26, 9)
        );
    }
}
