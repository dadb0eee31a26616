//! Generation configuration
//!
//! Options recognized by the core, supplied by the caller (the grammar
//! compiler and CLI layers live outside this crate). The configuration is
//! serde round-trippable so callers can hand it over as JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Verbosity bit: log engine states as they are expanded.
pub const VERBOSE_STATES: u8 = 1;
/// Verbosity bit: log individual derivations.
pub const VERBOSE_DERIV: u8 = 2;
/// Verbosity bit: log a statistics summary when a generation run finishes.
pub const VERBOSE_STATS: u8 = 4;

/// Character ceiling for the length guard: one budget for every tape, or a
/// per-tape map (tapes absent from the map get the default budget).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxChars {
    All(usize),
    PerTape(BTreeMap<String, usize>),
}

impl MaxChars {
    /// Budget for one tape.
    pub fn for_tape(&self, tape: &str) -> usize {
        match self {
            MaxChars::All(n) => *n,
            MaxChars::PerTape(map) => map.get(tape).copied().unwrap_or(DEFAULT_MAX_CHARS),
        }
    }
}

impl Default for MaxChars {
    fn default() -> Self {
        MaxChars::All(DEFAULT_MAX_CHARS)
    }
}

/// Default character budget per tape.
pub const DEFAULT_MAX_CHARS: usize = 100;
/// Default recursion-depth budget per symbol name.
pub const DEFAULT_MAX_RECURSION: usize = 4;

/// Options controlling derivation and generation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenConfig {
    /// Literal-scan and sequence-evaluation order.
    pub direction_ltr: bool,
    /// Recursion-depth budget for named references.
    pub max_recursion: usize,
    /// Length-guard ceiling.
    pub max_chars: MaxChars,
    /// Explicit override of the computed tape scheduling order.
    pub priority: Vec<String>,
    /// Treat single-tape literal runs as atomic units when provably safe.
    pub optimize_atomicity: bool,
    /// Diagnostic logging channels (VERBOSE_* bits).
    pub verbose: u8,
    /// Seed for reproducible randomized enumeration.
    pub seed: Option<u64>,
    /// Raise on length-budget exhaustion instead of pruning the branch.
    pub strict_length: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            direction_ltr: true,
            max_recursion: DEFAULT_MAX_RECURSION,
            max_chars: MaxChars::default(),
            priority: Vec::new(),
            optimize_atomicity: false,
            verbose: 0,
            seed: None,
            strict_length: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trips_through_json() {
        let mut config = GenConfig {
            max_recursion: 7,
            seed: Some(42),
            ..GenConfig::default()
        };
        config.priority = vec!["text".to_string(), "gloss".to_string()];

        let json = serde_json::to_string(&config).unwrap();
        let back: GenConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_per_tape_budgets_fall_back_to_default() {
        let mut map = BTreeMap::new();
        map.insert("text".to_string(), 12);
        let max = MaxChars::PerTape(map);
        assert_eq!(max.for_tape("text"), 12);
        assert_eq!(max.for_tape("gloss"), DEFAULT_MAX_CHARS);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let config: GenConfig = serde_json::from_str(r#"{"max_recursion": 2}"#).unwrap();
        assert_eq!(config.max_recursion, 2);
        assert!(config.direction_ltr);
        assert_eq!(config.max_chars, MaxChars::All(DEFAULT_MAX_CHARS));
    }
}
