//! Tape queries, derivation tokens, and output records
//!
//! Tapes are identified purely by name; there is no persistent tape object.
//! A [`Query`] asks an expression to consume one unit on a named tape, and a
//! [`DerivToken`] reports what was actually matched. A [`Record`] is one
//! fully-resolved generation result: tape name to output string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix marking a tape name as implementation-internal.
///
/// Hidden tapes are still scheduled and derived like any other tape, but
/// their output is stripped from emitted records.
pub const HIDDEN_PREFIX: &str = ".";

/// Return true if a tape name is implementation-internal.
pub fn is_hidden(tape: &str) -> bool {
    tape.starts_with(HIDDEN_PREFIX)
}

/// What a query asks for on its tape
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryToken {
    /// Match one specific unit.
    Unit(String),
    /// Match any one unit of the active vocabulary.
    Any,
    /// Probe whether the tape can end here.
    End,
}

/// A request to consume one unit on a named tape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub tape: String,
    pub token: QueryToken,
}

impl Query {
    /// Query for one specific unit on `tape`.
    pub fn unit(tape: impl Into<String>, unit: impl Into<String>) -> Self {
        Query {
            tape: tape.into(),
            token: QueryToken::Unit(unit.into()),
        }
    }

    /// Wildcard query over the active vocabulary of `tape`.
    pub fn any(tape: impl Into<String>) -> Self {
        Query {
            tape: tape.into(),
            token: QueryToken::Any,
        }
    }

    /// End-of-tape probe for `tape`.
    pub fn end(tape: impl Into<String>) -> Self {
        Query {
            tape: tape.into(),
            token: QueryToken::End,
        }
    }
}

/// The matched side of one derivation step
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum DerivToken {
    /// One concrete unit was consumed.
    Unit(String),
    /// The tape ended (zero-width, produced by end-of-tape probes).
    End,
}

impl DerivToken {
    /// The consumed unit, if this step consumed one.
    pub fn unit(&self) -> Option<&str> {
        match self {
            DerivToken::Unit(u) => Some(u),
            _ => None,
        }
    }
}

/// One generation result: tape name to fully-resolved output string
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record(pub BTreeMap<String, String>);

impl Record {
    /// Empty record.
    pub fn new() -> Self {
        Record(BTreeMap::new())
    }

    /// Record with a single tape entry.
    pub fn with(tape: impl Into<String>, text: impl Into<String>) -> Self {
        let mut map = BTreeMap::new();
        map.insert(tape.into(), text.into());
        Record(map)
    }

    /// Output string for `tape`, if present.
    pub fn get(&self, tape: &str) -> Option<&str> {
        self.0.get(tape).map(String::as_str)
    }

    /// Insert a tape's output unless the tape is hidden.
    pub fn insert_visible(&mut self, tape: &str, text: String) {
        if !is_hidden(tape) {
            self.0.insert(tape.to_string(), text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_tapes_are_stripped_from_records() {
        let mut record = Record::new();
        record.insert_visible("text", "foo".to_string());
        record.insert_visible(".H0", "internal".to_string());
        assert_eq!(record.get("text"), Some("foo"));
        assert_eq!(record.get(".H0"), None);
    }

    #[test]
    fn test_record_serializes_as_plain_map() {
        let record = Record::with("text", "foobar");
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"text":"foobar"}"#);
    }
}
