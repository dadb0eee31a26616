//! Per-tape vocabularies and unit segmentation
//!
//! Every literal and wildcard operates over a tape's vocabulary of units.
//! A tokenized vocabulary decomposes text into grapheme clusters, so
//! multi-codepoint graphemes always match atomically; an atomic vocabulary
//! treats each literal string as a single indivisible unit.

use std::collections::{BTreeMap, BTreeSet};
use unicode_segmentation::UnicodeSegmentation;

/// Split text into grapheme-cluster units.
pub fn graphemes(text: &str) -> Vec<String> {
    text.graphemes(true).map(str::to_string).collect()
}

/// The unit inventory and granularity of one tape
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocab {
    pub units: BTreeSet<String>,
    pub atomic: bool,
}

impl Vocab {
    /// Empty tokenized vocabulary.
    pub fn tokenized() -> Self {
        Vocab {
            units: BTreeSet::new(),
            atomic: false,
        }
    }

    /// Empty atomic vocabulary.
    pub fn atomic() -> Self {
        Vocab {
            units: BTreeSet::new(),
            atomic: true,
        }
    }

    /// Add the units of `text` to the inventory, at this vocabulary's
    /// granularity.
    pub fn absorb(&mut self, text: &str) {
        for unit in self.tokenize(text) {
            self.units.insert(unit);
        }
    }

    /// Merge another vocabulary's units into this one.
    pub fn merge(&mut self, other: &Vocab) {
        for unit in &other.units {
            self.units.insert(unit.clone());
        }
    }

    /// Segment `text` into units: grapheme clusters when tokenized, the
    /// whole string as one unit when atomic.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            Vec::new()
        } else if self.atomic {
            vec![text.to_string()]
        } else {
            graphemes(text)
        }
    }

    /// Whether `unit` belongs to the declared inventory.
    pub fn contains(&self, unit: &str) -> bool {
        self.units.contains(unit)
    }
}

/// Vocabularies for every tape of a grammar
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VocabMap(pub BTreeMap<String, Vocab>);

impl VocabMap {
    /// Empty map.
    pub fn new() -> Self {
        VocabMap(BTreeMap::new())
    }

    /// Vocabulary for `tape`, creating an empty tokenized one on demand.
    pub fn entry(&mut self, tape: &str) -> &mut Vocab {
        self.0.entry(tape.to_string()).or_default()
    }

    /// Vocabulary for `tape`, if any literal mentioned it.
    pub fn get(&self, tape: &str) -> Option<&Vocab> {
        self.0.get(tape)
    }
}
