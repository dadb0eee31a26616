//! Execution environment threaded through every derivation
//!
//! The environment carries the symbol table for recursive references, the
//! per-name recursion-depth counters, the vocabulary active for the current
//! cursor's tape, the scan direction, and the randomization state. It is
//! immutable: every update goes through a `with_*` constructor that clones
//! the cheap `Rc` handles and replaces only the changed field, so sibling
//! branches of a derivation can never observe each other's state.

use crate::config::{GenConfig, VERBOSE_DERIV, VERBOSE_STATES, VERBOSE_STATS};
use crate::expr::Expr;
use crate::vocab::Vocab;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Scan direction for literals and sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ltr,
    Rtl,
}

/// Mutable-but-local counters for one generation run
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub derivs: u64,
    pub deltas: u64,
    pub emitted: u64,
}

/// Immutable execution environment (copy-on-write)
#[derive(Clone)]
pub struct Env {
    symbols: Rc<BTreeMap<String, Expr>>,
    depths: Rc<BTreeMap<String, usize>>,
    vocab: Rc<Vocab>,
    pub dir: Direction,
    pub random: bool,
    rng: Option<Rc<RefCell<StdRng>>>,
    pub max_recursion: usize,
    pub strict_length: bool,
    pub verbose: u8,
    stats: Rc<RefCell<Stats>>,
}

impl Env {
    /// Environment for one generation run, per the caller's configuration.
    pub fn new(config: &GenConfig) -> Self {
        let rng = config
            .seed
            .map(StdRng::seed_from_u64)
            .or_else(|| Some(StdRng::from_entropy()))
            .map(|r| Rc::new(RefCell::new(r)));
        Env {
            symbols: Rc::new(BTreeMap::new()),
            depths: Rc::new(BTreeMap::new()),
            vocab: Rc::new(Vocab::tokenized()),
            dir: if config.direction_ltr {
                Direction::Ltr
            } else {
                Direction::Rtl
            },
            random: false,
            rng,
            max_recursion: config.max_recursion,
            strict_length: config.strict_length,
            verbose: config.verbose,
            stats: Rc::new(RefCell::new(Stats::default())),
        }
    }

    /// Replace the symbol table.
    pub fn with_symbols(&self, symbols: BTreeMap<String, Expr>) -> Env {
        let mut env = self.clone();
        env.symbols = Rc::new(symbols);
        env
    }

    /// Replace the active vocabulary (done by a cursor as it takes over).
    pub fn with_vocab(&self, vocab: Rc<Vocab>) -> Env {
        let mut env = self.clone();
        env.vocab = vocab;
        env
    }

    /// Enable or disable randomized enumeration.
    pub fn with_random(&self, random: bool) -> Env {
        let mut env = self.clone();
        env.random = random;
        env
    }

    /// Increment the recursion depth recorded for `name`.
    ///
    /// Depth counters are monotone: they are never decremented, only
    /// compared against the budget.
    pub fn with_deeper(&self, name: &str) -> Env {
        let mut depths = (*self.depths).clone();
        *depths.entry(name.to_string()).or_insert(0) += 1;
        let mut env = self.clone();
        env.depths = Rc::new(depths);
        env
    }

    /// Expression bound to `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Expr> {
        self.symbols.get(name).cloned()
    }

    /// Recursion depth recorded for `name`.
    pub fn depth(&self, name: &str) -> usize {
        self.depths.get(name).copied().unwrap_or(0)
    }

    /// The vocabulary of the currently active cursor's tape.
    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    /// Shared handle to the active vocabulary.
    pub fn vocab_rc(&self) -> Rc<Vocab> {
        Rc::clone(&self.vocab)
    }

    /// Iterate `items` in rotated order: begin at a pseudo-random index and
    /// wrap around, preserving every element's relative order. Identity
    /// order when randomization is off. This approximates random sampling
    /// without biasing toward the first-declared alternative; it is not a
    /// uniform distribution.
    pub fn rotate<T>(&self, mut items: Vec<T>) -> std::vec::IntoIter<T> {
        if self.random && items.len() > 1 {
            if let Some(rng) = &self.rng {
                let k = rng.borrow_mut().gen_range(0..items.len());
                items.rotate_left(k);
            }
        }
        items.into_iter()
    }

    /// Record one derivation step.
    pub fn note_deriv(&self, node: &str, tape: &str) {
        self.stats.borrow_mut().derivs += 1;
        if self.verbose & VERBOSE_DERIV != 0 {
            tracing::trace!(target: "weft::deriv", tape, node, "deriv");
        }
    }

    /// Record one delta evaluation.
    pub fn note_delta(&self, tape: &str) {
        self.stats.borrow_mut().deltas += 1;
        if self.verbose & VERBOSE_DERIV != 0 {
            tracing::trace!(target: "weft::deriv", tape, "delta");
        }
    }

    /// Record one emitted record.
    pub fn note_emit(&self) {
        self.stats.borrow_mut().emitted += 1;
        if self.verbose & VERBOSE_STATES != 0 {
            tracing::debug!(target: "weft::engine", "record emitted");
        }
    }

    /// Snapshot of the run counters.
    pub fn stats(&self) -> Stats {
        self.stats.borrow().clone()
    }

    /// Log the statistics summary if the stats channel is enabled.
    pub fn log_stats(&self) {
        if self.verbose & VERBOSE_STATS != 0 {
            let s = self.stats.borrow();
            tracing::debug!(
                target: "weft::stats",
                derivs = s.derivs,
                deltas = s.deltas,
                emitted = s.emitted,
                "generation finished"
            );
        }
    }
}
