//! The multi-tape expression algebra
//!
//! An [`Expr`] is the state of a lazily-built automaton over several named
//! tapes. Nodes are immutable once constructed and shared structurally
//! (`Rc`), so deriving one branch never disturbs its siblings. The three
//! operations of the algebra are:
//!
//! - [`delta`](Expr::delta): the residual language assuming one tape is
//!   exhausted here;
//! - [`deriv`](Expr::deriv): the ways to consume one unit of a query's tape,
//!   as a lazy sequence of `(matched token, successor)` steps;
//! - the smart constructors in [`build`], which are the only way to create
//!   non-leaf nodes and which apply local simplification on construction.
//!
//! Dispatch is an exhaustive `match` over the node tag rather than virtual
//! methods, so adding a variant is a compile-time, all-call-sites-checked
//! change.

pub mod build;
mod cursor;
mod delta;
mod deriv;
mod join;
mod matches;
mod negation;
mod replace;

pub use build::*;
pub use cursor::{forward, ForwardIter, Step};
pub use deriv::disjoin;
pub use replace::{replace, ReplaceShape};

use crate::env::Env;
use crate::error::GenError;
use crate::tape::{DerivToken, Query, Record};
use crate::vocab::Vocab;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// One derivation step: the matched token and the successor expression.
#[derive(Debug, Clone)]
pub struct Deriv {
    pub token: DerivToken,
    pub next: Expr,
}

impl Deriv {
    pub fn new(token: DerivToken, next: Expr) -> Self {
        Deriv { token, next }
    }
}

/// Lazy sequence of derivation steps.
///
/// Callers may consume one element, store the remainder, and resume later;
/// nothing beyond the consumed prefix has executed.
pub type DerivIter = Box<dyn Iterator<Item = Result<Deriv, GenError>>>;

/// Empty derivation sequence.
pub(crate) fn no_derivs() -> DerivIter {
    Box::new(std::iter::empty())
}

/// Single-step derivation sequence.
pub(crate) fn one_deriv(token: DerivToken, next: Expr) -> DerivIter {
    Box::new(std::iter::once(Ok(Deriv::new(token, next))))
}

/// Derivation sequence that fails immediately.
pub(crate) fn fail_deriv(err: GenError) -> DerivIter {
    Box::new(std::iter::once(Err(err)))
}

/// Tagged union of expression node kinds
#[derive(Debug)]
pub enum Node {
    /// The empty-string language (matches with no content on any tape).
    Epsilon,
    /// The empty language (matches nothing).
    Null,
    /// A pre-tokenized literal run on one tape; `lo..hi` is the remaining
    /// window into the unit vector, consumed from either end depending on
    /// the scan direction.
    Lit {
        tape: String,
        units: Rc<Vec<String>>,
        lo: usize,
        hi: usize,
    },
    /// One arbitrary unit of the active vocabulary on `tape`.
    Dot { tape: String },
    /// Zero or more arbitrary units on `tape` (the "rest of tape" pattern).
    DotStar { tape: String },
    /// Concatenation per tape.
    Seq { first: Expr, second: Expr },
    /// Alternation; children are kept deduplicated by textual identity.
    Union { children: Vec<Expr> },
    /// Intersection-like composition; operands carry their tape sets so
    /// queries on unshared tapes pass through untouched.
    Join {
        left: Expr,
        right: Expr,
        left_tapes: BTreeSet<String>,
        right_tapes: BTreeSet<String>,
    },
    /// Complement of `inner` within the declared vocabulary, on `tapes`.
    Not { inner: Expr, tapes: BTreeSet<String> },
    /// Prefix-free restriction: no member is a proper prefix of another.
    Short { inner: Expr },
    /// Unbounded repetition.
    Star { inner: Expr },
    /// Tape relabeling: externally `ext`, inside `inner` the tape is `int`.
    Rename { inner: Expr, ext: String, int: String },
    /// For every unit consumed on `from`, the identical literal is
    /// synthesized on `to`.
    Match { inner: Expr, from: String, to: String },
    /// Weak two-tape pairing used to track alignment without forcing
    /// literal identity.
    Correspond { inner: Expr, from: String, to: String },
    /// Lazy reference into the environment's symbol table. Once derived,
    /// the wrapper keeps its name around the unfolded successor so the
    /// recursion-depth budget keeps applying on later steps.
    Embed { name: String, inner: Option<Expr> },
    /// Remaining-length guard for one tape.
    Count {
        inner: Expr,
        tape: String,
        remaining: usize,
    },
    /// Scheduling wrapper committing the traversal to one tape; carries the
    /// tape's vocabulary and the output accumulated so far. A greedy cursor
    /// commits to its first candidate irrevocably.
    Cursor {
        tape: String,
        inner: Expr,
        vocab: Rc<Vocab>,
        output: String,
        greedy: bool,
    },
    /// Buffers tape `from` behind tape `to`: queries on `to` advance `from`
    /// internally, one unit at a time; external queries on `from` are a
    /// fatal logic error. The buffer holds `from`'s accumulated output.
    PreTape {
        inner: Expr,
        from: String,
        to: String,
        buffer: String,
    },
    /// Finished-tape marker: `tape` is closed with `output` attached while
    /// `inner` still has work on other tapes. Any further query on `tape`
    /// is refused.
    DoneTape {
        tape: String,
        output: String,
        inner: Expr,
    },
    /// Terminal leaf: every tape finished, record complete.
    Finished { record: Record },
}

/// Cheaply-clonable handle to an immutable expression node
#[derive(Debug, Clone)]
pub struct Expr(Rc<Node>);

impl Expr {
    pub(crate) fn raw(node: Node) -> Self {
        Expr(Rc::new(node))
    }

    pub fn node(&self) -> &Node {
        &self.0
    }

    /// Cheap node-kind label for diagnostics.
    pub(crate) fn kind(&self) -> &'static str {
        match self.node() {
            Node::Epsilon => "epsilon",
            Node::Null => "null",
            Node::Lit { .. } => "lit",
            Node::Dot { .. } => "dot",
            Node::DotStar { .. } => "dotstar",
            Node::Seq { .. } => "seq",
            Node::Union { .. } => "union",
            Node::Join { .. } => "join",
            Node::Not { .. } => "not",
            Node::Short { .. } => "short",
            Node::Star { .. } => "star",
            Node::Rename { .. } => "rename",
            Node::Match { .. } => "match",
            Node::Correspond { .. } => "correspond",
            Node::Embed { .. } => "embed",
            Node::Count { .. } => "count",
            Node::Cursor { .. } => "cursor",
            Node::PreTape { .. } => "pretape",
            Node::DoneTape { .. } => "donetape",
            Node::Finished { .. } => "finished",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    pub fn is_epsilon(&self) -> bool {
        matches!(self.node(), Node::Epsilon)
    }

    /// Residual language assuming `tape` is exhausted here.
    pub fn delta(&self, tape: &str, env: &Env) -> Result<Expr, GenError> {
        delta::delta(self, tape, env)
    }

    /// Lazy sequence of ways to consume one unit of the query's tape.
    pub fn deriv(&self, query: &Query, env: &Env) -> DerivIter {
        deriv::deriv(self, query, env)
    }

    /// Derived textual identity.
    ///
    /// Used only as a local deduplication key within one union/merge
    /// operation, not as a global hash-consing scheme. Approximate by
    /// design: distinct texts denote distinct branches, equal texts are
    /// merged.
    pub fn id(&self) -> String {
        match self.node() {
            Node::Epsilon => "\u{3b5}".to_string(),
            Node::Null => "\u{2205}".to_string(),
            Node::Lit {
                tape,
                units,
                lo,
                hi,
            } => format!("{}:{}", tape, units[*lo..*hi].join("")),
            Node::Dot { tape } => format!("{}:.", tape),
            Node::DotStar { tape } => format!("{}:.*", tape),
            Node::Seq { first, second } => format!("({}+{})", first.id(), second.id()),
            Node::Union { children } => {
                let ids: Vec<String> = children.iter().map(Expr::id).collect();
                format!("({})", ids.join("|"))
            }
            Node::Join { left, right, .. } => format!("({}&{})", left.id(), right.id()),
            Node::Not { inner, tapes } => {
                let tapes: Vec<&str> = tapes.iter().map(String::as_str).collect();
                format!("~[{}]({})", tapes.join(","), inner.id())
            }
            Node::Short { inner } => format!("short({})", inner.id()),
            Node::Star { inner } => format!("({})*", inner.id()),
            Node::Rename { inner, ext, int } => {
                format!("{}>{}({})", ext, int, inner.id())
            }
            Node::Match { inner, from, to } => {
                format!("match[{}>{}]({})", from, to, inner.id())
            }
            Node::Correspond { inner, from, to } => {
                format!("corr[{}~{}]({})", from, to, inner.id())
            }
            Node::Embed { name, inner } => match inner {
                None => format!("${}", name),
                Some(inner) => format!("${}({})", name, inner.id()),
            },
            Node::Count {
                inner,
                tape,
                remaining,
            } => format!("count[{}:{}]({})", tape, remaining, inner.id()),
            Node::Cursor {
                tape,
                inner,
                output,
                greedy,
                ..
            } => {
                let kind = if *greedy { "greedy" } else { "cursor" };
                format!("{}[{}={}]({})", kind, tape, output, inner.id())
            }
            Node::PreTape {
                inner,
                from,
                to,
                buffer,
            } => format!("pre[{}>{}={}]({})", from, to, buffer, inner.id()),
            Node::DoneTape {
                tape,
                output,
                inner,
            } => format!("done[{}={}]({})", tape, output, inner.id()),
            Node::Finished { record } => {
                let parts: Vec<String> = record
                    .0
                    .iter()
                    .map(|(t, s)| format!("{}={}", t, s))
                    .collect();
                format!("fin[{}]", parts.join(","))
            }
        }
    }
}

/// Merge a list of records' tape entries (used when a finished tape's
/// output joins an already-complete inner record).
pub(crate) fn record_with(record: &Record, tape: &str, output: &str) -> Record {
    let mut map: BTreeMap<String, String> = record.0.clone();
    if !crate::tape::is_hidden(tape) {
        map.insert(tape.to_string(), output.to_string());
    }
    Record(map)
}
