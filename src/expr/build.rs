//! Smart constructors for expression nodes
//!
//! These are the only way to build non-leaf nodes. Each constructor applies
//! the local algebraic rewrites immediately (Null absorption, Epsilon
//! elimination, union flattening and dedup, star collapse), so the
//! annihilation invariants hold everywhere without a separate simplify
//! pass, and tree growth stays bounded during derivation.

use super::{record_with, Expr, Node};
use crate::tape::Record;
use crate::vocab::Vocab;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The empty-string language.
pub fn epsilon() -> Expr {
    Expr::raw(Node::Epsilon)
}

/// The empty language.
pub fn null() -> Expr {
    Expr::raw(Node::Null)
}

/// Terminal leaf carrying a complete record.
pub fn finished(record: Record) -> Expr {
    Expr::raw(Node::Finished { record })
}

/// Literal run of pre-tokenized units on one tape.
pub fn lit(tape: impl Into<String>, units: Vec<String>) -> Expr {
    if units.is_empty() {
        return epsilon();
    }
    let hi = units.len();
    Expr::raw(Node::Lit {
        tape: tape.into(),
        units: Rc::new(units),
        lo: 0,
        hi,
    })
}

/// Literal with an advanced window (successor of a literal derivation).
pub(crate) fn lit_window(tape: &str, units: &Rc<Vec<String>>, lo: usize, hi: usize) -> Expr {
    if lo >= hi {
        return epsilon();
    }
    Expr::raw(Node::Lit {
        tape: tape.to_string(),
        units: Rc::clone(units),
        lo,
        hi,
    })
}

/// One arbitrary vocabulary unit on `tape`.
pub fn dot(tape: impl Into<String>) -> Expr {
    Expr::raw(Node::Dot { tape: tape.into() })
}

/// Zero or more arbitrary vocabulary units on `tape`.
pub fn dot_star(tape: impl Into<String>) -> Expr {
    Expr::raw(Node::DotStar { tape: tape.into() })
}

/// Concatenation (per tape) of two expressions.
pub fn seq(first: Expr, second: Expr) -> Expr {
    if first.is_null() || second.is_null() {
        return null();
    }
    if first.is_epsilon() {
        return second;
    }
    if second.is_epsilon() {
        return first;
    }
    Expr::raw(Node::Seq { first, second })
}

/// Concatenation of a list, folded to the right.
pub fn seq_all(items: Vec<Expr>) -> Expr {
    items
        .into_iter()
        .rev()
        .fold(epsilon(), |acc, item| seq(item, acc))
}

/// Alternation. Flattens nested unions, drops impossible children, and
/// deduplicates by textual identity.
pub fn union(children: Vec<Expr>) -> Expr {
    let mut flat = Vec::new();
    for child in children {
        match child.node() {
            Node::Null => {}
            Node::Union { children } => flat.extend(children.iter().cloned()),
            _ => flat.push(child),
        }
    }
    let mut seen = BTreeSet::new();
    flat.retain(|child| seen.insert(child.id()));
    match flat.len() {
        0 => null(),
        1 => flat.into_iter().next().unwrap_or_else(null),
        _ => Expr::raw(Node::Union { children: flat }),
    }
}

/// Intersection-like composition of two expressions with known tape sets.
pub fn join(
    left: Expr,
    right: Expr,
    left_tapes: BTreeSet<String>,
    right_tapes: BTreeSet<String>,
) -> Expr {
    if left.is_null() || right.is_null() {
        return null();
    }
    if left.is_epsilon() {
        return right;
    }
    if right.is_epsilon() {
        return left;
    }
    Expr::raw(Node::Join {
        left,
        right,
        left_tapes,
        right_tapes,
    })
}

/// Unconstrained repetition over every tape of a set.
pub fn universe(tapes: &BTreeSet<String>) -> Expr {
    seq_all(tapes.iter().map(|t| dot_star(t.clone())).collect())
}

/// Complement of `inner` within the declared vocabulary, on `tapes`.
pub fn not(inner: Expr, tapes: BTreeSet<String>) -> Expr {
    if inner.is_null() {
        return universe(&tapes);
    }
    if inner.is_epsilon() {
        // Complement of the empty string: at least one unit somewhere
        let branches = tapes
            .iter()
            .map(|t| {
                let others: BTreeSet<String> =
                    tapes.iter().filter(|o| *o != t).cloned().collect();
                seq(seq(dot(t.clone()), dot_star(t.clone())), universe(&others))
            })
            .collect();
        return union(branches);
    }
    Expr::raw(Node::Not { inner, tapes })
}

/// Prefix-free restriction of `inner`.
pub fn short(inner: Expr) -> Expr {
    if inner.is_null() || inner.is_epsilon() {
        return inner;
    }
    Expr::raw(Node::Short { inner })
}

/// Unbounded repetition.
pub fn star(inner: Expr) -> Expr {
    if inner.is_null() || inner.is_epsilon() {
        return epsilon();
    }
    if matches!(inner.node(), Node::Star { .. } | Node::DotStar { .. }) {
        return inner;
    }
    Expr::raw(Node::Star { inner })
}

/// Bounded repetition `{min, max}` (`max = None` is unbounded), unfolded
/// recursively into sequence and star. An all-wildcard repetition collapses
/// to a single wildcard-run node instead of unfolding.
pub fn repeat(inner: Expr, min: usize, max: Option<usize>) -> Expr {
    if let Some(m) = max {
        if m < min {
            return null();
        }
    }
    // Collapse Dot{0,∞} straight to the wildcard run
    if let Node::Dot { tape } = inner.node() {
        if min == 0 && max.is_none() {
            return dot_star(tape.clone());
        }
    }
    let mut parts: Vec<Expr> = (0..min).map(|_| inner.clone()).collect();
    let tail = match max {
        None => star(inner),
        Some(m) => (0..m - min).fold(epsilon(), |acc, _| {
            union(vec![epsilon(), seq(inner.clone(), acc)])
        }),
    };
    parts.push(tail);
    seq_all(parts)
}

/// Relabel a tape: externally `ext`, inside `inner` the name is `int`.
pub fn rename(inner: Expr, ext: impl Into<String>, int: impl Into<String>) -> Expr {
    let ext = ext.into();
    let int = int.into();
    if ext == int || inner.is_null() || inner.is_epsilon() {
        return inner;
    }
    Expr::raw(Node::Rename { inner, ext, int })
}

static HIDDEN_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Relabel `tape` to a fresh implementation-internal name.
pub fn hide(inner: Expr, tape: impl Into<String>) -> (Expr, String) {
    let name = format!(
        "{}H{}",
        crate::tape::HIDDEN_PREFIX,
        HIDDEN_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    (rename(inner, name.clone(), tape), name)
}

/// Tape-identity pairing: `inner` is derived on `from` and every consumed
/// unit is synthesized as a literal on `to`.
pub fn matches(inner: Expr, from: impl Into<String>, to: impl Into<String>) -> Expr {
    if inner.is_null() || inner.is_epsilon() {
        return inner;
    }
    Expr::raw(Node::Match {
        inner,
        from: from.into(),
        to: to.into(),
    })
}

/// Weak alignment pairing between two tapes.
pub fn correspond(inner: Expr, from: impl Into<String>, to: impl Into<String>) -> Expr {
    if inner.is_null() || inner.is_epsilon() {
        return inner;
    }
    Expr::raw(Node::Correspond {
        inner,
        from: from.into(),
        to: to.into(),
    })
}

/// Lazy reference to a named expression in the environment's symbol table.
pub fn embed(name: impl Into<String>) -> Expr {
    Expr::raw(Node::Embed {
        name: name.into(),
        inner: None,
    })
}

/// Reference wrapper around an already-unfolded successor; keeps the name
/// so the recursion budget continues to apply.
pub(crate) fn embed_inner(name: &str, inner: Expr) -> Expr {
    if inner.is_null() || inner.is_epsilon() || matches!(inner.node(), Node::Finished { .. }) {
        return inner;
    }
    Expr::raw(Node::Embed {
        name: name.to_string(),
        inner: Some(inner),
    })
}

/// Remaining-length guard for one tape.
pub fn count(inner: Expr, tape: impl Into<String>, remaining: usize) -> Expr {
    if inner.is_null() || inner.is_epsilon() {
        return inner;
    }
    Expr::raw(Node::Count {
        inner,
        tape: tape.into(),
        remaining,
    })
}

/// Backtracking scheduling wrapper for one tape.
pub fn cursor(tape: impl Into<String>, inner: Expr, vocab: Rc<Vocab>) -> Expr {
    cursor_resume(tape.into(), inner, vocab, String::new(), false)
}

/// Non-backtracking scheduling wrapper; valid only when the tape is
/// statically known to be finite.
pub fn greedy_cursor(tape: impl Into<String>, inner: Expr, vocab: Rc<Vocab>) -> Expr {
    cursor_resume(tape.into(), inner, vocab, String::new(), true)
}

pub(crate) fn cursor_resume(
    tape: String,
    inner: Expr,
    vocab: Rc<Vocab>,
    output: String,
    greedy: bool,
) -> Expr {
    if inner.is_null() {
        return null();
    }
    Expr::raw(Node::Cursor {
        tape,
        inner,
        vocab,
        output,
        greedy,
    })
}

/// Buffer tape `from` behind tape `to`.
pub fn pre_tape(inner: Expr, from: impl Into<String>, to: impl Into<String>) -> Expr {
    pre_tape_resume(inner, from.into(), to.into(), String::new())
}

pub(crate) fn pre_tape_resume(inner: Expr, from: String, to: String, buffer: String) -> Expr {
    if inner.is_null() {
        return null();
    }
    if inner.is_epsilon() || matches!(inner.node(), Node::Finished { .. }) {
        return done_tape(from, buffer, inner);
    }
    Expr::raw(Node::PreTape {
        inner,
        from,
        to,
        buffer,
    })
}

/// Finished-tape marker: `tape` is closed with `output` attached.
pub fn done_tape(tape: impl Into<String>, output: String, inner: Expr) -> Expr {
    let tape = tape.into();
    if inner.is_null() {
        return null();
    }
    match inner.node() {
        Node::Epsilon => {
            let mut record = Record::new();
            record.insert_visible(&tape, output);
            finished(record)
        }
        Node::Finished { record } => finished(record_with(record, &tape, &output)),
        _ => Expr::raw(Node::DoneTape {
            tape,
            output,
            inner,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::graphemes;

    #[test]
    fn test_null_annihilates_sequence() {
        assert!(seq(lit("t", graphemes("ab")), null()).is_null());
        assert!(seq(null(), lit("t", graphemes("ab"))).is_null());
    }

    #[test]
    fn test_epsilon_is_eliminated_from_sequence() {
        let ab = lit("t", graphemes("ab"));
        assert_eq!(seq(epsilon(), ab.clone()).id(), ab.id());
        assert_eq!(seq(ab.clone(), epsilon()).id(), ab.id());
    }

    #[test]
    fn test_empty_literal_is_epsilon() {
        assert!(lit("t", Vec::new()).is_epsilon());
    }

    #[test]
    fn test_union_flattens_dedups_and_drops_null() {
        let a = lit("t", graphemes("a"));
        let b = lit("t", graphemes("b"));
        let u = union(vec![
            a.clone(),
            null(),
            union(vec![b.clone(), a.clone()]),
        ]);
        match u.node() {
            Node::Union { children } => assert_eq!(children.len(), 2),
            other => panic!("expected union, got {:?}", other),
        }
        assert!(union(Vec::new()).is_null());
        assert_eq!(union(vec![a.clone()]).id(), a.id());
    }

    #[test]
    fn test_star_collapses() {
        assert!(star(null()).is_epsilon());
        assert!(star(epsilon()).is_epsilon());
        let s = star(lit("t", graphemes("a")));
        assert_eq!(star(s.clone()).id(), s.id());
    }

    #[test]
    fn test_wildcard_repeat_collapses_to_run() {
        let r = repeat(dot("t"), 0, None);
        assert!(matches!(r.node(), Node::DotStar { .. }));
    }

    #[test]
    fn test_repeat_with_inverted_bounds_is_null() {
        assert!(repeat(dot("t"), 3, Some(2)).is_null());
    }

    #[test]
    fn test_not_of_null_is_the_universe() {
        let tapes: std::collections::BTreeSet<String> =
            std::iter::once("t".to_string()).collect();
        let u = not(null(), tapes);
        assert!(matches!(u.node(), Node::DotStar { .. }));
    }

    #[test]
    fn test_hide_generates_internal_names() {
        let (expr, name) = hide(lit("t", graphemes("a")), "t");
        assert!(crate::tape::is_hidden(&name));
        assert!(matches!(expr.node(), Node::Rename { .. }));
    }

    #[test]
    fn test_done_tape_over_epsilon_finishes() {
        let fin = done_tape("t", "abc".to_string(), epsilon());
        match fin.node() {
            Node::Finished { record } => assert_eq!(record.get("t"), Some("abc")),
            other => panic!("expected finished, got {:?}", other),
        }
    }
}
