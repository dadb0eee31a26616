//! `deriv`: consume one unit of a query's tape
//!
//! Dispatch over the node tag. Each arm returns a lazy sequence of
//! `(matched token, successor)` steps; a wildcard query enumerates the
//! environment's active vocabulary. The join, negation, and tape-pairing
//! arms live in their own modules.

use super::build::*;
use super::{fail_deriv, join, matches, negation, no_derivs, one_deriv, Deriv, DerivIter, Expr, Node};
use crate::env::{Direction, Env};
use crate::error::GenError;
use crate::tape::{DerivToken, Query, QueryToken};

pub(super) fn deriv(expr: &Expr, query: &Query, env: &Env) -> DerivIter {
    env.note_deriv(expr.kind(), &query.tape);

    // End-of-tape probes are answered uniformly through delta
    if query.token == QueryToken::End {
        return match expr.delta(&query.tape, env) {
            Err(err) => fail_deriv(err),
            Ok(d) if d.is_null() => no_derivs(),
            Ok(d) => one_deriv(DerivToken::End, d),
        };
    }

    match expr.node() {
        Node::Epsilon | Node::Null | Node::Finished { .. } => no_derivs(),

        Node::Lit {
            tape,
            units,
            lo,
            hi,
        } => {
            if *tape != query.tape {
                return no_derivs();
            }
            let (unit, next) = match env.dir {
                Direction::Ltr => (
                    units[*lo].clone(),
                    lit_window(tape, units, lo + 1, *hi),
                ),
                Direction::Rtl => (
                    units[*hi - 1].clone(),
                    lit_window(tape, units, *lo, *hi - 1),
                ),
            };
            match &query.token {
                QueryToken::Unit(u) if *u == unit => one_deriv(DerivToken::Unit(unit), next),
                QueryToken::Unit(_) => no_derivs(),
                QueryToken::Any => one_deriv(DerivToken::Unit(unit), next),
                QueryToken::End => unreachable!("end probes handled above"),
            }
        }

        Node::Dot { tape } => wildcard_deriv(tape, query, env, epsilon),
        Node::DotStar { tape } => {
            let t = tape.clone();
            wildcard_deriv(tape, query, env, move || dot_star(t.clone()))
        }

        Node::Seq { first, second } => {
            // The scan direction decides which child leads
            let (lead, trail) = match env.dir {
                Direction::Ltr => (first.clone(), second.clone()),
                Direction::Rtl => (second.clone(), first.clone()),
            };
            let dir = env.dir;
            let rebuild = move |new_lead: Expr, new_trail: Expr| match dir {
                Direction::Ltr => seq(new_lead, new_trail),
                Direction::Rtl => seq(new_trail, new_lead),
            };

            let trail_a = trail.clone();
            let rebuild_a = rebuild;
            let first_branch: DerivIter = Box::new(lead.deriv(query, env).map(move |step| {
                let step = step?;
                Ok(Deriv::new(
                    step.token,
                    rebuild_a(step.next, trail_a.clone()),
                ))
            }));

            // The trailing child is reachable only when the lead is
            // nullable on the queried tape
            let second_branch: DerivIter = match lead.delta(&query.tape, env) {
                Err(err) => fail_deriv(err),
                Ok(dl) if dl.is_null() => no_derivs(),
                Ok(dl) => Box::new(trail.deriv(query, env).map(move |step| {
                    let step = step?;
                    Ok(Deriv::new(step.token, rebuild(dl.clone(), step.next)))
                })),
            };

            Box::new(env.rotate(vec![first_branch, second_branch]).flatten())
        }

        Node::Union { children } => {
            let mut steps = Vec::new();
            for child in env.rotate(children.clone()) {
                for step in child.deriv(query, env) {
                    match step {
                        Ok(step) => steps.push(step),
                        Err(err) => return fail_deriv(err),
                    }
                }
            }
            Box::new(disjoin(steps).into_iter().map(Ok))
        }

        Node::Join { .. } => join::deriv_join(expr, query, env),
        Node::Not { .. } => negation::deriv_not(expr, query, env),
        Node::Short { .. } => negation::deriv_short(expr, query, env),

        Node::Star { inner } => {
            let inner_star = expr.clone();
            Box::new(inner.deriv(query, env).map(move |step| {
                let step = step?;
                Ok(Deriv::new(step.token, seq(step.next, inner_star.clone())))
            }))
        }

        Node::Rename { inner, ext, int } => {
            if query.tape == *int {
                // The internal name is not visible from outside
                return no_derivs();
            }
            let (ext, int) = (ext.clone(), int.clone());
            let inner_query = if query.tape == ext {
                Query {
                    tape: int.clone(),
                    token: query.token.clone(),
                }
            } else {
                query.clone()
            };
            Box::new(inner.deriv(&inner_query, env).map(move |step| {
                let step = step?;
                Ok(Deriv::new(
                    step.token,
                    rename(step.next, ext.clone(), int.clone()),
                ))
            }))
        }

        Node::Match { .. } => matches::deriv_match(expr, query, env),
        Node::Correspond { .. } => matches::deriv_correspond(expr, query, env),
        Node::PreTape { .. } => matches::deriv_pre_tape(expr, query, env),

        Node::Embed { name, inner } => {
            if env.depth(name) >= env.max_recursion {
                // Bounded unfolding truncates runaway recursion silently
                return no_derivs();
            }
            let target = inner
                .clone()
                .or_else(|| env.lookup(name))
                .unwrap_or_else(epsilon);
            let deeper = env.with_deeper(name);
            let name = name.clone();
            Box::new(target.deriv(query, &deeper).map(move |step| {
                let step = step?;
                Ok(Deriv::new(step.token, embed_inner(&name, step.next)))
            }))
        }

        Node::Count {
            inner,
            tape,
            remaining,
        } => {
            if *tape != query.tape {
                let (tape, remaining) = (tape.clone(), *remaining);
                return Box::new(inner.deriv(query, env).map(move |step| {
                    let step = step?;
                    Ok(Deriv::new(
                        step.token,
                        count(step.next, tape.clone(), remaining),
                    ))
                }));
            }
            if *remaining == 0 {
                // Budget exhausted: prune the branch, or raise when strict
                if env.strict_length {
                    return fail_deriv(GenError::LengthBudgetExceeded {
                        tape: tape.clone(),
                        limit: 0,
                    });
                }
                return no_derivs();
            }
            let (tape, remaining) = (tape.clone(), *remaining);
            Box::new(inner.deriv(query, env).map(move |step| {
                let step = step?;
                let left = match step.token {
                    DerivToken::Unit(_) => remaining - 1,
                    _ => remaining,
                };
                Ok(Deriv::new(step.token, count(step.next, tape.clone(), left)))
            }))
        }

        Node::Cursor {
            tape,
            inner,
            vocab,
            output,
            greedy,
        } => {
            if *tape == query.tape {
                return fail_deriv(GenError::CursorTapeQueried { tape: tape.clone() });
            }
            let (tape, vocab, output, greedy) =
                (tape.clone(), vocab.clone(), output.clone(), *greedy);
            Box::new(inner.deriv(query, env).map(move |step| {
                let step = step?;
                Ok(Deriv::new(
                    step.token,
                    cursor_resume(
                        tape.clone(),
                        step.next,
                        vocab.clone(),
                        output.clone(),
                        greedy,
                    ),
                ))
            }))
        }

        Node::DoneTape {
            tape,
            output,
            inner,
        } => {
            if *tape == query.tape {
                return fail_deriv(GenError::FinalizedTapeQueried {
                    tape: tape.clone(),
                    node: expr.id(),
                });
            }
            let (tape, output) = (tape.clone(), output.clone());
            Box::new(inner.deriv(query, env).map(move |step| {
                let step = step?;
                Ok(Deriv::new(
                    step.token,
                    done_tape(tape.clone(), output.clone(), step.next),
                ))
            }))
        }
    }
}

/// Derivation of a wildcard node: a specific-unit query matches any
/// vocabulary unit, a wildcard query enumerates the whole vocabulary.
fn wildcard_deriv(
    tape: &str,
    query: &Query,
    env: &Env,
    next: impl Fn() -> Expr + 'static,
) -> DerivIter {
    if tape != query.tape {
        return no_derivs();
    }
    match &query.token {
        QueryToken::Unit(u) => {
            if env.vocab().contains(u) {
                one_deriv(DerivToken::Unit(u.clone()), next())
            } else {
                no_derivs()
            }
        }
        QueryToken::Any => {
            let units: Vec<String> = env.vocab().units.iter().cloned().collect();
            Box::new(
                env.rotate(units)
                    .map(move |u| Ok(Deriv::new(DerivToken::Unit(u), next()))),
            )
        }
        QueryToken::End => unreachable!("end probes handled in dispatch"),
    }
}

/// Merge derivation steps whose matched token is identical into one step
/// whose successor is the alternation of the originals.
///
/// This keeps the branching factor close to the size of the distinct
/// vocabulary rather than the number of original alternatives, and it is
/// required before negation and shortest-match, which assume disjoint
/// results. The first occurrence of each token keeps its position.
pub fn disjoin(steps: Vec<Deriv>) -> Vec<Deriv> {
    let mut order: Vec<DerivToken> = Vec::new();
    let mut groups: std::collections::BTreeMap<DerivToken, Vec<Expr>> =
        std::collections::BTreeMap::new();
    for step in steps {
        let entry = groups.entry(step.token.clone()).or_default();
        if entry.is_empty() {
            order.push(step.token.clone());
        }
        entry.push(step.next);
    }
    order
        .into_iter()
        .map(|token| {
            let nexts = groups.remove(&token).unwrap_or_default();
            Deriv::new(token, union(nexts))
        })
        .collect()
}
