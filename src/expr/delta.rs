//! `delta`: the derivative with respect to end-of-tape
//!
//! `delta(expr, tape)` is the language of `expr` restricted to strings
//! whose `tape` component is empty, with that component removed: "this
//! language assuming `tape` is exhausted here". It is side-effect-free and
//! called at most once per tape per node in a correct traversal.

use super::build::*;
use super::{Expr, Node};
use crate::env::Env;
use crate::error::GenError;

pub(super) fn delta(expr: &Expr, tape: &str, env: &Env) -> Result<Expr, GenError> {
    env.note_delta(tape);
    match expr.node() {
        Node::Epsilon | Node::Finished { .. } => Ok(expr.clone()),
        Node::Null => Ok(null()),

        // A literal on another tape has an empty component on `tape`
        Node::Lit { tape: t, .. } => {
            if t == tape {
                Ok(null())
            } else {
                Ok(expr.clone())
            }
        }
        Node::Dot { tape: t } => {
            if t == tape {
                Ok(null())
            } else {
                Ok(expr.clone())
            }
        }
        Node::DotStar { tape: t } => {
            if t == tape {
                Ok(epsilon())
            } else {
                Ok(expr.clone())
            }
        }

        Node::Seq { first, second } => {
            Ok(seq(delta(first, tape, env)?, delta(second, tape, env)?))
        }
        Node::Union { children } => {
            let mut deltas = Vec::with_capacity(children.len());
            for child in children {
                deltas.push(delta(child, tape, env)?);
            }
            Ok(union(deltas))
        }
        Node::Join {
            left,
            right,
            left_tapes,
            right_tapes,
        } => {
            let l = if left_tapes.contains(tape) {
                delta(left, tape, env)?
            } else {
                left.clone()
            };
            let r = if right_tapes.contains(tape) {
                delta(right, tape, env)?
            } else {
                right.clone()
            };
            Ok(join(l, r, left_tapes.clone(), right_tapes.clone()))
        }

        Node::Not { inner, tapes } => {
            if !tapes.contains(tape) {
                return Ok(expr.clone());
            }
            // The complement is nullable exactly when the inner language
            // is not
            let di = delta(inner, tape, env)?;
            if di.is_null() {
                let rest: std::collections::BTreeSet<String> =
                    tapes.iter().filter(|t| *t != tape).cloned().collect();
                Ok(universe(&rest))
            } else {
                Ok(null())
            }
        }
        Node::Short { inner } => Ok(short(delta(inner, tape, env)?)),
        Node::Star { inner } => Ok(star(delta(inner, tape, env)?)),

        Node::Rename { inner, ext, int } => {
            if tape == ext {
                Ok(rename(delta(inner, int, env)?, ext.clone(), int.clone()))
            } else if tape == int {
                // The internal name does not exist outside this wrapper
                Ok(expr.clone())
            } else {
                Ok(rename(delta(inner, tape, env)?, ext.clone(), int.clone()))
            }
        }

        Node::Match { inner, from, to } => {
            if tape == from {
                Ok(matches(delta(inner, from, env)?, from.clone(), to.clone()))
            } else if tape == to {
                // The output side ends exactly when the input side does;
                // pending synthesized literals live outside the wrapper
                delta(inner, from, env)
            } else {
                Ok(matches(delta(inner, tape, env)?, from.clone(), to.clone()))
            }
        }
        Node::Correspond { inner, from, to } => Ok(correspond(
            delta(inner, tape, env)?,
            from.clone(),
            to.clone(),
        )),

        Node::Embed { name, inner } => {
            if env.depth(name) >= env.max_recursion {
                // Bounded unfolding: a truncated branch is simply empty
                return Ok(null());
            }
            let target = inner
                .clone()
                .or_else(|| env.lookup(name))
                .unwrap_or_else(epsilon);
            let deeper = env.with_deeper(name);
            Ok(embed_inner(name, delta(&target, tape, &deeper)?))
        }

        Node::Count {
            inner,
            tape: t,
            remaining,
        } => {
            if t == tape {
                delta(inner, tape, env)
            } else {
                Ok(count(delta(inner, tape, env)?, t.clone(), *remaining))
            }
        }

        Node::Cursor {
            tape: t,
            inner,
            vocab,
            output,
            greedy,
        } => {
            if t == tape {
                return Err(GenError::CursorTapeQueried { tape: tape.to_string() });
            }
            Ok(cursor_resume(
                t.clone(),
                delta(inner, tape, env)?,
                vocab.clone(),
                output.clone(),
                *greedy,
            ))
        }

        Node::PreTape {
            inner,
            from,
            to,
            buffer,
        } => {
            if tape == from {
                return Err(GenError::HiddenTapeQueried { tape: tape.to_string() });
            }
            if tape == to {
                // The buffered tape must finish before the dependent one;
                // its accumulated output then surfaces as a finished tape
                let d1 = delta(inner, from, env)?;
                let d2 = delta(&d1, to, env)?;
                if d2.is_null() {
                    Ok(null())
                } else {
                    Ok(done_tape(from.clone(), buffer.clone(), d2))
                }
            } else {
                Ok(pre_tape_resume(
                    delta(inner, tape, env)?,
                    from.clone(),
                    to.clone(),
                    buffer.clone(),
                ))
            }
        }

        Node::DoneTape {
            tape: t,
            output,
            inner,
        } => {
            if t == tape {
                return Err(GenError::FinalizedTapeQueried {
                    tape: tape.to_string(),
                    node: expr.id(),
                });
            }
            Ok(done_tape(
                t.clone(),
                output.clone(),
                delta(inner, tape, env)?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenConfig;
    use crate::vocab::graphemes;

    fn env() -> Env {
        Env::new(&GenConfig::default())
    }

    #[test]
    fn test_literal_on_other_tape_survives_delta() {
        let e = lit("gloss", graphemes("jump"));
        let d = e.delta("text", &env()).unwrap();
        assert_eq!(d.id(), e.id());
    }

    #[test]
    fn test_unconsumed_literal_cannot_end_its_tape() {
        let e = lit("text", graphemes("foo"));
        assert!(e.delta("text", &env()).unwrap().is_null());
    }

    #[test]
    fn test_wildcard_run_ends_its_tape() {
        assert!(dot_star("t").delta("t", &env()).unwrap().is_epsilon());
        assert!(dot("t").delta("t", &env()).unwrap().is_null());
    }

    #[test]
    fn test_sequence_delta_distributes() {
        let e = seq(lit("text", graphemes("a")), lit("gloss", graphemes("b")));
        // Neither tape can end while its literal is unconsumed
        assert!(e.delta("text", &env()).unwrap().is_null());
        assert!(e.delta("gloss", &env()).unwrap().is_null());
        // Once gloss's literal is consumed, gloss can end and text remains
        let consumed = seq(lit("text", graphemes("a")), epsilon());
        let d = consumed.delta("gloss", &env()).unwrap();
        assert_eq!(d.id(), lit("text", graphemes("a")).id());
    }

    #[test]
    fn test_negation_delta_flips_nullability() {
        let tapes: std::collections::BTreeSet<String> =
            std::iter::once("t".to_string()).collect();
        let e = not(lit("t", graphemes("h")), tapes.clone());
        // "h" is not nullable, so its complement is
        assert!(e.delta("t", &env()).unwrap().is_epsilon());

        let e = not(dot_star("t"), tapes);
        assert!(e.delta("t", &env()).unwrap().is_null());
    }

    #[test]
    fn test_done_tape_refuses_its_own_tape() {
        let e = done_tape("t", "ab".to_string(), lit("u", graphemes("x")));
        let err = e.delta("t", &env()).unwrap_err();
        assert!(matches!(err, GenError::FinalizedTapeQueried { .. }));
    }

    #[test]
    fn test_embed_past_budget_is_null() {
        let config = GenConfig {
            max_recursion: 2,
            ..GenConfig::default()
        };
        let mut symbols = std::collections::BTreeMap::new();
        symbols.insert("X".to_string(), embed("X"));
        let env = Env::new(&config).with_symbols(symbols);
        // X = X recurses until the budget truncates it to the empty language
        assert!(embed("X").delta("t", &env).unwrap().is_null());
    }

    #[test]
    fn test_undefined_reference_behaves_as_epsilon() {
        let d = embed("missing").delta("t", &env()).unwrap();
        assert!(d.is_epsilon());
    }
}
