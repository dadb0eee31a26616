//! Join: intersection-like composition of two expressions
//!
//! A query on a tape present in only one operand passes through untouched.
//! On a shared tape the left operand is derived first, and each of its
//! results is replayed as a query against the right operand, so the two
//! sides must agree unit for unit. End-of-tape transitions are zero-width
//! and do not replay: `delta` composes both operands' residuals, so
//! whatever the right side still owes on other tapes survives the shared
//! tape ending.

use super::build::join as join_build;
use super::{fail_deriv, no_derivs, Deriv, DerivIter, Expr, Node};
use crate::env::Env;
use crate::tape::{DerivToken, Query};
use std::collections::BTreeSet;

pub(super) fn deriv_join(expr: &Expr, query: &Query, env: &Env) -> DerivIter {
    let (left, right, left_tapes, right_tapes) = match expr.node() {
        Node::Join {
            left,
            right,
            left_tapes,
            right_tapes,
        } => (
            left.clone(),
            right.clone(),
            left_tapes.clone(),
            right_tapes.clone(),
        ),
        _ => unreachable!("deriv_join called on a non-join node"),
    };

    let in_left = left_tapes.contains(&query.tape);
    let in_right = right_tapes.contains(&query.tape);

    match (in_left, in_right) {
        (false, false) => no_derivs(),
        (true, false) => pass_through(left, right, left_tapes, right_tapes, query, env, true),
        (false, true) => pass_through(left, right, left_tapes, right_tapes, query, env, false),
        (true, true) => shared_tape(left, right, left_tapes, right_tapes, query, env),
    }
}

/// Query touches only one operand; the other is carried along unchanged.
fn pass_through(
    left: Expr,
    right: Expr,
    left_tapes: BTreeSet<String>,
    right_tapes: BTreeSet<String>,
    query: &Query,
    env: &Env,
    derive_left: bool,
) -> DerivIter {
    let side = if derive_left { &left } else { &right };
    let steps = side.deriv(query, env);
    Box::new(steps.map(move |step| {
        let step = step?;
        let next = if derive_left {
            join_build(
                step.next,
                right.clone(),
                left_tapes.clone(),
                right_tapes.clone(),
            )
        } else {
            join_build(
                left.clone(),
                step.next,
                left_tapes.clone(),
                right_tapes.clone(),
            )
        };
        Ok(Deriv::new(step.token, next))
    }))
}

fn shared_tape(
    left: Expr,
    right: Expr,
    left_tapes: BTreeSet<String>,
    right_tapes: BTreeSet<String>,
    query: &Query,
    env: &Env,
) -> DerivIter {
    let tape = query.tape.clone();
    let env_a = env.clone();

    // Left first; each result becomes the right operand's query
    Box::new(left.deriv(query, env).flat_map(move |step| -> DerivIter {
        let step = match step {
            Ok(step) => step,
            Err(err) => return fail_deriv(err),
        };
        match step.token {
            DerivToken::Unit(unit) => {
                let l_next = step.next;
                let (lt, rt) = (left_tapes.clone(), right_tapes.clone());
                let replay = Query::unit(tape.clone(), unit);
                Box::new(right.deriv(&replay, &env_a).map(move |step| {
                    let step = step?;
                    Ok(Deriv::new(
                        step.token,
                        join_build(l_next.clone(), step.next, lt.clone(), rt.clone()),
                    ))
                }))
            }
            DerivToken::End => no_derivs(),
        }
    }))
}
