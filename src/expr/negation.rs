//! Negation and shortest-match restriction
//!
//! Negation produces, for every unit of the declared vocabulary, the
//! complement of the inner expression's observed next-unit set; units the
//! inner language cannot consume fall through into the unconstrained
//! universe over the negated tapes. Both combinators disjoin the inner
//! derivatives first so the observed results are non-overlapping.

use super::build::*;
use super::deriv::disjoin;
use super::{fail_deriv, no_derivs, one_deriv, Deriv, DerivIter, Expr, Node};
use crate::env::Env;
use crate::error::GenError;
use crate::tape::{DerivToken, Query, QueryToken};
use std::collections::BTreeMap;

/// Drain a derivation sequence, failing fast on the first error.
fn collect_steps(iter: DerivIter) -> Result<Vec<Deriv>, GenError> {
    iter.collect()
}

pub(super) fn deriv_not(expr: &Expr, query: &Query, env: &Env) -> DerivIter {
    let (inner, tapes) = match expr.node() {
        Node::Not { inner, tapes } => (inner.clone(), tapes.clone()),
        _ => unreachable!("deriv_not called on a non-negation node"),
    };
    if !tapes.contains(&query.tape) {
        return no_derivs();
    }

    // Observe what the inner language can consume next on this tape
    let observed = match collect_steps(inner.deriv(&Query::any(query.tape.clone()), env)) {
        Ok(steps) => steps,
        Err(err) => return fail_deriv(err),
    };
    let mut successors: BTreeMap<String, Expr> = BTreeMap::new();
    for step in disjoin(observed) {
        if let DerivToken::Unit(unit) = step.token {
            successors.insert(unit, step.next);
        }
    }

    let complement = move |unit: &str| -> Expr {
        match successors.get(unit) {
            Some(succ) => not(succ.clone(), tapes.clone()),
            // Units the inner language rejects fall through to the
            // unconstrained universe
            None => universe(&tapes),
        }
    };

    match &query.token {
        QueryToken::Unit(unit) => {
            if !env.vocab().contains(unit) {
                return no_derivs();
            }
            one_deriv(DerivToken::Unit(unit.clone()), complement(unit))
        }
        QueryToken::Any => {
            let units: Vec<String> = env.vocab().units.iter().cloned().collect();
            Box::new(env.rotate(units).map(move |unit| {
                let next = complement(&unit);
                Ok(Deriv::new(DerivToken::Unit(unit), next))
            }))
        }
        QueryToken::End => unreachable!("end probes handled in dispatch"),
    }
}

pub(super) fn deriv_short(expr: &Expr, query: &Query, env: &Env) -> DerivIter {
    let inner = match expr.node() {
        Node::Short { inner } => inner.clone(),
        _ => unreachable!("deriv_short called on a non-short node"),
    };

    // Once a branch is nullable on this tape, further derivation is
    // suppressed: no member may be a proper prefix of another
    match inner.delta(&query.tape, env) {
        Err(err) => return fail_deriv(err),
        Ok(d) if !d.is_null() => return no_derivs(),
        Ok(_) => {}
    }

    let steps = match collect_steps(inner.deriv(query, env)) {
        Ok(steps) => steps,
        Err(err) => return fail_deriv(err),
    };
    Box::new(
        disjoin(steps)
            .into_iter()
            .map(|step| Ok(Deriv::new(step.token, short(step.next)))),
    )
}
