//! Forward stepping of scheduled expressions
//!
//! Once the outer layers of an expression are cursors, generation no longer
//! needs external queries: each cursor knows which tape it owns and drives
//! that tape itself, one unit per step. [`forward`] advances the outermost
//! scheduling layer by one step and reports either a finished record, a dead
//! end, or the branch alternatives to explore.

use super::build::*;
use super::deriv::disjoin;
use super::{record_with, Expr, Node};
use crate::env::{Direction, Env};
use crate::error::GenError;
use crate::tape::{DerivToken, Query, Record};

/// Lazy sequence of successor expressions from one forward step.
pub type ForwardIter = Box<dyn Iterator<Item = Result<Expr, GenError>>>;

/// Outcome of advancing an expression by one scheduling step.
pub enum Step {
    /// Every tape is finished; here is the completed record.
    Emit(Record),
    /// No continuation exists on this branch.
    Dead,
    /// Alternative successors. When `greedy` is set the caller must commit
    /// to the first alternative and drop the rest.
    Branches { iter: ForwardIter, greedy: bool },
}

/// Advance the outermost scheduling layer of `expr` by one step.
pub fn forward(expr: &Expr, env: &Env) -> Result<Step, GenError> {
    match expr.node() {
        Node::Finished { record } => Ok(Step::Emit(record.clone())),
        // A grammar with no tapes schedules to a bare epsilon
        Node::Epsilon => Ok(Step::Emit(Record::new())),
        Node::Null => Ok(Step::Dead),

        // Residuals of a drained buffered tape surface as a union of
        // terminal alternatives; each one is its own branch
        Node::Union { children } => {
            let iter: ForwardIter = Box::new(env.rotate(children.clone()).map(Ok));
            Ok(Step::Branches {
                iter,
                greedy: false,
            })
        }

        Node::Cursor {
            tape,
            inner,
            vocab,
            output,
            greedy,
        } => {
            // The cursor's tape drives itself under its own vocabulary
            let local = env.with_vocab(vocab.clone());
            let (tape, vocab, output, greedy) =
                (tape.clone(), vocab.clone(), output.clone(), *greedy);

            // Ending the tape here is one alternative
            let ended = inner.delta(&tape, &local)?;
            let end_branch: ForwardIter = if ended.is_null() {
                Box::new(std::iter::empty())
            } else {
                Box::new(std::iter::once(Ok(done_tape(
                    tape.clone(),
                    output.clone(),
                    ended,
                ))))
            };

            // The others consume one more unit. Derivatives are disjoined
            // so distinct parses of the same unit continue as one branch
            // instead of duplicating the record downstream.
            let mut steps = Vec::new();
            for step in inner.deriv(&Query::any(tape.clone()), &local) {
                steps.push(step?);
            }
            let dir = env.dir;
            let unit_branch: ForwardIter =
                Box::new(disjoin(steps).into_iter().map(move |step| {
                    let grown = match &step.token {
                        DerivToken::Unit(unit) => accumulate(dir, &output, unit),
                        _ => output.clone(),
                    };
                    Ok(cursor_resume(
                        tape.clone(),
                        step.next,
                        vocab.clone(),
                        grown,
                        greedy,
                    ))
                }));

            let iter: ForwardIter =
                Box::new(env.rotate(vec![end_branch, unit_branch]).flatten());
            Ok(Step::Branches { iter, greedy })
        }

        // A finished tape sits outside the remaining cursors; step through
        // it and keep the closed tape attached to every successor
        Node::DoneTape {
            tape,
            output,
            inner,
        } => {
            let (tape, output) = (tape.clone(), output.clone());
            match forward(inner, env)? {
                Step::Emit(record) => Ok(Step::Emit(record_with(&record, &tape, &output))),
                Step::Dead => Ok(Step::Dead),
                Step::Branches { iter, greedy } => {
                    let iter: ForwardIter = Box::new(iter.map(move |next| {
                        Ok(done_tape(tape.clone(), output.clone(), next?))
                    }));
                    Ok(Step::Branches { iter, greedy })
                }
            }
        }

        _ => Err(GenError::Unscheduled { node: expr.id() }),
    }
}

/// Attach one consumed unit to accumulated output, respecting the scan
/// direction: right-to-left scans build their strings back to front.
pub(crate) fn accumulate(dir: Direction, output: &str, unit: &str) -> String {
    match dir {
        Direction::Ltr => format!("{}{}", output, unit),
        Direction::Rtl => format!("{}{}", unit, output),
    }
}
