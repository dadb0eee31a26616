//! Generation work-list
//!
//! [`Gen`] drives a scheduled expression to completed records. The work-list
//! is a stack of frames, each either an unexplored expression or a
//! partially-consumed forward iterator. One element is taken per visit and
//! the remainder is pushed back live, so a caller that stops after the first
//! record has paid only for the path that produced it.

use crate::env::Env;
use crate::error::GenError;
use crate::expr::{forward, Expr, ForwardIter, Step};
use crate::tape::Record;

enum Frame {
    Unexplored(Expr),
    Pending(ForwardIter),
}

/// Lazy record stream over one generation request.
///
/// A fatal error ends the stream after being yielded once; budget
/// truncations never surface here, they just mean fewer records.
pub struct Gen {
    env: Env,
    stack: Vec<Frame>,
    done: bool,
}

impl Gen {
    pub(crate) fn new(root: Expr, env: Env) -> Self {
        Gen {
            env,
            stack: vec![Frame::Unexplored(root)],
            done: false,
        }
    }

    fn fail(&mut self, err: GenError) -> Option<Result<Record, GenError>> {
        self.done = true;
        self.stack.clear();
        Some(Err(err))
    }

    fn push_next(&mut self, mut iter: ForwardIter, keep_rest: bool) -> Option<GenError> {
        match iter.next() {
            Some(Ok(next)) => {
                if keep_rest {
                    self.stack.push(Frame::Pending(iter));
                }
                self.stack.push(Frame::Unexplored(next));
                None
            }
            Some(Err(err)) => Some(err),
            None => None,
        }
    }
}

impl Iterator for Gen {
    type Item = Result<Record, GenError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Unexplored(expr) => match forward(&expr, &self.env) {
                    Err(err) => return self.fail(err),
                    Ok(Step::Emit(record)) => {
                        self.env.note_emit();
                        return Some(Ok(record));
                    }
                    Ok(Step::Dead) => {}
                    Ok(Step::Branches { iter, greedy }) => {
                        // A greedy cursor commits to its first candidate
                        if let Some(err) = self.push_next(iter, !greedy) {
                            return self.fail(err);
                        }
                    }
                },
                Frame::Pending(iter) => {
                    if let Some(err) = self.push_next(iter, true) {
                        return self.fail(err);
                    }
                }
            }
        }
        self.done = true;
        self.env.log_stats();
        None
    }
}
