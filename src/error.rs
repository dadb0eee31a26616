//! Error surface for the derivation core
//!
//! The error surface is deliberately small: by the time a grammar tree
//! reaches this crate it is assumed well-formed, so most conditions that
//! would be user errors elsewhere (exceeding the recursion budget, a
//! reference to an unknown symbol) are handled by truncation rather than
//! reported. What remains is the length guard in strict mode and the
//! invariant violations that indicate a construction bug.

use std::fmt;

/// Errors that can occur while deriving or generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    /// The length budget for a tape was exhausted while the strict flag
    /// was set. In non-strict mode the branch is pruned silently instead.
    LengthBudgetExceeded { tape: String, limit: usize },
    /// A tape already finalized by an enclosing cursor was queried again.
    /// Always fatal: the committed-tape invariant only breaks when the
    /// expression tree was constructed incorrectly.
    FinalizedTapeQueried { tape: String, node: String },
    /// The primary tape of a pre-tape buffer was queried from outside.
    HiddenTapeQueried { tape: String },
    /// An active cursor's own tape was queried from outside the cursor.
    CursorTapeQueried { tape: String },
    /// An expression without a scheduling wrapper reached the work-list.
    Unscheduled { node: String },
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::LengthBudgetExceeded { tape, limit } => {
                write!(f, "Length budget of {} exceeded on tape '{}'", limit, tape)
            }
            GenError::FinalizedTapeQueried { tape, node } => {
                write!(f, "Tape '{}' queried after finalization at {}", tape, node)
            }
            GenError::HiddenTapeQueried { tape } => {
                write!(f, "Buffered tape '{}' queried directly", tape)
            }
            GenError::CursorTapeQueried { tape } => {
                write!(f, "Cursor tape '{}' queried from outside its cursor", tape)
            }
            GenError::Unscheduled { node } => {
                write!(f, "Expression without a cursor reached the work-list: {}", node)
            }
        }
    }
}

impl std::error::Error for GenError {}
