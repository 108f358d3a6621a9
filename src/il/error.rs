use thiserror::Error;

use crate::{
    ast::typed::{NodeId, UnOp},
    listing::Position,
};

/// An internal invariant violation inside the intermediate-code generator.
///
/// These are not user diagnostics: the input tree has already passed
/// semantic analysis, so any of these indicates a mismatch between that
/// phase's guarantees and the generator's assumptions. The driver aborts on
/// them rather than attempting recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IcgError {
    #[error("instruction at {0} is not a jump or call, cannot patch its target")]
    NotPatchable(Position),
    #[error("jump target {target} is outside the listing (length {len})")]
    TargetOutOfRange { target: Position, len: usize },
    #[error("control transfer at {0} was left without a target")]
    UnresolvedTarget(Position),
    #[error("`{0}` lowered outside of any loop")]
    LoopExitOutsideLoop(&'static str),
    #[error("`{stmt}` is bound to loop {bound}, but the innermost active loop is {active}")]
    LoopBindingMismatch {
        stmt: &'static str,
        bound: NodeId,
        active: NodeId,
    },
    #[error("operand of `{0}` is not a plain identifier reference")]
    IncDecTarget(UnOp),
    #[error("call to `{0}` was never resolved to a function entry")]
    UnresolvedCall(String),
}
