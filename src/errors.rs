//! Provides the error types used throughout this crate.

use crate::transform::TransformIndex;
use thiserror::Error;

/// Errors raised by the [crate::TransformHierarchy] when it is handed
/// an index it cannot act on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("Transform node not in hierarchy: {0}")]
    UnknownNode(TransformIndex),
    #[error("Cannot attach {node} below {parent}: the parent is the node itself or one of its descendants")]
    Cycle {
        node: TransformIndex,
        parent: TransformIndex,
    },
}

/// Reasons why a servo chain cannot be resolved or stepped.
///
/// Resolution errors are returned as values. The caller keeps operating on the
/// last valid chain (which is left untouched) and decides how to present the reason.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("No effector designated")]
    NoEffector,
    #[error("No joints in the working set")]
    NoJoints,
    #[error("Effector is not at the end of the chain")]
    EffectorNotAtChainEnd,
    #[error("Joints are not in a continuous chain")]
    DiscontinuousChain,
    #[error("Internal error: {0}")]
    InvariantViolation(String),
    #[error("No valid chain has been resolved yet")]
    Unresolved,
    #[error("Transform hierarchy error: {0}")]
    Hierarchy(#[from] HierarchyError),
}

/// Errors raised while building a [crate::BodyArena]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError<BodyId> {
    #[error("Body not in tree: {0:?}")]
    UnknownBody(BodyId),
    #[error("ID not unique: {0:?}")]
    NotUnique(BodyId),
    #[error("No root body set")]
    RootNotSet,
}
