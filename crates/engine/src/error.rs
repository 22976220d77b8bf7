//! Typed command failures.
//!
//! Every public command returns `Result<CommandEffect, CommandError>`; there
//! is no panic or exception path for a rule violation. This generalizes the
//! hand-rolled `Display`/`Error` impl the reference Server Edge writes for
//! its own `VerifyError` into a derive, the way the rest of this pack's
//! deterministic-core crates do it.

use crate::model::{EdgeId, NodeId};

/// One failure kind per category in the command-validation taxonomy. Every
/// command returns exactly one variant describing the first violated
/// precondition; state is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CommandError {
    /// Command not permitted in the current match phase.
    #[error("command not permitted in the current phase")]
    Phase,

    /// Unknown caller, eliminated caller, or caller does not own a required node.
    #[error("caller is not authorized to perform this action")]
    Authorization,

    /// A node id referenced by the command does not exist.
    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    /// An edge id referenced by the command does not exist.
    #[error("edge {0} does not exist")]
    EdgeNotFound(EdgeId),

    /// A proposed bridge would duplicate an existing edge or cross one.
    #[error("bridge is not geometrically admissible")]
    Geometry,

    /// Caller does not have enough gold, or the caller's declared cost
    /// disagrees with the engine-computed cost.
    #[error("insufficient gold or declared cost does not match")]
    Economy,

    /// The action would change ownership during the peace phase.
    #[error("ownership-changing actions are not permitted during the peace phase")]
    PhaseAttack,

    /// A node cannot be bridged to itself, or an unowned node cannot be destroyed.
    #[error("self-action is not permitted")]
    SelfAction,
}
