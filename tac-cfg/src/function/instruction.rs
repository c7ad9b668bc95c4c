//! Models and functionality for individual three-address instructions.

use std::fmt;

use tac_support::{Label, StatementType, UniqueId};
use thiserror::Error;

use super::BlockId;

/// Errors that can occur when constructing an instruction.
#[derive(Debug, Error)]
pub enum InstructionError {
    /// A jump statement type was given to the plain statement constructor.
    #[error("{0:?} must be modeled as a jump, not as a plain statement")]
    ControlFlowStatement(StatementType),
}

/// A reference to a single instruction, by its owning block and its position
/// within that block.
///
/// Positions aren't stable across mutation: an `InstRef` is only meaningful
/// for the function state it was produced from.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct InstRef {
    /// The block that holds the instruction.
    pub block: BlockId,
    /// The instruction's index within `block`.
    pub index: usize,
}

impl InstRef {
    /// Create a new `InstRef`.
    pub fn new(block: BlockId, index: usize) -> Self {
        Self { block, index }
    }
}

impl fmt::Display for InstRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.block, self.index)
    }
}

/// The destination of a jump.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JumpTarget {
    /// The jump still refers to its destination by label.
    Pending(Label),
    /// The jump has been patched to point directly at an instruction.
    Resolved(InstRef),
}

/// Represents a three-address instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// A label definition, e.g. `L3:`.
    Label(Label),
    /// An unconditional jump, e.g. `goto L3`.
    Jump(JumpTarget),
    /// A conditional jump, e.g. `if x < y goto L3`.
    Branch {
        /// The condition, as it was written in the source.
        condition: String,
        /// Where control goes when `condition` holds.
        target: JumpTarget,
    },
    /// Any other statement.
    Statement {
        /// The kind of statement.
        ty: StatementType,
        /// The statement, as it was written in the source.
        text: String,
    },
    /// The synthetic exit that terminates every function's CFG.
    ///
    /// This never comes from source text; it's only inserted during CFG construction.
    Exit(UniqueId),
}

impl Instruction {
    /// Create a label definition.
    pub fn label(label: Label) -> Self {
        Self::Label(label)
    }

    /// Create an unconditional jump to `label`.
    pub fn jump(label: Label) -> Self {
        Self::Jump(JumpTarget::Pending(label))
    }

    /// Create a conditional jump to `label`.
    pub fn branch(condition: impl Into<String>, label: Label) -> Self {
        Self::Branch {
            condition: condition.into(),
            target: JumpTarget::Pending(label),
        }
    }

    /// Create a plain statement.
    ///
    /// Returns an error if `ty` is one of the jump statement types, since
    /// those must be created with [`jump`](Instruction::jump) or
    /// [`branch`](Instruction::branch).
    pub fn statement(ty: StatementType, text: impl Into<String>) -> Result<Self, InstructionError> {
        if ty.is_control_flow() {
            return Err(InstructionError::ControlFlowStatement(ty));
        }

        Ok(Self::Statement {
            ty,
            text: text.into(),
        })
    }

    /// Returns the label associated with this instruction, if any.
    ///
    /// For a label definition this is the label itself. For a jump this is
    /// its *pending* destination; once the jump is resolved it no longer
    /// carries a label.
    pub fn label_id(&self) -> Option<Label> {
        match self {
            Self::Label(label) => Some(*label),
            Self::Jump(JumpTarget::Pending(label))
            | Self::Branch {
                target: JumpTarget::Pending(label),
                ..
            } => Some(*label),
            _ => None,
        }
    }

    /// Returns whether this instruction is a label definition.
    pub fn is_label(&self) -> bool {
        matches!(self, Self::Label(_))
    }

    /// Returns whether this instruction is an unconditional jump.
    pub fn is_unconditional_jump(&self) -> bool {
        matches!(self, Self::Jump(_))
    }

    /// Returns whether this instruction is a conditional jump.
    pub fn is_conditional_jump(&self) -> bool {
        matches!(self, Self::Branch { .. })
    }

    /// Returns whether this instruction is a jump of either kind.
    pub fn is_jump(&self) -> bool {
        self.is_unconditional_jump() || self.is_conditional_jump()
    }

    /// Returns whether this instruction is the synthetic exit.
    pub fn is_exit(&self) -> bool {
        matches!(self, Self::Exit(_))
    }

    /// Returns the resolved destination of this jump, if it is one and has been resolved.
    pub fn jump_target(&self) -> Option<InstRef> {
        match self {
            Self::Jump(JumpTarget::Resolved(target))
            | Self::Branch {
                target: JumpTarget::Resolved(target),
                ..
            } => Some(*target),
            _ => None,
        }
    }

    /// Returns this instruction's statement type.
    ///
    /// Labels and the synthetic exit aren't statements, and return `None`.
    pub fn statement_type(&self) -> Option<StatementType> {
        match self {
            Self::Jump(_) => Some(StatementType::UnconditionalJump),
            Self::Branch { .. } => Some(StatementType::ConditionalJump),
            Self::Statement { ty, .. } => Some(*ty),
            Self::Label(_) | Self::Exit(_) => None,
        }
    }

    fn target_mut(&mut self) -> Option<&mut JumpTarget> {
        match self {
            Self::Jump(target) | Self::Branch { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Point this jump directly at `target`, clearing its pending label.
    ///
    /// Returns `false` (and does nothing) if this instruction isn't a jump.
    pub(crate) fn resolve(&mut self, target: InstRef) -> bool {
        match self.target_mut() {
            Some(jt) => {
                *jt = JumpTarget::Resolved(target);
                true
            }
            None => false,
        }
    }

    /// If this jump is resolved to an instruction within `from`, move it to `to`.
    pub(crate) fn retarget(&mut self, from: BlockId, to: InstRef) -> bool {
        match self.target_mut() {
            Some(JumpTarget::Resolved(target)) if target.block == from => {
                *target = to;
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Pending(label) => write!(f, "{}", label),
            JumpTarget::Resolved(target) => write!(f, "{}", target),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Label(label) => write!(f, "{}:", label),
            Self::Jump(target) => write!(f, "goto {}", target),
            Self::Branch { condition, target } => write!(f, "if {} goto {}", condition, target),
            Self::Statement { text, .. } => f.write_str(text),
            Self::Exit(id) => write!(f, "exit {}", id),
        }
    }
}
