//! Errors for `tac-cfg`.

use thiserror::Error as ThisError;

use crate::function::{FunctionError, InstructionError};
use crate::variable::VariableError;

/// All possible errors that can occur while modeling and lowering three-address code.
#[derive(Debug, ThisError)]
pub enum Error {
    /// We couldn't construct an instruction.
    #[error("error while constructing instruction: {0}")]
    Instruction(#[from] InstructionError),
    /// We couldn't populate a variable table.
    #[error("error while populating variable table: {0}")]
    Variable(#[from] VariableError),
    /// We couldn't lower the named function into a CFG.
    #[error("error while lowering function {name}: {source}")]
    Function {
        /// The name of the function that failed.
        name: String,
        /// The underlying failure.
        source: FunctionError,
    },
}

impl Error {
    /// Returns the name of the function this error is about, if it's about one.
    pub fn function_name(&self) -> Option<&str> {
        match self {
            Error::Function { name, .. } => Some(name),
            _ => None,
        }
    }
}
