//! Support code for three-address statement kinds.

use num_enum::{IntoPrimitive, TryFromPrimitive, TryFromPrimitiveError};
use thiserror::Error;

/// The kinds of statement that can appear in a three-address code function.
///
/// The numeric values are the statement codes used by the exchange format.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u64)]
pub enum StatementType {
    /// `x := y op z`
    FullAssignment = 0,
    /// `x := op y`
    UnaryAssignment,
    /// `x := y`
    Copy,
    /// `goto L`
    UnconditionalJump,
    /// `if x relop y goto L`
    ConditionalJump,
    /// `param x`, `call f n`, `return x`, `retrieve x`
    Procedural,
    /// `x := y[i]`, `x[i] := y`
    IndexedAssignment,
    /// `x := &y`, `x := *y`, `*x := y`
    PointerAssignment,
    /// `nop`
    NoOperation,
}

/// Errors that can occur when decoding a statement code.
#[derive(Debug, Error)]
pub enum StatementTypeError {
    /// The statement code doesn't correspond to any known statement kind.
    #[error("unknown statement code")]
    Unknown(#[from] TryFromPrimitiveError<StatementType>),
}

impl StatementType {
    /// Returns whether this kind of statement transfers control elsewhere,
    /// i.e. whether it always ends a basic block.
    pub fn is_control_flow(self) -> bool {
        matches!(
            self,
            StatementType::UnconditionalJump | StatementType::ConditionalJump
        )
    }

    /// Decode the given statement code.
    pub fn decode(code: u64) -> Result<Self, StatementTypeError> {
        Ok(Self::try_from(code)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_type_codes() {
        assert_eq!(u64::from(StatementType::FullAssignment), 0);
        assert_eq!(u64::from(StatementType::NoOperation), 8);
        assert_eq!(
            StatementType::decode(3).unwrap(),
            StatementType::UnconditionalJump
        );
        assert_eq!(StatementType::decode(5).unwrap(), StatementType::Procedural);
        assert!(StatementType::decode(9).is_err());
    }

    #[test]
    fn test_statement_type_control_flow() {
        assert!(StatementType::UnconditionalJump.is_control_flow());
        assert!(StatementType::ConditionalJump.is_control_flow());
        assert!(!StatementType::Copy.is_control_flow());
        assert!(!StatementType::Procedural.is_control_flow());
    }
}
