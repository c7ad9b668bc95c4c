//! `tac-support` provides support types to the other `tac-*` crates,
//! in furtherance of the general task of building control-flow graphs
//! over three-address code.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![allow(clippy::redundant_field_names)]
#![forbid(unsafe_code)]

pub mod id;
pub mod statement;

use std::fmt;

pub use self::id::*;
pub use self::statement::*;

/// The prefix shared by every rendered [`UniqueId`](UniqueId).
pub const UNIQUE_ID_PREFIX: &str = "ID_";

/// A user-visible label number, as written in the source three-address code.
///
/// Instructions that have no label (or no pending jump target) carry
/// `Option<Label>::None` rather than a sentinel number.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Label(pub u32);

impl From<u32> for Label {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_display() {
        assert_eq!(Label(0).to_string(), "L0");
        assert_eq!(Label::from(42).to_string(), "L42");
    }

    #[test]
    fn test_label_ordering() {
        assert!(Label(1) < Label(2));
        assert_eq!(Label(7), Label::from(7));
    }
}
