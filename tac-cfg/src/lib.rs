//! `tac-cfg` is a library for modeling three-address code functions and
//! lowering them into control-flow graphs of basic blocks.
//!
//! The entry point is [`Function`](function::Function): build one from a flat
//! run of [`Instruction`](function::Instruction)s, then call
//! [`lower`](function::Function::lower) (or run the individual pipeline
//! steps yourself).

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]
#![allow(clippy::redundant_field_names)]
#![forbid(unsafe_code)]

pub mod error;
pub mod function;
pub mod routine;
pub mod variable;

pub use self::error::Error;
pub use self::function::{BasicBlock, BlockId, Function, InstRef, Instruction};
pub use self::routine::Routine;
pub use self::variable::{Variable, VariableTable};
