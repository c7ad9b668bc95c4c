//! Models and functionality for basic blocks.

use std::fmt;

use indexmap::IndexSet;

use super::Instruction;

/// A stable handle for a basic block within its owning [`Function`](crate::function::Function).
///
/// Block IDs are never reused within a function, so an ID that outlives its
/// block (e.g. after [`cleanup`](crate::function::Function::cleanup)) simply
/// stops resolving.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Returns the raw index of this block ID.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// Represents a basic block: a straight-line run of instructions, plus its
/// edges in the control-flow graph.
///
/// Edges are only ever changed through the owning function, which keeps
/// them mutual: if `a` lists `b` as a successor, `b` lists `a` as a predecessor.
#[derive(Clone, Debug, Default)]
pub struct BasicBlock {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) successors: IndexSet<BlockId>,
    pub(crate) predecessors: IndexSet<BlockId>,
}

impl BasicBlock {
    pub(crate) fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions: instructions,
            ..Default::default()
        }
    }

    /// The instructions of this basic block.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the first instruction in this block, if there is one.
    pub fn head(&self) -> Option<&Instruction> {
        self.instructions.first()
    }

    /// Returns the last instruction in this block, if there is one.
    pub fn tail(&self) -> Option<&Instruction> {
        self.instructions.last()
    }

    pub(crate) fn tail_mut(&mut self) -> Option<&mut Instruction> {
        self.instructions.last_mut()
    }

    /// Returns the number of instructions in this block.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns whether this block has no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns whether this block is terminated by the synthetic exit.
    pub fn is_exit(&self) -> bool {
        self.tail().map_or(false, Instruction::is_exit)
    }

    /// The blocks that control can flow to from this block, in the order
    /// the edges were added.
    pub fn successors(&self) -> &IndexSet<BlockId> {
        &self.successors
    }

    /// The blocks that control can flow from into this block, in the order
    /// the edges were added.
    pub fn predecessors(&self) -> &IndexSet<BlockId> {
        &self.predecessors
    }
}

#[cfg(test)]
mod tests {
    use tac_support::{Label, StatementType, UniqueId};

    use super::*;

    #[test]
    fn test_block_id_display() {
        assert_eq!(BlockId(0).to_string(), "bb0");
        assert_eq!(BlockId(12).index(), 12);
    }

    #[test]
    fn test_head_and_tail() {
        let empty = BasicBlock::default();
        assert!(empty.is_empty());
        assert!(empty.head().is_none());
        assert!(empty.tail().is_none());
        assert!(!empty.is_exit());

        let block = BasicBlock::new(vec![
            Instruction::label(Label(1)),
            Instruction::statement(StatementType::Copy, "x := 1").unwrap(),
            Instruction::jump(Label(1)),
        ]);
        assert_eq!(block.len(), 3);
        assert!(block.head().unwrap().is_label());
        assert!(block.tail().unwrap().is_unconditional_jump());
        assert!(!block.is_exit());
        assert!(block.successors().is_empty());
        assert!(block.predecessors().is_empty());

        let exit = BasicBlock::new(vec![Instruction::Exit(UniqueId::from(1))]);
        assert!(exit.is_exit());
    }
}
