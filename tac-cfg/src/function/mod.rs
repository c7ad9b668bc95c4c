//! Functionality for building a function's control-flow graph.
//!
//! A [`Function`](Function) starts out as a single flat run of instructions, as
//! produced by a front end. Lowering it into a CFG happens in three steps:
//!
//! 1. [`build_cfg`](Function::build_cfg) partitions the run into basic blocks,
//!    appends the synthetic exit block, and wires up successor/predecessor edges;
//! 2. [`resolve_jumps`](Function::resolve_jumps) backpatches every jump to point
//!    directly at the instruction after its label, and strips the labels;
//! 3. [`cleanup`](Function::cleanup) removes blocks left empty by step 2.
//!
//! [`lower`](Function::lower) runs all three and then [`verify`](Function::verify)s
//! the result.

mod basic_block;
mod instruction;
mod verify;

use std::fmt;
use std::mem;
use std::sync::Arc;

pub use basic_block::*;
use hashbrown::HashSet;
use indexmap::{IndexMap, IndexSet};
pub use instruction::*;
use tac_support::{Label, LabelAllocator};
use thiserror::Error;
pub use verify::*;

use crate::variable::VariableTable;

/// Errors that can occur while lowering a function into a CFG.
#[derive(Debug, Error)]
pub enum FunctionError {
    /// A jump refers to a label that no block begins with.
    #[error("reference to undefined label {0}")]
    UnresolvedLabelReference(Label),

    /// A label is defined more than once in the same function.
    #[error("label {0} is defined more than once")]
    DuplicateLabel(Label),

    /// The input already contains a synthetic exit instruction.
    #[error("synthetic exit instruction in function input")]
    UnexpectedExit,

    /// [`build_cfg`](Function::build_cfg) was called on an already-built function.
    #[error("function's CFG has already been built")]
    AlreadyBuilt,

    /// An operation that needs a CFG was called before [`build_cfg`](Function::build_cfg).
    #[error("function's CFG hasn't been built yet")]
    NotBuilt,

    /// An edge was requested to or from a block that doesn't exist.
    #[error("no such block: {0}")]
    UnknownBlock(BlockId),

    /// The lowered function failed verification.
    #[error("function failed verification: {0}")]
    Invariant(#[from] VerifyError),
}

/// How far along the lowering pipeline a function is.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub enum Stage {
    /// A flat run of instructions, as handed over by the front end.
    Linear,
    /// Partitioned into blocks, with edges.
    Built,
    /// Jumps point directly at instructions, and labels are gone.
    Resolved,
}

/// Represents a single three-address code function and its control-flow graph.
#[derive(Debug)]
pub struct Function {
    name: String,
    blocks: IndexMap<BlockId, BasicBlock>,
    next_block: usize,
    exit: Option<BlockId>,
    variables: VariableTable,
    allocator: Arc<LabelAllocator>,
    stage: Stage,
}

impl Function {
    /// Create a new function from a flat run of instructions.
    ///
    /// The instructions are held as a single block until
    /// [`build_cfg`](Function::build_cfg) is called. The `allocator` supplies
    /// the ID of the function's synthetic exit.
    pub fn new(
        name: impl Into<String>,
        instructions: Vec<Instruction>,
        variables: VariableTable,
        allocator: Arc<LabelAllocator>,
    ) -> Self {
        let mut function = Self {
            name: name.into(),
            blocks: IndexMap::new(),
            next_block: 0,
            exit: None,
            variables: variables,
            allocator: allocator,
            stage: Stage::Linear,
        };

        function.push_block(BasicBlock::new(instructions));
        function
    }

    /// Returns this function's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns how far along the lowering pipeline this function is.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Returns an iterator over this function's blocks, in emission order.
    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &BasicBlock)> + '_ {
        self.blocks.iter().map(|(id, block)| (*id, block))
    }

    /// Returns the number of blocks in this function.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the block with the given ID, if it (still) exists.
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    /// Returns the first block in emission order.
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.keys().next().copied()
    }

    /// Returns the synthetic exit block, once the CFG has been built.
    pub fn exit(&self) -> Option<BlockId> {
        self.exit
    }

    /// Returns the instruction referenced by `iref`, if it exists.
    pub fn instruction(&self, iref: InstRef) -> Option<&Instruction> {
        self.block(iref.block)
            .and_then(|block| block.instructions().get(iref.index))
    }

    /// Returns this function's variable table.
    pub fn variables(&self) -> &VariableTable {
        &self.variables
    }

    /// Returns a mutable reference to this function's variable table.
    pub fn variables_mut(&mut self) -> &mut VariableTable {
        &mut self.variables
    }

    /// Returns the allocator this function draws unique IDs from.
    pub fn allocator(&self) -> &Arc<LabelAllocator> {
        &self.allocator
    }

    fn push_block(&mut self, block: BasicBlock) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.blocks.insert(id, block);
        id
    }

    /// Add the edge `from -> to` on both ends.
    ///
    /// Returns `false` (and does nothing) if either block doesn't exist.
    fn add_edge(&mut self, from: BlockId, to: BlockId) -> bool {
        if !self.blocks.contains_key(&from) || !self.blocks.contains_key(&to) {
            return false;
        }

        if let Some(block) = self.blocks.get_mut(&from) {
            block.successors.insert(to);
        }
        if let Some(block) = self.blocks.get_mut(&to) {
            block.predecessors.insert(from);
        }

        log::trace!("{}: edge {} -> {}", self.name, from, to);
        true
    }

    fn link(&mut self, from: BlockId, to: BlockId) -> Result<(), FunctionError> {
        if self.add_edge(from, to) {
            Ok(())
        } else if !self.blocks.contains_key(&from) {
            Err(FunctionError::UnknownBlock(from))
        } else {
            Err(FunctionError::UnknownBlock(to))
        }
    }

    /// Returns the block that begins with the definition of `label`, if any.
    pub fn find_label(&self, label: Label) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|(_, block)| {
                block
                    .head()
                    .map_or(false, |head| head.is_label() && head.label_id() == Some(label))
            })
            .map(|(id, _)| *id)
    }

    /// Returns a block that ends in an unconditional jump still pending on
    /// `label`, if any.
    pub fn find_jump(&self, label: Label) -> Option<BlockId> {
        self.find_tail(label, Instruction::is_unconditional_jump)
    }

    /// Returns a block that ends in a conditional jump still pending on
    /// `label`, if any.
    pub fn find_branch(&self, label: Label) -> Option<BlockId> {
        self.find_tail(label, Instruction::is_conditional_jump)
    }

    fn find_tail(&self, label: Label, kind: fn(&Instruction) -> bool) -> Option<BlockId> {
        self.blocks
            .iter()
            .find(|(_, block)| {
                block.tail().map_or(false, |tail| {
                    kind(tail) && !tail.is_label() && tail.label_id() == Some(label)
                })
            })
            .map(|(id, _)| *id)
    }

    /// Check the flat input and split it into basic blocks.
    ///
    /// A label always starts a new block, and a jump of either kind always
    /// ends one.
    fn partition(&mut self) -> Result<(), FunctionError> {
        let mut defined = HashSet::new();
        for inst in self.blocks.values().flat_map(BasicBlock::instructions) {
            if inst.is_exit() {
                return Err(FunctionError::UnexpectedExit);
            }

            if let Instruction::Label(label) = inst {
                if !defined.insert(*label) {
                    return Err(FunctionError::DuplicateLabel(*label));
                }
            }
        }

        if let Some(label) = self
            .blocks
            .values()
            .flat_map(BasicBlock::instructions)
            .filter(|inst| inst.is_jump())
            .filter_map(Instruction::label_id)
            .find(|label| !defined.contains(label))
        {
            return Err(FunctionError::UnresolvedLabelReference(label));
        }

        let stream = mem::take(&mut self.blocks)
            .into_values()
            .flat_map(|block| block.instructions)
            .collect::<Vec<_>>();
        self.next_block = 0;

        let mut current = Vec::new();
        for inst in stream {
            if inst.is_label() && !current.is_empty() {
                self.push_block(BasicBlock::new(mem::take(&mut current)));
            }

            let ends_block = inst.is_jump();
            current.push(inst);

            if ends_block {
                self.push_block(BasicBlock::new(mem::take(&mut current)));
            }
        }
        if !current.is_empty() {
            self.push_block(BasicBlock::new(current));
        }

        log::debug!(
            "{}: partitioned into {} blocks",
            self.name,
            self.blocks.len()
        );

        Ok(())
    }

    /// Build this function's control-flow graph.
    ///
    /// This partitions the function's instructions into blocks, appends a
    /// block holding only the synthetic exit, and then links each block to
    /// its successors: the block beginning with its tail jump's label (if
    /// any), and the next block in order (unless its tail is an
    /// unconditional jump).
    ///
    /// A function with no instructions is valid, and produces a graph of
    /// just the exit block.
    pub fn build_cfg(&mut self) -> Result<(), FunctionError> {
        if self.stage != Stage::Linear {
            return Err(FunctionError::AlreadyBuilt);
        }

        self.partition()?;

        let exit_id = self.allocator.next_id();
        let exit = self.push_block(BasicBlock::new(vec![Instruction::Exit(exit_id)]));
        self.exit = Some(exit);
        log::debug!("{}: exit block {} ({})", self.name, exit, exit_id);

        // Work out every edge first, then apply them.
        let order = self.blocks.keys().copied().collect::<Vec<_>>();
        let mut edges = Vec::new();
        for (pos, id) in order.iter().enumerate() {
            let tail = match self.blocks.get(id).and_then(BasicBlock::tail) {
                Some(tail) => tail,
                None => continue,
            };

            if tail.is_exit() {
                break;
            }

            if let Some(label) = tail.label_id().filter(|_| !tail.is_label()) {
                let target = self
                    .find_label(label)
                    .ok_or(FunctionError::UnresolvedLabelReference(label))?;
                edges.push((*id, target));
            }

            if !tail.is_unconditional_jump() {
                // The exit block is always last, so every other block has a next one.
                let next = order
                    .get(pos + 1)
                    .ok_or(FunctionError::Invariant(VerifyError::MissingExit))?;
                edges.push((*id, *next));
            }
        }

        for (from, to) in edges {
            self.link(from, to)?;
        }

        self.stage = Stage::Built;
        Ok(())
    }

    /// Resolve every jump to point directly at the instruction following its
    /// label, then drop the labels.
    ///
    /// Returns an error if the CFG hasn't been built yet, or if a jump is
    /// left pointing at a label that no block begins with.
    pub fn resolve_jumps(&mut self) -> Result<(), FunctionError> {
        if self.stage == Stage::Linear {
            return Err(FunctionError::NotBuilt);
        }

        let order = self.blocks.keys().copied().collect::<Vec<_>>();
        for id in order {
            let label = match self.blocks.get(&id).and_then(BasicBlock::head) {
                Some(Instruction::Label(label)) => *label,
                _ => continue,
            };

            // With the label gone, the instruction that followed it is at the front.
            if let Some(block) = self.blocks.get_mut(&id) {
                block.instructions.remove(0);
            }
            let target = InstRef::new(id, 0);

            let mut patched = 0;
            while let Some(jumper) = self.find_jump(label) {
                self.patch_tail(jumper, target)?;
                patched += 1;
            }
            while let Some(brancher) = self.find_branch(label) {
                self.patch_tail(brancher, target)?;
                patched += 1;
            }

            if patched == 0 {
                log::warn!("{}: label {} is never jumped to", self.name, label);
            } else {
                log::debug!(
                    "{}: resolved {} jump(s) to {} as {}",
                    self.name,
                    patched,
                    label,
                    target
                );
            }
        }

        if let Some(label) = self
            .blocks
            .values()
            .filter_map(BasicBlock::tail)
            .filter(|tail| tail.is_jump())
            .find_map(Instruction::label_id)
        {
            return Err(FunctionError::UnresolvedLabelReference(label));
        }

        self.stage = Stage::Resolved;
        Ok(())
    }

    fn patch_tail(&mut self, id: BlockId, target: InstRef) -> Result<(), FunctionError> {
        let patched = self
            .blocks
            .get_mut(&id)
            .and_then(BasicBlock::tail_mut)
            .map_or(false, |tail| tail.resolve(target));

        if patched {
            Ok(())
        } else {
            Err(FunctionError::UnknownBlock(id))
        }
    }

    /// Remove every block that has no instructions, returning how many were removed.
    ///
    /// Each removed block is spliced out of the graph: its predecessors are
    /// linked directly to its successors, and jumps that targeted it are
    /// moved to the front of its first successor.
    ///
    /// Running this more than once is harmless.
    pub fn cleanup(&mut self) -> usize {
        let empty = self
            .blocks
            .iter()
            .filter(|(_, block)| block.is_empty())
            .map(|(id, _)| *id)
            .collect::<Vec<_>>();

        for id in &empty {
            self.splice_out(*id);
        }

        if !empty.is_empty() {
            log::debug!("{}: removed {} empty block(s)", self.name, empty.len());
        }
        empty.len()
    }

    fn splice_out(&mut self, id: BlockId) {
        let block = match self.blocks.shift_remove(&id) {
            Some(block) => block,
            None => return,
        };

        let live = |ids: &IndexSet<BlockId>| {
            ids.iter()
                .copied()
                .filter(|other| *other != id)
                .collect::<Vec<_>>()
        };
        let preds = live(&block.predecessors);
        let succs = live(&block.successors);

        for pred in &preds {
            if let Some(pred) = self.blocks.get_mut(pred) {
                pred.successors.shift_remove(&id);
            }
        }
        for succ in &succs {
            if let Some(succ) = self.blocks.get_mut(succ) {
                succ.predecessors.shift_remove(&id);
            }
        }

        for pred in &preds {
            for succ in &succs {
                self.add_edge(*pred, *succ);
            }
        }

        if let Some(next) = succs.first() {
            let to = InstRef::new(*next, 0);
            for tail in self.blocks.values_mut().filter_map(BasicBlock::tail_mut) {
                if tail.retarget(id, to) {
                    log::trace!("{}: retargeted jump from {} to {}", self.name, id, to);
                }
            }
        }

        log::trace!("{}: spliced out {}", self.name, id);
    }

    /// Build, resolve and clean up this function's CFG, then verify the result.
    pub fn lower(&mut self) -> Result<(), FunctionError> {
        self.build_cfg()?;
        self.resolve_jumps()?;
        self.cleanup();
        self.verify()?;

        log::debug!(
            "{}: lowered into {} blocks",
            self.name,
            self.blocks.len()
        );
        Ok(())
    }
}

fn fmt_ids(ids: &IndexSet<BlockId>) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {} {{", self.name)?;
        for (id, block) in self.blocks() {
            writeln!(
                f,
                "{}: ; preds: [{}] succs: [{}]",
                id,
                fmt_ids(block.predecessors()),
                fmt_ids(block.successors())
            )?;
            for inst in block.instructions() {
                writeln!(f, "    {}", inst)?;
            }
        }
        write!(f, "}}")
    }
}
