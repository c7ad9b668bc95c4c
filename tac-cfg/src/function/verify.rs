//! Structural checks for a function's control-flow graph.

use tac_support::Label;
use thiserror::Error;

use super::{BlockId, Function, InstRef, Instruction, Stage};

/// Ways in which a lowered function can be structurally broken.
///
/// None of these should surface from well-formed input; each indicates a
/// bug in the code that built or edited the graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// The function hasn't been built into a CFG yet.
    #[error("function's CFG hasn't been built")]
    NotBuilt,
    /// There is no synthetic exit anywhere in the function.
    #[error("function has no exit block")]
    MissingExit,
    /// There is more than one synthetic exit.
    #[error("function has {0} exit instructions, expected exactly one")]
    MultipleExits(usize),
    /// The exit isn't alone in the last block.
    #[error("exit instruction in {0} isn't alone in the last block")]
    MisplacedExit(BlockId),
    /// Control can flow out of the exit block.
    #[error("exit block {0} has successors")]
    ExitHasSuccessors(BlockId),
    /// An edge names a block that doesn't exist.
    #[error("edge {0} -> {1} names a block that doesn't exist")]
    DanglingEdge(BlockId, BlockId),
    /// An edge is only recorded on one of its ends.
    #[error("edge {0} -> {1} isn't recorded on both ends")]
    OneSidedEdge(BlockId, BlockId),
    /// A label survived jump resolution.
    #[error("label {1} survives in {0} after jump resolution")]
    StrayLabel(BlockId, Label),
    /// A jump is still pending after jump resolution.
    #[error("jump in {0} is still unresolved")]
    UnresolvedJump(BlockId),
    /// A jump points at an instruction that doesn't exist.
    #[error("jump in {0} targets {1}, which doesn't exist")]
    DanglingJumpTarget(BlockId, InstRef),
}

impl Function {
    /// Check this function's graph for structural consistency.
    ///
    /// Once built, a function must have exactly one exit, alone in the last
    /// block and with no successors, and every edge must be recorded on both
    /// of its ends. Once resolved, no labels may remain and every jump must
    /// point at an existing instruction (or at an emptied block that
    /// [`cleanup`](Function::cleanup) hasn't removed yet).
    pub fn verify(&self) -> Result<(), VerifyError> {
        if self.stage == Stage::Linear {
            return Err(VerifyError::NotBuilt);
        }

        self.verify_exit()?;
        self.verify_edges()?;
        if self.stage == Stage::Resolved {
            self.verify_jumps()?;
        }

        Ok(())
    }

    fn verify_exit(&self) -> Result<(), VerifyError> {
        let exits = self
            .blocks()
            .flat_map(|(id, block)| {
                block
                    .instructions()
                    .iter()
                    .filter(|inst| inst.is_exit())
                    .map(move |_| id)
            })
            .collect::<Vec<_>>();

        let holder = match exits.as_slice() {
            [] => return Err(VerifyError::MissingExit),
            [holder] => *holder,
            _ => return Err(VerifyError::MultipleExits(exits.len())),
        };

        let last = self.blocks.keys().last().copied();
        let alone = self.block(holder).map_or(false, |block| block.len() == 1);
        if last != Some(holder) || self.exit != Some(holder) || !alone {
            return Err(VerifyError::MisplacedExit(holder));
        }

        if self
            .block(holder)
            .map_or(false, |block| !block.successors().is_empty())
        {
            return Err(VerifyError::ExitHasSuccessors(holder));
        }

        Ok(())
    }

    fn verify_edges(&self) -> Result<(), VerifyError> {
        for (id, block) in self.blocks() {
            for succ in block.successors() {
                let other = self
                    .block(*succ)
                    .ok_or(VerifyError::DanglingEdge(id, *succ))?;
                if !other.predecessors().contains(&id) {
                    return Err(VerifyError::OneSidedEdge(id, *succ));
                }
            }

            for pred in block.predecessors() {
                let other = self
                    .block(*pred)
                    .ok_or(VerifyError::DanglingEdge(*pred, id))?;
                if !other.successors().contains(&id) {
                    return Err(VerifyError::OneSidedEdge(*pred, id));
                }
            }
        }

        Ok(())
    }

    fn verify_jumps(&self) -> Result<(), VerifyError> {
        for (id, block) in self.blocks() {
            for inst in block.instructions() {
                if let Instruction::Label(label) = inst {
                    return Err(VerifyError::StrayLabel(id, *label));
                }

                if !inst.is_jump() {
                    continue;
                }

                let target = inst.jump_target().ok_or(VerifyError::UnresolvedJump(id))?;
                let lands = match self.block(target.block) {
                    Some(dest) if dest.is_empty() => target.index == 0,
                    Some(dest) => target.index < dest.len(),
                    None => false,
                };
                if !lands {
                    return Err(VerifyError::DanglingJumpTarget(id, target));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tac_support::{LabelAllocator, StatementType, UniqueId};

    use super::*;
    use crate::function::BasicBlock;
    use crate::variable::VariableTable;

    fn lowered(instructions: Vec<Instruction>) -> Function {
        let mut f = Function::new(
            "v",
            instructions,
            VariableTable::default(),
            Arc::new(LabelAllocator::new()),
        );
        f.lower().unwrap();
        f
    }

    fn stmt(text: &str) -> Instruction {
        Instruction::statement(StatementType::Copy, text).unwrap()
    }

    #[test]
    fn test_verify_not_built() {
        let f = Function::new(
            "v",
            vec![stmt("x := 1")],
            VariableTable::default(),
            Arc::new(LabelAllocator::new()),
        );
        assert_eq!(f.verify(), Err(VerifyError::NotBuilt));
    }

    #[test]
    fn test_verify_ok() {
        let f = lowered(vec![
            Instruction::label(Label(1)),
            stmt("x := x - 1"),
            Instruction::branch("x > 0", Label(1)),
        ]);
        assert_eq!(f.verify(), Ok(()));
    }

    #[test]
    fn test_verify_multiple_exits() {
        let mut f = lowered(vec![stmt("x := 1")]);
        f.push_block(BasicBlock::new(vec![Instruction::Exit(UniqueId::from(7))]));
        assert_eq!(f.verify(), Err(VerifyError::MultipleExits(2)));
    }

    #[test]
    fn test_verify_misplaced_exit() {
        let mut f = lowered(vec![stmt("x := 1")]);
        let exit = f.exit().unwrap();
        f.blocks
            .get_mut(&exit)
            .unwrap()
            .instructions
            .insert(0, stmt("y := 2"));
        assert_eq!(f.verify(), Err(VerifyError::MisplacedExit(exit)));

        let mut f = lowered(vec![stmt("x := 1")]);
        let exit = f.exit().unwrap();
        f.push_block(BasicBlock::new(vec![stmt("z := 3")]));
        assert_eq!(f.verify(), Err(VerifyError::MisplacedExit(exit)));
    }

    #[test]
    fn test_verify_exit_successors() {
        let mut f = lowered(vec![stmt("x := 1")]);
        let entry = f.entry().unwrap();
        let exit = f.exit().unwrap();
        f.link(exit, entry).unwrap();
        assert_eq!(f.verify(), Err(VerifyError::ExitHasSuccessors(exit)));
    }

    #[test]
    fn test_verify_one_sided_edge() {
        let mut f = lowered(vec![stmt("x := 1")]);
        let entry = f.entry().unwrap();
        let exit = f.exit().unwrap();
        f.blocks
            .get_mut(&exit)
            .unwrap()
            .predecessors
            .shift_remove(&entry);
        assert_eq!(f.verify(), Err(VerifyError::OneSidedEdge(entry, exit)));
    }

    #[test]
    fn test_verify_dangling_edge() {
        let mut f = lowered(vec![stmt("x := 1")]);
        let entry = f.entry().unwrap();
        f.blocks
            .get_mut(&entry)
            .unwrap()
            .successors
            .insert(BlockId(99));
        assert_eq!(
            f.verify(),
            Err(VerifyError::DanglingEdge(entry, BlockId(99)))
        );
    }

    #[test]
    fn test_verify_stray_label_and_pending_jump() {
        let mut f = lowered(vec![stmt("x := 1")]);
        let entry = f.entry().unwrap();
        f.blocks
            .get_mut(&entry)
            .unwrap()
            .instructions
            .insert(0, Instruction::label(Label(3)));
        assert_eq!(f.verify(), Err(VerifyError::StrayLabel(entry, Label(3))));

        let mut f = lowered(vec![stmt("x := 1")]);
        let entry = f.entry().unwrap();
        f.blocks
            .get_mut(&entry)
            .unwrap()
            .instructions
            .push(Instruction::jump(Label(3)));
        assert_eq!(f.verify(), Err(VerifyError::UnresolvedJump(entry)));
    }

    #[test]
    fn test_verify_dangling_jump_target() {
        let mut f = lowered(vec![Instruction::label(Label(1)), Instruction::jump(Label(1))]);
        let entry = f.entry().unwrap();
        let bogus = InstRef::new(entry, 5);
        f.blocks
            .get_mut(&entry)
            .unwrap()
            .tail_mut()
            .unwrap()
            .resolve(bogus);
        assert_eq!(
            f.verify(),
            Err(VerifyError::DanglingJumpTarget(entry, bogus))
        );
    }
}
