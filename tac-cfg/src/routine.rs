//! Models and functionality for routines: described collections of functions.

use crate::error::Error;
use crate::function::Function;

/// A collection of functions that are lowered together.
#[derive(Debug, Default)]
pub struct Routine {
    description: String,
    functions: Vec<Function>,
}

impl Routine {
    /// Create a new, empty routine.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            functions: Vec::new(),
        }
    }

    /// Returns this routine's description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Add a function to this routine.
    pub fn push(&mut self, function: Function) {
        self.functions.push(function);
    }

    /// Returns this routine's functions, in the order they were added.
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Returns this routine's functions mutably, in the order they were added.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Returns the first function with the given name, if any.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Lower every function in this routine.
    ///
    /// Functions are lowered independently: one failing doesn't stop the rest.
    /// Every failure is returned, tagged with its function's name, in the
    /// order the functions were added.
    pub fn lower_all(&mut self) -> Vec<Error> {
        let mut errors = Vec::new();
        for function in self.functions.iter_mut() {
            if let Err(e) = function.lower() {
                log::debug!("{}: lowering failed: {}", function.name(), e);
                errors.push(Error::Function {
                    name: function.name().into(),
                    source: e,
                });
            }
        }

        log::debug!(
            "routine '{}': lowered {} of {} function(s)",
            self.description,
            self.functions.len() - errors.len(),
            self.functions.len()
        );
        errors
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use tac_support::{Label, LabelAllocator, StatementType};

    use super::*;
    use crate::function::{FunctionError, Instruction, Stage};
    use crate::variable::VariableTable;

    fn function(name: &str, instructions: Vec<Instruction>, ids: &Arc<LabelAllocator>) -> Function {
        Function::new(name, instructions, VariableTable::default(), Arc::clone(ids))
    }

    fn stmt(text: &str) -> Instruction {
        Instruction::statement(StatementType::FullAssignment, text).unwrap()
    }

    #[test]
    fn test_routine_lookup() {
        let ids = Arc::new(LabelAllocator::new());
        let mut routine = Routine::new("demo");
        routine.push(function("a", vec![stmt("x := y + z")], &ids));
        routine.push(function("b", vec![], &ids));

        assert_eq!(routine.description(), "demo");
        assert_eq!(routine.functions().len(), 2);
        assert_eq!(routine.function("b").unwrap().name(), "b");
        assert!(routine.function("c").is_none());
    }

    #[test]
    fn test_lower_all_isolates_failures() {
        let ids = Arc::new(LabelAllocator::starting_at(1));
        let mut routine = Routine::new("mixed");
        routine.push(function("good", vec![stmt("x := y + z")], &ids));
        routine.push(function(
            "bad",
            vec![Instruction::jump(Label(5))],
            &ids,
        ));
        routine.push(function(
            "looping",
            vec![
                Instruction::label(Label(1)),
                Instruction::branch("x < 3", Label(1)),
            ],
            &ids,
        ));

        let errors = routine.lower_all();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].function_name(), Some("bad"));
        assert!(matches!(
            errors[0],
            Error::Function {
                source: FunctionError::UnresolvedLabelReference(Label(5)),
                ..
            }
        ));

        // The siblings on either side of the failure were still lowered.
        assert_eq!(routine.function("good").unwrap().stage(), Stage::Resolved);
        assert_eq!(routine.function("looping").unwrap().stage(), Stage::Resolved);
        assert_eq!(routine.function("bad").unwrap().stage(), Stage::Linear);
    }

    #[test]
    fn test_lower_on_threads() {
        let ids = Arc::new(LabelAllocator::new());
        let functions = (0..4)
            .map(|n| function(&format!("f{}", n), vec![stmt("x := x * 2")], &ids))
            .collect::<Vec<_>>();

        let handles = functions
            .into_iter()
            .map(|mut f| {
                thread::spawn(move || {
                    f.lower().unwrap();
                    f
                })
            })
            .collect::<Vec<_>>();

        let exits = handles
            .into_iter()
            .map(|h| {
                let f = h.join().unwrap();
                f.block(f.exit().unwrap()).unwrap().instructions()[0].clone()
            })
            .collect::<Vec<_>>();

        // Every exit drew a distinct ID from the shared allocator.
        let mut rendered = exits.iter().map(ToString::to_string).collect::<Vec<_>>();
        rendered.sort();
        rendered.dedup();
        assert_eq!(rendered.len(), 4);
    }
}
