use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use tac_cfg::function::{Function, Instruction};
use tac_cfg::variable::{Variable, VariableRole, VariableSize, VariableTable};
use tac_support::{Label, LabelAllocator, StatementType};

fn app() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("sample")
                .help("the canned function to lower")
                .index(1)
                .value_parser(["straight", "loop", "diamond", "chain"])
                .default_value("loop"),
        )
        .arg(
            Arg::new("final-only")
                .help("only dump the fully lowered function")
                .long("final-only")
                .action(ArgAction::SetTrue),
        )
}

fn stmt(ty: StatementType, text: &str) -> Result<Instruction> {
    Ok(Instruction::statement(ty, text)?)
}

fn sample(name: &str) -> Result<Vec<Instruction>> {
    type S = StatementType;

    let instructions = match name {
        "straight" => vec![
            stmt(S::Copy, "t1 := a")?,
            stmt(S::FullAssignment, "t2 := t1 + b")?,
            stmt(S::Procedural, "param t2")?,
        ],
        "loop" => vec![
            stmt(S::Copy, "i := 0")?,
            Instruction::label(Label(1)),
            stmt(S::FullAssignment, "i := i + 1")?,
            Instruction::branch("i < n", Label(1)),
            stmt(S::Procedural, "return i")?,
        ],
        "diamond" => vec![
            Instruction::branch("a < b", Label(1)),
            stmt(S::Copy, "m := b")?,
            Instruction::jump(Label(2)),
            Instruction::label(Label(1)),
            stmt(S::Copy, "m := a")?,
            Instruction::label(Label(2)),
            stmt(S::Procedural, "return m")?,
        ],
        "chain" => vec![
            Instruction::jump(Label(1)),
            Instruction::label(Label(1)),
            Instruction::label(Label(2)),
            stmt(S::NoOperation, "nop")?,
        ],
        _ => return Err(anyhow!("unknown sample: {}", name)),
    };

    Ok(instructions)
}

fn main() -> Result<()> {
    env_logger::init();
    let matches = app().get_matches();

    let name = matches
        .get_one::<String>("sample")
        .ok_or_else(|| anyhow!("missing sample name"))?;
    let final_only = matches.get_flag("final-only");

    let ids = Arc::new(LabelAllocator::new());
    let mut variables = VariableTable::default();
    for (var, role) in [("a", VariableRole::Input), ("b", VariableRole::Input)] {
        variables.insert(Variable::new(ids.next_id(), var, VariableSize::Dword, role))?;
    }

    let mut function = Function::new(name.as_str(), sample(name)?, variables, ids);

    if final_only {
        function.lower()?;
        println!("{}", function);
        return Ok(());
    }

    println!("; linear\n{}\n", function);

    function.build_cfg()?;
    println!("; built\n{}\n", function);

    function.resolve_jumps()?;
    println!("; resolved\n{}\n", function);

    let removed = function.cleanup();
    function.verify()?;
    println!("; cleaned up ({} empty block(s) removed)\n{}", removed, function);

    Ok(())
}
