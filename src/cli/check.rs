use std::path::PathBuf;

use clap::Args;

use crel::error::CrelError;
use crel::ir::expr::BoundExpr;
use crel::ir::loops::LoopNest;
use crel::ir::Function;

use super::emit;

#[derive(Args)]
pub struct CheckArgs {
    /// Input .kir file
    pub input: PathBuf,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn cmd_check(args: CheckArgs) -> Result<(), CrelError> {
    let module = crel::load_module(&args.input)?;
    let mut out = String::new();
    for func in &module.functions {
        out.push_str(&loop_report(func));
    }
    emit(&out, args.output.as_deref())?;
    eprintln!("OK: {}", args.input.display());
    Ok(())
}

fn loop_report(func: &Function) -> String {
    let nest = LoopNest::analyze(func);
    let kind = if func.is_kernel { "kernel" } else { "func" };
    let mut out = format!(
        "{} @{}: {} block(s), {} loop(s)\n",
        kind,
        func.name,
        func.blocks.len(),
        nest.len()
    );
    for lp in nest.iter() {
        let indent = "  ".repeat(lp.depth as usize);
        let header = &func.block(lp.header).name;
        let trip = match (&lp.trip.constant, &lp.trip.expr) {
            (Some(n), _) => n.to_string(),
            (None, BoundExpr::CouldNotCompute) => "unknown".to_string(),
            (None, expr) => expr.display(func).to_string(),
        };
        out.push_str(&format!("{}loop '{}' depth {}: trip count {}", indent, header, lp.depth, trip));
        if let Some(max) = lp.trip.max {
            out.push_str(&format!(" (max {})", max));
        }
        out.push('\n');
    }
    out
}
