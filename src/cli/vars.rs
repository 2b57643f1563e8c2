use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;

use crel::cost::vars::{RuntimeVariable, VariableRegistry, VariableSource};
use crel::error::CrelError;

use super::emit;

#[derive(Args)]
pub struct VarsArgs {
    /// Input .kir file
    pub input: PathBuf,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

pub fn cmd_vars(args: VarsArgs) -> Result<(), CrelError> {
    let module = crel::load_module(&args.input)?;
    let registries: Vec<(&str, VariableRegistry)> = module
        .kernels()
        .map(|f| (f.name.as_str(), VariableRegistry::discover(f)))
        .collect();

    let text = if args.json {
        let map: BTreeMap<&str, Vec<&RuntimeVariable>> = registries
            .iter()
            .map(|(name, reg)| (*name, reg.iter().collect()))
            .collect();
        let mut json = serde_json::to_string_pretty(&map)?;
        json.push('\n');
        json
    } else {
        let mut out = String::new();
        for (name, reg) in &registries {
            out.push_str(&format!("{}\n", name));
            if reg.is_empty() {
                out.push_str("  (no runtime variables)\n");
            }
            for var in reg.iter() {
                out.push_str(&format!("  {:<6} {}\n", var.name, describe(&var.source)));
            }
        }
        out
    };
    emit(&text, args.output.as_deref())
}

fn describe(source: &VariableSource) -> String {
    match source {
        VariableSource::Argument { position } => format!("argument {}", position),
        VariableSource::Geometry {
            query,
            dimension: Some(d),
        } => format!("{}({})", query.builtin_name(), d),
        VariableSource::Geometry {
            query,
            dimension: None,
        } => format!("{}()", query.builtin_name()),
    }
}
