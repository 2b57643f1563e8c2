use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tracing::info;

use crel::cost::report::{Bindings, Format, Report};
use crel::cost::{FeatureSet, Vocabulary};
use crel::error::CrelError;

use super::{emit, resolve_config};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FeaturesArg {
    Grewe,
    Fan,
    Full,
}

impl From<FeaturesArg> for Vocabulary {
    fn from(arg: FeaturesArg) -> Self {
        match arg {
            FeaturesArg::Grewe => Vocabulary::Grewe,
            FeaturesArg::Fan => Vocabulary::Fan,
            FeaturesArg::Full => Vocabulary::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Text,
    Csv,
    Json,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Format::Text,
            FormatArg::Csv => Format::Csv,
            FormatArg::Json => Format::Json,
        }
    }
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Input .kir file
    pub input: PathBuf,
    /// Feature vocabulary (default: from crel.toml, else grewe)
    #[arg(long, value_enum)]
    pub features: Option<FeaturesArg>,
    /// Report format
    #[arg(long, value_enum, default_value_t = FormatArg::Text)]
    pub format: FormatArg,
    /// Write the report to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Evaluate every polynomial with NAME bound to VALUE (repeatable)
    #[arg(long = "bind", value_name = "NAME=VALUE")]
    pub bindings: Vec<String>,
    /// Report each evaluated feature as a fraction of the kernel's total
    #[arg(long)]
    pub normalize: bool,
    /// Config file (default: nearest crel.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
    /// Degree above which a cost raises a warning
    #[arg(long, value_name = "N")]
    pub max_degree: Option<u32>,
    /// Analyse kernels one at a time
    #[arg(long)]
    pub sequential: bool,
}

pub fn cmd_analyze(args: AnalyzeArgs) -> Result<(), CrelError> {
    let mut config = resolve_config(args.config.as_deref(), &args.input)?;
    if let Some(features) = args.features {
        config.vocabulary = features.into();
    }
    if let Some(max_degree) = args.max_degree {
        if max_degree == 0 {
            return Err(CrelError::Config("'--max-degree' must be at least 1".to_string()));
        }
        config.max_degree = max_degree;
    }
    if args.sequential {
        config.parallel = false;
    }

    let module = crel::load_module(&args.input)?;
    let set = FeatureSet::analyze_module(&module, &config);
    info!(
        kernels = set.len(),
        warnings = set.warning_count(),
        vocabulary = config.vocabulary.name(),
        "analysis complete"
    );

    let mut report = Report::new(&set);
    if !args.bindings.is_empty() || args.normalize {
        let bindings = Bindings::parse(&args.bindings[..])?;
        report = report.with_values(&bindings, args.normalize)?;
    }
    let format = args.format.into();
    match &args.output {
        Some(path) => {
            report.save(format, path)?;
            info!(path = %path.display(), "report written");
            Ok(())
        }
        None => emit(&report.render(format)?, None),
    }
}
