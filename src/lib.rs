pub mod config;
pub mod cost;
pub mod diagnostic;
pub mod error;
pub mod ir;
pub mod span;
pub mod syntax;

use std::path::Path;

pub use config::AnalysisConfig;
pub use cost::{AnalysisWarning, CostRelationAnalyzer, FeatureSet, Kernel, Mpoly, Vocabulary};
pub use error::CrelError;
pub use syntax::{load_module, parse_module};

/// Load a `.kir` file and compute the feature set of every kernel in it.
pub fn analyze_file(path: &Path, config: &AnalysisConfig) -> Result<FeatureSet, CrelError> {
    let module = load_module(path)?;
    Ok(FeatureSet::analyze_module(&module, config))
}

/// Compute the feature set of kernel IR text already in memory.
pub fn analyze_source(source: &str, config: &AnalysisConfig) -> Result<FeatureSet, CrelError> {
    let module = parse_module(source).map_err(|diagnostics| CrelError::Parse {
        path: "<input>".into(),
        source_text: source.to_string(),
        diagnostics,
    })?;
    Ok(FeatureSet::analyze_module(&module, config))
}
