pub mod analyze;
pub mod check;
pub mod vars;

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crel::config::AnalysisConfig;
use crel::error::CrelError;

/// Load the analysis config: an explicit `--config` file, else a
/// `crel.toml` next to the input or in one of its ancestors, else defaults.
pub fn resolve_config(explicit: Option<&Path>, input: &Path) -> Result<AnalysisConfig, CrelError> {
    let found: Option<PathBuf> = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => {
            let dir = input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            AnalysisConfig::find(dir)
        }
    };
    match found {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            AnalysisConfig::load(&path)
        }
        None => Ok(AnalysisConfig::default()),
    }
}

/// Print `text` to stdout, or write it to `output`.
pub fn emit(text: &str, output: Option<&Path>) -> Result<(), CrelError> {
    match output {
        Some(path) => {
            std::fs::write(path, text).map_err(|e| CrelError::io(path, e))?;
            info!(path = %path.display(), "report written");
            Ok(())
        }
        None => {
            print!("{}", text);
            Ok(())
        }
    }
}
