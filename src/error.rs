use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostic::Diagnostic;

/// Errors that abort a `crel` invocation.
///
/// Analysis problems inside a kernel are never errors; they are recorded as
/// `cost::AnalysisWarning`s and the analysis continues.
#[derive(Debug, Error)]
pub enum CrelError {
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} error(s) in '{}'", diagnostics.len(), path.display())]
    Parse {
        path: PathBuf,
        source_text: String,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid binding '{0}': expected NAME=VALUE with an integer VALUE")]
    Binding(String),

    #[error("kernel '{kernel}' has no binding for runtime variable '{variable}'")]
    UnboundVariable { kernel: String, variable: String },

    #[error("value of '{feature}' in kernel '{kernel}' does not fit an exact 128-bit rational")]
    ValueOverflow { kernel: String, feature: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl CrelError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrelError::Io {
            path: path.into(),
            source,
        }
    }

    /// Print source-located diagnostics when the error carries them.
    pub fn render(&self) {
        if let CrelError::Parse {
            path,
            source_text,
            diagnostics,
        } = self
        {
            let filename = path.display().to_string();
            crate::diagnostic::render_diagnostics(diagnostics, &filename, source_text);
        }
    }
}
