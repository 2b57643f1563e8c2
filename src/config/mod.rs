//! Analysis configuration.
//!
//! Defaults can be overridden by a `crel.toml` file with an `[analysis]`
//! section and then by command-line flags:
//!
//! ```toml
//! [analysis]
//! features = "fan"
//! max_degree = 6
//! max_loop_depth = 5
//! max_plausible_trip_count = 4096
//! max_dataflow_sweeps = 10000
//! parallel = true
//! ```

use std::path::{Path, PathBuf};

use crate::cost::features::Vocabulary;
use crate::error::CrelError;

pub const CONFIG_FILE_NAME: &str = "crel.toml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub vocabulary: Vocabulary,
    /// Total degree above which a loop product raises `DegreeOverflow`.
    pub max_degree: u32,
    /// Loops nested deeper than this raise `ExcessiveLoopDepth`.
    pub max_loop_depth: u32,
    /// Largest max-trip-count hint trusted for an uncomputable loop bound.
    pub max_plausible_trip_count: u64,
    pub max_dataflow_sweeps: usize,
    /// Analyse the kernels of a module on the rayon thread pool.
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::Grewe,
            max_degree: 5,
            max_loop_depth: 5,
            max_plausible_trip_count: 4096,
            max_dataflow_sweeps: 10_000,
            parallel: true,
        }
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, CrelError> {
    value
        .parse()
        .map_err(|_| CrelError::Config(format!("'{}' expects a number, got '{}'", key, value)))
}

impl AnalysisConfig {
    /// Parse the `[analysis]` section of a config file. Other sections and
    /// unknown keys are ignored.
    pub fn parse(content: &str) -> Result<Self, CrelError> {
        let mut config = Self::default();
        let mut current_section = String::new();

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with('#') || trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('[') && trimmed.ends_with(']') {
                current_section = trimmed[1..trimmed.len() - 1].trim().to_string();
                continue;
            }
            if current_section != "analysis" {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(CrelError::Config(format!("expected 'key = value', got '{}'", trimmed)));
            };
            let key = key.trim().trim_matches('"');
            // Strip a trailing comment, then quotes.
            let value = value.split(" #").next().unwrap_or("").trim().trim_matches('"');

            match key {
                "features" | "vocabulary" => {
                    config.vocabulary = Vocabulary::from_name(value).ok_or_else(|| {
                        CrelError::Config(format!(
                            "unknown feature vocabulary '{}' (expected grewe, fan or full)",
                            value
                        ))
                    })?;
                }
                "max_degree" => config.max_degree = parse_number(key, value)?,
                "max_loop_depth" => config.max_loop_depth = parse_number(key, value)?,
                "max_plausible_trip_count" => {
                    config.max_plausible_trip_count = parse_number(key, value)?
                }
                "max_dataflow_sweeps" => config.max_dataflow_sweeps = parse_number(key, value)?,
                "parallel" => {
                    config.parallel = match value {
                        "true" => true,
                        "false" => false,
                        other => {
                            return Err(CrelError::Config(format!(
                                "'parallel' expects true or false, got '{}'",
                                other
                            )))
                        }
                    }
                }
                _ => {}
            }
        }

        if config.max_degree == 0 {
            return Err(CrelError::Config("'max_degree' must be at least 1".to_string()));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CrelError> {
        let content = std::fs::read_to_string(path).map_err(|e| CrelError::io(path, e))?;
        Self::parse(&content)
    }

    /// Find a `crel.toml` in `start_dir` or its ancestors.
    pub fn find(start_dir: &Path) -> Option<PathBuf> {
        let mut dir = start_dir.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_FILE_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() {
        let c = AnalysisConfig::default();
        assert_eq!(c.vocabulary, Vocabulary::Grewe);
        assert_eq!(c.max_degree, 5);
        assert_eq!(c.max_loop_depth, 5);
        assert_eq!(c.max_plausible_trip_count, 4096);
        assert_eq!(c.max_dataflow_sweeps, 10_000);
        assert!(c.parallel);
    }

    #[test]
    fn test_load_analysis_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crel.toml");
        fs::write(
            &path,
            r#"# project settings
[project]
name = "ignored"

[analysis]
features = "fan"
max_degree = 7
max_plausible_trip_count = 512 # trust smaller hints only
parallel = false
"#,
        )
        .unwrap();

        let c = AnalysisConfig::load(&path).unwrap();
        assert_eq!(c.vocabulary, Vocabulary::Fan);
        assert_eq!(c.max_degree, 7);
        assert_eq!(c.max_plausible_trip_count, 512);
        assert!(!c.parallel);
        assert_eq!(c.max_loop_depth, 5);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            AnalysisConfig::parse("[analysis]\nfeatures = \"bogus\"\n"),
            Err(CrelError::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::parse("[analysis]\nmax_degree = many\n"),
            Err(CrelError::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::parse("[analysis]\nmax_degree = 0\n"),
            Err(CrelError::Config(_))
        ));
        assert!(matches!(
            AnalysisConfig::parse("[analysis]\nparallel = maybe\n"),
            Err(CrelError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnalysisConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, CrelError::Io { .. }));
    }

    #[test]
    fn test_find_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("crel.toml"), "[analysis]\n").unwrap();
        let found = AnalysisConfig::find(&nested).unwrap();
        assert_eq!(found, dir.path().join("crel.toml"));
    }
}
