/// Static cost relations for data-parallel kernels.
///
/// For every kernel and every feature of the active vocabulary, computes a
/// polynomial over the kernel's runtime variables (scalar arguments and
/// work-item geometry) that bounds how often instructions of that feature
/// execute. The pipeline per kernel is: variable discovery, per-block
/// accumulation, loop multiplier resolution and propagation, then a
/// backward max-join dataflow from the exits to the entry block.
pub mod analyzer;
pub mod dataflow;
pub mod eval;
pub mod feature_set;
pub mod features;
pub mod kernel;
pub mod mpoly;
pub mod rational;
pub mod report;
pub mod vars;

use std::fmt;

use serde::Serialize;

pub use analyzer::{CostRelationAnalyzer, Stage};
pub use feature_set::FeatureSet;
pub use features::Vocabulary;
pub use kernel::Kernel;
pub use mpoly::Mpoly;
pub use rational::Rational;
pub use vars::{RuntimeVariable, VariableRegistry};

/// A recoverable problem met while analysing one kernel. The analysis
/// always continues with the documented fallback.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisWarning {
    /// An expression the evaluator cannot turn into a polynomial; it
    /// evaluates to the constant 1.
    UnsupportedExpression { kernel: String, expression: String },
    /// A loop without a symbolic trip count; the multiplier falls back to the
    /// loop's max trip count, or to 1.
    UncomputableLoopBound {
        kernel: String,
        header: String,
        fallback: u64,
    },
    ExcessiveLoopDepth {
        kernel: String,
        header: String,
        depth: u32,
    },
    /// A call that is neither a geometry query nor a known builtin.
    UnrecognizedCall { kernel: String, callee: String },
    /// A scaled block cost went past the degree bound; it is kept as is.
    DegreeOverflow {
        kernel: String,
        feature: String,
        degree: u32,
        max: u32,
    },
    DivisionByZero { kernel: String, expression: String },
    /// Scaling block costs by a loop's multiplier overflowed; those blocks
    /// keep their cost before that loop.
    CoefficientOverflow {
        kernel: String,
        header: String,
        feature: String,
    },
    DataflowSweepLimit {
        kernel: String,
        feature: String,
        sweeps: usize,
    },
}

impl AnalysisWarning {
    /// Log the warning through `tracing`.
    pub fn emit(&self) {
        tracing::warn!("{}", self);
    }
}

impl fmt::Display for AnalysisWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisWarning::UnsupportedExpression { kernel, expression } => write!(
                f,
                "in kernel '{}': unsupported expression `{}`, using 1",
                kernel, expression
            ),
            AnalysisWarning::UncomputableLoopBound {
                kernel,
                header,
                fallback,
            } => write!(
                f,
                "in kernel '{}': trip count of loop '{}' is not computable, using {}",
                kernel, header, fallback
            ),
            AnalysisWarning::ExcessiveLoopDepth {
                kernel,
                header,
                depth,
            } => write!(
                f,
                "in kernel '{}': loop '{}' is nested {} deep",
                kernel, header, depth
            ),
            AnalysisWarning::UnrecognizedCall { kernel, callee } => write!(
                f,
                "in kernel '{}': call to unrecognized function '{}' is not counted",
                kernel, callee
            ),
            AnalysisWarning::DegreeOverflow {
                kernel,
                feature,
                degree,
                max,
            } => write!(
                f,
                "in kernel '{}': cost of '{}' has degree {} (bound {})",
                kernel, feature, degree, max
            ),
            AnalysisWarning::DivisionByZero { kernel, expression } => write!(
                f,
                "in kernel '{}': division by zero in `{}`, dividend kept",
                kernel, expression
            ),
            AnalysisWarning::CoefficientOverflow {
                kernel,
                header,
                feature,
            } => write!(
                f,
                "in kernel '{}': cost of '{}' overflows when scaled by loop '{}', kept unscaled",
                kernel, feature, header
            ),
            AnalysisWarning::DataflowSweepLimit {
                kernel,
                feature,
                sweeps,
            } => write!(
                f,
                "in kernel '{}': dataflow for '{}' stopped after {} sweeps",
                kernel, feature, sweeps
            ),
        }
    }
}
