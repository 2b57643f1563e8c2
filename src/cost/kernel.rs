use std::collections::BTreeMap;

use super::analyzer::Stage;
use super::features::Vocabulary;
use super::mpoly::Mpoly;
use super::vars::VariableRegistry;
use super::AnalysisWarning;
use crate::ir::loops::LoopId;

/// Analysis state and results for one kernel.
///
/// `block_features` holds, per block, the local cost of each feature; once
/// the multipliers are applied those costs are scaled by every enclosing
/// loop. `features` holds the final entry-block polynomials, one per
/// vocabulary feature.
#[derive(Clone, Debug)]
pub struct Kernel {
    pub name: String,
    /// Position of the kernel's function in its module.
    pub function_index: usize,
    pub instruction_count: usize,
    pub vocabulary: Vocabulary,
    pub variables: VariableRegistry,
    pub block_features: Vec<BTreeMap<&'static str, Mpoly>>,
    pub loop_multipliers: BTreeMap<LoopId, Mpoly>,
    pub features: BTreeMap<&'static str, Mpoly>,
    pub warnings: Vec<AnalysisWarning>,
    pub stage: Stage,
}

impl Kernel {
    pub fn new(
        name: impl Into<String>,
        function_index: usize,
        vocabulary: Vocabulary,
        variables: VariableRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            function_index,
            instruction_count: 0,
            vocabulary,
            variables,
            block_features: Vec::new(),
            loop_multipliers: BTreeMap::new(),
            features: BTreeMap::new(),
            warnings: Vec::new(),
            stage: Stage::NotStarted,
        }
    }

    /// Log and record a warning.
    pub fn warn(&mut self, warning: AnalysisWarning) {
        warning.emit();
        self.warnings.push(warning);
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.names()
    }

    pub fn feature(&self, name: &str) -> Option<&Mpoly> {
        self.features.get(name)
    }

    /// Final features in vocabulary order.
    pub fn ordered_features(&self) -> impl Iterator<Item = (&'static str, &Mpoly)> {
        self.vocabulary
            .feature_names()
            .iter()
            .filter_map(|&name| self.features.get(name).map(|p| (name, p)))
    }

    /// Render a feature's polynomial with this kernel's variable names.
    pub fn render_feature(&self, name: &str) -> Option<String> {
        let names = self.variable_names();
        self.feature(name).map(|p| p.render(&names))
    }
}
