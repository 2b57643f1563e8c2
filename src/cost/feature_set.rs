use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};

use super::analyzer::CostRelationAnalyzer;
use super::features::Vocabulary;
use super::kernel::Kernel;
use crate::config::AnalysisConfig;
use crate::ir::Module;

/// Cost relations of every kernel in a module, keyed by kernel name.
#[derive(Clone, Debug)]
pub struct FeatureSet {
    pub vocabulary: Vocabulary,
    pub kernels: BTreeMap<String, Kernel>,
}

impl FeatureSet {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            kernels: BTreeMap::new(),
        }
    }

    /// Analyse every kernel of `module`. Helper functions are skipped, and
    /// so is a kernel whose name was already analysed.
    pub fn analyze_module(module: &Module, config: &AnalysisConfig) -> Self {
        let mut set = Self::new(config.vocabulary);
        set.extend_from(module, config);
        set
    }

    /// Add the kernels of `module` that are not in the set yet.
    pub fn extend_from(&mut self, module: &Module, config: &AnalysisConfig) {
        let analyzer = CostRelationAnalyzer::new(config);
        let pending: Vec<(usize, &crate::ir::Function)> = module
            .functions
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_kernel && !self.kernels.contains_key(&f.name))
            .collect();
        debug!(
            kernels = pending.len(),
            parallel = config.parallel,
            "analysing module"
        );

        let analyzed: Vec<Kernel> = if config.parallel {
            pending
                .par_iter()
                .map(|&(index, func)| analyzer.analyze_kernel(func, index))
                .collect()
        } else {
            pending
                .iter()
                .map(|&(index, func)| analyzer.analyze_kernel(func, index))
                .collect()
        };

        for kernel in analyzed {
            if self.kernels.contains_key(&kernel.name) {
                continue;
            }
            info!(
                kernel = %kernel.name,
                instructions = kernel.instruction_count,
                warnings = kernel.warnings.len(),
                "analysed kernel"
            );
            self.kernels.insert(kernel.name.clone(), kernel);
        }
    }

    pub fn kernel(&self, name: &str) -> Option<&Kernel> {
        self.kernels.get(name)
    }

    pub fn len(&self) -> usize {
        self.kernels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kernels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Kernel> {
        self.kernels.values()
    }

    pub fn warning_count(&self) -> usize {
        self.kernels.values().map(|k| k.warnings.len()).sum()
    }
}
