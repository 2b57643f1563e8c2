use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, trace};

use super::dataflow::backward_fixpoint;
use super::eval::Evaluator;
use super::features::Classification;
use super::kernel::Kernel;
use super::mpoly::Mpoly;
use super::vars::VariableRegistry;
use super::AnalysisWarning;
use crate::config::AnalysisConfig;
use crate::ir::loops::LoopNest;
use crate::ir::Function;

// --- Pipeline stages ---

/// How far a kernel has progressed through the analysis. Stages only move
/// forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotStarted,
    PerBlockCostsComputed,
    MultipliersApplied,
    DataflowConverged,
}

// --- Cost relation analyzer ---

/// Computes the cost relations of single kernels.
///
/// The analyzer holds no per-kernel state, so one instance can be shared by
/// every worker analysing the kernels of a module.
pub struct CostRelationAnalyzer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> CostRelationAnalyzer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        self.config
    }

    /// Run the whole pipeline on one kernel. `function_index` is the
    /// position of `func` in its module.
    pub fn analyze_kernel(&self, func: &Function, function_index: usize) -> Kernel {
        let variables = VariableRegistry::discover(func);
        debug!(
            kernel = %func.name,
            variables = ?variables.names(),
            "discovered runtime variables"
        );
        let mut kernel = Kernel::new(&func.name, function_index, self.config.vocabulary, variables);
        kernel.instruction_count = func.instruction_count();

        let nest = LoopNest::analyze(func);
        debug!(kernel = %func.name, loops = nest.len(), "loop nest");

        self.accumulate(func, &mut kernel);
        kernel.stage = Stage::PerBlockCostsComputed;

        self.resolve_multipliers(func, &nest, &mut kernel);
        self.propagate_multipliers(func, &nest, &mut kernel);
        kernel.stage = Stage::MultipliersApplied;

        self.solve(func, &mut kernel);
        kernel.stage = Stage::DataflowConverged;
        kernel
    }

    fn zero(&self, kernel: &Kernel) -> Mpoly {
        Mpoly::with_max_degree(kernel.variables.len(), self.config.max_degree)
    }

    /// Count the instructions of every block into the vocabulary features.
    fn accumulate(&self, func: &Function, kernel: &mut Kernel) {
        let vocabulary = self.config.vocabulary;
        let zero = self.zero(kernel);
        kernel.block_features = func
            .blocks
            .iter()
            .map(|_| {
                vocabulary
                    .feature_names()
                    .iter()
                    .map(|&f| (f, zero.clone()))
                    .collect()
            })
            .collect();

        for (b, block) in func.blocks.iter().enumerate() {
            for inst in &block.insts {
                match vocabulary.classify(inst) {
                    Classification::Feature(name) => {
                        if let Some(p) = kernel.block_features[b].get_mut(name) {
                            p.add_scalar(1);
                        }
                    }
                    Classification::Ignored => {}
                    Classification::UnrecognizedCall(callee) => {
                        kernel.warn(AnalysisWarning::UnrecognizedCall {
                            kernel: func.name.clone(),
                            callee,
                        });
                    }
                }
            }
        }
    }

    /// One multiplier per loop, outer loops first.
    fn resolve_multipliers(&self, func: &Function, nest: &LoopNest, kernel: &mut Kernel) {
        let mut multipliers = BTreeMap::new();
        let mut warnings = Vec::new();
        {
            let mut ev = Evaluator::new(func, &kernel.variables, self.config);
            for lp in nest.iter() {
                if lp.depth > self.config.max_loop_depth {
                    let w = AnalysisWarning::ExcessiveLoopDepth {
                        kernel: func.name.clone(),
                        header: func.block(lp.header).name.clone(),
                        depth: lp.depth,
                    };
                    w.emit();
                    warnings.push(w);
                }
                let multiplier = match lp.trip.constant {
                    Some(c) => ev.constant(i64::try_from(c).unwrap_or(i64::MAX)),
                    None => ev.evaluate_bound(lp, &lp.trip.expr),
                };
                trace!(
                    kernel = %func.name,
                    header = %func.block(lp.header).name,
                    multiplier = %multiplier.render(&kernel.variables.names()),
                    "loop multiplier"
                );
                warnings.extend(ev.take_warnings());
                multipliers.insert(lp.id, multiplier);
            }
        }
        kernel.loop_multipliers = multipliers;
        kernel.warnings.extend(warnings);
    }

    /// Scale every block by the multiplier of every loop containing it.
    fn propagate_multipliers(&self, func: &Function, nest: &LoopNest, kernel: &mut Kernel) {
        let mut overflowed = BTreeSet::new();
        for lp in nest.iter() {
            let Some(multiplier) = kernel.loop_multipliers.get(&lp.id) else {
                continue;
            };
            for block in &lp.blocks {
                for (&feature, cost) in kernel.block_features[block.0].iter_mut() {
                    if cost.multiply(multiplier).take_overflow() {
                        overflowed.insert((lp.id, feature));
                    }
                }
            }
        }
        for (id, feature) in overflowed {
            let w = AnalysisWarning::CoefficientOverflow {
                kernel: func.name.clone(),
                header: func.block(nest.get(id).header).name.clone(),
                feature: feature.to_string(),
            };
            kernel.warn(w);
        }

        for &feature in self.config.vocabulary.feature_names() {
            let degree = kernel
                .block_features
                .iter()
                .filter_map(|costs| costs.get(feature))
                .filter(|p| p.exceeds_degree_bound())
                .map(Mpoly::total_degree)
                .max();
            if let Some(degree) = degree {
                let name = kernel.name.clone();
                kernel.warn(AnalysisWarning::DegreeOverflow {
                    kernel: name,
                    feature: feature.to_string(),
                    degree,
                    max: self.config.max_degree,
                });
            }
        }
    }

    /// Propagate the scaled block costs of every feature to the entry.
    fn solve(&self, func: &Function, kernel: &mut Kernel) {
        let zero = self.zero(kernel);
        for &feature in self.config.vocabulary.feature_names() {
            let local: Vec<Mpoly> = kernel
                .block_features
                .iter()
                .map(|costs| costs.get(feature).cloned().unwrap_or_else(|| zero.clone()))
                .collect();
            let result = backward_fixpoint(func, &local, self.config.max_dataflow_sweeps);
            if !result.converged {
                kernel.warn(AnalysisWarning::DataflowSweepLimit {
                    kernel: func.name.clone(),
                    feature: feature.to_string(),
                    sweeps: result.sweeps,
                });
            }
            kernel.features.insert(feature, result.value);
        }
    }
}
