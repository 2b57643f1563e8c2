//! Backward max-join propagation of block costs to the entry block.
//!
//! Each block starts with its scaled local cost as `input` and an empty
//! `output`. A sweep visits every block with successors in layout order,
//! folds the successors' inputs into its output with `maxjoin`, and copies
//! the output back into the input. Outputs only grow, and every monomial
//! comes from a finite set, so repeated sweeps reach a fixpoint.

use tracing::debug;

use super::mpoly::Mpoly;
use crate::ir::{BlockId, Function};

#[derive(Clone, Debug)]
pub struct Fixpoint {
    /// The entry block's value.
    pub value: Mpoly,
    pub sweeps: usize,
    /// False when `max_sweeps` ran out first.
    pub converged: bool,
}

/// `local` holds one polynomial per block, indexed by `BlockId`.
pub fn backward_fixpoint(func: &Function, local: &[Mpoly], max_sweeps: usize) -> Fixpoint {
    let mut input: Vec<Mpoly> = local.to_vec();
    let mut output: Vec<Mpoly> = local.iter().map(Mpoly::zero_like).collect();
    let order: Vec<BlockId> = func
        .block_ids()
        .filter(|&b| !func.successors(b).is_empty())
        .collect();

    let mut sweeps = 0;
    let mut converged = false;
    while sweeps < max_sweeps {
        sweeps += 1;
        let mut changed = false;
        for &b in &order {
            for &s in func.successors(b) {
                output[b.0].maxjoin(&input[s.0]);
            }
            if !input[b.0].is_equal(&output[b.0]) {
                changed = true;
                input[b.0].set(&output[b.0]);
            }
        }
        if !changed {
            converged = true;
            break;
        }
    }
    debug!(function = %func.name, sweeps, converged, "dataflow finished");

    let value = match input.get(func.entry().0) {
        Some(p) => p.clone(),
        None => local.first().map(Mpoly::zero_like).unwrap_or_else(|| Mpoly::zero(0)),
    };
    Fixpoint {
        value,
        sweeps,
        converged,
    }
}
