//! Natural-loop detection.
//!
//! Back edges are found with the dominator sets of `Function`: an edge `u -> h` is
//! a back edge when `h` dominates `u`. Every back edge into the same header
//! contributes to one loop whose body is everything that reaches a latch
//! without passing through the header. Nesting follows from body
//! containment.

use std::collections::BTreeSet;

use super::trip::{self, TripCount};
use super::{BlockId, Function};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoopId(pub usize);

#[derive(Clone, Debug)]
pub struct Loop {
    pub id: LoopId,
    pub header: BlockId,
    pub latches: Vec<BlockId>,
    pub blocks: BTreeSet<BlockId>,
    /// 1 for outermost loops.
    pub depth: u32,
    pub parent: Option<LoopId>,
    pub children: Vec<LoopId>,
    pub trip: TripCount,
}

impl Loop {
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    /// Blocks inside the loop with a successor outside it.
    pub fn exiting_blocks(&self, func: &Function) -> Vec<BlockId> {
        self.blocks
            .iter()
            .copied()
            .filter(|&b| func.successors(b).iter().any(|s| !self.contains(*s)))
            .collect()
    }
}

/// All loops of a function. Ids follow a preorder walk of the nesting
/// forest, outer loops before inner ones and siblings in layout order.
#[derive(Clone, Debug, Default)]
pub struct LoopNest {
    loops: Vec<Loop>,
}

struct RawLoop {
    header: BlockId,
    latches: Vec<BlockId>,
    blocks: BTreeSet<BlockId>,
}

impl LoopNest {
    pub fn analyze(func: &Function) -> Self {
        if func.blocks.is_empty() {
            return Self::default();
        }
        let raw = find_natural_loops(func);
        let mut nest = order_and_nest(raw);
        for i in 0..nest.loops.len() {
            let trip = trip::analyze(func, &nest, LoopId(i));
            nest.loops[i].trip = trip;
        }
        nest
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id.0]
    }

    /// Loops in preorder.
    pub fn iter(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter()
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Loop> {
        self.loops.iter().filter(|l| l.parent.is_none())
    }

    /// The innermost loop containing `block`.
    pub fn innermost_containing(&self, block: BlockId) -> Option<&Loop> {
        self.loops
            .iter()
            .filter(|l| l.contains(block))
            .max_by_key(|l| l.depth)
    }

    /// `id` and every loop enclosing it, innermost first.
    pub fn ancestors(&self, id: LoopId) -> impl Iterator<Item = &Loop> {
        let mut next = Some(id);
        std::iter::from_fn(move || {
            let current = next?;
            let lp = &self.loops[current.0];
            next = lp.parent;
            Some(lp)
        })
    }
}

fn find_natural_loops(func: &Function) -> Vec<RawLoop> {
    let doms = func.dominator_sets();

    let mut raw: Vec<RawLoop> = Vec::new();
    for latch in func.block_ids() {
        // Unreachable blocks have no dominators and belong to no loop.
        let Some(dominating) = &doms[latch.0] else {
            continue;
        };
        for &header in func.successors(latch) {
            if !dominating.contains(&header) {
                continue;
            }
            let body = natural_loop_body(func, header, latch);
            match raw.iter_mut().find(|l| l.header == header) {
                Some(existing) => {
                    existing.latches.push(latch);
                    existing.blocks.extend(body);
                }
                None => raw.push(RawLoop {
                    header,
                    latches: vec![latch],
                    blocks: body,
                }),
            }
        }
    }
    raw
}

fn natural_loop_body(func: &Function, header: BlockId, latch: BlockId) -> BTreeSet<BlockId> {
    let mut body = BTreeSet::from([header]);
    let mut stack = vec![latch];
    while let Some(b) = stack.pop() {
        if body.insert(b) {
            stack.extend(func.predecessors(b));
        }
    }
    body
}

fn order_and_nest(mut raw: Vec<RawLoop>) -> LoopNest {
    // Larger bodies first so that every loop's parent precedes it.
    raw.sort_by(|a, b| {
        b.blocks
            .len()
            .cmp(&a.blocks.len())
            .then(a.header.cmp(&b.header))
    });

    let mut parent_of: Vec<Option<usize>> = vec![None; raw.len()];
    for i in 0..raw.len() {
        // The smallest strictly larger loop holding our header is the parent;
        // it is the last such loop in size-descending order.
        parent_of[i] = (0..i)
            .rev()
            .find(|&j| raw[j].blocks.contains(&raw[i].header) && raw[j].header != raw[i].header);
    }

    let mut children_of: Vec<Vec<usize>> = vec![Vec::new(); raw.len()];
    let mut roots = Vec::new();
    for (i, parent) in parent_of.iter().enumerate() {
        match parent {
            Some(p) => children_of[*p].push(i),
            None => roots.push(i),
        }
    }
    roots.sort_by_key(|&i| raw[i].header);
    for children in &mut children_of {
        children.sort_by_key(|&i| raw[i].header);
    }

    let mut order = Vec::with_capacity(raw.len());
    let mut stack: Vec<usize> = roots.into_iter().rev().collect();
    while let Some(i) = stack.pop() {
        order.push(i);
        stack.extend(children_of[i].iter().rev());
    }

    let mut new_id = vec![0usize; raw.len()];
    for (pos, &old) in order.iter().enumerate() {
        new_id[old] = pos;
    }

    let mut loops: Vec<Loop> = Vec::with_capacity(raw.len());
    let mut slots: Vec<Option<RawLoop>> = raw.into_iter().map(Some).collect();
    for (pos, &old) in order.iter().enumerate() {
        let Some(r) = slots[old].take() else { continue };
        let parent = parent_of[old].map(|p| LoopId(new_id[p]));
        let depth = match parent {
            Some(p) => loops[p.0].depth + 1,
            None => 1,
        };
        loops.push(Loop {
            id: LoopId(pos),
            header: r.header,
            latches: r.latches,
            blocks: r.blocks,
            depth,
            parent,
            children: children_of[old].iter().map(|&c| LoopId(new_id[c])).collect(),
            trip: TripCount::unknown(),
        });
    }
    LoopNest { loops }
}
