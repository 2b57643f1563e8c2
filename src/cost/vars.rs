//! Runtime variables: the indeterminates of a kernel's cost polynomials.
//!
//! Scalar kernel parameters come first, in declaration order (pointer
//! parameters cannot parametrise a count and are skipped). Then every
//! distinct geometry query found in the body, in first-seen order. A second
//! call to the same query with the same dimension is an alias of the first
//! and maps to the same variable.

use std::collections::HashMap;

use serde::Serialize;

use crate::ir::{Function, Opcode, Operand, ValueId};

// --- Geometry queries ---

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryQuery {
    GlobalId,
    LocalId,
    GlobalSize,
    LocalSize,
    NumGroups,
    GroupId,
    SubGroupSize,
    MaxSubGroupSize,
}

impl GeometryQuery {
    pub const ALL: [GeometryQuery; 8] = [
        GeometryQuery::GlobalId,
        GeometryQuery::LocalId,
        GeometryQuery::GlobalSize,
        GeometryQuery::LocalSize,
        GeometryQuery::NumGroups,
        GeometryQuery::GroupId,
        GeometryQuery::SubGroupSize,
        GeometryQuery::MaxSubGroupSize,
    ];

    pub fn builtin_name(self) -> &'static str {
        match self {
            GeometryQuery::GlobalId => "get_global_id",
            GeometryQuery::LocalId => "get_local_id",
            GeometryQuery::GlobalSize => "get_global_size",
            GeometryQuery::LocalSize => "get_local_size",
            GeometryQuery::NumGroups => "get_num_groups",
            GeometryQuery::GroupId => "get_group_id",
            GeometryQuery::SubGroupSize => "get_sub_group_size",
            GeometryQuery::MaxSubGroupSize => "get_max_sub_group_size",
        }
    }

    /// Short variable-name prefix, e.g. `gs` for `get_global_size`.
    pub fn prefix(self) -> &'static str {
        match self {
            GeometryQuery::GlobalId => "gid",
            GeometryQuery::LocalId => "lid",
            GeometryQuery::GlobalSize => "gs",
            GeometryQuery::LocalSize => "ls",
            GeometryQuery::NumGroups => "ng",
            GeometryQuery::GroupId => "grp",
            GeometryQuery::SubGroupSize => "sgs",
            GeometryQuery::MaxSubGroupSize => "msgs",
        }
    }

    /// Sub-group queries take no dimension argument.
    pub fn takes_dimension(self) -> bool {
        !matches!(self, GeometryQuery::SubGroupSize | GeometryQuery::MaxSubGroupSize)
    }

    /// Recognise a (possibly mangled) callee name. When several query names
    /// occur in it, the longest one wins.
    pub fn recognize(callee: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .filter(|q| callee.contains(q.builtin_name()))
            .max_by_key(|q| q.builtin_name().len())
    }

    pub fn variable_name(self, dimension: Option<u32>) -> String {
        match dimension {
            Some(d) => format!("{}{}", self.prefix(), d),
            None => self.prefix().to_string(),
        }
    }
}

// --- Registry ---

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VariableSource {
    Argument { position: usize },
    Geometry { query: GeometryQuery, dimension: Option<u32> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RuntimeVariable {
    pub name: String,
    /// The parameter or the first call that defines the variable.
    #[serde(skip)]
    pub definition: ValueId,
    /// Indeterminate index in the kernel's polynomials.
    pub index: usize,
    pub source: VariableSource,
}

impl RuntimeVariable {
    pub fn is_kernel_argument(&self) -> bool {
        matches!(self.source, VariableSource::Argument { .. })
    }
}

#[derive(Clone, Debug, Default)]
pub struct VariableRegistry {
    vars: Vec<RuntimeVariable>,
    /// Every defining value, aliasing calls included, to its variable index.
    by_value: HashMap<ValueId, usize>,
}

impl VariableRegistry {
    pub fn discover(func: &Function) -> Self {
        let mut registry = Self::default();

        for (position, param) in func.params.iter().enumerate() {
            if param.ty.is_pointer() {
                continue;
            }
            registry.push(
                param.name.clone(),
                param.value,
                VariableSource::Argument { position },
            );
        }

        let mut by_key: HashMap<(GeometryQuery, Option<u32>), usize> = HashMap::new();
        for block in &func.blocks {
            for inst in &block.insts {
                if inst.opcode != Opcode::Call {
                    continue;
                }
                let (Some(callee), Some(result)) = (&inst.callee, inst.result) else {
                    continue;
                };
                let Some(query) = GeometryQuery::recognize(callee) else {
                    continue;
                };
                let dimension = if query.takes_dimension() {
                    match inst.operand(0) {
                        Some(Operand::Int(d)) if d >= 0 => Some(d as u32),
                        _ => continue,
                    }
                } else {
                    None
                };
                match by_key.get(&(query, dimension)) {
                    Some(&index) => {
                        registry.by_value.insert(result, index);
                    }
                    None => {
                        let index = registry.push(
                            query.variable_name(dimension),
                            result,
                            VariableSource::Geometry { query, dimension },
                        );
                        by_key.insert((query, dimension), index);
                    }
                }
            }
        }
        registry
    }

    fn push(&mut self, name: String, definition: ValueId, source: VariableSource) -> usize {
        let index = self.vars.len();
        self.vars.push(RuntimeVariable {
            name,
            definition,
            index,
            source,
        });
        self.by_value.insert(definition, index);
        index
    }

    /// The variable `value` defines, if any.
    pub fn index_of(&self, value: ValueId) -> Option<usize> {
        self.by_value.get(&value).copied()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RuntimeVariable> {
        self.vars.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuntimeVariable> {
        self.vars.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.vars.iter().map(|v| v.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AddrSpace, FunctionBuilder, Type};

    #[test]
    fn test_recognize_prefers_longest_name() {
        assert_eq!(
            GeometryQuery::recognize("get_global_size"),
            Some(GeometryQuery::GlobalSize)
        );
        assert_eq!(
            GeometryQuery::recognize("_Z15get_global_sizej"),
            Some(GeometryQuery::GlobalSize)
        );
        assert_eq!(
            GeometryQuery::recognize("_Z22get_max_sub_group_sizev"),
            Some(GeometryQuery::MaxSubGroupSize)
        );
        assert_eq!(GeometryQuery::recognize("barrier"), None);
    }

    #[test]
    fn test_params_then_queries_in_first_seen_order() {
        let mut b = FunctionBuilder::kernel("k");
        let n = b.param("n", Type::Int(32));
        b.param("buf", Type::Ptr(AddrSpace::Global));
        let m = b.param("m", Type::Int(32));
        b.block("entry");
        let ls = b.call("ls", Type::Int(64), "get_local_size", vec![Operand::Int(0)]);
        let gs = b.call("gs", Type::Int(64), "_Z15get_global_sizej", vec![Operand::Int(1)]);
        let gs_again = b.call("gs2", Type::Int(64), "get_global_size", vec![Operand::Int(1)]);
        let sgs = b.call("sgs", Type::Int(32), "get_sub_group_size", vec![]);
        b.ret();
        let f = b.finish();

        let reg = VariableRegistry::discover(&f);
        assert_eq!(reg.names(), vec!["n", "m", "ls0", "gs1", "sgs"]);
        assert_eq!(reg.index_of(n), Some(0));
        assert_eq!(reg.index_of(m), Some(1));
        assert_eq!(reg.index_of(ls), Some(2));
        assert_eq!(reg.index_of(gs), Some(3));
        assert_eq!(reg.index_of(gs_again), Some(3));
        assert_eq!(reg.index_of(sgs), Some(4));
        assert!(reg.get(0).unwrap().is_kernel_argument());
        assert_eq!(
            reg.get(1).unwrap().source,
            VariableSource::Argument { position: 2 }
        );
        assert!(!reg.get(3).unwrap().is_kernel_argument());
    }

    #[test]
    fn test_non_literal_dimension_is_ignored() {
        let mut b = FunctionBuilder::kernel("k");
        let d = b.param("d", Type::Int(32));
        b.block("entry");
        let g = b.call("g", Type::Int(64), "get_global_id", vec![Operand::Value(d)]);
        b.ret();
        let f = b.finish();

        let reg = VariableRegistry::discover(&f);
        assert_eq!(reg.names(), vec!["d"]);
        assert_eq!(reg.index_of(g), None);
    }

    #[test]
    fn test_discovery_is_stable() {
        let mut b = FunctionBuilder::kernel("k");
        b.param("n", Type::Int(32));
        b.block("entry");
        b.call("g", Type::Int(64), "get_global_id", vec![Operand::Int(0)]);
        b.call("l", Type::Int(64), "get_local_id", vec![Operand::Int(0)]);
        b.ret();
        let f = b.finish();

        let first = VariableRegistry::discover(&f);
        let second = VariableRegistry::discover(&f);
        assert_eq!(first.names(), second.names());
        assert_eq!(first.names(), vec!["n", "gid0", "lid0"]);
    }
}
