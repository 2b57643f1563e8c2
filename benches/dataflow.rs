//! Dataflow and end-to-end analysis benchmarks.
//!
//! 1. Backward fixpoint over a chain of diamonds (symbolic costs)
//! 2. Full analysis of a module of matmul-like kernels

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use crel::cost::dataflow::backward_fixpoint;
use crel::cost::{FeatureSet, Mpoly};
use crel::ir::{Function, FunctionBuilder, Operand, Predicate, Type};
use crel::{parse_module, AnalysisConfig};

/// `n` diamonds in sequence: entry -> (then | else) -> join -> ... -> exit.
fn diamond_chain(n: usize) -> Function {
    let mut b = FunctionBuilder::kernel("chain");
    let x = b.param("x", Type::Int(32));
    let mut head = b.block("entry");
    for i in 0..n {
        let then = b.block(format!("then{}", i));
        let els = b.block(format!("else{}", i));
        let join = b.block(format!("join{}", i));
        b.switch_to(head);
        let c = b.icmp(&format!("c{}", i), Predicate::Slt, Operand::Value(x), Operand::Int(i as i64));
        b.cond_br(Operand::Value(c), then, els);
        b.switch_to(then);
        b.br(join);
        b.switch_to(els);
        b.br(join);
        head = join;
    }
    b.switch_to(head);
    b.ret();
    b.finish()
}

/// Alternate the costlier arm so every join changes the running maximum.
fn chain_costs(func: &Function) -> Vec<Mpoly> {
    func.block_ids()
        .map(|id| {
            let name = &func.block(id).name;
            let mut p = Mpoly::var(1, 0, (id.0 % 7) as i64 + 1, 1);
            if name.starts_with("else") {
                p.add_scalar(id.0 as i64);
            }
            p
        })
        .collect()
}

fn bench_fixpoint(c: &mut Criterion) {
    let small = diamond_chain(16);
    let large = diamond_chain(256);
    let small_costs = chain_costs(&small);
    let large_costs = chain_costs(&large);

    let mut group = c.benchmark_group("backward_fixpoint");
    group.bench_function("16_diamonds", |b| {
        b.iter(|| backward_fixpoint(black_box(&small), black_box(&small_costs), 10_000))
    });
    group.bench_function("256_diamonds", |b| {
        b.iter(|| backward_fixpoint(black_box(&large), black_box(&large_costs), 10_000))
    });
    group.finish();
}

/// Many copies of the matmul demo under distinct names.
fn matmul_module_source(copies: usize) -> String {
    let template = include_str!("../demos/matmul.kir");
    (0..copies)
        .map(|i| template.replace("@matmul", &format!("@matmul{}", i)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn bench_analyze_module(c: &mut Criterion) {
    let source = matmul_module_source(64);
    let module = match parse_module(&source) {
        Ok(m) => m,
        Err(diags) => panic!("bench source does not parse: {:?}", diags),
    };
    let parallel = AnalysisConfig::default();
    let sequential = AnalysisConfig {
        parallel: false,
        ..AnalysisConfig::default()
    };

    let mut group = c.benchmark_group("analyze_module");
    group.bench_function("64_kernels_parallel", |b| {
        b.iter(|| FeatureSet::analyze_module(black_box(&module), &parallel))
    });
    group.bench_function("64_kernels_sequential", |b| {
        b.iter(|| FeatureSet::analyze_module(black_box(&module), &sequential))
    });
    group.finish();
}

criterion_group!(benches, bench_fixpoint, bench_analyze_module);
criterion_main!(benches);
