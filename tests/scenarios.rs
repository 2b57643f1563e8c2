//! End-to-end analysis of kernel IR text, from parsing to entry-block
//! polynomials.

use crel::cost::report::{Bindings, Report};
use crel::cost::{AnalysisWarning, Stage};
use crel::{analyze_source, AnalysisConfig, FeatureSet, Vocabulary};

fn analyze(source: &str, vocabulary: Vocabulary) -> FeatureSet {
    let config = AnalysisConfig {
        vocabulary,
        ..AnalysisConfig::default()
    };
    match analyze_source(source, &config) {
        Ok(set) => set,
        Err(e) => panic!("analysis failed: {}", e),
    }
}

fn feature(set: &FeatureSet, kernel: &str, name: &str) -> String {
    let kernel = set.kernel(kernel).expect("kernel analysed");
    kernel.render_feature(name).expect("feature present")
}

#[test]
fn straight_line_block_counts_each_instruction_once() {
    let set = analyze(
        "\
kernel @straight(%x0: i32, %x1: i32) {
entry:
  %s = add i32 %x0, %x1
  %p = mul i32 %x0, %x1
  ret
}",
        Vocabulary::Grewe,
    );
    assert_eq!(feature(&set, "straight", "comp"), "2");
    let kernel = set.kernel("straight").unwrap();
    assert_eq!(kernel.variable_names(), vec!["x0", "x1"]);
    assert_eq!(kernel.stage, Stage::DataflowConverged);
    assert!(kernel.warnings.is_empty());

    let fan = analyze(
        "kernel @straight(%x0: i32, %x1: i32) {\nentry:\n  %s = add i32 %x0, %x1\n  %p = mul i32 %x0, %x1\n  ret\n}",
        Vocabulary::Fan,
    );
    assert_eq!(feature(&fan, "straight", "int_addsub"), "1");
    assert_eq!(feature(&fan, "straight", "int_mul"), "1");
}

#[test]
fn constant_trip_count_scales_the_body() {
    let set = analyze(
        "\
kernel @eight(%a: ptr global) {
entry:
  br loop
loop:
  %i = phi i32 [0, entry], [%i.next, loop]
  %p = gep %a, %i
  %x = load f32 %p
  %i.next = add i32 %i, 1
  %c = icmp slt %i.next, 8
  br %c, loop, exit
exit:
  ret
}",
        Vocabulary::Grewe,
    );
    assert_eq!(feature(&set, "eight", "mem"), "8");
    assert_eq!(feature(&set, "eight", "comp"), "16");
    assert_eq!(feature(&set, "eight", "rational"), "8");
}

#[test]
fn symbolic_trip_count_uses_the_geometry_variable() {
    let set = analyze(include_str!("../demos/scale.kir"), Vocabulary::Full);
    assert_eq!(set.len(), 1, "helpers are not analysed");
    assert_eq!(feature(&set, "scale", "fmul"), "gs0");
    assert_eq!(feature(&set, "scale", "add"), "gs0");
    assert_eq!(feature(&set, "scale", "fadd"), "0");
    assert_eq!(set.kernel("scale").unwrap().variable_names(), vec!["f", "gs0"]);
}

#[test]
fn branches_join_with_the_larger_cost() {
    let set = analyze(
        "\
kernel @branchy(%n: i32) {
entry:
  %c = icmp slt %n, 0
  br %c, then, else
then:
  %a1 = add i32 %n, 1
  %a2 = add i32 %a1, 1
  %a3 = add i32 %a2, 1
  %a4 = add i32 %a3, 1
  %a5 = add i32 %a4, 1
  br exit
else:
  %b1 = sub i32 %n, 1
  %b2 = sub i32 %b1, 1
  br exit
exit:
  ret
}",
        Vocabulary::Grewe,
    );
    assert_eq!(feature(&set, "branchy", "comp"), "5");
}

#[test]
fn matmul_is_linear_in_n() {
    let set = analyze(include_str!("../demos/matmul.kir"), Vocabulary::Grewe);
    let text = Report::new(&set).format_text();
    insta::assert_snapshot!(text, @r"
    Features for kernel: matmul
      variables: n, gid0, gid1
      comp       7*n + 2
      rational   n
      mem        2*n + 1
      localmem   0
      coalesced  0
      atomic     0
    ");
}

#[test]
fn matmul_evaluates_with_only_used_variables_bound() {
    let set = analyze(include_str!("../demos/matmul.kir"), Vocabulary::Grewe);
    let bindings = Bindings::parse(&["n=16"]).unwrap();
    let csv = Report::new(&set)
        .with_values(&bindings, false)
        .unwrap()
        .format_csv();
    assert!(csv.contains("matmul,comp,7*n + 2,n gid0 gid1,114\n"), "{}", csv);
    assert!(csv.contains("matmul,mem,2*n + 1,n gid0 gid1,33\n"), "{}", csv);
    assert!(csv.contains("matmul,rational,n,n gid0 gid1,16\n"), "{}", csv);
}

#[test]
fn uncomputable_loop_falls_back_to_max_trip() {
    let set = analyze(include_str!("../demos/reduce.kir"), Vocabulary::Grewe);
    let kernel = set.kernel("reduce").unwrap();
    assert_eq!(feature(&set, "reduce", "comp"), "40");
    assert_eq!(feature(&set, "reduce", "localmem"), "30");
    assert_eq!(feature(&set, "reduce", "rational"), "10");
    assert_eq!(feature(&set, "reduce", "mem"), "1");
    assert_eq!(
        kernel.warnings,
        vec![AnalysisWarning::UncomputableLoopBound {
            kernel: "reduce".to_string(),
            header: "loop".to_string(),
            fallback: 10,
        }]
    );
    assert_eq!(kernel.variable_names(), vec!["lid0", "gid0", "ls0", "grp0"]);
}

#[test]
fn every_vocabulary_reports_every_feature() {
    let source = include_str!("../demos/vadd.kir");
    for vocabulary in Vocabulary::ALL {
        let set = analyze(source, vocabulary);
        let kernel = set.kernel("vadd").unwrap();
        let names: Vec<&str> = kernel.ordered_features().map(|(n, _)| n).collect();
        assert_eq!(names, vocabulary.feature_names());
    }
}

#[test]
fn parse_errors_are_returned_together() {
    let err = analyze_source(
        "kernel @k() {\nentry:\n  %x = add i32 %nope, 1\n  br nowhere\n}",
        &AnalysisConfig::default(),
    )
    .err()
    .expect("parse error");
    match err {
        crel::CrelError::Parse { diagnostics, .. } => assert_eq!(diagnostics.len(), 2),
        other => panic!("unexpected error {}", other),
    }
}
