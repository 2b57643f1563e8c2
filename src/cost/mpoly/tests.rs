use super::*;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn q(n: i128, d: i128) -> Rational {
    Rational::new(n, d).unwrap()
}

/// 3·x0·x1 + x0 - 2 over two variables.
fn sample() -> Mpoly {
    let mut p = Mpoly::var(2, 0, 3, 1);
    p.multiply(&Mpoly::var(2, 1, 1, 1));
    p.add(&Mpoly::var(2, 0, 1, 1)).add_scalar(-2);
    p
}

#[test]
fn test_zero_and_constants() {
    let z = Mpoly::zero(3);
    assert!(z.is_zero());
    assert!(z.is_constant());
    assert_eq!(z.constant_numerator(), 0);
    assert_eq!(z.constant_denominator(), 1);
    assert_eq!(z.render(&[]), "0");

    let mut c = Mpoly::zero(3);
    c.set_constant_u32(7);
    assert!(c.is_constant());
    assert_eq!(c.constant_value(), Some(Rational::from_int(7)));
    c.set_constant_i32(-4);
    assert_eq!(c.constant_numerator(), -4);
    c.divide_by_scalar(6);
    assert_eq!(c.constant_numerator(), -2);
    assert_eq!(c.constant_denominator(), 3);
}

#[test]
fn test_add_then_sub_restores() {
    let a = sample();
    let b = Mpoly::var(2, 1, 5, 2);
    let mut r = a.clone();
    r.add(&b).sub(&b);
    assert!(r.is_equal(&a));
}

#[test]
fn test_multiply_then_divide_restores() {
    let a = sample();
    let mut c = Mpoly::var(2, 1, 2, 1);
    c.add_scalar(1);
    let mut r = a.clone();
    r.multiply(&c);
    assert_eq!(r.total_degree(), 3);
    assert_eq!(r.divide_by(&c), Division::Exact);
    assert_eq!(r, a);
}

#[test]
fn test_divide_by_constant_polynomial() {
    let mut p = Mpoly::var(1, 0, 3, 1);
    assert_eq!(p.divide_by(&Mpoly::constant(1, 4)), Division::Exact);
    assert_eq!(p.render(&names(&["n"])), "3/4*n");
}

#[test]
fn test_inexact_division_keeps_dividend() {
    // 3·x1 / x0 does not divide.
    let mut p = Mpoly::var(2, 1, 3, 1);
    let before = p.clone();
    assert_eq!(p.divide_by(&Mpoly::var(2, 0, 1, 1)), Division::NotExact);
    assert_eq!(p, before);

    // x0 + 1 / x0 leaves a remainder.
    let mut p = Mpoly::var(2, 0, 1, 1);
    p.add_scalar(1);
    let before = p.clone();
    assert_eq!(p.divide_by(&Mpoly::var(2, 0, 1, 1)), Division::NotExact);
    assert_eq!(p, before);
}

#[test]
fn test_division_by_zero_is_refused() {
    let mut p = sample();
    assert_eq!(p.divide_by(&Mpoly::zero(2)), Division::ByZero);
    assert_eq!(p, sample());
    p.divide_by_scalar(0);
    assert_eq!(p, sample());
}

#[test]
fn test_maxjoin_takes_larger_coefficients() {
    let mut a = Mpoly::var(2, 0, 3, 1);
    a.add_scalar(1);
    let mut b = Mpoly::var(2, 0, 2, 1);
    b.add(&Mpoly::var(2, 1, 1, 1)).add_scalar(4);

    let mut ab = a.clone();
    ab.maxjoin(&b);
    let mut ba = b.clone();
    ba.maxjoin(&a);
    assert_eq!(ab, ba);
    assert_eq!(ab.render(&names(&["n", "m"])), "3*n + m + 4");
}

#[test]
fn test_maxjoin_idempotent() {
    let a = sample();
    let mut r = a.clone();
    r.maxjoin(&a).maxjoin(&a);
    assert_eq!(r, a);
}

#[test]
fn test_maxjoin_keeps_terms_missing_from_other() {
    let mut a = Mpoly::var(2, 0, 1, 1);
    a.maxjoin(&Mpoly::constant(2, 5));
    assert_eq!(a.render(&names(&["x", "y"])), "x + 5");
}

#[test]
fn test_set_var_coeff_updates_single_term() {
    let mut p = sample();
    p.set_var_coeff(0, 1, 2);
    assert_eq!(p.render(&names(&["a", "b"])), "3*a*b + 1/2*a - 2");
    p.set_var_coeff(0, 0, 1);
    assert_eq!(p.render(&names(&["a", "b"])), "3*a*b - 2");
    p.set_var_coeff(9, 1, 1);
    assert_eq!(p.term_count(), 2);
}

#[test]
fn test_render_orders_by_degree_then_lex() {
    let mut p = Mpoly::var(2, 1, 1, 1);
    let mut sq = Mpoly::var(2, 1, 1, 1);
    sq.multiply(&Mpoly::var(2, 1, 1, 1)).multiply(&Mpoly::var(2, 0, 2, 1));
    p.add(&sq).add(&Mpoly::var(2, 0, -1, 2)).add_scalar(-3);
    assert_eq!(
        p.render(&names(&["n", "gs0"])),
        "2*n*gs0^2 - 1/2*n + gs0 - 3"
    );
    assert_eq!(p.to_string(), "2*x0*x1^2 - 1/2*x0 + x1 - 3");
}

#[test]
fn test_render_leading_negative() {
    let p = Mpoly::var(1, 0, -1, 1);
    assert_eq!(p.render(&names(&["n"])), "-n");
}

#[test]
fn test_degree_bound() {
    let mut p = Mpoly::with_max_degree(1, 2);
    p.set_constant_i64(1);
    let x = Mpoly::var(1, 0, 1, 1);
    p.multiply(&x).multiply(&x);
    assert!(!p.exceeds_degree_bound());
    p.multiply(&x);
    assert_eq!(p.total_degree(), 3);
    assert!(p.exceeds_degree_bound());
    // Nothing is truncated.
    assert_eq!(p.term_count(), 1);
}

#[test]
fn test_evaluate_is_exact() {
    let p = sample();
    // 3·2·5 + 2 - 2 = 30
    assert_eq!(p.evaluate(&[q(2, 1), q(5, 1)]), Some(q(30, 1)));
    let mut half = Mpoly::var(1, 0, 1, 2);
    half.add_scalar(1);
    assert_eq!(half.evaluate(&[q(3, 1)]), Some(q(5, 2)));
}

#[test]
fn test_overflow_keeps_terms_and_sets_flag() {
    let mut p = Mpoly::var(1, 0, 1, 1);
    p.multiply_scalar(1 << 62).multiply_scalar(1 << 62);
    assert!(!p.take_overflow());
    let before = p.clone();

    p.multiply_scalar(1 << 62);
    assert_eq!(p, before);
    assert!(p.take_overflow());
    assert!(!p.take_overflow());

    let mut big = before.clone();
    big.multiply_scalar(4);
    let mut sum = big.clone();
    sum.add(&big);
    assert!(sum.take_overflow());
    assert_eq!(sum, big);

    let mut c = Mpoly::constant(1, i64::MAX);
    c.add_scalar(1);
    assert!(!c.take_overflow());
    assert!(c.evaluate(&[]).is_some());
}

#[test]
fn test_evaluate_overflow_is_none() {
    let mut p = Mpoly::var(1, 0, 1, 1);
    p.multiply(&Mpoly::var(1, 0, 1, 1));
    assert_eq!(p.evaluate(&[q(1 << 62, 1)]), Some(q(1 << 124, 1)));
    assert_eq!(p.evaluate(&[q(1 << 64, 1)]), None);
}
