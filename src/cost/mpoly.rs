//! Multivariate polynomials with exact rational coefficients.
//!
//! An `Mpoly` lives over a fixed number of indeterminates, one per runtime
//! variable of the kernel that created it. Terms are kept in a `BTreeMap`
//! keyed by exponent vector under degree-lexicographic order, and zero
//! coefficients are never stored, so two polynomials are equal exactly when
//! their term maps are.
//!
//! All mutating operations take `&mut self` and return `&mut Self` so they
//! can be chained: `p.add(&q).multiply(&r)`. An operation whose coefficients
//! would leave the range of `Rational` leaves the polynomial unchanged and
//! raises its overflow flag, which `take_overflow` reads and clears.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use super::rational::Rational;

/// Default bound on total degree.
pub const DEFAULT_MAX_DEGREE: u32 = 5;

/// Exponent vector of a single term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Monomial(Vec<u32>);

impl Monomial {
    pub fn one(num_vars: usize) -> Self {
        Monomial(vec![0; num_vars])
    }

    pub fn var(num_vars: usize, index: usize) -> Self {
        let mut exps = vec![0; num_vars];
        exps[index] = 1;
        Monomial(exps)
    }

    pub fn exponents(&self) -> &[u32] {
        &self.0
    }

    pub fn degree(&self) -> u32 {
        self.0.iter().sum()
    }

    pub fn is_one(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    fn mul(&self, other: &Monomial) -> Monomial {
        Monomial(self.0.iter().zip(&other.0).map(|(a, b)| a + b).collect())
    }

    /// `self / other` when `other` divides `self`.
    fn div(&self, other: &Monomial) -> Option<Monomial> {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.checked_sub(*b))
            .collect::<Option<Vec<u32>>>()
            .map(Monomial)
    }
}

impl Ord for Monomial {
    fn cmp(&self, other: &Self) -> Ordering {
        self.degree()
            .cmp(&other.degree())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for Monomial {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Outcome of `Mpoly::divide_by`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Division {
    Exact,
    /// The divisor does not evenly divide; the dividend is unchanged.
    NotExact,
    /// The divisor is the zero polynomial; the dividend is unchanged.
    ByZero,
}

#[derive(Clone, Debug)]
pub struct Mpoly {
    num_vars: usize,
    max_degree: u32,
    terms: BTreeMap<Monomial, Rational>,
    overflowed: bool,
}

type Terms = BTreeMap<Monomial, Rational>;

fn insert(terms: &mut Terms, mono: Monomial, coeff: Rational) {
    if coeff.is_zero() {
        terms.remove(&mono);
    } else {
        terms.insert(mono, coeff);
    }
}

fn accumulate(terms: &mut Terms, mono: Monomial, coeff: Rational) -> Option<()> {
    let sum = match terms.get(&mono) {
        Some(c) => c.checked_add(coeff)?,
        None => coeff,
    };
    insert(terms, mono, sum);
    Some(())
}

impl Mpoly {
    /// The zero polynomial over `num_vars` indeterminates.
    pub fn zero(num_vars: usize) -> Self {
        Self::with_max_degree(num_vars, DEFAULT_MAX_DEGREE)
    }

    pub fn with_max_degree(num_vars: usize, max_degree: u32) -> Self {
        Self {
            num_vars,
            max_degree,
            terms: BTreeMap::new(),
            overflowed: false,
        }
    }

    /// A zero polynomial with the same variables and degree bound as `self`.
    pub fn zero_like(&self) -> Self {
        Self::with_max_degree(self.num_vars, self.max_degree)
    }

    pub fn constant(num_vars: usize, value: i64) -> Self {
        let mut p = Self::zero(num_vars);
        p.set_constant_i64(value);
        p
    }

    /// `num/den · x_index`.
    pub fn var(num_vars: usize, index: usize, num: i64, den: i64) -> Self {
        let mut p = Self::zero(num_vars);
        p.set_var_coeff(index, num, den);
        p
    }

    pub fn num_vars(&self) -> usize {
        self.num_vars
    }

    pub fn max_degree(&self) -> u32 {
        self.max_degree
    }

    /// Terms in descending degree-lex order.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, &Rational)> {
        self.terms.iter().rev()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    fn insert(&mut self, mono: Monomial, coeff: Rational) {
        insert(&mut self.terms, mono, coeff);
    }

    /// Replace the terms with `compute(current)`, or keep them and flag the
    /// overflow when it returns `None`.
    fn update(&mut self, compute: impl FnOnce(&Terms) -> Option<Terms>) -> &mut Self {
        match compute(&self.terms) {
            Some(terms) => self.terms = terms,
            None => self.overflowed = true,
        }
        self
    }

    /// Whether an operation overflowed since the last call; clears the flag.
    pub fn take_overflow(&mut self) -> bool {
        std::mem::take(&mut self.overflowed)
    }

    /// Set the coefficient of the monomial `x_index` to `num/den`. Other
    /// terms are untouched. Out-of-range indices and zero denominators are
    /// ignored.
    pub fn set_var_coeff(&mut self, index: usize, num: i64, den: i64) -> &mut Self {
        if index < self.num_vars {
            if let Some(coeff) = Rational::new(num as i128, den as i128) {
                self.insert(Monomial::var(self.num_vars, index), coeff);
            }
        }
        self
    }

    /// Replace `self` with a copy of `other`.
    pub fn set(&mut self, other: &Mpoly) -> &mut Self {
        self.num_vars = other.num_vars;
        self.max_degree = other.max_degree;
        self.terms.clone_from(&other.terms);
        self.overflowed = other.overflowed;
        self
    }

    pub fn add(&mut self, other: &Mpoly) -> &mut Self {
        debug_assert_eq!(self.num_vars, other.num_vars);
        self.update(|terms| {
            let mut sum = terms.clone();
            for (mono, coeff) in &other.terms {
                accumulate(&mut sum, mono.clone(), *coeff)?;
            }
            Some(sum)
        })
    }

    pub fn sub(&mut self, other: &Mpoly) -> &mut Self {
        debug_assert_eq!(self.num_vars, other.num_vars);
        self.update(|terms| {
            let mut diff = terms.clone();
            for (mono, coeff) in &other.terms {
                accumulate(&mut diff, mono.clone(), coeff.neg())?;
            }
            Some(diff)
        })
    }

    pub fn multiply(&mut self, other: &Mpoly) -> &mut Self {
        debug_assert_eq!(self.num_vars, other.num_vars);
        self.update(|terms| {
            let mut product = Terms::new();
            for (m1, c1) in terms {
                for (m2, c2) in &other.terms {
                    accumulate(&mut product, m1.mul(m2), c1.checked_mul(*c2)?)?;
                }
            }
            Some(product)
        })
    }

    fn scale(&mut self, factor: Rational) -> &mut Self {
        if factor.is_zero() {
            self.terms.clear();
            return self;
        }
        self.update(|terms| {
            terms
                .iter()
                .map(|(mono, coeff)| Some((mono.clone(), coeff.checked_mul(factor)?)))
                .collect()
        })
    }

    /// Divide by another polynomial.
    ///
    /// A constant divisor scales every coefficient. A non-constant divisor
    /// goes through multivariate long division; when the remainder is not
    /// zero the division is abandoned and `self` keeps its old value.
    pub fn divide_by(&mut self, divisor: &Mpoly) -> Division {
        if divisor.is_zero() {
            return Division::ByZero;
        }
        if let Some(c) = divisor.constant_value() {
            match Rational::ONE.checked_div(c) {
                Some(inv) => {
                    self.scale(inv);
                }
                None => self.overflowed = true,
            }
            return Division::Exact;
        }
        match self.exact_quotient(divisor) {
            Some(q) => {
                self.terms = q.terms;
                Division::Exact
            }
            None => Division::NotExact,
        }
    }

    fn exact_quotient(&self, divisor: &Mpoly) -> Option<Mpoly> {
        let (lead_mono, lead_coeff) = divisor.terms.iter().next_back()?;
        let mut remainder = self.clone();
        let mut quotient = self.zero_like();
        while let Some((mono, coeff)) = remainder.terms.iter().next_back() {
            let q_mono = mono.div(lead_mono)?;
            let q_coeff = coeff.checked_div(*lead_coeff)?;
            for (m, c) in &divisor.terms {
                accumulate(&mut remainder.terms, m.mul(&q_mono), c.checked_mul(q_coeff)?.neg())?;
            }
            accumulate(&mut quotient.terms, q_mono, q_coeff)?;
        }
        Some(quotient)
    }

    pub fn add_scalar(&mut self, value: i64) -> &mut Self {
        let one = Monomial::one(self.num_vars);
        if accumulate(&mut self.terms, one, Rational::from_int(value)).is_none() {
            self.overflowed = true;
        }
        self
    }

    pub fn multiply_scalar(&mut self, value: i64) -> &mut Self {
        self.scale(Rational::from_int(value))
    }

    /// Divide every coefficient by `value`. Division by zero leaves the
    /// polynomial unchanged.
    pub fn divide_by_scalar(&mut self, value: i64) -> &mut Self {
        if let Some(inv) = Rational::new(1, value as i128) {
            self.scale(inv);
        }
        self
    }

    pub fn set_constant_u32(&mut self, value: u32) -> &mut Self {
        self.set_constant_i64(value as i64)
    }

    pub fn set_constant_i32(&mut self, value: i32) -> &mut Self {
        self.set_constant_i64(value as i64)
    }

    /// Replace the polynomial with the constant `value`.
    pub fn set_constant_i64(&mut self, value: i64) -> &mut Self {
        self.terms.clear();
        self.insert(Monomial::one(self.num_vars), Rational::from_int(value));
        self
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn is_constant(&self) -> bool {
        self.terms.keys().all(Monomial::is_one)
    }

    /// The value of a constant polynomial, `None` otherwise.
    pub fn constant_value(&self) -> Option<Rational> {
        if !self.is_constant() {
            return None;
        }
        Some(
            self.terms
                .get(&Monomial::one(self.num_vars))
                .copied()
                .unwrap_or(Rational::ZERO),
        )
    }

    /// Numerator of the constant term (0 when there is none).
    pub fn constant_numerator(&self) -> i128 {
        self.constant_term().numer()
    }

    /// Denominator of the constant term (1 when there is none).
    pub fn constant_denominator(&self) -> i128 {
        self.constant_term().denom()
    }

    fn constant_term(&self) -> Rational {
        self.terms
            .get(&Monomial::one(self.num_vars))
            .copied()
            .unwrap_or(Rational::ZERO)
    }

    /// Per-monomial maximum: monomials only in `other` are inserted and
    /// shared monomials keep the larger coefficient. Monomials only in
    /// `self` are kept as they are.
    ///
    /// This is an upper bound of both operands only when coefficients and
    /// variable values are non-negative, which holds for execution counts.
    pub fn maxjoin(&mut self, other: &Mpoly) -> &mut Self {
        debug_assert_eq!(self.num_vars, other.num_vars);
        for (mono, coeff) in &other.terms {
            match self.terms.get_mut(mono) {
                Some(mine) => {
                    if *coeff > *mine {
                        *mine = *coeff;
                    }
                }
                None => {
                    self.terms.insert(mono.clone(), *coeff);
                }
            }
        }
        self
    }

    /// Term-for-term equality.
    pub fn is_equal(&self, other: &Mpoly) -> bool {
        self.num_vars == other.num_vars && self.terms == other.terms
    }

    pub fn total_degree(&self) -> u32 {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    pub fn exceeds_degree_bound(&self) -> bool {
        self.total_degree() > self.max_degree
    }

    /// Evaluate at the given point. Missing values count as zero. `None`
    /// when the value does not fit a `Rational`.
    pub fn evaluate(&self, values: &[Rational]) -> Option<Rational> {
        let mut total = Rational::ZERO;
        for (mono, coeff) in &self.terms {
            let mut term = *coeff;
            for (i, &exp) in mono.exponents().iter().enumerate() {
                if exp > 0 {
                    let x = values.get(i).copied().unwrap_or(Rational::ZERO);
                    term = term.checked_mul(x.checked_pow(exp)?)?;
                }
            }
            total = total.checked_add(term)?;
        }
        Some(total)
    }

    /// Render with the given variable names, highest-degree terms first,
    /// e.g. `2*n*gs0^2 + 1/2*n - 3`.
    pub fn render(&self, names: &[String]) -> String {
        if self.terms.is_empty() {
            return "0".to_string();
        }
        let mut out = String::new();
        for (i, (mono, coeff)) in self.terms().enumerate() {
            let negative = *coeff < Rational::ZERO;
            let magnitude = if negative { coeff.neg() } else { *coeff };
            match (i, negative) {
                (0, true) => out.push('-'),
                (0, false) => {}
                (_, true) => out.push_str(" - "),
                (_, false) => out.push_str(" + "),
            }

            let mut factors = Vec::new();
            if mono.is_one() || magnitude != Rational::ONE {
                factors.push(magnitude.to_string());
            }
            for (v, &exp) in mono.exponents().iter().enumerate() {
                let name = match names.get(v) {
                    Some(n) => n.clone(),
                    None => format!("x{}", v),
                };
                match exp {
                    0 => {}
                    1 => factors.push(name),
                    e => factors.push(format!("{}^{}", name, e)),
                }
            }
            out.push_str(&factors.join("*"));
        }
        out
    }
}

impl PartialEq for Mpoly {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for Mpoly {}

impl fmt::Display for Mpoly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(&[]))
    }
}

#[cfg(test)]
mod tests;
