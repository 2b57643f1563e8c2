use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use super::feature_set::FeatureSet;
use super::features::Vocabulary;
use super::kernel::Kernel;
use super::rational::Rational;
use super::vars::RuntimeVariable;
use super::AnalysisWarning;
use crate::error::CrelError;

// --- Bindings ---

/// Concrete values for runtime variables, given as `NAME=VALUE` pairs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bindings {
    values: BTreeMap<String, Rational>,
}

impl Bindings {
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self, CrelError> {
        let mut values = BTreeMap::new();
        for spec in specs {
            let spec = spec.as_ref();
            let Some((name, value)) = spec.split_once('=') else {
                return Err(CrelError::Binding(spec.to_string()));
            };
            let name = name.trim();
            let value: i64 = value
                .trim()
                .parse()
                .map_err(|_| CrelError::Binding(spec.to_string()))?;
            if name.is_empty() {
                return Err(CrelError::Binding(spec.to_string()));
            }
            values.insert(name.to_string(), Rational::from_int(value));
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<Rational> {
        self.values.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// --- Evaluation ---

/// Substitute `bindings` into every feature of `kernel`, in vocabulary order.
///
/// Only variables that occur in some polynomial need a binding.
pub fn evaluate_kernel(
    kernel: &Kernel,
    bindings: &Bindings,
) -> Result<Vec<(&'static str, Rational)>, CrelError> {
    let mut values = Vec::with_capacity(kernel.variables.len());
    for var in kernel.variables.iter() {
        let used = kernel
            .features
            .values()
            .any(|p| p.terms().any(|(mono, _)| mono.exponents()[var.index] > 0));
        match bindings.get(&var.name) {
            Some(v) => values.push(v),
            None if !used => values.push(Rational::ZERO),
            None => {
                return Err(CrelError::UnboundVariable {
                    kernel: kernel.name.clone(),
                    variable: var.name.clone(),
                })
            }
        }
    }
    kernel
        .ordered_features()
        .map(|(name, p)| match p.evaluate(&values) {
            Some(value) => Ok((name, value)),
            None => Err(CrelError::ValueOverflow {
                kernel: kernel.name.clone(),
                feature: name.to_string(),
            }),
        })
        .collect()
}

/// Divide every value by the sum of all values. A zero sum yields zeros.
/// `None` when the sum or a share does not fit a `Rational`.
pub fn normalize(values: &mut [(&'static str, Rational)]) -> Option<()> {
    let total = values
        .iter()
        .try_fold(Rational::ZERO, |acc, (_, v)| acc.checked_add(*v))?;
    for (_, v) in values.iter_mut() {
        *v = if total.is_zero() {
            Rational::ZERO
        } else {
            v.checked_div(total)?
        };
    }
    Some(())
}

fn approximate(r: Rational) -> f64 {
    r.numer() as f64 / r.denom() as f64
}

// --- Report ---

/// Output format of `crel analyze`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Text,
    Csv,
    Json,
}

/// A feature set ready for printing, optionally with evaluated values.
pub struct Report<'a> {
    set: &'a FeatureSet,
    values: Option<BTreeMap<String, Vec<(&'static str, Rational)>>>,
    normalized: bool,
}

impl<'a> Report<'a> {
    pub fn new(set: &'a FeatureSet) -> Self {
        Self {
            set,
            values: None,
            normalized: false,
        }
    }

    /// Evaluate every kernel under `bindings`, optionally normalizing each
    /// kernel's values to fractions of its total.
    pub fn with_values(mut self, bindings: &Bindings, normalized: bool) -> Result<Self, CrelError> {
        let mut values = BTreeMap::new();
        for kernel in self.set.iter() {
            let mut kv = evaluate_kernel(kernel, bindings)?;
            if normalized && normalize(&mut kv).is_none() {
                return Err(CrelError::ValueOverflow {
                    kernel: kernel.name.clone(),
                    feature: "total".to_string(),
                });
            }
            values.insert(kernel.name.clone(), kv);
        }
        self.values = Some(values);
        self.normalized = normalized;
        Ok(self)
    }

    fn value_of(&self, kernel: &str, feature: &str) -> Option<Rational> {
        self.values
            .as_ref()?
            .get(kernel)?
            .iter()
            .find(|(name, _)| *name == feature)
            .map(|(_, v)| *v)
    }

    pub fn render(&self, format: Format) -> Result<String, CrelError> {
        match format {
            Format::Text => Ok(self.format_text()),
            Format::Csv => Ok(self.format_csv()),
            Format::Json => self.to_json(),
        }
    }

    /// Write the rendered report to `path`.
    pub fn save(&self, format: Format, path: &Path) -> Result<(), CrelError> {
        let text = self.render(format)?;
        std::fs::write(path, text).map_err(|e| CrelError::io(path, e))
    }

    // --- Text ---

    pub fn format_text(&self) -> String {
        let mut out = String::new();
        for (i, kernel) in self.set.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&self.format_kernel(kernel));
        }
        out
    }

    fn format_kernel(&self, kernel: &Kernel) -> String {
        let names = kernel.variable_names();
        let mut out = String::new();
        out.push_str(&format!("Features for kernel: {}\n", kernel.name));
        if names.is_empty() {
            out.push_str("  variables: (none)\n");
        } else {
            out.push_str(&format!("  variables: {}\n", names.join(", ")));
        }

        let width = kernel
            .vocabulary
            .feature_names()
            .iter()
            .map(|n| n.len())
            .max()
            .unwrap_or(0);
        let rows: Vec<(&str, String)> = kernel
            .ordered_features()
            .map(|(name, p)| (name, p.render(&names)))
            .collect();
        let poly_width = rows.iter().map(|(_, p)| p.len()).max().unwrap_or(0);
        for (name, poly) in &rows {
            match self.value_of(&kernel.name, name) {
                Some(v) => out.push_str(&format!(
                    "  {:<width$}  {:<poly_width$}  = {}\n",
                    name,
                    poly,
                    v,
                    width = width,
                    poly_width = poly_width
                )),
                None => out.push_str(&format!("  {:<width$}  {}\n", name, poly, width = width)),
            }
        }
        if !kernel.warnings.is_empty() {
            out.push_str(&format!("  warnings: {}\n", kernel.warnings.len()));
        }
        out
    }

    // --- CSV ---

    pub fn format_csv(&self) -> String {
        let mut out = String::from("kernel,feature,polynomial,variables");
        if self.values.is_some() {
            out.push_str(if self.normalized { ",share" } else { ",value" });
        }
        out.push('\n');
        for kernel in self.set.iter() {
            let names = kernel.variable_names();
            let variables = names.join(" ");
            for (name, p) in kernel.ordered_features() {
                out.push_str(&csv_field(&kernel.name));
                out.push(',');
                out.push_str(name);
                out.push(',');
                out.push_str(&csv_field(&p.render(&names)));
                out.push(',');
                out.push_str(&csv_field(&variables));
                if let Some(v) = self.value_of(&kernel.name, name) {
                    out.push(',');
                    out.push_str(&v.to_string());
                }
                out.push('\n');
            }
        }
        out
    }

    // --- JSON ---

    pub fn to_json(&self) -> Result<String, CrelError> {
        let kernels = self
            .set
            .iter()
            .map(|kernel| {
                let names = kernel.variable_names();
                JsonKernel {
                    name: &kernel.name,
                    instruction_count: kernel.instruction_count,
                    variables: kernel.variables.iter().collect(),
                    features: kernel
                        .ordered_features()
                        .map(|(name, p)| {
                            let value = self.value_of(&kernel.name, name);
                            JsonFeature {
                                name,
                                polynomial: p.render(&names),
                                degree: p.total_degree(),
                                value: value.map(|v| v.to_string()),
                                approx: value.map(approximate),
                            }
                        })
                        .collect(),
                    warnings: &kernel.warnings,
                }
            })
            .collect();
        let report = JsonReport {
            vocabulary: self.set.vocabulary,
            normalized: self.normalized,
            kernels,
        };
        let mut text = serde_json::to_string_pretty(&report)?;
        text.push('\n');
        Ok(text)
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    vocabulary: Vocabulary,
    normalized: bool,
    kernels: Vec<JsonKernel<'a>>,
}

#[derive(Serialize)]
struct JsonKernel<'a> {
    name: &'a str,
    instruction_count: usize,
    variables: Vec<&'a RuntimeVariable>,
    features: Vec<JsonFeature>,
    warnings: &'a [AnalysisWarning],
}

#[derive(Serialize)]
struct JsonFeature {
    name: &'static str,
    polynomial: String,
    degree: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    approx: Option<f64>,
}
