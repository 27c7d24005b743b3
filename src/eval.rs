//! Answer Evaluation
//!
//! Text-level checks of an agent answer against ground truth. Used by eval
//! suites that call `Agent::ask` and compare the prose it returns.

use crate::error::Result;
use crate::execution::{DataLayer, QueryOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_tolerance() -> f64 {
    0.01
}

/// One expectation about an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    ExactNumber {
        value: f64,
    },
    RowCount {
        value: f64,
    },
    ApproxNumber {
        value: f64,
        #[serde(default = "default_tolerance")]
        tolerance: f64,
        /// Treat `tolerance` as a fraction of `value` rather than an absolute delta.
        #[serde(default)]
        relative: bool,
    },
    ContainsAll {
        values: Vec<String>,
    },
    ContainsAny {
        values: Vec<String>,
    },
    OrderedList {
        values: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub passed: bool,
    pub message: String,
}

impl AssertionResult {
    fn pass(message: String) -> Self {
        Self { passed: true, message }
    }

    fn fail(message: String) -> Self {
        Self { passed: false, message }
    }
}

/// A question plus the assertions its answer must satisfy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalCase {
    #[serde(default)]
    pub id: Option<String>,
    pub question: String,
    /// Ground-truth SQL, run directly against the warehouse.
    #[serde(default)]
    pub verification_sql: Option<String>,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
}

impl EvalCase {
    pub fn label(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| self.question.chars().take(50).collect())
    }

    /// Run `verification_sql`, if the case has one.
    pub fn verify(&self, data: &DataLayer) -> Option<QueryOutcome> {
        self.verification_sql
            .as_deref()
            .map(|sql| data.execute_query(sql))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalSuite {
    #[serde(default)]
    pub cases: Vec<EvalCase>,
}

impl EvalSuite {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

/// Every number mentioned in `text`.
///
/// Handles `35,980`, `$1,006.25` and `18.6 million` style mentions; the
/// scaled value of a `million`/`billion` mention is added alongside the bare
/// number.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    let cleaned = text.replace('$', "");
    let mut numbers: Vec<f64> = Vec::new();

    if let Ok(re) = regex::Regex::new(r"[\d,]+\.?\d*") {
        numbers.extend(
            re.find_iter(&cleaned)
                .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok()),
        );
    }

    for (pattern, multiplier) in [
        (r"(?i)([\d,.]+)\s*million", 1_000_000.0),
        (r"(?i)([\d,.]+)\s*billion", 1_000_000_000.0),
    ] {
        if let Ok(re) = regex::Regex::new(pattern) {
            numbers.extend(re.captures_iter(text).filter_map(|caps| {
                caps.get(1)
                    .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
                    .map(|n| n * multiplier)
            }));
        }
    }

    numbers
}

pub fn check_assertion(answer: &str, assertion: &Assertion) -> AssertionResult {
    match assertion {
        Assertion::ExactNumber { value } | Assertion::RowCount { value } => {
            check_exact_number(answer, *value)
        }
        Assertion::ApproxNumber {
            value,
            tolerance,
            relative,
        } => check_approx_number(answer, *value, *tolerance, *relative),
        Assertion::ContainsAll { values } => check_contains_all(answer, values),
        Assertion::ContainsAny { values } => check_contains_any(answer, values),
        Assertion::OrderedList { values } => check_ordered_list(answer, values),
    }
}

fn check_exact_number(answer: &str, expected: f64) -> AssertionResult {
    let numbers = extract_numbers(answer);
    if numbers.iter().any(|n| *n == expected) {
        AssertionResult::pass(format!("Found exact number {}", expected))
    } else {
        AssertionResult::fail(format!(
            "Expected exact number {}, found: {:?}",
            expected, numbers
        ))
    }
}

fn check_approx_number(answer: &str, expected: f64, tolerance: f64, relative: bool) -> AssertionResult {
    let numbers = extract_numbers(answer);
    for n in &numbers {
        if relative {
            if expected != 0.0 && (n - expected).abs() / expected.abs() <= tolerance {
                return AssertionResult::pass(format!(
                    "Found {} within {}% of {}",
                    n,
                    tolerance * 100.0,
                    expected
                ));
            }
        } else if (n - expected).abs() <= tolerance {
            return AssertionResult::pass(format!(
                "Found {} within +/-{} of {}",
                n, tolerance, expected
            ));
        }
    }
    AssertionResult::fail(format!(
        "No number within tolerance of {} (tol={}, relative={}). Found: {:?}",
        expected, tolerance, relative, numbers
    ))
}

fn check_contains_all(answer: &str, values: &[String]) -> AssertionResult {
    let lower = answer.to_lowercase();
    let missing: Vec<&String> = values
        .iter()
        .filter(|v| !lower.contains(&v.to_lowercase()))
        .collect();
    if missing.is_empty() {
        AssertionResult::pass(format!("Answer contains all of {:?}", values))
    } else {
        AssertionResult::fail(format!(
            "Answer missing: {:?} (expected all of {:?})",
            missing, values
        ))
    }
}

fn check_contains_any(answer: &str, values: &[String]) -> AssertionResult {
    let lower = answer.to_lowercase();
    let found: Vec<&String> = values
        .iter()
        .filter(|v| lower.contains(&v.to_lowercase()))
        .collect();
    if found.is_empty() {
        AssertionResult::fail(format!("Answer contains none of {:?}", values))
    } else {
        AssertionResult::pass(format!("Answer contains: {:?}", found))
    }
}

fn check_ordered_list(answer: &str, values: &[String]) -> AssertionResult {
    let lower = answer.to_lowercase();
    let mut positions = Vec::with_capacity(values.len());
    for v in values {
        match lower.find(&v.to_lowercase()) {
            Some(pos) => positions.push(pos),
            None => {
                return AssertionResult::fail(format!(
                    "'{}' not found in answer (checking order of {:?})",
                    v, values
                ))
            }
        }
    }

    if positions.windows(2).all(|w| w[0] <= w[1]) {
        AssertionResult::pass(format!("Items appear in correct order: {:?}", values))
    } else {
        let pairs: Vec<(&String, usize)> = values.iter().zip(positions).collect();
        AssertionResult::fail(format!(
            "Items out of order. Expected {:?}, positions: {:?}",
            values, pairs
        ))
    }
}
