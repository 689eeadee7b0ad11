//! Rule Tables and Fixed-Edge Binning
//!
//! Domain heuristics are expressed as ordered decision tables instead of a
//! sequence of assignments, so the "later rule overwrites earlier" semantics
//! is visible and testable.

use crate::FeatureError;
use serde::{Deserialize, Serialize};

/// Inputs the activity heuristics look at
#[derive(Debug, Clone, Copy)]
pub struct RuleInput {
    pub heart_rate: f64,
    pub step_count: f64,
    /// GPS speed in meters per minute
    pub speed: f64,
}

/// A named predicate producing `value` when it holds
#[derive(Clone)]
pub struct Rule<I> {
    pub name: &'static str,
    pub predicate: fn(&I) -> bool,
    pub value: f64,
}

impl<I> std::fmt::Debug for Rule<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("value", &self.value)
            .finish()
    }
}

/// Ordered list of rules evaluated top to bottom; the last matching rule wins
#[derive(Debug, Clone)]
pub struct DecisionTable<I> {
    pub name: &'static str,
    default: f64,
    rules: Vec<Rule<I>>,
}

impl<I> DecisionTable<I> {
    /// Create an empty table yielding `default`
    pub fn new(name: &'static str, default: f64) -> Self {
        Self {
            name,
            default,
            rules: Vec::new(),
        }
    }

    /// Single-rule boolean flag: 1 when `predicate` holds, else 0
    pub fn flag(name: &'static str, predicate: fn(&I) -> bool) -> Self {
        Self::new(name, 0.0).rule(name, predicate, 1.0)
    }

    /// Append a rule after the existing ones
    pub fn rule(mut self, name: &'static str, predicate: fn(&I) -> bool, value: f64) -> Self {
        self.rules.push(Rule {
            name,
            predicate,
            value,
        });
        self
    }

    /// Evaluate every rule in declared order
    pub fn evaluate(&self, input: &I) -> f64 {
        self.rules.iter().fold(self.default, |acc, rule| {
            if (rule.predicate)(input) {
                rule.value
            } else {
                acc
            }
        })
    }

    /// Name of the rule that decided the outcome, if any matched
    pub fn winning_rule(&self, input: &I) -> Option<&'static str> {
        self.rules
            .iter()
            .rev()
            .find(|rule| (rule.predicate)(input))
            .map(|rule| rule.name)
    }
}

/// Likely_Running, Likely_Walking, Likely_Cycling, Likely_Resting
pub(crate) fn activity_flags() -> [DecisionTable<RuleInput>; 4] {
    [
        DecisionTable::flag("Likely_Running", |r: &RuleInput| {
            r.heart_rate > 130.0 && r.step_count > 600.0 && r.speed > 10.0
        }),
        DecisionTable::flag("Likely_Walking", |r: &RuleInput| {
            (80.0..=120.0).contains(&r.heart_rate)
                && (400.0..=800.0).contains(&r.step_count)
                && r.speed > 0.0
                && r.speed < 50.0
        }),
        DecisionTable::flag("Likely_Cycling", |r: &RuleInput| {
            r.heart_rate > 120.0 && r.step_count > 650.0 && r.speed > 30.0
        }),
        DecisionTable::flag("Likely_Resting", |r: &RuleInput| {
            r.heart_rate < 100.0 && r.step_count < 500.0 && r.speed < 5.0
        }),
    ]
}

/// Activity_Intensity 0-3, higher thresholds declared later
pub(crate) fn intensity_table() -> DecisionTable<RuleInput> {
    DecisionTable::new("Activity_Intensity", 0.0)
        .rule("resting", |r: &RuleInput| r.heart_rate < 100.0 && r.step_count < 500.0, 0.0)
        .rule(
            "light",
            |r: &RuleInput| (100.0..130.0).contains(&r.heart_rate) && r.step_count >= 500.0,
            1.0,
        )
        .rule(
            "moderate",
            |r: &RuleInput| (130.0..160.0).contains(&r.heart_rate) && r.step_count >= 600.0,
            2.0,
        )
        .rule("vigorous", |r: &RuleInput| r.heart_rate >= 160.0 && r.step_count >= 700.0, 3.0)
}

/// What to do with a value outside the outermost bin edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutOfRangePolicy {
    /// Assign the nearest edge bin
    Clamp,
    /// Fail the batch or request
    Reject,
    /// Treat as missing and let mean imputation fill it
    Impute,
}

impl Default for OutOfRangePolicy {
    fn default() -> Self {
        OutOfRangePolicy::Clamp
    }
}

/// Result of assigning a bin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Binned {
    pub value: f64,
    pub out_of_range: bool,
}

/// Right-closed fixed-edge bins: label `i` covers `(edges[i], edges[i + 1]]`
#[derive(Debug, Clone)]
pub struct Bins {
    pub column: &'static str,
    edges: Vec<f64>,
    labels: Vec<f64>,
}

impl Bins {
    /// Create bins; `labels` must have one fewer entry than `edges`
    pub fn new(column: &'static str, edges: &[f64], labels: &[f64]) -> Self {
        assert!(
            edges.len() >= 2 && labels.len() + 1 == edges.len(),
            "Bins need n+1 edges for n labels"
        );
        Self {
            column,
            edges: edges.to_vec(),
            labels: labels.to_vec(),
        }
    }

    /// Heart-rate zone: (0,80] (80,120] (120,150] (150,200]
    pub fn heart_rate_zone() -> Self {
        Self::new("HR_Zone", &[0.0, 80.0, 120.0, 150.0, 200.0], &[0.0, 1.0, 2.0, 3.0])
    }

    /// Step intensity: (0,400] (400,600] (600,750] (750,900] (900,1000]
    pub fn step_intensity() -> Self {
        Self::new(
            "Step_Intensity",
            &[0.0, 400.0, 600.0, 750.0, 900.0, 1000.0],
            &[0.0, 1.0, 2.0, 3.0, 4.0],
        )
    }

    /// Assign the bin label for `value`. Missing input stays missing.
    pub fn assign(&self, value: f64, policy: OutOfRangePolicy) -> Result<Binned, FeatureError> {
        if value.is_nan() {
            return Ok(Binned {
                value: f64::NAN,
                out_of_range: false,
            });
        }

        let lowest = self.edges[0];
        let highest = self.edges[self.edges.len() - 1];

        if value > lowest && value <= highest {
            let idx = self
                .edges
                .windows(2)
                .position(|w| value > w[0] && value <= w[1])
                .unwrap_or(self.labels.len() - 1);
            return Ok(Binned {
                value: self.labels[idx],
                out_of_range: false,
            });
        }

        let value = match policy {
            OutOfRangePolicy::Clamp if value <= lowest => self.labels[0],
            OutOfRangePolicy::Clamp => self.labels[self.labels.len() - 1],
            OutOfRangePolicy::Impute => f64::NAN,
            OutOfRangePolicy::Reject => {
                return Err(FeatureError::OutOfRange {
                    column: self.column,
                    value,
                    min: lowest,
                    max: highest,
                })
            }
        };

        Ok(Binned {
            value,
            out_of_range: true,
        })
    }
}
