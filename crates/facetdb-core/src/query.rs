//! Compilation of facet selections into field-scoped sub-queries.
//!
//! Sub-queries on one field are alternatives (OR); distinct fields are
//! conjoined (AND) by the reducer. A selection that can never match compiles
//! to [`CompiledQuery::Unsatisfiable`], which is different from compiling to
//! no sub-queries at all (no constraint).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::normalize::format_number;
use crate::schema::{FieldDescriptor, FieldKind, Schema};

/// One field-scoped, single-value query unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubQuery {
    pub field: String,
    pub query: String,
}

impl SubQuery {
    pub fn new(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self { field: field.into(), query: query.into() }
    }
}

/// The caller's input for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetInput {
    /// Free text for a searchable field.
    Text(String),
    /// Selected option keys of an enumerated field.
    Selected(BTreeSet<String>),
    /// One checkbox state per input widget: one per declared option for
    /// string/number selectables, exactly one for a boolean field (checked
    /// means "true only", unchecked means no constraint).
    Checks(Vec<bool>),
    /// Inclusive numeric bounds for a range field, in either order.
    Range(f64, f64),
}

/// Per-field inputs of one query. Fields left out contribute no constraint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetSelection {
    inputs: BTreeMap<String, FacetInput>,
}

impl FacetSelection {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn text(mut self, field: impl Into<String>, text: impl Into<String>) -> Self {
        self.inputs.insert(field.into(), FacetInput::Text(text.into()));
        self
    }

    #[must_use]
    pub fn select<I, S>(mut self, field: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.insert(field.into(), FacetInput::Selected(keys.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn checks(mut self, field: impl Into<String>, checks: Vec<bool>) -> Self {
        self.inputs.insert(field.into(), FacetInput::Checks(checks));
        self
    }

    #[must_use]
    pub fn range(mut self, field: impl Into<String>, low: f64, high: f64) -> Self {
        self.inputs.insert(field.into(), FacetInput::Range(low, high));
        self
    }

    pub fn set(&mut self, field: impl Into<String>, input: FacetInput) {
        self.inputs.insert(field.into(), input);
    }

    pub fn get(&self, field: &str) -> Option<&FacetInput> {
        self.inputs.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompiledQuery {
    /// Some field can never match; the result is empty whatever else is selected.
    Unsatisfiable,
    /// Zero or more sub-queries, in schema field order.
    SubQueries(Vec<SubQuery>),
}

impl CompiledQuery {
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::Unsatisfiable)
    }

    pub fn sub_queries(&self) -> &[SubQuery] {
        match self {
            Self::Unsatisfiable => &[],
            Self::SubQueries(q) => q,
        }
    }

    /// Distinct constrained fields, in first-appearance order.
    pub fn constrained_fields(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for q in self.sub_queries() {
            if !out.contains(&q.field.as_str()) {
                out.push(&q.field);
            }
        }
        out
    }
}

enum FieldOutcome {
    Unconstrained,
    Alternatives(Vec<String>),
    Impossible,
}

/// Compiles a selection against a category schema.
///
/// # Errors
///
/// Returns `Error::Configuration` when the selection names a field the
/// schema lacks, when an input's shape does not fit the field kind, when a
/// checkbox list has the wrong length, or when a selected key is not a
/// declared option. These are integration bugs, not empty results.
pub fn compile(schema: &Schema, selection: &FacetSelection) -> Result<CompiledQuery> {
    if let Some(unknown) = selection.inputs.keys().find(|k| schema.get(k).is_none()) {
        return Err(Error::config(format!("selection names unknown field '{unknown}'")));
    }

    let mut sub_queries = Vec::new();
    for (field, descriptor) in schema.iter() {
        let Some(input) = selection.get(field) else { continue };
        match compile_field(field, descriptor, input)? {
            FieldOutcome::Unconstrained => {}
            FieldOutcome::Impossible => return Ok(CompiledQuery::Unsatisfiable),
            FieldOutcome::Alternatives(values) => {
                sub_queries.extend(values.into_iter().map(|v| SubQuery::new(field, v)));
            }
        }
    }
    Ok(CompiledQuery::SubQueries(sub_queries))
}

fn compile_field(field: &str, descriptor: &FieldDescriptor, input: &FacetInput) -> Result<FieldOutcome> {
    match (descriptor.kind(), input) {
        (FieldKind::Searchable, FacetInput::Text(text)) => {
            if text.trim().is_empty() {
                Ok(FieldOutcome::Unconstrained)
            } else {
                Ok(FieldOutcome::Alternatives(vec![text.clone()]))
            }
        }
        (FieldKind::Selectable, FacetInput::Selected(keys)) => {
            let options = descriptor.option_keys().unwrap_or_default();
            if let Some(bad) = keys.iter().find(|k| !options.contains(k)) {
                return Err(Error::config(format!("'{bad}' is not an option of field '{field}'")));
            }
            Ok(choose(options, |key| keys.contains(key)))
        }
        (FieldKind::Selectable, FacetInput::Checks(checks)) => {
            let options = descriptor.option_keys().unwrap_or_default();
            if matches!(descriptor, FieldDescriptor::Boolean { .. }) {
                if checks.len() != 1 {
                    return Err(Error::config(format!(
                        "boolean field '{field}' takes exactly one input, got {}",
                        checks.len()
                    )));
                }
                return Ok(if checks[0] {
                    FieldOutcome::Alternatives(vec!["true".to_string()])
                } else {
                    FieldOutcome::Unconstrained
                });
            }
            if checks.len() != options.len() {
                return Err(Error::config(format!(
                    "selectable field '{field}' takes {} inputs, got {}",
                    options.len(),
                    checks.len()
                )));
            }
            let selected: Vec<String> =
                options.iter().zip(checks).filter(|(_, on)| **on).map(|(k, _)| k.clone()).collect();
            Ok(choose(options, |key| selected.contains(key)))
        }
        (FieldKind::Range, FacetInput::Range(low, high)) => {
            let FieldDescriptor::RangeNumber { min, max, step, .. } = descriptor else {
                return Err(Error::config(format!("field '{field}' is not a numeric range")));
            };
            compile_range(field, *min, *max, *step, *low, *high)
        }
        (kind, input) => Err(Error::config(format!("input {} does not fit {kind} field '{field}'", input_name(input)))),
    }
}

fn choose(options: Vec<String>, is_selected: impl Fn(&String) -> bool) -> FieldOutcome {
    let selected: Vec<String> = options.iter().filter(|k| is_selected(k)).cloned().collect();
    if selected.is_empty() {
        FieldOutcome::Impossible
    } else if selected.len() == options.len() {
        FieldOutcome::Unconstrained
    } else {
        FieldOutcome::Alternatives(selected)
    }
}

#[allow(clippy::cast_precision_loss)]
fn compile_range(field: &str, min: i64, max: i64, step: i64, low: f64, high: f64) -> Result<FieldOutcome> {
    if low.is_nan() || high.is_nan() {
        return Err(Error::config(format!("range bounds for field '{field}' must be numbers")));
    }
    let (low, high) = if low <= high { (low, high) } else { (high, low) };
    if low <= min as f64 && high >= max as f64 {
        return Ok(FieldOutcome::Unconstrained);
    }
    // values outside the domain were indexed in the edge bucket
    let low = low.clamp(min as f64, max as f64);
    let high = high.clamp(min as f64, max as f64);
    let mut buckets = Vec::new();
    let mut v = snap_up(low, min, step);
    while v <= max && (v as f64) <= high {
        buckets.push(format_number(v as f64));
        v += step;
    }
    if buckets.is_empty() {
        Ok(FieldOutcome::Impossible)
    } else {
        Ok(FieldOutcome::Alternatives(buckets))
    }
}

/// Smallest grid point at or above `low`; may exceed `max`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn snap_up(low: f64, min: i64, step: i64) -> i64 {
    if low <= min as f64 {
        return min;
    }
    min + step * ((low - min as f64) / step as f64).ceil() as i64
}

fn input_name(input: &FacetInput) -> &'static str {
    match input {
        FacetInput::Text(_) => "text",
        FacetInput::Selected(_) => "selected",
        FacetInput::Checks(_) => "checks",
        FacetInput::Range(..) => "range",
    }
}
