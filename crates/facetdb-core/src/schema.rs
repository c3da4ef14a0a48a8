//! Field descriptors and per-category schemas.
//!
//! A descriptor pairs a value type (`string`, `number`, `boolean`) with a
//! facet kind (`searchable`, `selectable`, `range`). Only five combinations are
//! meaningful and [`FieldDescriptor`] has exactly one variant for each.
//! Descriptors deserialize from a flat tagged form so schemas can live in
//! TOML or JSON; the tagged form is validated on the way in.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::normalize::format_number;

/// Suffix of the hidden entry holding a field's unbucketed value.
pub const SHADOW_SUFFIX: &str = "$real";

/// Key of the synthesized document identifier in every stored record.
pub const ID_FIELD: &str = "id";

pub fn shadow_key(field: &str) -> String {
    format!("{field}{SHADOW_SUFFIX}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Number,
    Boolean,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Searchable,
    Selectable,
    Range,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Searchable => "searchable",
            Self::Selectable => "selectable",
            Self::Range => "range",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered mapping from canonical option key to display label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<(String, String)>,
}

impl OptionSet {
    /// Builds an option set, rejecting duplicate keys.
    pub fn new<K, L>(entries: impl IntoIterator<Item = (K, L)>) -> Result<Self>
    where
        K: Into<String>,
        L: Into<String>,
    {
        let set = Self { entries: entries.into_iter().map(|(k, l)| (k.into(), l.into())).collect() };
        set.check_unique()?;
        Ok(set)
    }

    fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (key, _) in &self.entries {
            if !seen.insert(key.as_str()) {
                return Err(Error::config(format!("duplicate option key '{key}'")));
            }
        }
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, l)| l.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, l)| (k.as_str(), l.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One field of a category schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFieldDescriptor", into = "RawFieldDescriptor")]
pub enum FieldDescriptor {
    SearchableString { title: String },
    SelectableString { title: String, options: OptionSet },
    SelectableNumber { title: String, options: OptionSet },
    RangeNumber { title: String, min: i64, max: i64, step: i64 },
    Boolean { title: String, option_title: String },
}

impl FieldDescriptor {
    pub fn searchable(title: impl Into<String>) -> Self {
        Self::SearchableString { title: title.into() }
    }

    pub fn selectable<K, L>(title: impl Into<String>, options: impl IntoIterator<Item = (K, L)>) -> Result<Self>
    where
        K: Into<String>,
        L: Into<String>,
    {
        Ok(Self::SelectableString { title: title.into(), options: OptionSet::new(options)? })
    }

    /// Numeric option keys are stored in their canonical string form.
    pub fn selectable_number<L>(title: impl Into<String>, options: impl IntoIterator<Item = (f64, L)>) -> Result<Self>
    where
        L: Into<String>,
    {
        let options = OptionSet::new(options.into_iter().map(|(k, l)| (format_number(k), l)))?;
        Ok(Self::SelectableNumber { title: title.into(), options })
    }

    /// Range bounds arrive untyped from configuration; all three must be integers.
    pub fn range(title: impl Into<String>, min: f64, max: f64, step: f64) -> Result<Self> {
        let title = title.into();
        let as_int = |name: &str, v: f64| -> Result<i64> {
            if v.is_finite() && v.fract() == 0.0 && v.abs() < 9.0e15 {
                #[allow(clippy::cast_possible_truncation)]
                let n = v as i64;
                Ok(n)
            } else {
                Err(Error::config(format!("range field '{title}': {name} must be an integer, got {v}")))
            }
        };
        let desc = Self::RangeNumber {
            min: as_int("min", min)?,
            max: as_int("max", max)?,
            step: as_int("step", step)?,
            title: title.clone(),
        };
        desc.validate(&title)?;
        Ok(desc)
    }

    pub fn boolean(title: impl Into<String>, option_title: impl Into<String>) -> Self {
        Self::Boolean { title: title.into(), option_title: option_title.into() }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::SearchableString { title }
            | Self::SelectableString { title, .. }
            | Self::SelectableNumber { title, .. }
            | Self::RangeNumber { title, .. }
            | Self::Boolean { title, .. } => title,
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self {
            Self::SearchableString { .. } | Self::SelectableString { .. } => FieldType::String,
            Self::SelectableNumber { .. } | Self::RangeNumber { .. } => FieldType::Number,
            Self::Boolean { .. } => FieldType::Boolean,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::SearchableString { .. } => FieldKind::Searchable,
            Self::SelectableString { .. } | Self::SelectableNumber { .. } | Self::Boolean { .. } => {
                FieldKind::Selectable
            }
            Self::RangeNumber { .. } => FieldKind::Range,
        }
    }

    /// Admissible option keys of an enumerated field, in declaration order.
    /// Boolean fields expose their two implicit options.
    pub fn option_keys(&self) -> Option<Vec<String>> {
        match self {
            Self::SelectableString { options, .. } | Self::SelectableNumber { options, .. } => {
                Some(options.keys().map(str::to_string).collect())
            }
            Self::Boolean { .. } => Some(vec!["true".to_string(), "false".to_string()]),
            _ => None,
        }
    }

    /// Stepped bucket values of a range field, `min` through `max` inclusive.
    pub fn buckets(&self) -> Option<Vec<i64>> {
        match self {
            Self::RangeNumber { min, max, step, .. } => {
                let mut out = Vec::new();
                let mut v = *min;
                while v <= *max {
                    out.push(v);
                    v += step;
                }
                Some(out)
            }
            _ => None,
        }
    }

    /// Checks what a descriptor built by hand could get wrong.
    pub fn validate(&self, key: &str) -> Result<()> {
        match self {
            Self::SelectableString { options, .. } | Self::SelectableNumber { options, .. } => {
                options.check_unique().map_err(|e| Error::config(format!("field '{key}': {e}")))
            }
            Self::RangeNumber { min, max, step, .. } => {
                if min >= max {
                    return Err(Error::config(format!("field '{key}': range min {min} must be below max {max}")));
                }
                if *step <= 0 {
                    return Err(Error::config(format!("field '{key}': range step must be positive, got {step}")));
                }
                if (max - min) % step != 0 {
                    return Err(Error::config(format!(
                        "field '{key}': range span {min}..{max} is not a multiple of step {step}"
                    )));
                }
                Ok(())
            }
            Self::SearchableString { .. } | Self::Boolean { .. } => Ok(()),
        }
    }
}

/// Flat tagged form used on the wire and in configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawFieldDescriptor {
    title: String,
    #[serde(rename = "type")]
    field_type: String,
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    options: Option<Vec<RawOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    option_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawOption {
    key: RawKey,
    label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawKey {
    Number(f64),
    Text(String),
}

impl RawKey {
    fn into_canonical(self) -> String {
        match self {
            Self::Number(n) => format_number(n),
            Self::Text(s) => s,
        }
    }
}

impl TryFrom<RawFieldDescriptor> for FieldDescriptor {
    type Error = Error;

    fn try_from(raw: RawFieldDescriptor) -> Result<Self> {
        let RawFieldDescriptor { title, field_type, kind, options, min, max, step, option_title } = raw;
        let take_options = || -> Result<Vec<(String, String)>> {
            options
                .clone()
                .map(|opts| opts.into_iter().map(|o| (o.key.into_canonical(), o.label)).collect())
                .ok_or_else(|| Error::config(format!("field '{title}' of kind selectable needs options")))
        };
        match (field_type.as_str(), kind.as_str()) {
            ("string", "searchable") => Ok(Self::searchable(title)),
            ("string", "selectable") => Ok(Self::SelectableString { options: OptionSet::new(take_options()?)?, title }),
            ("number", "selectable") => Ok(Self::SelectableNumber { options: OptionSet::new(take_options()?)?, title }),
            ("number", "range") => match (min, max, step) {
                (Some(min), Some(max), Some(step)) => Self::range(title, min, max, step),
                _ => Err(Error::config(format!("range field '{title}' needs min, max and step"))),
            },
            ("boolean", "selectable") => {
                let option_title = option_title.unwrap_or_else(|| title.clone());
                Ok(Self::boolean(title, option_title))
            }
            ("string" | "number" | "boolean", other) if !matches!(other, "searchable" | "selectable" | "range") => {
                Err(Error::config(format!("invalid field kind '{other}' for field '{title}'")))
            }
            ("string" | "number" | "boolean", _) => {
                Err(Error::config(format!("unsupported combination {field_type}/{kind} for field '{title}'")))
            }
            (other, _) => Err(Error::config(format!("invalid field type '{other}' for field '{title}'"))),
        }
    }
}

impl From<FieldDescriptor> for RawFieldDescriptor {
    fn from(desc: FieldDescriptor) -> Self {
        let field_type = desc.field_type().as_str().to_string();
        let kind = desc.kind().as_str().to_string();
        let mut raw = Self {
            title: desc.title().to_string(),
            field_type,
            kind,
            options: None,
            min: None,
            max: None,
            step: None,
            option_title: None,
        };
        match desc {
            FieldDescriptor::SearchableString { .. } => {}
            FieldDescriptor::SelectableString { options, .. } => {
                raw.options = Some(
                    options.entries.into_iter().map(|(k, l)| RawOption { key: RawKey::Text(k), label: l }).collect(),
                );
            }
            FieldDescriptor::SelectableNumber { options, .. } => {
                raw.options = Some(
                    options
                        .entries
                        .into_iter()
                        .map(|(k, l)| {
                            let key = k.parse::<f64>().map_or(RawKey::Text(k), RawKey::Number);
                            RawOption { key, label: l }
                        })
                        .collect(),
                );
            }
            #[allow(clippy::cast_precision_loss)]
            FieldDescriptor::RangeNumber { min, max, step, .. } => {
                raw.min = Some(min as f64);
                raw.max = Some(max as f64);
                raw.step = Some(step as f64);
            }
            FieldDescriptor::Boolean { option_title, .. } => raw.option_title = Some(option_title),
        }
        raw
    }
}

/// A named field of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    pub key: String,
    pub descriptor: FieldDescriptor,
}

/// Ordered field declarations of one category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<SchemaField>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field. Validation happens once, at registration.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, descriptor: FieldDescriptor) -> Self {
        self.fields.push(SchemaField { key: key.into(), descriptor });
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key).map(|f| &f.descriptor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|f| (f.key.as_str(), &f.descriptor))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for SchemaField { key, descriptor } in &self.fields {
            if key.is_empty() {
                return Err(Error::config("field key must not be empty"));
            }
            if key == ID_FIELD {
                return Err(Error::config(format!("field key '{ID_FIELD}' is reserved")));
            }
            if key.contains('$') {
                return Err(Error::config(format!("field key '{key}' must not contain '$'")));
            }
            if !seen.insert(key.as_str()) {
                return Err(Error::config(format!("duplicate field key '{key}'")));
            }
            descriptor.validate(key)?;
        }
        Ok(())
    }
}
