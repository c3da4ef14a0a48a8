//! Conversion of mapped values into their canonical stored strings.
//!
//! Range values are bucketed onto the field's step grid so that a numeric
//! range facet can be matched as a set of discrete tokens. The exact value is
//! kept as a shadow entry for display and sorting only.

use crate::error::{Error, Result};
use crate::schema::{shadow_key, FieldDescriptor, Schema, ID_FIELD};
use crate::types::{FieldValue, MappedRecord, NormalizedRecord};

/// Sentinel stored for string options outside the declared set.
pub const OTHER_OPTION: &str = "other";
/// String option value that is always accepted verbatim.
pub const CUSTOM_OPTION: &str = "custom";

/// A normalized field: the matchable token and an optional shadow value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub shadow: Option<String>,
}

impl Normalized {
    fn plain(value: impl Into<String>) -> Self {
        Self { value: value.into(), shadow: None }
    }
}

/// Shortest decimal form of a number, integers without a fractional part.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // -0 and 0 share one token
        return "0".to_string();
    }
    format!("{n}")
}

/// Clamps `v` into `[min, max]` and snaps it to the nearest `min + step * k`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn snap_to_step(v: f64, min: i64, max: i64, step: i64) -> i64 {
    let (fmin, fmax, fstep) = (min as f64, max as f64, step as f64);
    if v <= fmin {
        return min;
    }
    if v >= fmax {
        return max;
    }
    let k = ((v - fmin) / fstep).round() as i64;
    (min + step * k).clamp(min, max)
}

/// Normalizes one raw value against its descriptor.
///
/// # Errors
///
/// Returns `Error::SchemaViolation` when the value's type disagrees with the
/// descriptor, when a number is not one of a numeric selectable's options,
/// or when a range value is not a number at all (NaN).
pub fn normalize(field: &str, descriptor: &FieldDescriptor, raw: &FieldValue) -> Result<Normalized> {
    if raw.field_type() != descriptor.field_type() {
        return Err(Error::violation(
            field,
            format!("expected a {} value, got a {}", descriptor.field_type(), raw.field_type()),
        ));
    }
    match (descriptor, raw) {
        (FieldDescriptor::SearchableString { .. }, FieldValue::String(s)) => Ok(Normalized::plain(s.clone())),
        (FieldDescriptor::SelectableString { options, .. }, FieldValue::String(s)) => {
            if options.contains(s) || s == CUSTOM_OPTION {
                Ok(Normalized::plain(s.clone()))
            } else {
                Ok(Normalized { value: OTHER_OPTION.to_string(), shadow: Some(s.clone()) })
            }
        }
        (FieldDescriptor::SelectableNumber { options, .. }, FieldValue::Number(n)) => {
            let key = format_number(*n);
            if options.contains(&key) {
                Ok(Normalized::plain(key))
            } else {
                Err(Error::violation(field, format!("{key} is not one of the declared options")))
            }
        }
        (FieldDescriptor::RangeNumber { min, max, step, .. }, FieldValue::Number(n)) => {
            if n.is_nan() {
                return Err(Error::violation(field, "range value is NaN"));
            }
            let bucket = snap_to_step(*n, *min, *max, *step);
            Ok(Normalized { value: bucket.to_string(), shadow: Some(format_number(*n)) })
        }
        (FieldDescriptor::Boolean { .. }, FieldValue::Boolean(b)) => Ok(Normalized::plain(b.to_string())),
        _ => Err(Error::violation(field, "value does not fit the field descriptor")),
    }
}

/// Builds the stored record for one document from a mapper's output.
///
/// # Errors
///
/// Fails with `Error::SchemaViolation` on the first field that does not
/// normalize, or on a key the schema does not declare.
pub fn normalize_record(id: &str, schema: &Schema, mapped: &MappedRecord) -> Result<NormalizedRecord> {
    let mut record = NormalizedRecord::new(id);
    for (key, value) in mapped.iter() {
        if key == ID_FIELD {
            continue;
        }
        let descriptor = schema.get(key).ok_or_else(|| Error::violation(key, "field is not declared in the schema"))?;
        let Some(value) = value else { continue };
        let Normalized { value, shadow } = normalize(key, descriptor, value)?;
        record.values.insert(key.to_string(), value);
        if let Some(shadow) = shadow {
            record.values.insert(shadow_key(key), shadow);
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiers() -> FieldDescriptor {
        FieldDescriptor::selectable("Tier", [("a", "A"), ("b", "B"), ("c", "C")]).unwrap()
    }

    #[test]
    fn range_value_rounds_into_the_top_bucket() {
        let cr = FieldDescriptor::range("CR", 0.0, 20.0, 1.0).unwrap();
        let n = normalize("cr", &cr, &FieldValue::Number(19.6)).unwrap();
        assert_eq!(n.value, "20");
        assert_eq!(n.shadow.as_deref(), Some("19.6"));
    }

    #[test]
    fn range_values_always_land_on_the_grid() {
        let desc = FieldDescriptor::range("AC", 2.0, 20.0, 3.0).unwrap();
        for i in -40..260 {
            let v = f64::from(i) / 10.0;
            let n = normalize("ac", &desc, &FieldValue::Number(v)).unwrap();
            let bucket: i64 = n.value.parse().unwrap();
            assert!((2..=20).contains(&bucket), "{v} -> {bucket}");
            assert_eq!((bucket - 2) % 3, 0, "{v} -> {bucket}");
            assert_eq!(n.shadow, Some(format_number(v)));
        }
    }

    #[test]
    fn range_clamps_out_of_bounds_values() {
        let desc = FieldDescriptor::range("Level", 0.0, 9.0, 1.0).unwrap();
        assert_eq!(normalize("level", &desc, &FieldValue::Number(-3.0)).unwrap().value, "0");
        assert_eq!(normalize("level", &desc, &FieldValue::Number(42.0)).unwrap().value, "9");
        assert_eq!(normalize("level", &desc, &FieldValue::Number(f64::INFINITY)).unwrap().value, "9");
        assert!(normalize("level", &desc, &FieldValue::Number(f64::NAN)).is_err());
    }

    #[test]
    fn unknown_string_option_becomes_other_with_shadow() {
        let n = normalize("tier", &tiers(), &FieldValue::from("legendary")).unwrap();
        assert_eq!(n.value, OTHER_OPTION);
        assert_eq!(n.shadow.as_deref(), Some("legendary"));
    }

    #[test]
    fn custom_and_known_options_are_kept_verbatim() {
        assert_eq!(normalize("tier", &tiers(), &FieldValue::from("custom")).unwrap(), Normalized::plain("custom"));
        assert_eq!(normalize("tier", &tiers(), &FieldValue::from("b")).unwrap(), Normalized::plain("b"));
    }

    #[test]
    fn numeric_option_outside_the_set_is_a_violation() {
        let rarity = FieldDescriptor::selectable_number("Rarity", [(1.0, "Common"), (2.0, "Rare")]).unwrap();
        assert_eq!(normalize("rarity", &rarity, &FieldValue::Number(2.0)).unwrap().value, "2");
        let err = normalize("rarity", &rarity, &FieldValue::Number(3.0)).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { ref field, .. } if field == "rarity"));
    }

    #[test]
    fn type_mismatch_is_a_violation() {
        let err = normalize("tier", &tiers(), &FieldValue::Number(1.0)).unwrap_err();
        assert!(matches!(err, Error::SchemaViolation { .. }));
        let magic = FieldDescriptor::boolean("Magic", "Magical");
        assert!(normalize("magic", &magic, &FieldValue::from("yes")).is_err());
        assert_eq!(normalize("magic", &magic, &FieldValue::Boolean(false)).unwrap().value, "false");
    }

    #[test]
    fn record_skips_nulls_and_rejects_undeclared_keys() {
        let schema = Schema::new()
            .field("name", FieldDescriptor::searchable("Name"))
            .field("tier", tiers());
        let mapped = MappedRecord::new().with("name", "Fire Bolt").with_opt::<String>("tier", None);
        let record = normalize_record("doc-1", &schema, &mapped).unwrap();
        assert_eq!(record.id, "doc-1");
        assert_eq!(record.get("name"), Some("Fire Bolt"));
        assert_eq!(record.get("tier"), None);

        let stray = MappedRecord::new().with("colour", "red");
        assert!(normalize_record("doc-2", &schema, &stray).is_err());
    }

    #[test]
    fn format_number_matches_token_form() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.25), "0.25");
    }
}
