//! Client-side ordering of query results.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::schema::{FieldDescriptor, FieldType};
use crate::types::NormalizedRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// How display values of a field compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Text,
    Numeric,
    Boolean,
}

impl SortKind {
    pub fn for_descriptor(descriptor: &FieldDescriptor) -> Self {
        match descriptor.field_type() {
            FieldType::String => Self::Text,
            FieldType::Number => Self::Numeric,
            FieldType::Boolean => Self::Boolean,
        }
    }
}

/// Builds a comparator over the display value of `field` (the `$real`
/// shadow when present).
///
/// Records missing the value go last in either direction and keep their
/// relative order. They do not compare equal to records that have one:
/// that relation is not transitive, and `sort_by` needs a total order.
pub fn comparator(
    field: &str,
    direction: SortDirection,
    kind: SortKind,
) -> impl Fn(&NormalizedRecord, &NormalizedRecord) -> Ordering + '_ {
    move |a, b| {
        match (a.display_value(field), b.display_value(field)) {
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y, kind);
                match direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

fn compare_values(x: &str, y: &str, kind: SortKind) -> Ordering {
    match kind {
        SortKind::Numeric => match (x.parse::<f64>(), y.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.total_cmp(&b),
            _ => compare_text(x, y),
        },
        // "true" sorts first ascending
        SortKind::Boolean => (x != "true").cmp(&(y != "true")),
        SortKind::Text => compare_text(x, y),
    }
}

fn compare_text(x: &str, y: &str) -> Ordering {
    x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y))
}

/// Stable-sorts records in place.
pub fn sort_records(records: &mut [NormalizedRecord], field: &str, direction: SortDirection, kind: SortKind) {
    records.sort_by(comparator(field, direction, kind));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::shadow_key;

    fn rec(id: &str, field: &str, value: &str) -> NormalizedRecord {
        let mut r = NormalizedRecord::new(id);
        r.values.insert(field.to_string(), value.to_string());
        r
    }

    fn order(records: &[NormalizedRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn numeric_sort_prefers_shadow_value() {
        let mut a = rec("a", "cr", "20");
        a.values.insert(shadow_key("cr"), "19.6".to_string());
        let b = rec("b", "cr", "20");
        let c = rec("c", "cr", "5");
        let mut records = vec![b, a, c];
        sort_records(&mut records, "cr", SortDirection::Ascending, SortKind::Numeric);
        assert_eq!(order(&records), ["c", "a", "b"]);
        sort_records(&mut records, "cr", SortDirection::Descending, SortKind::Numeric);
        assert_eq!(order(&records), ["b", "a", "c"]);
    }

    #[test]
    fn numeric_sort_is_not_lexicographic() {
        let mut records = vec![rec("ten", "lvl", "10"), rec("nine", "lvl", "9")];
        sort_records(&mut records, "lvl", SortDirection::Ascending, SortKind::Numeric);
        assert_eq!(order(&records), ["nine", "ten"]);
    }

    #[test]
    fn text_sort_ignores_case() {
        let mut records = vec![rec("1", "name", "fire Wall"), rec("2", "name", "Fire Bolt"), rec("3", "name", "acid")];
        sort_records(&mut records, "name", SortDirection::Ascending, SortKind::Text);
        assert_eq!(order(&records), ["3", "2", "1"]);
    }

    #[test]
    fn booleans_sort_true_first() {
        let mut records = vec![rec("f", "magic", "false"), rec("t", "magic", "true")];
        sort_records(&mut records, "magic", SortDirection::Ascending, SortKind::Boolean);
        assert_eq!(order(&records), ["t", "f"]);
    }

    #[test]
    fn missing_values_go_last() {
        let mut records = vec![rec("x", "lvl", "3"), NormalizedRecord::new("none"), rec("y", "lvl", "1")];
        sort_records(&mut records, "lvl", SortDirection::Ascending, SortKind::Numeric);
        assert_eq!(order(&records), ["y", "x", "none"]);
        sort_records(&mut records, "lvl", SortDirection::Descending, SortKind::Numeric);
        assert_eq!(order(&records), ["x", "y", "none"]);
        sort_records(&mut records, "name", SortDirection::Ascending, SortKind::Text);
        assert_eq!(order(&records), ["x", "y", "none"]);
    }
}
