//! Command-line facet arguments.
//!
//! `--text name=fire`, `--select school=evo,abj`, `--check ritual`,
//! `--range level=1..3`.

use anyhow::{anyhow, bail, Context};

use facetdb_core::query::FacetSelection;
use facetdb_core::types::NormalizedRecord;

fn split_pair<'a>(flag: &str, arg: &'a str) -> anyhow::Result<(&'a str, &'a str)> {
    let (field, value) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("--{flag} expects FIELD=VALUE, got '{arg}'"))?;
    let field = field.trim();
    if field.is_empty() {
        bail!("--{flag} is missing a field name in '{arg}'");
    }
    Ok((field, value.trim()))
}

fn parse_range(arg: &str) -> anyhow::Result<(f64, f64)> {
    let (low, high) = arg.split_once("..").ok_or_else(|| anyhow!("range '{arg}' must look like LOW..HIGH"))?;
    let low = low.trim().parse::<f64>().with_context(|| format!("bad lower bound in '{arg}'"))?;
    let high = high.trim().parse::<f64>().with_context(|| format!("bad upper bound in '{arg}'"))?;
    Ok((low, high))
}

/// Builds a selection from the raw flag values. Later flags on the same
/// field replace earlier ones.
pub fn parse_selection(
    texts: &[String],
    selects: &[String],
    checks: &[String],
    ranges: &[String],
) -> anyhow::Result<FacetSelection> {
    let mut selection = FacetSelection::new();
    for arg in texts {
        let (field, text) = split_pair("text", arg)?;
        selection = selection.text(field, text);
    }
    for arg in selects {
        let (field, keys) = split_pair("select", arg)?;
        selection = selection.select(field, keys.split(',').map(str::trim).filter(|k| !k.is_empty()));
    }
    for field in checks {
        selection = selection.checks(field.trim(), vec![true]);
    }
    for arg in ranges {
        let (field, span) = split_pair("range", arg)?;
        let (low, high) = parse_range(span)?;
        selection = selection.range(field, low, high);
    }
    Ok(selection)
}

/// Fills `{field}` placeholders from a record's display values. Unknown
/// placeholders render empty; an unterminated brace is kept as text.
pub fn render(template: &str, record: &NormalizedRecord) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                out.push_str(record.display_value(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
