//! Coverage summary parsing.
//!
//! Reads the line-oriented summary printed by `lcov --summary`:
//!
//! ```text
//! Summary coverage rate:
//!   lines......: 92.3% (100 of 108 lines)
//!   functions..: 95.0% (19 of 20 functions)
//!   branches...: no data found
//! ```
//!
//! Each labelled line contributes one metric. Lines that carry no label are
//! ignored; labelled lines with a malformed percentage leave the metric
//! unmeasured.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::debug;

use crate::domain::error::{InfrastructureFault, Result};
use crate::domain::metrics::{MetricSet, BRANCH_COVERAGE, FUNCTION_COVERAGE, LINE_COVERAGE};

fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(lines|functions|branches)\.*:").expect("label pattern is valid")
    })
}

fn canonical_name(label: &str) -> Option<&'static str> {
    match label {
        "lines" => Some(LINE_COVERAGE),
        "functions" => Some(FUNCTION_COVERAGE),
        "branches" => Some(BRANCH_COVERAGE),
        _ => None,
    }
}

/// Parse a percentage token such as `92.3%`.
///
/// Returns `None` for anything that is not a finite number in `[0, 100]`.
fn parse_percentage(token: &str) -> Option<f64> {
    let value: f64 = token.strip_suffix('%')?.parse().ok()?;
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}

/// Parse summary text into a [`MetricSet`].
///
/// Later occurrences of a label overwrite earlier ones. Empty input yields
/// an empty set.
pub fn parse_summary(text: &str) -> MetricSet {
    let mut metrics = MetricSet::new();

    for line in text.lines() {
        let Some(caps) = label_pattern().captures(line) else {
            continue;
        };
        let Some(name) = canonical_name(&caps[1]) else {
            continue;
        };
        let rest = &line[caps.get(0).map_or(0, |m| m.end())..];

        let Some(token) = rest.split_whitespace().find(|t| t.ends_with('%')) else {
            debug!(metric = name, line = %line.trim(), "no percentage on labelled line");
            continue;
        };

        match parse_percentage(token) {
            Some(value) => metrics.insert(name, value),
            None => debug!(metric = name, token = %token, "skipping malformed percentage"),
        }
    }

    metrics
}

/// Read and parse a summary file.
///
/// A missing file is an infrastructure fault; an empty one is a valid, empty
/// result.
pub fn load_metrics(path: &Path) -> Result<MetricSet> {
    if !path.exists() {
        return Err(InfrastructureFault::MissingArtifact {
            path: path.to_path_buf(),
        }
        .into());
    }
    let text = std::fs::read_to_string(path)?;
    Ok(parse_summary(&text))
}
