//! Human-facing sequential identifiers of the form `<n>/<YY>`.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;

static INTERNAL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)/(\d{2})$").expect("internal id pattern is valid"));

pub fn year_suffix(at: DateTime<Utc>) -> String {
    format!("{:02}", at.year().rem_euclid(100))
}

pub fn format(sequence: u32, year_suffix: &str) -> String {
    format!("{}/{}", sequence, year_suffix)
}

pub fn parse(internal_id: &str) -> Option<(u32, &str)> {
    let captures = INTERNAL_ID.captures(internal_id)?;
    let sequence = captures.get(1)?.as_str().parse().ok()?;
    Some((sequence, captures.get(2)?.as_str()))
}

/// Max existing sequence for the year plus one.
pub fn next_sequence<'a>(existing: impl IntoIterator<Item = &'a str>, year_suffix: &str) -> u32 {
    existing
        .into_iter()
        .filter_map(parse)
        .filter(|(_, suffix)| *suffix == year_suffix)
        .map(|(sequence, _)| sequence)
        .max()
        .unwrap_or(0)
        + 1
}
