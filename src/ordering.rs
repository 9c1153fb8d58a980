//! Natural ordering of lead and threshold strings
//!
//! Both keys are strings in the stat tables and neither is zero-padded, so
//! plain lexicographic order puts `"240000"` before `"60000"`. Comparing by
//! length first and then lexicographically restores numeric order without
//! parsing.

use std::cmp::Ordering;

/// Orders lead strings (`HHMMSS`, unpadded hours) by length, then lexicographically.
pub fn compare_leads(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Sorts lead strings in place with [`compare_leads`].
pub fn sort_leads(leads: &mut [String]) {
    leads.sort_by(|a, b| compare_leads(a, b));
}

/// Integer part of a threshold string such as `">=25.4"` (here `"25"`).
pub fn threshold_integer_part(thresh: &str) -> &str {
    let start = thresh
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(thresh.len());
    let rest = &thresh[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    &rest[..end]
}

/// Orders thresholds by the length of their integer part, then lexicographically.
pub fn compare_thresholds(a: &str, b: &str) -> Ordering {
    threshold_integer_part(a)
        .len()
        .cmp(&threshold_integer_part(b).len())
        .then_with(|| a.cmp(b))
}

/// Sorts threshold strings in place with [`compare_thresholds`].
pub fn sort_thresholds(thresholds: &mut [String]) {
    thresholds.sort_by(|a, b| compare_thresholds(a, b));
}
