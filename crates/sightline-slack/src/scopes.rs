// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot scope parsing.

use std::collections::HashSet;

/// Split a stored scope string on commas and whitespace, dropping empties.
pub fn parse_scopes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `granted` covers every scope in `required`.
pub fn has_required_scopes<S: AsRef<str>>(granted: &str, required: &[S]) -> bool {
    missing_scopes(granted, required).is_empty()
}

/// Required scopes absent from `granted`, in `required` order.
pub fn missing_scopes<S: AsRef<str>>(granted: &str, required: &[S]) -> Vec<String> {
    let granted: HashSet<String> = parse_scopes(granted).into_iter().collect();
    required
        .iter()
        .map(AsRef::as_ref)
        .filter(|scope| !granted.contains(*scope))
        .map(str::to_string)
        .collect()
}
