//! Partial reference scanner.
//!
//! Handlebars does not expose a structural visitor over a compiled template,
//! so partial references are found lexically. References inside comments or
//! string literals are reported too; callers only use the result to preload
//! partials, where an extra lookup is harmless.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PARTIAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*>\s*([a-zA-Z0-9_.-]+)\s*\}\}").unwrap());

/// Find the names of all partials referenced by a template.
pub fn identify_partials(template: &str) -> BTreeSet<String> {
    PARTIAL_RE
        .captures_iter(template)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}
