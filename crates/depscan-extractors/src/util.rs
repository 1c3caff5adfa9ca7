//! Shared parsing helpers for the line-based extractors.

use depscan_core::{Error, Result};
use std::path::Path;

/// Read a manifest into memory, mapping failures onto the structured
/// I/O error.
pub(crate) fn read_manifest(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

/// Split a comma-separated list on commas that sit outside quotes.
pub(crate) fn split_outside_quotes(list: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut start = 0;
    for (idx, ch) in list.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ',' if !in_single && !in_double => {
                items.push(list[start..idx].trim());
                start = idx + 1;
            }
            _ => {}
        }
    }
    items.push(list[start..].trim());
    items.retain(|s| !s.is_empty());
    items
}

/// Strip matching surrounding quotes from a token.
pub(crate) fn unquote(token: &str) -> &str {
    let t = token.trim();
    if t.len() >= 2 {
        let bytes = t.as_bytes();
        if (bytes[0] == b'\'' && bytes[t.len() - 1] == b'\'')
            || (bytes[0] == b'"' && bytes[t.len() - 1] == b'"')
        {
            return &t[1..t.len() - 1];
        }
    }
    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commas_inside_quotes_do_not_split() {
        assert_eq!(
            split_outside_quotes("'a,b', 'c', d"),
            vec!["'a,b'", "'c'", "d"]
        );
    }

    #[test]
    fn unquote_strips_single_and_double() {
        assert_eq!(unquote("'foo'"), "foo");
        assert_eq!(unquote("\"bar\""), "bar");
        assert_eq!(unquote("baz"), "baz");
    }
}
