//! Path globbing for trigger filters, built on `globset`.
//!
//! `*` and `?` never cross a `/`; `**` spans zero or more whole segments.
//! A leading `!` marks a negation inside a pattern list.

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

/// Whether `path` matches a single (non-negated) glob pattern.
pub fn match_glob(pattern: &str, path: &str) -> bool {
    let pattern = strip_dot(pattern);
    let path = strip_dot(path);
    let Some(matcher) = compile(pattern) else {
        return pattern == path;
    };
    if matcher.is_match(path) {
        return true;
    }
    // `dir/**` also selects `dir` itself.
    match pattern.strip_suffix("/**") {
        Some(base) => compile(base).is_some_and(|m| m.is_match(path)),
        None => false,
    }
}

/// Whether `path` is selected by an ordered pattern list.
///
/// A path is included once any positive pattern matches it. A `!pattern`
/// only vetoes a path that an earlier positive pattern already matched.
pub fn match_patterns<S: AsRef<str>>(patterns: &[S], path: &str) -> bool {
    let mut included = false;
    for pattern in patterns {
        let pattern = pattern.as_ref();
        match pattern.strip_prefix('!') {
            Some(negated) => {
                if included && match_glob(negated, path) {
                    return false;
                }
            }
            None => {
                if !included && match_glob(pattern, path) {
                    included = true;
                }
            }
        }
    }
    included
}

fn strip_dot(text: &str) -> &str {
    text.strip_prefix("./").unwrap_or(text)
}

/// Compile `pattern`; a pattern globset rejects is compared literally.
fn compile(pattern: &str) -> Option<GlobMatcher> {
    match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => Some(glob.compile_matcher()),
        Err(e) => {
            debug!(pattern = %pattern, error = %e, "Invalid glob, comparing literally");
            None
        }
    }
}
