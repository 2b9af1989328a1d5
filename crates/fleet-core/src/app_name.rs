//! Derive a short per-app identifier from a free-text epic title.
//!
//! The identifier names the app's own working directory, distinct from the
//! shared factory repository. Rules, first match wins:
//!
//! 1. `Name: description` where `Name` is word characters only.
//! 2. The whole trimmed title when it is a single identifier.
//! 3. The first PascalCase run anywhere in the title (`LensCycle`).
//! 4. The first word longer than two characters made only of `[A-Za-z0-9_-]`,
//!    else the epic id with any other character replaced by `-`.

use std::sync::LazyLock;

use regex::Regex;

static COLON_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("valid colon-prefix regex"));

static SINGLE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("valid identifier regex"));

static PASCAL_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z][a-z0-9]+(?:[A-Z][a-z0-9]+)+)\b").expect("valid pascal-case regex")
});

/// Resolve the app name for an epic. Never returns an empty string as long as
/// `epic_id` is non-empty.
pub fn resolve_app_name(title: &str, epic_id: &str) -> String {
    if let Some((prefix, _)) = title.split_once(':') {
        let prefix = prefix.trim();
        if COLON_PREFIX.is_match(prefix) {
            return prefix.to_string();
        }
    }

    let trimmed = title.trim();
    if SINGLE_IDENTIFIER.is_match(trimmed) {
        return trimmed.to_string();
    }

    if let Some(m) = PASCAL_RUN.captures(trimmed).and_then(|c| c.get(1)) {
        return m.as_str().to_string();
    }

    trimmed
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !is_name_char(c)))
        .find(|w| w.chars().count() > 2 && w.chars().all(is_name_char))
        .map(str::to_string)
        .unwrap_or_else(|| epic_id.chars().map(|c| if is_name_char(c) { c } else { '-' }).collect())
}

/// The result is joined onto the apps root, so separators and dots are out.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
