//! Markup normalisation for structural comparison.
//!
//! Stored markup and freshly rendered markup are compared as strings after
//! both pass through [`normalize_markup`]. The rules remove differences the
//! editor and the renderer introduce without changing structure.
//!
//! # Algorithm
//!
//! 1. Typographic quotes (`‘ ’ “ ”`) become ASCII quotes.
//! 2. Single-quoted attribute values become double-quoted.
//! 3. Positional and debug attributes injected by the editor are removed
//!    (see [`INJECTED_ATTRIBUTES`]).
//! 4. Whitespace between tags is removed: `> \n <` → `><`.
//! 5. Remaining whitespace runs collapse to one space.
//! 6. Whitespace before `>` and `/>` is removed: `<img />` → `<img/>`.
//! 7. Leading and trailing whitespace is trimmed.
//!
//! This is a heuristic equivalence, tuned against real editor output, not a
//! complete HTML canonicalisation. Attribute order, entity spelling and
//! optional closing tags still count as differences.

use std::sync::LazyLock;

use regex::Regex;

/// Attributes the editor adds for its own bookkeeping.
pub const INJECTED_ATTRIBUTES: &[&str] = &[
    "data-block-index",
    "data-position",
    "data-index",
    "data-block",
    "data-type",
    "data-debug",
    "data-wp-block-index",
];

static SINGLE_QUOTED_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\s[A-Za-z_:][-A-Za-z0-9_:.]*)='([^'"]*)'"#)
        .expect("single-quoted attribute pattern is valid")
});

static INJECTED_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    let names = INJECTED_ATTRIBUTES.join("|");
    Regex::new(&format!(r#"\s(?:{names})=(?:"[^"]*"|[^\s>"']+)"#))
        .expect("injected attribute pattern is valid")
});

static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("between-tags pattern is valid"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

static BEFORE_TAG_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(/?>)").expect("tag end pattern is valid"));

/// Normalise markup for comparison.
pub fn normalize_markup(markup: &str) -> String {
    let s = markup
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"");
    let s = SINGLE_QUOTED_ATTR.replace_all(&s, r#"$1="$2""#);
    let s = INJECTED_ATTR.replace_all(&s, "");
    let s = BETWEEN_TAGS.replace_all(&s, "><");
    let s = WHITESPACE_RUN.replace_all(&s, " ");
    let s = BEFORE_TAG_END.replace_all(&s, "$1");
    s.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitespace_between_and_within_tags() {
        let stored = "<ul>\n  <li>One   two</li>\n  <li>Three</li>\n</ul>\n";
        assert_eq!(
            normalize_markup(stored),
            "<ul><li>One two</li><li>Three</li></ul>"
        );
    }

    #[test]
    fn self_closing_spacing() {
        assert_eq!(normalize_markup("<img />"), normalize_markup("<img/>"));
        assert_eq!(normalize_markup("<br >"), "<br>");
    }

    #[test]
    fn quote_styles_compare_equal() {
        assert_eq!(
            normalize_markup("<a href='/x' class=\u{201C}btn\u{201D}>Go</a>"),
            "<a href=\"/x\" class=\"btn\">Go</a>"
        );
    }

    #[test]
    fn injected_attributes_are_removed() {
        assert_eq!(
            normalize_markup(r#"<div class="card" data-position="3" data-index=2><p data-block="abc">T</p></div>"#),
            r#"<div class="card"><p>T</p></div>"#
        );
    }

    #[test]
    fn lookalike_attributes_survive() {
        assert_eq!(
            normalize_markup(r#"<div data-blocker="1" data-type-hint="x"></div>"#),
            r#"<div data-blocker="1" data-type-hint="x"></div>"#
        );
    }

    #[test]
    fn tag_names_still_differ() {
        assert_ne!(
            normalize_markup(r#"<li><div class="card"><img/><p>T</p></div></li>"#),
            normalize_markup(r#"<li><article class="card"><img /><p>T</p></article></li>"#)
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(normalize_markup("  \n\t "), "");
    }
}
