//! Converts the engine's HTML fragments into Markdown text.

use lazy_static::lazy_static;
use phf::phf_map;
use regex::{Captures, Regex};

lazy_static! {
    /// Regex for the HTML the engine emits: italics, the bibliography entry
    /// wrapper, and a few entities.
    static ref MARKUP: Regex =
        Regex::new(r#"</?i>|<div class="csl-entry">|</div>|&(?:ndash|mdash|amp|lt|gt);"#).unwrap();
}

/// What each [`MARKUP`] match becomes.
static REPLACEMENTS: phf::Map<&'static str, &'static str> = phf_map! {
    "<i>" => "*",
    "</i>" => "*",
    "<div class=\"csl-entry\">" => "",
    "</div>" => "",
    "&ndash;" => "--",
    "&mdash;" => "---",
    "&amp;" => "&",
    "&lt;" => "<",
    "&gt;" => ">",
};

/// Normalize an engine fragment.
///
/// The fragment is trimmed, then each piece of markup is replaced in one
/// left-to-right pass. Replacements are not rescanned, so `&amp;lt;` becomes
/// `&lt;`, not `<`.
pub fn normalize(fragment: &str) -> String {
    MARKUP
        .replace_all(fragment.trim(), |caps: &Captures| {
            REPLACEMENTS
                .get(&caps[0])
                .map(|r| r.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
