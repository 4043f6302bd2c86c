//! Collects the citation occurrences from the document.

use crate::ast::{Citation, Node};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use slog::{debug, trace};

lazy_static! {
    /// Regex for one leading `[` and one trailing `]`, with the whitespace
    /// next to them.
    static ref BRACKETS: Regex = Regex::new(r"^\[\s*|\s*\]$").unwrap();
}

/// One cited item, in document order.
///
/// An occurrence's sequence index is its position in the list returned by
/// [`extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub item_id: String,
    pub locator: Option<String>,
}

impl Occurrence {
    fn from_citation(citation: &Citation) -> Occurrence {
        Occurrence {
            item_id: citation.citation_id.clone(),
            locator: locator(&citation.citation_suffix),
        }
    }
}

/// Extract every citation occurrence, in document order.
///
/// A `Cite` holding several citations yields one occurrence per citation.
pub fn extract(blocks: &[Node]) -> Vec<Occurrence> {
    debug!(slog_scope::logger(), "Extracting citations...");
    let mut occurrences = Vec::new();

    for block in blocks {
        block.for_each_cite(&mut |cite| {
            for citation in &cite.citations {
                let occurrence = Occurrence::from_citation(citation);
                trace!(
                    slog_scope::logger(),
                    "Occurrence {}: {:?}",
                    occurrences.len(),
                    occurrence
                );
                occurrences.push(occurrence);
            }
        });
    }

    debug!(
        slog_scope::logger(),
        "{} citation occurrences extracted.",
        occurrences.len()
    );
    occurrences
}

/// Build the locator from a citation suffix.
///
/// Only `Str` inlines count. Each is stripped of its surrounding brackets and
/// the pieces are joined with `|`. No text means no locator.
fn locator(suffix: &[Value]) -> Option<String> {
    let pieces: Vec<String> = suffix
        .iter()
        .filter_map(|inline| {
            match (
                inline.get("t").and_then(Value::as_str),
                inline.get("c").and_then(Value::as_str),
            ) {
                (Some("Str"), Some(text)) => Some(BRACKETS.replace_all(text, "").into_owned()),
                _ => None,
            }
        })
        .collect();

    let locator = pieces.join("|");
    if locator.is_empty() {
        None
    } else {
        Some(locator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cite::testing::{cite, document};
    use serde_json::json;

    #[test]
    fn bracketed_suffix() {
        assert_eq!(
            locator(&[json!({"t": "Str", "c": "[p. 12]"})]),
            Some("p. 12".to_string())
        );
        assert_eq!(
            locator(&[json!({"t": "Str", "c": "[ 12 ]"})]),
            Some("12".to_string())
        );
    }

    #[test]
    fn only_str_inlines_are_joined() {
        let suffix = [
            json!({"t": "Str", "c": "[p."}),
            json!({"t": "Space"}),
            json!({"t": "Str", "c": "12]"}),
        ];
        assert_eq!(locator(&suffix), Some("p.|12".to_string()));
    }

    #[test]
    fn no_suffix_no_locator() {
        assert_eq!(locator(&[]), None);
        assert_eq!(locator(&[json!({"t": "Space"})]), None);
        assert_eq!(locator(&[json!({"t": "Str", "c": "[]"})]), None);
    }

    #[test]
    fn occurrences_in_document_order() {
        let doc = document(&[
            format!(
                r#"{{"t":"Para","c":[{},{{"t":"Note","c":[{{"t":"Para","c":[{}]}}]}}]}}"#,
                cite(&[("a", None), ("b", Some("[p. 3]"))]),
                cite(&[("c", None)])
            ),
            format!(r#"{{"t":"Para","c":[{}]}}"#, cite(&[("a", None)])),
        ]);

        let occurrences = extract(&doc.blocks);
        let ids: Vec<&str> = occurrences.iter().map(|o| o.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "a"]);
        assert_eq!(occurrences[1].locator.as_deref(), Some("p. 3"));
        assert_eq!(occurrences[0].locator, None);
    }
}
