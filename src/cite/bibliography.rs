//! Builds the bibliography and puts it under the bibliography heading.

use super::normalize::normalize;
use crate::{ast::Node, engine::CitationEngine, error::Error};
use phf::phf_set;
use slog::{debug, trace};

/// Heading titles that mark where the bibliography goes.
static BIBLIOGRAPHY_TITLES: phf::Set<&'static str> = phf_set! {
    "Bibliography",
    "参考文献",
};

/// The index of the first top-level heading titled like a bibliography.
pub fn find_bibliography_heading(blocks: &[Node]) -> Option<usize> {
    blocks.iter().position(|block| match block {
        Node::Header(header) => BIBLIOGRAPHY_TITLES.contains(header.title().as_str()),
        _ => false,
    })
}

/// One `Para` holding a raw inline per bibliography entry.
pub fn bibliography_blocks(entries: &[String], raw_format: &str) -> Vec<Node> {
    entries
        .iter()
        .map(|entry| {
            let text = normalize(entry);
            trace!(slog_scope::logger(), "Bibliography entry {:?}", text);
            Node::para(vec![Node::raw_inline(raw_format, text)])
        })
        .collect()
}

/// Insert the engine's bibliography right after the bibliography heading.
///
/// Without such a heading, the document is left alone and the engine is not
/// asked for a bibliography. Returns the number of entries inserted.
pub fn insert_bibliography<E: CitationEngine + ?Sized>(
    blocks: &mut Vec<Node>,
    engine: &mut E,
    raw_format: &str,
) -> Result<usize, Error> {
    let heading = match find_bibliography_heading(blocks) {
        Some(i) => i,
        None => {
            debug!(
                slog_scope::logger(),
                "No bibliography heading; skipping the bibliography."
            );
            return Ok(0);
        }
    };

    debug!(slog_scope::logger(), "Building the bibliography...");
    let entries = engine.make_bibliography()?;
    let paragraphs = bibliography_blocks(&entries, raw_format);
    let inserted = paragraphs.len();
    blocks.splice(heading + 1..heading + 1, paragraphs);

    debug!(
        slog_scope::logger(),
        "{} bibliography entries inserted after block {}.", inserted, heading
    );
    Ok(inserted)
}
