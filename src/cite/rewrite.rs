//! Replaces the citations in the document with their formatted text.

use super::{cluster::FormattedQueue, normalize::normalize};
use crate::{ast::Node, error::Error};
use slog::{debug, trace};

/// Rewrite the blocks, replacing each `Cite` with a raw inline.
///
/// Walks the tree in the same order as [`super::extract::extract`], so the
/// formatted citations come off the front of `queue` in the order they were
/// produced. A `Cite` with several citations takes that many entries, joined
/// with `"; "`.
pub fn rewrite(
    blocks: Vec<Node>,
    queue: &mut FormattedQueue,
    raw_format: &str,
) -> Result<Vec<Node>, Error> {
    debug!(slog_scope::logger(), "Rewriting citations...");

    let blocks = blocks
        .into_iter()
        .map(|block| {
            block.try_map_cites(&mut |cite| {
                let formatted = queue.take(cite.citations.len())?;
                let joined = formatted
                    .iter()
                    .map(|f| f.trim())
                    .collect::<Vec<&str>>()
                    .join("; ");
                let text = normalize(&joined);

                trace!(slog_scope::logger(), "Replacing citation with {:?}", text);
                Ok(Node::raw_inline(raw_format, text))
            })
        })
        .collect::<Result<Vec<Node>, Error>>()?;

    debug!(slog_scope::logger(), "Citations rewritten.");
    Ok(blocks)
}
