//! The citation-resolution pipeline.
//!
//! The document is walked twice in the same order: once to collect the
//! citation occurrences and once to put the formatted text back. In between,
//! the occurrences go through the engine strictly one after another.

mod bibliography;
mod cluster;
mod extract;
mod normalize;
mod rewrite;

pub use bibliography::{find_bibliography_heading, insert_bibliography};
pub use cluster::{build_clusters, format_clusters, select_text, FormattedQueue};
pub use extract::{extract, Occurrence};
pub use normalize::normalize;
pub use rewrite::rewrite;

use crate::{ast::Document, csljson::ItemStore, engine::CitationEngine, error::Error};
use slog::{debug, o};

/// The `nocite` id that stands for every item in the library.
const ALL_ITEMS: &str = "*";

/// Resolve every citation in the document and insert the bibliography.
///
/// The engine is set up and every item registered before the first cluster
/// is submitted. Any error aborts the whole run.
pub fn resolve<E: CitationEngine + ?Sized>(
    mut document: Document,
    store: &ItemStore,
    engine: &mut E,
    raw_format: &str,
) -> Result<Document, Error> {
    let uncited = uncited_ids(&document, store)?;

    slog_scope::scope(&slog_scope::logger().new(o!("fn" => "register()")), || {
        debug!(slog_scope::logger(), "Registering items...");
        engine.set_output_format("html")?;
        engine.update_items(&store.ids())?;
        if !uncited.is_empty() {
            engine.update_uncited_items(&uncited)?;
        }
        debug!(
            slog_scope::logger(),
            "Items registered ({} uncited).",
            uncited.len()
        );
        Ok::<(), Error>(())
    })?;

    let occurrences = slog_scope::scope(&slog_scope::logger().new(o!("fn" => "extract()")), || {
        extract(&document.blocks)
    });

    let clusters = slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "build_clusters()")),
        || build_clusters(&occurrences, store),
    )?;

    let mut queue = slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "format_clusters()")),
        || format_clusters(&mut *engine, &clusters),
    )?;

    let blocks = std::mem::take(&mut document.blocks);
    document.blocks = slog_scope::scope(&slog_scope::logger().new(o!("fn" => "rewrite()")), || {
        rewrite(blocks, &mut queue, raw_format)
    })?;
    queue.finish()?;

    slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "insert_bibliography()")),
        || insert_bibliography(&mut document.blocks, &mut *engine, raw_format),
    )?;

    Ok(document)
}

/// The items listed under `nocite`, each once and in order.
///
/// `*` anywhere in the list means the whole library. Every listed id must be
/// in the library.
fn uncited_ids(document: &Document, store: &ItemStore) -> Result<Vec<String>, Error> {
    let listed = document.meta.citation_ids("nocite")?;
    if listed.iter().any(|id| id == ALL_ITEMS) {
        debug!(slog_scope::logger(), "nocite lists every item.");
        return Ok(store.ids());
    }

    let mut uncited: Vec<String> = Vec::with_capacity(listed.len());
    for id in listed {
        store.retrieve_item(&id)?;
        if !uncited.contains(&id) {
            uncited.push(id);
        }
    }
    Ok(uncited)
}
