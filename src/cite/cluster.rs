//! Builds the citation clusters and runs them through the engine.
//!
//! Clusters go to the engine one at a time and strictly in document order,
//! each with the list of every cluster before it. The engine's rendering of
//! a cluster (full form, short form, *ibid.*) depends on that history.

use super::extract::Occurrence;
use crate::{
    csljson::ItemStore,
    engine::{
        CitationEngine, Cluster, ClusterItem, ClusterOutcome, ClusterPosition, ClusterProperties,
    },
    error::Error,
};
use slog::{debug, trace};
use std::collections::VecDeque;

/// The formatted text of every occurrence, in occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormattedQueue(VecDeque<String>);

impl FormattedQueue {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the next `n` formatted citations from the front.
    pub fn take(&mut self, n: usize) -> Result<Vec<String>, Error> {
        if self.0.len() < n {
            return Err(Error::QueueExhausted);
        }
        Ok(self.0.drain(..n).collect())
    }

    /// Check that every formatted citation was used.
    pub fn finish(self) -> Result<(), Error> {
        match self.0.len() {
            0 => Ok(()),
            n => Err(Error::QueueNotDrained(n)),
        }
    }
}

impl FromIterator<String> for FormattedQueue {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> FormattedQueue {
        FormattedQueue(iter.into_iter().collect())
    }
}

/// Build one cluster per occurrence.
///
/// Every cited item must be in the store; a missing one stops everything
/// before the engine sees any cluster.
pub fn build_clusters(
    occurrences: &[Occurrence],
    store: &ItemStore,
) -> Result<Vec<Cluster>, Error> {
    debug!(slog_scope::logger(), "Building clusters...");
    let mut clusters = Vec::with_capacity(occurrences.len());

    for (note_index, occurrence) in occurrences.iter().enumerate() {
        store.retrieve_item(&occurrence.item_id)?;

        clusters.push(Cluster {
            id: format!("{}_{}", occurrence.item_id, note_index),
            items: vec![ClusterItem {
                id: occurrence.item_id.clone(),
                locator: occurrence.locator.clone(),
            }],
            properties: ClusterProperties { note_index },
        });
    }

    debug!(slog_scope::logger(), "{} clusters built.", clusters.len());
    Ok(clusters)
}

/// Submit the clusters in order and collect one formatted text for each.
pub fn format_clusters<E: CitationEngine + ?Sized>(
    engine: &mut E,
    clusters: &[Cluster],
) -> Result<FormattedQueue, Error> {
    debug!(slog_scope::logger(), "Formatting clusters...");
    let mut formatted = VecDeque::with_capacity(clusters.len());

    for (i, cluster) in clusters.iter().enumerate() {
        let predecessors: Vec<ClusterPosition> =
            clusters[..i].iter().map(Cluster::position).collect();

        let outcome = engine.process_citation_cluster(cluster, &predecessors, &[])?;
        let text = select_text(&outcome)?;
        trace!(
            slog_scope::logger(),
            "Cluster {} (bibchange: {}): {:?}",
            cluster.id,
            outcome.bibchange,
            text
        );
        formatted.push_back(text);
    }

    debug!(slog_scope::logger(), "Clusters formatted.");
    Ok(FormattedQueue(formatted))
}

/// Pick the text for the cluster just processed.
///
/// If the bibliography did not change, the engine's second update (usually
/// the short or *ibid.* form) wins when it has text. Otherwise, and as a
/// fallback, the first update is used.
pub fn select_text(outcome: &ClusterOutcome) -> Result<String, Error> {
    let primary = match outcome.updates.first() {
        Some(u) => u,
        None => {
            return Err(Error::EngineProtocol(
                "no formatted text for the cluster".to_string(),
            ))
        }
    };

    if !outcome.bibchange {
        if let Some(secondary) = outcome.updates.get(1).filter(|u| !u.text.is_empty()) {
            return Ok(secondary.text.clone());
        }
    }
    Ok(primary.text.clone())
}
