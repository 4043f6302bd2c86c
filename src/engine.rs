//! The interface to the citation formatting engine.
//!
//! The engine is a black box that knows the citation style. Pancite only
//! feeds it clusters in document order and reads back formatted text. The
//! method names and data shapes follow citeproc-js, so a citeproc-js-style
//! engine can sit behind [`BridgeEngine`] without translation.

mod bridge;

pub use bridge::BridgeEngine;

use crate::error::Error;
use serde::{Deserialize, Serialize};

/// A citation formatting engine.
///
/// Clusters must be submitted one at a time, in document order. Whether a
/// cluster gets a full, short, or *ibid.* form depends on every cluster
/// processed before it.
pub trait CitationEngine {
    /// Select the engine's output format (pancite always asks for `html`).
    fn set_output_format(&mut self, format: &str) -> Result<(), Error>;

    /// Register the items that may be cited.
    fn update_items(&mut self, ids: &[String]) -> Result<(), Error>;

    /// Register items that go in the bibliography without being cited.
    fn update_uncited_items(&mut self, ids: &[String]) -> Result<(), Error>;

    /// Format one cluster.
    ///
    /// `predecessors` are all clusters already processed, in order.
    /// `successors` are clusters that follow it (pancite always passes none).
    fn process_citation_cluster(
        &mut self,
        cluster: &Cluster,
        predecessors: &[ClusterPosition],
        successors: &[ClusterPosition],
    ) -> Result<ClusterOutcome, Error>;

    /// Build the bibliography from everything registered and cited so far.
    fn make_bibliography(&mut self) -> Result<Vec<String>, Error>;
}

/// A citation cluster: one request to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(rename = "citationID")]
    pub id: String,
    #[serde(rename = "citationItems")]
    pub items: Vec<ClusterItem>,
    pub properties: ClusterProperties,
}

impl Cluster {
    /// The cluster's position, as listed among a later cluster's predecessors.
    pub fn position(&self) -> ClusterPosition {
        ClusterPosition(self.id.clone(), self.properties.note_index)
    }
}

/// An item cited in a cluster, with its optional locator (pincite).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterItem {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub locator: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterProperties {
    #[serde(rename = "noteIndex")]
    pub note_index: usize,
}

/// `(citationID, noteIndex)` of an already processed cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterPosition(pub String, pub usize);

/// The engine's answer to [`CitationEngine::process_citation_cluster`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterOutcome {
    /// Whether the bibliography changed because of this cluster.
    pub bibchange: bool,
    /// Clusters whose rendering was produced or changed by this call.
    pub updates: Vec<ClusterUpdate>,
}

/// Formatted text for the cluster at `index` among all processed clusters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterUpdate {
    pub index: usize,
    pub text: String,
}

#[cfg(test)]
pub(crate) mod testing {
    //! A recording engine for pipeline tests.
    //!
    //! The first citation of an item renders as `<i>id</i>` (plus `, locator`)
    //! and reports a bibliography change. Citing the same item as the
    //! previous cluster reports no change and sends two updates: the full
    //! form first and the `<i>Ibid.</i>` form second.

    use super::*;

    #[derive(Debug, Default)]
    pub struct MockEngine {
        pub output_format: Option<String>,
        pub items: Vec<String>,
        pub uncited: Vec<String>,
        pub submitted: Vec<(Cluster, Vec<ClusterPosition>, Vec<ClusterPosition>)>,
        pub bibliography_requests: usize,
        /// Registration or cluster calls made after the first cluster.
        pub late_registrations: usize,
    }

    impl CitationEngine for MockEngine {
        fn set_output_format(&mut self, format: &str) -> Result<(), Error> {
            self.output_format = Some(format.to_string());
            Ok(())
        }

        fn update_items(&mut self, ids: &[String]) -> Result<(), Error> {
            if !self.submitted.is_empty() {
                self.late_registrations += 1;
            }
            self.items = ids.to_vec();
            Ok(())
        }

        fn update_uncited_items(&mut self, ids: &[String]) -> Result<(), Error> {
            if !self.submitted.is_empty() {
                self.late_registrations += 1;
            }
            self.uncited = ids.to_vec();
            Ok(())
        }

        fn process_citation_cluster(
            &mut self,
            cluster: &Cluster,
            predecessors: &[ClusterPosition],
            successors: &[ClusterPosition],
        ) -> Result<ClusterOutcome, Error> {
            let index = self.submitted.len();
            let item = &cluster.items[0];
            let repeat = self
                .submitted
                .last()
                .map(|(last, _, _)| last.items[0].id == item.id)
                .unwrap_or(false);

            let mut full = format!("<i>{}</i>", item.id);
            if let Some(locator) = &item.locator {
                full.push_str(", ");
                full.push_str(locator);
            }

            self.submitted
                .push((cluster.clone(), predecessors.to_vec(), successors.to_vec()));

            if repeat {
                Ok(ClusterOutcome {
                    bibchange: false,
                    updates: vec![
                        ClusterUpdate { index, text: full },
                        ClusterUpdate {
                            index,
                            text: "<i>Ibid.</i>".to_string(),
                        },
                    ],
                })
            } else {
                Ok(ClusterOutcome {
                    bibchange: true,
                    updates: vec![ClusterUpdate { index, text: full }],
                })
            }
        }

        fn make_bibliography(&mut self) -> Result<Vec<String>, Error> {
            self.bibliography_requests += 1;
            let mut entries: Vec<String> = Vec::new();
            let cited = self.submitted.iter().map(|(c, _, _)| c.items[0].id.clone());
            for id in cited.chain(self.uncited.iter().cloned()) {
                let entry = format!("<div class=\"csl-entry\">{} &amp; Co.</div>\n", id);
                if !entries.contains(&entry) {
                    entries.push(entry);
                }
            }
            Ok(entries)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cluster_serializes_like_citeproc() {
        let cluster = Cluster {
            id: "smith2020_0".to_string(),
            items: vec![ClusterItem {
                id: "smith2020".to_string(),
                locator: None,
            }],
            properties: ClusterProperties { note_index: 0 },
        };
        assert_eq!(
            serde_json::to_string(&cluster).unwrap(),
            r#"{"citationID":"smith2020_0","citationItems":[{"id":"smith2020"}],"properties":{"noteIndex":0}}"#
        );
        assert_eq!(
            serde_json::to_string(&[cluster.position()]).unwrap(),
            r#"[["smith2020_0",0]]"#
        );
    }

    #[test]
    fn locator_is_serialized_when_present() {
        let item = ClusterItem {
            id: "smith2020".to_string(),
            locator: Some("p. 12".to_string()),
        };
        assert_eq!(
            serde_json::to_string(&item).unwrap(),
            r#"{"id":"smith2020","locator":"p. 12"}"#
        );
    }
}
