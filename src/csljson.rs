//! The module contains functionality related to the CSL item library.

use crate::error::Error;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use slog::{debug, trace};
use std::{collections::HashMap, path::Path};

/// A source in a CSL JSON (or CSL YAML) library.
///
/// Only the `id` is read by pancite. Every other field is kept as is and
/// handed to the citation engine, which is the only thing that needs to
/// understand them.
///
/// Based on the [JSON schema for CSL data].
///
/// [JSON schema for CSL data]:
/// (https://github.com/citation-style-language/schema/blob/master/schemas/input/csl-data.json).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CSLItem {
    #[serde(deserialize_with = "text_or_number")]
    pub id: String, // The only non-optional field; may be a number
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Read an id that may be written as a string or as a number.
fn text_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Integer(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Integer(i) => i.to_string(),
        Id::Float(f) => f.to_string(),
    })
}

/// A CSL YAML library is either a bare list or Pandoc's `references` mapping.
#[derive(Deserialize)]
#[serde(untagged)]
enum YamlLibrary {
    List(Vec<CSLItem>),
    References { references: Vec<CSLItem> },
}

/// Deserialize a CSL JSON library.
pub fn build_csl_lib(csl_string: &str) -> Result<Vec<CSLItem>, Error> {
    debug!(slog_scope::logger(), "Starting CSL JSON parsing...");
    match serde_json::from_str(csl_string) {
        Ok(r) => {
            debug!(slog_scope::logger(), "CSL JSON parsed");
            Ok(r)
        }
        Err(e) => Err(Error::Library(e.to_string())),
    }
}

/// Deserialize a CSL YAML library.
pub fn build_csl_yaml_lib(yaml_string: &str) -> Result<Vec<CSLItem>, Error> {
    debug!(slog_scope::logger(), "Starting CSL YAML parsing...");
    match serde_yaml::from_str(yaml_string) {
        Ok(YamlLibrary::List(r)) | Ok(YamlLibrary::References { references: r }) => {
            debug!(slog_scope::logger(), "CSL YAML parsed");
            Ok(r)
        }
        Err(e) => Err(Error::Library(e.to_string())),
    }
}

/// Deserialize a library, choosing the format from the file extension.
pub fn build_lib_for(path: &Path, contents: &str) -> Result<Vec<CSLItem>, Error> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => build_csl_yaml_lib(contents),
        _ => build_csl_lib(contents),
    }
}

/// The items and locales the citation engine can ask for.
#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<CSLItem>,
    index: HashMap<String, usize>,
    locales: HashMap<String, String>,
}

impl ItemStore {
    pub fn new(items: Vec<CSLItem>, locales: HashMap<String, String>) -> ItemStore {
        // With duplicate ids, the first item wins.
        let mut index = HashMap::new();
        for (i, item) in items.iter().enumerate() {
            index.entry(item.id.clone()).or_insert(i);
        }

        ItemStore {
            items,
            index,
            locales,
        }
    }

    /// Look up an item by id.
    pub fn retrieve_item(&self, id: &str) -> Result<&CSLItem, Error> {
        trace!(slog_scope::logger(), "Retrieving item {}", id);
        match self.index.get(id) {
            Some(&i) => Ok(&self.items[i]),
            None => Err(Error::ItemNotFound(id.to_string())),
        }
    }

    /// Look up locale data by language tag (*e.g.*, `en-US`).
    pub fn retrieve_locale(&self, lang: &str) -> Option<&str> {
        trace!(slog_scope::logger(), "Retrieving locale {}", lang);
        self.locales.get(lang).map(String::as_str)
    }

    /// All item ids, in library order, each once.
    pub fn ids(&self) -> Vec<String> {
        self.items
            .iter()
            .enumerate()
            .filter(|(i, item)| self.index.get(&item.id) == Some(i))
            .map(|(_, item)| item.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"[
            {
                "id": "authorBookTitleTitle2021",
                "author": [
                    {
                        "family": "Author",
                        "given": "Book"
                    }
                ],
                "edition": "4th",
                "issued": {
                    "date-parts": [
                        [
                            2021
                        ]
                    ]
                },
                "title": "Book Title: A Title for the Dummy Book",
                "title-short": "Book Title",
                "type": "book"
            },
            {
                "id": "authorJournalArticleTitle2021",
                "author": [
                    {
                        "family": "Author",
                        "given": "Article"
                    }
                ],
                "container-title": "Journal of Journal Articles",
                "page": "1000",
                "title": "Journal Article Title: A Journal Article",
                "type": "article-journal",
                "volume": "99"
            }
        ]"#;

    #[test]
    fn basic() {
        let result = build_csl_lib(LIBRARY).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "authorBookTitleTitle2021");
        assert_eq!(result[0].fields["edition"], "4th");
        assert_eq!(result[1].fields["container-title"], "Journal of Journal Articles");
    }

    #[test]
    /// Ensure that a non-JSON file returns an appropriate error.
    fn non_json() {
        let csl_string = r#"This ain't no JSON library..."#;
        let result = build_csl_lib(csl_string);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("error deserializing the CSL library"));
    }

    #[test]
    /// Ensure an error for no id with an appropriate error message.
    fn no_id() {
        let json_string = r#"[{ "title": "Book Title: A Title for the Book", "type": "book" }]"#;
        let result = build_csl_lib(json_string);
        assert!(result.unwrap_err().to_string().contains("missing field `id`"));
    }

    #[test]
    fn yaml_references() {
        let yaml_string = r#"
references:
- id: jones2019
  type: book
  author:
    - family: Jones
      given: Alice
  title: An Important Book
  issued:
    date-parts:
      - [2019]
- id: smith2020
  type: article-journal
  title: A Great Paper
"#;
        let result = build_lib_for(Path::new("refs.yaml"), yaml_string).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "jones2019");
        assert_eq!(result[0].fields["issued"]["date-parts"][0][0], 2019);
        assert_eq!(result[1].fields["type"], "article-journal");
    }

    #[test]
    fn yaml_list() {
        let yaml_string = "- id: jones2019\n  title: An Important Book\n";
        let result = build_csl_yaml_lib(yaml_string).unwrap();
        assert_eq!(result[0].id, "jones2019");
    }

    #[test]
    fn retrieve() {
        let mut locales = HashMap::new();
        locales.insert("en-US".to_string(), "<locale/>".to_string());
        let store = ItemStore::new(build_csl_lib(LIBRARY).unwrap(), locales);

        assert_eq!(
            store.retrieve_item("authorJournalArticleTitle2021").unwrap().fields["page"],
            "1000"
        );
        assert!(matches!(
            store.retrieve_item("missing2000"),
            Err(Error::ItemNotFound(id)) if id == "missing2000"
        ));
        assert_eq!(store.retrieve_locale("en-US"), Some("<locale/>"));
        assert_eq!(store.retrieve_locale("ja-JP"), None);
        assert_eq!(
            store.ids(),
            vec!["authorBookTitleTitle2021", "authorJournalArticleTitle2021"]
        );
    }

    #[test]
    fn numeric_ids() {
        let result = build_csl_lib(r#"[{"id":12,"title":"Twelve"},{"id":"b"}]"#).unwrap();
        assert_eq!(result[0].id, "12");
        assert_eq!(result[0].fields["title"], "Twelve");

        let result = build_lib_for(
            Path::new("refs.yml"),
            "references:\n- id: 2020\n  title: A Year\n- id: jones2019\n",
        )
        .unwrap();
        assert_eq!(result[0].id, "2020");
        assert_eq!(result[1].id, "jones2019");

        let store = ItemStore::new(result, HashMap::new());
        assert_eq!(store.retrieve_item("2020").unwrap().fields["title"], "A Year");
    }

    #[test]
    fn duplicate_ids() {
        let items = build_csl_lib(
            r#"[{"id":"a","title":"First"},{"id":"b"},{"id":"a","title":"Second"}]"#,
        )
        .unwrap();
        let store = ItemStore::new(items, HashMap::new());

        assert_eq!(store.retrieve_item("a").unwrap().fields["title"], "First");
        assert_eq!(store.ids(), vec!["a", "b"]);
    }
}
