//! Contains the main pancite function: a Pandoc JSON filter that formats
//! citations and inserts the bibliography.

pub mod ast;
pub mod cite;
pub mod config;
pub mod csljson;
pub mod engine;
mod error;
pub mod fs;

pub use error::Error;

use ansi_term::Color;
use ast::Document;
use config::Config;
use csljson::{build_lib_for, ItemStore};
use engine::BridgeEngine;
use fs::{load_file, load_locales};
use slog::{debug, o};
use std::path::PathBuf;

/// The main pancite function.
///
/// Takes the whole Pandoc JSON document and returns the filtered document.
/// Nothing is returned unless every stage succeeded.
pub fn pancite(config: &Config, input: &str) -> Result<String, Error> {
    eprintln!("{} Starting pancite...", Color::Green.paint("INFO"));

    let document = slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "from_json()")),
        || Document::from_json(input),
    )?;

    // The style and library paths are relative to where Pandoc runs.
    let style_path = PathBuf::from(document.meta.text("csl")?);
    let library_path = PathBuf::from(document.meta.text("bibliography")?);

    let style = slog_scope::scope(&slog_scope::logger().new(o!("fn" => "load_file()")), || {
        load_file(&style_path)
    })?;

    let library = slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "build_lib_for()")),
        || build_lib_for(&library_path, &load_file(&library_path)?),
    )?;
    debug!(
        slog_scope::logger(),
        "{} items in {}",
        library.len(),
        library_path.to_string_lossy()
    );

    let locales = slog_scope::scope(
        &slog_scope::logger().new(o!("fn" => "load_locales()")),
        || load_locales(&config.locales_dir(), &config.locales),
    );

    let store = ItemStore::new(library, locales);

    eprintln!("{} Formatting citations...", Color::Green.paint("INFO"));
    let mut engine = slog_scope::scope(&slog_scope::logger().new(o!("fn" => "spawn()")), || {
        BridgeEngine::spawn(&config.engine, &store, &style)
    })?;

    let document = slog_scope::scope(&slog_scope::logger().new(o!("fn" => "resolve()")), || {
        cite::resolve(document, &store, &mut engine, &config.raw_format)
    })?;
    drop(engine);

    let output = slog_scope::scope(&slog_scope::logger().new(o!("fn" => "to_json()")), || {
        document.to_json()
    })?;

    eprintln!("{} Done", Color::Green.paint("INFO"));
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use serde_json::{json, Value};
    use std::{fs, path::Path};

    /// A shell engine that answers every request with a fixed result.
    const ENGINE: &str = r#"while IFS= read -r line; do
  case "$line" in
    *processCitationCluster*) printf '%s\n' '{"result":[{"bibchange":true},[[0,"<i>Smith</i>, p.&nbsp;3"]]]}' ;;
    *makeBibliography*) printf '%s\n' '{"result":[{},["<div class=\"csl-entry\">Smith &amp; Co.</div>"]]}' ;;
    *) printf '%s\n' '{"result":null}' ;;
  esac
done"#;

    fn config(locales: &Path) -> Config {
        Config::new(
            EngineConfig::new(
                "sh".to_string(),
                vec!["-c".to_string(), ENGINE.to_string()],
                "en-US".to_string(),
            ),
            Some(locales.to_path_buf()),
            vec!["en-US".to_string()],
            "markdown".to_string(),
        )
    }

    fn meta_string(text: &str) -> Value {
        json!({"t": "MetaString", "c": text})
    }

    fn input(meta: Value) -> String {
        json!({
            "pandoc-api-version": [1, 23, 1],
            "meta": meta,
            "blocks": [
                {"t": "Para", "c": [
                    {"t": "Str", "c": "See"},
                    {"t": "Space"},
                    {"t": "Cite", "c": [
                        [{"citationId": "smith2020", "citationSuffix": [{"t": "Str", "c": "[p. 3]"}]}],
                        [{"t": "Str", "c": "[@smith2020, p. 3]"}]
                    ]}
                ]},
                {"t": "Header", "c": [1, ["bibliography", [], []], [{"t": "Str", "c": "Bibliography"}]]}
            ]
        })
        .to_string()
    }

    #[test]
    fn missing_style_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let meta = json!({"bibliography": meta_string("library.json")});

        let result = pancite(&config(dir.path()), &input(meta));
        assert!(matches!(result, Err(Error::MissingMetadata("csl"))));
    }

    #[test]
    fn missing_library_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let meta = json!({"csl": meta_string("style.csl")});

        let result = pancite(&config(dir.path()), &input(meta));
        assert!(matches!(result, Err(Error::MissingMetadata("bibliography"))));
    }

    #[test]
    fn missing_style_file() {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("library.json");
        fs::write(&library, r#"[{"id":"smith2020"}]"#).unwrap();
        let style = dir.path().join("missing.csl");
        let meta = json!({
            "csl": meta_string(&style.to_string_lossy()),
            "bibliography": meta_string(&library.to_string_lossy())
        });

        match pancite(&config(dir.path()), &input(meta)) {
            Err(Error::Io { path, .. }) => assert_eq!(path, style),
            other => panic!("expected an I/O error, got {:?}", other.map(|_| ())),
        }
    }

    #[cfg(unix)]
    #[test]
    fn formats_citations_and_bibliography() {
        let dir = tempfile::tempdir().unwrap();
        let style = dir.path().join("style.csl");
        let library = dir.path().join("library.json");
        fs::write(&style, "<style/>").unwrap();
        fs::write(&library, r#"[{"id":"smith2020","title":"A Great Paper"}]"#).unwrap();
        fs::write(dir.path().join("locales-en-US.xml"), "<locale/>").unwrap();
        let meta = json!({
            "csl": meta_string(&style.to_string_lossy()),
            "bibliography": meta_string(&library.to_string_lossy())
        });

        let output = pancite(&config(dir.path()), &input(meta)).unwrap();
        let output: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(output["pandoc-api-version"], json!([1, 23, 1]));
        assert_eq!(
            output["blocks"][0]["c"][2],
            json!({"t": "RawInline", "c": ["markdown", "*Smith*, p.&nbsp;3"]})
        );
        assert_eq!(output["blocks"][1]["t"], "Header");
        assert_eq!(
            output["blocks"][2],
            json!({"t": "Para", "c": [{"t": "RawInline", "c": ["markdown", "Smith & Co."]}]})
        );
        assert_eq!(output["blocks"].as_array().unwrap().len(), 3);
    }
}
