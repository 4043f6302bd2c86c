//! Functions for interacting with the file system.

use crate::error::Error;
use ansi_term::Color;
use slog::{debug, warn};
use std::{collections::HashMap, fs, path::Path};

/// Load a file into a string.
///
/// This function is used to load the style, the library, the locales, and the
/// configuration file.
pub fn load_file(path: &Path) -> Result<String, Error> {
    debug!(
        slog_scope::logger(),
        "Loading file {}...",
        path.to_string_lossy()
    );

    match fs::read_to_string(path) {
        Ok(r) => {
            debug!(
                slog_scope::logger(),
                "File {} loaded.",
                path.to_string_lossy()
            );
            Ok(r)
        }
        Err(e) => Err(Error::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Load the locale files found in `dir`.
///
/// A language without a readable `locales-<lang>.xml` is left out with a
/// warning; the engine falls back on its own defaults for it.
pub fn load_locales(dir: &Path, langs: &[String]) -> HashMap<String, String> {
    let mut locales = HashMap::new();

    for lang in langs {
        let path = dir.join(format!("locales-{}.xml", lang));
        match load_file(&path) {
            Ok(xml) => {
                locales.insert(lang.clone(), xml);
            }
            Err(e) => {
                warn!(slog_scope::logger(), "Locale {} unavailable: {}", lang, e);
                eprintln!(
                    "{} Locale {} unavailable ({})",
                    Color::Yellow.paint("WARN"),
                    Color::Blue.paint(lang),
                    path.to_string_lossy()
                );
            }
        }
    }

    debug!(
        slog_scope::logger(),
        "{} of {} locales loaded.",
        locales.len(),
        langs.len()
    );
    locales
}

/// Create a blank configuration file.
///
/// Creates a commented configuration file with every setting at its default,
/// which users can then edit.
pub fn new_config_ron(path: &Path) -> Result<(), Error> {
    eprintln!(
        "{} Creating blank configuration file ({})",
        Color::Green.paint("INFO"),
        Color::Blue.paint(path.to_string_lossy())
    );

    let blank_ron = r#"// Pancite configuration.
// Every setting is optional. Delete a line to keep its default.
(
    // The citation engine. It is started once per run and talks
    // line-delimited JSON on its standard input and output.
    engine: (
        command: "citeproc-bridge",
        args: [],
        // The default locale for the engine.
        lang: "en-US",
    ),

    // Where to find locales-<lang>.xml. None means next to the pancite
    // executable.
    locales_dir: None,

    // The locales to load.
    locales: ["en-US", "ja-JP"],

    // The format of the raw inlines that replace citations.
    raw_format: "markdown",
)
"#;

    fs::write(path, blank_ron).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: e,
    })
}
