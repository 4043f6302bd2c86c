//! The pancite error type.

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a filter run.
///
/// No error is recoverable: the run stops and nothing is written to standard
/// output.
#[derive(Debug, Error)]
pub enum Error {
    // Input
    #[error("error deserializing the Pandoc JSON—{0}")]
    Document(#[source] serde_json::Error),
    #[error("the document metadata has no `{0}` field")]
    MissingMetadata(&'static str),

    // Resources
    #[error("error reading the file {}—{source}", path.to_string_lossy())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("error deserializing the CSL library—{0}")]
    Library(String),
    #[error("error deserializing the configuration file—{0}")]
    Config(String),
    #[error("cannot start the citation engine `{command}`—{source}")]
    EngineSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Resolution
    #[error("item with ID \"{0}\" not found in the bibliography")]
    ItemNotFound(String),

    // Structure
    #[error("malformed citation node—{0}")]
    MalformedCitation(String),
    #[error("ran out of formatted citations while rewriting the document")]
    QueueExhausted,
    #[error("{0} formatted citation(s) left over after rewriting the document")]
    QueueNotDrained(usize),

    // Engine
    #[error("citation engine protocol error—{0}")]
    EngineProtocol(String),
    #[error("citation engine error—{0}")]
    Engine(String),
    #[error("the citation engine closed its output")]
    EngineClosed,
    #[error("error talking to the citation engine—{0}")]
    EngineIo(#[source] std::io::Error),
}
