//! A citation engine running in a child process.
//!
//! The child reads one JSON request per line on its stdin and writes one JSON
//! message per line on its stdout. A request looks like
//! `{"method": "...", "params": ...}`. While working on it, the child may ask
//! for items and locales with `{"callback": "retrieveItem", "params": "<id>"}`
//! (or `retrieveLocale`), which are answered with `{"result": ...}` or
//! `{"error": "..."}`. The request is finished when the child sends its own
//! `{"result": ...}` or `{"error": "..."}`.

use super::{CitationEngine, Cluster, ClusterOutcome, ClusterPosition, ClusterUpdate};
use crate::{config::EngineConfig, csljson::ItemStore, error::Error};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use slog::{debug, trace, warn};
use std::{
    io::{self, BufRead, BufReader, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

/// How long a closed engine gets to exit on its own.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const SHUTDOWN_POLL: Duration = Duration::from_millis(10);

/// Messages from the engine.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Message {
    Callback { callback: Callback, params: String },
    Failure { error: String },
    Success {
        #[serde(deserialize_with = "required")]
        result: Value,
    },
}

/// Deserialize a `Value` that must be present (`null` is allowed).
fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
    Value::deserialize(deserializer)
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Callback {
    RetrieveItem,
    RetrieveLocale,
}

/// The first element of a `processCitationCluster` result.
#[derive(Debug, Deserialize)]
struct ClusterStatus {
    #[serde(default)]
    bibchange: bool,
}

/// A [`CitationEngine`] that forwards every call over a pair of streams,
/// normally the stdin and stdout of a child process.
pub struct BridgeEngine<'a, W: Write = ChildStdin, R: BufRead = BufReader<ChildStdout>> {
    store: &'a ItemStore,
    /// Dropped first when shutting down, closing the engine's input.
    writer: Option<W>,
    reader: R,
    child: Option<Child>,
}

impl<'a> BridgeEngine<'a> {
    /// Start the engine process and hand it the style.
    pub fn spawn(
        config: &EngineConfig,
        store: &'a ItemStore,
        style: &str,
    ) -> Result<BridgeEngine<'a>, Error> {
        debug!(
            slog_scope::logger(),
            "Starting citation engine {} {:?}...", config.command, config.args
        );
        let spawn_error = |source| Error::EngineSpawn {
            command: config.command.clone(),
            source,
        };

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(i), Some(o)) => (i, o),
            _ => {
                let _ = child.kill();
                return Err(spawn_error(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "engine pipes unavailable",
                )));
            }
        };

        let mut engine = BridgeEngine {
            store,
            writer: Some(stdin),
            reader: BufReader::new(stdout),
            child: Some(child),
        };
        engine.call("init", json!({ "style": style, "lang": config.lang }))?;

        debug!(slog_scope::logger(), "Citation engine started.");
        Ok(engine)
    }
}

impl<'a, W: Write, R: BufRead> BridgeEngine<'a, W, R> {
    /// Talk to an engine over already open streams.
    pub fn from_streams(store: &'a ItemStore, writer: W, reader: R) -> BridgeEngine<'a, W, R> {
        BridgeEngine {
            store,
            writer: Some(writer),
            reader,
            child: None,
        }
    }

    /// Send a request and wait for its result, answering callbacks meanwhile.
    ///
    /// A failed item lookup is reported as [`Error::ItemNotFound`] even if the
    /// engine carries on and succeeds.
    fn call(&mut self, method: &str, params: Value) -> Result<Value, Error> {
        trace!(slog_scope::logger(), "Engine request {}", method);
        self.send(&json!({ "method": method, "params": params }))?;

        let mut lookup_failure: Option<Error> = None;
        loop {
            match self.receive()? {
                Message::Callback { callback, params } => {
                    let reply = match self.answer(callback, &params) {
                        Ok(value) => json!({ "result": value }),
                        Err(e) => {
                            let reply = json!({ "error": e.to_string() });
                            lookup_failure.get_or_insert(e);
                            reply
                        }
                    };
                    self.send(&reply)?;
                }
                Message::Failure { error } => {
                    return Err(lookup_failure.unwrap_or(Error::Engine(error)));
                }
                Message::Success { result } => {
                    return match lookup_failure {
                        Some(e) => Err(e),
                        None => Ok(result),
                    };
                }
            }
        }
    }

    fn answer(&self, callback: Callback, params: &str) -> Result<Value, Error> {
        trace!(slog_scope::logger(), "Engine callback {:?}({})", callback, params);
        match callback {
            Callback::RetrieveItem => serde_json::to_value(self.store.retrieve_item(params)?)
                .map_err(|e| Error::EngineProtocol(e.to_string())),
            Callback::RetrieveLocale => match self.store.retrieve_locale(params) {
                Some(locale) => Ok(Value::from(locale)),
                None => {
                    warn!(slog_scope::logger(), "No locale data for {}", params);
                    Ok(Value::Null)
                }
            },
        }
    }

    fn send(&mut self, message: &Value) -> Result<(), Error> {
        let writer = self.writer.as_mut().ok_or(Error::EngineClosed)?;
        serde_json::to_writer(&mut *writer, message).map_err(|e| Error::EngineIo(e.into()))?;
        writer.write_all(b"\n").map_err(Error::EngineIo)?;
        writer.flush().map_err(Error::EngineIo)
    }

    fn receive(&mut self) -> Result<Message, Error> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).map_err(Error::EngineIo)? == 0 {
                return Err(Error::EngineClosed);
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        serde_json::from_str(&line).map_err(|e| {
            Error::EngineProtocol(format!("unreadable message {:?} ({})", line.trim(), e))
        })
    }
}

impl<W: Write, R: BufRead> CitationEngine for BridgeEngine<'_, W, R> {
    fn set_output_format(&mut self, format: &str) -> Result<(), Error> {
        self.call("setOutputFormat", json!(format)).map(|_| ())
    }

    fn update_items(&mut self, ids: &[String]) -> Result<(), Error> {
        self.call("updateItems", json!(ids)).map(|_| ())
    }

    fn update_uncited_items(&mut self, ids: &[String]) -> Result<(), Error> {
        self.call("updateUncitedItems", json!(ids)).map(|_| ())
    }

    fn process_citation_cluster(
        &mut self,
        cluster: &Cluster,
        predecessors: &[ClusterPosition],
        successors: &[ClusterPosition],
    ) -> Result<ClusterOutcome, Error> {
        let result = self.call(
            "processCitationCluster",
            json!([cluster, predecessors, successors]),
        )?;
        decode_cluster_result(result)
    }

    fn make_bibliography(&mut self) -> Result<Vec<String>, Error> {
        let result = self.call("makeBibliography", Value::Null)?;
        decode_bibliography(result)
    }
}

impl<W: Write, R: BufRead> Drop for BridgeEngine<'_, W, R> {
    /// Close the engine's input and reap it. An engine that has not exited
    /// after [`SHUTDOWN_GRACE`] is killed.
    fn drop(&mut self) {
        self.writer.take();
        if let Some(mut child) = self.child.take() {
            let deadline = Instant::now() + SHUTDOWN_GRACE;
            loop {
                match child.try_wait() {
                    Ok(Some(status)) => {
                        debug!(slog_scope::logger(), "Citation engine exited ({}).", status);
                        return;
                    }
                    Ok(None) if Instant::now() < deadline => thread::sleep(SHUTDOWN_POLL),
                    _ => break,
                }
            }
            warn!(slog_scope::logger(), "Citation engine did not exit; killing it.");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Decode `[{"bibchange": bool, ...}, [[index, text, citationID], ...]]`.
fn decode_cluster_result(result: Value) -> Result<ClusterOutcome, Error> {
    let (status, updates): (ClusterStatus, Vec<Vec<Value>>) = serde_json::from_value(result)
        .map_err(|e| Error::EngineProtocol(format!("unexpected cluster result ({})", e)))?;

    let updates = updates
        .iter()
        .map(|update| match update.as_slice() {
            [Value::Number(index), Value::String(text), ..] => match index.as_u64() {
                Some(index) => Ok(ClusterUpdate {
                    index: index as usize,
                    text: text.clone(),
                }),
                None => Err(Error::EngineProtocol(format!("bad cluster index {}", index))),
            },
            _ => Err(Error::EngineProtocol(format!(
                "cluster update is not [index, text]: {:?}",
                update
            ))),
        })
        .collect::<Result<Vec<ClusterUpdate>, Error>>()?;

    Ok(ClusterOutcome {
        bibchange: status.bibchange,
        updates,
    })
}

/// Decode `[meta, [entry, ...]]`, or `false` for a style without a
/// bibliography.
fn decode_bibliography(result: Value) -> Result<Vec<String>, Error> {
    if result == Value::Bool(false) {
        return Ok(Vec::new());
    }
    let (_meta, entries): (Value, Vec<String>) = serde_json::from_value(result)
        .map_err(|e| Error::EngineProtocol(format!("unexpected bibliography ({})", e)))?;
    Ok(entries)
}
