//! The Pandoc JSON document tree.
//!
//! Only two kinds of Pandoc elements matter to the filter: `Cite` inlines,
//! which get replaced, and `Header` blocks, which mark where the bibliography
//! goes. Everything else is kept as a generic object, array, or leaf so that
//! it round-trips untouched (object keys keep their order).
//!
//! [`Node::for_each_cite`] and [`Node::try_map_cites`] are the only two
//! traversals of the tree. They visit `Cite` nodes in exactly the same order:
//! depth-first, left to right, object values in key order.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use slog::{debug, trace};

/// A whole Pandoc document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub meta: Meta,
    pub blocks: Vec<Node>,
    /// The top-level object. `meta` and `blocks` are kept here as
    /// placeholders so the output keeps the input's key order.
    frame: Map<String, Value>,
}

impl Document {
    /// Deserialize a Pandoc JSON document.
    pub fn from_json(input: &str) -> Result<Document, Error> {
        debug!(slog_scope::logger(), "Deserializing the Pandoc JSON...");
        let mut frame: Map<String, Value> = serde_json::from_str(input).map_err(Error::Document)?;

        let meta = match frame.get_mut("meta").map(Value::take) {
            Some(m) => serde_json::from_value(m).map_err(Error::Document)?,
            None => Meta::default(),
        };

        let blocks = match frame.get_mut("blocks").map(Value::take) {
            Some(Value::Array(values)) => values
                .into_iter()
                .map(Node::try_from)
                .collect::<Result<Vec<Node>, Error>>()?,
            Some(_) => return Err(Error::Document(document_error("`blocks` is not an array"))),
            None => return Err(Error::Document(document_error("missing field `blocks`"))),
        };

        debug!(
            slog_scope::logger(),
            "Pandoc JSON deserialized ({} top-level blocks).",
            blocks.len()
        );
        Ok(Document {
            meta,
            blocks,
            frame,
        })
    }

    /// Serialize the document back into Pandoc JSON.
    pub fn to_json(self) -> Result<String, Error> {
        let mut frame = self.frame;
        frame.insert(
            "meta".to_string(),
            serde_json::to_value(self.meta).map_err(Error::Document)?,
        );
        frame.insert(
            "blocks".to_string(),
            Value::Array(self.blocks.into_iter().map(Value::from).collect()),
        );
        serde_json::to_string(&frame).map_err(Error::Document)
    }
}

fn document_error(msg: &str) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom(msg)
}

/// The document metadata, left as Pandoc `MetaValue`s.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(pub Map<String, Value>);

impl Meta {
    /// Read a metadata field as text.
    ///
    /// Works for `MetaString`, `MetaInlines`, and `MetaBlocks`. For a
    /// `MetaList`, the first element is read. A missing or empty field is an
    /// error.
    pub fn text(&self, field: &'static str) -> Result<String, Error> {
        let value = match self.0.get(field) {
            Some(v) => v,
            None => return Err(Error::MissingMetadata(field)),
        };
        let text = meta_text(&Node::try_from(value.clone())?);
        trace!(slog_scope::logger(), "Metadata field {}: {:?}", field, text);

        if text.is_empty() {
            Err(Error::MissingMetadata(field))
        } else {
            Ok(text)
        }
    }

    /// Every citation id of every `Cite` inside a metadata field, in order.
    /// A missing field has none.
    pub fn citation_ids(&self, field: &str) -> Result<Vec<String>, Error> {
        let mut ids = Vec::new();
        if let Some(value) = self.0.get(field) {
            Node::try_from(value.clone())?.for_each_cite(&mut |cite| {
                ids.extend(cite.citations.iter().map(|c| c.citation_id.clone()))
            });
        }
        Ok(ids)
    }
}

fn meta_text(node: &Node) -> String {
    match (node.tag(), node.content()) {
        (Some("MetaList"), Some(Node::Array(items))) => {
            items.first().map(meta_text).unwrap_or_default()
        }
        _ => node.plain_text(),
    }
}

/// A node of the document tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Cite(Cite),
    Header(Header),
    /// Any other JSON object, with its keys in document order.
    Object(Vec<(String, Node)>),
    Array(Vec<Node>),
    /// Strings, numbers, booleans, and null.
    Leaf(Value),
}

/// A `Cite` inline.
#[derive(Debug, Clone, PartialEq)]
pub struct Cite {
    pub citations: Vec<Citation>,
    /// The node as it was read, used if the node is written back unchanged.
    raw: Value,
}

/// One citation inside a `Cite` inline. The rest of the Pandoc citation
/// fields are not needed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citation {
    pub citation_id: String,
    #[serde(default)]
    pub citation_suffix: Vec<Value>,
}

/// A `Header` block.
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub level: Value,
    pub attr: Value,
    pub inlines: Vec<Node>,
}

impl Header {
    /// The heading's title as plain text.
    pub fn title(&self) -> String {
        let mut title = String::new();
        for inline in &self.inlines {
            inline.push_text(&mut title);
        }
        title
    }
}

impl Cite {
    fn from_raw(raw: Value) -> Result<Cite, Error> {
        let list = match raw.get("c").and_then(|c| c.get(0)) {
            Some(list @ Value::Array(_)) => list.clone(),
            _ => {
                return Err(Error::MalformedCitation(
                    "Cite node without a citation list".to_string(),
                ))
            }
        };
        let citations: Vec<Citation> =
            serde_json::from_value(list).map_err(|e| Error::MalformedCitation(e.to_string()))?;

        Ok(Cite { citations, raw })
    }
}

impl Node {
    /// A `RawInline` in the given format.
    pub fn raw_inline(format: &str, text: String) -> Node {
        Node::Object(vec![
            ("t".to_string(), Node::Leaf(Value::from("RawInline"))),
            ("c".to_string(), Node::Leaf(json!([format, text]))),
        ])
    }

    /// A `Para` block.
    pub fn para(inlines: Vec<Node>) -> Node {
        Node::Object(vec![
            ("t".to_string(), Node::Leaf(Value::from("Para"))),
            ("c".to_string(), Node::Array(inlines)),
        ])
    }

    /// The Pandoc element type (the `t` field), if the node is an element.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Node::Cite(_) => Some("Cite"),
            Node::Header(_) => Some("Header"),
            Node::Object(fields) => match field(fields, "t") {
                Some(Node::Leaf(Value::String(t))) => Some(t),
                _ => None,
            },
            Node::Array(_) | Node::Leaf(_) => None,
        }
    }

    /// The contents (the `c` field) of a generic element.
    pub fn content(&self) -> Option<&Node> {
        match self {
            Node::Object(fields) => field(fields, "c"),
            _ => None,
        }
    }

    /// The text of the node's `Str`s, with spaces and breaks as single spaces.
    pub fn plain_text(&self) -> String {
        let mut text = String::new();
        self.push_text(&mut text);
        text
    }

    fn push_text(&self, out: &mut String) {
        match self {
            Node::Object(_) => match (self.tag(), self.content()) {
                (Some("Str" | "MetaString"), Some(Node::Leaf(Value::String(s)))) => {
                    out.push_str(s)
                }
                (Some("Space" | "SoftBreak" | "LineBreak"), _) => out.push(' '),
                (_, Some(c)) => c.push_text(out),
                _ => {}
            },
            Node::Array(nodes) => nodes.iter().for_each(|n| n.push_text(out)),
            Node::Header(header) => header.inlines.iter().for_each(|n| n.push_text(out)),
            Node::Cite(_) | Node::Leaf(_) => {}
        }
    }

    /// Visit every `Cite` under this node in document order.
    pub fn for_each_cite<'a, F: FnMut(&'a Cite)>(&'a self, visit: &mut F) {
        match self {
            Node::Cite(cite) => visit(cite),
            Node::Header(header) => header.inlines.iter().for_each(|n| n.for_each_cite(visit)),
            Node::Object(fields) => fields.iter().for_each(|(_, n)| n.for_each_cite(visit)),
            Node::Array(nodes) => nodes.iter().for_each(|n| n.for_each_cite(visit)),
            Node::Leaf(_) => {}
        }
    }

    /// Rebuild this node, replacing every `Cite` in document order.
    ///
    /// Visits `Cite`s in the same order as [`Node::for_each_cite`].
    pub fn try_map_cites<F>(self, replace: &mut F) -> Result<Node, Error>
    where
        F: FnMut(Cite) -> Result<Node, Error>,
    {
        Ok(match self {
            Node::Cite(cite) => replace(cite)?,
            Node::Header(mut header) => {
                header.inlines = header
                    .inlines
                    .into_iter()
                    .map(|n| n.try_map_cites(replace))
                    .collect::<Result<Vec<Node>, Error>>()?;
                Node::Header(header)
            }
            Node::Object(fields) => Node::Object(
                fields
                    .into_iter()
                    .map(|(k, n)| Ok((k, n.try_map_cites(replace)?)))
                    .collect::<Result<Vec<(String, Node)>, Error>>()?,
            ),
            Node::Array(nodes) => Node::Array(
                nodes
                    .into_iter()
                    .map(|n| n.try_map_cites(replace))
                    .collect::<Result<Vec<Node>, Error>>()?,
            ),
            leaf @ Node::Leaf(_) => leaf,
        })
    }
}

fn field<'a>(fields: &'a [(String, Node)], key: &str) -> Option<&'a Node> {
    fields.iter().find(|(k, _)| k == key).map(|(_, n)| n)
}

impl TryFrom<Value> for Node {
    type Error = Error;

    fn try_from(value: Value) -> Result<Node, Error> {
        match value {
            Value::Object(map) => match map.get("t").and_then(Value::as_str) {
                Some("Cite") => Ok(Node::Cite(Cite::from_raw(Value::Object(map))?)),
                Some("Header") => header(map),
                _ => object(map),
            },
            Value::Array(values) => Ok(Node::Array(
                values
                    .into_iter()
                    .map(Node::try_from)
                    .collect::<Result<Vec<Node>, Error>>()?,
            )),
            leaf => Ok(Node::Leaf(leaf)),
        }
    }
}

fn header(map: Map<String, Value>) -> Result<Node, Error> {
    if let Some(Value::Array(c)) = map.get("c") {
        if let [level, attr, Value::Array(inlines)] = c.as_slice() {
            return Ok(Node::Header(Header {
                level: level.clone(),
                attr: attr.clone(),
                inlines: inlines
                    .iter()
                    .cloned()
                    .map(Node::try_from)
                    .collect::<Result<Vec<Node>, Error>>()?,
            }));
        }
    }
    // Not shaped like a Pandoc header; keep it as is.
    object(map)
}

fn object(map: Map<String, Value>) -> Result<Node, Error> {
    Ok(Node::Object(
        map.into_iter()
            .map(|(k, v)| Ok((k, Node::try_from(v)?)))
            .collect::<Result<Vec<(String, Node)>, Error>>()?,
    ))
}

impl From<Node> for Value {
    fn from(node: Node) -> Value {
        match node {
            Node::Cite(cite) => cite.raw,
            Node::Header(header) => json!({
                "t": "Header",
                "c": [
                    header.level,
                    header.attr,
                    Value::Array(header.inlines.into_iter().map(Value::from).collect())
                ]
            }),
            Node::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, n)| (k, Value::from(n)))
                    .collect(),
            ),
            Node::Array(nodes) => Value::Array(nodes.into_iter().map(Value::from).collect()),
            Node::Leaf(leaf) => leaf,
        }
    }
}
