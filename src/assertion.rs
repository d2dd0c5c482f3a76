//! Assertion data model and the query-parameter specifier codec.
//!
//! An assertion rides on a specifier as a single `assert` query parameter
//! whose value is a JSON object, with a `.js` tail appended to the path so
//! downstream tooling treats the module as JavaScript:
//!
//! `/src/data.json` + `{"type":"json"}` becomes
//! `/src/data.json.js?assert=%7B%22type%22%3A%22json%22%7D`
//!
//! Decoding requires and strips exactly one `.js` tail, so the encoding
//! round-trips losslessly. Unknown query parameters survive both ways;
//! `assert` is always re-appended last.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::utils::normalize;

// ---------------------------------------------------------------------------
// Assertion Kinds
// ---------------------------------------------------------------------------

/// The closed set of assertion type tags the loader understands.
///
/// `arraybuffer` and `js` are accepted as aliases of `buffer` and
/// `javascript`; `raw` and `text` are distinct spellings with identical
/// loader behavior. Anything else is carried as `Unsupported` and turned
/// into a typed error at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssertionKind {
    Buffer,
    Json,
    Raw,
    Text,
    Url,
    Javascript,
    Unsupported(String),
}

impl AssertionKind {
    /// Parse a type tag. Matching is case-sensitive.
    pub fn parse(tag: &str) -> Self {
        match tag {
            "buffer" | "arraybuffer" => Self::Buffer,
            "json" => Self::Json,
            "raw" => Self::Raw,
            "text" => Self::Text,
            "url" => Self::Url,
            "javascript" | "js" => Self::Javascript,
            other => Self::Unsupported(other.to_string()),
        }
    }

    /// Canonical tag name.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Buffer => "buffer",
            Self::Json => "json",
            Self::Raw => "raw",
            Self::Text => "text",
            Self::Url => "url",
            Self::Javascript => "javascript",
            Self::Unsupported(tag) => tag,
        }
    }
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

/// An import assertion: ordered string-key to string-value entries as they
/// appeared in source. Entry order is preserved through JSON both ways.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Assertion {
    entries: Vec<(String, String)>,
}

impl Assertion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from parsed entries. Callers are responsible for having
    /// rejected duplicate keys.
    pub fn from_entries(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }

    /// Convenience constructor for the common single-entry case.
    pub fn of_type(tag: &str) -> Self {
        Self::from_entries(vec![("type".to_string(), tag.to_string())])
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The raw `type` entry, if present.
    pub fn type_tag(&self) -> Option<&str> {
        self.get("type")
    }

    /// The dispatch kind. A missing `type` entry maps to
    /// `Unsupported("")` so the loader reports it like any unknown tag.
    pub fn kind(&self) -> AssertionKind {
        match self.type_tag() {
            Some(tag) => AssertionKind::parse(tag),
            None => AssertionKind::Unsupported(String::new()),
        }
    }

    /// Serialize to a JSON object, preserving entry order.
    pub fn to_json(&self) -> String {
        let mut map = serde_json::Map::with_capacity(self.entries.len());
        for (key, value) in &self.entries {
            map.insert(key.clone(), serde_json::Value::String(value.clone()));
        }
        serde_json::Value::Object(map).to_string()
    }

    /// Parse a JSON payload back into an assertion.
    ///
    /// Returns `None` unless the payload is an object whose values are all
    /// strings; callers treat that as "no assertion present" rather than
    /// an error, so a mangled query parameter degrades to a pass-through.
    pub fn from_json(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).ok()?;
        let object = value.as_object()?;
        let mut entries = Vec::with_capacity(object.len());
        for (key, value) in object {
            entries.push((key.clone(), value.as_str()?.to_string()));
        }
        Some(Self { entries })
    }
}

// ---------------------------------------------------------------------------
// Query Parameter Codec
// ---------------------------------------------------------------------------

/// Characters escaped in query components. Everything outside
/// alphanumerics and `-._*` is percent-encoded; `+` decodes as a space.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'*');

fn escape_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

fn unescape_component(s: &str) -> String {
    let plus_decoded = s.replace('+', " ");
    percent_decode_str(&plus_decoded).decode_utf8_lossy().into_owned()
}

/// Parse a raw query string into ordered key/value pairs.
pub fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for piece in query.split('&') {
        if piece.is_empty() {
            continue;
        }
        let (key, value) = piece.split_once('=').unwrap_or((piece, ""));
        pairs.push((unescape_component(key), unescape_component(value)));
    }
    pairs
}

/// Serialize key/value pairs back into a query string.
pub fn serialize_query(pairs: &[(String, String)]) -> String {
    let rendered: Vec<String> = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", escape_component(key), escape_component(value)))
        .collect();
    rendered.join("&")
}

// ---------------------------------------------------------------------------
// Specifier Split / Encode
// ---------------------------------------------------------------------------

/// Split a specifier at its first `?` into a normalized path and parsed
/// query pairs. A specifier without a query yields an empty pair list.
pub fn split_query(id: &str) -> (String, Vec<(String, String)>) {
    match id.split_once('?') {
        Some((base, query)) => (normalize(base), parse_query(query)),
        None => (normalize(id), Vec::new()),
    }
}

/// Decode an assertion-carrying specifier.
///
/// Requires an `assert` query parameter holding a JSON object of string
/// values and a path ending in the `.js` tail. On success returns the
/// restored path (with any remaining query parameters re-attached) and
/// the assertion. Anything else returns `None` and the specifier passes
/// through untouched.
pub fn split_assertion(id: &str) -> Option<(String, Assertion)> {
    let (base, mut params) = split_query(id);
    let index = params.iter().position(|(key, _)| key == "assert")?;
    let (_, raw) = params.remove(index);
    if raw.is_empty() {
        return None;
    }
    let assertion = Assertion::from_json(&raw)?;
    let path = base.strip_suffix(".js")?;
    let mut safe = normalize(path);
    if !params.is_empty() {
        safe.push('?');
        safe.push_str(&serialize_query(&params));
    }
    Some((safe, assertion))
}

/// Encode a path plus assertion into the wire form: the `.js` tail is
/// appended to the path and `assert` becomes the last query parameter.
/// Any pre-existing `assert` pair in `params` is dropped first.
pub fn encode_specifier(path: &str, params: &[(String, String)], assertion: &Assertion) -> String {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .filter(|(key, _)| key != "assert")
        .cloned()
        .collect();
    pairs.push(("assert".to_string(), assertion.to_json()));
    format!("{path}.js?{}", serialize_query(&pairs))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
