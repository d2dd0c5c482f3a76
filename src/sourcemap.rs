//! Source map (v3) model and the positional mapping encoder.
//!
//! The encoder is the narrow surface everything else goes through:
//! decoded per-line segments in, base64-VLQ `mappings` string out. Only
//! the four-field segment form is emitted (generated column, source
//! index, source line, source column) against a single source; the
//! plugin never maps names.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One decoded mapping segment. Lines and columns are 0-based; columns
/// are counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub generated_column: u32,
    pub source_line: u32,
    pub source_column: u32,
}

/// A v3 source map with inline source content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceMap {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    /// A single-source map carrying the original content inline.
    pub fn new(source: impl Into<String>, content: impl Into<String>, mappings: String) -> Self {
        Self {
            version: 3,
            file: None,
            sources: vec![source.into()],
            sources_content: Some(vec![content.into()]),
            names: Vec::new(),
            mappings,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

// ---------------------------------------------------------------------------
// Mapping Encoder
// ---------------------------------------------------------------------------

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Encode decoded segments (one `Vec` per generated line) into the
/// `mappings` string. Generated columns restart per line; source line
/// and column deltas run across the whole map, as the format requires.
pub fn encode_mappings(lines: &[Vec<Segment>]) -> String {
    let mut out = String::new();
    let mut prev_source_line = 0i64;
    let mut prev_source_column = 0i64;
    for (index, line) in lines.iter().enumerate() {
        if index > 0 {
            out.push(';');
        }
        let mut prev_generated_column = 0i64;
        for (nth, segment) in line.iter().enumerate() {
            if nth > 0 {
                out.push(',');
            }
            encode_vlq(&mut out, i64::from(segment.generated_column) - prev_generated_column);
            prev_generated_column = i64::from(segment.generated_column);
            // Source index: always the single source.
            encode_vlq(&mut out, 0);
            encode_vlq(&mut out, i64::from(segment.source_line) - prev_source_line);
            prev_source_line = i64::from(segment.source_line);
            encode_vlq(&mut out, i64::from(segment.source_column) - prev_source_column);
            prev_source_column = i64::from(segment.source_column);
        }
    }
    out
}

fn encode_vlq(out: &mut String, value: i64) {
    let mut num: u64 = if value < 0 {
        (((-value) as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };
    loop {
        let mut digit = (num & 0b1_1111) as usize;
        num >>= 5;
        if num > 0 {
            digit |= 0b10_0000;
        }
        out.push(BASE64[digit] as char);
        if num == 0 {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
