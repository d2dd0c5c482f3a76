//! Positional source editing.
//!
//! `SourceEditor` collects a prepended header and right-biased inserts
//! at original byte offsets, then produces the rewritten text together
//! with a line-preserving source map. Inserts never consume original
//! text, so every original character keeps a mapping and downstream
//! tooling still lands on real locations.

use crate::sourcemap::{encode_mappings, Segment, SourceMap};

pub struct SourceEditor<'a> {
    source: &'a str,
    prepend: String,
    inserts: Vec<(usize, String)>,
}

impl<'a> SourceEditor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            prepend: String::new(),
            inserts: Vec::new(),
        }
    }

    /// Add text before the whole source. Repeated calls append after
    /// earlier prepends.
    pub fn prepend(&mut self, text: impl Into<String>) {
        self.prepend.push_str(&text.into());
    }

    /// Insert text at a byte offset of the original source, to the right
    /// of the boundary. Inserts at equal offsets keep call order. The
    /// offset must lie on a char boundary.
    pub fn append_right(&mut self, offset: usize, text: impl Into<String>) {
        debug_assert!(self.source.is_char_boundary(offset));
        self.inserts.push((offset.min(self.source.len()), text.into()));
    }

    pub fn is_edited(&self) -> bool {
        !self.prepend.is_empty() || !self.inserts.is_empty()
    }

    /// Produce the rewritten text and its source map. `source_name` is
    /// recorded as the map's single source; the original text rides
    /// along as `sourcesContent`.
    pub fn finish(self, source_name: &str) -> (String, SourceMap) {
        let mut inserts = self.inserts;
        inserts.sort_by_key(|(offset, _)| *offset);
        let mut inserts = inserts.into_iter().peekable();

        let mut emitter = Emitter::new(self.source.len() + self.prepend.len());
        emitter.push_text(&self.prepend);

        let mut line_start = 0;
        let mut source_line = 0u32;
        loop {
            let rest = &self.source[line_start..];
            let (content, terminator) = match rest.find('\n') {
                Some(at) => (&rest[..at], &rest[at..at + 1]),
                None => (rest, ""),
            };
            let content_end = line_start + content.len();

            let mut cursor = line_start;
            loop {
                match inserts.next_if(|(offset, _)| *offset <= content_end) {
                    Some((offset, text)) => {
                        emitter.push_source_run(
                            &self.source[cursor..offset],
                            source_line,
                            char_column(self.source, line_start, cursor),
                        );
                        emitter.push_text(&text);
                        cursor = offset;
                    }
                    None => {
                        emitter.push_source_run(
                            &self.source[cursor..content_end],
                            source_line,
                            char_column(self.source, line_start, cursor),
                        );
                        break;
                    }
                }
            }

            if terminator.is_empty() {
                break;
            }
            emitter.push_text(terminator);
            line_start = content_end + terminator.len();
            source_line += 1;
        }

        let mappings = encode_mappings(&emitter.mappings);
        let map = SourceMap::new(source_name, self.source, mappings);
        (emitter.out, map)
    }
}

fn char_column(source: &str, line_start: usize, offset: usize) -> u32 {
    source[line_start..offset].chars().count() as u32
}

/// Assembles generated text while tracking generated line/column and the
/// per-line mapping segments.
struct Emitter {
    out: String,
    mappings: Vec<Vec<Segment>>,
    generated_column: u32,
}

impl Emitter {
    fn new(capacity: usize) -> Self {
        Self {
            out: String::with_capacity(capacity + 64),
            mappings: vec![Vec::new()],
            generated_column: 0,
        }
    }

    /// Unmapped generated text (headers, injected statements, line
    /// terminators). Newlines open fresh mapping lines.
    fn push_text(&mut self, text: &str) {
        for piece in text.split_inclusive('\n') {
            self.out.push_str(piece);
            if piece.ends_with('\n') {
                self.mappings.push(Vec::new());
                self.generated_column = 0;
            } else {
                self.generated_column += piece.chars().count() as u32;
            }
        }
    }

    /// A run of original text, mapped back to its source position.
    /// Runs never contain newlines.
    fn push_source_run(&mut self, run: &str, source_line: u32, source_column: u32) {
        if run.is_empty() {
            return;
        }
        let segment = Segment {
            generated_column: self.generated_column,
            source_line,
            source_column,
        };
        if let Some(line) = self.mappings.last_mut() {
            line.push(segment);
        }
        self.out.push_str(run);
        self.generated_column += run.chars().count() as u32;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
