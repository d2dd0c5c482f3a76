//! Assertion syntax pass.
//!
//! Recognizes `assert { ... }` clauses trailing the source string of
//! static `import` and `export ... from` declarations:
//!
//! - `import data from "./data.json" assert { type: "json" }`
//! - `export { a } from "./b.json" assert { type: "json" }`
//! - `export * as ns from "./c.json" assert { type: "json" }`
//!
//! A recognized clause is parsed as string-key to string-literal-value
//! entries (duplicate keys and non-string values are fatal, with source
//! positions) and removed from the emitted text. For `import`
//! declarations the source specifier is additionally rewritten to carry
//! the assertion as an encoded query parameter, so it survives the
//! resolve phase as plain specifier text.
//!
//! Everything else passes through byte-identical. Dynamic `import()`
//! calls are never special-cased: an options object there is ordinary
//! syntax for the host to evaluate. `assert` used as an identifier or
//! object key is never shadowed because the pass only looks for it
//! directly after a declaration's source string. Sources that fail to
//! tokenize are left for the host's own parser to report.

use std::borrow::Cow;
use std::ops::Range;

use crate::assertion::{encode_specifier, parse_query, Assertion};
use crate::hooks::ParserExtension;
use crate::parser::lexer::{lex, Token, TokenKind};
use crate::utils::js_string;
use crate::ImportsError;

pub mod lexer;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// One recognized assertion clause.
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionSite {
    /// The source specifier as written (escapes decoded).
    pub specifier: String,
    pub assertion: Assertion,
    /// Position of the clause keyword, 1-based line / 0-based column.
    pub line: u32,
    pub column: u32,
    /// Imports get their specifier rewritten; export-from forms are
    /// validated only.
    pub rewritten: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RewriteOutcome {
    pub code: String,
    pub sites: Vec<AssertionSite>,
    /// True when any clause was recognized (the emitted text differs).
    pub changed: bool,
}

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

/// Scan a module source and lower every assertion clause.
pub fn rewrite_assertions(source: &str) -> Result<RewriteOutcome, ImportsError> {
    let Ok(tokens) = lex(source) else {
        // Not tokenizable by this pass; the host parser owns the error.
        return Ok(RewriteOutcome {
            code: source.to_string(),
            sites: Vec::new(),
            changed: false,
        });
    };

    let mut sites = Vec::new();
    let mut edits: Vec<(Range<usize>, String)> = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let is_member = i > 0 && tokens[i - 1].kind == TokenKind::Punct('.');
        let word = match &tokens[i].kind {
            TokenKind::Ident if !is_member => &source[tokens[i].start..tokens[i].end],
            _ => {
                i += 1;
                continue;
            }
        };
        let scan = match word {
            "import" => scan_import(source, &tokens, i)?,
            "export" => scan_export(source, &tokens, i)?,
            _ => None,
        };
        match scan {
            Some(decl) => {
                if let Some(clause) = decl.clause {
                    let assertion = Assertion::from_entries(clause.entries);
                    if decl.rewrite_source {
                        let (path, params) = match decl.specifier.split_once('?') {
                            Some((path, query)) => (path, parse_query(query)),
                            None => (decl.specifier.as_str(), Vec::new()),
                        };
                        let encoded = encode_specifier(path, &params, &assertion);
                        edits.push((decl.source_span.clone(), js_string(&encoded)));
                    }
                    // The clause itself never reaches the host parser.
                    edits.push((clause.span, String::new()));
                    sites.push(AssertionSite {
                        specifier: decl.specifier,
                        assertion,
                        line: clause.line,
                        column: clause.column,
                        rewritten: decl.rewrite_source,
                    });
                }
                i = decl.resume;
            }
            None => i += 1,
        }
    }

    if edits.is_empty() {
        return Ok(RewriteOutcome {
            code: source.to_string(),
            sites,
            changed: false,
        });
    }

    edits.sort_by_key(|(range, _)| range.start);
    let mut code = String::with_capacity(source.len() + 64);
    let mut cursor = 0;
    for (range, replacement) in edits {
        code.push_str(&source[cursor..range.start]);
        code.push_str(&replacement);
        cursor = range.end;
    }
    code.push_str(&source[cursor..]);

    Ok(RewriteOutcome {
        code,
        sites,
        changed: true,
    })
}

struct ScannedDecl {
    /// Decoded value of the declaration's source string.
    specifier: String,
    /// Byte range of the source string token, quotes included.
    source_span: Range<usize>,
    clause: Option<ScannedClause>,
    rewrite_source: bool,
    /// Token index at which the outer walk continues.
    resume: usize,
}

struct ScannedClause {
    entries: Vec<(String, String)>,
    /// Byte range covering `assert { ... }` in the source text.
    span: Range<usize>,
    line: u32,
    column: u32,
}

/// Scan a static import declaration starting at the `import` token.
/// Returns `None` for anything that is not one (dynamic `import(...)`,
/// `import.meta`, an object key), leaving the walk to continue normally.
fn scan_import(
    source: &str,
    tokens: &[Token],
    at: usize,
) -> Result<Option<ScannedDecl>, ImportsError> {
    let mut j = at + 1;
    match tokens.get(j).map(|t| &t.kind) {
        Some(TokenKind::Punct('(' | '.' | ':')) | None => return Ok(None),
        Some(TokenKind::Str { .. }) => {}
        _ => {
            // Import clause: bindings, namespace, named list, then `from`.
            loop {
                match tokens.get(j).map(|t| &t.kind) {
                    Some(TokenKind::Ident) => {
                        if &source[tokens[j].start..tokens[j].end] == "from"
                            && matches!(
                                tokens.get(j + 1).map(|t| &t.kind),
                                Some(TokenKind::Str { .. })
                            )
                        {
                            j += 1;
                            break;
                        }
                        j += 1;
                    }
                    Some(TokenKind::Punct(',' | '*')) => j += 1,
                    Some(TokenKind::Punct('{')) => {
                        j = skip_braces(tokens, j);
                    }
                    _ => return Ok(None),
                }
            }
        }
    }
    finish_declaration(source, tokens, j, true)
}

/// Scan an export declaration starting at the `export` token. Only the
/// re-export forms carry a source (and possibly a clause).
fn scan_export(
    source: &str,
    tokens: &[Token],
    at: usize,
) -> Result<Option<ScannedDecl>, ImportsError> {
    let mut j = at + 1;
    match tokens.get(j).map(|t| &t.kind) {
        Some(TokenKind::Punct('*')) => {
            j += 1;
            if matches!(tokens.get(j).map(|t| &t.kind), Some(TokenKind::Ident))
                && &source[tokens[j].start..tokens[j].end] == "as"
            {
                j += 1;
                match tokens.get(j).map(|t| &t.kind) {
                    Some(TokenKind::Ident | TokenKind::Str { .. }) => j += 1,
                    _ => return Ok(None),
                }
            }
        }
        Some(TokenKind::Punct('{')) => {
            j = skip_braces(tokens, j);
        }
        _ => return Ok(None),
    }
    let from = match tokens.get(j) {
        Some(token) if token.kind == TokenKind::Ident => &source[token.start..token.end],
        _ => return Ok(None),
    };
    if from != "from" {
        return Ok(None);
    }
    j += 1;
    if !matches!(tokens.get(j).map(|t| &t.kind), Some(TokenKind::Str { .. })) {
        return Ok(None);
    }
    finish_declaration(source, tokens, j, false)
}

/// Shared tail: `source_index` points at the declaration's source string;
/// parse a trailing assertion clause if one follows.
fn finish_declaration(
    source: &str,
    tokens: &[Token],
    source_index: usize,
    rewrite_source: bool,
) -> Result<Option<ScannedDecl>, ImportsError> {
    let source_token = &tokens[source_index];
    let TokenKind::Str { value } = &source_token.kind else {
        return Ok(None);
    };
    let specifier = value.clone();
    let source_span = source_token.start..source_token.end;
    let keyword = source_index + 1;
    let has_clause = matches!(tokens.get(keyword), Some(t) if t.kind == TokenKind::Ident
            && &source[t.start..t.end] == "assert")
        && matches!(
            tokens.get(keyword + 1).map(|t| &t.kind),
            Some(TokenKind::Punct('{'))
        );
    if !has_clause {
        return Ok(Some(ScannedDecl {
            specifier,
            source_span,
            clause: None,
            rewrite_source,
            resume: source_index + 1,
        }));
    }

    let (entries, end) = parse_assert_entries(source, tokens, keyword + 1)?;
    let clause = ScannedClause {
        entries,
        span: tokens[keyword].start..tokens[end - 1].end,
        line: tokens[keyword].line,
        column: tokens[keyword].column,
    };
    Ok(Some(ScannedDecl {
        specifier,
        source_span,
        clause: Some(clause),
        rewrite_source,
        resume: end,
    }))
}

/// Parse `{ key: "value", ... }` starting at the opening brace. Keys are
/// identifiers or string literals; values must be string literals;
/// duplicate keys are rejected. Returns the entries and the token index
/// one past the closing brace.
fn parse_assert_entries(
    source: &str,
    tokens: &[Token],
    open: usize,
) -> Result<(Vec<(String, String)>, usize), ImportsError> {
    let mut entries: Vec<(String, String)> = Vec::new();
    let mut i = open + 1;
    loop {
        let token = tokens
            .get(i)
            .ok_or_else(|| parse_error_at(&tokens[open], "unterminated assertion clause"))?;
        if token.kind == TokenKind::Punct('}') {
            return Ok((entries, i + 1));
        }

        let key = match &token.kind {
            TokenKind::Ident => source[token.start..token.end].to_string(),
            TokenKind::Str { value } => value.clone(),
            _ => return Err(parse_error_at(token, "expected assertion key")),
        };
        if entries.iter().any(|(existing, _)| *existing == key) {
            return Err(parse_error_at(
                token,
                &format!("duplicate assertion key \"{key}\""),
            ));
        }
        i += 1;

        let colon = tokens
            .get(i)
            .ok_or_else(|| parse_error_at(&tokens[open], "unterminated assertion clause"))?;
        if colon.kind != TokenKind::Punct(':') {
            return Err(parse_error_at(colon, "expected \":\" after assertion key"));
        }
        i += 1;

        let value_token = tokens
            .get(i)
            .ok_or_else(|| parse_error_at(&tokens[open], "unterminated assertion clause"))?;
        let TokenKind::Str { value } = &value_token.kind else {
            return Err(parse_error_at(
                value_token,
                "assertion values must be string literals",
            ));
        };
        entries.push((key, value.clone()));
        i += 1;

        let next = tokens
            .get(i)
            .ok_or_else(|| parse_error_at(&tokens[open], "unterminated assertion clause"))?;
        match next.kind {
            TokenKind::Punct(',') => i += 1,
            TokenKind::Punct('}') => return Ok((entries, i + 1)),
            _ => {
                return Err(parse_error_at(
                    next,
                    "expected \",\" or \"}\" in assertion clause",
                ))
            }
        }
    }
}

/// Skip a balanced brace group starting at `open` (an import/export
/// named list). Returns the index one past the matching close brace, or
/// the end of the stream for unbalanced input.
fn skip_braces(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while let Some(token) = tokens.get(i) {
        match token.kind {
            TokenKind::Punct('{') => depth += 1,
            TokenKind::Punct('}') => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

fn parse_error_at(token: &Token, message: &str) -> ImportsError {
    ImportsError::Parse {
        message: message.to_string(),
        line: token.line,
        column: token.column,
    }
}

// ---------------------------------------------------------------------------
// Host Parser Extension
// ---------------------------------------------------------------------------

/// The parser extension installed through the host's options hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssertionSyntax;

impl ParserExtension for AssertionSyntax {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("nimbus:assertion-syntax")
    }

    fn pre_parse(&self, code: &str, _id: &str) -> anyhow::Result<Option<String>> {
        let outcome = rewrite_assertions(code)?;
        Ok(outcome.changed.then_some(outcome.code))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
