//! Utility functions for the plugin.
//!
//! - Specifier path normalization (posix form, URL-safe escapes)
//! - Reference resolution for static asset lookups
//! - Scripting-source detection
//! - JS string literal escaping (injection-safe)

use std::sync::LazyLock;

use regex::Regex;

// ---------------------------------------------------------------------------
// Path Normalization
// ---------------------------------------------------------------------------

/// Normalize a filesystem path into the posix form used for module IDs.
///
/// - Runs of backslashes become a single forward slash.
/// - Windows drive prefixes are rooted (`C:/x` becomes `/C:/x`).
/// - `%`, newline, carriage return, and tab are percent-escaped so the
///   result can be embedded in URL-shaped specifiers.
///
/// The `%` escape is one-way: a path that already contains `%` picks up
/// an extra `%25` on each pass. Module IDs in practice are percent-free.
pub fn normalize(path: &str) -> String {
    static BACKSLASH_RUN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\\+").expect("backslash pattern"));
    let mut out = BACKSLASH_RUN.replace_all(path, "/").into_owned();
    if has_drive_prefix(&out) {
        out.insert(0, '/');
    }
    out.replace('%', "%25")
        .replace('\n', "%0A")
        .replace('\r', "%0D")
        .replace('\t', "%09")
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes[2] == b'/'
}

/// Collapse `.` and `..` segments in an absolute posix path.
/// `..` never climbs above the root.
pub fn collapse_dot_segments(path: &str) -> String {
    let trailing_slash = path.ends_with('/') && path.len() > 1;
    let mut stack: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    let mut out = String::with_capacity(path.len());
    out.push('/');
    out.push_str(&stack.join("/"));
    if trailing_slash && out.len() > 1 {
        out.push('/');
    }
    out
}

/// Resolve a reference the way `new URL(reference, base)` would for
/// path-only URLs, returning the absolute posix path.
///
/// `base` must be an absolute path (the href of the referencing module).
/// Returns `None` for references that carry a scheme; those are not
/// filesystem assets.
pub fn resolve_reference(base: &str, reference: &str) -> Option<String> {
    if has_scheme(reference) {
        return None;
    }
    let reference = reference.split(['?', '#']).next().unwrap_or(reference);
    if reference.is_empty() {
        return None;
    }
    if let Some(rooted) = reference.strip_prefix('/') {
        return Some(collapse_dot_segments(&format!("/{rooted}")));
    }
    let dir = match base.rfind('/') {
        Some(idx) => &base[..idx + 1],
        None => "/",
    };
    Some(collapse_dot_segments(&format!("{dir}{reference}")))
}

fn has_scheme(reference: &str) -> bool {
    static SCHEME_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("scheme pattern"));
    SCHEME_RE.is_match(reference)
}

// ---------------------------------------------------------------------------
// Scripting Sources
// ---------------------------------------------------------------------------

/// Check whether a module ID names a scripting source: a `.nbx` component
/// or anything in the JS/TS family (including JSX/TSX and the `.cjs`/`.mjs`
/// variants). Only these receive the metadata header.
pub fn is_scripting_source(id: &str) -> bool {
    static SCRIPTING_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)\.(nbx|[cm]?[jt]sx?)$").expect("extension pattern"));
    SCRIPTING_RE.is_match(id)
}

// ---------------------------------------------------------------------------
// JS String Escaping
// ---------------------------------------------------------------------------

/// Render a string as a double-quoted JS string literal.
///
/// The output is also valid JSON, so every emitted literal goes through
/// this one function no matter which module body it lands in.
pub fn js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            // Legal in JSON but not in pre-ES2019 JS string literals.
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
