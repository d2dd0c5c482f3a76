//! Minimal JavaScript lexer backing the assertion syntax pass.
//!
//! This is not a full ECMAScript tokenizer. It produces just enough
//! structure to recognize static `import`/`export` declarations and their
//! trailing assertion clauses while skipping everything else safely:
//! strings (with escape decoding, since import specifiers live in them),
//! template literals with nested interpolations, comments, and regex
//! literals via the usual previous-token heuristic. Multi-character
//! operators are emitted as single-character punctuation; the statement
//! scan never needs them grouped.
//!
//! Known limit: a regex literal inside a template interpolation is
//! scanned as plain text, so one containing an unbalanced quote or brace
//! can desync the scan. Callers treat lex failures as "leave the source
//! alone", never as fatal.

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier or keyword; the text is `source[start..end]`.
    Ident,
    /// String literal with its decoded value.
    Str { value: String },
    /// Template literal, interpolations included.
    Template,
    /// Numeric literal, loosely scanned.
    Number,
    /// Regex literal, flags included.
    Regex,
    /// Single punctuation character.
    Punct(char),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
    /// 1-based line of the token start.
    pub line: u32,
    /// 0-based byte column of the token start.
    pub column: u32,
}

/// A lexical dead end: unterminated string/template/comment or a bad
/// escape. The position points at the construct that failed.
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub offset: usize,
    pub line: u32,
    pub column: u32,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

/// Tokenize an entire source text.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }
    Ok(tokens)
}

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    line_start: usize,
    /// Whether a `/` at the current position starts a regex literal.
    regex_allowed: bool,
}

/// Identifiers after which a `/` still starts a regex literal.
const REGEX_PRECEDING_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "case", "do", "else",
    "yield", "await", "throw",
];

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
            regex_allowed: true,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_trivia()?;
        let start = self.pos;
        let line = self.line;
        let column = (start - self.line_start) as u32;
        let Some(ch) = self.peek_char() else {
            return Ok(None);
        };

        let kind = match ch {
            '"' | '\'' => {
                let value = self.lex_string(ch)?;
                self.regex_allowed = false;
                TokenKind::Str { value }
            }
            '`' => {
                self.skip_template()?;
                self.regex_allowed = false;
                TokenKind::Template
            }
            '/' => {
                if self.regex_allowed {
                    self.lex_regex()?;
                    self.regex_allowed = false;
                    TokenKind::Regex
                } else {
                    self.pos += 1;
                    self.regex_allowed = true;
                    TokenKind::Punct('/')
                }
            }
            c if c.is_ascii_digit() || (c == '.' && self.peek_digit_at(1)) => {
                self.lex_number();
                self.regex_allowed = false;
                TokenKind::Number
            }
            c if is_ident_start(c) => {
                self.lex_ident();
                let text = &self.source[start..self.pos];
                self.regex_allowed = REGEX_PRECEDING_KEYWORDS.contains(&text);
                TokenKind::Ident
            }
            c => {
                self.pos += c.len_utf8();
                self.regex_allowed = !matches!(c, ')' | ']');
                TokenKind::Punct(c)
            }
        };

        Ok(Some(Token {
            kind,
            start,
            end: self.pos,
            line,
            column,
        }))
    }

    // -- character helpers ---------------------------------------------------

    fn peek_char(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_byte_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos + ahead).copied()
    }

    fn peek_digit_at(&self, ahead: usize) -> bool {
        self.peek_byte_at(ahead).is_some_and(|b| b.is_ascii_digit())
    }

    fn bump_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(ch)
    }

    fn error_at(&self, offset: usize, message: &str) -> LexError {
        LexError {
            message: message.to_string(),
            offset,
            line: self.line,
            column: (self.pos.max(self.line_start) - self.line_start) as u32,
        }
    }

    // -- trivia --------------------------------------------------------------

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.bump_char();
                }
                Some('/') if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump_char();
                    }
                }
                Some('/') if self.peek_byte_at(1) == Some(b'*') => {
                    let start = self.pos;
                    self.pos += 2;
                    loop {
                        match self.peek_char() {
                            Some('*') if self.peek_byte_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => {
                                self.bump_char();
                            }
                            None => return Err(self.error_at(start, "unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    // -- literals ------------------------------------------------------------

    fn lex_ident(&mut self) {
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn lex_number(&mut self) {
        let mut prev = b'\0';
        while let Some(b) = self.peek_byte_at(0) {
            let take = b.is_ascii_alphanumeric()
                || b == b'.'
                || b == b'_'
                || ((b == b'+' || b == b'-') && matches!(prev, b'e' | b'E'));
            if !take {
                break;
            }
            prev = b;
            self.pos += 1;
        }
    }

    fn lex_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.error_at(start, "unterminated string literal"));
            };
            match ch {
                c if c == quote => {
                    self.pos += 1;
                    return Ok(value);
                }
                '\n' | '\r' => {
                    return Err(self.error_at(start, "unterminated string literal"));
                }
                '\\' => {
                    self.pos += 1;
                    self.lex_escape(start, &mut value)?;
                }
                c => {
                    value.push(c);
                    self.pos += c.len_utf8();
                }
            }
        }
    }

    fn lex_escape(&mut self, start: usize, value: &mut String) -> Result<(), LexError> {
        let Some(ch) = self.peek_char() else {
            return Err(self.error_at(start, "unterminated string literal"));
        };
        match ch {
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            'b' => value.push('\u{8}'),
            'f' => value.push('\u{c}'),
            'v' => value.push('\u{b}'),
            '0' if !self.peek_digit_at(1) => value.push('\0'),
            '\n' | '\r' => {
                // Line continuation contributes nothing.
                self.bump_char();
                if ch == '\r' && self.peek_char() == Some('\n') {
                    self.bump_char();
                }
                return Ok(());
            }
            'x' => {
                self.pos += 1;
                let code = self.lex_hex_digits(start, 2)?;
                value.push(char_from_code(code).ok_or_else(|| {
                    self.error_at(start, "invalid character escape")
                })?);
                return Ok(());
            }
            'u' => {
                self.pos += 1;
                let code = if self.peek_char() == Some('{') {
                    self.pos += 1;
                    let code = self.lex_hex_until_brace(start)?;
                    self.pos += 1;
                    code
                } else {
                    self.lex_hex_digits(start, 4)?
                };
                value.push(char_from_code(code).ok_or_else(|| {
                    self.error_at(start, "invalid Unicode escape")
                })?);
                return Ok(());
            }
            c => value.push(c),
        }
        self.pos += ch.len_utf8();
        Ok(())
    }

    fn lex_hex_digits(&mut self, start: usize, count: usize) -> Result<u32, LexError> {
        let mut code = 0u32;
        for _ in 0..count {
            let digit = self
                .peek_char()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error_at(start, "invalid hexadecimal escape"))?;
            code = code * 16 + digit;
            self.pos += 1;
        }
        Ok(code)
    }

    fn lex_hex_until_brace(&mut self, start: usize) -> Result<u32, LexError> {
        let mut code = 0u32;
        let mut any = false;
        while let Some(c) = self.peek_char() {
            if c == '}' {
                if !any {
                    break;
                }
                return Ok(code);
            }
            let Some(digit) = c.to_digit(16) else {
                break;
            };
            code = code.saturating_mul(16).saturating_add(digit);
            any = true;
            self.pos += 1;
        }
        Err(self.error_at(start, "invalid Unicode escape"))
    }

    fn lex_regex(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        let mut in_class = false;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.error_at(start, "unterminated regular expression"));
            };
            match ch {
                '\\' => {
                    self.pos += 1;
                    if self.bump_char().is_none() {
                        return Err(self.error_at(start, "unterminated regular expression"));
                    }
                }
                '[' => {
                    in_class = true;
                    self.pos += 1;
                }
                ']' => {
                    in_class = false;
                    self.pos += 1;
                }
                '/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                '\n' => {
                    return Err(self.error_at(start, "unterminated regular expression"));
                }
                c => {
                    self.pos += c.len_utf8();
                }
            }
        }
        // Flags.
        while let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        Ok(())
    }

    // -- templates -----------------------------------------------------------

    fn skip_template(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        self.pos += 1;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.error_at(start, "unterminated template literal"));
            };
            match ch {
                '`' => {
                    self.pos += 1;
                    return Ok(());
                }
                '\\' => {
                    self.pos += 1;
                    if self.bump_char().is_none() {
                        return Err(self.error_at(start, "unterminated template literal"));
                    }
                }
                '$' if self.peek_byte_at(1) == Some(b'{') => {
                    self.pos += 2;
                    self.skip_interpolation(start)?;
                }
                _ => {
                    self.bump_char();
                }
            }
        }
    }

    fn skip_interpolation(&mut self, start: usize) -> Result<(), LexError> {
        let mut depth = 1usize;
        loop {
            let Some(ch) = self.peek_char() else {
                return Err(self.error_at(start, "unterminated template literal"));
            };
            match ch {
                '{' => {
                    depth += 1;
                    self.pos += 1;
                }
                '}' => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '"' | '\'' => {
                    self.lex_string(ch)?;
                }
                '`' => {
                    self.skip_template()?;
                }
                '/' if self.peek_byte_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.bump_char();
                    }
                }
                '/' if self.peek_byte_at(1) == Some(b'*') => {
                    self.pos += 2;
                    loop {
                        match self.peek_char() {
                            Some('*') if self.peek_byte_at(1) == Some(b'/') => {
                                self.pos += 2;
                                break;
                            }
                            Some(_) => {
                                self.bump_char();
                            }
                            None => return Err(self.error_at(start, "unterminated comment")),
                        }
                    }
                }
                _ => {
                    self.bump_char();
                }
            }
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_ascii_alphabetic() || (!c.is_ascii() && c.is_alphabetic())
}

fn is_ident_continue(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit() || (!c.is_ascii() && c.is_numeric())
}

fn char_from_code(code: u32) -> Option<char> {
    char::from_u32(code)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
