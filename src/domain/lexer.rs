//! Tokenizer for the trading-language dialect.
//!
//! Produces a flat token stream annotated with 1-based line/column
//! positions. Lexical problems (bad literals, unterminated strings,
//! overlong identifiers) are collected rather than thrown so one pass
//! reports them all; structurally the stream is always usable.

use chrono::{NaiveDate, NaiveDateTime};

use super::error::LexError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    Str,
    Operator,
    Punct,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is(&self, kind: TokenKind, text: &str) -> bool {
        self.kind == kind && self.text == text
    }
}

#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

const KEYWORDS: &[&str] = &[
    "void", "bool", "char", "uchar", "short", "ushort", "int", "uint", "long", "ulong", "float",
    "double", "color", "datetime", "string", "if", "else", "for", "while", "do", "switch", "case",
    "default", "break", "continue", "return", "new", "delete", "class", "struct", "enum", "input",
    "extern", "static", "const", "virtual", "override", "operator", "this", "true", "false",
];

// longest first so compound operators win over their prefixes
const OPERATORS: &[&str] = &[
    ">>=", "<<=", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=",
    "^=", "++", "--", "<<", ">>", "+", "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^", "~",
    "?", ".",
];

const PUNCT: &[char] = &['(', ')', '{', '}', '[', ']', ';', ',', ':'];

pub const MAX_IDENTIFIER_LEN: usize = 63;

pub fn is_type_keyword(s: &str) -> bool {
    matches!(
        s,
        "void"
            | "bool"
            | "char"
            | "uchar"
            | "short"
            | "ushort"
            | "int"
            | "uint"
            | "long"
            | "ulong"
            | "float"
            | "double"
            | "color"
            | "datetime"
            | "string"
    )
}

pub fn lex(source: &str) -> LexOutput {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    out: LexOutput,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            out: LexOutput::default(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, column: usize) {
        self.out.tokens.push(Token {
            kind,
            text,
            line,
            column,
        });
    }

    fn error(&mut self, message: impl Into<String>, line: usize, column: usize) {
        self.out.errors.push(LexError::new(message, line, column));
    }

    fn run(mut self) -> LexOutput {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            if c == '/' && self.peek_at(1) == Some('*') {
                self.block_comment();
                continue;
            }
            if c == '"' {
                self.string_literal();
                continue;
            }
            if c == '\'' {
                self.char_literal();
                continue;
            }
            // C'255,0,0' and D'2024.01.15 10:30' literal forms
            if (c == 'C' || c == 'D') && self.peek_at(1) == Some('\'') {
                if c == 'C' {
                    self.color_literal();
                } else {
                    self.datetime_literal();
                }
                continue;
            }
            if c.is_ascii_digit() || (c == '.' && self.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
            {
                self.number();
                continue;
            }
            if c.is_ascii_alphabetic() || c == '_' {
                self.word();
                continue;
            }
            if PUNCT.contains(&c) {
                let (line, column) = (self.line, self.column);
                self.advance();
                self.push(TokenKind::Punct, c.to_string(), line, column);
                continue;
            }
            if let Some(op) = self.match_operator() {
                let (line, column) = (self.line, self.column);
                for _ in 0..op.len() {
                    self.advance();
                }
                self.push(TokenKind::Operator, op.to_string(), line, column);
                continue;
            }
            let (line, column) = (self.line, self.column);
            self.advance();
            self.error(format!("unexpected character '{c}'"), line, column);
        }
        self.out
    }

    fn match_operator(&self) -> Option<&'static str> {
        OPERATORS.iter().copied().find(|op| {
            op.chars()
                .enumerate()
                .all(|(i, oc)| self.peek_at(i) == Some(oc))
        })
    }

    fn block_comment(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    return;
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    self.error("unterminated block comment", line, column);
                    return;
                }
            }
        }
    }

    fn string_literal(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    self.push(TokenKind::Str, text, line, column);
                    return;
                }
                Some('\\') => {
                    self.advance();
                    match self.escape_char() {
                        Ok(code) => {
                            if let Some(ch) = char::from_u32(code) {
                                text.push(ch);
                            }
                        }
                        Err(msg) => self.error(msg, line, column),
                    }
                }
                Some('\n') | None => {
                    self.error("unterminated string literal", line, column);
                    self.push(TokenKind::Str, text, line, column);
                    return;
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
    }

    /// Consume the body of an escape sequence (the `\` is already consumed)
    /// and return the code point.
    fn escape_char(&mut self) -> Result<u32, String> {
        let c = self.advance().ok_or("unterminated escape sequence")?;
        Ok(match c {
            'n' => 10,
            't' => 9,
            'r' => 13,
            '0' => 0,
            '\\' => 92,
            '\'' => 39,
            '"' => 34,
            'x' | 'X' => {
                let mut hex = String::new();
                while hex.len() < 4 && self.peek().is_some_and(|d| d.is_ascii_hexdigit()) {
                    hex.push(self.advance().unwrap_or('0'));
                }
                if hex.is_empty() {
                    return Err("invalid hex escape".into());
                }
                u32::from_str_radix(&hex, 16).map_err(|_| "invalid hex escape".to_string())?
            }
            d if d.is_ascii_digit() => {
                let mut dec = d.to_string();
                while dec.len() < 5 && self.peek().is_some_and(|d| d.is_ascii_digit()) {
                    dec.push(self.advance().unwrap_or('0'));
                }
                dec.parse::<u32>().map_err(|_| "invalid escape".to_string())?
            }
            other => other as u32,
        })
    }

    /// Character constant such as `'a'` or `'\n'`, emitted as its numeric
    /// code point.
    fn char_literal(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        let code = match self.peek() {
            Some('\\') => {
                self.advance();
                match self.escape_char() {
                    Ok(code) => code,
                    Err(msg) => {
                        self.error(msg, line, column);
                        0
                    }
                }
            }
            Some('\'') | None => {
                self.error("empty character constant", line, column);
                self.advance();
                self.push(TokenKind::Number, "0".into(), line, column);
                return;
            }
            Some(c) => {
                self.advance();
                c as u32
            }
        };
        if self.peek() == Some('\'') {
            self.advance();
        } else {
            self.error("unterminated character constant", line, column);
        }
        self.push(TokenKind::Number, code.to_string(), line, column);
    }

    /// `C'r,g,b'` color literal, emitted as `r + (g<<8) + (b<<16)`.
    fn color_literal(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        let mut body = String::new();
        while let Some(c) = self.peek() {
            if c == '\'' || c == '\n' {
                break;
            }
            body.push(c);
            self.advance();
        }
        if self.peek() == Some('\'') {
            self.advance();
        } else {
            self.error("unterminated color literal", line, column);
        }
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        let components: Option<Vec<u32>> = if parts.len() == 3 {
            parts
                .iter()
                .map(|p| p.parse::<u32>().ok().filter(|v| *v <= 255))
                .collect()
        } else {
            None
        };
        match components {
            Some(c) => {
                let value = c[0] + (c[1] << 8) + (c[2] << 16);
                self.push(TokenKind::Number, value.to_string(), line, column);
            }
            None => {
                self.error(format!("invalid color literal C'{body}'"), line, column);
                self.push(TokenKind::Number, "0".into(), line, column);
            }
        }
    }

    /// `D'YYYY.MM.DD hh:mm:ss'` datetime literal, emitted as Unix seconds.
    /// The time of day and the seconds field are both optional.
    fn datetime_literal(&mut self) {
        let (line, column) = (self.line, self.column);
        self.advance();
        self.advance();
        let mut body = String::new();
        while let Some(c) = self.peek() {
            if c == '\'' || c == '\n' {
                break;
            }
            body.push(c);
            self.advance();
        }
        if self.peek() == Some('\'') {
            self.advance();
        } else {
            self.error("unterminated datetime literal", line, column);
        }
        match parse_datetime_literal(body.trim()) {
            Some(seconds) => self.push(TokenKind::Number, seconds.to_string(), line, column),
            None => {
                self.error(format!("invalid datetime literal D'{body}'"), line, column);
                self.push(TokenKind::Number, "0".into(), line, column);
            }
        }
    }

    fn number(&mut self) {
        let (line, column) = (self.line, self.column);
        if self.peek() == Some('0')
            && self.peek_at(1).is_some_and(|c| c == 'x' || c == 'X')
        {
            self.advance();
            self.advance();
            let mut hex = String::new();
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                hex.push(self.advance().unwrap_or('0'));
            }
            match u64::from_str_radix(&hex, 16) {
                Ok(v) => self.push(TokenKind::Number, (v as i64).to_string(), line, column),
                Err(_) => {
                    self.error("invalid hex literal", line, column);
                    self.push(TokenKind::Number, "0".into(), line, column);
                }
            }
            return;
        }
        let mut text = String::new();
        let mut seen_dot = false;
        let mut seen_exp = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' if !seen_dot && !seen_exp => seen_dot = true,
                'e' | 'E' if !seen_exp => {
                    seen_exp = true;
                    text.push(c);
                    self.advance();
                    if self.peek() == Some('+') || self.peek() == Some('-') {
                        text.push(self.advance().unwrap_or('+'));
                    }
                    continue;
                }
                _ => break,
            }
            text.push(c);
            self.advance();
        }
        self.push(TokenKind::Number, text, line, column);
    }

    fn word(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if text.len() > MAX_IDENTIFIER_LEN {
            self.error(
                format!("identifier '{text}' exceeds {MAX_IDENTIFIER_LEN} characters"),
                line,
                column,
            );
        }
        let kind = if KEYWORDS.contains(&text.as_str()) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        self.push(kind, text, line, column);
    }
}

/// Shared with the `StringToTime` builtin, which accepts the same forms.
pub(crate) fn parse_datetime_literal(body: &str) -> Option<i64> {
    let (date_part, time_part) = match body.split_once(char::is_whitespace) {
        Some((d, t)) => (d, Some(t.trim())),
        None => (body, None),
    };
    let date = {
        let mut it = date_part.split('.');
        let y: i32 = it.next()?.parse().ok()?;
        let m: u32 = it.next()?.parse().ok()?;
        let d: u32 = it.next()?.parse().ok()?;
        if it.next().is_some() {
            return None;
        }
        NaiveDate::from_ymd_opt(y, m, d)?
    };
    let (h, mi, s) = match time_part {
        None | Some("") => (0, 0, 0),
        Some(t) => {
            let mut it = t.split(':');
            let h: u32 = it.next()?.parse().ok()?;
            let mi: u32 = it.next()?.parse().ok()?;
            let s: u32 = match it.next() {
                Some(sec) => sec.parse().ok()?,
                None => 0,
            };
            if it.next().is_some() {
                return None;
            }
            (h, mi, s)
        }
    };
    let dt: NaiveDateTime = date.and_hms_opt(h, mi, s)?;
    Some(dt.and_utc().timestamp())
}
