//! Structural parsing of the `_OC_contentInfo` array literal embedded in a
//! Google Play Books page.
//!
//! Only arrays and string literals matter for chapter extraction. Anything
//! else (numbers, `null`, object literals) is kept as raw text so positions
//! inside arrays are preserved.

use regex::Regex;

use crate::error::{Result, TimestamperError};

pub const CONTENT_INFO_MARKER: &str = r"_OC_contentInfo\s*=\s*";

#[derive(Clone, Debug, PartialEq)]
pub enum ScriptNode {
    Array(Vec<ScriptNode>),
    /// Raw lexeme, quotes included.
    StringLiteral(String),
    Other(String),
}

impl ScriptNode {
    pub fn children(&self) -> &[ScriptNode] {
        match self {
            ScriptNode::Array(children) => children,
            _ => &[],
        }
    }

    fn child(&self, index: usize) -> Option<&ScriptNode> {
        self.children().get(index)
    }

    /// Text value of a leaf: string literals lose one layer of quoting,
    /// other scalars are returned as written.
    pub fn leaf_text(&self) -> String {
        match self {
            ScriptNode::StringLiteral(raw) => unquote(raw),
            ScriptNode::Other(raw) => raw.clone(),
            ScriptNode::Array(_) => String::new(),
        }
    }
}

/// Finds the content-info marker in `page` and parses the literal after it.
pub fn extract_content_info(page: &str) -> Result<ScriptNode> {
    let marker = Regex::new(CONTENT_INFO_MARKER).map_err(|e| TimestamperError::ScriptSyntax {
        offset: 0,
        message: e.to_string(),
    })?;
    let found = marker
        .find(page)
        .ok_or(TimestamperError::NoChaptersExtracted)?;

    log::debug!("Found content info marker at offset {}", found.start());
    let root = parse_script(&page[found.end()..])?;
    match root {
        ScriptNode::Array(_) => Ok(root),
        other => Err(TimestamperError::ScriptSyntax {
            offset: found.end(),
            message: format!("expected an array literal, found {other:?}"),
        }),
    }
}

/// Parses a single literal at the start of `source`, trailing text is ignored.
pub fn parse_script(source: &str) -> Result<ScriptNode> {
    let mut parser = Parser {
        source,
        pos: 0,
        depth: 0,
    };
    parser.parse_value()
}

/// The list of chapter arrays sits at `root[0][0]`. All knowledge of the
/// payload layout is kept here.
pub fn chapter_nodes(root: &ScriptNode) -> Option<&[ScriptNode]> {
    let list = root.child(0)?.child(0)?;
    match list {
        ScriptNode::Array(children) => Some(children),
        _ => None,
    }
}

/// Deepest array nesting accepted, the real payload needs four levels.
pub const MAX_NESTING: usize = 64;

struct Parser<'a> {
    source: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.source.as_bytes().get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> TimestamperError {
        TimestamperError::ScriptSyntax {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn parse_value(&mut self) -> Result<ScriptNode> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'[') => self.parse_array(),
            Some(quote @ (b'"' | b'\'')) => {
                let start = self.pos;
                self.skip_string(quote)?;
                Ok(ScriptNode::StringLiteral(
                    self.source[start..self.pos].to_owned(),
                ))
            }
            Some(b'{') => {
                let start = self.pos;
                self.skip_object()?;
                Ok(ScriptNode::Other(self.source[start..self.pos].to_owned()))
            }
            Some(_) => self.parse_scalar(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_array(&mut self) -> Result<ScriptNode> {
        if self.depth == MAX_NESTING {
            return Err(self.error(format!("arrays nested deeper than {MAX_NESTING}")));
        }
        self.depth += 1;
        let array = self.parse_array_items();
        self.depth -= 1;
        array
    }

    fn parse_array_items(&mut self) -> Result<ScriptNode> {
        // consume '['
        self.pos += 1;
        let mut children = Vec::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    return Ok(ScriptNode::Array(children));
                }
                // elision, e.g. `[1,,2]`
                Some(b',') => {
                    self.pos += 1;
                    children.push(ScriptNode::Other(String::new()));
                    continue;
                }
                None => return Err(self.error("unterminated array")),
                _ => {}
            }

            children.push(self.parse_value()?);

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {}
                Some(other) => {
                    return Err(self.error(format!(
                        "expected ',' or ']', found '{}'",
                        other as char
                    )));
                }
                None => return Err(self.error("unterminated array")),
            }
        }
    }

    fn skip_string(&mut self, quote: u8) -> Result<()> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'\\' {
                self.pos += 1;
            } else if b == quote {
                return Ok(());
            }
        }
        self.pos = start;
        Err(self.error("unterminated string literal"))
    }

    fn skip_object(&mut self) -> Result<()> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(b) = self.peek() {
            match b {
                b'"' | b'\'' => {
                    self.skip_string(b)?;
                    continue;
                }
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        self.pos = start;
        Err(self.error("unterminated object literal"))
    }

    fn parse_scalar(&mut self) -> Result<ScriptNode> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b',' | b']' | b'}' | b';') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("expected a value"));
        }
        Ok(ScriptNode::Other(self.source[start..self.pos].to_owned()))
    }
}

/// Strips one layer of quotes from a string lexeme and resolves escapes.
/// Text without surrounding quotes is returned unchanged.
pub fn unquote(raw: &str) -> String {
    let inner = ['"', '\'']
        .iter()
        .find_map(|q| raw.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)));
    let Some(inner) = inner else {
        return raw.to_owned();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                push_code_unit(&mut out, &hex, 'x');
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16) {
                    Ok(high @ 0xD800..=0xDBFF) => {
                        let mut lookahead = chars.clone();
                        let low = if lookahead.next() == Some('\\') && lookahead.next() == Some('u')
                        {
                            let low_hex: String = lookahead.by_ref().take(4).collect();
                            u32::from_str_radix(&low_hex, 16)
                                .ok()
                                .filter(|low| (0xDC00..=0xDFFF).contains(low))
                        } else {
                            None
                        };
                        match low.and_then(|low| {
                            char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
                        }) {
                            Some(combined) => {
                                out.push(combined);
                                chars = lookahead;
                            }
                            None => out.push(char::REPLACEMENT_CHARACTER),
                        }
                    }
                    _ => push_code_unit(&mut out, &hex, 'u'),
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn push_code_unit(out: &mut String, hex: &str, kind: char) {
    match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => {
            out.push('\\');
            out.push(kind);
            out.push_str(hex);
        }
    }
}
