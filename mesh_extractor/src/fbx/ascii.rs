//! ASCII FBX decoding.
//!
//! ```text
//! ; comment
//! Name: value, "string", 1.5 {
//!     Child: *3 {
//!         a: 1,2,3
//!     }
//! }
//! ```

use super::{Document, Encoding, FormatError, Node, Property};
use std::fmt;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// A `Name:` node header.
    Key(String),
    Integer(i64),
    Float(f64),
    String(String),
    /// An unquoted value such as `T` or `Y`.
    Word(String),
    Comma,
    Star,
    Open,
    Close,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => write!(f, "`{key}:`"),
            Self::Integer(value) => write!(f, "`{value}`"),
            Self::Float(value) => write!(f, "`{value}`"),
            Self::String(value) => write!(f, "\"{value}\""),
            Self::Word(word) => write!(f, "`{word}`"),
            Self::Comma => f.write_str("','"),
            Self::Star => f.write_str("'*'"),
            Self::Open => f.write_str("'{'"),
            Self::Close => f.write_str("'}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Spanned {
    token: Token,
    line: usize,
}

fn error(reason: impl Into<String>, line: usize) -> FormatError {
    FormatError::Ascii {
        reason: reason.into(),
        line,
    }
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'|' | b'-' | b'.')
}

fn is_number_byte(byte: u8) -> bool {
    byte.is_ascii_digit() || matches!(byte, b'.' | b'e' | b'E' | b'+' | b'-')
}

fn tokenize(text: &str) -> Result<Vec<Spanned>, FormatError> {
    let bytes = text.as_bytes();
    let mut tokens = vec![];
    let mut line = 1;
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let token = match bytes[i] {
            b'\n' => {
                line += 1;
                i += 1;
                continue;
            }
            byte if byte.is_ascii_whitespace() => {
                i += 1;
                continue;
            }
            b';' => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b',' => {
                i += 1;
                Token::Comma
            }
            b'*' => {
                i += 1;
                Token::Star
            }
            b'{' => {
                i += 1;
                Token::Open
            }
            b'}' => {
                i += 1;
                Token::Close
            }
            b'"' => {
                let end = text[start + 1..]
                    .find('"')
                    .map(|len| start + 1 + len)
                    .ok_or_else(|| error("unterminated string", line))?;
                let value = &text[start + 1..end];
                i = end + 1;
                let token = Token::String(value.replace("&quot;", "\""));
                tokens.push(Spanned { token, line });
                line += value.matches('\n').count();
                continue;
            }
            byte if byte.is_ascii_digit() || matches!(byte, b'-' | b'+' | b'.') => {
                while i < bytes.len() && is_number_byte(bytes[i]) {
                    i += 1;
                }
                let number = &text[start..i];
                // MSVC spellings of non-finite values, e.g. `-1.#IND` or `1.#INF`.
                if bytes.get(i) == Some(&b'#') {
                    let suffix_start = i + 1;
                    i = suffix_start;
                    while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                        i += 1;
                    }
                    let value = match &text[suffix_start..i] {
                        "INF" if number.starts_with('-') => f64::NEG_INFINITY,
                        "INF" => f64::INFINITY,
                        _ => f64::NAN,
                    };
                    Token::Float(value)
                } else {
                    parse_number(number).ok_or_else(|| {
                        error(format!("invalid number `{number}`"), line)
                    })?
                }
            }
            byte if byte.is_ascii_alphabetic() || byte == b'_' => {
                while i < bytes.len() && is_word_byte(bytes[i]) {
                    i += 1;
                }
                let word = text[start..i].to_owned();
                if bytes.get(i) == Some(&b':') {
                    i += 1;
                    Token::Key(word)
                } else {
                    Token::Word(word)
                }
            }
            _ => {
                let found = text[start..].chars().next().unwrap_or_default();
                return Err(error(format!("unexpected character {found:?}"), line));
            }
        };
        tokens.push(Spanned { token, line });
    }

    Ok(tokens)
}

fn parse_number(number: &str) -> Option<Token> {
    if number.contains(&['.', 'e', 'E'][..]) {
        number.parse().ok().map(Token::Float)
    } else {
        number
            .parse()
            .map(Token::Integer)
            .or_else(|_| number.parse().map(Token::Float))
            .ok()
    }
}

#[derive(Debug)]
struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|spanned| &spanned.token)
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.position)
            .or_else(|| self.tokens.last())
            .map_or(1, |spanned| spanned.line)
    }

    fn error(&self, reason: impl Into<String>) -> FormatError {
        error(reason, self.line())
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FormatError> {
        match self.peek() {
            Some(token) if token == expected => {
                self.advance();
                Ok(())
            }
            Some(token) => Err(self.error(format!("expected {expected}, found {token}"))),
            None => Err(self.error(format!("expected {expected}, found end of file"))),
        }
    }

    fn nodes(&mut self, depth: usize) -> Result<Vec<Node>, FormatError> {
        let mut nodes = vec![];
        loop {
            match self.peek() {
                None if depth == 0 => return Ok(nodes),
                None => return Err(self.error("unexpected end of file, expected '}'")),
                Some(Token::Close) if depth > 0 => {
                    self.advance();
                    return Ok(nodes);
                }
                Some(Token::Key(name)) => {
                    let name = name.clone();
                    self.advance();
                    nodes.push(self.node(name, depth)?);
                }
                Some(token) => return Err(self.error(format!("expected a node name, found {token}"))),
            }
        }
    }

    fn node(&mut self, name: String, depth: usize) -> Result<Node, FormatError> {
        if depth >= MAX_DEPTH {
            return Err(self.error(format!("nodes nested deeper than {MAX_DEPTH} levels")));
        }
        let properties = if matches!(self.peek(), Some(Token::Star)) {
            vec![self.array()?]
        } else {
            self.values()?
        };
        let children = if matches!(self.peek(), Some(Token::Open)) {
            self.advance();
            self.nodes(depth + 1)?
        } else {
            vec![]
        };
        Ok(Node {
            name,
            properties,
            children,
        })
    }

    /// A comma separated value list, possibly empty.
    fn values(&mut self) -> Result<Vec<Property>, FormatError> {
        let mut values = vec![];
        // Some exporters write a leading comma, e.g. `Content: ,"..."`.
        if matches!(self.peek(), Some(Token::Comma)) {
            self.advance();
        }
        loop {
            let value = match self.peek() {
                Some(Token::Integer(value)) => Property::I64(*value),
                Some(Token::Float(value)) => Property::F64(*value),
                Some(Token::String(value) | Token::Word(value)) => Property::String(value.clone()),
                _ if values.is_empty() => return Ok(values),
                Some(token) => return Err(self.error(format!("expected a value, found {token}"))),
                None => return Err(self.error("expected a value, found end of file")),
            };
            self.advance();
            values.push(value);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.advance();
            } else {
                return Ok(values);
            }
        }
    }

    /// The `*N { a: ... }` array form.
    fn array(&mut self) -> Result<Property, FormatError> {
        self.advance();
        let declared = match self.peek() {
            Some(&Token::Integer(len)) if len >= 0 => len as usize,
            _ => return Err(self.error("expected an array length after '*'")),
        };
        self.advance();
        self.expect(&Token::Open)?;
        let values = match self.peek() {
            Some(Token::Key(key)) if key == "a" => {
                self.advance();
                self.values()?
            }
            _ => vec![],
        };
        self.expect(&Token::Close)?;

        if values.len() != declared {
            return Err(self.error(format!(
                "array declares {declared} values, found {}",
                values.len()
            )));
        }
        if values.iter().all(|value| matches!(value, Property::I64(_))) {
            Ok(Property::I64Array(
                values.iter().filter_map(Property::as_i64).collect(),
            ))
        } else {
            values
                .iter()
                .map(Property::as_f64)
                .collect::<Option<Vec<_>>>()
                .map(Property::F64Array)
                .ok_or_else(|| self.error("array contains non-numeric values"))
        }
    }
}

/// Decode an ASCII FBX document.
pub(crate) fn parse(text: &str) -> Result<Document, FormatError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let nodes = parser.nodes(0)?;
    if nodes.is_empty() {
        return Err(FormatError::Unrecognized);
    }

    let version = nodes
        .iter()
        .find(|node| node.name == "FBXHeaderExtension")
        .and_then(|header| header.child("FBXVersion"))
        .and_then(|version| version.properties.first())
        .and_then(Property::as_i64)
        .and_then(|version| u32::try_from(version).ok())
        .unwrap_or(0);
    tracing::trace!(
        "decoded {} top-level nodes from ASCII FBX {version}",
        nodes.len()
    );

    Ok(Document {
        version,
        encoding: Encoding::Ascii,
        nodes,
    })
}
