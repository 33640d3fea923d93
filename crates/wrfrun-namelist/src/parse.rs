//! Fortran namelist reader.
//!
//! Supported syntax:
//! - groups opened by `&name` (or `$name`) and closed by `/`, `&end` or
//!   `$end`;
//! - `key = value, value, ...` entries, values separated by commas or
//!   whitespace and allowed to continue over several lines;
//! - `n*value` repeat counts;
//! - single- or double-quoted strings with doubled quotes as escapes;
//! - `!` comments to the end of the line.
//!
//! Text outside any group is ignored.

use crate::error::NamelistError;
use crate::namelist::{Namelist, NamelistGroup};
use crate::value::NamelistValue;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    GroupStart(String),
    GroupEnd,
    Word(String),
    Quoted(String),
    Equals,
    Comma,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            Self::GroupStart(name) => format!("start of group '{name}'"),
            Self::GroupEnd => "end of group".to_owned(),
            Self::Word(word) => format!("'{word}'"),
            Self::Quoted(text) => format!("string '{text}'"),
            Self::Equals => "'='".to_owned(),
            Self::Comma => "','".to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

/// Characters that end an unquoted word.
fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '=' | ',' | '/' | '!' | '&' | '$' | '\'' | '"')
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line = self.line.saturating_add(1);
        }
        Some(c)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_delimiter(c) {
                break;
            }
            word.push(c);
            self.chars.next();
        }
        word
    }

    fn quoted(&mut self, quote: char) -> Result<String, NamelistError> {
        let opened_on = self.line;
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(NamelistError::parse(opened_on, "unterminated string")),
                Some(c) if c == quote => {
                    if self.chars.peek() == Some(&quote) {
                        text.push(quote);
                        self.chars.next();
                    } else {
                        return Ok(text);
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn tokens(mut self) -> Result<Vec<Token>, NamelistError> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            let line = self.line;
            let kind = match c {
                '!' => {
                    while self.chars.peek().is_some_and(|&c| c != '\n') {
                        self.chars.next();
                    }
                    continue;
                }
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '=' => {
                    self.bump();
                    TokenKind::Equals
                }
                ',' => {
                    self.bump();
                    TokenKind::Comma
                }
                '/' => {
                    self.bump();
                    TokenKind::GroupEnd
                }
                '&' | '$' => {
                    self.bump();
                    let name = self.word();
                    if name.is_empty() {
                        return Err(NamelistError::parse(line, format!("'{c}' without a group name")));
                    }
                    if name.eq_ignore_ascii_case("end") {
                        TokenKind::GroupEnd
                    } else {
                        TokenKind::GroupStart(name.to_ascii_lowercase())
                    }
                }
                '\'' | '"' => {
                    self.bump();
                    TokenKind::Quoted(self.quoted(c)?)
                }
                _ => TokenKind::Word(self.word()),
            };
            tokens.push(Token { kind, line });
        }
        Ok(tokens)
    }
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn peek(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.position.checked_add(ahead)?)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned()?;
        self.position = self.position.saturating_add(1);
        Some(token)
    }

    fn last_line(&self) -> usize {
        self.tokens.last().map_or(1, |token| token.line)
    }

    fn namelist(&mut self) -> Result<Namelist, NamelistError> {
        let mut namelist = Namelist::new();
        while let Some(token) = self.advance() {
            if let TokenKind::GroupStart(name) = token.kind {
                let group = self.group(&name)?;
                namelist.insert_group(&name, group);
            }
        }
        Ok(namelist)
    }

    fn group(&mut self, name: &str) -> Result<NamelistGroup, NamelistError> {
        let mut group = NamelistGroup::new();
        loop {
            let Some(token) = self.advance() else {
                return Err(NamelistError::parse(
                    self.last_line(),
                    format!("group '{name}' is not terminated"),
                ));
            };
            match token.kind {
                TokenKind::GroupEnd => return Ok(group),
                TokenKind::Comma => {}
                TokenKind::Word(key) => {
                    match self.advance() {
                        Some(Token {
                            kind: TokenKind::Equals,
                            ..
                        }) => {}
                        _ => {
                            return Err(NamelistError::parse(
                                token.line,
                                format!("expected '=' after '{key}'"),
                            ));
                        }
                    }
                    let values = self.values()?;
                    group.set(&key, values);
                }
                other => {
                    return Err(NamelistError::parse(
                        token.line,
                        format!("unexpected {} in group '{name}'", other.describe()),
                    ));
                }
            }
        }
    }

    /// Values up to the next `key =`, or the end of the group.
    fn values(&mut self) -> Result<Vec<NamelistValue>, NamelistError> {
        let mut values = Vec::new();
        loop {
            let next_is_key = matches!(
                (self.peek(0).map(|t| &t.kind), self.peek(1).map(|t| &t.kind)),
                (Some(TokenKind::Word(_)), Some(TokenKind::Equals))
            );
            if next_is_key {
                return Ok(values);
            }
            let Some(token) = self.peek(0).cloned() else {
                return Ok(values);
            };
            match token.kind {
                TokenKind::GroupEnd | TokenKind::GroupStart(_) => return Ok(values),
                TokenKind::Comma => {}
                TokenKind::Quoted(text) => values.push(NamelistValue::Str(text)),
                TokenKind::Word(word) => self.word(&word, token.line, &mut values)?,
                TokenKind::Equals => return Err(NamelistError::parse(token.line, "unexpected '='")),
            }
            self.position = self.position.saturating_add(1);
        }
    }

    fn word(&mut self, word: &str, line: usize, values: &mut Vec<NamelistValue>) -> Result<(), NamelistError> {
        let Some((count, rest)) = word.split_once('*') else {
            values.push(NamelistValue::from_token(word));
            return Ok(());
        };
        let count: usize = count
            .parse()
            .map_err(|_| NamelistError::parse(line, format!("invalid repeat count in '{word}'")))?;
        let value = if rest.is_empty() {
            match self.peek(1).map(|t| t.kind.clone()) {
                Some(TokenKind::Quoted(text)) => {
                    self.position = self.position.saturating_add(1);
                    NamelistValue::Str(text)
                }
                _ => return Err(NamelistError::parse(line, format!("missing value after '{word}'"))),
            }
        } else {
            NamelistValue::from_token(rest)
        };
        values.extend(std::iter::repeat_n(value, count));
        Ok(())
    }
}

/// Parse namelist text.
pub(crate) fn parse(text: &str) -> Result<Namelist, NamelistError> {
    let tokens = Lexer::new(text).tokens()?;
    Parser { tokens, position: 0 }.namelist()
}
