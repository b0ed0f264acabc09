//! Tokenizer for the `.usda` text layer.

use crate::error::{StageError, StageResult};

/// Lexical token kinds.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TokenKind {
    /// Identifier, possibly namespaced (`material:binding`, `a.connect`).
    Ident(String),
    /// Quoted string literal (quotes removed, escapes applied).
    Str(String),
    /// Asset path literal (`@...@`).
    Asset(String),
    /// Path literal (`<...>`).
    PathRef(String),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Eq,
    Comma,
    Semi,
    Colon,
    Eof,
}

/// A token with its 1-based source position.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
}

pub(crate) struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole source. The last token is always `Eof`.
    pub fn tokenize(mut self) -> StageResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_at(i) == Some(c))
    }

    fn bump(&mut self) -> Option<char> {
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

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '#' {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> StageResult<Token> {
        self.skip_trivia();
        let (line, column) = (self.line, self.column);
        let make = |kind| Token { kind, line, column };

        let Some(c) = self.peek() else {
            return Ok(make(TokenKind::Eof));
        };

        let kind = match c {
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '{' => self.single(TokenKind::LBrace),
            '}' => self.single(TokenKind::RBrace),
            '=' => self.single(TokenKind::Eq),
            ',' => self.single(TokenKind::Comma),
            ';' => self.single(TokenKind::Semi),
            ':' => self.single(TokenKind::Colon),
            '"' | '\'' => TokenKind::Str(self.string(line, column)?),
            '@' => TokenKind::Asset(self.asset(line, column)?),
            '<' => TokenKind::PathRef(self.path_ref(line, column)?),
            c if c.is_ascii_digit() => self.number(line, column)?,
            '-' | '+' | '.' if self.number_follows() => self.number(line, column)?,
            '-' if self.starts_with("-inf") => {
                self.pos += 4;
                self.column += 4;
                TokenKind::Float(f64::NEG_INFINITY)
            }
            c if c.is_alphabetic() || c == '_' => TokenKind::Ident(self.ident()),
            other => {
                return Err(StageError::syntax(
                    line,
                    column,
                    format!("unexpected character '{other}'"),
                ))
            }
        };
        Ok(make(kind))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    fn number_follows(&self) -> bool {
        match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some('.'), Some(d), _) => d.is_ascii_digit(),
            (Some('-' | '+'), Some(d), _) if d.is_ascii_digit() => true,
            (Some('-' | '+'), Some('.'), Some(d)) => d.is_ascii_digit(),
            _ => false,
        }
    }

    fn ident(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | ':' | '.') {
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }
        text
    }

    fn number(&mut self, line: u32, column: u32) -> StageResult<TokenKind> {
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            text.push(sign);
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(sign @ ('-' | '+')) = self.peek() {
                        text.push(sign);
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            text.push(c);
            self.bump();
        }

        let invalid = || StageError::syntax(line, column, format!("invalid number '{text}'"));
        if !is_float {
            if let Ok(v) = text.parse::<i64>() {
                return Ok(TokenKind::Int(v));
            }
        }
        text.parse::<f64>().map(TokenKind::Float).map_err(|_| invalid())
    }

    fn string(&mut self, line: u32, column: u32) -> StageResult<String> {
        let Some(quote) = self.bump() else {
            return Err(StageError::syntax(line, column, "expected string"));
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut text = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(StageError::syntax(line, column, "unterminated string"));
            };
            match c {
                '\\' => {
                    let escaped = self
                        .bump()
                        .ok_or_else(|| StageError::syntax(line, column, "unterminated string"))?;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                }
                c if c == quote && !triple => return Ok(text),
                c if c == quote && self.peek() == Some(quote) && self.peek_at(1) == Some(quote) => {
                    self.bump();
                    self.bump();
                    return Ok(text);
                }
                '\n' if !triple => {
                    return Err(StageError::syntax(line, column, "newline in string"));
                }
                c => text.push(c),
            }
        }
    }

    fn asset(&mut self, line: u32, column: u32) -> StageResult<String> {
        let delimiter = if self.starts_with("@@@") { "@@@" } else { "@" };
        for _ in 0..delimiter.len() {
            self.bump();
        }
        let mut text = String::new();
        loop {
            if self.starts_with(delimiter) {
                for _ in 0..delimiter.len() {
                    self.bump();
                }
                return Ok(text);
            }
            match self.bump() {
                Some('\n') | None => {
                    return Err(StageError::syntax(line, column, "unterminated asset path"))
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn path_ref(&mut self, line: u32, column: u32) -> StageResult<String> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('>') => return Ok(text),
                Some('\n') | None => {
                    return Err(StageError::syntax(line, column, "unterminated path"))
                }
                Some(c) => text.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_namespaced_identifiers() {
        assert_eq!(
            kinds("rel material:binding = </W/Looks/stone>"),
            vec![
                TokenKind::Ident("rel".into()),
                TokenKind::Ident("material:binding".into()),
                TokenKind::Eq,
                TokenKind::PathRef("/W/Looks/stone".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(
            kinds("(1, -2.5, 3e2, .5, -inf)"),
            vec![
                TokenKind::LParen,
                TokenKind::Int(1),
                TokenKind::Comma,
                TokenKind::Float(-2.5),
                TokenKind::Comma,
                TokenKind::Float(300.0),
                TokenKind::Comma,
                TokenKind::Float(0.5),
                TokenKind::Comma,
                TokenKind::Float(f64::NEG_INFINITY),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_strings_assets_and_comments() {
        assert_eq!(
            kinds("#usda 1.0\n\"a\\\"b\" '''multi\nline''' @./tex/stone.png@ @@@odd@name@@@"),
            vec![
                TokenKind::Str("a\"b".into()),
                TokenKind::Str("multi\nline".into()),
                TokenKind::Asset("./tex/stone.png".into()),
                TokenKind::Asset("odd@name".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_time_sample_colon() {
        assert_eq!(
            kinds("0: 1"),
            vec![TokenKind::Int(0), TokenKind::Colon, TokenKind::Int(1), TokenKind::Eof]
        );
    }

    #[test]
    fn test_positions_reported() {
        let tokens = Lexer::new("a\n  b").tokenize().unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert!(matches!(err, StageError::Syntax { line: 1, column: 1, .. }));
    }
}
