//! Recursive-descent parser for the `.usda` text layer.
//!
//! Produces a tree of [`PrimSpec`]s. Composition arcs (references, payloads,
//! inherits) are not followed; their metadata is parsed and dropped.

use std::collections::BTreeMap;

use crate::error::{StageError, StageResult};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::path::SdfPath;
use crate::value::{Attribute, Relationship, Value};

/// How a prim was introduced in the layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specifier {
    /// `def`
    Def,
    /// `over`
    Over,
    /// `class`
    Class,
}

/// A parsed prim and its subtree.
#[derive(Clone, Debug)]
pub(crate) struct PrimSpec {
    pub path: SdfPath,
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub attributes: BTreeMap<String, Attribute>,
    pub relationships: BTreeMap<String, Relationship>,
    pub children: Vec<PrimSpec>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListOp {
    Explicit,
    Add,
    Delete,
}

/// Parses a whole layer into its root prims.
pub(crate) fn parse_layer(source: &str) -> StageResult<Vec<PrimSpec>> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.layer()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)].kind
    }

    fn next(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> StageError {
        let token = &self.tokens[self.pos.min(self.tokens.len() - 1)];
        StageError::syntax(token.line, token.column, message)
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> StageResult<()> {
        if self.peek() == kind {
            self.next();
            Ok(())
        } else {
            Err(self.error_here(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> StageResult<String> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.next();
                Ok(name)
            }
            other => Err(self.error_here(format!("expected {what}, found {other:?}"))),
        }
    }

    fn expect_string(&mut self, what: &str) -> StageResult<String> {
        match self.peek().clone() {
            TokenKind::Str(text) => {
                self.next();
                Ok(text)
            }
            other => Err(self.error_here(format!("expected {what}, found {other:?}"))),
        }
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            TokenKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Skips one balanced group starting at the current open token.
    fn skip_group(&mut self) -> StageResult<()> {
        let mut depth = 0usize;
        loop {
            match self.next().kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                TokenKind::Eof => return Err(self.error_here("unbalanced group")),
                _ => {}
            }
        }
    }

    fn skip_metadata(&mut self) -> StageResult<()> {
        if *self.peek() == TokenKind::LParen {
            self.skip_group()?;
        }
        Ok(())
    }

    fn layer(&mut self) -> StageResult<Vec<PrimSpec>> {
        self.skip_metadata()?;
        let mut roots: Vec<PrimSpec> = Vec::new();
        loop {
            match self.peek() {
                TokenKind::Eof => return Ok(roots),
                TokenKind::Semi => {
                    self.next();
                }
                _ => {
                    let prim = self.prim(&SdfPath::root())?;
                    push_unique(&mut roots, prim)?;
                }
            }
        }
    }

    fn prim(&mut self, parent: &SdfPath) -> StageResult<PrimSpec> {
        let specifier = match self.expect_ident("prim specifier")?.as_str() {
            "def" => Specifier::Def,
            "over" => Specifier::Over,
            "class" => Specifier::Class,
            other => {
                return Err(self.error_here(format!("unknown specifier '{other}'")));
            }
        };

        let type_name = match self.peek() {
            TokenKind::Ident(_) => Some(self.expect_ident("prim type")?),
            _ => None,
        };
        let name = self.expect_string("prim name")?;
        if name.is_empty() || name.contains('/') {
            return Err(self.error_here(format!("invalid prim name '{name}'")));
        }
        self.skip_metadata()?;
        self.expect(&TokenKind::LBrace, "'{'")?;

        let mut spec = PrimSpec {
            path: parent.child(&name),
            specifier,
            type_name,
            attributes: BTreeMap::new(),
            relationships: BTreeMap::new(),
            children: Vec::new(),
        };

        loop {
            match self.peek() {
                TokenKind::RBrace => {
                    self.next();
                    return Ok(spec);
                }
                TokenKind::Semi => {
                    self.next();
                }
                TokenKind::Eof => return Err(self.error_here("unexpected end of file in prim")),
                _ => match self.peek_ident() {
                    Some("def" | "over" | "class") => {
                        let child = self.prim(&spec.path)?;
                        push_unique(&mut spec.children, child)?;
                    }
                    Some("variantSet") => {
                        self.next();
                        self.expect_string("variant set name")?;
                        self.expect(&TokenKind::Eq, "'='")?;
                        self.skip_group()?;
                    }
                    Some("reorder") if matches!(self.peek_at(1), TokenKind::Ident(n) if n == "nameChildren" || n == "properties") => {
                        self.next();
                        self.next();
                        self.expect(&TokenKind::Eq, "'='")?;
                        self.value()?;
                    }
                    _ => self.property(&mut spec)?,
                },
            }
        }
    }

    fn property(&mut self, spec: &mut PrimSpec) -> StageResult<()> {
        let mut custom = false;
        let mut uniform = false;
        let mut list_op = ListOp::Explicit;
        while let Some(word) = self.peek_ident() {
            match word {
                "custom" => custom = true,
                "uniform" => uniform = true,
                "varying" | "config" => {}
                "prepend" | "append" | "add" | "reorder" => list_op = ListOp::Add,
                "delete" => list_op = ListOp::Delete,
                _ => break,
            }
            self.next();
        }

        if self.peek_ident() == Some("rel") {
            self.next();
            return self.relationship(spec, list_op);
        }

        let mut type_name = self.expect_ident("attribute type")?;
        if *self.peek() == TokenKind::LBracket && *self.peek_at(1) == TokenKind::RBracket {
            self.next();
            self.next();
            type_name.push_str("[]");
        }
        let full_name = self.expect_ident("attribute name")?;

        let (name, field) = split_field(&full_name);
        let attribute = spec
            .attributes
            .entry(name.to_string())
            .or_insert_with(|| Attribute::new(name.to_string(), type_name.clone()));
        attribute.custom |= custom;
        attribute.uniform |= uniform;

        match field {
            Some("connect") => {
                self.expect(&TokenKind::Eq, "'='")?;
                let targets = self.path_list(&spec.path)?;
                if let Some(attribute) = spec.attributes.get_mut(name) {
                    attribute.connections = targets;
                }
            }
            Some("timeSamples") => {
                self.expect(&TokenKind::Eq, "'='")?;
                let samples = self.time_samples()?;
                if let Some(attribute) = spec.attributes.get_mut(name) {
                    attribute.time_samples = samples;
                }
            }
            Some(other) => {
                return Err(self.error_here(format!("unsupported attribute field '{other}'")));
            }
            None => {
                if *self.peek() == TokenKind::Eq {
                    self.next();
                    let value = self.value()?;
                    if let Some(attribute) = spec.attributes.get_mut(name) {
                        attribute.default = Some(value);
                    }
                }
            }
        }
        self.skip_metadata()
    }

    fn relationship(&mut self, spec: &mut PrimSpec, list_op: ListOp) -> StageResult<()> {
        let full_name = self.expect_ident("relationship name")?;
        let (name, _) = split_field(&full_name);
        let targets = if *self.peek() == TokenKind::Eq {
            self.next();
            Some(self.path_list(&spec.path)?)
        } else {
            None
        };
        self.skip_metadata()?;

        let rel = spec
            .relationships
            .entry(name.to_string())
            .or_insert_with(|| Relationship {
                name: name.to_string(),
                targets: Vec::new(),
            });
        if let Some(targets) = targets {
            match list_op {
                ListOp::Explicit => {
                    rel.targets.clear();
                    targets.into_iter().for_each(|t| rel.add_target(t));
                }
                ListOp::Add => targets.into_iter().for_each(|t| rel.add_target(t)),
                ListOp::Delete => targets.iter().for_each(|t| rel.remove_target(t)),
            }
        }
        Ok(())
    }

    /// `<path>`, `[<path>, ...]` or `None`.
    fn path_list(&mut self, anchor: &SdfPath) -> StageResult<Vec<SdfPath>> {
        match self.peek().clone() {
            TokenKind::PathRef(raw) => {
                let path = self.resolve_path(anchor, &raw)?;
                self.next();
                Ok(vec![path])
            }
            TokenKind::Ident(word) if word == "None" => {
                self.next();
                Ok(Vec::new())
            }
            TokenKind::LBracket => {
                self.next();
                let mut paths = Vec::new();
                loop {
                    match self.peek().clone() {
                        TokenKind::RBracket => {
                            self.next();
                            return Ok(paths);
                        }
                        TokenKind::Comma => {
                            self.next();
                        }
                        TokenKind::PathRef(raw) => {
                            paths.push(self.resolve_path(anchor, &raw)?);
                            self.next();
                        }
                        other => {
                            return Err(self.error_here(format!("expected path, found {other:?}")))
                        }
                    }
                }
            }
            other => Err(self.error_here(format!("expected path list, found {other:?}"))),
        }
    }

    fn resolve_path(&self, anchor: &SdfPath, raw: &str) -> StageResult<SdfPath> {
        SdfPath::resolve(anchor, raw).ok_or_else(|| self.error_here(format!("invalid path <{raw}>")))
    }

    fn time_samples(&mut self) -> StageResult<Vec<(f64, Value)>> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut samples = Vec::new();
        loop {
            let time = match self.next().kind {
                TokenKind::RBrace => break,
                TokenKind::Comma => continue,
                TokenKind::Int(t) => t as f64,
                TokenKind::Float(t) => t,
                other => {
                    return Err(self.error_here(format!("expected sample time, found {other:?}")))
                }
            };
            self.expect(&TokenKind::Colon, "':'")?;
            samples.push((time, self.value()?));
        }
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(samples)
    }

    fn value(&mut self) -> StageResult<Value> {
        let token = self.next();
        let value = match token.kind {
            TokenKind::Ident(word) => match word.as_str() {
                "None" => Value::None,
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                "inf" => Value::Float(f64::INFINITY),
                "nan" => Value::Float(f64::NAN),
                _ => Value::Token(word),
            },
            TokenKind::Int(v) => Value::Int(v),
            TokenKind::Float(v) => Value::Float(v),
            TokenKind::Str(s) => Value::String(s),
            TokenKind::Asset(s) => Value::Asset(s),
            TokenKind::PathRef(s) => Value::Path(s),
            TokenKind::LParen => Value::Tuple(self.sequence(&TokenKind::RParen)?),
            TokenKind::LBracket => Value::Array(self.sequence(&TokenKind::RBracket)?),
            TokenKind::LBrace => {
                // Dictionaries are not needed downstream.
                self.pos -= 1;
                self.skip_group()?;
                Value::None
            }
            other => {
                return Err(StageError::syntax(
                    token.line,
                    token.column,
                    format!("expected value, found {other:?}"),
                ))
            }
        };
        Ok(value)
    }

    fn sequence(&mut self, close: &TokenKind) -> StageResult<Vec<Value>> {
        let mut items = Vec::new();
        loop {
            if self.peek() == close {
                self.next();
                return Ok(items);
            }
            if *self.peek() == TokenKind::Comma {
                self.next();
                continue;
            }
            if *self.peek() == TokenKind::Eof {
                return Err(self.error_here("unterminated sequence"));
            }
            items.push(self.value()?);
        }
    }
}

fn push_unique(siblings: &mut Vec<PrimSpec>, prim: PrimSpec) -> StageResult<()> {
    if siblings.iter().any(|s| s.path == prim.path) {
        return Err(StageError::DuplicatePrim(prim.path.to_string()));
    }
    siblings.push(prim);
    Ok(())
}

/// Splits `inputs:file.connect` into (`inputs:file`, `Some("connect")`).
fn split_field(full: &str) -> (&str, Option<&str>) {
    match full.rsplit_once('.') {
        Some((name, field)) if !name.is_empty() => (name, Some(field)),
        _ => (full, None),
    }
}
