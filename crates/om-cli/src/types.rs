//! Type expressions used by documents to name shapes.
//!
//! ```text
//! expr    := primary ( "?" | "[]" )*
//! primary := name
//!          | sequence "<" expr ">"
//!          | "map" "<" expr "," expr ">"
//! ```
//!
//! `name` is a scalar kind (`i32`, `text`, ...) or a declared shape;
//! `sequence` is one of the sequence keywords (`list`, `stack`, `queue`,
//! `linked_list`, `read_only`, `set`, `sorted_set`).

use color_eyre::eyre::{bail, eyre};
use om_core::{ConfigurationError, ScalarKind, SchemaBuilder, SequenceKind, ShapeId};

/// A parsed type expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A scalar kind or declared shape.
    Named(String),
    /// `T?`
    Optional(Box<TypeExpr>),
    /// `T[]`
    Array(Box<TypeExpr>),
    /// `list<T>` and the other sequence kinds.
    Sequence(SequenceKind, Box<TypeExpr>),
    /// `map<K, V>`
    Dictionary(Box<TypeExpr>, Box<TypeExpr>),
}

impl TypeExpr {
    /// Parses a type expression.
    pub fn parse(text: &str) -> color_eyre::Result<Self> {
        let mut parser = Parser { text, pos: 0 };
        let expr = parser.expr()?;
        parser.skip_ws();
        if parser.pos < text.len() {
            bail!("unexpected `{}` at offset {} in `{text}`", &text[parser.pos..], parser.pos);
        }
        Ok(expr)
    }

    /// Registers the shape this expression denotes.
    ///
    /// Returns `Ok(None)` while a named shape is not registered yet.
    pub fn register(&self, builder: &mut SchemaBuilder) -> Result<Option<ShapeId>, ConfigurationError> {
        Ok(match self {
            Self::Named(name) => match ScalarKind::from_name(name) {
                Some(kind) => Some(builder.scalar(kind)),
                None => builder.lookup(name),
            },
            Self::Optional(inner) => match inner.register(builder)? {
                Some(inner) => Some(builder.optional(inner)?),
                None => None,
            },
            Self::Array(element) => match element.register(builder)? {
                Some(element) => Some(builder.array(element)?),
                None => None,
            },
            Self::Sequence(kind, element) => match element.register(builder)? {
                Some(element) => Some(builder.sequence(*kind, element)?),
                None => None,
            },
            Self::Dictionary(key, value) => match (key.register(builder)?, value.register(builder)?) {
                (Some(key), Some(value)) => Some(builder.dictionary(key, value)?),
                _ => None,
            },
        })
    }

    /// The first shape name that is neither a scalar kind nor registered.
    pub fn unknown_name<'a>(&'a self, builder: &SchemaBuilder) -> Option<&'a str> {
        match self {
            Self::Named(name) => {
                (ScalarKind::from_name(name).is_none() && builder.lookup(name).is_none()).then_some(name.as_str())
            }
            Self::Optional(inner) | Self::Array(inner) | Self::Sequence(_, inner) => inner.unknown_name(builder),
            Self::Dictionary(key, value) => key.unknown_name(builder).or_else(|| value.unknown_name(builder)),
        }
    }
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> color_eyre::Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(eyre!("expected `{token}` at offset {} in `{}`", self.pos, self.text))
        }
    }

    fn ident(&mut self) -> color_eyre::Result<&str> {
        self.skip_ws();
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        if len == 0 {
            bail!("expected a type name at offset {} in `{}`", self.pos, self.text);
        }
        let start = self.pos;
        self.pos += len;
        Ok(&self.text[start..self.pos])
    }

    fn expr(&mut self) -> color_eyre::Result<TypeExpr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat("?") {
                expr = TypeExpr::Optional(Box::new(expr));
            } else if self.eat("[]") {
                expr = TypeExpr::Array(Box::new(expr));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> color_eyre::Result<TypeExpr> {
        let name = self.ident()?.to_owned();
        if !self.eat("<") {
            return Ok(TypeExpr::Named(name));
        }
        let expr = if name == "map" {
            let key = self.expr()?;
            self.expect(",")?;
            let value = self.expr()?;
            TypeExpr::Dictionary(Box::new(key), Box::new(value))
        } else {
            let kind = SequenceKind::from_name(&name)
                .ok_or_else(|| eyre!("`{name}` is not a generic type in `{}`", self.text))?;
            TypeExpr::Sequence(kind, Box::new(self.expr()?))
        };
        self.expect(">")?;
        Ok(expr)
    }
}
