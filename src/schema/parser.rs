//! Parser for the payload type wire text.
//!
//! Recursive descent over the object-literal grammar described in the
//! module docs. Whitespace between tokens is not significant.

use crate::error::{Result, StpError};

use super::PayloadType;

/// Parse a payload type text into a [`PayloadType`] tree.
///
/// The whole input must be consumed; trailing garbage is a syntax
/// error.
pub fn parse_type(text: &str) -> Result<PayloadType> {
    let mut p = Parser::new(text);
    let ty = p.parse_type()?;
    p.skip_ws();
    if !p.at_end() {
        return Err(p.error());
    }
    Ok(ty)
}

/// Parse a payload type from the start of `text`, returning the tree
/// and the unconsumed remainder. Used by the session codec, where the
/// type is embedded mid-line (`..., Payload: <type>, Cont: ...`).
pub(crate) fn parse_type_prefix(text: &str) -> Result<(PayloadType, &str)> {
    let mut p = Parser::new(text);
    let ty = p.parse_type()?;
    Ok((ty, p.rest()))
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Syntax error pointing at the unconsumed fragment.
    fn error(&self) -> StpError {
        let frag: String = self.rest().chars().take(40).collect();
        StpError::TypeSyntax(frag)
    }

    fn skip_ws(&mut self) {
        while self.rest().starts_with(|c: char| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &str) -> Result<()> {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error())
        }
    }

    fn peek(&mut self, token: &str) -> bool {
        self.skip_ws();
        self.rest().starts_with(token)
    }

    /// A double-quoted string without escapes; the grammar never needs
    /// them.
    fn quoted(&mut self) -> Result<&'a str> {
        self.eat("\"")?;
        let rest = self.rest();
        let end = rest.find('"').ok_or_else(|| self.error())?;
        let s = &rest[..end];
        self.pos += end + 1;
        Ok(s)
    }

    fn parse_type(&mut self) -> Result<PayloadType> {
        self.eat("{")?;
        self.eat("type")?;
        self.eat(":")?;
        let tag = self.quoted()?;

        let ty = match tag {
            "number" => PayloadType::Number,
            "string" => PayloadType::Str,
            "bool" => PayloadType::Bool,
            "null" => PayloadType::Null,
            "any" => PayloadType::Any,
            "array" => {
                self.eat(",")?;
                self.eat("payload")?;
                self.eat(":")?;
                PayloadType::Array(Box::new(self.parse_type()?))
            }
            "tuple" => PayloadType::Tuple(self.parse_payload_list()?),
            "union" => PayloadType::Union(self.parse_payload_list()?),
            "record" => PayloadType::Record(self.parse_payload_list()?),
            "def" => {
                self.eat(",")?;
                self.eat("name")?;
                self.eat(":")?;
                let name = Box::new(self.parse_type()?);
                self.eat(",")?;
                self.eat("payload")?;
                self.eat(":")?;
                let payload = Box::new(self.parse_type()?);
                PayloadType::Def { name, payload }
            }
            _ => return Err(StpError::TypeSyntax(tag.to_string())),
        };

        self.eat("}")?;
        Ok(ty)
    }

    fn parse_payload_list(&mut self) -> Result<Vec<PayloadType>> {
        self.eat(",")?;
        self.eat("payload")?;
        self.eat(":")?;
        self.eat("[")?;
        let mut items = Vec::new();
        if !self.peek("]") {
            loop {
                items.push(self.parse_type()?);
                if !self.peek(",") {
                    break;
                }
                self.eat(",")?;
            }
        }
        self.eat("]")?;
        Ok(items)
    }
}
