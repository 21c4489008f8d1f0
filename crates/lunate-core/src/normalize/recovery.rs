//! Source-rescan recovery for top-level syntax errors.
//!
//! When a parser gives up on a statement it leaves an error placeholder
//! covering a byte range. For a narrow set of declaration shapes the original
//! text is simple enough to read directly:
//!
//! ```text
//! var|let|const [a, b, ...] = path
//! var|let|const { a, b: c } = path
//! var|let|const name = path | literal
//! ```
//!
//! Anything else is reported as unrecoverable.

use super::NormalizeError;
use lunate_syntax_javascript::{parse_number, unescape};
use serde_json::{json, Value};

pub(crate) fn placeholder_line(placeholder: &Value) -> u32 {
    placeholder
        .pointer("/loc/start/line")
        .and_then(Value::as_u64)
        .map(|line| line as u32)
        .unwrap_or(0)
}

fn placeholder_range(placeholder: &Value) -> Option<(usize, usize)> {
    let range = placeholder.get("range")?.as_array()?;
    let start = range.first()?.as_u64()? as usize;
    let end = range.get(1)?.as_u64()? as usize;
    Some((start, end))
}

/// Rebuild a canonical `VariableDeclaration` from the text under `placeholder`.
pub fn recover_declaration(
    placeholder: &Value,
    source: Option<&str>,
) -> Result<Value, NormalizeError> {
    let line = placeholder_line(placeholder);
    let (start, end) = placeholder_range(placeholder).unwrap_or((0, 0));
    let text = source.and_then(|s| s.get(start..end)).unwrap_or_default();

    let unrecoverable = || NormalizeError::Unrecoverable {
        start,
        end,
        line,
        text: text.to_string(),
    };

    let mut declaration = Scanner::new(text).declaration().ok_or_else(unrecoverable)?;
    if let (Some(loc), Value::Object(map)) = (placeholder.get("loc"), &mut declaration) {
        map.insert("loc".into(), loc.clone());
    }
    Ok(declaration)
}

// ============================================================================
// Scanner
// ============================================================================

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn identifier(name: &str) -> Value {
    json!({ "type": "Identifier", "name": name })
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, c)) if is_ident_start(c) => {}
            _ => return None,
        }
        let len = chars
            .find(|(_, c)| !is_ident_part(*c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        self.pos += len;
        Some(&rest[..len])
    }

    /// Whole text is one declaration, optionally followed by `;`.
    fn declaration(&mut self) -> Option<Value> {
        let kind = self.ident()?;
        if !matches!(kind, "var" | "let" | "const") {
            return None;
        }
        let id = self.binding()?;
        if !self.eat('=') {
            return None;
        }
        let init = self.initializer()?;
        self.eat(';');
        self.skip_ws();
        if !self.rest().is_empty() {
            return None;
        }
        Some(json!({
            "type": "VariableDeclaration",
            "kind": kind,
            "declarations": [{
                "type": "VariableDeclarator",
                "id": id,
                "init": init,
            }],
        }))
    }

    fn binding(&mut self) -> Option<Value> {
        if self.eat('[') {
            let mut elements = Vec::new();
            if !self.eat(']') {
                loop {
                    elements.push(identifier(self.ident()?));
                    if self.eat(']') {
                        break;
                    }
                    if !self.eat(',') {
                        return None;
                    }
                }
            }
            return Some(json!({ "type": "ArrayPattern", "elements": elements }));
        }

        if self.eat('{') {
            let mut properties = Vec::new();
            if !self.eat('}') {
                loop {
                    let key = self.ident()?;
                    let (value, shorthand) = if self.eat(':') {
                        (self.ident()?, false)
                    } else {
                        (key, true)
                    };
                    properties.push(json!({
                        "type": "Property",
                        "key": identifier(key),
                        "value": identifier(value),
                        "kind": "init",
                        "computed": false,
                        "method": false,
                        "shorthand": shorthand,
                    }));
                    if self.eat('}') {
                        break;
                    }
                    if !self.eat(',') {
                        return None;
                    }
                }
            }
            return Some(json!({ "type": "ObjectPattern", "properties": properties }));
        }

        self.ident().map(identifier)
    }

    fn initializer(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '"' | '\'' => self.string(),
            c if c.is_ascii_digit() || c == '.' || c == '-' => self.number(),
            _ => self.path(),
        }
    }

    /// `a.b.c`, or one of the keyword literals.
    fn path(&mut self) -> Option<Value> {
        let head = self.ident()?;
        let literal = match head {
            "true" => Some(json!(true)),
            "false" => Some(json!(false)),
            "null" => Some(Value::Null),
            _ => None,
        };
        if let Some(value) = literal {
            return Some(json!({ "type": "Literal", "value": value, "raw": head }));
        }

        let mut expr = identifier(head);
        while self.eat('.') {
            let property = self.ident()?;
            expr = json!({
                "type": "MemberExpression",
                "object": expr,
                "property": identifier(property),
                "computed": false,
                "optional": false,
            });
        }
        Some(expr)
    }

    fn number(&mut self) -> Option<Value> {
        let rest = self.rest();
        let negative = rest.starts_with('-');
        let digits_start = usize::from(negative);
        let len = rest[digits_start..]
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '.' || *c == '_'))
            .map(|(i, _)| i + digits_start)
            .unwrap_or(rest.len());
        let raw = &rest[..len];
        let magnitude = parse_number(&raw[digits_start..])?;
        self.pos += len;
        let value = if negative { -magnitude } else { magnitude };
        Some(json!({ "type": "Literal", "value": value, "raw": raw }))
    }

    fn string(&mut self) -> Option<Value> {
        let rest = self.rest();
        let quote = rest.chars().next()?;
        let mut escaped = false;
        for (i, c) in rest.char_indices().skip(1) {
            if escaped {
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '\n' => return None,
                c if c == quote => {
                    let raw = &rest[..=i];
                    let value = unescape(&rest[1..i]);
                    self.pos += i + 1;
                    return Some(json!({ "type": "Literal", "value": value, "raw": raw }));
                }
                _ => {}
            }
        }
        None
    }
}
