//! IR to Lua code generation.
//!
//! One rendering rule per [`NodeKind`]. Statements render to indented text;
//! expressions render to a single [`Expr`] carrying its Lua precedence so
//! operands are parenthesized only where Lua would otherwise re-associate.

mod class;
mod expr;
mod stmt;

use lunate_ir::{validate_ir, IrDocument, Node, NodeId, NodeKind, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during emission.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("refusing to emit invalid IR: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },

    #[error("validation failed: {0}")]
    Validator(#[from] ValidationError),

    #[error("dangling node reference: {0}")]
    MissingNode(NodeId),

    #[error("node {id} is a {found}, expected {expected}")]
    UnexpectedKind {
        id: NodeId,
        found: &'static str,
        expected: &'static str,
    },

    #[error("operator '{operator}' has no Lua equivalent (node {id})")]
    UnsupportedOperator { operator: String, id: NodeId },
}

/// Emission settings, readable from the `[emit]` table of `lunate.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EmitOptions {
    /// One level of indentation.
    pub indent: String,
    /// Declare top-level bindings as globals instead of locals.
    pub globals: bool,
    /// Run the validator first and refuse invalid documents.
    pub validate: bool,
    /// Start the output with a comment naming the source.
    pub header: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            indent: "  ".into(),
            globals: false,
            validate: true,
            header: false,
        }
    }
}

/// Lua reserved keywords that need escaping.
fn lua_keywords() -> HashSet<&'static str> {
    [
        "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
        "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
    ]
    .into_iter()
    .collect()
}

/// True when `name` can be written bare, as in `t.name` or `{ name = 1 }`.
pub(crate) fn is_lua_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !lua_keywords().contains(name)
}

/// Convert a variable name to a safe Lua identifier.
///
/// Not injective: `$el` and `_el` both become `_el`.
pub(crate) fn to_lua_name(name: &str) -> String {
    // Replace invalid characters with _
    let mut safe: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    // Cannot start with digit
    if safe.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        safe = format!("_{}", safe);
    }

    // Avoid keywords
    if lua_keywords().contains(safe.as_str()) {
        format!("_{}", safe)
    } else {
        safe
    }
}

/// Name an IR identifier takes in Lua.
pub(crate) fn lua_identifier(name: &str) -> String {
    match name {
        "undefined" => "nil".into(),
        "..." => name.into(),
        _ => to_lua_name(name),
    }
}

pub(crate) fn lua_string_literal(s: &str) -> String {
    // Long brackets read better for multiline text, but drop a leading
    // newline and normalize \r, so only use them when neither can happen.
    let plain_lines = s
        .chars()
        .all(|c| c == '\n' || c == '\t' || !c.is_control());
    if s.contains('\n') && !s.starts_with('\n') && !s.contains("]]") && plain_lines {
        return format!("[[{}]]", s);
    }

    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('"');
    for c in s.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c.is_control() && (c as u32) < 256 => {
                escaped.push_str(&format!("\\{:03}", c as u32));
            }
            c => escaped.push(c),
        }
    }
    escaped.push('"');
    escaped
}

/// Emit a validated IR document as Lua source.
pub fn emit(document: &IrDocument) -> Result<String, EmitError> {
    emit_with(document, &EmitOptions::default())
}

/// Emit with explicit options.
pub fn emit_with(document: &IrDocument, options: &EmitOptions) -> Result<String, EmitError> {
    if options.validate {
        let report = validate_ir(document)?;
        if !report.ok {
            return Err(EmitError::Invalid {
                errors: report.errors,
            });
        }
    }

    let emitter = Emitter::new(document, options);
    let mut out = String::new();
    if options.header {
        out.push_str(&emitter.header());
    }
    out.push_str(&emitter.block(&document.module.body, 0)?);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }

    debug!(
        "Emitted {} lines of Lua from {} nodes",
        out.lines().count(),
        document.nodes.len()
    );
    Ok(out)
}

// ============================================================================
// Emitter
// ============================================================================

pub(crate) struct Emitter<'a> {
    document: &'a IrDocument,
    options: &'a EmitOptions,
    /// Names declared as classes, which shadow builtin constructors.
    classes: HashSet<&'a str>,
}

impl<'a> Emitter<'a> {
    fn new(document: &'a IrDocument, options: &'a EmitOptions) -> Self {
        let classes = document
            .nodes
            .values()
            .filter(|node| node.meta.class_like)
            .filter_map(|node| match &node.kind {
                NodeKind::FunctionDeclaration { name, .. } => document.node(name),
                _ => None,
            })
            .filter_map(|name| match &name.kind {
                NodeKind::Identifier { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();

        Self {
            document,
            options,
            classes,
        }
    }

    fn header(&self) -> String {
        let module = &self.document.module;
        let mut out = format!(
            "-- Generated by lunate from {} ({})\n",
            module.source.path.as_deref().unwrap_or("<input>"),
            module.source.content_hash
        );
        for directive in &module.directives {
            out.push_str(&format!("-- directive: {}\n", directive));
        }
        out
    }

    fn node(&self, id: &NodeId) -> Result<&'a Node, EmitError> {
        self.document
            .node(id)
            .ok_or_else(|| EmitError::MissingNode(id.clone()))
    }

    fn kind(&self, id: &NodeId) -> Result<&'a NodeKind, EmitError> {
        Ok(&self.node(id)?.kind)
    }

    fn unexpected(&self, id: &NodeId, expected: &'static str) -> EmitError {
        EmitError::UnexpectedKind {
            id: id.clone(),
            found: self
                .document
                .node(id)
                .map(Node::kind_name)
                .unwrap_or("missing node"),
            expected,
        }
    }

    fn indent(&self, depth: usize) -> String {
        self.options.indent.repeat(depth)
    }

    /// Top-level bindings become globals when configured.
    fn global_scope(&self, depth: usize) -> bool {
        self.options.globals && depth == 0
    }

    fn identifier_name(&self, id: &NodeId) -> Result<String, EmitError> {
        match self.kind(id)? {
            NodeKind::Identifier { name } => Ok(lua_identifier(name)),
            _ => Err(self.unexpected(id, "Identifier")),
        }
    }

    /// `<head>(<params>) <body> end`
    fn function_text(
        &self,
        head: &str,
        params: &[NodeId],
        vararg: bool,
        body: &NodeId,
        depth: usize,
    ) -> Result<String, EmitError> {
        let mut names = params
            .iter()
            .map(|param| self.identifier_name(param))
            .collect::<Result<Vec<_>, _>>()?;
        if vararg {
            names.push("...".into());
        }

        let body = self.body(body, depth + 1)?;
        if body.is_empty() {
            Ok(format!("{}({}) end", head, names.join(", ")))
        } else {
            Ok(format!(
                "{}({})\n{}\n{}end",
                head,
                names.join(", "),
                body,
                self.indent(depth)
            ))
        }
    }
}
