//! Raw AST normalization.
//!
//! Parsers disagree on the shape of the tree they hand back: ESTree and Babel
//! name literals, properties and optional chains differently, omit defaulted
//! fields, and represent syntax errors in their own way. [`normalize_node`]
//! reconciles all of them into one canonical JSON shape, which
//! [`normalize_program`] then deserializes into the typed [`ast`](crate::ast).

mod recovery;

use crate::ast::Program;
use lunate_ir::LiteralValue;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::warn;

pub use recovery::recover_declaration;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("raw AST must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("raw AST root must be a Program, got '{0}'")]
    NotAProgram(String),

    #[error("unrecoverable syntax error at line {line} (bytes {start}..{end}): {text:?}")]
    Unrecoverable {
        start: usize,
        end: usize,
        line: u32,
        text: String,
    },

    #[error("canonical AST has an unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions<'a> {
    /// Original source text, needed to recover from error placeholders.
    pub source: Option<&'a str>,
}

/// Node types the rest of the pipeline understands.
const CANONICAL_TYPES: &[&str] = &[
    "Program",
    "BlockStatement",
    "VariableDeclaration",
    "VariableDeclarator",
    "ExpressionStatement",
    "ReturnStatement",
    "IfStatement",
    "WhileStatement",
    "DoWhileStatement",
    "ForStatement",
    "ForOfStatement",
    "ForInStatement",
    "SwitchStatement",
    "SwitchCase",
    "TryStatement",
    "CatchClause",
    "ThrowStatement",
    "BreakStatement",
    "ContinueStatement",
    "ClassDeclaration",
    "ClassBody",
    "MethodDefinition",
    "PropertyDefinition",
    "FunctionDeclaration",
    "EmptyStatement",
    "Identifier",
    "Literal",
    "TemplateLiteral",
    "TemplateElement",
    "ArrayExpression",
    "ObjectExpression",
    "Property",
    "FunctionExpression",
    "ArrowFunctionExpression",
    "UnaryExpression",
    "UpdateExpression",
    "BinaryExpression",
    "LogicalExpression",
    "AssignmentExpression",
    "ConditionalExpression",
    "CallExpression",
    "NewExpression",
    "MemberExpression",
    "ChainExpression",
    "ThisExpression",
    "Super",
    "SpreadElement",
    "ObjectPattern",
    "ArrayPattern",
    "AssignmentPattern",
    "RestElement",
    "Unsupported",
];

/// Syntax-error markers produced by the supported parsers.
const ERROR_TYPES: &[&str] = &["ErrorPlaceholder", "Error", "Invalid"];

/// Parser bookkeeping that never reaches the canonical tree.
const DROPPED_KEYS: &[&str] = &[
    "leadingComments",
    "trailingComments",
    "innerComments",
    "comments",
    "tokens",
    "extra",
    "start",
    "end",
    "range",
    "errors",
    "interpreter",
];

fn type_of(value: &Value) -> Option<&str> {
    value.get("type").and_then(Value::as_str)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Normalize any raw node (or array of nodes) into canonical shape.
///
/// Total and idempotent: `normalize_node(&normalize_node(v)) == normalize_node(v)`.
pub fn normalize_node(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().map(normalize_node).collect()),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some(ty) => normalize_typed(ty, map),
            None => Value::Object(copy_fields(map)),
        },
        other => other.clone(),
    }
}

/// Normalize a raw `Program` (or `File`) and deserialize it.
pub fn normalize_program(
    raw: &Value,
    options: &NormalizeOptions<'_>,
) -> Result<Program, NormalizeError> {
    let canonical = normalize_program_value(raw, options)?;
    Ok(serde_json::from_value(canonical)?)
}

/// Canonical JSON for a whole program, with error placeholders recovered.
pub fn normalize_program_value(
    raw: &Value,
    options: &NormalizeOptions<'_>,
) -> Result<Value, NormalizeError> {
    if !raw.is_object() {
        return Err(NormalizeError::NotAnObject(json_type_name(raw)));
    }

    let mut program = normalize_node(raw);
    match type_of(&program) {
        Some("Program") => {}
        other => return Err(NormalizeError::NotAProgram(other.unwrap_or("<none>").to_string())),
    }

    if let Some(Value::Array(body)) = program.get_mut("body") {
        for statement in body.iter_mut() {
            if type_of(statement) == Some("ErrorPlaceholder") {
                let recovered = recover_declaration(statement, options.source)?;
                warn!(
                    "Recovered declaration from unparsable source at line {}",
                    recovery::placeholder_line(statement)
                );
                *statement = recovered;
            }
        }
    }

    Ok(program)
}

// ============================================================================
// Per-type rewriting
// ============================================================================

fn copy_fields(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .filter(|(key, _)| !DROPPED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = if key == "loc" {
                value.clone()
            } else {
                normalize_node(value)
            };
            (key.clone(), value)
        })
        .collect()
}

fn unsupported(node_type: &str, map: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!("Unsupported"));
    out.insert("nodeType".into(), json!(node_type));
    if let Some(loc) = map.get("loc") {
        out.insert("loc".into(), loc.clone());
    }
    Value::Object(out)
}

fn normalize_typed(ty: &str, map: &Map<String, Value>) -> Value {
    match ty {
        "File" => match map.get("program") {
            Some(program) => normalize_node(program),
            None => unsupported(ty, map),
        },
        "ParenthesizedExpression" => match map.get("expression") {
            Some(inner) => normalize_node(inner),
            None => unsupported(ty, map),
        },
        "OptionalMemberExpression" | "OptionalCallExpression" => {
            let mut out = Map::new();
            out.insert("type".into(), json!("ChainExpression"));
            out.insert("expression".into(), unchain(map));
            if let Some(loc) = map.get("loc") {
                out.insert("loc".into(), loc.clone());
            }
            Value::Object(out)
        }
        "StringLiteral" | "NumericLiteral" | "BooleanLiteral" | "NullLiteral" => babel_literal(map),
        "Literal" if map.contains_key("regex") => unsupported("RegExpLiteral", map),
        "Literal" if map.contains_key("bigint") => unsupported("BigIntLiteral", map),
        "ObjectProperty" => {
            let mut out = copy_fields(map);
            out.insert("type".into(), json!("Property"));
            out.insert("kind".into(), json!("init"));
            out.insert("method".into(), json!(false));
            finish("Property", out)
        }
        "ObjectMethod" => {
            let kind = map.get("kind").and_then(Value::as_str).unwrap_or("method");
            let mut out = Map::new();
            out.insert("type".into(), json!("Property"));
            copy_keys(map, &mut out, &["key", "computed", "loc"]);
            out.insert("value".into(), function_value(map));
            out.insert("kind".into(), json!(if kind == "method" { "init" } else { kind }));
            out.insert("method".into(), json!(kind == "method"));
            out.insert("shorthand".into(), json!(false));
            finish("Property", out)
        }
        "ClassMethod" => {
            let mut out = Map::new();
            out.insert("type".into(), json!("MethodDefinition"));
            copy_keys(map, &mut out, &["key", "computed", "kind", "static", "loc"]);
            out.insert("value".into(), function_value(map));
            finish("MethodDefinition", out)
        }
        "ClassProperty" => {
            let mut out = copy_fields(map);
            out.insert("type".into(), json!("PropertyDefinition"));
            finish("PropertyDefinition", out)
        }
        "Program" => normalize_program_node(map),
        "BlockStatement" => {
            let mut out = copy_fields(map);
            out.remove("directives");
            if let Some(Value::Array(body)) = out.get_mut("body") {
                body.retain(|s| !is_directive_statement(s));
            }
            finish(ty, out)
        }
        _ if ERROR_TYPES.contains(&ty) => unsupported(ty, map),
        _ if CANONICAL_TYPES.contains(&ty) => {
            if ty == "Unsupported" {
                return Value::Object(map.clone());
            }
            finish(ty, copy_fields(map))
        }
        _ => unsupported(ty, map),
    }
}

fn copy_keys(from: &Map<String, Value>, to: &mut Map<String, Value>, keys: &[&str]) {
    for key in keys {
        if let Some(value) = from.get(*key) {
            let value = if *key == "loc" {
                value.clone()
            } else {
                normalize_node(value)
            };
            to.insert((*key).to_string(), value);
        }
    }
}

/// A Babel method node's function half as an ESTree `FunctionExpression`.
fn function_value(map: &Map<String, Value>) -> Value {
    let mut function = Map::new();
    function.insert("type".into(), json!("FunctionExpression"));
    function.insert("id".into(), Value::Null);
    copy_keys(map, &mut function, &["params", "body", "generator", "async", "loc"]);
    finish("FunctionExpression", function)
}

fn babel_literal(map: &Map<String, Value>) -> Value {
    let mut out = Map::new();
    out.insert("type".into(), json!("Literal"));
    let value = map.get("value").cloned().unwrap_or(Value::Null);
    if let Some(raw) = map
        .get("extra")
        .and_then(|extra| extra.get("raw"))
        .and_then(Value::as_str)
    {
        out.insert("raw".into(), json!(raw));
    }
    out.insert("value".into(), value);
    if let Some(loc) = map.get("loc") {
        out.insert("loc".into(), loc.clone());
    }
    finish("Literal", out)
}

/// Rewrite the spine of a Babel optional chain into plain member/call links
/// carrying `optional` flags.
fn unchain(map: &Map<String, Value>) -> Value {
    let ty = map.get("type").and_then(Value::as_str).unwrap_or_default();
    let (plain, spine) = match ty {
        "OptionalMemberExpression" => ("MemberExpression", "object"),
        "OptionalCallExpression" => ("CallExpression", "callee"),
        _ => return normalize_node(&Value::Object(map.clone())),
    };

    let mut out = Map::new();
    for (key, value) in map {
        if DROPPED_KEYS.contains(&key.as_str()) {
            continue;
        }
        let value = if key == "loc" {
            value.clone()
        } else if key == spine {
            match value {
                Value::Object(inner) if type_of(value).is_some_and(|t| t.starts_with("Optional")) => {
                    unchain(inner)
                }
                other => normalize_node(other),
            }
        } else {
            normalize_node(value)
        };
        out.insert(key.clone(), value);
    }
    out.insert("type".into(), json!(plain));
    finish(plain, out)
}

fn is_directive_statement(statement: &Value) -> bool {
    type_of(statement) == Some("ExpressionStatement")
        && statement.get("directive").and_then(Value::as_str).is_some()
}

fn normalize_program_node(map: &Map<String, Value>) -> Value {
    let mut directives = Vec::new();
    if let Some(Value::Array(items)) = map.get("directives") {
        for item in items {
            match item {
                Value::String(s) => directives.push(json!(s)),
                // Babel: { type: "Directive", value: { type: "DirectiveLiteral", value } }
                other => {
                    if let Some(text) = other
                        .get("value")
                        .and_then(|v| v.get("value"))
                        .and_then(Value::as_str)
                    {
                        directives.push(json!(text));
                    }
                }
            }
        }
    }

    let mut body = Vec::new();
    let mut in_prologue = true;
    if let Some(Value::Array(items)) = map.get("body") {
        for item in items {
            if in_prologue && is_directive_statement(item) {
                if let Some(text) = item.get("directive").and_then(Value::as_str) {
                    directives.push(json!(text));
                }
                continue;
            }
            in_prologue = false;
            match type_of(item) {
                Some(ty) if ERROR_TYPES.contains(&ty) => body.push(placeholder(item)),
                _ => body.push(normalize_node(item)),
            }
        }
    }

    let mut out = Map::new();
    out.insert("type".into(), json!("Program"));
    out.insert("body".into(), Value::Array(body));
    out.insert("directives".into(), Value::Array(directives));
    if let Some(loc) = map.get("loc") {
        out.insert("loc".into(), loc.clone());
    }
    Value::Object(out)
}

/// Top-level syntax error marker, keeping the byte span for recovery.
fn placeholder(raw: &Value) -> Value {
    let range = match raw.get("range") {
        Some(Value::Array(bounds)) if bounds.len() == 2 => Some(Value::Array(bounds.clone())),
        _ => match (raw.get("start"), raw.get("end")) {
            (Some(start), Some(end)) if start.is_u64() && end.is_u64() => {
                Some(json!([start, end]))
            }
            _ => None,
        },
    };

    let mut out = Map::new();
    out.insert("type".into(), json!("ErrorPlaceholder"));
    if let Some(range) = range {
        out.insert("range".into(), range);
    }
    if let Some(loc) = raw.get("loc") {
        out.insert("loc".into(), loc.clone());
    }
    Value::Object(out)
}

// ============================================================================
// Defaults
// ============================================================================

fn default_raw(value: &Value) -> String {
    match serde_json::from_value::<LiteralValue>(value.clone()) {
        Ok(literal) => literal.default_raw(),
        Err(_) => value.to_string(),
    }
}

/// Fill in the fields a parser may omit.
fn finish(ty: &str, mut out: Map<String, Value>) -> Value {
    let mut ensure = |key: &str, value: Value| {
        out.entry(key.to_string()).or_insert(value);
    };

    match ty {
        "VariableDeclaration" => {
            ensure("kind", json!("var"));
            ensure("declarations", json!([]));
        }
        "VariableDeclarator" => ensure("init", Value::Null),
        "MemberExpression" => {
            ensure("computed", json!(false));
            ensure("optional", json!(false));
        }
        "CallExpression" => {
            ensure("arguments", json!([]));
            ensure("optional", json!(false));
        }
        "NewExpression" => ensure("arguments", json!([])),
        "FunctionDeclaration" | "FunctionExpression" | "ArrowFunctionExpression" => {
            ensure("id", Value::Null);
            ensure("params", json!([]));
            ensure("generator", json!(false));
            ensure("async", json!(false));
        }
        "Property" => {
            ensure("kind", json!("init"));
            ensure("computed", json!(false));
            ensure("method", json!(false));
            ensure("shorthand", json!(false));
        }
        "MethodDefinition" => {
            ensure("kind", json!("method"));
            ensure("computed", json!(false));
            ensure("static", json!(false));
        }
        "PropertyDefinition" => {
            ensure("value", Value::Null);
            ensure("computed", json!(false));
            ensure("static", json!(false));
        }
        "Literal" => ensure("value", Value::Null),
        "ForOfStatement" => ensure("await", json!(false)),
        "ForStatement" => {
            ensure("init", Value::Null);
            ensure("test", Value::Null);
            ensure("update", Value::Null);
        }
        "ReturnStatement" => ensure("argument", Value::Null),
        "IfStatement" => ensure("alternate", Value::Null),
        "BreakStatement" | "ContinueStatement" => ensure("label", Value::Null),
        "TryStatement" => {
            ensure("handler", Value::Null);
            ensure("finalizer", Value::Null);
        }
        "CatchClause" => ensure("param", Value::Null),
        "SwitchCase" => ensure("test", Value::Null),
        "ClassDeclaration" => {
            ensure("id", Value::Null);
            ensure("superClass", Value::Null);
        }
        "UpdateExpression" => ensure("prefix", json!(false)),
        "TemplateElement" => ensure("tail", json!(false)),
        _ => {}
    }

    if ty == "Literal" && !out.contains_key("raw") {
        let raw = out.get("value").map(default_raw).unwrap_or_else(|| "null".into());
        out.insert("raw".into(), json!(raw));
    }

    if ty == "ArrowFunctionExpression" && !out.contains_key("expression") {
        let concise = out
            .get("body")
            .map(|body| type_of(body) != Some("BlockStatement"))
            .unwrap_or(false);
        out.insert("expression".into(), json!(concise));
    }

    if ty == "TemplateElement" {
        if let Some(Value::Object(value)) = out.get_mut("value") {
            if !value.get("cooked").is_some_and(Value::is_string) {
                let raw = value.get("raw").and_then(Value::as_str).unwrap_or_default();
                let cooked = lunate_syntax_javascript::unescape(raw);
                value.insert("cooked".into(), json!(cooked));
            }
        }
    }

    Value::Object(out)
}
