//! Tree-sitter CST to raw ESTree JSON.

use crate::literal::{parse_number, unescape};
use serde_json::{json, Value};
use thiserror::Error;
use tree_sitter::{Node, Parser};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to load the JavaScript grammar: {0}")]
    Language(String),

    #[error("parser produced no syntax tree")]
    NoTree,

    #[error("malformed {kind} at {line}:{column}: {message}")]
    Malformed {
        kind: String,
        message: String,
        line: usize,
        column: usize,
    },
}

/// Parse JavaScript source into an ESTree `Program`.
///
/// Every converted node carries `loc` (1-based lines, 0-based columns) and a
/// byte `range`. Top-level statements containing syntax errors become
/// `ErrorPlaceholder` nodes instead of failing the whole parse.
pub fn parse(source: &str) -> Result<Value, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_javascript::LANGUAGE.into())
        .map_err(|err| ParseError::Language(err.to_string()))?;

    let tree = parser.parse(source, None).ok_or(ParseError::NoTree)?;

    let ctx = EstreeContext::new(source);
    ctx.program(tree.root_node())
}

fn is_trivia(kind: &str) -> bool {
    matches!(kind, "comment" | "html_comment" | "hash_bang_line" | "decorator")
}

fn is_optional_chain(value: &Value) -> bool {
    value
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(|t| t.starts_with("Optional"))
}

struct EstreeContext<'a> {
    source: &'a str,
}

impl<'a> EstreeContext<'a> {
    fn new(source: &'a str) -> Self {
        Self { source }
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        self.source.get(start..end).unwrap_or("")
    }

    fn malformed(&self, node: Node, message: impl Into<String>) -> ParseError {
        let pos = node.start_position();
        ParseError::Malformed {
            kind: node.kind().to_string(),
            message: message.into(),
            line: pos.row + 1,
            column: pos.column,
        }
    }

    fn field<'t>(&self, node: Node<'t>, name: &str) -> Result<Node<'t>, ParseError> {
        node.child_by_field_name(name)
            .ok_or_else(|| self.malformed(node, format!("missing '{}'", name)))
    }

    fn named_children<'t>(&self, node: Node<'t>) -> Vec<Node<'t>> {
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node
            .named_children(&mut cursor)
            .filter(|child| !is_trivia(child.kind()))
            .collect();
        children
    }

    fn first_named<'t>(&self, node: Node<'t>) -> Result<Node<'t>, ParseError> {
        self.named_children(node)
            .into_iter()
            .next()
            .ok_or_else(|| self.malformed(node, "empty node"))
    }

    /// Whether `node` has an anonymous child token with exactly this text.
    fn has_token(&self, node: Node, token: &str) -> bool {
        let mut cursor = node.walk();
        let found = node
            .children(&mut cursor)
            .any(|child| !child.is_named() && child.kind() == token);
        found
    }

    fn has_optional_link(&self, node: Node) -> bool {
        if node.child_by_field_name("optional_chain").is_some() {
            return true;
        }
        let mut cursor = node.walk();
        let found = node
            .children(&mut cursor)
            .any(|child| child.kind() == "optional_chain" || child.kind() == "?.");
        found
    }

    /// Attach `loc` and `range` to a freshly built node.
    fn located(&self, node: Node, mut value: Value) -> Value {
        if let Value::Object(map) = &mut value {
            let start = node.start_position();
            let end = node.end_position();
            map.insert(
                "loc".into(),
                json!({
                    "start": { "line": start.row + 1, "column": start.column },
                    "end": { "line": end.row + 1, "column": end.column },
                }),
            );
            map.insert(
                "range".into(),
                json!([node.start_byte(), node.end_byte()]),
            );
        }
        value
    }

    fn unknown(&self, node: Node) -> Value {
        self.located(node, json!({ "type": node.kind() }))
    }

    // ========================================================================
    // Program and statements
    // ========================================================================

    fn program(&self, root: Node) -> Result<Value, ParseError> {
        let body = self.statement_list(self.named_children(root), true, true)?;
        Ok(self.located(
            root,
            json!({ "type": "Program", "sourceType": "script", "body": body }),
        ))
    }

    /// Convert a statement sequence, marking the directive prologue.
    fn statement_list(
        &self,
        nodes: Vec<Node>,
        directives: bool,
        top_level: bool,
    ) -> Result<Vec<Value>, ParseError> {
        let mut statements = Vec::with_capacity(nodes.len());
        let mut in_prologue = directives;

        for node in nodes {
            if top_level && (node.is_error() || node.has_error()) {
                statements.push(self.located(node, json!({ "type": "ErrorPlaceholder" })));
                in_prologue = false;
                continue;
            }

            let mut statement = self.statement(node)?;
            if in_prologue {
                match self.directive_text(node) {
                    Some(directive) => {
                        statement["directive"] = Value::String(directive.to_string());
                    }
                    None => in_prologue = false,
                }
            }
            statements.push(statement);
        }

        Ok(statements)
    }

    fn directive_text(&self, node: Node) -> Option<&'a str> {
        if node.kind() != "expression_statement" {
            return None;
        }
        let children = self.named_children(node);
        match children.as_slice() {
            [only] if only.kind() == "string" => {
                let text = self.text(*only);
                text.get(1..text.len().saturating_sub(1))
            }
            _ => None,
        }
    }

    fn statement(&self, node: Node) -> Result<Value, ParseError> {
        let value = match node.kind() {
            "expression_statement" => {
                let expression = self.expression(self.first_named(node)?)?;
                json!({ "type": "ExpressionStatement", "expression": expression })
            }
            "lexical_declaration" | "variable_declaration" => self.variable_declaration(node)?,
            "function_declaration" | "generator_function_declaration" => {
                return self.function(node, "FunctionDeclaration");
            }
            "class_declaration" => return self.class(node, "ClassDeclaration"),
            "if_statement" => self.if_statement(node)?,
            "while_statement" => {
                let test = self.condition(self.field(node, "condition")?)?;
                let body = self.statement(self.field(node, "body")?)?;
                json!({ "type": "WhileStatement", "test": test, "body": body })
            }
            "do_statement" => {
                let body = self.statement(self.field(node, "body")?)?;
                let test = self.condition(self.field(node, "condition")?)?;
                json!({ "type": "DoWhileStatement", "body": body, "test": test })
            }
            "for_statement" => self.for_statement(node)?,
            "for_in_statement" => self.for_in_statement(node)?,
            "switch_statement" => self.switch_statement(node)?,
            "try_statement" => self.try_statement(node)?,
            "throw_statement" => {
                let argument = self.expression(self.first_named(node)?)?;
                json!({ "type": "ThrowStatement", "argument": argument })
            }
            "return_statement" => {
                let argument = match self.named_children(node).first() {
                    Some(child) => self.expression(*child)?,
                    None => Value::Null,
                };
                json!({ "type": "ReturnStatement", "argument": argument })
            }
            "break_statement" | "continue_statement" => {
                let label = node
                    .child_by_field_name("label")
                    .map(|label| self.identifier(label));
                let kind = if node.kind() == "break_statement" {
                    "BreakStatement"
                } else {
                    "ContinueStatement"
                };
                json!({ "type": kind, "label": label })
            }
            "statement_block" => return self.block(node, false),
            "empty_statement" => json!({ "type": "EmptyStatement" }),
            "labeled_statement" => {
                let label = self.identifier(self.field(node, "label")?);
                let body = self.statement(self.field(node, "body")?)?;
                json!({ "type": "LabeledStatement", "label": label, "body": body })
            }
            "debugger_statement" => json!({ "type": "DebuggerStatement" }),
            "with_statement" => json!({ "type": "WithStatement" }),
            "import_statement" => json!({ "type": "ImportDeclaration" }),
            "export_statement" => json!({ "type": "ExportNamedDeclaration" }),
            _ => return Ok(self.unknown(node)),
        };
        Ok(self.located(node, value))
    }

    fn block(&self, node: Node, directives: bool) -> Result<Value, ParseError> {
        let body = self.statement_list(self.named_children(node), directives, false)?;
        Ok(self.located(node, json!({ "type": "BlockStatement", "body": body })))
    }

    /// Unwrap the parentheses around `if`/`while`/`switch` heads.
    fn condition(&self, node: Node) -> Result<Value, ParseError> {
        if node.kind() == "parenthesized_expression" {
            self.expression(self.first_named(node)?)
        } else {
            self.expression(node)
        }
    }

    fn variable_declaration(&self, node: Node) -> Result<Value, ParseError> {
        let kind = match node.child_by_field_name("kind") {
            Some(kind) => self.text(kind),
            None if node.kind() == "variable_declaration" => "var",
            None => {
                let mut cursor = node.walk();
                let first = node.children(&mut cursor).next();
                first.map(|n| self.text(n)).unwrap_or("let")
            }
        };

        let mut declarations = Vec::new();
        for child in self.named_children(node) {
            if child.kind() != "variable_declarator" {
                continue;
            }
            let id = self.pattern(self.field(child, "name")?)?;
            let init = match child.child_by_field_name("value") {
                Some(value) => self.expression(value)?,
                None => Value::Null,
            };
            declarations.push(self.located(
                child,
                json!({ "type": "VariableDeclarator", "id": id, "init": init }),
            ));
        }

        Ok(json!({
            "type": "VariableDeclaration",
            "kind": kind,
            "declarations": declarations,
        }))
    }

    fn if_statement(&self, node: Node) -> Result<Value, ParseError> {
        let test = self.condition(self.field(node, "condition")?)?;
        let consequent = self.statement(self.field(node, "consequence")?)?;
        let alternate = match node.child_by_field_name("alternative") {
            // else_clause: "else" keyword + body (statement_block or if_statement)
            Some(clause) => self.statement(self.first_named(clause)?)?,
            None => Value::Null,
        };
        Ok(json!({
            "type": "IfStatement",
            "test": test,
            "consequent": consequent,
            "alternate": alternate,
        }))
    }

    fn for_statement(&self, node: Node) -> Result<Value, ParseError> {
        let init = match node.child_by_field_name("initializer") {
            Some(init) => match init.kind() {
                "lexical_declaration" | "variable_declaration" => self.statement(init)?,
                _ => self.optional_clause(init)?,
            },
            None => Value::Null,
        };
        let test = match node.child_by_field_name("condition") {
            Some(cond) => self.optional_clause(cond)?,
            None => Value::Null,
        };
        let update = match node.child_by_field_name("increment") {
            Some(inc) => self.expression(inc)?,
            None => Value::Null,
        };
        let body = self.statement(self.field(node, "body")?)?;
        Ok(json!({
            "type": "ForStatement",
            "init": init,
            "test": test,
            "update": update,
            "body": body,
        }))
    }

    /// A `for` header slot: an expression, an expression statement or `;`.
    fn optional_clause(&self, node: Node) -> Result<Value, ParseError> {
        match node.kind() {
            _ if !node.is_named() => Ok(Value::Null),
            "empty_statement" => Ok(Value::Null),
            "expression_statement" => self.expression(self.first_named(node)?),
            _ => self.expression(node),
        }
    }

    fn for_in_statement(&self, node: Node) -> Result<Value, ParseError> {
        let left_node = self.field(node, "left")?;
        let operator = match node.child_by_field_name("operator") {
            Some(op) => self.text(op),
            None if self.has_token(node, "in") => "in",
            None => "of",
        };

        let left = match node.child_by_field_name("kind") {
            Some(kind) => {
                let id = self.pattern(left_node)?;
                json!({
                    "type": "VariableDeclaration",
                    "kind": self.text(kind),
                    "declarations": [
                        self.located(left_node, json!({ "type": "VariableDeclarator", "id": id, "init": null })),
                    ],
                })
            }
            None => match left_node.kind() {
                "lexical_declaration" | "variable_declaration" => self.statement(left_node)?,
                _ => self.pattern(left_node)?,
            },
        };

        let right = self.expression(self.field(node, "right")?)?;
        let body = self.statement(self.field(node, "body")?)?;

        Ok(if operator == "in" {
            json!({ "type": "ForInStatement", "left": left, "right": right, "body": body })
        } else {
            json!({
                "type": "ForOfStatement",
                "left": left,
                "right": right,
                "body": body,
                "await": self.has_token(node, "await"),
            })
        })
    }

    fn switch_statement(&self, node: Node) -> Result<Value, ParseError> {
        let discriminant = self.condition(self.field(node, "value")?)?;
        let body = self.field(node, "body")?;

        let mut cases = Vec::new();
        for case in self.named_children(body) {
            let value_node = case.child_by_field_name("value");
            let test = match (case.kind(), value_node) {
                ("switch_case", Some(value)) => self.expression(value)?,
                ("switch_default", _) => Value::Null,
                _ => return Err(self.malformed(case, "expected switch case")),
            };
            let skip = value_node.map(|n| n.id());
            let statements: Vec<Node> = self
                .named_children(case)
                .into_iter()
                .filter(|child| Some(child.id()) != skip)
                .collect();
            let consequent = self.statement_list(statements, false, false)?;
            cases.push(self.located(
                case,
                json!({ "type": "SwitchCase", "test": test, "consequent": consequent }),
            ));
        }

        Ok(json!({
            "type": "SwitchStatement",
            "discriminant": discriminant,
            "cases": cases,
        }))
    }

    fn try_statement(&self, node: Node) -> Result<Value, ParseError> {
        let block = self.block(self.field(node, "body")?, false)?;
        let handler = match node.child_by_field_name("handler") {
            Some(clause) => {
                let param = match clause.child_by_field_name("parameter") {
                    Some(param) => self.pattern(param)?,
                    None => Value::Null,
                };
                let body = self.block(self.field(clause, "body")?, false)?;
                self.located(
                    clause,
                    json!({ "type": "CatchClause", "param": param, "body": body }),
                )
            }
            None => Value::Null,
        };
        let finalizer = match node.child_by_field_name("finalizer") {
            Some(clause) => self.block(self.field(clause, "body")?, false)?,
            None => Value::Null,
        };
        Ok(json!({
            "type": "TryStatement",
            "block": block,
            "handler": handler,
            "finalizer": finalizer,
        }))
    }

    // ========================================================================
    // Functions and classes
    // ========================================================================

    fn function(&self, node: Node, ty: &str) -> Result<Value, ParseError> {
        let id = node
            .child_by_field_name("name")
            .map(|name| self.identifier(name));
        let params = self.params(self.field(node, "parameters")?)?;
        let body = self.block(self.field(node, "body")?, true)?;
        let generator = node.kind().starts_with("generator") || self.has_token(node, "*");
        Ok(self.located(
            node,
            json!({
                "type": ty,
                "id": id,
                "params": params,
                "body": body,
                "generator": generator,
                "async": self.has_token(node, "async"),
                "expression": false,
            }),
        ))
    }

    fn params(&self, node: Node) -> Result<Vec<Value>, ParseError> {
        self.named_children(node)
            .into_iter()
            .map(|param| self.pattern(param))
            .collect()
    }

    fn arrow_function(&self, node: Node) -> Result<Value, ParseError> {
        let params = if let Some(param) = node.child_by_field_name("parameter") {
            vec![self.pattern(param)?]
        } else if let Some(params) = node.child_by_field_name("parameters") {
            self.params(params)?
        } else {
            Vec::new()
        };

        let body_node = self.field(node, "body")?;
        let (body, expression) = if body_node.kind() == "statement_block" {
            (self.block(body_node, true)?, false)
        } else {
            (self.expression(body_node)?, true)
        };

        Ok(json!({
            "type": "ArrowFunctionExpression",
            "id": null,
            "params": params,
            "body": body,
            "generator": false,
            "async": self.has_token(node, "async"),
            "expression": expression,
        }))
    }

    fn class(&self, node: Node, ty: &str) -> Result<Value, ParseError> {
        let id = node
            .child_by_field_name("name")
            .map(|name| self.identifier(name));

        let mut super_class = Value::Null;
        for child in self.named_children(node) {
            if child.kind() == "class_heritage" {
                super_class = self.expression(self.first_named(child)?)?;
            }
        }

        let body_node = self.field(node, "body")?;
        let mut members = Vec::new();
        for member in self.named_children(body_node) {
            let value = match member.kind() {
                "method_definition" => self.method_definition(member)?,
                "field_definition" => {
                    let (key, computed) = self.property_key(self.field(member, "property")?)?;
                    let value = match member.child_by_field_name("value") {
                        Some(value) => self.expression(value)?,
                        None => Value::Null,
                    };
                    json!({
                        "type": "PropertyDefinition",
                        "key": key,
                        "value": value,
                        "computed": computed,
                        "static": self.has_token(member, "static"),
                    })
                }
                "class_static_block" => json!({ "type": "StaticBlock" }),
                _ => {
                    members.push(self.unknown(member));
                    continue;
                }
            };
            members.push(self.located(member, value));
        }

        Ok(self.located(
            node,
            json!({
                "type": ty,
                "id": id,
                "superClass": super_class,
                "body": self.located(body_node, json!({ "type": "ClassBody", "body": members })),
            }),
        ))
    }

    fn method_kind(&self, node: Node) -> &'static str {
        if self.has_token(node, "get") {
            "get"
        } else if self.has_token(node, "set") {
            "set"
        } else {
            "method"
        }
    }

    fn method_value(&self, node: Node) -> Result<Value, ParseError> {
        let params = self.params(self.field(node, "parameters")?)?;
        let body = self.block(self.field(node, "body")?, true)?;
        Ok(self.located(
            node,
            json!({
                "type": "FunctionExpression",
                "id": null,
                "params": params,
                "body": body,
                "generator": self.has_token(node, "*"),
                "async": self.has_token(node, "async"),
                "expression": false,
            }),
        ))
    }

    fn method_definition(&self, node: Node) -> Result<Value, ParseError> {
        let name = self.field(node, "name")?;
        let (key, computed) = self.property_key(name)?;
        let is_static = self.has_token(node, "static");
        let mut kind = self.method_kind(node);
        if kind == "method" && !computed && !is_static && self.text(name) == "constructor" {
            kind = "constructor";
        }
        Ok(json!({
            "type": "MethodDefinition",
            "key": key,
            "computed": computed,
            "kind": kind,
            "static": is_static,
            "value": self.method_value(node)?,
        }))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn identifier(&self, node: Node) -> Value {
        self.located(node, json!({ "type": "Identifier", "name": self.text(node) }))
    }

    fn property_key(&self, node: Node) -> Result<(Value, bool), ParseError> {
        match node.kind() {
            "property_identifier"
            | "identifier"
            | "shorthand_property_identifier"
            | "shorthand_property_identifier_pattern" => Ok((self.identifier(node), false)),
            "computed_property_name" => Ok((self.expression(self.first_named(node)?)?, true)),
            "private_property_identifier" => Ok((
                self.located(node, json!({ "type": "PrivateName", "name": self.text(node) })),
                false,
            )),
            _ => Ok((self.expression(node)?, false)),
        }
    }

    fn expression(&self, node: Node) -> Result<Value, ParseError> {
        let value = match node.kind() {
            "identifier" | "undefined" => return Ok(self.identifier(node)),
            "this" => json!({ "type": "ThisExpression" }),
            "super" => json!({ "type": "Super" }),
            "true" => json!({ "type": "Literal", "value": true, "raw": "true" }),
            "false" => json!({ "type": "Literal", "value": false, "raw": "false" }),
            "null" => json!({ "type": "Literal", "value": null, "raw": "null" }),
            "number" => {
                let raw = self.text(node);
                match parse_number(raw) {
                    Some(n) => json!({ "type": "Literal", "value": n, "raw": raw }),
                    None => json!({ "type": "BigIntLiteral", "raw": raw }),
                }
            }
            "string" => {
                let raw = self.text(node);
                let inner = raw.get(1..raw.len().saturating_sub(1)).unwrap_or("");
                json!({ "type": "Literal", "value": unescape(inner), "raw": raw })
            }
            "template_string" => self.template_literal(node)?,
            "regex" => json!({ "type": "RegExpLiteral", "raw": self.text(node) }),
            "array" => {
                let elements = self.elements(node, |child| self.expression(child))?;
                json!({ "type": "ArrayExpression", "elements": elements })
            }
            "object" => self.object(node)?,
            "function" | "function_expression" | "generator_function" => {
                return self.function(node, "FunctionExpression");
            }
            "arrow_function" => self.arrow_function(node)?,
            "class" => return self.class(node, "ClassExpression"),
            "call_expression" => self.call(node)?,
            "new_expression" => {
                let callee = self.expression(self.field(node, "constructor")?)?;
                let arguments = match node.child_by_field_name("arguments") {
                    Some(args) => self.arguments(args)?,
                    None => Vec::new(),
                };
                json!({ "type": "NewExpression", "callee": callee, "arguments": arguments })
            }
            "member_expression" => {
                let object = self.expression(self.field(node, "object")?)?;
                let property_node = self.field(node, "property")?;
                let (property, _) = self.property_key(property_node)?;
                self.member(node, object, property, false)
            }
            "subscript_expression" => {
                let object = self.expression(self.field(node, "object")?)?;
                let property = self.expression(self.field(node, "index")?)?;
                self.member(node, object, property, true)
            }
            "assignment_expression" | "augmented_assignment_expression" => {
                let operator = match node.child_by_field_name("operator") {
                    Some(op) => self.text(op),
                    None => "=",
                };
                let left = self.pattern(self.field(node, "left")?)?;
                let right = self.expression(self.field(node, "right")?)?;
                json!({
                    "type": "AssignmentExpression",
                    "operator": operator,
                    "left": left,
                    "right": right,
                })
            }
            "binary_expression" => {
                let operator = self.text(self.field(node, "operator")?);
                let left = self.expression(self.field(node, "left")?)?;
                let right = self.expression(self.field(node, "right")?)?;
                let ty = if matches!(operator, "&&" | "||" | "??") {
                    "LogicalExpression"
                } else {
                    "BinaryExpression"
                };
                json!({ "type": ty, "operator": operator, "left": left, "right": right })
            }
            "unary_expression" => {
                let operator = self.text(self.field(node, "operator")?);
                let argument = self.expression(self.field(node, "argument")?)?;
                json!({
                    "type": "UnaryExpression",
                    "operator": operator,
                    "argument": argument,
                    "prefix": true,
                })
            }
            "update_expression" => {
                let operator_node = self.field(node, "operator")?;
                let argument_node = self.field(node, "argument")?;
                let prefix = operator_node.start_byte() < argument_node.start_byte();
                json!({
                    "type": "UpdateExpression",
                    "operator": self.text(operator_node),
                    "argument": self.expression(argument_node)?,
                    "prefix": prefix,
                })
            }
            "ternary_expression" => {
                let test = self.expression(self.field(node, "condition")?)?;
                let consequent = self.expression(self.field(node, "consequence")?)?;
                let alternate = self.expression(self.field(node, "alternative")?)?;
                json!({
                    "type": "ConditionalExpression",
                    "test": test,
                    "consequent": consequent,
                    "alternate": alternate,
                })
            }
            "parenthesized_expression" => {
                let expression = self.expression(self.first_named(node)?)?;
                json!({ "type": "ParenthesizedExpression", "expression": expression })
            }
            "sequence_expression" => {
                let mut expressions = Vec::new();
                self.flatten_sequence(node, &mut expressions)?;
                json!({ "type": "SequenceExpression", "expressions": expressions })
            }
            "spread_element" => {
                let argument = self.expression(self.first_named(node)?)?;
                json!({ "type": "SpreadElement", "argument": argument })
            }
            "await_expression" => json!({ "type": "AwaitExpression" }),
            "yield_expression" => json!({ "type": "YieldExpression" }),
            "meta_property" => json!({ "type": "MetaProperty" }),
            "object_pattern" | "array_pattern" | "assignment_pattern" | "rest_pattern" => {
                return self.pattern(node);
            }
            _ => return Ok(self.unknown(node)),
        };
        Ok(self.located(node, value))
    }

    fn flatten_sequence(&self, node: Node, out: &mut Vec<Value>) -> Result<(), ParseError> {
        for child in self.named_children(node) {
            if child.kind() == "sequence_expression" {
                self.flatten_sequence(child, out)?;
            } else {
                out.push(self.expression(child)?);
            }
        }
        Ok(())
    }

    /// Member access; links after an optional link keep the Babel
    /// `OptionalMemberExpression` shape so the chain extent survives.
    fn member(&self, node: Node, object: Value, property: Value, computed: bool) -> Value {
        let optional = self.has_optional_link(node);
        let ty = if optional || is_optional_chain(&object) {
            "OptionalMemberExpression"
        } else {
            "MemberExpression"
        };
        json!({
            "type": ty,
            "object": object,
            "property": property,
            "computed": computed,
            "optional": optional,
        })
    }

    fn call(&self, node: Node) -> Result<Value, ParseError> {
        let callee = self.expression(self.field(node, "function")?)?;
        let args_node = self.field(node, "arguments")?;
        if args_node.kind() == "template_string" {
            return Ok(json!({ "type": "TaggedTemplateExpression" }));
        }
        let arguments = self.arguments(args_node)?;
        let optional = self.has_optional_link(node);
        let ty = if optional || is_optional_chain(&callee) {
            "OptionalCallExpression"
        } else {
            "CallExpression"
        };
        Ok(json!({
            "type": ty,
            "callee": callee,
            "arguments": arguments,
            "optional": optional,
        }))
    }

    fn arguments(&self, node: Node) -> Result<Vec<Value>, ParseError> {
        self.named_children(node)
            .into_iter()
            .map(|arg| self.expression(arg))
            .collect()
    }

    /// Array elements with holes (`[a, , b]`) as JSON `null`.
    fn elements<F>(&self, node: Node, mut convert: F) -> Result<Vec<Value>, ParseError>
    where
        F: FnMut(Node) -> Result<Value, ParseError>,
    {
        let mut elements = Vec::new();
        let mut seen_element = false;
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "[" | "]" => {}
                "," => {
                    if !seen_element {
                        elements.push(Value::Null);
                    }
                    seen_element = false;
                }
                kind if is_trivia(kind) => {}
                _ => {
                    elements.push(convert(child)?);
                    seen_element = true;
                }
            }
        }
        Ok(elements)
    }

    fn object(&self, node: Node) -> Result<Value, ParseError> {
        let mut properties = Vec::new();
        for child in self.named_children(node) {
            let property = match child.kind() {
                "pair" => {
                    let (key, computed) = self.property_key(self.field(child, "key")?)?;
                    let value = self.expression(self.field(child, "value")?)?;
                    json!({
                        "type": "Property",
                        "key": key,
                        "value": value,
                        "computed": computed,
                        "kind": "init",
                        "method": false,
                        "shorthand": false,
                    })
                }
                "shorthand_property_identifier" => json!({
                    "type": "Property",
                    "key": self.identifier(child),
                    "value": self.identifier(child),
                    "computed": false,
                    "kind": "init",
                    "method": false,
                    "shorthand": true,
                }),
                "method_definition" => {
                    let (key, computed) = self.property_key(self.field(child, "name")?)?;
                    let kind = match self.method_kind(child) {
                        "method" => "init",
                        accessor => accessor,
                    };
                    json!({
                        "type": "Property",
                        "key": key,
                        "value": self.method_value(child)?,
                        "computed": computed,
                        "kind": kind,
                        "method": kind == "init",
                        "shorthand": false,
                    })
                }
                "spread_element" => {
                    let argument = self.expression(self.first_named(child)?)?;
                    json!({ "type": "SpreadElement", "argument": argument })
                }
                _ => {
                    properties.push(self.unknown(child));
                    continue;
                }
            };
            properties.push(self.located(child, property));
        }
        Ok(json!({ "type": "ObjectExpression", "properties": properties }))
    }

    fn template_literal(&self, node: Node) -> Result<Value, ParseError> {
        let end = node.end_byte().saturating_sub(1);
        let mut cursor_pos = node.start_byte() + 1;
        let mut quasis = Vec::new();
        let mut expressions = Vec::new();

        for child in self.named_children(node) {
            if child.kind() != "template_substitution" {
                continue;
            }
            quasis.push(self.template_element(cursor_pos, child.start_byte(), false));
            expressions.push(self.expression(self.first_named(child)?)?);
            cursor_pos = child.end_byte();
        }
        quasis.push(self.template_element(cursor_pos, end.max(cursor_pos), true));

        Ok(json!({
            "type": "TemplateLiteral",
            "quasis": quasis,
            "expressions": expressions,
        }))
    }

    fn template_element(&self, start: usize, end: usize, tail: bool) -> Value {
        let raw = self.slice(start, end);
        json!({
            "type": "TemplateElement",
            "value": { "raw": raw, "cooked": unescape(raw) },
            "tail": tail,
        })
    }

    // ========================================================================
    // Patterns
    // ========================================================================

    fn pattern(&self, node: Node) -> Result<Value, ParseError> {
        let value = match node.kind() {
            "identifier"
            | "undefined"
            | "shorthand_property_identifier_pattern"
            | "shorthand_property_identifier" => return Ok(self.identifier(node)),
            "object_pattern" | "object" => self.object_pattern(node)?,
            "array_pattern" | "array" => {
                let elements = self.elements(node, |child| self.pattern(child))?;
                json!({ "type": "ArrayPattern", "elements": elements })
            }
            "assignment_pattern" => {
                let left = self.pattern(self.field(node, "left")?)?;
                let right = self.expression(self.field(node, "right")?)?;
                json!({ "type": "AssignmentPattern", "left": left, "right": right })
            }
            "rest_pattern" | "spread_element" => {
                let argument = self.pattern(self.first_named(node)?)?;
                json!({ "type": "RestElement", "argument": argument })
            }
            _ => return self.expression(node),
        };
        Ok(self.located(node, value))
    }

    fn object_pattern(&self, node: Node) -> Result<Value, ParseError> {
        let mut properties = Vec::new();
        for child in self.named_children(node) {
            let property = match child.kind() {
                "pair_pattern" | "pair" => {
                    let (key, computed) = self.property_key(self.field(child, "key")?)?;
                    let value = self.pattern(self.field(child, "value")?)?;
                    json!({
                        "type": "Property",
                        "key": key,
                        "value": value,
                        "computed": computed,
                        "kind": "init",
                        "method": false,
                        "shorthand": false,
                    })
                }
                "shorthand_property_identifier_pattern" | "shorthand_property_identifier" => {
                    json!({
                        "type": "Property",
                        "key": self.identifier(child),
                        "value": self.identifier(child),
                        "computed": false,
                        "kind": "init",
                        "method": false,
                        "shorthand": true,
                    })
                }
                "object_assignment_pattern" => {
                    let left = self.field(child, "left")?;
                    let right = self.expression(self.field(child, "right")?)?;
                    let target = self.pattern(left)?;
                    json!({
                        "type": "Property",
                        "key": self.identifier(left),
                        "value": self.located(
                            child,
                            json!({ "type": "AssignmentPattern", "left": target, "right": right }),
                        ),
                        "computed": false,
                        "kind": "init",
                        "method": false,
                        "shorthand": true,
                    })
                }
                "rest_pattern" | "spread_element" => {
                    let argument = self.pattern(self.first_named(child)?)?;
                    json!({ "type": "RestElement", "argument": argument })
                }
                _ => {
                    properties.push(self.unknown(child));
                    continue;
                }
            };
            properties.push(self.located(child, property));
        }
        Ok(json!({ "type": "ObjectPattern", "properties": properties }))
    }
}
