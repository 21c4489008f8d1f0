//! IR node kinds.
//!
//! Nodes reference each other only through [`NodeId`] handles into the node
//! table, never by direct ownership, which keeps the table append-only.

use crate::ids::{CfgId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Scalar literal value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl LiteralValue {
    /// Source-like rendering used when a literal has no raw text.
    pub fn default_raw(&self) -> String {
        match self {
            LiteralValue::Null => "null".to_string(),
            LiteralValue::Bool(b) => b.to_string(),
            LiteralValue::Number(n) => format_number(*n),
            LiteralValue::String(s) => {
                serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LiteralValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Render a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// `let`, `const` or `var`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclarationKind {
    Let,
    Const,
    Var,
}

/// Which half of a key/value pair a for-each loop iterates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Iteration {
    /// Sequence values in order (`for .. of`).
    Values,
    /// Table keys (`for .. in`).
    Keys,
}

/// Line/column of the source construct a node was lowered from (1-based line,
/// 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    pub line: u32,
    pub column: u32,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Auxiliary annotations attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    /// Set on the constructor function a class declaration lowers to.
    #[serde(default, skip_serializing_if = "is_false")]
    pub class_like: bool,
    /// Desugaring markers (`desugar:switch`, `wrapper:update`, ...).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub audit_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<SourceLoc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl NodeMeta {
    pub fn is_empty(&self) -> bool {
        !self.class_like && self.audit_tags.is_empty() && self.loc.is_none() && self.extra.is_empty()
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            audit_tags: vec![tag.into()],
            ..Self::default()
        }
    }

    pub fn at(loc: Option<SourceLoc>) -> Self {
        Self {
            loc,
            ..Self::default()
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.audit_tags.iter().any(|t| t == tag)
    }
}

/// One entry of the node table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "NodeMeta::is_empty")]
    pub meta: NodeMeta,
}

impl Node {
    pub fn kind_name(&self) -> &'static str {
        self.kind.kind_name()
    }
}

/// Every node kind the canonical IR can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum NodeKind {
    // Expressions
    Identifier {
        name: String,
    },
    Literal {
        value: LiteralValue,
        raw: String,
    },
    ArrayExpression {
        elements: Vec<NodeId>,
    },
    ObjectExpression {
        properties: Vec<NodeId>,
    },
    Property {
        key: NodeId,
        value: NodeId,
        computed: bool,
    },
    FunctionExpression {
        params: Vec<NodeId>,
        body: NodeId,
        vararg: bool,
        cfg: Option<CfgId>,
    },
    UnaryExpression {
        operator: String,
        argument: NodeId,
    },
    BinaryExpression {
        operator: String,
        left: NodeId,
        right: NodeId,
    },
    LogicalExpression {
        operator: String,
        left: NodeId,
        right: NodeId,
    },
    ConditionalExpression {
        test: NodeId,
        consequent: NodeId,
        alternate: NodeId,
    },
    MemberExpression {
        object: NodeId,
        property: NodeId,
        computed: bool,
    },
    CallExpression {
        callee: NodeId,
        arguments: Vec<NodeId>,
        method: bool,
    },
    NewExpression {
        callee: NodeId,
        arguments: Vec<NodeId>,
    },

    // Statements
    VariableDeclaration {
        declaration_kind: DeclarationKind,
        declarations: Vec<NodeId>,
    },
    VariableDeclarator {
        id: NodeId,
        init: Option<NodeId>,
    },
    FunctionDeclaration {
        name: NodeId,
        params: Vec<NodeId>,
        body: NodeId,
        vararg: bool,
        cfg: Option<CfgId>,
        super_class: Option<NodeId>,
    },
    AssignmentStatement {
        target: NodeId,
        value: NodeId,
    },
    ExpressionStatement {
        expression: NodeId,
    },
    ReturnStatement {
        argument: Option<NodeId>,
    },
    IfStatement {
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    },
    WhileStatement {
        test: NodeId,
        body: NodeId,
        update: Option<NodeId>,
    },
    DoWhileStatement {
        body: NodeId,
        test: NodeId,
    },
    ForEachStatement {
        iteration: Iteration,
        key: Option<NodeId>,
        value: Option<NodeId>,
        iterable: NodeId,
        body: NodeId,
    },
    BreakScope {
        body: NodeId,
    },
    BreakStatement,
    ContinueStatement,
    ThrowStatement {
        argument: NodeId,
    },
    ProtectedCall {
        status: NodeId,
        error: NodeId,
        callee: NodeId,
    },
    BlockStatement {
        body: Vec<NodeId>,
    },
}

/// Names of every node kind, in declaration order.
pub const NODE_KINDS: &[&str] = &[
    "Identifier",
    "Literal",
    "ArrayExpression",
    "ObjectExpression",
    "Property",
    "FunctionExpression",
    "UnaryExpression",
    "BinaryExpression",
    "LogicalExpression",
    "ConditionalExpression",
    "MemberExpression",
    "CallExpression",
    "NewExpression",
    "VariableDeclaration",
    "VariableDeclarator",
    "FunctionDeclaration",
    "AssignmentStatement",
    "ExpressionStatement",
    "ReturnStatement",
    "IfStatement",
    "WhileStatement",
    "DoWhileStatement",
    "ForEachStatement",
    "BreakScope",
    "BreakStatement",
    "ContinueStatement",
    "ThrowStatement",
    "ProtectedCall",
    "BlockStatement",
];

impl NodeKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::Identifier { .. } => "Identifier",
            NodeKind::Literal { .. } => "Literal",
            NodeKind::ArrayExpression { .. } => "ArrayExpression",
            NodeKind::ObjectExpression { .. } => "ObjectExpression",
            NodeKind::Property { .. } => "Property",
            NodeKind::FunctionExpression { .. } => "FunctionExpression",
            NodeKind::UnaryExpression { .. } => "UnaryExpression",
            NodeKind::BinaryExpression { .. } => "BinaryExpression",
            NodeKind::LogicalExpression { .. } => "LogicalExpression",
            NodeKind::ConditionalExpression { .. } => "ConditionalExpression",
            NodeKind::MemberExpression { .. } => "MemberExpression",
            NodeKind::CallExpression { .. } => "CallExpression",
            NodeKind::NewExpression { .. } => "NewExpression",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::VariableDeclarator { .. } => "VariableDeclarator",
            NodeKind::FunctionDeclaration { .. } => "FunctionDeclaration",
            NodeKind::AssignmentStatement { .. } => "AssignmentStatement",
            NodeKind::ExpressionStatement { .. } => "ExpressionStatement",
            NodeKind::ReturnStatement { .. } => "ReturnStatement",
            NodeKind::IfStatement { .. } => "IfStatement",
            NodeKind::WhileStatement { .. } => "WhileStatement",
            NodeKind::DoWhileStatement { .. } => "DoWhileStatement",
            NodeKind::ForEachStatement { .. } => "ForEachStatement",
            NodeKind::BreakScope { .. } => "BreakScope",
            NodeKind::BreakStatement => "BreakStatement",
            NodeKind::ContinueStatement => "ContinueStatement",
            NodeKind::ThrowStatement { .. } => "ThrowStatement",
            NodeKind::ProtectedCall { .. } => "ProtectedCall",
            NodeKind::BlockStatement { .. } => "BlockStatement",
        }
    }

    /// All node handles this node points at, in field order.
    pub fn references(&self) -> Vec<&NodeId> {
        let mut refs = Vec::new();
        match self {
            NodeKind::Identifier { .. }
            | NodeKind::Literal { .. }
            | NodeKind::BreakStatement
            | NodeKind::ContinueStatement => {}
            NodeKind::ArrayExpression { elements } => refs.extend(elements),
            NodeKind::ObjectExpression { properties } => refs.extend(properties),
            NodeKind::Property { key, value, .. } => refs.extend([key, value]),
            NodeKind::FunctionExpression { params, body, .. } => {
                refs.extend(params);
                refs.push(body);
            }
            NodeKind::UnaryExpression { argument, .. } => refs.push(argument),
            NodeKind::BinaryExpression { left, right, .. }
            | NodeKind::LogicalExpression { left, right, .. } => refs.extend([left, right]),
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => refs.extend([test, consequent, alternate]),
            NodeKind::MemberExpression {
                object, property, ..
            } => refs.extend([object, property]),
            NodeKind::CallExpression {
                callee, arguments, ..
            }
            | NodeKind::NewExpression { callee, arguments } => {
                refs.push(callee);
                refs.extend(arguments);
            }
            NodeKind::VariableDeclaration { declarations, .. } => refs.extend(declarations),
            NodeKind::VariableDeclarator { id, init } => {
                refs.push(id);
                refs.extend(init);
            }
            NodeKind::FunctionDeclaration {
                name,
                params,
                body,
                super_class,
                ..
            } => {
                refs.push(name);
                refs.extend(params);
                refs.push(body);
                refs.extend(super_class);
            }
            NodeKind::AssignmentStatement { target, value } => refs.extend([target, value]),
            NodeKind::ExpressionStatement { expression } => refs.push(expression),
            NodeKind::ReturnStatement { argument } => refs.extend(argument),
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                refs.extend([test, consequent]);
                refs.extend(alternate);
            }
            NodeKind::WhileStatement { test, body, update } => {
                refs.extend([test, body]);
                refs.extend(update);
            }
            NodeKind::DoWhileStatement { body, test } => refs.extend([body, test]),
            NodeKind::ForEachStatement {
                key,
                value,
                iterable,
                body,
                ..
            } => {
                refs.extend(key);
                refs.extend(value);
                refs.extend([iterable, body]);
            }
            NodeKind::BreakScope { body } => refs.push(body),
            NodeKind::ThrowStatement { argument } => refs.push(argument),
            NodeKind::ProtectedCall {
                status,
                error,
                callee,
            } => refs.extend([status, error, callee]),
            NodeKind::BlockStatement { body } => refs.extend(body),
        }
        refs
    }
}
