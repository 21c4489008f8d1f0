//! Node table builder.
//!
//! Every constructor allocates exactly one fresh node ID and inserts one node.
//! Existing nodes are never touched, so the table only ever grows.

use crate::cfg::ControlFlowGraph;
use crate::document::{IrDocument, Module, SourceDescriptor};
use crate::ids::{BlockId, CfgId, IdGenerator, NodeId};
use crate::node::{DeclarationKind, LiteralValue, Node, NodeKind, NodeMeta};
use crate::validation::{validate_ir, ValidationError};
use crate::SCHEMA_VERSION;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors reported by [`IrBuilder::build`].
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IR failed validation: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },

    #[error("validator failed: {0}")]
    Validator(#[from] ValidationError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Run the validator before handing out the document.
    pub validate: bool,
}

/// Optional parts of a function declaration.
#[derive(Debug, Clone, Default)]
pub struct FunctionOptions {
    pub vararg: bool,
    pub cfg: Option<CfgId>,
    pub super_class: Option<NodeId>,
    pub meta: NodeMeta,
}

/// Authoring side of the node table for one compilation.
#[derive(Debug)]
pub struct IrBuilder {
    ids: IdGenerator,
    nodes: BTreeMap<NodeId, Node>,
    graphs: BTreeMap<CfgId, ControlFlowGraph>,
    body: Vec<NodeId>,
    directives: Vec<String>,
    metadata: BTreeMap<String, Value>,
    source: SourceDescriptor,
}

impl IrBuilder {
    pub fn new(source: SourceDescriptor) -> Self {
        Self {
            ids: IdGenerator::new(),
            nodes: BTreeMap::new(),
            graphs: BTreeMap::new(),
            body: Vec::new(),
            directives: Vec::new(),
            metadata: BTreeMap::new(),
            source,
        }
    }

    /// Insert a node of any kind.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.add_with_meta(kind, NodeMeta::default())
    }

    pub fn add_with_meta(&mut self, kind: NodeKind, meta: NodeMeta) -> NodeId {
        let id = self.ids.next_node();
        self.nodes.insert(id.clone(), Node { kind, meta });
        id
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    pub fn identifier(&mut self, name: impl Into<String>) -> NodeId {
        self.add(NodeKind::Identifier { name: name.into() })
    }

    pub fn literal(&mut self, value: LiteralValue) -> NodeId {
        let raw = value.default_raw();
        self.add(NodeKind::Literal { value, raw })
    }

    pub fn literal_with_raw(&mut self, value: LiteralValue, raw: impl Into<String>) -> NodeId {
        self.add(NodeKind::Literal {
            value,
            raw: raw.into(),
        })
    }

    pub fn number(&mut self, n: f64) -> NodeId {
        self.literal(LiteralValue::Number(n))
    }

    pub fn string(&mut self, s: impl Into<String>) -> NodeId {
        self.literal(LiteralValue::String(s.into()))
    }

    pub fn null(&mut self) -> NodeId {
        self.literal(LiteralValue::Null)
    }

    pub fn binary_expression(
        &mut self,
        left: NodeId,
        operator: impl Into<String>,
        right: NodeId,
    ) -> NodeId {
        self.add(NodeKind::BinaryExpression {
            operator: operator.into(),
            left,
            right,
        })
    }

    pub fn logical_expression(
        &mut self,
        left: NodeId,
        operator: impl Into<String>,
        right: NodeId,
    ) -> NodeId {
        self.add(NodeKind::LogicalExpression {
            operator: operator.into(),
            left,
            right,
        })
    }

    pub fn unary_expression(&mut self, operator: impl Into<String>, argument: NodeId) -> NodeId {
        self.add(NodeKind::UnaryExpression {
            operator: operator.into(),
            argument,
        })
    }

    pub fn member_expression(&mut self, object: NodeId, property: NodeId, computed: bool) -> NodeId {
        self.add(NodeKind::MemberExpression {
            object,
            property,
            computed,
        })
    }

    /// `object.name`
    pub fn dot(&mut self, object: NodeId, name: &str) -> NodeId {
        let property = self.identifier(name);
        self.member_expression(object, property, false)
    }

    pub fn call_expression(&mut self, callee: NodeId, arguments: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::CallExpression {
            callee,
            arguments,
            method: false,
        })
    }

    pub fn function_expression(
        &mut self,
        params: Vec<NodeId>,
        body: NodeId,
        vararg: bool,
        cfg: Option<CfgId>,
    ) -> NodeId {
        self.add(NodeKind::FunctionExpression {
            params,
            body,
            vararg,
            cfg,
        })
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub fn variable_declarator(&mut self, id: NodeId, init: Option<NodeId>) -> NodeId {
        self.add(NodeKind::VariableDeclarator { id, init })
    }

    pub fn variable_declaration(
        &mut self,
        declaration_kind: DeclarationKind,
        declarations: Vec<NodeId>,
    ) -> NodeId {
        self.add(NodeKind::VariableDeclaration {
            declaration_kind,
            declarations,
        })
    }

    /// `local <name> = <init>` as a single-declarator declaration.
    pub fn local(&mut self, name: &str, init: Option<NodeId>, meta: NodeMeta) -> NodeId {
        let id = self.identifier(name);
        let declarator = self.variable_declarator(id, init);
        self.add_with_meta(
            NodeKind::VariableDeclaration {
                declaration_kind: DeclarationKind::Let,
                declarations: vec![declarator],
            },
            meta,
        )
    }

    pub fn function_declaration(
        &mut self,
        name: NodeId,
        params: Vec<NodeId>,
        body: NodeId,
        options: FunctionOptions,
    ) -> NodeId {
        self.add_with_meta(
            NodeKind::FunctionDeclaration {
                name,
                params,
                body,
                vararg: options.vararg,
                cfg: options.cfg,
                super_class: options.super_class,
            },
            options.meta,
        )
    }

    pub fn block_statement(&mut self, body: Vec<NodeId>) -> NodeId {
        self.add(NodeKind::BlockStatement { body })
    }

    pub fn assignment(&mut self, target: NodeId, value: NodeId) -> NodeId {
        self.add(NodeKind::AssignmentStatement { target, value })
    }

    pub fn return_statement(&mut self, argument: Option<NodeId>) -> NodeId {
        self.add(NodeKind::ReturnStatement { argument })
    }

    pub fn if_statement(
        &mut self,
        test: NodeId,
        consequent: NodeId,
        alternate: Option<NodeId>,
    ) -> NodeId {
        self.add(NodeKind::IfStatement {
            test,
            consequent,
            alternate,
        })
    }

    // ========================================================================
    // Module assembly
    // ========================================================================

    pub fn fresh_cfg_id(&mut self) -> CfgId {
        self.ids.next_cfg()
    }

    pub fn fresh_block_id(&mut self) -> BlockId {
        self.ids.next_block()
    }

    /// Store a finished control-flow graph under a fresh ID.
    pub fn register_control_flow_graph(&mut self, cfg: ControlFlowGraph) -> CfgId {
        let id = self.fresh_cfg_id();
        self.graphs.insert(id.clone(), cfg);
        id
    }

    /// Append a node to the module body.
    pub fn push_to_body(&mut self, id: NodeId) {
        self.body.push(id);
    }

    pub fn add_directive(&mut self, directive: impl Into<String>) {
        self.directives.push(directive.into());
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Snapshot the table into an immutable document, consuming the builder.
    pub fn build(self, options: BuildOptions) -> Result<IrDocument, BuildError> {
        let document = IrDocument {
            schema_version: SCHEMA_VERSION.to_string(),
            module: Module {
                body: self.body,
                metadata: self.metadata,
                directives: self.directives,
                source: self.source,
            },
            nodes: self.nodes,
            control_flow_graphs: self.graphs,
        };

        if options.validate {
            let report = validate_ir(&document)?;
            if !report.ok {
                return Err(BuildError::Invalid {
                    errors: report.errors,
                });
            }
        }

        Ok(document)
    }
}
