//! Canonical AST → IR lowering.
//!
//! The lowerer walks the closed [`ast`](crate::ast) enums with exhaustive
//! matches and writes IR through an [`IrBuilder`]. Constructs the target has
//! no primitive for (switch, try, classes, destructuring, optional chains,
//! increments used as values) are rewritten into the smaller IR node set
//! here, so the emitter only ever sees one way of expressing each thing.
//!
//! Statements are appended to the innermost open statement list (the module
//! body at top level). Every function body gets a control-flow graph, built
//! from the lowered IR once the body is complete.

mod cfg;
mod class;
mod expr;
mod pattern;
mod scan;
mod stmt;

use pattern::BindMode;

use crate::ast::{Function, FunctionBody, Pattern, Program, Statement};
use lunate_ir::{
    BuildError, BuildOptions, CfgId, DeclarationKind, IrBuilder, IrDocument, NodeId, NodeKind,
    NodeMeta, SourceDescriptor, SourceLoc,
};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LowerError {
    #[error("unsupported {node_type}{}: {reason}", at(.loc))]
    Unsupported {
        node_type: String,
        reason: String,
        loc: Option<SourceLoc>,
    },

    #[error("'{statement}' outside of a loop{}", at(.loc))]
    JumpOutsideLoop {
        statement: &'static str,
        loc: Option<SourceLoc>,
    },

    #[error("invalid assignment target {node_type}{}", at(.loc))]
    InvalidTarget {
        node_type: String,
        loc: Option<SourceLoc>,
    },
}

fn at(loc: &Option<SourceLoc>) -> String {
    match loc {
        Some(loc) => format!(" at {}:{}", loc.line, loc.column),
        None => String::new(),
    }
}

impl LowerError {
    pub(crate) fn unsupported(
        node_type: impl Into<String>,
        reason: impl Into<String>,
        loc: Option<SourceLoc>,
    ) -> Self {
        LowerError::Unsupported {
            node_type: node_type.into(),
            reason: reason.into(),
            loc,
        }
    }

    /// Source node type the error is about, if any.
    pub fn node_type(&self) -> Option<&str> {
        match self {
            LowerError::Unsupported { node_type, .. } | LowerError::InvalidTarget { node_type, .. } => {
                Some(node_type)
            }
            LowerError::JumpOutsideLoop { .. } => None,
        }
    }

    pub fn loc(&self) -> Option<SourceLoc> {
        match self {
            LowerError::Unsupported { loc, .. }
            | LowerError::JumpOutsideLoop { loc, .. }
            | LowerError::InvalidTarget { loc, .. } => *loc,
        }
    }
}

/// What `break` / `continue` currently jump out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JumpFrame {
    Loop,
    /// A desugared switch; set when a `break` other than a case's trailing
    /// one needs an enclosing breakable scope.
    Switch { needs_scope: bool },
}

/// How a `return` leaves the innermost function being lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnMode {
    Direct,
    /// Inside a protected-call wrapper: the value is returned boxed as
    /// `{ value }` so the code after the call can tell a `return` apart from
    /// normal completion and return it from the real function.
    Boxed,
}

/// Enclosing class, for `super` references.
#[derive(Debug, Clone)]
struct ClassFrame {
    super_class: Option<crate::ast::Expression>,
}

/// Lowered pieces of one function.
struct FunctionParts {
    params: Vec<NodeId>,
    body: NodeId,
    vararg: bool,
    cfg: CfgId,
}

/// How a function's implicit `self` parameter is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelfParam {
    None,
    Leading,
}

pub struct Lowerer {
    builder: IrBuilder,
    sinks: Vec<Vec<NodeId>>,
    methods: BTreeSet<String>,
    temps: u32,
    jumps: Vec<JumpFrame>,
    returns: ReturnMode,
    classes: Vec<ClassFrame>,
}

impl Lowerer {
    pub fn new(source: SourceDescriptor) -> Self {
        Self::with_builder(IrBuilder::new(source))
    }

    pub fn with_builder(builder: IrBuilder) -> Self {
        Self {
            builder,
            sinks: Vec::new(),
            methods: BTreeSet::new(),
            temps: 0,
            jumps: Vec::new(),
            returns: ReturnMode::Direct,
            classes: Vec::new(),
        }
    }

    pub fn builder(&self) -> &IrBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut IrBuilder {
        &mut self.builder
    }

    pub fn into_builder(self) -> IrBuilder {
        self.builder
    }

    /// Snapshot the lowered module into a document.
    pub fn finish(self, options: BuildOptions) -> Result<IrDocument, BuildError> {
        self.builder.build(options)
    }

    /// Names called with method syntax (`o:m()`) in this compilation unit.
    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// Register method names ahead of lowering a single statement or
    /// expression; [`lower_program`](Self::lower_program) does this itself.
    pub fn scan_methods(&mut self, statements: &[Statement]) {
        self.methods.extend(scan::method_names(statements));
    }

    // ========================================================================
    // Entry points
    // ========================================================================

    /// Lower every statement of `program` into the module body.
    pub fn lower_program(&mut self, program: &Program) -> Result<(), LowerError> {
        self.scan_methods(&program.body);
        for directive in &program.directives {
            self.builder.add_directive(directive.clone());
        }
        for statement in &program.body {
            self.statement(statement)?;
        }
        Ok(())
    }

    /// Lower one statement and return its node.
    ///
    /// Companion statements the lowering needs before it (scratch bindings)
    /// are appended to the current statement list; the returned node itself
    /// is not. An empty statement lowers to an empty block.
    pub fn lower_statement(&mut self, statement: &Statement) -> Result<NodeId, LowerError> {
        let (mut lowered, ()) = self.collect(|this| this.statement(statement))?;
        match lowered.pop() {
            Some(last) => {
                for companion in lowered {
                    self.emit(companion);
                }
                Ok(last)
            }
            None => Ok(self.builder.block_statement(Vec::new())),
        }
    }

    pub fn lower_expression(
        &mut self,
        expression: &crate::ast::Expression,
    ) -> Result<NodeId, LowerError> {
        self.expr(expression)
    }

    // ========================================================================
    // Statement placement
    // ========================================================================

    fn emit(&mut self, id: NodeId) {
        match self.sinks.last_mut() {
            Some(sink) => sink.push(id),
            None => self.builder.push_to_body(id),
        }
    }

    /// Run `f` with a fresh statement list and hand back what it emitted.
    fn collect<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<(Vec<NodeId>, T), LowerError> {
        self.sinks.push(Vec::new());
        let result = f(self);
        let statements = self.sinks.pop().unwrap_or_default();
        result.map(|value| (statements, value))
    }

    /// Lower statements into a new block node.
    fn block(&mut self, statements: &[Statement]) -> Result<NodeId, LowerError> {
        let (body, ()) = self.collect(|this| {
            statements.iter().try_for_each(|s| this.statement(s))
        })?;
        Ok(self.builder.block_statement(body))
    }

    /// A statement used as a loop or branch body, always as a block.
    fn body_block(&mut self, statement: &Statement) -> Result<NodeId, LowerError> {
        match statement {
            Statement::BlockStatement(block) => self.block(&block.body),
            other => self.block(std::slice::from_ref(other)),
        }
    }

    fn with_jump<T>(
        &mut self,
        frame: JumpFrame,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<(T, JumpFrame), LowerError> {
        self.jumps.push(frame);
        let result = f(self);
        let frame = self.jumps.pop().unwrap_or(frame);
        result.map(|value| (value, frame))
    }

    /// Run `f` with no enclosing loop, as inside a function body whose
    /// `return`s follow `returns`.
    fn detached<T>(
        &mut self,
        returns: ReturnMode,
        f: impl FnOnce(&mut Self) -> Result<T, LowerError>,
    ) -> Result<T, LowerError> {
        let saved = std::mem::take(&mut self.jumps);
        let saved_returns = std::mem::replace(&mut self.returns, returns);
        let result = f(self);
        self.jumps = saved;
        self.returns = saved_returns;
        result
    }

    /// `return <argument>`, boxed inside a protected-call wrapper.
    fn return_statement(&mut self, argument: Option<NodeId>, meta: NodeMeta) -> NodeId {
        let argument = match self.returns {
            ReturnMode::Direct => argument,
            ReturnMode::Boxed => {
                let elements = argument.into_iter().collect();
                Some(self.builder.add(NodeKind::ArrayExpression { elements }))
            }
        };
        self.builder
            .add_with_meta(NodeKind::ReturnStatement { argument }, meta)
    }

    // ========================================================================
    // Small node helpers
    // ========================================================================

    fn temp(&mut self, base: &str) -> String {
        let name = format!("__{}_{}", base, self.temps);
        self.temps += 1;
        name
    }

    /// `local <name> = <init>` with the given declaration kind.
    fn declare(&mut self, kind: DeclarationKind, name: &str, init: Option<NodeId>) -> NodeId {
        let id = self.builder.identifier(name);
        let declarator = self.builder.variable_declarator(id, init);
        self.builder.variable_declaration(kind, vec![declarator])
    }

    fn declare_temp(&mut self, name: &str, init: NodeId, meta: NodeMeta) -> NodeId {
        self.builder.local(name, Some(init), meta)
    }

    fn is_nil(&mut self, name: &str) -> NodeId {
        let id = self.builder.identifier(name);
        let nil = self.builder.null();
        self.builder.binary_expression(id, "==", nil)
    }

    /// `if <name> == nil then <name> = <value> end`
    fn default_guard(&mut self, name: &str, value: NodeId) -> NodeId {
        let test = self.is_nil(name);
        let target = self.builder.identifier(name);
        let assign = self.builder.assignment(target, value);
        let body = self.builder.block_statement(vec![assign]);
        self.builder.if_statement(test, body, None)
    }

    fn call(&mut self, callee: NodeId, arguments: Vec<NodeId>, method: bool) -> NodeId {
        self.builder.add(NodeKind::CallExpression {
            callee,
            arguments,
            method,
        })
    }

    /// `(function() <statements> return <result> end)()`, tagged `tag`.
    fn wrapper(
        &mut self,
        tag: &str,
        f: impl FnOnce(&mut Self) -> Result<NodeId, LowerError>,
    ) -> Result<NodeId, LowerError> {
        let (mut body, result) = self.collect(f)?;
        let ret = self.builder.return_statement(Some(result));
        body.push(ret);
        let block = self.builder.block_statement(body);
        let cfg = self.build_cfg(&block);
        let function = self.builder.function_expression(Vec::new(), block, false, Some(cfg));
        Ok(self.builder.add_with_meta(
            NodeKind::CallExpression {
                callee: function,
                arguments: Vec::new(),
                method: false,
            },
            NodeMeta::tagged(tag),
        ))
    }

    // ========================================================================
    // Functions
    // ========================================================================

    fn function(&mut self, function: &Function, self_param: SelfParam) -> Result<FunctionParts, LowerError> {
        self.function_with_prologue(function, self_param, |_| Ok(()))
    }

    /// Lower a function; `prologue` emits statements ahead of the body.
    fn function_with_prologue(
        &mut self,
        function: &Function,
        self_param: SelfParam,
        prologue: impl FnOnce(&mut Self) -> Result<(), LowerError>,
    ) -> Result<FunctionParts, LowerError> {
        let loc = crate::ast::start_of(&function.loc);
        if function.generator {
            return Err(LowerError::unsupported("Generator", "generator functions are not supported", loc));
        }
        if function.is_async {
            return Err(LowerError::unsupported("AsyncFunction", "async functions are not supported", loc));
        }

        self.detached(ReturnMode::Direct, |this| {
            let mut params = Vec::new();
            if self_param == SelfParam::Leading {
                params.push(this.builder.identifier("self"));
            }

            let (statements, vararg) = this.collect(|this| {
                let vararg = this.parameters(&function.params, &mut params)?;
                prologue(this)?;
                match &function.body {
                    FunctionBody::Block(block) => {
                        block.body.iter().try_for_each(|s| this.statement(s))?;
                    }
                    FunctionBody::Expression(expr) => {
                        let value = this.expr(expr)?;
                        let ret = this.builder.return_statement(Some(value));
                        this.emit(ret);
                    }
                }
                Ok(vararg)
            })?;

            let body = this.builder.block_statement(statements);
            let cfg = this.build_cfg(&body);
            Ok(FunctionParts {
                params,
                body,
                vararg,
                cfg,
            })
        })
    }

    /// Lower formal parameters, emitting default guards and rest packing into
    /// the current statement list. Returns whether the function is variadic.
    fn parameters(&mut self, patterns: &[Pattern], params: &mut Vec<NodeId>) -> Result<bool, LowerError> {
        let mut vararg = false;
        for (index, pattern) in patterns.iter().enumerate() {
            match pattern {
                Pattern::Identifier(id) => params.push(self.builder.identifier(&id.name)),
                Pattern::AssignmentPattern(assign) => match &*assign.left {
                    Pattern::Identifier(id) => {
                        params.push(self.builder.identifier(&id.name));
                        let value = self.expr(&assign.right)?;
                        let guard = self.default_guard(&id.name, value);
                        self.emit(guard);
                    }
                    _ => {
                        let name = self.temp("arg");
                        params.push(self.builder.identifier(&name));
                        let value = self.expr(&assign.right)?;
                        let guard = self.default_guard(&name, value);
                        self.emit(guard);
                        let source = self.builder.identifier(&name);
                        self.bind(&assign.left, source, BindMode::Declare(DeclarationKind::Let))?;
                    }
                },
                Pattern::RestElement(rest) => {
                    if index + 1 != patterns.len() {
                        return Err(LowerError::unsupported(
                            "RestElement",
                            "rest parameter must be last",
                            pattern.loc(),
                        ));
                    }
                    vararg = true;
                    let dots = self.builder.identifier("...");
                    let packed = self.builder.add(NodeKind::ArrayExpression { elements: vec![dots] });
                    self.bind(&rest.argument, packed, BindMode::Declare(DeclarationKind::Let))?;
                }
                Pattern::ObjectPattern(_) | Pattern::ArrayPattern(_) => {
                    let name = self.temp("arg");
                    params.push(self.builder.identifier(&name));
                    let source = self.builder.identifier(&name);
                    self.bind(pattern, source, BindMode::Declare(DeclarationKind::Let))?;
                }
                Pattern::MemberExpression(_) | Pattern::Unsupported(_) => {
                    return Err(LowerError::unsupported(
                        pattern.type_name(),
                        "not a valid parameter",
                        pattern.loc(),
                    ));
                }
            }
        }
        Ok(vararg)
    }

    /// Build and register the control-flow graph of a lowered function body.
    fn build_cfg(&mut self, body: &NodeId) -> CfgId {
        let graph = cfg::CfgBuilder::build(&mut self.builder, body);
        let blocks = graph.blocks.len();
        let id = self.builder.register_control_flow_graph(graph);
        trace!("Registered {} with {} blocks", id, blocks);
        id
    }
}

#[cfg(test)]
mod tests;
