//! Statement lowering.

use super::{scan, BindMode, JumpFrame, LowerError, Lowerer, ReturnMode, SelfParam};
use crate::ast::{
    start_of, AssignmentExpression, Expression, ForBinding, ForInit, ForStatement, JumpStatement,
    Pattern, Statement, SwitchStatement, TryStatement, VariableDeclaration, VariableKind,
};
use lunate_ir::{
    DeclarationKind, FunctionOptions, Iteration, LiteralValue, NodeId, NodeKind, NodeMeta,
    SourceLoc,
};

pub(super) fn declaration_kind(kind: VariableKind) -> DeclarationKind {
    match kind {
        VariableKind::Var => DeclarationKind::Var,
        VariableKind::Let => DeclarationKind::Let,
        VariableKind::Const => DeclarationKind::Const,
    }
}

/// Compound assignment operator → binary or logical operator.
fn compound_operator(operator: &str) -> Option<(&str, bool)> {
    let base = operator.strip_suffix('=')?;
    match base {
        "&&" | "||" => Some((base, true)),
        "+" | "-" | "*" | "/" | "%" | "**" | "<<" | ">>" | ">>>" | "&" | "|" | "^" => {
            Some((base, false))
        }
        _ => None,
    }
}

/// Whether control cannot run off the end of `statements`.
fn ends_in_jump(statements: &[&Statement]) -> bool {
    match statements.last() {
        Some(Statement::BreakStatement(_))
        | Some(Statement::ContinueStatement(_))
        | Some(Statement::ReturnStatement(_))
        | Some(Statement::ThrowStatement(_)) => true,
        Some(Statement::BlockStatement(block)) => {
            ends_in_jump(&block.body.iter().collect::<Vec<_>>())
        }
        _ => false,
    }
}

impl Lowerer {
    pub(super) fn statement(&mut self, statement: &Statement) -> Result<(), LowerError> {
        let loc = statement.loc();
        match statement {
            Statement::BlockStatement(block) => {
                let id = self.block(&block.body)?;
                self.emit(id);
            }
            Statement::VariableDeclaration(decl) => self.variable_declaration(decl)?,
            Statement::ExpressionStatement(s) => self.expression_statement(&s.expression, loc)?,
            Statement::ReturnStatement(s) => {
                let argument = s.argument.as_ref().map(|a| self.expr(a)).transpose()?;
                let id = self.return_statement(argument, NodeMeta::at(loc));
                self.emit(id);
            }
            Statement::IfStatement(s) => {
                let test = self.expr(&s.test)?;
                let consequent = self.body_block(&s.consequent)?;
                let alternate = match &s.alternate {
                    // `else if` stays an if node so the emitter can chain it.
                    Some(alt) => match &**alt {
                        Statement::IfStatement(_) => {
                            let (lowered, ()) = self.collect(|this| this.statement(alt))?;
                            Some(match <[NodeId; 1]>::try_from(lowered) {
                                Ok([only]) => only,
                                Err(many) => self.builder.block_statement(many),
                            })
                        }
                        other => Some(self.body_block(other)?),
                    },
                    None => None,
                };
                let id = self.builder.add_with_meta(
                    NodeKind::IfStatement {
                        test,
                        consequent,
                        alternate,
                    },
                    NodeMeta::at(loc),
                );
                self.emit(id);
            }
            Statement::WhileStatement(s) => {
                let test = self.expr(&s.test)?;
                let (body, _) = self.with_jump(JumpFrame::Loop, |this| this.body_block(&s.body))?;
                let id = self.builder.add_with_meta(
                    NodeKind::WhileStatement {
                        test,
                        body,
                        update: None,
                    },
                    NodeMeta::at(loc),
                );
                self.emit(id);
            }
            Statement::DoWhileStatement(s) => {
                let (body, _) = self.with_jump(JumpFrame::Loop, |this| this.body_block(&s.body))?;
                let test = self.expr(&s.test)?;
                let id = self
                    .builder
                    .add_with_meta(NodeKind::DoWhileStatement { body, test }, NodeMeta::at(loc));
                self.emit(id);
            }
            Statement::ForStatement(s) => self.for_statement(s, loc)?,
            Statement::ForOfStatement(s) => {
                if s.is_await {
                    return Err(LowerError::unsupported(
                        "ForOfStatement",
                        "for await is not supported",
                        loc,
                    ));
                }
                self.for_each(Iteration::Values, &s.left, &s.right, &s.body, loc)?;
            }
            Statement::ForInStatement(s) => {
                self.for_each(Iteration::Keys, &s.left, &s.right, &s.body, loc)?;
            }
            Statement::SwitchStatement(s) => self.switch_statement(s, loc)?,
            Statement::TryStatement(s) => self.try_statement(s, loc)?,
            Statement::ThrowStatement(s) => {
                let argument = self.expr(&s.argument)?;
                let id = self
                    .builder
                    .add_with_meta(NodeKind::ThrowStatement { argument }, NodeMeta::at(loc));
                self.emit(id);
            }
            Statement::BreakStatement(jump) => self.break_statement(jump, loc)?,
            Statement::ContinueStatement(jump) => self.continue_statement(jump, loc)?,
            Statement::ClassDeclaration(class) => self.class_declaration(class)?,
            Statement::FunctionDeclaration(function) => {
                let Some(id) = &function.id else {
                    return Err(LowerError::unsupported(
                        "FunctionDeclaration",
                        "function declaration without a name",
                        loc,
                    ));
                };
                let parts = self.function(function, SelfParam::None)?;
                let name = self.builder.identifier(&id.name);
                let node = self.builder.function_declaration(
                    name,
                    parts.params,
                    parts.body,
                    FunctionOptions {
                        vararg: parts.vararg,
                        cfg: Some(parts.cfg),
                        super_class: None,
                        meta: NodeMeta::at(loc),
                    },
                );
                self.emit(node);
            }
            Statement::EmptyStatement(_) => {}
            Statement::Unsupported(u) => {
                return Err(LowerError::unsupported(
                    &u.node_type,
                    "no lowering exists for this construct",
                    loc,
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Declarations and expression statements
    // ========================================================================

    fn variable_declaration(&mut self, decl: &VariableDeclaration) -> Result<(), LowerError> {
        let kind = declaration_kind(decl.kind);
        let loc = start_of(&decl.loc);
        let simple = decl
            .declarations
            .iter()
            .all(|d| matches!(d.id, Pattern::Identifier(_)));

        if simple {
            let mut declarators = Vec::with_capacity(decl.declarations.len());
            for declarator in &decl.declarations {
                let init = declarator.init.as_ref().map(|i| self.expr(i)).transpose()?;
                let name = match &declarator.id {
                    Pattern::Identifier(id) => self.builder.identifier(&id.name),
                    other => return Err(LowerError::InvalidTarget {
                        node_type: other.type_name().to_string(),
                        loc: other.loc(),
                    }),
                };
                declarators.push(self.builder.variable_declarator(name, init));
            }
            let id = self.builder.add_with_meta(
                NodeKind::VariableDeclaration {
                    declaration_kind: kind,
                    declarations: declarators,
                },
                NodeMeta::at(loc),
            );
            self.emit(id);
            return Ok(());
        }

        for declarator in &decl.declarations {
            let init = match &declarator.init {
                Some(init) => self.expr(init)?,
                None => self.builder.null(),
            };
            self.bind(&declarator.id, init, BindMode::Declare(kind))?;
        }
        Ok(())
    }

    /// Lower an expression in statement position.
    pub(super) fn expression_statement(
        &mut self,
        expression: &Expression,
        loc: Option<SourceLoc>,
    ) -> Result<(), LowerError> {
        match expression {
            Expression::UpdateExpression(update) => {
                let id = self.increment(&update.operator, &update.argument)?;
                self.emit(id);
            }
            Expression::AssignmentExpression(assign) => self.assignment(assign)?,
            Expression::UnaryExpression(unary) if unary.operator == "delete" => {
                let target = match &*unary.argument {
                    Expression::MemberExpression(member) => self.member(member)?,
                    other => {
                        return Err(LowerError::unsupported(
                            other.type_name(),
                            "delete only applies to properties",
                            other.loc(),
                        ));
                    }
                };
                let nil = self.builder.null();
                let id = self.builder.assignment(target, nil);
                self.emit(id);
            }
            other => {
                let expression = self.expr(other)?;
                let id = self.builder.add_with_meta(
                    NodeKind::ExpressionStatement { expression },
                    NodeMeta::at(loc),
                );
                self.emit(id);
            }
        }
        Ok(())
    }

    /// `x++` / `x--` as a plain assignment.
    pub(super) fn increment(&mut self, operator: &str, argument: &Expression) -> Result<NodeId, LowerError> {
        let op = if operator == "--" { "-" } else { "+" };
        let target = self.target(argument)?;
        let current = self.expr(argument)?;
        let one = self.builder.number(1.0);
        let value = self.builder.binary_expression(current, op, one);
        Ok(self.builder.assignment(target, value))
    }

    /// Assignment in statement position.
    pub(super) fn assignment(&mut self, assign: &AssignmentExpression) -> Result<(), LowerError> {
        let loc = start_of(&assign.loc);
        if assign.operator == "=" {
            return match &*assign.left {
                Pattern::Identifier(_) | Pattern::MemberExpression(_) => {
                    let target = self.pattern_target(&assign.left)?;
                    let value = self.expr(&assign.right)?;
                    let id = self.builder.add_with_meta(
                        NodeKind::AssignmentStatement { target, value },
                        NodeMeta::at(loc),
                    );
                    self.emit(id);
                    Ok(())
                }
                pattern => {
                    let value = self.expr(&assign.right)?;
                    self.bind(pattern, value, BindMode::Assign)
                }
            };
        }

        let left = match &*assign.left {
            Pattern::Identifier(id) => Expression::Identifier(id.clone()),
            Pattern::MemberExpression(member) => Expression::MemberExpression(member.clone()),
            other => {
                return Err(LowerError::InvalidTarget {
                    node_type: other.type_name().to_string(),
                    loc: other.loc(),
                });
            }
        };

        if assign.operator == "??=" {
            let test = {
                let current = self.expr(&left)?;
                let nil = self.builder.null();
                self.builder.binary_expression(current, "==", nil)
            };
            let target = self.target(&left)?;
            let value = self.expr(&assign.right)?;
            let set = self.builder.assignment(target, value);
            let body = self.builder.block_statement(vec![set]);
            let id = self.builder.add_with_meta(
                NodeKind::IfStatement {
                    test,
                    consequent: body,
                    alternate: None,
                },
                NodeMeta::at(loc),
            );
            self.emit(id);
            return Ok(());
        }

        let Some((operator, logical)) = compound_operator(&assign.operator) else {
            return Err(LowerError::unsupported(
                "AssignmentExpression",
                format!("operator '{}' is not supported", assign.operator),
                loc,
            ));
        };
        let target = self.target(&left)?;
        let current = self.expr(&left)?;
        let right = self.expr(&assign.right)?;
        let value = if logical {
            self.builder.logical_expression(current, operator, right)
        } else {
            self.builder.binary_expression(current, operator, right)
        };
        let id = self.builder.add_with_meta(
            NodeKind::AssignmentStatement { target, value },
            NodeMeta::at(loc),
        );
        self.emit(id);
        Ok(())
    }

    // ========================================================================
    // Loops
    // ========================================================================

    fn for_statement(&mut self, s: &ForStatement, loc: Option<SourceLoc>) -> Result<(), LowerError> {
        let (scope, ()) = self.collect(|this| {
            match &s.init {
                Some(ForInit::Declaration(decl)) => this.variable_declaration(decl)?,
                Some(ForInit::Expression(expr)) => this.expression_statement(expr, None)?,
                None => {}
            }

            let test = match &s.test {
                Some(test) => this.expr(test)?,
                None => this.builder.literal(LiteralValue::Bool(true)),
            };
            let (body, _) = this.with_jump(JumpFrame::Loop, |this| this.body_block(&s.body))?;
            let update = match &s.update {
                Some(update) => {
                    let (statements, ()) =
                        this.collect(|this| this.expression_statement(update, None))?;
                    Some(match <[NodeId; 1]>::try_from(statements) {
                        Ok([only]) => only,
                        Err(many) => this.builder.block_statement(many),
                    })
                }
                None => None,
            };
            let id = this.builder.add_with_meta(
                NodeKind::WhileStatement { test, body, update },
                NodeMeta::at(loc),
            );
            this.emit(id);
            Ok(())
        })?;

        let id = self.builder.add_with_meta(
            NodeKind::BlockStatement { body: scope },
            NodeMeta::tagged("desugar:for"),
        );
        self.emit(id);
        Ok(())
    }

    fn for_each(
        &mut self,
        iteration: Iteration,
        left: &ForBinding,
        right: &Expression,
        body: &Statement,
        loc: Option<SourceLoc>,
    ) -> Result<(), LowerError> {
        let iterable = self.expr(right)?;

        // The loop variable, plus what to bind from it at the top of the body.
        let (variable, rebind): (String, Option<(Pattern, BindMode)>) = match left {
            ForBinding::Declaration(decl) => {
                let [declarator] = decl.declarations.as_slice() else {
                    return Err(LowerError::unsupported(
                        "VariableDeclaration",
                        "loop binding must declare exactly one variable",
                        start_of(&decl.loc),
                    ));
                };
                match &declarator.id {
                    Pattern::Identifier(id) => (id.name.clone(), None),
                    pattern => (
                        self.temp("item"),
                        Some((pattern.clone(), BindMode::Declare(declaration_kind(decl.kind)))),
                    ),
                }
            }
            ForBinding::Pattern(pattern) => (self.temp("item"), Some((pattern.clone(), BindMode::Assign))),
        };

        let (statements, ()) = self.with_jump(JumpFrame::Loop, |this| {
            this.collect(|this| {
                if let Some((pattern, mode)) = &rebind {
                    let source = this.builder.identifier(&variable);
                    this.bind(pattern, source, *mode)?;
                }
                match body {
                    Statement::BlockStatement(block) => {
                        block.body.iter().try_for_each(|s| this.statement(s))
                    }
                    other => this.statement(other),
                }
            })
        })?
        .0;
        let body = self.builder.block_statement(statements);

        let binding = self.builder.identifier(&variable);
        let (key, value) = match iteration {
            Iteration::Values => (None, Some(binding)),
            Iteration::Keys => (Some(binding), None),
        };
        let id = self.builder.add_with_meta(
            NodeKind::ForEachStatement {
                iteration,
                key,
                value,
                iterable,
                body,
            },
            NodeMeta::at(loc),
        );
        self.emit(id);
        Ok(())
    }

    fn break_statement(&mut self, jump: &JumpStatement, loc: Option<SourceLoc>) -> Result<(), LowerError> {
        if jump.label.is_some() {
            return Err(LowerError::unsupported("LabeledStatement", "labels are not supported", loc));
        }
        match self.jumps.last_mut() {
            Some(JumpFrame::Switch { needs_scope }) => *needs_scope = true,
            Some(JumpFrame::Loop) => {}
            None => {
                return Err(LowerError::JumpOutsideLoop {
                    statement: "break",
                    loc,
                });
            }
        }
        let id = self
            .builder
            .add_with_meta(NodeKind::BreakStatement, NodeMeta::at(loc));
        self.emit(id);
        Ok(())
    }

    fn continue_statement(&mut self, jump: &JumpStatement, loc: Option<SourceLoc>) -> Result<(), LowerError> {
        if jump.label.is_some() {
            return Err(LowerError::unsupported("LabeledStatement", "labels are not supported", loc));
        }
        if !self.jumps.contains(&JumpFrame::Loop) {
            return Err(LowerError::JumpOutsideLoop {
                statement: "continue",
                loc,
            });
        }
        let id = self
            .builder
            .add_with_meta(NodeKind::ContinueStatement, NodeMeta::at(loc));
        self.emit(id);
        Ok(())
    }

    // ========================================================================
    // Switch
    // ========================================================================

    /// Lower `switch` into an if/else-if chain over equality tests.
    ///
    /// Cases with an empty body share the next case's branch. A case that
    /// does not end in a jump falls through: its branch continues with the
    /// bodies of the cases after it up to the first one that does. A trailing
    /// `break` is dropped; any other `break` wraps the chain in a
    /// single-iteration breakable scope.
    fn switch_statement(&mut self, s: &SwitchStatement, loc: Option<SourceLoc>) -> Result<(), LowerError> {
        let discriminant = match &s.discriminant {
            Expression::Identifier(_) | Expression::Literal(_) => None,
            other => {
                let value = self.expr(other)?;
                let name = self.temp("switch");
                let id = self.declare_temp(&name, value, NodeMeta::tagged("desugar:switch"));
                self.emit(id);
                Some(name)
            }
        };

        struct Arm<'s> {
            tests: Vec<&'s Expression>,
            is_default: bool,
            body: Vec<&'s Statement>,
        }

        let mut arms: Vec<Arm<'_>> = Vec::new();
        let mut pending: Vec<&Expression> = Vec::new();
        let mut pending_default = false;
        for (index, case) in s.cases.iter().enumerate() {
            match &case.test {
                Some(test) => pending.push(test),
                None => pending_default = true,
            }
            if case.consequent.is_empty() {
                continue;
            }
            let mut body: Vec<&Statement> = case.consequent.iter().collect();
            for next in &s.cases[index + 1..] {
                if ends_in_jump(&body) {
                    break;
                }
                body.extend(next.consequent.iter());
            }
            let trailing_break = matches!(
                body.last(),
                Some(Statement::BreakStatement(jump)) if jump.label.is_none()
            );
            if trailing_break {
                body.pop();
            }
            arms.push(Arm {
                tests: std::mem::take(&mut pending),
                is_default: std::mem::take(&mut pending_default),
                body,
            });
        }

        let ((branches, default), frame) = self.with_jump(JumpFrame::Switch { needs_scope: false }, |this| {
            let mut branches = Vec::new();
            let mut default = None;
            for arm in &arms {
                let (statements, ()) = this.collect(|this| {
                    arm.body.iter().try_for_each(|s| this.statement(s))
                })?;
                let block = this.builder.block_statement(statements);
                if arm.is_default {
                    default = Some(block);
                } else {
                    branches.push((arm.tests.clone(), block));
                }
            }
            Ok((branches, default))
        })?;

        let mut chain = default;
        for (tests, block) in branches.into_iter().rev() {
            let mut test: Option<NodeId> = None;
            for case_test in tests {
                let left = match &discriminant {
                    Some(name) => self.builder.identifier(name),
                    None => self.expr(&s.discriminant)?,
                };
                let right = self.expr(case_test)?;
                let equal = self.builder.binary_expression(left, "===", right);
                test = Some(match test {
                    Some(prev) => self.builder.logical_expression(prev, "||", equal),
                    None => equal,
                });
            }
            let Some(test) = test else { continue };
            let mut meta = NodeMeta::tagged("desugar:switch");
            meta.loc = loc;
            chain = Some(self.builder.add_with_meta(
                NodeKind::IfStatement {
                    test,
                    consequent: block,
                    alternate: chain,
                },
                meta,
            ));
        }

        let Some(chain) = chain else {
            return Ok(());
        };
        let statement = if frame == (JumpFrame::Switch { needs_scope: true }) {
            let body = self.builder.block_statement(vec![chain]);
            self.builder
                .add_with_meta(NodeKind::BreakScope { body }, NodeMeta::tagged("desugar:switch"))
        } else {
            chain
        };
        self.emit(statement);
        Ok(())
    }

    // ========================================================================
    // Try
    // ========================================================================

    /// `try` → protected call, then the handler if it failed, then the
    /// finalizer.
    ///
    /// With a finalizer the handler runs under its own protected call, so the
    /// finalizer still runs when the handler throws; any error left over is
    /// rethrown after it. A `return` inside a protected body comes back boxed
    /// in the error slot and is returned once the finalizer has run.
    fn try_statement(&mut self, s: &TryStatement, loc: Option<SourceLoc>) -> Result<(), LowerError> {
        let ok = self.temp("ok");
        let err = self.temp("err");
        let guarded_handler = s.finalizer.is_some();
        let returns = scan::contains_return(&s.block.body)
            || (guarded_handler
                && s.handler
                    .as_ref()
                    .is_some_and(|handler| scan::contains_return(&handler.body.body)));

        let (scope, ()) = self.collect(|this| {
            let body = this.detached(ReturnMode::Boxed, |this| this.block(&s.block.body))?;
            let mut meta = NodeMeta::tagged("desugar:try");
            meta.loc = loc;
            let pcall = this.protected_call(&ok, &err, body, meta);
            this.emit(pcall);

            if let Some(handler) = &s.handler {
                let handle = |this: &mut Self| -> Result<(), LowerError> {
                    if let Some(param) = &handler.param {
                        let source = this.builder.identifier(&err);
                        this.bind(param, source, BindMode::Declare(DeclarationKind::Let))?;
                    }
                    handler.body.body.iter().try_for_each(|s| this.statement(s))
                };
                let statements = if guarded_handler {
                    let (body, ()) = this.collect(|this| this.detached(ReturnMode::Boxed, handle))?;
                    let body = this.builder.block_statement(body);
                    let handler_ok = this.temp("ok");
                    let handler_err = this.temp("err");
                    let pcall = this.protected_call(&handler_ok, &handler_err, body, NodeMeta::tagged("desugar:catch"));
                    let status_target = this.builder.identifier(&ok);
                    let status = this.builder.identifier(&handler_ok);
                    let error_target = this.builder.identifier(&err);
                    let error = this.builder.identifier(&handler_err);
                    vec![
                        pcall,
                        this.builder.assignment(status_target, status),
                        this.builder.assignment(error_target, error),
                    ]
                } else {
                    this.collect(handle)?.0
                };
                let failed = this.failed(&ok);
                let consequent = this.builder.block_statement(statements);
                let id = this.builder.if_statement(failed, consequent, None);
                this.emit(id);
            }

            if let Some(finalizer) = &s.finalizer {
                let id = this.block(&finalizer.body)?;
                this.emit(id);

                let failed = this.failed(&ok);
                let argument = this.builder.identifier(&err);
                let rethrow = this.builder.add(NodeKind::ThrowStatement { argument });
                let consequent = this.builder.block_statement(vec![rethrow]);
                let id = this.builder.if_statement(failed, consequent, None);
                this.emit(id);
            }

            if returns {
                // if ok and err then return err[1] end
                let status = this.builder.identifier(&ok);
                let boxed = this.builder.identifier(&err);
                let test = this.builder.logical_expression(status, "&&", boxed);
                let boxed = this.builder.identifier(&err);
                let first = this.builder.number(0.0);
                let value = this.builder.member_expression(boxed, first, true);
                let ret = this.return_statement(Some(value), NodeMeta::tagged("desugar:try"));
                let consequent = this.builder.block_statement(vec![ret]);
                let id = this.builder.if_statement(test, consequent, None);
                this.emit(id);
            }
            Ok(())
        })?;

        let id = self.builder.add_with_meta(
            NodeKind::BlockStatement { body: scope },
            NodeMeta::tagged("desugar:try"),
        );
        self.emit(id);
        Ok(())
    }

    /// `local <ok>, <err> = pcall(function() <body> end)`
    fn protected_call(&mut self, ok: &str, err: &str, body: NodeId, meta: NodeMeta) -> NodeId {
        let cfg = self.build_cfg(&body);
        let callee = self.builder.function_expression(Vec::new(), body, false, Some(cfg));
        let status = self.builder.identifier(ok);
        let error = self.builder.identifier(err);
        self.builder.add_with_meta(
            NodeKind::ProtectedCall {
                status,
                error,
                callee,
            },
            meta,
        )
    }

    /// `not <ok>`
    fn failed(&mut self, ok: &str) -> NodeId {
        let status = self.builder.identifier(ok);
        self.builder.unary_expression("!", status)
    }
}
