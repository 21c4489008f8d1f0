//! Statement rendering.

use super::expr::UNARY;
use super::{EmitError, Emitter};
use lunate_ir::{Iteration, NodeId, NodeKind};

/// Join rendered statements, separating any statement that starts with `(`
/// from its predecessor so Lua does not read it as a call.
fn join_statements(chunks: Vec<String>) -> String {
    let mut out: Vec<String> = Vec::with_capacity(chunks.len());
    for chunk in chunks.into_iter().filter(|c| !c.is_empty()) {
        if chunk.trim_start().starts_with('(') {
            if let Some(previous) = out.last_mut() {
                previous.push(';');
            }
        }
        out.push(chunk);
    }
    out.join("\n")
}

impl Emitter<'_> {
    pub(super) fn block(&self, ids: &[NodeId], depth: usize) -> Result<String, EmitError> {
        let mut chunks = Vec::with_capacity(ids.len());
        for (index, id) in ids.iter().enumerate() {
            let last = index + 1 == ids.len();
            chunks.push(self.statement(id, depth, last)?);
        }
        Ok(join_statements(chunks))
    }

    /// Statements of a function or branch body, without an enclosing `do`.
    pub(super) fn body(&self, id: &NodeId, depth: usize) -> Result<String, EmitError> {
        match self.kind(id)? {
            NodeKind::BlockStatement { body } => self.block(body, depth),
            _ => self.block(std::slice::from_ref(id), depth),
        }
    }

    fn statement(&self, id: &NodeId, depth: usize, last: bool) -> Result<String, EmitError> {
        let pad = self.indent(depth);
        let node = self.node(id)?;

        match &node.kind {
            NodeKind::VariableDeclaration { declarations, .. } => {
                let mut lines = Vec::with_capacity(declarations.len());
                for declarator in declarations {
                    let NodeKind::VariableDeclarator { id: target, init } = self.kind(declarator)? else {
                        return Err(self.unexpected(declarator, "VariableDeclarator"));
                    };
                    let name = self.expression(target, depth)?.text;
                    let init = init
                        .as_ref()
                        .map(|init| self.expression(init, depth))
                        .transpose()?;
                    lines.push(match (self.global_scope(depth), init) {
                        (false, Some(init)) => format!("{}local {} = {}", pad, name, init.text),
                        (false, None) => format!("{}local {}", pad, name),
                        (true, Some(init)) => format!("{}{} = {}", pad, name, init.text),
                        (true, None) => format!("{}{} = nil", pad, name),
                    });
                }
                Ok(lines.join("\n"))
            }
            NodeKind::FunctionDeclaration {
                name,
                params,
                body,
                vararg,
                super_class,
                ..
            } => {
                if node.meta.class_like {
                    return self.class_declaration(name, params, *vararg, body, super_class.as_ref(), depth);
                }
                let name = self.identifier_name(name)?;
                let head = if self.global_scope(depth) {
                    format!("{}function {}", pad, name)
                } else {
                    format!("{}local function {}", pad, name)
                };
                self.function_text(&head, params, *vararg, body, depth)
            }
            NodeKind::AssignmentStatement { target, value } => {
                let target = self.expression(target, depth)?;
                let value = self.expression(value, depth)?;
                Ok(format!("{}{} = {}", pad, target.text, value.text))
            }
            NodeKind::ExpressionStatement { expression } => self.expression_statement(expression, depth),
            NodeKind::ReturnStatement { argument } => {
                let text = match argument {
                    Some(argument) => format!("return {}", self.expression(argument, depth)?.text),
                    None => "return".to_string(),
                };
                Ok(self.terminal(&pad, &text, last))
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => self.if_statement(test, consequent, alternate.as_ref(), depth),
            NodeKind::WhileStatement { test, body, update } => {
                let test = self.expression(test, depth)?;
                let body = self.loop_body(body, update.as_ref(), false, depth)?;
                Ok(self.enclose(&format!("{}while {} do", pad, test.text), &body, &pad, "end"))
            }
            NodeKind::DoWhileStatement { body, test } => {
                let test = self.expression(test, depth)?;
                let condition = if test.prec < UNARY {
                    format!("not ({})", test.text)
                } else {
                    format!("not {}", test.text)
                };
                // `until` sees the body's locals; keep them out of its scope.
                let isolate = self.declares_locals(body)?;
                let body = self.loop_body(body, None, isolate, depth)?;
                Ok(self.enclose(&format!("{}repeat", pad), &body, &pad, &format!("until {}", condition)))
            }
            NodeKind::ForEachStatement {
                iteration,
                key,
                value,
                iterable,
                body,
            } => {
                let key = match key {
                    Some(key) => self.identifier_name(key)?,
                    None => "_".to_string(),
                };
                let names = match value {
                    Some(value) => format!("{}, {}", key, self.identifier_name(value)?),
                    None => key,
                };
                let iterator = match iteration {
                    Iteration::Values => "ipairs",
                    Iteration::Keys => "pairs",
                };
                let iterable = self.expression(iterable, depth)?;
                let body = self.loop_body(body, None, false, depth)?;
                Ok(self.enclose(
                    &format!("{}for {} in {}({}) do", pad, names, iterator, iterable.text),
                    &body,
                    &pad,
                    "end",
                ))
            }
            NodeKind::BreakScope { body } => {
                let body = self.body(body, depth + 1)?;
                Ok(self.enclose(&format!("{}repeat", pad), &body, &pad, "until true"))
            }
            NodeKind::BreakStatement => Ok(self.terminal(&pad, "break", last)),
            NodeKind::ContinueStatement => Ok(format!("{}goto continue", pad)),
            NodeKind::ThrowStatement { argument } => {
                let argument = self.expression(argument, depth)?;
                Ok(format!("{}error({}, 0)", pad, argument.text))
            }
            NodeKind::ProtectedCall {
                status,
                error,
                callee,
            } => {
                let status = self.identifier_name(status)?;
                let error = self.identifier_name(error)?;
                let callee = self.expression(callee, depth)?;
                Ok(format!("{}local {}, {} = pcall({})", pad, status, error, callee.text))
            }
            NodeKind::BlockStatement { body } => {
                let inner = self.block(body, depth + 1)?;
                if inner.is_empty() {
                    return Ok(String::new());
                }
                Ok(self.enclose(&format!("{}do", pad), &inner, &pad, "end"))
            }
            NodeKind::Identifier { .. }
            | NodeKind::Literal { .. }
            | NodeKind::ArrayExpression { .. }
            | NodeKind::ObjectExpression { .. }
            | NodeKind::FunctionExpression { .. }
            | NodeKind::UnaryExpression { .. }
            | NodeKind::BinaryExpression { .. }
            | NodeKind::LogicalExpression { .. }
            | NodeKind::ConditionalExpression { .. }
            | NodeKind::MemberExpression { .. }
            | NodeKind::CallExpression { .. }
            | NodeKind::NewExpression { .. } => self.expression_statement(id, depth),
            NodeKind::Property { .. } | NodeKind::VariableDeclarator { .. } => {
                Err(self.unexpected(id, "statement"))
            }
        }
    }

    /// Calls stand alone; anything else is evaluated into a throwaway local.
    fn expression_statement(&self, expression: &NodeId, depth: usize) -> Result<String, EmitError> {
        let pad = self.indent(depth);
        let callable = match self.kind(expression)? {
            NodeKind::CallExpression { .. } => true,
            NodeKind::NewExpression { callee, .. } => !self.is_error_constructor(callee)?,
            _ => false,
        };
        let text = self.expression(expression, depth)?.text;
        Ok(if callable {
            format!("{}{}", pad, text)
        } else {
            format!("{}local _ = {}", pad, text)
        })
    }

    /// `return` and `break` must end their block in Lua.
    fn terminal(&self, pad: &str, text: &str, last: bool) -> String {
        if last {
            format!("{}{}", pad, text)
        } else {
            format!("{}do {} end", pad, text)
        }
    }

    fn enclose(&self, head: &str, body: &str, pad: &str, close: &str) -> String {
        if body.is_empty() {
            format!("{} {}", head, close)
        } else {
            format!("{}\n{}\n{}{}", head, body, pad, close)
        }
    }

    fn if_statement(
        &self,
        test: &NodeId,
        consequent: &NodeId,
        alternate: Option<&NodeId>,
        depth: usize,
    ) -> Result<String, EmitError> {
        let pad = self.indent(depth);
        let mut lines = vec![format!("{}if {} then", pad, self.expression(test, depth)?.text)];
        lines.push(self.body(consequent, depth + 1)?);

        let mut alternate = alternate;
        while let Some(branch) = alternate {
            match self.kind(branch)? {
                NodeKind::IfStatement {
                    test,
                    consequent,
                    alternate: next,
                } => {
                    lines.push(format!("{}elseif {} then", pad, self.expression(test, depth)?.text));
                    lines.push(self.body(consequent, depth + 1)?);
                    alternate = next.as_ref();
                }
                _ => {
                    let body = self.body(branch, depth + 1)?;
                    if !body.is_empty() {
                        lines.push(format!("{}else", pad));
                        lines.push(body);
                    }
                    alternate = None;
                }
            }
        }

        lines.push(format!("{}end", pad));
        lines.retain(|line| !line.is_empty());
        Ok(lines.join("\n"))
    }

    /// Loop body at `depth + 1`, followed by the `continue` label and the
    /// update statement when there are any. The body gets its own `do` scope
    /// whenever something follows it, or when `isolate` asks for one.
    fn loop_body(
        &self,
        body: &NodeId,
        update: Option<&NodeId>,
        isolate: bool,
        depth: usize,
    ) -> Result<String, EmitError> {
        let inner = depth + 1;
        let continues = self.continues(body)?;
        if !continues && update.is_none() && !isolate {
            return self.body(body, inner);
        }

        let pad = self.indent(inner);
        let text = self.body(body, inner + 1)?;
        let mut chunks = Vec::new();
        if !text.is_empty() {
            chunks.push(self.enclose(&format!("{}do", pad), &text, &pad, "end"));
        }
        if continues {
            chunks.push(format!("{}::continue::", pad));
        }
        if let Some(update) = update {
            chunks.push(self.statement(update, inner, true)?);
        }
        Ok(join_statements(chunks))
    }

    /// Whether a `continue` in `id` targets the enclosing loop.
    fn continues(&self, id: &NodeId) -> Result<bool, EmitError> {
        Ok(match self.kind(id)? {
            NodeKind::ContinueStatement => true,
            NodeKind::BlockStatement { body } => {
                for statement in body {
                    if self.continues(statement)? {
                        return Ok(true);
                    }
                }
                false
            }
            NodeKind::IfStatement {
                consequent,
                alternate,
                ..
            } => {
                self.continues(consequent)?
                    || match alternate {
                        Some(alternate) => self.continues(alternate)?,
                        None => false,
                    }
            }
            NodeKind::BreakScope { body } => self.continues(body)?,
            _ => false,
        })
    }

    fn declares_locals(&self, id: &NodeId) -> Result<bool, EmitError> {
        let declares = |kind: &NodeKind| {
            matches!(
                kind,
                NodeKind::VariableDeclaration { .. }
                    | NodeKind::FunctionDeclaration { .. }
                    | NodeKind::ProtectedCall { .. }
            )
        };
        Ok(match self.kind(id)? {
            NodeKind::BlockStatement { body } => {
                let mut any = false;
                for statement in body {
                    any |= declares(self.kind(statement)?);
                }
                any
            }
            kind => declares(kind),
        })
    }
}
