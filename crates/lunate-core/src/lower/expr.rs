//! Expression lowering.

use super::{scan, LowerError, Lowerer, SelfParam};
use crate::ast::{
    start_of, CallExpression, Expression, Function, MemberExpression, ObjectMember, Pattern,
    PropertyKind, TemplateLiteral, UpdateExpression,
};
use lunate_ir::{LiteralValue, NodeId, NodeKind, NodeMeta};

/// Operators the target has no counterpart for.
const REJECTED_BINARY: &[&str] = &["in", "instanceof"];
const REJECTED_UNARY: &[&str] = &["void", "delete"];

impl Lowerer {
    pub(super) fn expr(&mut self, expression: &Expression) -> Result<NodeId, LowerError> {
        let loc = expression.loc();
        match expression {
            Expression::Identifier(id) => Ok(self.builder.identifier(&id.name)),
            Expression::Literal(lit) => Ok(match &lit.raw {
                Some(raw) => self.builder.literal_with_raw(lit.value.clone(), raw.clone()),
                None => self.builder.literal(lit.value.clone()),
            }),
            Expression::TemplateLiteral(template) => self.template(template),
            Expression::ArrayExpression(array) => {
                let mut elements = Vec::with_capacity(array.elements.len());
                for element in &array.elements {
                    elements.push(match element {
                        Some(Expression::SpreadElement(spread)) => {
                            return Err(LowerError::unsupported(
                                "SpreadElement",
                                "spread is not supported",
                                start_of(&spread.loc),
                            ));
                        }
                        Some(element) => self.expr(element)?,
                        None => self.builder.null(),
                    });
                }
                Ok(self.builder.add(NodeKind::ArrayExpression { elements }))
            }
            Expression::ObjectExpression(object) => {
                let mut properties = Vec::with_capacity(object.properties.len());
                for member in &object.properties {
                    let property = match member {
                        ObjectMember::Property(property) => property,
                        ObjectMember::SpreadElement(spread) => {
                            return Err(LowerError::unsupported(
                                "SpreadElement",
                                "spread is not supported",
                                start_of(&spread.loc),
                            ));
                        }
                        ObjectMember::Unsupported(u) => {
                            return Err(LowerError::unsupported(
                                &u.node_type,
                                "not a valid object member",
                                start_of(&u.loc),
                            ));
                        }
                    };
                    if property.kind != PropertyKind::Init {
                        return Err(LowerError::unsupported(
                            "Property",
                            "getters and setters are not supported",
                            start_of(&property.loc),
                        ));
                    }
                    let (key, computed) = match (&property.key, property.computed) {
                        (Expression::Identifier(id), false) => (self.builder.identifier(&id.name), false),
                        (key, computed) => (self.expr(key)?, computed),
                    };
                    let value = match (&property.value, property.method) {
                        (Expression::FunctionExpression(f), true) => {
                            self.function_expression(f, SelfParam::Leading)?
                        }
                        (value, _) => self.expr(value)?,
                    };
                    properties.push(self.builder.add(NodeKind::Property { key, value, computed }));
                }
                Ok(self.builder.add(NodeKind::ObjectExpression { properties }))
            }
            Expression::FunctionExpression(function) => {
                let self_param = if scan::uses_this(function) {
                    SelfParam::Leading
                } else {
                    SelfParam::None
                };
                self.function_expression(function, self_param)
            }
            Expression::ArrowFunctionExpression(function) => {
                self.function_expression(function, SelfParam::None)
            }
            Expression::UnaryExpression(unary) => {
                if REJECTED_UNARY.contains(&unary.operator.as_str()) {
                    return Err(LowerError::unsupported(
                        "UnaryExpression",
                        format!("operator '{}' is not supported here", unary.operator),
                        loc,
                    ));
                }
                let argument = self.expr(&unary.argument)?;
                Ok(self.builder.unary_expression(unary.operator.clone(), argument))
            }
            Expression::UpdateExpression(update) => self.update_wrapper(update),
            Expression::BinaryExpression(binary) => {
                if REJECTED_BINARY.contains(&binary.operator.as_str()) {
                    return Err(LowerError::unsupported(
                        "BinaryExpression",
                        format!("operator '{}' is not supported", binary.operator),
                        loc,
                    ));
                }
                let left = self.expr(&binary.left)?;
                let right = self.expr(&binary.right)?;
                Ok(self.builder.binary_expression(left, binary.operator.clone(), right))
            }
            Expression::LogicalExpression(logical) => {
                if logical.operator == "??" {
                    return self.nullish(&logical.left, &logical.right);
                }
                let left = self.expr(&logical.left)?;
                let right = self.expr(&logical.right)?;
                Ok(self.builder.logical_expression(left, logical.operator.clone(), right))
            }
            Expression::AssignmentExpression(assign) => self.wrapper("wrapper:assign", |this| {
                this.assignment(assign)?;
                match &*assign.left {
                    Pattern::Identifier(_) | Pattern::MemberExpression(_) => {
                        this.pattern_target(&assign.left)
                    }
                    // Destructuring assignment evaluates to its right-hand side.
                    _ => this.expr(&assign.right),
                }
            }),
            Expression::ConditionalExpression(conditional) => {
                let test = self.expr(&conditional.test)?;
                let consequent = self.expr(&conditional.consequent)?;
                let alternate = self.expr(&conditional.alternate)?;
                Ok(self.builder.add(NodeKind::ConditionalExpression {
                    test,
                    consequent,
                    alternate,
                }))
            }
            Expression::CallExpression(call) => self.call_expression(call),
            Expression::NewExpression(new) => {
                let callee = self.expr(&new.callee)?;
                let arguments = self.arguments(&new.arguments)?;
                Ok(self.builder.add_with_meta(
                    NodeKind::NewExpression { callee, arguments },
                    NodeMeta::at(loc),
                ))
            }
            Expression::MemberExpression(member) => self.member(member),
            Expression::ChainExpression(chain) => {
                self.wrapper("wrapper:optional", |this| this.chain_link(&chain.expression))
            }
            Expression::ThisExpression(_) => Ok(self.builder.identifier("self")),
            Expression::Super(_) => self.super_class(loc),
            Expression::SpreadElement(_) => Err(LowerError::unsupported(
                "SpreadElement",
                "spread is not supported",
                loc,
            )),
            Expression::Unsupported(u) => Err(LowerError::unsupported(
                &u.node_type,
                "no lowering exists for this construct",
                loc,
            )),
        }
    }

    pub(super) fn function_expression(
        &mut self,
        function: &Function,
        self_param: SelfParam,
    ) -> Result<NodeId, LowerError> {
        let parts = self.function(function, self_param)?;
        Ok(self.builder.add_with_meta(
            NodeKind::FunctionExpression {
                params: parts.params,
                body: parts.body,
                vararg: parts.vararg,
                cfg: Some(parts.cfg),
            },
            NodeMeta::at(start_of(&function.loc)),
        ))
    }

    fn arguments(&mut self, arguments: &[Expression]) -> Result<Vec<NodeId>, LowerError> {
        arguments
            .iter()
            .map(|argument| match argument {
                Expression::SpreadElement(spread) => Err(LowerError::unsupported(
                    "SpreadElement",
                    "spread arguments are not supported",
                    start_of(&spread.loc),
                )),
                other => self.expr(other),
            })
            .collect()
    }

    /// The enclosing class's superclass expression.
    pub(super) fn super_class(&mut self, loc: Option<lunate_ir::SourceLoc>) -> Result<NodeId, LowerError> {
        let super_class = self
            .classes
            .last()
            .and_then(|frame| frame.super_class.clone());
        match super_class {
            Some(expression) => self.expr(&expression),
            None => Err(LowerError::unsupported(
                "Super",
                "'super' outside of a derived class",
                loc,
            )),
        }
    }

    pub(super) fn member(&mut self, member: &MemberExpression) -> Result<NodeId, LowerError> {
        let object = self.expr(&member.object)?;
        match member.static_name() {
            Some(name) => Ok(self.builder.dot(object, name)),
            None => {
                let property = self.expr(&member.property)?;
                Ok(self.builder.member_expression(object, property, true))
            }
        }
    }

    fn call_expression(&mut self, call: &CallExpression) -> Result<NodeId, LowerError> {
        let loc = start_of(&call.loc);
        match &*call.callee {
            // super(...) → Super.constructor(self, ...)
            Expression::Super(_) => {
                let base = self.super_class(loc)?;
                let callee = self.builder.dot(base, "constructor");
                let mut arguments = vec![self.builder.identifier("self")];
                arguments.extend(self.arguments(&call.arguments)?);
                Ok(self.call(callee, arguments, false))
            }
            // super.m(...) → Super.m(self, ...)
            Expression::MemberExpression(member) if matches!(&*member.object, Expression::Super(_)) => {
                let callee = self.member(member)?;
                let mut arguments = vec![self.builder.identifier("self")];
                arguments.extend(self.arguments(&call.arguments)?);
                Ok(self.call(callee, arguments, false))
            }
            Expression::MemberExpression(member) => {
                let method = member
                    .static_name()
                    .is_some_and(|name| self.methods.contains(name));
                let callee = self.member(member)?;
                let arguments = self.arguments(&call.arguments)?;
                Ok(self.call(callee, arguments, method))
            }
            callee => {
                let callee = self.expr(callee)?;
                let arguments = self.arguments(&call.arguments)?;
                Ok(self.call(callee, arguments, false))
            }
        }
    }

    // ========================================================================
    // Wrappers
    // ========================================================================

    /// One link of an optional chain, inside its wrapper. Each optional link
    /// binds its base to a scratch local and returns nil when it is nil.
    fn chain_link(&mut self, expression: &Expression) -> Result<NodeId, LowerError> {
        match expression {
            Expression::MemberExpression(member) => {
                let mut object = self.chain_link(&member.object)?;
                if member.optional {
                    object = self.nil_guard(object);
                }
                match member.static_name() {
                    Some(name) => Ok(self.builder.dot(object, name)),
                    None => {
                        let property = self.expr(&member.property)?;
                        Ok(self.builder.member_expression(object, property, true))
                    }
                }
            }
            Expression::CallExpression(call) => {
                // o.m?.(..) on a known method: keep `o` as the receiver.
                if call.optional {
                    if let Expression::MemberExpression(member) = &*call.callee {
                        if let Some(name) = member.static_name().filter(|name| self.methods.contains(*name)) {
                            let mut object = self.chain_link(&member.object)?;
                            if member.optional {
                                object = self.nil_guard(object);
                            }
                            let receiver = self.temp("opt");
                            let local = self.declare_temp(&receiver, object, NodeMeta::default());
                            self.emit(local);
                            let base = self.builder.identifier(&receiver);
                            let function = self.builder.dot(base, name);
                            let callee = self.nil_guard(function);
                            let mut arguments = vec![self.builder.identifier(&receiver)];
                            arguments.extend(self.arguments(&call.arguments)?);
                            return Ok(self.call(callee, arguments, false));
                        }
                    }
                }
                let method = !call.optional
                    && matches!(&*call.callee, Expression::MemberExpression(m)
                        if m.static_name().is_some_and(|name| self.methods.contains(name)));
                let mut callee = self.chain_link(&call.callee)?;
                if call.optional {
                    callee = self.nil_guard(callee);
                }
                let arguments = self.arguments(&call.arguments)?;
                Ok(self.call(callee, arguments, method))
            }
            other => self.expr(other),
        }
    }

    /// `local __opt_N = <value>; if __opt_N == nil then return nil end`
    fn nil_guard(&mut self, value: NodeId) -> NodeId {
        let name = self.temp("opt");
        let local = self.declare_temp(&name, value, NodeMeta::default());
        self.emit(local);
        let test = self.is_nil(&name);
        let nil = self.builder.null();
        let ret = self.builder.return_statement(Some(nil));
        let body = self.builder.block_statement(vec![ret]);
        let guard = self.builder.if_statement(test, body, None);
        self.emit(guard);
        self.builder.identifier(&name)
    }

    /// `a ?? b`
    fn nullish(&mut self, left: &Expression, right: &Expression) -> Result<NodeId, LowerError> {
        self.wrapper("wrapper:nullish", |this| {
            let value = this.expr(left)?;
            let name = this.temp("nullish");
            let local = this.declare_temp(&name, value, NodeMeta::default());
            this.emit(local);
            let fallback = this.expr(right)?;
            let guard = this.default_guard(&name, fallback);
            this.emit(guard);
            Ok(this.builder.identifier(&name))
        })
    }

    /// `++x` / `x++` used as a value.
    fn update_wrapper(&mut self, update: &UpdateExpression) -> Result<NodeId, LowerError> {
        self.wrapper("wrapper:update", |this| {
            if update.prefix {
                let assign = this.increment(&update.operator, &update.argument)?;
                this.emit(assign);
                return this.expr(&update.argument);
            }

            let old = this.temp("old");
            let current = this.expr(&update.argument)?;
            let snapshot = this.declare_temp(&old, current, NodeMeta::default());
            this.emit(snapshot);

            let op = if update.operator == "--" { "-" } else { "+" };
            let target = this.target(&update.argument)?;
            let base = this.builder.identifier(&old);
            let one = this.builder.number(1.0);
            let value = this.builder.binary_expression(base, op, one);
            let assign = this.builder.assignment(target, value);
            this.emit(assign);
            Ok(this.builder.identifier(&old))
        })
    }

    /// `` `a${x}b` `` → `"a" + tostring(x) + "b"`
    fn template(&mut self, template: &TemplateLiteral) -> Result<NodeId, LowerError> {
        let mut parts = Vec::new();
        for (index, quasi) in template.quasis.iter().enumerate() {
            let text = quasi
                .value
                .cooked
                .clone()
                .unwrap_or_else(|| lunate_syntax_javascript::unescape(&quasi.value.raw));
            if !text.is_empty() {
                parts.push(self.builder.string(text));
            }
            if let Some(expression) = template.expressions.get(index) {
                let value = self.expr(expression)?;
                let tostring = self.builder.identifier("tostring");
                parts.push(self.call(tostring, vec![value], false));
            }
        }

        let mut parts = parts.into_iter();
        let Some(first) = parts.next() else {
            return Ok(self.builder.literal(LiteralValue::String(String::new())));
        };
        Ok(parts.fold(first, |acc, part| self.builder.binary_expression(acc, "+", part)))
    }
}
