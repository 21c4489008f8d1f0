//! Expression rendering.

use super::{is_lua_name, lua_identifier, lua_string_literal, EmitError, Emitter};
use lunate_ir::node::format_number;
use lunate_ir::{LiteralValue, NodeId, NodeKind};

// Lua operator precedence, loosest first.
pub(super) const OR: u8 = 1;
pub(super) const AND: u8 = 2;
pub(super) const COMPARE: u8 = 3;
pub(super) const CONCAT: u8 = 4;
pub(super) const ADD: u8 = 5;
pub(super) const MUL: u8 = 6;
pub(super) const UNARY: u8 = 7;
pub(super) const POW: u8 = 8;
pub(super) const ATOM: u8 = 10;

/// Rendered expression.
#[derive(Debug, Clone)]
pub(crate) struct Expr {
    pub text: String,
    pub prec: u8,
    /// Usable as a call target or indexed object without parentheses.
    pub prefix: bool,
}

impl Expr {
    fn atom(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prec: ATOM,
            prefix: false,
        }
    }

    fn prefix(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prec: ATOM,
            prefix: true,
        }
    }

    fn op(text: String, prec: u8) -> Self {
        Self {
            text,
            prec,
            prefix: false,
        }
    }

    fn parenthesized(self) -> Self {
        Self::prefix(format!("({})", self.text))
    }
}

#[derive(Clone, Copy)]
enum Assoc {
    Left,
    Right,
    /// Associative, so neither side needs grouping at equal precedence.
    Both,
}

/// Lua `bit` library function for a JavaScript bitwise operator.
fn bit_function(operator: &str) -> Option<&'static str> {
    Some(match operator {
        "&" => "bit.band",
        "|" => "bit.bor",
        "^" => "bit.bxor",
        "<<" => "bit.lshift",
        ">>" => "bit.arshift",
        ">>>" => "bit.rshift",
        _ => return None,
    })
}

fn number(n: f64) -> String {
    if n.is_nan() {
        "(0/0)".into()
    } else if n.is_infinite() {
        if n > 0.0 { "(1/0)".into() } else { "(-1/0)".into() }
    } else {
        format_number(n)
    }
}

pub(super) fn literal(value: &LiteralValue) -> Expr {
    match value {
        LiteralValue::Null => Expr::atom("nil"),
        LiteralValue::Bool(b) => Expr::atom(b.to_string()),
        LiteralValue::Number(n) => {
            let text = number(*n);
            if text.starts_with('-') {
                Expr::op(text, UNARY)
            } else if text.starts_with('(') {
                Expr::prefix(text)
            } else {
                Expr::atom(text)
            }
        }
        LiteralValue::String(s) => Expr::atom(lua_string_literal(s)),
    }
}

impl Emitter<'_> {
    pub(super) fn expression(&self, id: &NodeId, depth: usize) -> Result<Expr, EmitError> {
        match self.kind(id)? {
            NodeKind::Identifier { name } => Ok(match lua_identifier(name).as_str() {
                "nil" => Expr::atom("nil"),
                "..." => Expr::atom("..."),
                name => Expr::prefix(name),
            }),
            NodeKind::Literal { value, .. } => Ok(literal(value)),
            NodeKind::ArrayExpression { elements } => {
                let elements = self.list(elements, depth)?;
                Ok(Expr::atom(if elements.is_empty() {
                    "{}".to_string()
                } else {
                    format!("{{ {} }}", elements)
                }))
            }
            NodeKind::ObjectExpression { properties } => self.object(properties, depth),
            NodeKind::FunctionExpression {
                params,
                body,
                vararg,
                ..
            } => Ok(Expr::atom(self.function_text("function", params, *vararg, body, depth)?)),
            NodeKind::UnaryExpression { operator, argument } => {
                self.unary(id, operator, argument, depth)
            }
            NodeKind::BinaryExpression {
                operator,
                left,
                right,
            } => self.binary(id, operator, left, right, depth),
            NodeKind::LogicalExpression {
                operator,
                left,
                right,
            } => match operator.as_str() {
                "&&" => self.infix("and", AND, Assoc::Left, left, right, depth),
                "||" => self.infix("or", OR, Assoc::Left, left, right, depth),
                _ => Err(EmitError::UnsupportedOperator {
                    operator: operator.clone(),
                    id: id.clone(),
                }),
            },
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => self.conditional(test, consequent, alternate, depth),
            NodeKind::MemberExpression {
                object,
                property,
                computed,
            } => self.member(object, property, *computed, depth),
            NodeKind::CallExpression {
                callee,
                arguments,
                method,
            } => self.call(callee, arguments, *method, depth),
            NodeKind::NewExpression { callee, arguments } => {
                self.new_expression(callee, arguments, depth)
            }
            NodeKind::Property { .. }
            | NodeKind::VariableDeclaration { .. }
            | NodeKind::VariableDeclarator { .. }
            | NodeKind::FunctionDeclaration { .. }
            | NodeKind::AssignmentStatement { .. }
            | NodeKind::ExpressionStatement { .. }
            | NodeKind::ReturnStatement { .. }
            | NodeKind::IfStatement { .. }
            | NodeKind::WhileStatement { .. }
            | NodeKind::DoWhileStatement { .. }
            | NodeKind::ForEachStatement { .. }
            | NodeKind::BreakScope { .. }
            | NodeKind::BreakStatement
            | NodeKind::ContinueStatement
            | NodeKind::ThrowStatement { .. }
            | NodeKind::ProtectedCall { .. }
            | NodeKind::BlockStatement { .. } => Err(self.unexpected(id, "expression")),
        }
    }

    /// Render `id`, parenthesized if it binds looser than `min`.
    fn operand(&self, id: &NodeId, min: u8, depth: usize) -> Result<Expr, EmitError> {
        let expr = self.expression(id, depth)?;
        Ok(if expr.prec < min { expr.parenthesized() } else { expr })
    }

    /// Render `id` for use as a call target or indexed object.
    fn prefix_expression(&self, id: &NodeId, depth: usize) -> Result<String, EmitError> {
        let expr = self.expression(id, depth)?;
        Ok(if expr.prefix { expr.text } else { expr.parenthesized().text })
    }

    fn list(&self, ids: &[NodeId], depth: usize) -> Result<String, EmitError> {
        let items = ids
            .iter()
            .map(|id| self.expression(id, depth).map(|e| e.text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items.join(", "))
    }

    fn infix(
        &self,
        operator: &str,
        prec: u8,
        assoc: Assoc,
        left: &NodeId,
        right: &NodeId,
        depth: usize,
    ) -> Result<Expr, EmitError> {
        let (left_min, right_min) = match assoc {
            Assoc::Left => (prec, prec + 1),
            Assoc::Right => (prec + 1, prec),
            Assoc::Both => (prec, prec),
        };
        let left = self.operand(left, left_min, depth)?;
        let right = self.operand(right, right_min, depth)?;
        Ok(Expr::op(format!("{} {} {}", left.text, operator, right.text), prec))
    }

    fn call_text(&self, function: &str, args: &[&NodeId], depth: usize) -> Result<Expr, EmitError> {
        let args = args
            .iter()
            .map(|id| self.expression(id, depth).map(|e| e.text))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Expr::prefix(format!("{}({})", function, args.join(", "))))
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn unary(
        &self,
        id: &NodeId,
        operator: &str,
        argument: &NodeId,
        depth: usize,
    ) -> Result<Expr, EmitError> {
        match operator {
            "!" => {
                let operand = self.operand(argument, UNARY, depth)?;
                Ok(Expr::op(format!("not {}", operand.text), UNARY))
            }
            "-" => {
                let operand = self.operand(argument, UNARY, depth)?;
                // `--` would start a comment.
                let space = if operand.text.starts_with('-') { " " } else { "" };
                Ok(Expr::op(format!("-{}{}", space, operand.text), UNARY))
            }
            "+" => self.call_text("tonumber", &[argument], depth),
            "~" => self.call_text("bit.bnot", &[argument], depth),
            "typeof" => self.call_text("type", &[argument], depth),
            _ => Err(EmitError::UnsupportedOperator {
                operator: operator.to_string(),
                id: id.clone(),
            }),
        }
    }

    fn binary(
        &self,
        id: &NodeId,
        operator: &str,
        left: &NodeId,
        right: &NodeId,
        depth: usize,
    ) -> Result<Expr, EmitError> {
        match operator {
            "+" if self.is_string(left)? || self.is_string(right)? => {
                self.infix("..", CONCAT, Assoc::Both, left, right, depth)
            }
            "+" | "-" => self.infix(operator, ADD, Assoc::Left, left, right, depth),
            "*" | "/" => self.infix(operator, MUL, Assoc::Left, left, right, depth),
            "%" => self.call_text("math.fmod", &[left, right], depth),
            "**" => self.infix("^", POW, Assoc::Right, left, right, depth),
            "==" | "===" => self.infix("==", COMPARE, Assoc::Left, left, right, depth),
            "!=" | "!==" => self.infix("~=", COMPARE, Assoc::Left, left, right, depth),
            "<" | ">" | "<=" | ">=" => self.infix(operator, COMPARE, Assoc::Left, left, right, depth),
            _ => match bit_function(operator) {
                Some(function) => self.call_text(function, &[left, right], depth),
                None => Err(EmitError::UnsupportedOperator {
                    operator: operator.to_string(),
                    id: id.clone(),
                }),
            },
        }
    }

    /// Statically known to produce a string: a string literal, a
    /// `tostring(..)` call, or a concatenation of either.
    fn is_string(&self, id: &NodeId) -> Result<bool, EmitError> {
        Ok(match self.kind(id)? {
            NodeKind::Literal {
                value: LiteralValue::String(_),
                ..
            } => true,
            NodeKind::BinaryExpression {
                operator,
                left,
                right,
            } if operator == "+" => self.is_string(left)? || self.is_string(right)?,
            NodeKind::CallExpression { callee, .. } => matches!(
                self.kind(callee)?,
                NodeKind::Identifier { name } if name == "tostring"
            ),
            _ => false,
        })
    }

    /// `(c and a or b)` when `a` can never be falsy, else a nullary wrapper.
    fn conditional(
        &self,
        test: &NodeId,
        consequent: &NodeId,
        alternate: &NodeId,
        depth: usize,
    ) -> Result<Expr, EmitError> {
        let truthy = matches!(
            self.kind(consequent)?,
            NodeKind::Literal { value, .. }
                if !matches!(value, LiteralValue::Null | LiteralValue::Bool(false))
        );

        if truthy {
            let test = self.operand(test, AND, depth)?;
            let consequent = self.operand(consequent, AND + 1, depth)?;
            let alternate = self.operand(alternate, AND, depth)?;
            return Ok(Expr::prefix(format!(
                "({} and {} or {})",
                test.text, consequent.text, alternate.text
            )));
        }

        let test = self.expression(test, depth)?;
        let consequent = self.expression(consequent, depth)?;
        let alternate = self.expression(alternate, depth)?;
        Ok(Expr::prefix(format!(
            "(function() if {} then return {} end return {} end)()",
            test.text, consequent.text, alternate.text
        )))
    }

    // ========================================================================
    // Tables and access
    // ========================================================================

    fn object(&self, properties: &[NodeId], depth: usize) -> Result<Expr, EmitError> {
        let mut fields = Vec::with_capacity(properties.len());
        for id in properties {
            let NodeKind::Property {
                key,
                value,
                computed,
            } = self.kind(id)?
            else {
                return Err(self.unexpected(id, "Property"));
            };

            let value = self.expression(value, depth)?.text;
            let field = match (self.kind(key)?, computed) {
                (NodeKind::Identifier { name }, false) if is_lua_name(name) => {
                    format!("{} = {}", name, value)
                }
                (NodeKind::Identifier { name }, false) => {
                    format!("[{}] = {}", lua_string_literal(name), value)
                }
                (NodeKind::Literal {
                    value: LiteralValue::String(name),
                    ..
                }, _) if is_lua_name(name) => format!("{} = {}", name, value),
                (NodeKind::Literal {
                    value: LiteralValue::Number(n),
                    ..
                }, _) => format!("[{}] = {}", number(n + 1.0), value),
                _ => format!("[{}] = {}", self.expression(key, depth)?.text, value),
            };
            fields.push(field);
        }

        Ok(Expr::atom(if fields.is_empty() {
            "{}".to_string()
        } else {
            format!("{{ {} }}", fields.join(", "))
        }))
    }

    fn member(
        &self,
        object: &NodeId,
        property: &NodeId,
        computed: bool,
        depth: usize,
    ) -> Result<Expr, EmitError> {
        let math = matches!(self.kind(object)?, NodeKind::Identifier { name } if name == "Math");
        let target = if math {
            "math".to_string()
        } else {
            self.prefix_expression(object, depth)?
        };

        let static_name = match (self.kind(property)?, computed) {
            (NodeKind::Identifier { name }, false) => Some(name.as_str()),
            (
                NodeKind::Literal {
                    value: LiteralValue::String(name),
                    ..
                },
                true,
            ) => Some(name.as_str()),
            _ => None,
        };

        if let Some(name) = static_name {
            if name == "length" && !math {
                let operand = self.operand(object, UNARY, depth)?;
                return Ok(Expr::op(format!("#{}", operand.text), UNARY));
            }
            let name = if math && name == "PI" { "pi" } else { name };
            return Ok(Expr::prefix(if is_lua_name(name) {
                format!("{}.{}", target, name)
            } else {
                format!("{}[{}]", target, lua_string_literal(name))
            }));
        }

        let index = match self.kind(property)? {
            NodeKind::Literal {
                value: LiteralValue::Number(n),
                ..
            } if computed => number(n + 1.0),
            _ => self.expression(property, depth)?.text,
        };
        Ok(Expr::prefix(format!("{}[{}]", target, index)))
    }

    /// `console.log` and friends, which all map to `print`.
    fn is_console(&self, callee: &NodeId) -> Result<bool, EmitError> {
        let NodeKind::MemberExpression {
            object,
            property,
            computed: false,
        } = self.kind(callee)?
        else {
            return Ok(false);
        };
        Ok(
            matches!(self.kind(object)?, NodeKind::Identifier { name } if name == "console")
                && matches!(
                    self.kind(property)?,
                    NodeKind::Identifier { name }
                        if matches!(name.as_str(), "log" | "info" | "warn" | "error")
                ),
        )
    }

    fn call(
        &self,
        callee: &NodeId,
        arguments: &[NodeId],
        method: bool,
        depth: usize,
    ) -> Result<Expr, EmitError> {
        let args = self.list(arguments, depth)?;

        if self.is_console(callee)? {
            return Ok(Expr::prefix(format!("print({})", args)));
        }

        if method {
            if let NodeKind::MemberExpression {
                object,
                property,
                computed: false,
            } = self.kind(callee)?
            {
                if let NodeKind::Identifier { name } = self.kind(property)? {
                    if is_lua_name(name) {
                        let receiver = self.prefix_expression(object, depth)?;
                        return Ok(Expr::prefix(format!("{}:{}({})", receiver, name, args)));
                    }
                }
            }
        }

        let callee = self.prefix_expression(callee, depth)?;
        Ok(Expr::prefix(format!("{}({})", callee, args)))
    }

    /// Builtin error constructors become plain `{ name, message }` tables
    /// unless the program declares a class of the same name.
    pub(super) fn is_error_constructor(&self, callee: &NodeId) -> Result<bool, EmitError> {
        Ok(matches!(
            self.kind(callee)?,
            NodeKind::Identifier { name }
                if matches!(name.as_str(), "Error" | "TypeError" | "RangeError")
                    && !self.classes.contains(name.as_str())
        ))
    }

    fn new_expression(
        &self,
        callee: &NodeId,
        arguments: &[NodeId],
        depth: usize,
    ) -> Result<Expr, EmitError> {
        if self.is_error_constructor(callee)? {
            let name = self.identifier_name(callee)?;
            let mut fields = vec![format!("name = {}", lua_string_literal(&name))];
            if let Some(message) = arguments.first() {
                fields.push(format!("message = {}", self.expression(message, depth)?.text));
            }
            return Ok(Expr::atom(format!("{{ {} }}", fields.join(", "))));
        }

        let class = self.prefix_expression(callee, depth)?;
        let args = self.list(arguments, depth)?;
        Ok(Expr::prefix(format!("{}.new({})", class, args)))
    }
}
