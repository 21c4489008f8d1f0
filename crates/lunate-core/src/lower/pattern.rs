//! Destructuring and assignment targets.
//!
//! A destructuring pattern binds the right-hand side to one scratch local,
//! then reads and binds each element left to right. Array elements are
//! addressed with 0-based numeric literals; the emitter rebases them.

use super::{LowerError, Lowerer};
use crate::ast::{Expression, Pattern, PatternMember};
use lunate_ir::{DeclarationKind, NodeId, NodeKind, NodeMeta};

/// Whether a pattern introduces locals or assigns to existing targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BindMode {
    Declare(DeclarationKind),
    Assign,
}

impl Lowerer {
    /// Bind `pattern` to the value of `source`, emitting statements.
    pub(super) fn bind(&mut self, pattern: &Pattern, source: NodeId, mode: BindMode) -> Result<(), LowerError> {
        match pattern {
            Pattern::Identifier(id) => {
                let statement = match mode {
                    BindMode::Declare(kind) => self.declare(kind, &id.name, Some(source)),
                    BindMode::Assign => {
                        let target = self.builder.identifier(&id.name);
                        self.builder.assignment(target, source)
                    }
                };
                self.emit(statement);
            }
            Pattern::MemberExpression(member) => {
                if mode != BindMode::Assign {
                    return Err(LowerError::InvalidTarget {
                        node_type: "MemberExpression".into(),
                        loc: pattern.loc(),
                    });
                }
                let target = self.member(member)?;
                let statement = self.builder.assignment(target, source);
                self.emit(statement);
            }
            Pattern::AssignmentPattern(assign) => match &*assign.left {
                Pattern::Identifier(id) => {
                    self.bind(&assign.left, source, mode)?;
                    let value = self.expr(&assign.right)?;
                    let guard = self.default_guard(&id.name, value);
                    self.emit(guard);
                }
                nested => {
                    let scratch = self.scratch(source);
                    let value = self.expr(&assign.right)?;
                    let guard = self.default_guard(&scratch, value);
                    self.emit(guard);
                    let source = self.builder.identifier(&scratch);
                    self.bind(nested, source, mode)?;
                }
            },
            Pattern::ArrayPattern(array) => {
                let scratch = self.scratch(source);
                for (index, element) in array.elements.iter().enumerate() {
                    let Some(element) = element else {
                        continue;
                    };
                    match element {
                        Pattern::RestElement(rest) => {
                            if index + 1 != array.elements.len() {
                                return Err(LowerError::unsupported(
                                    "RestElement",
                                    "rest element must be last",
                                    element.loc(),
                                ));
                            }
                            // { unpack(tmp, index + 1) }
                            let unpack = self.builder.identifier("unpack");
                            let table = self.builder.identifier(&scratch);
                            let start = self.builder.number((index + 1) as f64);
                            let call = self.call(unpack, vec![table, start], false);
                            let packed = self.builder.add(NodeKind::ArrayExpression { elements: vec![call] });
                            self.bind(&rest.argument, packed, mode)?;
                        }
                        element => {
                            let table = self.builder.identifier(&scratch);
                            let key = self.builder.number(index as f64);
                            let access = self.builder.member_expression(table, key, true);
                            self.bind(element, access, mode)?;
                        }
                    }
                }
            }
            Pattern::ObjectPattern(object) => {
                let scratch = self.scratch(source);
                for member in &object.properties {
                    match member {
                        PatternMember::Property(property) => {
                            let table = self.builder.identifier(&scratch);
                            let access = match (&property.key, property.computed) {
                                (Expression::Identifier(key), false) => self.builder.dot(table, &key.name),
                                (key, _) => {
                                    let key = self.expr(key)?;
                                    self.builder.member_expression(table, key, true)
                                }
                            };
                            self.bind(&property.value, access, mode)?;
                        }
                        PatternMember::RestElement(rest) => {
                            return Err(LowerError::unsupported(
                                "RestElement",
                                "object rest is not supported",
                                crate::ast::start_of(&rest.loc),
                            ));
                        }
                        PatternMember::Unsupported(u) => {
                            return Err(LowerError::unsupported(
                                &u.node_type,
                                "not a valid pattern property",
                                crate::ast::start_of(&u.loc),
                            ));
                        }
                    }
                }
            }
            Pattern::RestElement(_) => {
                return Err(LowerError::unsupported(
                    "RestElement",
                    "rest element outside of a list",
                    pattern.loc(),
                ));
            }
            Pattern::Unsupported(u) => {
                return Err(LowerError::unsupported(
                    &u.node_type,
                    "not a valid pattern",
                    pattern.loc(),
                ));
            }
        }
        Ok(())
    }

    /// `local __ref_N = <source>`, returning the scratch name.
    fn scratch(&mut self, source: NodeId) -> String {
        let name = self.temp("ref");
        let id = self.declare_temp(&name, source, NodeMeta::tagged("desugar:destructure"));
        self.emit(id);
        name
    }

    /// Assignment target for an identifier or member pattern.
    pub(super) fn pattern_target(&mut self, pattern: &Pattern) -> Result<NodeId, LowerError> {
        match pattern {
            Pattern::Identifier(id) => Ok(self.builder.identifier(&id.name)),
            Pattern::MemberExpression(member) => self.member(member),
            other => Err(LowerError::InvalidTarget {
                node_type: other.type_name().to_string(),
                loc: other.loc(),
            }),
        }
    }

    /// Assignment target for an expression (`x`, `o.p`, `o[k]`).
    pub(super) fn target(&mut self, expression: &Expression) -> Result<NodeId, LowerError> {
        match expression {
            Expression::Identifier(id) => Ok(self.builder.identifier(&id.name)),
            Expression::MemberExpression(member) => self.member(member),
            other => Err(LowerError::InvalidTarget {
                node_type: other.type_name().to_string(),
                loc: other.loc(),
            }),
        }
    }
}
