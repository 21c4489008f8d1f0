//! Class lowering.
//!
//! A class becomes its constructor, a `FunctionDeclaration` marked
//! `classLike` whose first parameter is `self`, followed by one assignment
//! per method onto the class table:
//!
//! ```text
//! class Point extends Base {        function Point(self, x)   -- classLike
//!   z = 0;                            self.z = 0
//!   constructor(x) { super(x); }      Base.constructor(self, x)
//!   norm() { .. }                   end
//!   static origin() { .. }          Point.norm = function(self) .. end
//! }                                 Point.origin = function() .. end
//! ```
//!
//! The emitter turns the marked function into a metatable-backed table with
//! a `new` constructor.

use super::{ClassFrame, LowerError, Lowerer, SelfParam};
use crate::ast::{
    start_of, ClassDeclaration, ClassMember, Expression, Function, FunctionBody, MethodKind,
};
use lunate_ir::{FunctionOptions, NodeId, NodeKind, NodeMeta};

impl Lowerer {
    pub(super) fn class_declaration(&mut self, class: &ClassDeclaration) -> Result<(), LowerError> {
        let loc = start_of(&class.loc);
        let Some(name) = class.id.as_ref().map(|id| id.name.clone()) else {
            return Err(LowerError::unsupported(
                "ClassDeclaration",
                "class declaration without a name",
                loc,
            ));
        };

        self.classes.push(ClassFrame {
            super_class: class.super_class.clone(),
        });
        let result = self.class_body(&name, class);
        self.classes.pop();
        result
    }

    fn class_body(&mut self, name: &str, class: &ClassDeclaration) -> Result<(), LowerError> {
        let loc = start_of(&class.loc);
        let mut constructor: Option<&Function> = None;
        let mut instance_fields = Vec::new();
        let mut static_fields = Vec::new();
        let mut methods = Vec::new();

        for member in &class.body.body {
            match member {
                ClassMember::MethodDefinition(method) => {
                    let method_loc = start_of(&method.loc);
                    match method.kind {
                        MethodKind::Get | MethodKind::Set => {
                            return Err(LowerError::unsupported(
                                "MethodDefinition",
                                "getters and setters are not supported",
                                method_loc,
                            ));
                        }
                        MethodKind::Constructor => constructor = Some(&method.value),
                        MethodKind::Method => methods.push(method),
                    }
                }
                ClassMember::PropertyDefinition(property) => {
                    if property.is_static {
                        static_fields.push(property);
                    } else {
                        instance_fields.push(property);
                    }
                }
                ClassMember::Unsupported(u) => {
                    return Err(LowerError::unsupported(
                        &u.node_type,
                        "not a valid class member",
                        start_of(&u.loc),
                    ));
                }
            }
        }

        // Constructor, with field initializers ahead of its body.
        let initializers = |this: &mut Self| -> Result<(), LowerError> {
            for field in &instance_fields {
                let Some(value) = &field.value else { continue };
                let key = this.member_key(&field.key, field.computed, start_of(&field.loc))?;
                let receiver = this.builder.identifier("self");
                let target = this.builder.member_expression(receiver, key.0, key.1);
                let value = this.expr(value)?;
                let assign = this.builder.assignment(target, value);
                this.emit(assign);
            }
            Ok(())
        };

        let parts = match constructor {
            Some(function) => self.function_with_prologue(function, SelfParam::Leading, initializers)?,
            None => {
                let implicit = Function {
                    id: None,
                    params: Vec::new(),
                    body: FunctionBody::Block(crate::ast::BlockStatement {
                        body: Vec::new(),
                        loc: None,
                    }),
                    generator: false,
                    is_async: false,
                    loc: class.loc,
                };
                let derived = class.super_class.is_some();
                let mut parts = self.function_with_prologue(&implicit, SelfParam::Leading, |this| {
                    if derived {
                        // Super.constructor(self, ...)
                        let base = this.super_class(loc)?;
                        let callee = this.builder.dot(base, "constructor");
                        let receiver = this.builder.identifier("self");
                        let rest = this.builder.identifier("...");
                        let call = this.call(callee, vec![receiver, rest], false);
                        let statement = this.builder.add(NodeKind::ExpressionStatement { expression: call });
                        this.emit(statement);
                    }
                    initializers(this)
                })?;
                parts.vararg = derived;
                parts
            }
        };

        let super_class = class
            .super_class
            .as_ref()
            .map(|expression| self.expr(expression))
            .transpose()?;
        let class_name = self.builder.identifier(name);
        let mut meta = NodeMeta::at(loc);
        meta.class_like = true;
        let declaration = self.builder.function_declaration(
            class_name,
            parts.params,
            parts.body,
            FunctionOptions {
                vararg: parts.vararg,
                cfg: Some(parts.cfg),
                super_class,
                meta,
            },
        );
        self.emit(declaration);

        for method in methods {
            let (key, computed) = self.member_key(&method.key, method.computed, start_of(&method.loc))?;
            let self_param = if method.is_static {
                SelfParam::None
            } else {
                SelfParam::Leading
            };
            let value = self.function_expression(&method.value, self_param)?;
            let table = self.builder.identifier(name);
            let target = self.builder.member_expression(table, key, computed);
            let id = self.builder.add_with_meta(
                NodeKind::AssignmentStatement { target, value },
                NodeMeta::at(start_of(&method.loc)),
            );
            self.emit(id);
        }

        for field in static_fields {
            let (key, computed) = self.member_key(&field.key, field.computed, start_of(&field.loc))?;
            let value = match &field.value {
                Some(value) => self.expr(value)?,
                None => self.builder.null(),
            };
            let table = self.builder.identifier(name);
            let target = self.builder.member_expression(table, key, computed);
            let id = self.builder.assignment(target, value);
            self.emit(id);
        }

        Ok(())
    }

    /// Property node for a member key, and whether it is computed.
    fn member_key(
        &mut self,
        key: &Expression,
        computed: bool,
        loc: Option<lunate_ir::SourceLoc>,
    ) -> Result<(NodeId, bool), LowerError> {
        match (key, computed) {
            (Expression::Identifier(id), false) => Ok((self.builder.identifier(&id.name), false)),
            (Expression::Literal(lit), _) => match lit.value.as_str() {
                Some(name) => Ok((self.builder.string(name), true)),
                None => Ok((self.builder.literal(lit.value.clone()), true)),
            },
            _ => Err(LowerError::unsupported(
                "MethodDefinition",
                "computed member names are not supported",
                loc,
            )),
        }
    }
}
