//! Read-only pre-passes over the canonical AST.

use crate::ast::{
    walk_expression, walk_function, walk_statement, ClassMember, Expression, Function,
    MethodKind, ObjectMember, Pattern, Statement, Visitor,
};
use std::collections::BTreeSet;

/// Names of everything declared as a method in `statements`: instance class
/// methods, object method shorthand, and function-valued properties or member
/// assignments whose function uses `this`.
pub(super) fn method_names(statements: &[Statement]) -> BTreeSet<String> {
    let mut collector = MethodCollector::default();
    statements.iter().for_each(|s| collector.visit_statement(s));
    collector.names
}

/// Whether `function` refers to `this` outside of nested non-arrow functions.
pub(super) fn uses_this(function: &Function) -> bool {
    let mut finder = ThisFinder::default();
    walk_function(&mut finder, function);
    finder.found
}

/// Whether `statements` hold a `return` that leaves the enclosing function.
pub(super) fn contains_return(statements: &[Statement]) -> bool {
    let mut finder = ReturnFinder::default();
    statements.iter().for_each(|s| finder.visit_statement(s));
    finder.found
}

fn key_name(key: &Expression, computed: bool) -> Option<&str> {
    match key {
        Expression::Identifier(id) if !computed => Some(&id.name),
        Expression::Literal(lit) => lit.value.as_str(),
        _ => None,
    }
}

#[derive(Default)]
struct MethodCollector {
    names: BTreeSet<String>,
}

impl Visitor for MethodCollector {
    fn visit_statement(&mut self, stmt: &Statement) {
        if let Statement::ClassDeclaration(class) = stmt {
            for member in &class.body.body {
                if let ClassMember::MethodDefinition(method) = member {
                    if method.kind == MethodKind::Method && !method.is_static {
                        if let Some(name) = key_name(&method.key, method.computed) {
                            self.names.insert(name.to_string());
                        }
                    }
                }
            }
        }
        walk_statement(self, stmt);
    }

    fn visit_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::ObjectExpression(object) => {
                for member in &object.properties {
                    let ObjectMember::Property(property) = member else {
                        continue;
                    };
                    let is_method = property.method
                        || matches!(&property.value, Expression::FunctionExpression(f) if uses_this(f));
                    if is_method {
                        if let Some(name) = key_name(&property.key, property.computed) {
                            self.names.insert(name.to_string());
                        }
                    }
                }
            }
            Expression::AssignmentExpression(assign) => {
                if let (Pattern::MemberExpression(target), Expression::FunctionExpression(f)) =
                    (&*assign.left, &*assign.right)
                {
                    if let Some(name) = target.static_name() {
                        if uses_this(f) {
                            self.names.insert(name.to_string());
                        }
                    }
                }
            }
            _ => {}
        }
        walk_expression(self, expr);
    }
}

#[derive(Default)]
struct ThisFinder {
    found: bool,
}

impl Visitor for ThisFinder {
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::FunctionDeclaration(_) | Statement::ClassDeclaration(_) => {}
            other => walk_statement(self, other),
        }
    }

    fn visit_expression(&mut self, expr: &Expression) {
        match expr {
            Expression::ThisExpression(_) => self.found = true,
            Expression::FunctionExpression(_) => {}
            other => walk_expression(self, other),
        }
    }
}

#[derive(Default)]
struct ReturnFinder {
    found: bool,
}

impl Visitor for ReturnFinder {
    fn visit_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::ReturnStatement(_) => self.found = true,
            Statement::FunctionDeclaration(_) | Statement::ClassDeclaration(_) => {}
            other => walk_statement(self, other),
        }
    }

    // Expressions only hold statements inside nested functions.
    fn visit_expression(&mut self, _expr: &Expression) {}
}
