//! Tests for lowering.

use super::*;
use crate::normalize::{normalize_program, NormalizeOptions};
use crate::{compile, CompileError, CompileOptions};
use lunate_ir::{Iteration, LiteralValue, Node};

fn compile_ok(source: &str) -> IrDocument {
    match compile(source, &CompileOptions::default()) {
        Ok(doc) => doc,
        Err(err) => panic!("compile failed for {:?}: {}", source, err),
    }
}

fn lower_err(source: &str) -> LowerError {
    match compile(source, &CompileOptions::default()) {
        Err(CompileError::Lower(err)) => err,
        other => panic!("expected lowering error, got {:?}", other),
    }
}

fn node<'a>(doc: &'a IrDocument, id: &NodeId) -> &'a Node {
    doc.node(id).unwrap()
}

fn body<'a>(doc: &'a IrDocument) -> Vec<&'a Node> {
    doc.module.body.iter().map(|id| node(doc, id)).collect()
}

fn name<'a>(doc: &'a IrDocument, id: &NodeId) -> &'a str {
    match &node(doc, id).kind {
        NodeKind::Identifier { name } => name,
        other => panic!("expected identifier, got {:?}", other),
    }
}

fn block<'a>(doc: &'a IrDocument, id: &NodeId) -> Vec<&'a Node> {
    match &node(doc, id).kind {
        NodeKind::BlockStatement { body } => body.iter().map(|s| node(doc, s)).collect(),
        other => panic!("expected block, got {:?}", other),
    }
}

fn nodes_of<'a>(doc: &'a IrDocument, kind: &str) -> Vec<&'a Node> {
    doc.nodes.values().filter(|n| n.kind_name() == kind).collect()
}

/// Name declared by a single-declarator variable declaration.
fn declared<'a>(doc: &'a IrDocument, decl: &Node) -> &'a str {
    match &decl.kind {
        NodeKind::VariableDeclaration { declarations, .. } => match &node(doc, &declarations[0]).kind {
            NodeKind::VariableDeclarator { id, .. } => name(doc, id),
            other => panic!("expected declarator, got {:?}", other),
        },
        other => panic!("expected declaration, got {:?}", other),
    }
}

fn init<'a>(doc: &'a IrDocument, decl: &Node) -> &'a Node {
    match &decl.kind {
        NodeKind::VariableDeclaration { declarations, .. } => match &node(doc, &declarations[0]).kind {
            NodeKind::VariableDeclarator { init: Some(init), .. } => node(doc, init),
            other => panic!("expected initialized declarator, got {:?}", other),
        },
        other => panic!("expected declaration, got {:?}", other),
    }
}

// ============================================================================
// Switch
// ============================================================================

#[test]
fn test_switch_becomes_if_chain() {
    let doc = compile_ok(
        "switch (x) { case 1: case 2: a(); break; case 3: b(); break; default: c(); }",
    );
    let stmts = body(&doc);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].meta.has_tag("desugar:switch"));
    let NodeKind::IfStatement { test, alternate: Some(alternate), .. } = &stmts[0].kind else {
        panic!("expected if statement, got {:?}", stmts[0].kind);
    };
    // `case 1: case 2:` share one branch.
    match &node(&doc, test).kind {
        NodeKind::LogicalExpression { operator, .. } => assert_eq!(operator, "||"),
        other => panic!("expected combined test, got {:?}", other),
    }
    let NodeKind::IfStatement { alternate: Some(default), consequent, .. } = &node(&doc, alternate).kind else {
        panic!("expected second arm");
    };
    // Trailing breaks are dropped.
    assert_eq!(block(&doc, consequent).len(), 1);
    assert_eq!(block(&doc, default).len(), 1);
    assert!(nodes_of(&doc, "BreakStatement").is_empty());
    assert!(nodes_of(&doc, "BreakScope").is_empty());
}

#[test]
fn test_switch_case_falls_through_to_next_jump() {
    let doc = compile_ok(
        "switch (x) { case 1: a(); case 2: b(); break; case 3: c(); default: d(); }",
    );
    let stmts = body(&doc);
    let NodeKind::IfStatement { consequent, alternate: Some(second), .. } = &stmts[0].kind else {
        panic!("expected if statement, got {:?}", stmts[0].kind);
    };
    // case 1 runs a() then b(), stopping at case 2's break.
    assert_eq!(block(&doc, consequent).len(), 2);
    let NodeKind::IfStatement { consequent, alternate: Some(third), .. } = &node(&doc, second).kind else {
        panic!("expected second arm");
    };
    assert_eq!(block(&doc, consequent).len(), 1);
    // case 3 runs into the default body.
    let NodeKind::IfStatement { consequent, alternate: Some(default), .. } = &node(&doc, third).kind else {
        panic!("expected third arm");
    };
    assert_eq!(block(&doc, consequent).len(), 2);
    assert_eq!(block(&doc, default).len(), 1);
    assert!(nodes_of(&doc, "BreakScope").is_empty());
}

#[test]
fn test_switch_with_inner_break_gets_scope() {
    let doc = compile_ok("switch (x) { case 1: if (y) { break; } z(); break; }");
    let stmts = body(&doc);
    assert_eq!(stmts[0].kind_name(), "BreakScope");
    assert_eq!(nodes_of(&doc, "BreakStatement").len(), 1);
}

#[test]
fn test_switch_binds_complex_discriminant_once() {
    let doc = compile_ok("switch (f()) { case 1: a(); break; case 2: b(); }");
    let stmts = body(&doc);
    assert_eq!(declared(&doc, stmts[0]), "__switch_0");
    assert!(stmts[0].meta.has_tag("desugar:switch"));
    assert_eq!(nodes_of(&doc, "CallExpression").len(), 3);
}

// ============================================================================
// Destructuring
// ============================================================================

#[test]
fn test_array_destructuring_skips_holes() {
    let doc = compile_ok("const [a, , b] = arr;");
    let stmts = body(&doc);
    let names: Vec<&str> = stmts.iter().map(|s| declared(&doc, s)).collect();
    assert_eq!(names, vec!["__ref_0", "a", "b"]);

    let NodeKind::MemberExpression { property, computed, .. } = &init(&doc, stmts[2]).kind else {
        panic!("expected indexed access");
    };
    assert!(computed);
    match &node(&doc, property).kind {
        NodeKind::Literal { value, .. } => assert_eq!(value, &LiteralValue::Number(2.0)),
        other => panic!("expected numeric index, got {:?}", other),
    }
}

#[test]
fn test_array_rest_unpacks_tail() {
    let doc = compile_ok("let [head, ...tail] = list;");
    let stmts = body(&doc);
    assert_eq!(declared(&doc, stmts[2]), "tail");
    let NodeKind::ArrayExpression { elements } = &init(&doc, stmts[2]).kind else {
        panic!("expected packed table");
    };
    let NodeKind::CallExpression { callee, arguments, .. } = &node(&doc, &elements[0]).kind else {
        panic!("expected unpack call");
    };
    assert_eq!(name(&doc, callee), "unpack");
    assert_eq!(arguments.len(), 2);
}

#[test]
fn test_object_destructuring_with_default() {
    let doc = compile_ok("const { x, y: z = 5 } = point;");
    let stmts = body(&doc);
    let kinds: Vec<&str> = stmts.iter().map(|s| s.kind_name()).collect();
    assert_eq!(
        kinds,
        vec!["VariableDeclaration", "VariableDeclaration", "VariableDeclaration", "IfStatement"]
    );
    assert_eq!(declared(&doc, stmts[2]), "z");
}

#[test]
fn test_object_rest_is_rejected() {
    let err = lower_err("const { a, ...rest } = o;");
    assert_eq!(err.node_type(), Some("RestElement"));
}

#[test]
fn test_destructuring_assignment() {
    let doc = compile_ok("let a, b; [a, b] = [b, a];");
    let assigns = nodes_of(&doc, "AssignmentStatement");
    assert_eq!(assigns.len(), 2);
}

// ============================================================================
// Try / class / wrappers
// ============================================================================

#[test]
fn test_try_catch_finally_order() {
    let doc = compile_ok("try { risky(); } catch (e) { handle(e); } finally { cleanup(); }");
    let stmts = body(&doc);
    assert_eq!(stmts.len(), 1);
    assert!(stmts[0].meta.has_tag("desugar:try"));
    let NodeKind::BlockStatement { body: inner } = &stmts[0].kind else {
        panic!("expected try scope");
    };
    let kinds: Vec<&str> = inner.iter().map(|id| node(&doc, id).kind_name()).collect();
    assert_eq!(kinds, vec!["ProtectedCall", "IfStatement", "BlockStatement", "IfStatement"]);

    // The handler runs under its own protected call so the finalizer survives it.
    let NodeKind::IfStatement { consequent, .. } = &node(&doc, &inner[1]).kind else {
        panic!("expected handler guard");
    };
    let handler: Vec<&str> = block(&doc, consequent).iter().map(|n| n.kind_name()).collect();
    assert_eq!(handler, vec!["ProtectedCall", "AssignmentStatement", "AssignmentStatement"]);

    let NodeKind::ProtectedCall { status, error, callee } = &node(&doc, &inner[0]).kind else {
        panic!("expected protected call");
    };
    assert_eq!(name(&doc, status), "__ok_0");
    assert_eq!(name(&doc, error), "__err_1");
    assert!(matches!(node(&doc, callee).kind, NodeKind::FunctionExpression { cfg: Some(_), .. }));
}

#[test]
fn test_try_finally_rethrows() {
    let doc = compile_ok("try { risky(); } finally { cleanup(); }");
    let NodeKind::BlockStatement { body: inner } = &body(&doc)[0].kind else {
        panic!("expected try scope");
    };
    let last = node(&doc, inner.last().unwrap());
    let NodeKind::IfStatement { consequent, .. } = &last.kind else {
        panic!("expected rethrow guard");
    };
    assert_eq!(block(&doc, consequent)[0].kind_name(), "ThrowStatement");
}

#[test]
fn test_try_without_finalizer_keeps_handler_inline() {
    let doc = compile_ok("try { risky(); } catch (e) { handle(e); }");
    let NodeKind::BlockStatement { body: inner } = &body(&doc)[0].kind else {
        panic!("expected try scope");
    };
    let kinds: Vec<&str> = inner.iter().map(|id| node(&doc, id).kind_name()).collect();
    assert_eq!(kinds, vec!["ProtectedCall", "IfStatement"]);
}

#[test]
fn test_return_inside_try_is_forwarded() {
    let doc = compile_ok("function f() { try { return 1; } catch (e) { return 2; } return 3; }");
    let NodeKind::FunctionDeclaration { body: function_body, .. } = &body(&doc)[0].kind else {
        panic!("expected function");
    };
    let statements = block(&doc, function_body);
    let NodeKind::BlockStatement { body: inner } = &statements[0].kind else {
        panic!("expected try scope");
    };

    // Inside the protected body the value comes back boxed.
    let NodeKind::ProtectedCall { callee, .. } = &node(&doc, &inner[0]).kind else {
        panic!("expected protected call");
    };
    let NodeKind::FunctionExpression { body: wrapped, .. } = &node(&doc, callee).kind else {
        panic!("expected wrapper function");
    };
    let NodeKind::ReturnStatement { argument: Some(argument) } = &block(&doc, wrapped)[0].kind else {
        panic!("expected return");
    };
    assert_eq!(node(&doc, argument).kind_name(), "ArrayExpression");

    // The handler is inline, so its return stays a plain return.
    let NodeKind::IfStatement { consequent, .. } = &node(&doc, &inner[1]).kind else {
        panic!("expected handler guard");
    };
    let NodeKind::ReturnStatement { argument: Some(argument) } = &block(&doc, consequent)[1].kind else {
        panic!("expected handler return");
    };
    assert_eq!(node(&doc, argument).kind_name(), "Literal");

    // After the handler: if ok and err then return err[1] end
    let NodeKind::IfStatement { test, consequent, .. } = &node(&doc, inner.last().unwrap()).kind else {
        panic!("expected forwarded return");
    };
    assert_eq!(node(&doc, test).kind_name(), "LogicalExpression");
    assert_eq!(block(&doc, consequent)[0].kind_name(), "ReturnStatement");
    assert_eq!(statements[1].kind_name(), "ReturnStatement");
}

#[test]
fn test_break_inside_try_is_rejected() {
    let err = lower_err("while (true) { try { break; } catch (e) {} }");
    assert!(matches!(err, LowerError::JumpOutsideLoop { statement: "break", .. }));
}

#[test]
fn test_class_lowering() {
    let doc = compile_ok(
        "class Point extends Base {
            z = 0;
            constructor(x) { super(x); this.x = x; }
            norm() { return this.x; }
            static origin() { return new Point(0); }
        }
        const p = new Point(1);
        p.norm();",
    );
    let stmts = body(&doc);
    let NodeKind::FunctionDeclaration { name: class_name, params, super_class, cfg, .. } = &stmts[0].kind else {
        panic!("expected constructor function");
    };
    assert!(stmts[0].meta.class_like);
    assert_eq!(name(&doc, class_name), "Point");
    assert_eq!(name(&doc, &params[0]), "self");
    assert_eq!(name(&doc, super_class.as_ref().unwrap()), "Base");
    assert!(cfg.is_some());

    assert_eq!(stmts[1].kind_name(), "AssignmentStatement");
    assert_eq!(stmts[2].kind_name(), "AssignmentStatement");

    let method_calls: Vec<&Node> = nodes_of(&doc, "CallExpression")
        .into_iter()
        .filter(|n| matches!(n.kind, NodeKind::CallExpression { method: true, .. }))
        .collect();
    assert_eq!(method_calls.len(), 1);
    assert_eq!(nodes_of(&doc, "NewExpression").len(), 2);
}

#[test]
fn test_class_getter_is_rejected() {
    let err = lower_err("class A { get x() { return 1; } }");
    assert!(err.to_string().contains("getters and setters"));
}

#[test]
fn test_update_as_expression_uses_wrapper() {
    let doc = compile_ok("let i = 0; let y = i++;");
    let stmts = body(&doc);
    let wrapper = init(&doc, stmts[1]);
    assert!(wrapper.meta.has_tag("wrapper:update"));
    assert!(matches!(wrapper.kind, NodeKind::CallExpression { ref arguments, .. } if arguments.is_empty()));
}

#[test]
fn test_bare_update_is_plain_assignment() {
    let doc = compile_ok("let i = 0; i++; i += 2;");
    let stmts = body(&doc);
    assert_eq!(stmts[1].kind_name(), "AssignmentStatement");
    assert_eq!(stmts[2].kind_name(), "AssignmentStatement");
    assert!(nodes_of(&doc, "FunctionExpression").is_empty());
}

#[test]
fn test_optional_chain_and_nullish_wrappers() {
    let doc = compile_ok("const a = o?.b.c; const b = x ?? 1;");
    let stmts = body(&doc);
    assert!(init(&doc, stmts[0]).meta.has_tag("wrapper:optional"));
    assert!(init(&doc, stmts[1]).meta.has_tag("wrapper:nullish"));
}

#[test]
fn test_optional_method_call_keeps_receiver() {
    let doc = compile_ok("class A { m() { return this.v; } } const r = a.m?.(1);");
    let calls: Vec<&Node> = nodes_of(&doc, "CallExpression")
        .into_iter()
        .filter(|n| matches!(&n.kind, NodeKind::CallExpression { arguments, .. } if arguments.len() == 2))
        .collect();
    assert_eq!(calls.len(), 1);
    let NodeKind::CallExpression { callee, arguments, method } = &calls[0].kind else {
        unreachable!();
    };
    assert!(!method);
    // __opt_B(__opt_A, 1), where __opt_A holds `a` and __opt_B holds `__opt_A.m`.
    let receiver = name(&doc, &arguments[0]);
    let function = name(&doc, callee);
    assert!(receiver.starts_with("__opt_"), "{}", receiver);
    assert!(function.starts_with("__opt_"), "{}", function);
    assert_ne!(receiver, function);
}

#[test]
fn test_template_literal_concatenates() {
    let doc = compile_ok("const s = `Hello, ${name}!`;");
    let value = init(&doc, body(&doc)[0]);
    let NodeKind::BinaryExpression { operator, left, .. } = &value.kind else {
        panic!("expected concatenation");
    };
    assert_eq!(operator, "+");
    assert!(matches!(node(&doc, left).kind, NodeKind::BinaryExpression { .. }));
    let tostring = nodes_of(&doc, "Identifier")
        .into_iter()
        .filter(|n| matches!(&n.kind, NodeKind::Identifier { name } if name == "tostring"))
        .count();
    assert_eq!(tostring, 1);
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_c_style_for_becomes_scoped_while() {
    let doc = compile_ok("for (let i = 0; i < 3; i++) { f(i); }");
    let stmts = body(&doc);
    assert!(stmts[0].meta.has_tag("desugar:for"));
    let inner = block(&doc, &doc.module.body[0]);
    assert_eq!(inner[0].kind_name(), "VariableDeclaration");
    let NodeKind::WhileStatement { update: Some(update), .. } = &inner[1].kind else {
        panic!("expected while with update");
    };
    assert_eq!(node(&doc, update).kind_name(), "AssignmentStatement");
}

#[test]
fn test_for_of_and_for_in() {
    let doc = compile_ok("for (const v of list) { f(v); } for (const k in obj) { g(k); }");
    let stmts = body(&doc);
    let NodeKind::ForEachStatement { iteration, value: Some(value), key: None, .. } = &stmts[0].kind else {
        panic!("expected values loop");
    };
    assert_eq!(*iteration, Iteration::Values);
    assert_eq!(name(&doc, value), "v");
    let NodeKind::ForEachStatement { iteration, key: Some(key), .. } = &stmts[1].kind else {
        panic!("expected keys loop");
    };
    assert_eq!(*iteration, Iteration::Keys);
    assert_eq!(name(&doc, key), "k");
}

#[test]
fn test_for_of_with_pattern_binds_from_item() {
    let doc = compile_ok("for (const [k, v] of pairs) { use(k, v); }");
    let NodeKind::ForEachStatement { value: Some(value), body: loop_body, .. } = &body(&doc)[0].kind else {
        panic!("expected loop");
    };
    assert_eq!(name(&doc, value), "__item_0");
    let first = block(&doc, loop_body);
    assert_eq!(declared(&doc, first[0]), "__ref_1");
}

#[test]
fn test_jumps_outside_loops_are_rejected() {
    assert!(matches!(
        lower_err("break;"),
        LowerError::JumpOutsideLoop { statement: "break", .. }
    ));
    assert!(matches!(
        lower_err("switch (x) { case 1: continue; }"),
        LowerError::JumpOutsideLoop { statement: "continue", .. }
    ));
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_function_params() {
    let doc = compile_ok("function f(a, b = 2, ...rest) { return a + b; }");
    let NodeKind::FunctionDeclaration { params, body: fn_body, vararg, .. } = &body(&doc)[0].kind else {
        panic!("expected function");
    };
    assert!(*vararg);
    assert_eq!(params.len(), 2);
    let stmts = block(&doc, fn_body);
    assert_eq!(stmts[0].kind_name(), "IfStatement");
    assert_eq!(declared(&doc, stmts[1]), "rest");
}

#[test]
fn test_this_gives_function_expression_self() {
    let doc = compile_ok("const o = { n: 1, read: function() { return this.n; }, f: () => 1 };");
    let functions = nodes_of(&doc, "FunctionExpression");
    let with_self = functions
        .iter()
        .filter(|f| match &f.kind {
            NodeKind::FunctionExpression { params, .. } => {
                params.first().is_some_and(|p| name(&doc, p) == "self")
            }
            _ => false,
        })
        .count();
    assert_eq!(with_self, 1);
}

#[test]
fn test_unsupported_constructs_name_their_type() {
    assert_eq!(lower_err("function* g() {}").node_type(), Some("Generator"));
    assert_eq!(lower_err("async function g() {}").node_type(), Some("AsyncFunction"));
    assert_eq!(lower_err("f(...args);").node_type(), Some("SpreadElement"));
    assert_eq!(lower_err("outer: while (x) { break outer; }").node_type(), Some("LabeledStatement"));
    let err = lower_err("x = a instanceof B;");
    assert!(err.to_string().contains("instanceof"));
    assert!(err.loc().is_some());
}

// ============================================================================
// Control-flow graphs
// ============================================================================

#[test]
fn test_every_function_has_a_registered_cfg() {
    let doc = compile_ok(
        "function f(x) { if (x) { return 1; } else { x = 2; } while (x) { x--; } return x; }
         const g = () => f(1);",
    );
    for n in doc.nodes.values() {
        let cfg = match &n.kind {
            NodeKind::FunctionDeclaration { cfg, .. } | NodeKind::FunctionExpression { cfg, .. } => cfg,
            _ => continue,
        };
        let id = cfg.as_ref().expect("function without cfg");
        let graph = doc.cfg(id).expect("cfg not registered");
        let reachable = graph.reachable();
        assert!(reachable.contains(&graph.exit));
        for block in &reachable {
            for succ in graph.successors_of(block) {
                assert!(graph.predecessors_of(succ).contains(block));
            }
        }
    }
}

#[test]
fn test_cfg_if_forks_and_loop_has_back_edge() {
    let doc = compile_ok("function f(x) { while (x) { if (x) { break; } x--; } }");
    let NodeKind::FunctionDeclaration { cfg: Some(cfg), .. } = &body(&doc)[0].kind else {
        panic!("expected function");
    };
    let graph = doc.cfg(cfg).unwrap();
    let header = graph
        .blocks
        .iter()
        .find(|b| {
            b.statements
                .iter()
                .any(|s| node(&doc, s).kind_name() == "WhileStatement")
        })
        .unwrap();
    // Loop header: entered from before the loop and from the latch.
    assert_eq!(graph.predecessors_of(&header.id).len(), 2);
    let fork = graph
        .blocks
        .iter()
        .find(|b| b.statements.iter().any(|s| node(&doc, s).kind_name() == "IfStatement"))
        .unwrap();
    assert_eq!(graph.successors_of(&fork.id).len(), 2);
}

#[test]
fn test_cfg_code_after_return_is_unreachable() {
    let doc = compile_ok("function f() { return 1; g(); }");
    let NodeKind::FunctionDeclaration { cfg: Some(cfg), .. } = &body(&doc)[0].kind else {
        panic!("expected function");
    };
    let graph = doc.cfg(cfg).unwrap();
    let dead = graph
        .blocks
        .iter()
        .find(|b| b.statements.iter().any(|s| node(&doc, s).kind_name() == "ExpressionStatement"))
        .unwrap();
    assert!(graph.predecessors_of(&dead.id).is_empty());
    assert!(!graph.reachable().contains(&dead.id));
}

// ============================================================================
// Direct API
// ============================================================================

#[test]
fn test_lower_statement_places_companions() {
    let source = "const [a] = t;";
    let raw = lunate_syntax_javascript::parse(source).unwrap();
    let program = normalize_program(&raw, &NormalizeOptions { source: Some(source) }).unwrap();

    let mut lowerer = Lowerer::new(SourceDescriptor {
        path: None,
        content_hash: crate::content_hash(source),
    });
    let last = lowerer.lower_statement(&program.body[0]).unwrap();
    lowerer.builder_mut().push_to_body(last);
    let doc = lowerer.finish(BuildOptions { validate: true }).unwrap();
    let stmts = body(&doc);
    assert_eq!(stmts.len(), 2);
    assert_eq!(declared(&doc, stmts[0]), "__ref_0");
    assert_eq!(declared(&doc, stmts[1]), "a");
}

#[test]
fn test_lower_expression_returns_node() {
    let raw = lunate_syntax_javascript::parse("a + 1;").unwrap();
    let program = normalize_program(&raw, &NormalizeOptions::default()).unwrap();
    let Statement::ExpressionStatement(stmt) = &program.body[0] else {
        panic!("expected expression statement");
    };
    let mut lowerer = Lowerer::new(SourceDescriptor {
        path: None,
        content_hash: String::new(),
    });
    let id = lowerer.lower_expression(&stmt.expression).unwrap();
    assert_eq!(lowerer.builder().node(&id).unwrap().kind_name(), "BinaryExpression");
    assert_eq!(lowerer.builder().node_count(), 3);
}
