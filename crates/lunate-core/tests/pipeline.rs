//! End-to-end compilation: determinism and schema conformance.

use lunate_core::{compile, CompileOptions};
use lunate_ir::{validate_value, IrDocument, NodeKind};
use proptest::prelude::*;

const CORPUS: &[&str] = &[
    "function add(a, b) { return a + b; }",
    "const name = 'World'; const greeting = `Hello, ${name}!`;",
    "let i = 0; let y = i++; while (i < 10) { if (i % 2 === 0) { i += 1; continue; } i++; }",
    "switch (op) { case 'a': case 'b': f(); break; case 'c': g(); default: h(); }",
    "try { risky(); } catch (e) { log(e.message); } finally { done(); }",
    "class Point { constructor(x, y) { this.x = x; this.y = y; } norm() { return this.x * this.x + this.y * this.y; } }",
    "class Point3 extends Point { z = 0; scale(k) { return super.norm() * k; } }",
    "const { a, b: [c, , d = 4], ...rest } = obj;",
    "for (const [k, v] of pairs) { out[k] = v ?? 0; } for (const key in table) { n++; }",
    "const f = (x, ...xs) => xs.length > 0 ? x : a?.b?.(x);",
    "do { n--; } while (n > 0); for (let j = 0; j < 3; j++) { if (j) break; }",
];

fn compile_document(source: &str) -> IrDocument {
    compile(source, &CompileOptions::with_path("corpus.js"))
        .unwrap_or_else(|err| panic!("failed to compile {:?}: {}", source, err))
}

#[test]
fn test_corpus_conforms_to_schema() {
    for source in CORPUS {
        // Object rest is rejected; everything else in the corpus compiles.
        if source.contains("...rest") {
            continue;
        }
        let document = compile_document(source);
        let value = serde_json::to_value(&document).unwrap();
        let report = validate_value(&value).unwrap();
        assert!(report.ok, "{:?} failed validation: {:?}", source, report.errors);

        let reparsed: IrDocument = serde_json::from_str(&document.to_json_pretty().unwrap()).unwrap();
        assert_eq!(reparsed, document);
    }
}

#[test]
fn test_compilation_is_deterministic() {
    for source in CORPUS.iter().filter(|s| !s.contains("...rest")) {
        let first = compile_document(source).without_volatile();
        let first_json = serde_json::to_string(&first).unwrap();
        for _ in 0..5 {
            let next = compile_document(source);
            assert!(first.deterministic_eq(&next));
            assert_eq!(serde_json::to_string(&next.without_volatile()).unwrap(), first_json);
        }
    }
}

#[test]
fn test_switch_leaves_no_switch_behind() {
    let document = compile_document(CORPUS[3]);
    let ifs = document
        .nodes
        .values()
        .filter(|node| matches!(node.kind, NodeKind::IfStatement { .. }))
        .filter(|node| node.meta.has_tag("desugar:switch"))
        .count();
    assert!(ifs >= 3);
    let json = serde_json::to_string(&document).unwrap();
    assert!(!json.contains("SwitchStatement"));
    assert!(!json.contains("SwitchCase"));
}

#[test]
fn test_object_rest_is_reported_with_location() {
    let err = compile(CORPUS[7], &CompileOptions::default()).unwrap_err();
    assert_eq!(err.stage(), "lower");
    assert_eq!(err.unsupported_node_type(), Some("RestElement"));
    assert!(err.to_string().contains("1:"));
}

#[test]
fn test_every_function_has_a_graph() {
    let document = compile_document(CORPUS[5]);
    for node in document.nodes.values() {
        let cfg = match &node.kind {
            NodeKind::FunctionExpression { cfg, .. } | NodeKind::FunctionDeclaration { cfg, .. } => cfg,
            _ => continue,
        };
        let cfg = cfg.as_ref().expect("function without a control-flow graph");
        let graph = document.cfg(cfg).expect("dangling cfg reference");
        assert!(graph.blocks.contains_key(&graph.entry));
        assert!(graph.blocks.contains_key(&graph.exit));
    }
}

fn identifier() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["a", "b", "count", "total", "x1", "_tmp"]).prop_map(str::to_string)
}

fn statement() -> impl Strategy<Value = String> {
    (identifier(), identifier(), 0u32..1000).prop_flat_map(|(a, b, n)| {
        prop::sample::select(vec![
            format!("let {a} = {n};"),
            format!("{a} = {b} + {n};"),
            format!("if ({a} > {n}) {{ {b}++; }} else {{ {b}--; }}"),
            format!("while ({a} < {n}) {{ {a} += 1; }}"),
            format!("{a}({b}, '{n}');"),
            format!("const {{ {a} }} = {b};"),
            format!("for (const {a} of {b}) {{ total += {a}; }}"),
        ])
    })
}

proptest! {
    #[test]
    fn prop_generated_programs_are_valid_and_stable(statements in prop::collection::vec(statement(), 1..8)) {
        let source = statements.join("\n");
        let first = compile(&source, &CompileOptions::default()).unwrap();
        let second = compile(&source, &CompileOptions::default()).unwrap();
        prop_assert!(first.deterministic_eq(&second));
        prop_assert!(lunate_ir::validate_ir(&first).unwrap().ok);
    }
}
