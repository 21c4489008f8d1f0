//! Tests for normalization and the compilation pipeline.

use crate::ast::{Expression, ForBinding, Pattern, Statement};
use crate::*;
use serde_json::{json, Value};

fn normalized(raw: Value) -> crate::ast::Program {
    normalize_program(&raw, &NormalizeOptions::default()).unwrap()
}

// ============================================================================
// Normalizer
// ============================================================================

#[test]
fn test_babel_file_and_literals() {
    let raw = json!({
        "type": "File",
        "program": {
            "type": "Program",
            "body": [{
                "type": "VariableDeclaration",
                "declarations": [{
                    "type": "VariableDeclarator",
                    "id": { "type": "Identifier", "name": "x" },
                    "init": { "type": "NumericLiteral", "value": 255, "extra": { "raw": "0xff" } }
                }]
            }, {
                "type": "ExpressionStatement",
                "expression": { "type": "StringLiteral", "value": "hi" }
            }]
        }
    });
    let value = normalize_node(&raw);
    assert_eq!(value["type"], "Program");
    let decl = &value["body"][0];
    assert_eq!(decl["kind"], "var");
    assert_eq!(decl["declarations"][0]["init"]["type"], "Literal");
    assert_eq!(decl["declarations"][0]["init"]["raw"], "0xff");
    assert_eq!(value["body"][1]["expression"]["raw"], "\"hi\"");

    let program = normalized(raw);
    assert_eq!(program.body.len(), 2);
}

#[test]
fn test_babel_optional_chain_becomes_chain_expression() {
    // a?.b()
    let raw = json!({
        "type": "ExpressionStatement",
        "expression": {
            "type": "OptionalCallExpression",
            "optional": false,
            "arguments": [],
            "callee": {
                "type": "OptionalMemberExpression",
                "optional": true,
                "computed": false,
                "object": { "type": "Identifier", "name": "a" },
                "property": { "type": "Identifier", "name": "b" }
            }
        }
    });
    let value = normalize_node(&raw);
    let chain = &value["expression"];
    assert_eq!(chain["type"], "ChainExpression");
    assert_eq!(chain["expression"]["type"], "CallExpression");
    assert_eq!(chain["expression"]["optional"], false);
    assert_eq!(chain["expression"]["callee"]["type"], "MemberExpression");
    assert_eq!(chain["expression"]["callee"]["optional"], true);
}

#[test]
fn test_babel_class_and_object_members() {
    let function_body = json!({ "type": "BlockStatement", "body": [] });
    let raw = json!({
        "type": "Program",
        "body": [{
            "type": "ClassDeclaration",
            "id": { "type": "Identifier", "name": "A" },
            "body": {
                "type": "ClassBody",
                "body": [
                    { "type": "ClassMethod", "kind": "method", "key": { "type": "Identifier", "name": "m" },
                      "params": [], "body": function_body },
                    { "type": "ClassProperty", "key": { "type": "Identifier", "name": "f" },
                      "value": { "type": "NumericLiteral", "value": 1 } }
                ]
            }
        }, {
            "type": "ExpressionStatement",
            "expression": {
                "type": "ObjectExpression",
                "properties": [
                    { "type": "ObjectProperty", "key": { "type": "Identifier", "name": "a" },
                      "value": { "type": "NullLiteral" } },
                    { "type": "ObjectMethod", "kind": "method", "key": { "type": "Identifier", "name": "go" },
                      "params": [], "body": function_body }
                ]
            }
        }]
    });
    let value = normalize_node(&raw);
    let members = &value["body"][0]["body"]["body"];
    assert_eq!(members[0]["type"], "MethodDefinition");
    assert_eq!(members[0]["value"]["type"], "FunctionExpression");
    assert_eq!(members[0]["static"], false);
    assert_eq!(members[1]["type"], "PropertyDefinition");

    let props = &value["body"][1]["expression"]["properties"];
    assert_eq!(props[0]["type"], "Property");
    assert_eq!(props[0]["value"]["raw"], "null");
    assert_eq!(props[1]["method"], true);
    assert_eq!(props[1]["kind"], "init");

    let program = normalized(raw);
    assert!(matches!(program.body[0], Statement::ClassDeclaration(_)));
}

#[test]
fn test_parentheses_and_comments_are_dropped() {
    let raw = json!({
        "type": "ExpressionStatement",
        "leadingComments": [{ "type": "CommentLine", "value": " hi" }],
        "expression": {
            "type": "ParenthesizedExpression",
            "expression": { "type": "Identifier", "name": "x", "start": 1, "end": 2 }
        }
    });
    let value = normalize_node(&raw);
    assert_eq!(
        value,
        json!({ "type": "ExpressionStatement", "expression": { "type": "Identifier", "name": "x" } })
    );
}

#[test]
fn test_unknown_types_become_unsupported() {
    let raw = json!({
        "type": "ExpressionStatement",
        "expression": {
            "type": "YieldExpression",
            "argument": { "type": "Identifier", "name": "x" },
            "loc": { "start": { "line": 3, "column": 4 }, "end": { "line": 3, "column": 11 } }
        }
    });
    let value = normalize_node(&raw);
    assert_eq!(value["expression"]["type"], "Unsupported");
    assert_eq!(value["expression"]["nodeType"], "YieldExpression");
    assert_eq!(value["expression"]["loc"]["start"]["line"], 3);
    assert!(value["expression"].get("argument").is_none());

    let regex = normalize_node(&json!({ "type": "Literal", "value": {}, "regex": { "pattern": "a" } }));
    assert_eq!(regex["nodeType"], "RegExpLiteral");
}

#[test]
fn test_defaults_are_filled() {
    let value = normalize_node(&json!({
        "type": "ArrowFunctionExpression",
        "body": { "type": "Identifier", "name": "x" }
    }));
    assert_eq!(value["params"], json!([]));
    assert_eq!(value["expression"], true);
    assert_eq!(value["async"], false);
    assert_eq!(value["generator"], false);

    let member = normalize_node(&json!({
        "type": "MemberExpression",
        "object": { "type": "Identifier", "name": "a" },
        "property": { "type": "Identifier", "name": "b" }
    }));
    assert_eq!(member["computed"], false);
    assert_eq!(member["optional"], false);
}

#[test]
fn test_directives_are_lifted() {
    let estree = json!({
        "type": "Program",
        "body": [
            { "type": "ExpressionStatement", "directive": "use strict",
              "expression": { "type": "Literal", "value": "use strict", "raw": "'use strict'" } },
            { "type": "EmptyStatement" }
        ]
    });
    let program = normalized(estree);
    assert_eq!(program.directives, vec!["use strict".to_string()]);
    assert_eq!(program.body.len(), 1);

    let babel = json!({
        "type": "Program",
        "directives": [{ "type": "Directive", "value": { "type": "DirectiveLiteral", "value": "use strict" } }],
        "body": []
    });
    assert_eq!(normalized(babel).directives, vec!["use strict".to_string()]);
}

#[test]
fn test_normalization_is_idempotent() {
    let sources = [
        "const [a, b = 2] = arr; let o = { x, y: 1, m() { return this.x; } };",
        "a?.b.c?.(d); x ?? y; class A extends B { constructor() { super(); } m() {} }",
        "'use strict'; for (const k in o) { if (k) { continue; } } label: while (1) { break label; }",
        "let s = `a${b}c`; switch (x) { case 1: break; default: f(); }",
    ];
    for source in sources {
        let raw = lunate_syntax_javascript::parse(source).unwrap();
        let once = normalize_node(&raw);
        let twice = normalize_node(&once);
        assert_eq!(once, twice, "normalization not idempotent for {:?}", source);
    }
}

#[test]
fn test_parsed_source_round_trips_through_typed_ast() {
    let source = "for (const [k, v] of entries) { log(k, v); }";
    let raw = lunate_syntax_javascript::parse(source).unwrap();
    let program = normalize_program(&raw, &NormalizeOptions { source: Some(source) }).unwrap();
    let Statement::ForOfStatement(for_of) = &program.body[0] else {
        panic!("expected for-of, got {:?}", program.body[0]);
    };
    let ForBinding::Declaration(decl) = &for_of.left else {
        panic!("expected declaration binding");
    };
    assert!(matches!(decl.declarations[0].id, Pattern::ArrayPattern(_)));
    assert!(matches!(for_of.right, Expression::Identifier(_)));
}

#[test]
fn test_non_program_roots_are_rejected() {
    assert!(matches!(
        normalize_program(&json!([1]), &NormalizeOptions::default()),
        Err(NormalizeError::NotAnObject("array"))
    ));
    assert!(matches!(
        normalize_program(&json!({ "type": "Identifier", "name": "x" }), &NormalizeOptions::default()),
        Err(NormalizeError::NotAProgram(t)) if t == "Identifier"
    ));
}

// ============================================================================
// Error-placeholder recovery
// ============================================================================

fn placeholder_program(source: &str) -> Value {
    json!({
        "type": "Program",
        "body": [{
            "type": "ErrorPlaceholder",
            "range": [0, source.len()],
            "loc": { "start": { "line": 1, "column": 0 }, "end": { "line": 1, "column": source.len() } }
        }]
    })
}

#[test]
fn test_recovery_of_array_destructuring() {
    let source = "const [a, b] = config.pair;";
    let program = normalize_program(&placeholder_program(source), &NormalizeOptions { source: Some(source) })
        .unwrap();
    let Statement::VariableDeclaration(decl) = &program.body[0] else {
        panic!("expected recovered declaration");
    };
    let Pattern::ArrayPattern(pattern) = &decl.declarations[0].id else {
        panic!("expected array pattern");
    };
    assert_eq!(pattern.elements.len(), 2);
    assert!(matches!(decl.declarations[0].init, Some(Expression::MemberExpression(_))));
}

#[test]
fn test_recovery_of_object_destructuring_and_literals() {
    let source = "let { a, b: c } = source";
    let program = normalize_program(&placeholder_program(source), &NormalizeOptions { source: Some(source) })
        .unwrap();
    assert!(matches!(
        &program.body[0],
        Statement::VariableDeclaration(d) if matches!(d.declarations[0].id, Pattern::ObjectPattern(_))
    ));

    let source = "var greeting = 'hi\\n';";
    let value = normalize_program_value(&placeholder_program(source), &NormalizeOptions { source: Some(source) })
        .unwrap();
    let init = &value["body"][0]["declarations"][0]["init"];
    assert_eq!(init["value"], "hi\n");
    assert_eq!(init["raw"], "'hi\\n'");
}

#[test]
fn test_unrecoverable_placeholder_reports_span() {
    let source = "if (x {";
    match normalize_program(&placeholder_program(source), &NormalizeOptions { source: Some(source) }) {
        Err(NormalizeError::Unrecoverable { start, end, line, text }) => {
            assert_eq!((start, end, line), (0, 7, 1));
            assert_eq!(text, source);
        }
        other => panic!("expected unrecoverable error, got {:?}", other),
    }
}

#[test]
fn test_nested_error_nodes_are_unsupported() {
    let value = normalize_node(&json!({
        "type": "BlockStatement",
        "body": [{ "type": "ErrorPlaceholder", "range": [0, 1] }]
    }));
    assert_eq!(value["body"][0]["type"], "Unsupported");
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_compile_records_source_and_metadata() {
    let source = "let x = 1;";
    let doc = compile(source, &CompileOptions::with_path("x.js")).unwrap();
    assert_eq!(doc.module.source.path.as_deref(), Some("x.js"));
    assert_eq!(doc.module.source.content_hash, content_hash(source));
    assert!(doc.module.source.content_hash.starts_with("sha256:"));
    assert_eq!(doc.module.metadata["compiler"], "lunate");
    assert!(doc.module.metadata.contains_key("createdAt"));
    assert!(!doc.module.metadata.contains_key("timings"));
}

#[test]
fn test_compile_merges_caller_metadata() {
    let mut options = CompileOptions::with_path("x.js");
    options.metadata.insert("project".into(), json!("demo"));
    options.metadata.insert("compiler".into(), json!("custom"));
    options.metadata.insert("createdAt".into(), json!(0));
    let doc = compile("let x = 1;", &options).unwrap();
    assert_eq!(doc.module.metadata["project"], "demo");
    assert_eq!(doc.module.metadata["compiler"], "custom");
    assert_ne!(doc.module.metadata["createdAt"], json!(0));

    let options: CompileOptions =
        serde_json::from_value(json!({ "metadata": { "build": 7 } })).unwrap();
    assert_eq!(options.metadata["build"], json!(7));
    assert!(options.validate);
}

#[test]
fn test_compile_records_timings_on_request() {
    let options = CompileOptions {
        record_timings: true,
        ..CompileOptions::default()
    };
    let doc = compile("f();", &options).unwrap();
    let timings = &doc.module.metadata["timings"];
    for key in ["parseMs", "normalizeMs", "lowerMs", "validateMs"] {
        assert!(timings.get(key).is_some(), "missing {}", key);
    }
}

#[test]
fn test_compile_carries_directives() {
    let doc = compile("'use strict';\nlet a = 1;", &CompileOptions::default()).unwrap();
    assert_eq!(doc.module.directives, vec!["use strict".to_string()]);
    assert_eq!(doc.module.body.len(), 1);
}

#[test]
fn test_compile_errors_name_their_stage() {
    let err = compile("function* g() {}", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.stage(), "lower");
    assert_eq!(err.unsupported_node_type(), Some("Generator"));
    assert!(err.to_string().starts_with("lower failed"));

    let err = compile("if (x {", &CompileOptions::default()).unwrap_err();
    assert_eq!(err.stage(), "normalize");
}

#[test]
fn test_compile_raw_accepts_babel_ast() {
    let raw = json!({
        "type": "File",
        "program": {
            "type": "Program",
            "body": [{
                "type": "ExpressionStatement",
                "expression": {
                    "type": "CallExpression",
                    "callee": { "type": "Identifier", "name": "f" },
                    "arguments": [{ "type": "BooleanLiteral", "value": true }]
                }
            }]
        }
    });
    let doc = compile_raw(&raw, "f(true)", &CompileOptions::default()).unwrap();
    assert_eq!(doc.module.body.len(), 1);
    assert!(lunate_ir::validate_ir(&doc).unwrap().ok);
}

#[test]
fn test_compile_options_from_toml_shape() {
    let options: CompileOptions = serde_json::from_value(json!({ "record-timings": true })).unwrap();
    assert!(options.validate);
    assert!(options.record_timings);
    assert_eq!(options.path, None);
}
