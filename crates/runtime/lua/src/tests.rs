//! Tests for lunate-runtime-lua code generation.

use crate::codegen::{lua_string_literal, to_lua_name};
use crate::{emit, emit_with, EmitError, EmitOptions};
use lunate_core::{compile, CompileOptions};
use lunate_ir::{BuildOptions, IrBuilder, IrDocument, LiteralValue, NodeId, SourceDescriptor};

fn lua(source: &str) -> String {
    let document = compile(source, &CompileOptions::default()).unwrap();
    emit(&document).unwrap()
}

fn builder() -> IrBuilder {
    IrBuilder::new(SourceDescriptor {
        path: None,
        content_hash: "sha256:00".into(),
    })
}

/// Emit a single expression as `local v = <expr>`.
fn expression(build: impl FnOnce(&mut IrBuilder) -> NodeId) -> String {
    let mut b = builder();
    let value = build(&mut b);
    let declaration = b.local("v", Some(value), Default::default());
    b.push_to_body(declaration);
    let document = b.build(BuildOptions { validate: true }).unwrap();
    emit(&document).unwrap().trim_end().to_string()
}

// ============================================================================
// Names and literals
// ============================================================================

#[test]
fn test_lua_names() {
    assert_eq!(to_lua_name("count"), "count");
    assert_eq!(to_lua_name("end"), "_end");
    assert_eq!(to_lua_name("$el"), "_el");
    assert_eq!(to_lua_name("_el"), to_lua_name("$el"));
    assert_eq!(to_lua_name("1st"), "_1st");
}

#[test]
fn test_string_escaping() {
    assert_eq!(lua_string_literal("hello"), "\"hello\"");
    assert_eq!(lua_string_literal("with \"quotes\""), "\"with \\\"quotes\\\"\"");
    assert_eq!(lua_string_literal("line1\nline2"), "[[line1\nline2]]");
    assert_eq!(lua_string_literal("\nlead"), "\"\\nlead\"");
    assert_eq!(lua_string_literal("a]]\nb"), "\"a]]\\nb\"");
    assert_eq!(lua_string_literal("bell\u{7}"), "\"bell\\007\"");
}

#[test]
fn test_literals() {
    assert_eq!(expression(|b| b.null()), "local v = nil");
    assert_eq!(expression(|b| b.literal(LiteralValue::Bool(true))), "local v = true");
    assert_eq!(expression(|b| b.number(3.5)), "local v = 3.5");
    assert_eq!(expression(|b| b.number(f64::INFINITY)), "local v = (1/0)");
    assert_eq!(expression(|b| b.identifier("undefined")), "local v = nil");
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_precedence_keeps_grouping() {
    let code = expression(|b| {
        let a = b.identifier("a");
        let bb = b.identifier("b");
        let c = b.identifier("c");
        let inner = b.binary_expression(bb, "-", c);
        b.binary_expression(a, "-", inner)
    });
    assert_eq!(code, "local v = a - (b - c)");

    let code = expression(|b| {
        let a = b.identifier("a");
        let bb = b.identifier("b");
        let c = b.identifier("c");
        let sum = b.binary_expression(a, "+", bb);
        b.binary_expression(sum, "*", c)
    });
    assert_eq!(code, "local v = (a + b) * c");

    let code = expression(|b| {
        let x = b.identifier("x");
        let inner = b.unary_expression("-", x);
        b.unary_expression("-", inner)
    });
    assert_eq!(code, "local v = - -x");
}

#[test]
fn test_operator_mapping() {
    let cases = [
        ("===", "local v = a == b"),
        ("!==", "local v = a ~= b"),
        ("%", "local v = math.fmod(a, b)"),
        ("**", "local v = a ^ b"),
        ("&", "local v = bit.band(a, b)"),
        (">>>", "local v = bit.rshift(a, b)"),
    ];
    for (operator, expected) in cases {
        let code = expression(|b| {
            let a = b.identifier("a");
            let bb = b.identifier("b");
            b.binary_expression(a, operator, bb)
        });
        assert_eq!(code, expected, "operator {}", operator);
    }

    let code = expression(|b| {
        let a = b.identifier("a");
        let bb = b.identifier("b");
        b.logical_expression(a, "&&", bb)
    });
    assert_eq!(code, "local v = a and b");

    let code = expression(|b| {
        let a = b.identifier("a");
        b.unary_expression("typeof", a)
    });
    assert_eq!(code, "local v = type(a)");
}

#[test]
fn test_numeric_index_is_rebased() {
    let code = expression(|b| {
        let list = b.identifier("list");
        let zero = b.number(0.0);
        b.member_expression(list, zero, true)
    });
    assert_eq!(code, "local v = list[1]");

    let code = expression(|b| {
        let list = b.identifier("list");
        let i = b.identifier("i");
        b.member_expression(list, i, true)
    });
    assert_eq!(code, "local v = list[i]");
}

#[test]
fn test_length_and_math() {
    assert_eq!(lua("let n = items.length;"), "local n = #items\n");
    assert_eq!(lua("let n = box.length;"), "local n = #box\n");
    assert_eq!(lua("let r = Math.floor(Math.PI);"), "local r = math.floor(math.pi)\n");
    assert_eq!(lua("console.log('hi', 1);"), "print(\"hi\", 1)\n");
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_add_function() {
    assert_eq!(
        lua("function add(a, b) { return a + b; }"),
        "local function add(a, b)\n  return a + b\nend\n"
    );
}

#[test]
fn test_string_concatenation() {
    let code = lua("const greeting = \"Hello, \" + name + \"!\";");
    assert_eq!(code, "local greeting = \"Hello, \" .. name .. \"!\"\n");
    assert!(!code.contains(" + "));

    let code = lua("const s = `n=${n}`;");
    assert_eq!(code, "local s = \"n=\" .. tostring(n)\n");
}

#[test]
fn test_postfix_increment_snapshot() {
    let code = lua("let i = 0; let y = i++;");
    assert_eq!(
        code,
        "local i = 0\n\
         local y = (function()\n  local __old_0 = i\n  i = __old_0 + 1\n  return __old_0\nend)()\n"
    );
}

#[test]
fn test_try_catch_finally_order() {
    let code = lua("try { a(); } catch (e) { b(e); } finally { c(); }");
    let pcall = code.find("pcall(function()").unwrap();
    let catch = code.find("if not __ok_0 then").unwrap();
    let bind = code.find("local e = __err_1").unwrap();
    let finally = code.find("c()").unwrap();
    assert!(pcall < catch && catch < bind && bind < finally);
    assert!(code.contains("local __ok_0, __err_1 = pcall("));
}

#[test]
fn test_throw_uses_error() {
    let code = lua("throw new Error('bad');");
    assert_eq!(code, "error({ name = \"Error\", message = \"bad\" }, 0)\n");
}

#[test]
fn test_continue_label_only_when_needed() {
    let plain = lua("while (a) { b(); }");
    assert_eq!(plain, "while a do\n  b()\nend\n");

    let code = lua("while (a) { if (b) { continue; } c(); }");
    assert!(code.contains("goto continue"));
    assert!(code.contains("::continue::"));
}

#[test]
fn test_for_loop_keeps_update_outside_body_scope() {
    let code = lua("for (let i = 0; i < 3; i++) { f(i); }");
    assert_eq!(
        code,
        "do\n  local i = 0\n  while i < 3 do\n    do\n      f(i)\n    end\n    i = i + 1\n  end\nend\n"
    );
}

#[test]
fn test_for_of_and_for_in() {
    assert_eq!(
        lua("for (const x of xs) { f(x); }"),
        "for _, x in ipairs(xs) do\n  f(x)\nend\n"
    );
    assert_eq!(
        lua("for (const k in t) { f(k); }"),
        "for k in pairs(t) do\n  f(k)\nend\n"
    );
}

#[test]
fn test_else_if_chain() {
    let code = lua("if (a) { f(); } else if (b) { g(); } else { h(); }");
    assert_eq!(code, "if a then\n  f()\nelseif b then\n  g()\nelse\n  h()\nend\n");
}

#[test]
fn test_early_return_is_wrapped() {
    let code = lua("function f(x) { return x; g(); }");
    assert!(code.contains("do return x end"));
}

#[test]
fn test_conditional_forms() {
    assert_eq!(lua("let v = c ? 'yes' : 'no';"), "local v = (c and \"yes\" or \"no\")\n");
    assert_eq!(
        lua("let v = c ? null : 1;"),
        "local v = (function() if c then return nil end return 1 end)()\n"
    );
}

#[test]
fn test_keyword_names_are_escaped() {
    let code = lua("let end = 1; let local = end + 1;");
    assert_eq!(code, "local _end = 1\nlocal _local = _end + 1\n");
}

#[test]
fn test_parenthesized_statement_is_separated() {
    let code = lua("x = 1; (function () { y(); })();");
    assert!(code.starts_with("x = 1;\n(function()"), "{}", code);
}

#[test]
fn test_class_renders_as_metatable() {
    let code = lua("class Point { constructor(x) { this.x = x; } get_x() { return this.x; } }");
    for line in [
        "local Point = {}",
        "Point.__index = Point",
        "function Point.new(...)",
        "  local self = setmetatable({}, Point)",
        "  Point.constructor(self, ...)",
        "function Point.constructor(self, x)",
        "  self.x = x",
        "Point.get_x = function(self)",
    ] {
        assert!(code.contains(line), "missing {:?} in\n{}", line, code);
    }
}

#[test]
fn test_globals_option() {
    let document = compile("let x = 1; function f() { let y = 2; }", &CompileOptions::default()).unwrap();
    let options = EmitOptions {
        globals: true,
        ..EmitOptions::default()
    };
    let code = emit_with(&document, &options).unwrap();
    assert!(code.starts_with("x = 1\nfunction f()\n  local y = 2\nend"), "{}", code);
}

#[test]
fn test_header_option() {
    let document = compile("'use strict'; f();", &CompileOptions::with_path("main.js")).unwrap();
    let options = EmitOptions {
        header: true,
        ..EmitOptions::default()
    };
    let code = emit_with(&document, &options).unwrap();
    assert!(code.starts_with("-- Generated by lunate from main.js (sha256:"));
    assert!(code.contains("-- directive: use strict\n"));
    assert!(code.ends_with("f()\n"));
}

#[test]
fn test_invalid_documents_are_refused() {
    let document = compile("f();", &CompileOptions::default()).unwrap();
    let mut value = serde_json::to_value(&document).unwrap();
    value["module"]["body"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!("n_1TTTT"));
    let broken: IrDocument = serde_json::from_value(value).unwrap();

    match emit(&broken) {
        Err(EmitError::Invalid { errors }) => assert!(!errors.is_empty()),
        other => panic!("expected invalid-IR error, got {:?}", other),
    }

    let options = EmitOptions {
        validate: false,
        ..EmitOptions::default()
    };
    assert!(matches!(emit_with(&broken, &options), Err(EmitError::MissingNode(_))));
}

#[test]
fn test_emit_options_from_toml_shape() {
    let options: EmitOptions = serde_json::from_value(serde_json::json!({ "globals": true })).unwrap();
    assert!(options.globals);
    assert!(options.validate);
    assert_eq!(options.indent, "  ");
}
