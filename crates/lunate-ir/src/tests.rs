//! Tests for lunate-ir.

use crate::ids::is_well_formed_id;
use crate::*;
use proptest::prelude::*;
use serde_json::json;

fn sample_source() -> SourceDescriptor {
    SourceDescriptor {
        path: Some("sample.js".into()),
        content_hash: "sha256:00".into(),
    }
}

/// `let x = 1 + 2` with one function carrying a tiny CFG.
fn sample_document() -> IrDocument {
    let mut b = IrBuilder::new(sample_source());
    let one = b.number(1.0);
    let two = b.number(2.0);
    let sum = b.binary_expression(one, "+", two);
    let decl = b.local("x", Some(sum), NodeMeta::default());
    b.push_to_body(decl.clone());

    let ret = b.return_statement(None);
    let body = b.block_statement(vec![ret.clone()]);
    let entry = b.fresh_block_id();
    let exit = b.fresh_block_id();
    let mut cfg = ControlFlowGraph::new(entry.clone(), exit.clone());
    cfg.push_statement(&entry, ret);
    cfg.add_edge(&entry, &exit);
    let cfg_id = b.register_control_flow_graph(cfg);
    let name = b.identifier("f");
    let func = b.function_declaration(
        name,
        vec![],
        body,
        FunctionOptions {
            cfg: Some(cfg_id),
            ..FunctionOptions::default()
        },
    );
    b.push_to_body(func);
    b.build(BuildOptions { validate: false }).unwrap()
}

#[test]
fn test_balanced_ternary_known_values() {
    let cases = [
        (0, "0"),
        (1, "1"),
        (2, "1T"),
        (3, "10"),
        (4, "11"),
        (5, "1TT"),
        (-1, "T"),
        (-2, "T1"),
        (-3, "T0"),
        (13, "111"),
        (-13, "TTT"),
    ];
    for (n, text) in cases {
        assert_eq!(encode_balanced_ternary(n), text, "encode {}", n);
        assert_eq!(decode_balanced_ternary(text).unwrap(), n, "decode {}", text);
    }
}

#[test]
fn test_balanced_ternary_boundaries() {
    for n in [i64::MAX, i64::MIN, i64::MAX - 1, i64::MIN + 1] {
        assert_eq!(decode_balanced_ternary(&encode_balanced_ternary(n)).unwrap(), n);
    }
}

#[test]
fn test_balanced_ternary_rejects_garbage() {
    assert_eq!(decode_balanced_ternary(""), Err(IdError::Empty));
    assert_eq!(decode_balanced_ternary("12"), Err(IdError::InvalidDigit('2')));
    let huge = "1".repeat(60);
    assert!(matches!(decode_balanced_ternary(&huge), Err(IdError::Overflow(_))));
}

proptest! {
    #[test]
    fn balanced_ternary_round_trips(n in any::<i64>()) {
        let text = encode_balanced_ternary(n);
        prop_assert!(text.chars().all(|c| matches!(c, 'T' | '0' | '1')));
        prop_assert!(text == "0" || !text.starts_with('0'));
        prop_assert_eq!(decode_balanced_ternary(&text).unwrap(), n);
    }
}

#[test]
fn test_id_generator_monotonic_per_prefix() {
    let mut ids = IdGenerator::new();
    let mut last = None;
    for expected in 0..50 {
        let id = NodeId::new(ids.next("n"));
        assert!(is_well_formed_id(id.as_str()));
        let counter = id.counter().unwrap();
        assert_eq!(counter, expected);
        if let Some(prev) = last {
            assert!(counter > prev);
        }
        last = Some(counter);
    }
    assert_eq!(ids.next("bb"), "bb_0");
    assert_eq!(ids.allocated("n"), 50);
}

#[test]
fn test_id_ordering_follows_counter() {
    let a = NodeId::new("n_1T"); // 2
    let b = NodeId::new("n_10"); // 3
    let c = NodeId::new("n_1"); // 1
    let mut sorted = vec![b.clone(), a.clone(), c.clone()];
    sorted.sort();
    assert_eq!(sorted, vec![c, a, b]);
}

#[test]
fn test_id_format() {
    assert!(is_well_formed_id("n_0"));
    assert!(is_well_formed_id("cfg2_1T0"));
    assert!(!is_well_formed_id("n_"));
    assert!(!is_well_formed_id("_1"));
    assert!(!is_well_formed_id("9n_1"));
    assert!(!is_well_formed_id("n_2"));
    assert!(!is_well_formed_id("n1"));
}

#[test]
fn test_builder_allocates_one_id_per_node() {
    let mut b = IrBuilder::new(sample_source());
    let x = b.identifier("x");
    let lit = b.number(3.0);
    assert_eq!(x.as_str(), "n_0");
    assert_eq!(lit.as_str(), "n_1");
    assert_eq!(b.node_count(), 2);
    match &b.node(&lit).unwrap().kind {
        NodeKind::Literal { value, raw } => {
            assert_eq!(value, &LiteralValue::Number(3.0));
            assert_eq!(raw, "3");
        }
        other => panic!("expected literal, got {:?}", other),
    }
}

#[test]
fn test_build_produces_valid_document() {
    let doc = sample_document();
    assert_eq!(doc.schema_version, SCHEMA_VERSION);
    assert_eq!(doc.module.body.len(), 2);
    let report = validate_ir(&doc).unwrap();
    assert!(report.ok, "{:?}", report.errors);
}

#[test]
fn test_build_with_validation_rejects_dangling_body() {
    let mut b = IrBuilder::new(sample_source());
    b.push_to_body(NodeId::new("n_111"));
    match b.build(BuildOptions { validate: true }) {
        Err(BuildError::Invalid { errors }) => assert!(errors.iter().any(|e| e.contains("n_111"))),
        other => panic!("expected invalid build, got {:?}", other),
    }
}

#[test]
fn test_validator_rejects_dangling_field() {
    let mut doc = sample_document();
    let target = doc
        .nodes
        .iter()
        .find(|(_, n)| n.kind_name() == "BinaryExpression")
        .map(|(id, _)| id.clone())
        .unwrap();
    if let Some(node) = doc.nodes.get_mut(&target) {
        if let NodeKind::BinaryExpression { right, .. } = &mut node.kind {
            *right = NodeId::new("n_1111");
        }
    }
    let report = validate_ir(&doc).unwrap();
    assert!(!report.ok);
    assert!(!report.errors.is_empty());
    assert!(report.errors.iter().any(|e| e.contains("'right'") && e.contains("n_1111")));
}

#[test]
fn test_validator_reports_missing_required_field() {
    let mut value = serde_json::to_value(sample_document()).unwrap();
    let nodes = value["nodes"].as_object_mut().unwrap();
    let (_, binary) = nodes
        .iter_mut()
        .find(|(_, n)| n["kind"] == "BinaryExpression")
        .unwrap();
    binary.as_object_mut().unwrap().remove("left");
    binary["operator"] = json!("<=>");
    let report = validate_value(&value).unwrap();
    assert!(!report.ok);
    assert!(report.errors.iter().any(|e| e.contains("missing required field 'left'")));
    assert!(report.errors.iter().any(|e| e.contains("must be one of")));
}

#[test]
fn test_validator_rejects_unknown_kind_and_version() {
    let mut value = serde_json::to_value(sample_document()).unwrap();
    value["schemaVersion"] = json!("2.0.0");
    value["nodes"]["n_11111"] = json!({ "kind": "SwitchStatement" });
    let report = validate_value(&value).unwrap();
    assert!(report.errors.iter().any(|e| e.contains("unrecognized schemaVersion")));
    assert!(report.errors.iter().any(|e| e.contains("unknown kind 'SwitchStatement'")));
}

#[test]
fn test_validator_checks_cfg_consistency() {
    let mut doc = sample_document();
    let (_, cfg) = doc.control_flow_graphs.iter_mut().next().unwrap();
    let entry = cfg.entry.clone();
    let exit = cfg.exit.clone();
    cfg.predecessors.insert(exit, vec![]);
    cfg.successors.insert(entry, vec![BlockId::new("bb_1111")]);
    let report = validate_ir(&doc).unwrap();
    assert!(!report.ok);
    assert!(report.errors.iter().any(|e| e.contains("unknown block bb_1111")));
}

#[test]
fn test_validator_checks_cfg_references() {
    let mut doc = sample_document();
    let func = doc
        .nodes
        .values_mut()
        .find(|n| n.kind_name() == "FunctionDeclaration")
        .unwrap();
    if let NodeKind::FunctionDeclaration { cfg, .. } = &mut func.kind {
        *cfg = Some(CfgId::new("cfg_111"));
    }
    let report = validate_ir(&doc).unwrap();
    assert!(report.errors.iter().any(|e| e.contains("missing control-flow graph cfg_111")));
}

#[test]
fn test_validator_non_object_is_an_error() {
    assert!(matches!(
        validate_value(&json!([1, 2])),
        Err(ValidationError::NotAnObject("array"))
    ));
}

#[test]
fn test_document_json_roundtrip() {
    let mut doc = sample_document();
    doc.module.directives.push("use strict".into());
    let json = serde_json::to_string(&doc).unwrap();
    let parsed: IrDocument = serde_json::from_str(&json).unwrap();
    assert_eq!(doc, parsed);
}

#[test]
fn test_node_json_shape() {
    let node = Node {
        kind: NodeKind::BreakStatement,
        meta: NodeMeta::tagged("desugar:switch"),
    };
    let value = serde_json::to_value(&node).unwrap();
    assert_eq!(value, json!({ "kind": "BreakStatement", "meta": { "auditTags": ["desugar:switch"] } }));

    let decl: Node = serde_json::from_value(json!({
        "kind": "VariableDeclaration",
        "declarationKind": "const",
        "declarations": ["n_0"],
        "meta": { "classLike": true }
    }))
    .unwrap();
    assert!(decl.meta.class_like);
    assert_eq!(decl.kind.references(), vec![&NodeId::new("n_0")]);
}

#[test]
fn test_strip_volatile_metadata() {
    let mut a = sample_document();
    let mut b = sample_document();
    a.module.metadata.insert("createdAt".into(), json!(1));
    b.module.metadata.insert("createdAt".into(), json!(2));
    b.module.metadata.insert("timings".into(), json!({ "lowerMs": 0.5 }));
    assert_ne!(a, b);
    assert!(a.deterministic_eq(&b));
    a.strip_volatile();
    assert!(!a.module.metadata.contains_key("createdAt"));
}

#[test]
fn test_cfg_edges_stay_mirrored() {
    let mut ids = IdGenerator::new();
    let entry = ids.next_block();
    let exit = ids.next_block();
    let mid = ids.next_block();
    let mut cfg = ControlFlowGraph::new(entry.clone(), exit.clone());
    cfg.add_block(mid.clone(), BlockKind::Normal);
    cfg.add_edge(&entry, &mid);
    cfg.add_edge(&entry, &mid);
    cfg.add_edge(&mid, &exit);
    assert_eq!(cfg.successors_of(&entry), &[mid.clone()]);
    assert_eq!(cfg.predecessors_of(&exit), &[mid.clone()]);
    assert_eq!(cfg.reachable(), vec![entry, mid, exit]);
}
