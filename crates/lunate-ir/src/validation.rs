//! IR validation.
//!
//! Malformed IR never produces an `Err`: every problem is collected into the
//! [`ValidationReport`]. `Err` is reserved for caller mistakes such as passing
//! a JSON value that is not an object at all.

use crate::document::IrDocument;
use crate::ids::is_well_formed_id;
use crate::schema::{FieldType, NodeSchema, SchemaError, SchemaVersion};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Errors that stop validation from running at all.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("IR document must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("could not serialize IR document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Outcome of validating one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            ok: errors.is_empty(),
            errors,
        }
    }
}

/// Validate a typed document.
pub fn validate_ir(document: &IrDocument) -> Result<ValidationReport, ValidationError> {
    let value = serde_json::to_value(document)?;
    validate_value(&value)
}

/// Validate a JSON document against the current node schema.
pub fn validate_value(value: &Value) -> Result<ValidationReport, ValidationError> {
    let root = value
        .as_object()
        .ok_or_else(|| ValidationError::NotAnObject(json_type(value)))?;
    let schema = NodeSchema::current()?;
    let current = schema.version()?;

    let empty = Map::new();
    let mut checker = Checker {
        schema,
        errors: Vec::new(),
        node_ids: HashSet::new(),
        cfg_ids: HashSet::new(),
    };
    checker.check_version(root.get("schemaVersion"), &current);

    let nodes = checker.object_field(root, "nodes", "document").unwrap_or(&empty);
    let graphs = checker
        .object_field(root, "controlFlowGraphs", "document")
        .unwrap_or(&empty);
    checker.node_ids = nodes.keys().map(String::as_str).collect();
    checker.cfg_ids = graphs.keys().map(String::as_str).collect();

    for (id, node) in nodes {
        checker.check_node(id, node);
    }
    match root.get("module") {
        Some(Value::Object(module)) => checker.check_module(module),
        Some(other) => checker.error(format!("module must be an object, got {}", json_type(other))),
        None => checker.error("document is missing 'module'"),
    }
    for (id, cfg) in graphs {
        checker.check_cfg(id, cfg);
    }

    Ok(ValidationReport::from_errors(checker.errors))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

struct Checker<'a> {
    schema: &'a NodeSchema,
    errors: Vec<String>,
    node_ids: HashSet<&'a str>,
    cfg_ids: HashSet<&'a str>,
}

impl<'a> Checker<'a> {
    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn object_field(
        &mut self,
        parent: &'a Map<String, Value>,
        field: &str,
        context: &str,
    ) -> Option<&'a Map<String, Value>> {
        match parent.get(field) {
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                self.error(format!(
                    "{context}: '{field}' must be an object, got {}",
                    json_type(other)
                ));
                None
            }
            None => {
                self.error(format!("{context}: missing '{field}'"));
                None
            }
        }
    }

    fn check_version(&mut self, version: Option<&Value>, current: &SchemaVersion) {
        match version {
            Some(Value::String(text)) => match SchemaVersion::parse(text) {
                Ok(v) if v.is_readable_by(current) => {}
                Ok(v) => self.error(format!(
                    "unrecognized schemaVersion {v} (current is {current})"
                )),
                Err(_) => self.error(format!("malformed schemaVersion '{text}'")),
            },
            Some(other) => self.error(format!(
                "schemaVersion must be a string, got {}",
                json_type(other)
            )),
            None => self.error("document is missing 'schemaVersion'"),
        }
    }

    fn check_node_ref(&mut self, context: &str, field: &str, value: &Value) {
        match value.as_str() {
            Some(target) if self.node_ids.contains(target) => {}
            Some(target) => self.error(format!(
                "{context}: field '{field}' references missing node {target}"
            )),
            None => self.error(format!(
                "{context}: field '{field}' must be a node ID, got {}",
                json_type(value)
            )),
        }
    }

    fn check_node(&mut self, id: &str, node: &Value) {
        if !is_well_formed_id(id) {
            self.error(format!("node key '{id}' is not a well-formed ID"));
        }
        let Some(fields) = node.as_object() else {
            self.error(format!("node {id}: must be an object, got {}", json_type(node)));
            return;
        };
        let Some(kind) = fields.get("kind").and_then(Value::as_str) else {
            self.error(format!("node {id}: missing string 'kind'"));
            return;
        };
        let schema = self.schema;
        let Some(kind_schema) = schema.find(kind) else {
            self.error(format!("node {id}: unknown kind '{kind}'"));
            return;
        };

        let context = format!("node {id} ({kind})");
        for field in &kind_schema.fields {
            let value = fields.get(&field.name);
            match (field.field_type, value) {
                (FieldType::OptionalNode | FieldType::OptionalCfg, None | Some(Value::Null)) => {}
                (_, None) => {
                    self.error(format!("{context}: missing required field '{}'", field.name));
                }
                (FieldType::String, Some(v)) if !v.is_string() => {
                    self.error(format!("{context}: field '{}' must be a string", field.name));
                }
                (FieldType::Bool, Some(v)) if !v.is_boolean() => {
                    self.error(format!("{context}: field '{}' must be a boolean", field.name));
                }
                (FieldType::Literal, Some(v)) if v.is_array() || v.is_object() => {
                    self.error(format!("{context}: field '{}' must be a scalar", field.name));
                }
                (FieldType::Node | FieldType::OptionalNode, Some(v)) => {
                    self.check_node_ref(&context, &field.name, v);
                }
                (FieldType::NodeList, Some(Value::Array(items))) => {
                    for item in items {
                        self.check_node_ref(&context, &field.name, item);
                    }
                }
                (FieldType::NodeList, Some(_)) => {
                    self.error(format!("{context}: field '{}' must be an array", field.name));
                }
                (FieldType::OptionalCfg, Some(v)) => match v.as_str() {
                    Some(cfg) if self.cfg_ids.contains(cfg) => {}
                    Some(cfg) => self.error(format!(
                        "{context}: field '{}' references missing control-flow graph {cfg}",
                        field.name
                    )),
                    None => self.error(format!("{context}: field '{}' must be a CFG ID", field.name)),
                },
                (FieldType::Enum, Some(v)) => match v.as_str() {
                    Some(s) if field.values.iter().any(|allowed| allowed == s) => {}
                    _ => self.error(format!(
                        "{context}: field '{}' must be one of [{}], got {}",
                        field.name,
                        field.values.join(", "),
                        v
                    )),
                },
                _ => {}
            }
        }

        if let Some(meta) = fields.get("meta") {
            match meta {
                Value::Object(meta) => {
                    if let Some(class_like) = meta.get("classLike") {
                        if !class_like.is_boolean() {
                            self.error(format!("{context}: meta.classLike must be a boolean"));
                        }
                    }
                    if let Some(tags) = meta.get("auditTags") {
                        let valid = tags
                            .as_array()
                            .is_some_and(|items| items.iter().all(Value::is_string));
                        if !valid {
                            self.error(format!("{context}: meta.auditTags must be a string array"));
                        }
                    }
                }
                other => self.error(format!(
                    "{context}: meta must be an object, got {}",
                    json_type(other)
                )),
            }
        }
    }

    fn check_module(&mut self, module: &Map<String, Value>) {
        match module.get("body") {
            Some(Value::Array(items)) => {
                for item in items {
                    self.check_node_ref("module", "body", item);
                }
            }
            _ => self.error("module: 'body' must be an array of node IDs"),
        }
        match module.get("directives") {
            Some(Value::Array(items)) if items.iter().all(Value::is_string) => {}
            _ => self.error("module: 'directives' must be an array of strings"),
        }
        if !module.get("metadata").is_some_and(Value::is_object) {
            self.error("module: 'metadata' must be an object");
        }
        match module.get("source") {
            Some(Value::Object(source)) => {
                if !source.get("contentHash").is_some_and(Value::is_string) {
                    self.error("module.source: missing string 'contentHash'");
                }
            }
            _ => self.error("module: 'source' must be an object"),
        }
    }

    fn check_cfg(&mut self, id: &str, cfg: &Value) {
        let context = format!("control-flow graph {id}");
        if !is_well_formed_id(id) {
            self.error(format!("{context}: key is not a well-formed ID"));
        }
        let Some(cfg) = cfg.as_object() else {
            self.error(format!("{context}: must be an object"));
            return;
        };

        let mut block_ids: BTreeSet<&str> = BTreeSet::new();
        match cfg.get("blocks") {
            Some(Value::Array(blocks)) => {
                for block in blocks {
                    let Some(block_id) = block.get("id").and_then(Value::as_str) else {
                        self.error(format!("{context}: block without string 'id'"));
                        continue;
                    };
                    if !block_ids.insert(block_id) {
                        self.error(format!("{context}: duplicate block {block_id}"));
                    }
                    match block.get("kind").and_then(Value::as_str) {
                        Some("entry" | "normal" | "exit") => {}
                        _ => self.error(format!("{context}: block {block_id} has invalid 'kind'")),
                    }
                    match block.get("statements") {
                        Some(Value::Array(statements)) => {
                            let block_context = format!("{context} block {block_id}");
                            for statement in statements {
                                self.check_node_ref(&block_context, "statements", statement);
                            }
                        }
                        _ => self.error(format!(
                            "{context}: block {block_id} is missing 'statements'"
                        )),
                    }
                }
            }
            _ => {
                self.error(format!("{context}: 'blocks' must be an array"));
                return;
            }
        }

        for end in ["entry", "exit"] {
            match cfg.get(end).and_then(Value::as_str) {
                Some(block) if block_ids.contains(block) => {}
                Some(block) => self.error(format!("{context}: {end} block {block} is not listed")),
                None => self.error(format!("{context}: missing '{end}'")),
            }
        }

        let successors = self.edge_map(cfg, "successors", &context, &block_ids);
        let predecessors = self.edge_map(cfg, "predecessors", &context, &block_ids);
        for &(from, to) in &successors {
            if !predecessors.contains(&(to, from)) {
                self.error(format!(
                    "{context}: edge {from} -> {to} missing from predecessors of {to}"
                ));
            }
        }
        for &(to, from) in &predecessors {
            if !successors.contains(&(from, to)) {
                self.error(format!(
                    "{context}: predecessor {from} of {to} missing from successors of {from}"
                ));
            }
        }
    }

    /// Collect `(key, neighbour)` pairs, reporting unknown blocks.
    fn edge_map<'v>(
        &mut self,
        cfg: &'v Map<String, Value>,
        field: &str,
        context: &str,
        block_ids: &BTreeSet<&str>,
    ) -> BTreeSet<(&'v str, &'v str)> {
        let mut edges = BTreeSet::new();
        let Some(Value::Object(map)) = cfg.get(field) else {
            self.error(format!("{context}: '{field}' must be an object"));
            return edges;
        };
        for (key, neighbours) in map {
            if !block_ids.contains(key.as_str()) {
                self.error(format!("{context}: {field} key {key} is not a listed block"));
            }
            let Some(neighbours) = neighbours.as_array() else {
                self.error(format!("{context}: {field}[{key}] must be an array"));
                continue;
            };
            for neighbour in neighbours {
                match neighbour.as_str() {
                    Some(n) if block_ids.contains(n) => {
                        edges.insert((key.as_str(), n));
                    }
                    Some(n) => self.error(format!(
                        "{context}: {field}[{key}] references unknown block {n}"
                    )),
                    None => self.error(format!("{context}: {field}[{key}] must hold block IDs")),
                }
            }
        }
        edges
    }
}
