//! Node-kind schema.
//!
//! `schema/nodes.toml` is the source of truth for which node kinds exist and
//! which fields each one requires. It drives:
//! - the validator (field presence, JSON types, enum values, references)
//! - the rendered JSON Schema document archived per released version
//!
//! Field types:
//! - `string`, `bool`: JSON scalars
//! - `literal`: any JSON scalar (null, bool, number, string)
//! - `node`: ID of an existing node
//! - `node?`: ID of an existing node, or null
//! - `node[]`: array of existing node IDs
//! - `cfg?`: ID of an existing control-flow graph, or null
//! - `enum`: string drawn from `values`

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

const BUNDLED_SCHEMA: &str = include_str!("../schema/nodes.toml");

#[derive(Debug, Clone, Error)]
pub enum SchemaError {
    #[error("invalid node schema: {0}")]
    Parse(String),

    #[error("invalid schema version '{0}'")]
    Version(String),
}

/// `MAJOR.MINOR.PATCH`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        let parts: Vec<&str> = text.split('.').collect();
        if parts.len() != 3 {
            return Err(SchemaError::Version(text.to_string()));
        }
        let num = |s: &str| {
            s.parse::<u32>()
                .map_err(|_| SchemaError::Version(text.to_string()))
        };
        Ok(Self {
            major: num(parts[0])?,
            minor: num(parts[1])?,
            patch: num(parts[2])?,
        })
    }

    /// A document version is readable when it is on the current MAJOR line
    /// and not newer than the current version.
    pub fn is_readable_by(&self, current: &SchemaVersion) -> bool {
        self.major == current.major && self <= current
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "literal")]
    Literal,
    #[serde(rename = "node")]
    Node,
    #[serde(rename = "node?")]
    OptionalNode,
    #[serde(rename = "node[]")]
    NodeList,
    #[serde(rename = "cfg?")]
    OptionalCfg,
    #[serde(rename = "enum")]
    Enum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Allowed values for `enum` fields.
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindCategory {
    Expression,
    Statement,
    Auxiliary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindSchema {
    pub name: String,
    pub category: KindCategory,
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

/// Root schema containing all node kind definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSchema {
    pub version: String,
    pub kind: Vec<KindSchema>,
}

static CURRENT: OnceLock<Result<NodeSchema, String>> = OnceLock::new();

impl NodeSchema {
    pub fn from_toml(contents: &str) -> Result<Self, SchemaError> {
        let schema: NodeSchema =
            toml::from_str(contents).map_err(|err| SchemaError::Parse(err.to_string()))?;
        SchemaVersion::parse(&schema.version)?;
        Ok(schema)
    }

    /// The schema compiled into this crate, parsed once.
    pub fn current() -> Result<&'static NodeSchema, SchemaError> {
        CURRENT
            .get_or_init(|| Self::from_toml(BUNDLED_SCHEMA).map_err(|err| err.to_string()))
            .as_ref()
            .map_err(|msg| SchemaError::Parse(msg.clone()))
    }

    pub fn version(&self) -> Result<SchemaVersion, SchemaError> {
        SchemaVersion::parse(&self.version)
    }

    /// Find a kind by name.
    pub fn find(&self, name: &str) -> Option<&KindSchema> {
        self.kind.iter().find(|k| k.name == name)
    }

    pub fn kind_names(&self) -> Vec<&str> {
        self.kind.iter().map(|k| k.name.as_str()).collect()
    }

    /// Kinds grouped by category.
    pub fn by_category(&self) -> HashMap<String, Vec<&KindSchema>> {
        let mut map: HashMap<String, Vec<&KindSchema>> = HashMap::new();
        for kind in &self.kind {
            let key = match kind.category {
                KindCategory::Expression => "expression",
                KindCategory::Statement => "statement",
                KindCategory::Auxiliary => "auxiliary",
            };
            map.entry(key.to_string()).or_default().push(kind);
        }
        map
    }

    /// Render the JSON Schema (draft 2020-12) document for this version.
    pub fn to_json_schema(&self) -> Value {
        let node_id = json!({ "type": "string", "pattern": "^[a-zA-Z][a-zA-Z0-9]*_[T01]+$" });

        let mut defs = Map::new();
        defs.insert("nodeId".into(), node_id);
        defs.insert(
            "meta".into(),
            json!({
                "type": "object",
                "properties": {
                    "classLike": { "type": "boolean" },
                    "auditTags": { "type": "array", "items": { "type": "string" } },
                    "loc": {
                        "type": "object",
                        "required": ["line", "column"],
                        "properties": {
                            "line": { "type": "integer", "minimum": 0 },
                            "column": { "type": "integer", "minimum": 0 }
                        }
                    }
                }
            }),
        );

        let mut variants = Vec::new();
        for kind in &self.kind {
            let mut properties = Map::new();
            properties.insert("kind".into(), json!({ "const": kind.name }));
            properties.insert("meta".into(), json!({ "$ref": "#/$defs/meta" }));
            let mut required = vec![json!("kind")];
            for field in &kind.fields {
                properties.insert(field.name.clone(), field_json_schema(field));
                required.push(json!(field.name));
            }
            defs.insert(
                kind.name.clone(),
                json!({
                    "type": "object",
                    "description": kind.description,
                    "required": required,
                    "properties": properties
                }),
            );
            variants.push(json!({ "$ref": format!("#/$defs/{}", kind.name) }));
        }
        defs.insert("node".into(), json!({ "oneOf": variants }));
        defs.insert(
            "controlFlowGraph".into(),
            json!({
                "type": "object",
                "required": ["entry", "exit", "blocks", "successors", "predecessors"],
                "properties": {
                    "entry": { "type": "string" },
                    "exit": { "type": "string" },
                    "blocks": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["id", "kind", "statements"],
                            "properties": {
                                "id": { "$ref": "#/$defs/nodeId" },
                                "kind": { "enum": ["entry", "normal", "exit"] },
                                "statements": { "type": "array", "items": { "$ref": "#/$defs/nodeId" } }
                            }
                        }
                    },
                    "successors": {
                        "type": "object",
                        "additionalProperties": { "type": "array", "items": { "$ref": "#/$defs/nodeId" } }
                    },
                    "predecessors": {
                        "type": "object",
                        "additionalProperties": { "type": "array", "items": { "$ref": "#/$defs/nodeId" } }
                    }
                }
            }),
        );

        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "$id": format!("https://rhizome-lab.github.io/lunate/ir/{}.json", self.version),
            "title": "Lunate canonical IR",
            "type": "object",
            "required": ["schemaVersion", "module", "nodes", "controlFlowGraphs"],
            "properties": {
                "schemaVersion": { "const": self.version },
                "module": {
                    "type": "object",
                    "required": ["body", "metadata", "directives", "source"],
                    "properties": {
                        "body": { "type": "array", "items": { "$ref": "#/$defs/nodeId" } },
                        "metadata": { "type": "object" },
                        "directives": { "type": "array", "items": { "type": "string" } },
                        "source": {
                            "type": "object",
                            "required": ["contentHash"],
                            "properties": {
                                "path": { "type": ["string", "null"] },
                                "contentHash": { "type": "string" }
                            }
                        }
                    }
                },
                "nodes": {
                    "type": "object",
                    "propertyNames": { "$ref": "#/$defs/nodeId" },
                    "additionalProperties": { "$ref": "#/$defs/node" }
                },
                "controlFlowGraphs": {
                    "type": "object",
                    "propertyNames": { "$ref": "#/$defs/nodeId" },
                    "additionalProperties": { "$ref": "#/$defs/controlFlowGraph" }
                }
            },
            "$defs": defs
        })
    }
}

fn field_json_schema(field: &FieldSchema) -> Value {
    match field.field_type {
        FieldType::String => json!({ "type": "string" }),
        FieldType::Bool => json!({ "type": "boolean" }),
        FieldType::Literal => json!({ "type": ["null", "boolean", "number", "string"] }),
        FieldType::Node => json!({ "$ref": "#/$defs/nodeId" }),
        FieldType::OptionalNode | FieldType::OptionalCfg => {
            json!({ "oneOf": [{ "type": "null" }, { "$ref": "#/$defs/nodeId" }] })
        }
        FieldType::NodeList => json!({ "type": "array", "items": { "$ref": "#/$defs/nodeId" } }),
        FieldType::Enum => json!({ "enum": field.values }),
    }
}
