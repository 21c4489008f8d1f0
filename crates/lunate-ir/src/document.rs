//! The IR document: module, node table and control-flow graphs.

use crate::cfg::ControlFlowGraph;
use crate::ids::{CfgId, NodeId};
use crate::node::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata keys that differ between otherwise identical compilations.
pub const VOLATILE_METADATA_KEYS: &[&str] = &["createdAt", "timings"];

/// Where the module came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    pub path: Option<String>,
    /// `sha256:<hex>` of the source text.
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Top-level statements in execution order.
    pub body: Vec<NodeId>,
    pub metadata: BTreeMap<String, Value>,
    pub directives: Vec<String>,
    pub source: SourceDescriptor,
}

/// A complete, immutable compilation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrDocument {
    pub schema_version: String,
    pub module: Module,
    pub nodes: BTreeMap<NodeId, Node>,
    pub control_flow_graphs: BTreeMap<CfgId, ControlFlowGraph>,
}

impl IrDocument {
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn cfg(&self, id: &CfgId) -> Option<&ControlFlowGraph> {
        self.control_flow_graphs.get(id)
    }

    /// Drop metadata fields that vary between runs.
    pub fn strip_volatile(&mut self) {
        for key in VOLATILE_METADATA_KEYS {
            self.module.metadata.remove(*key);
        }
    }

    /// Copy of the document without volatile metadata.
    pub fn without_volatile(&self) -> Self {
        let mut copy = self.clone();
        copy.strip_volatile();
        copy
    }

    /// Equality that ignores volatile metadata.
    pub fn deterministic_eq(&self, other: &Self) -> bool {
        self.without_volatile() == other.without_volatile()
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
