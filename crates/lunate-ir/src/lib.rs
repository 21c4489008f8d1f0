//! Canonical IR for Lunate.
//!
//! This crate defines the intermediate representation shared by the lowering
//! pipeline and the Lua emitter.
//!
//! # Document shape
//!
//! ```json
//! {
//!   "schemaVersion": "1.0.0",
//!   "module": { "body": ["n_1T"], "metadata": {}, "directives": [], "source": { .. } },
//!   "nodes": {
//!     "n_0": { "kind": "Identifier", "name": "x" },
//!     "n_1": { "kind": "Literal", "value": 10, "raw": "10" },
//!     "n_1T": { "kind": "VariableDeclaration", .. }
//!   },
//!   "controlFlowGraphs": {}
//! }
//! ```
//!
//! Node IDs are `<prefix>_<balanced ternary>`; see [`ids`].

pub mod builders;
pub mod cfg;
pub mod document;
pub mod ids;
pub mod node;
pub mod schema;
mod validation;

pub use builders::{BuildError, BuildOptions, FunctionOptions, IrBuilder};
pub use cfg::{BasicBlock, BlockKind, ControlFlowGraph};
pub use document::{IrDocument, Module, SourceDescriptor, VOLATILE_METADATA_KEYS};
pub use ids::{
    decode_balanced_ternary, encode_balanced_ternary, BlockId, CfgId, IdError, IdGenerator, NodeId,
};
pub use node::{
    DeclarationKind, Iteration, LiteralValue, Node, NodeKind, NodeMeta, SourceLoc, NODE_KINDS,
};
pub use validation::{validate_ir, validate_value, ValidationError, ValidationReport};

/// Version of the IR schema this crate reads and writes.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[cfg(test)]
mod tests;
