//! Normalizer, lowerer and compilation pipeline for Lunate.
//!
//! ```text
//! source text --parse--> raw ESTree JSON --normalize--> canonical AST
//!             --lower--> IR --validate--> IrDocument
//! ```
//!
//! Emission lives in `lunate-runtime-lua`; this crate stops at a validated
//! [`IrDocument`](lunate_ir::IrDocument).

pub mod ast;
pub mod config;
pub mod lower;
pub mod normalize;
pub mod pipeline;

pub use config::CompileOptions;
pub use lower::{LowerError, Lowerer};
pub use normalize::{
    normalize_node, normalize_program, normalize_program_value, NormalizeError, NormalizeOptions,
};
pub use pipeline::{compile, compile_raw, content_hash, CompileError};

#[cfg(test)]
mod tests;
