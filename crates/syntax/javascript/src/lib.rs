//! JavaScript to raw ESTree JSON.
//!
//! Uses tree-sitter for parsing JavaScript, then converts the CST into the
//! ESTree-shaped JSON the Lunate normalizer consumes. Statements the parser
//! could not make sense of are kept as top-level `ErrorPlaceholder` nodes
//! carrying the byte `range` they cover, so later stages can decide whether
//! to recover them.

mod estree;
mod literal;

pub use estree::{parse, ParseError};
pub use literal::{parse_number, unescape};
