//! Deterministic identifiers.
//!
//! Every node, control-flow graph and basic block is addressed by an ID of the
//! form `<prefix>_<digits>`, where the digits are a balanced-ternary encoding
//! of a per-prefix counter. `T` stands for -1, so the encoding covers negative
//! values without a sign character.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Digit symbol for -1.
pub const LOW_DIGIT: char = 'T';

/// Errors produced while decoding identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    #[error("empty balanced-ternary string")]
    Empty,

    #[error("invalid balanced-ternary digit '{0}'")]
    InvalidDigit(char),

    #[error("balanced-ternary value out of range: {0}")]
    Overflow(String),

    #[error("malformed identifier '{0}': expected <prefix>_<digits>")]
    Malformed(String),
}

/// Encode a signed integer in balanced ternary, most significant digit first.
pub fn encode_balanced_ternary(value: i64) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut n = i128::from(value);
    let mut digits = Vec::new();
    while n != 0 {
        match n.rem_euclid(3) {
            0 => {
                digits.push('0');
                n /= 3;
            }
            1 => {
                digits.push('1');
                n = (n - 1) / 3;
            }
            _ => {
                digits.push(LOW_DIGIT);
                n = (n + 1) / 3;
            }
        }
    }
    digits.iter().rev().collect()
}

/// Decode a balanced-ternary string produced by [`encode_balanced_ternary`].
pub fn decode_balanced_ternary(digits: &str) -> Result<i64, IdError> {
    if digits.is_empty() {
        return Err(IdError::Empty);
    }

    let mut acc: i128 = 0;
    for ch in digits.chars() {
        let digit = match ch {
            '0' => 0,
            '1' => 1,
            LOW_DIGIT => -1,
            other => return Err(IdError::InvalidDigit(other)),
        };
        acc = acc
            .checked_mul(3)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| IdError::Overflow(digits.to_string()))?;
    }

    i64::try_from(acc).map_err(|_| IdError::Overflow(digits.to_string()))
}

/// Check the `^[a-zA-Z][a-zA-Z0-9]*_[T01]+$` identifier shape.
pub fn is_well_formed_id(id: &str) -> bool {
    let Some((prefix, digits)) = id.split_once('_') else {
        return false;
    };
    let mut prefix_chars = prefix.chars();
    let prefix_ok = prefix_chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && prefix_chars.all(|c| c.is_ascii_alphanumeric());
    let digits_ok = !digits.is_empty() && digits.chars().all(|c| matches!(c, 'T' | '0' | '1'));
    prefix_ok && digits_ok
}

/// Split an identifier into its prefix and decoded counter.
pub fn split_id(id: &str) -> Result<(&str, i64), IdError> {
    if !is_well_formed_id(id) {
        return Err(IdError::Malformed(id.to_string()));
    }
    let (prefix, digits) = id
        .split_once('_')
        .ok_or_else(|| IdError::Malformed(id.to_string()))?;
    Ok((prefix, decode_balanced_ternary(digits)?))
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (split_id(a), split_id(b)) {
        (Ok((pa, na)), Ok((pb, nb))) => pa.cmp(pb).then(na.cmp(&nb)),
        _ => a.cmp(b),
    }
}

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier string without checking its shape.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Returns the raw identifier string.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns the decoded counter, if the identifier is well formed.
            pub fn counter(&self) -> Option<i64> {
                split_id(&self.0).ok().map(|(_, n)| n)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Ord for $name {
            fn cmp(&self, other: &Self) -> Ordering {
                compare_ids(&self.0, &other.0)
            }
        }

        impl PartialOrd for $name {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }
    };
}

define_id!(
    /// Handle to a node in the node table.
    NodeId
);
define_id!(
    /// Handle to a control-flow graph.
    CfgId
);
define_id!(
    /// Handle to a basic block inside a control-flow graph.
    BlockId
);

/// Prefix used for IR nodes.
pub const NODE_PREFIX: &str = "n";
/// Prefix used for control-flow graphs.
pub const CFG_PREFIX: &str = "cfg";
/// Prefix used for basic blocks.
pub const BLOCK_PREFIX: &str = "bb";

/// Per-compilation identifier allocator.
///
/// Each prefix has its own counter starting at 0. Two builders never share a
/// generator, so independent compilations allocate identical IDs for
/// identical input.
#[derive(Debug, Default, Clone)]
pub struct IdGenerator {
    counters: BTreeMap<String, i64>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next identifier for `prefix`.
    pub fn next(&mut self, prefix: &str) -> String {
        debug_assert!(is_well_formed_id(&format!("{prefix}_0")), "bad prefix {prefix}");
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let id = format!("{}_{}", prefix, encode_balanced_ternary(*counter));
        *counter += 1;
        id
    }

    pub fn next_node(&mut self) -> NodeId {
        NodeId(self.next(NODE_PREFIX))
    }

    pub fn next_cfg(&mut self) -> CfgId {
        CfgId(self.next(CFG_PREFIX))
    }

    pub fn next_block(&mut self) -> BlockId {
        BlockId(self.next(BLOCK_PREFIX))
    }

    /// Number of identifiers handed out so far for `prefix`.
    pub fn allocated(&self, prefix: &str) -> i64 {
        self.counters.get(prefix).copied().unwrap_or(0)
    }
}
