//! Compilation options.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

/// Options for [`compile`](crate::compile).
///
/// Deserializable so the CLI can read them from the `[compile]` table of
/// `lunate.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompileOptions {
    /// Recorded as `module.source.path`.
    pub path: Option<String>,
    /// Run the validator and fail on an invalid document.
    #[serde(default = "default_true")]
    pub validate: bool,
    /// Store per-stage timings under `module.metadata.timings`.
    pub record_timings: bool,
    /// Extra entries for `module.metadata`. `createdAt` and `timings` are
    /// always written by the pipeline.
    pub metadata: BTreeMap<String, Value>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            path: None,
            validate: true,
            record_timings: false,
            metadata: BTreeMap::new(),
        }
    }
}

impl CompileOptions {
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}
