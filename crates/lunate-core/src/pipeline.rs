//! Parse → Normalize → Lower → Validate.

use crate::config::CompileOptions;
use crate::lower::{LowerError, Lowerer};
use crate::normalize::{normalize_program, NormalizeError, NormalizeOptions};
use lunate_ir::{
    validate_ir, BuildError, BuildOptions, IrBuilder, IrDocument, SourceDescriptor,
    ValidationError,
};
use lunate_syntax_javascript::ParseError;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("parse failed: {0}")]
    Parse(#[from] ParseError),

    #[error("normalize failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("lower failed: {0}")]
    Lower(#[from] LowerError),

    #[error("validation failed: {}", errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error("validation failed: {0}")]
    Validator(#[from] ValidationError),
}

impl From<BuildError> for CompileError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Invalid { errors } => CompileError::Validation { errors },
            BuildError::Validator(err) => CompileError::Validator(err),
        }
    }
}

impl CompileError {
    /// Pipeline stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            CompileError::Parse(_) => "parse",
            CompileError::Normalize(_) => "normalize",
            CompileError::Lower(_) => "lower",
            CompileError::Validation { .. } | CompileError::Validator(_) => "validate",
        }
    }

    /// Source construct the lowerer rejected, if that is why compilation failed.
    pub fn unsupported_node_type(&self) -> Option<&str> {
        match self {
            CompileError::Lower(err) => err.node_type(),
            _ => None,
        }
    }
}

/// `sha256:<hex>` of `source`.
pub fn content_hash(source: &str) -> String {
    format!("sha256:{:x}", Sha256::digest(source.as_bytes()))
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Compile source text to a validated IR document.
pub fn compile(source: &str, options: &CompileOptions) -> Result<IrDocument, CompileError> {
    let start = Instant::now();
    let raw = lunate_syntax_javascript::parse(source)?;
    let parse_ms = elapsed_ms(start);
    debug!("Parsed {} bytes in {:.3}ms", source.len(), parse_ms);

    let mut timings = Map::new();
    timings.insert("parseMs".into(), json!(parse_ms));
    run(&raw, source, options, timings)
}

/// Compile an already-parsed raw ESTree/Babel AST. `source` is the text it
/// was parsed from, used for the content hash and error recovery.
pub fn compile_raw(
    raw: &Value,
    source: &str,
    options: &CompileOptions,
) -> Result<IrDocument, CompileError> {
    run(raw, source, options, Map::new())
}

fn run(
    raw: &Value,
    source: &str,
    options: &CompileOptions,
    mut timings: Map<String, Value>,
) -> Result<IrDocument, CompileError> {
    let start = Instant::now();
    let program = normalize_program(raw, &NormalizeOptions { source: Some(source) })?;
    let normalize_ms = elapsed_ms(start);
    debug!(
        "Normalized {} top-level statements in {:.3}ms",
        program.body.len(),
        normalize_ms
    );
    timings.insert("normalizeMs".into(), json!(normalize_ms));

    let start = Instant::now();
    let mut builder = IrBuilder::new(SourceDescriptor {
        path: options.path.clone(),
        content_hash: content_hash(source),
    });
    builder.set_metadata("compiler", json!("lunate"));
    builder.set_metadata("compilerVersion", json!(env!("CARGO_PKG_VERSION")));
    for (key, value) in &options.metadata {
        builder.set_metadata(key.clone(), value.clone());
    }
    builder.set_metadata("createdAt", json!(now_ms()));

    let mut lowerer = Lowerer::with_builder(builder);
    lowerer.lower_program(&program)?;
    let builder = lowerer.into_builder();
    let lower_ms = elapsed_ms(start);
    debug!("Lowered to {} nodes in {:.3}ms", builder.node_count(), lower_ms);
    timings.insert("lowerMs".into(), json!(lower_ms));

    let mut document = builder.build(BuildOptions { validate: false })?;

    if options.validate {
        let start = Instant::now();
        let report = validate_ir(&document)?;
        let validate_ms = elapsed_ms(start);
        debug!(
            "Validated in {:.3}ms ({} errors)",
            validate_ms,
            report.errors.len()
        );
        if !report.ok {
            return Err(CompileError::Validation {
                errors: report.errors,
            });
        }
        timings.insert("validateMs".into(), json!(validate_ms));
    }

    if options.record_timings {
        document
            .module
            .metadata
            .insert("timings".into(), Value::Object(timings));
    }

    Ok(document)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
