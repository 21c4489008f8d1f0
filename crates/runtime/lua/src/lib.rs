//! Lua emitter for Lunate.
//!
//! Renders a validated [`IrDocument`] as Lua source and runs the result on
//! LuaJIT through `mlua`.

mod codegen;

pub use codegen::{emit, emit_with, EmitError, EmitOptions};

use lunate_ir::IrDocument;
use mlua::{Function, Lua, MultiValue, Result as LuaResult};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during execution.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("emit error: {0}")]
    Emit(#[from] EmitError),
}

/// Create a LuaJIT state with the standard libraries emitted code relies on
/// (`bit`, `math`, `pcall`, `unpack`).
pub fn create_runtime() -> LuaResult<Lua> {
    Ok(Lua::new())
}

/// Replace `print` with a function that records each printed line.
pub fn capture_print(lua: &Lua) -> LuaResult<Arc<Mutex<Vec<String>>>> {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let print = lua.create_function(move |lua, args: MultiValue| {
        let tostring: Function = lua.globals().get("tostring")?;
        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            parts.push(tostring.call::<String>(arg)?);
        }
        if let Ok(mut sink) = sink.lock() {
            sink.push(parts.join("\t"));
        }
        Ok(())
    })?;
    lua.globals().set("print", print)?;
    Ok(lines)
}

/// Emit `document` and run it in `lua`.
pub fn execute(lua: &Lua, document: &IrDocument, options: &EmitOptions) -> Result<(), ExecutionError> {
    let code = emit_with(document, options)?;
    let name = document.module.source.path.as_deref().unwrap_or("lunate");
    debug!("Executing {} ({} bytes of Lua)", name, code.len());
    lua.load(&code).set_name(format!("={}", name)).exec()?;
    Ok(())
}

#[cfg(test)]
mod tests;
