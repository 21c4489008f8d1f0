//! Lunate CLI entry point.

mod config;
mod hints;

use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use config::Config;
use lunate_core::{compile, CompileError, CompileOptions};
use lunate_ir::{validate_value, IrDocument};
use lunate_runtime_lua::{create_runtime, emit_with, execute};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lunate")]
#[command(about = "Compile JavaScript to Lua")]
struct Cli {
    /// Config file (defaults to ./lunate.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile JavaScript straight to Lua
    Transpile {
        /// Input file(s)
        #[arg(required = true)]
        files: Vec<String>,

        /// Output directory
        #[arg(short, long)]
        out: Option<String>,

        /// Write to stdout instead of files
        #[arg(long)]
        stdout: bool,

        /// Emit top-level declarations as globals
        #[arg(long)]
        globals: bool,

        /// Prefix the output with a provenance comment
        #[arg(long)]
        header: bool,
    },

    /// Compile JavaScript to an IR document
    Compile {
        /// Input JavaScript file (or - for stdin)
        file: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<String>,

        /// Record per-stage timings in the module metadata
        #[arg(long)]
        timings: bool,
    },

    /// Emit Lua from an IR document
    Emit {
        /// Input IR JSON file (or - for stdin)
        file: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<String>,
    },

    /// Check an IR document against the node schema
    Validate {
        /// Input IR JSON file (or - for stdin)
        file: String,
    },

    /// Compile JavaScript and run it on LuaJIT
    Run {
        /// Input JavaScript file (or - for stdin)
        file: String,
    },
}

fn read_input(file: &str) -> std::io::Result<String> {
    if file == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file)
    }
}

fn write_output(out: Option<&str>, text: &str) -> std::io::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, text)?;
            info!("Wrote {}", path);
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn compile_options(config: &Config, file: &str) -> CompileOptions {
    let mut options = config.compile.clone();
    if file != "-" {
        options.path = Some(file.to_string());
    }
    options
}

/// Compile `source`, asking the hint service about constructs the compiler
/// rejected.
async fn compile_source(
    source: &str,
    options: &CompileOptions,
    config: &Config,
) -> Result<IrDocument, CompileError> {
    match compile(source, options) {
        Ok(document) => Ok(document),
        Err(err) => {
            if let Some(node_type) = err.unsupported_node_type() {
                if let Some(hint) = hints::fetch_hint(&config.hints, node_type).await {
                    eprintln!("hint: {}", hint);
                }
            }
            Err(err)
        }
    }
}

fn lua_path(file: &str, out: Option<&str>) -> String {
    let path = Path::new(file);
    match out {
        Some(dir) => {
            let stem = path.file_stem().unwrap_or_default().to_string_lossy();
            format!("{}/{}.lua", dir, stem)
        }
        None => path.with_extension("lua").to_string_lossy().into_owned(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("lunate=info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.config.as_deref(), &std::env::current_dir()?)?;

    match cli.command {
        Commands::Transpile {
            files,
            out,
            stdout,
            globals,
            header,
        } => {
            let mut emit_options = config.emit.clone();
            emit_options.globals |= globals;
            emit_options.header |= header;

            for file in files {
                let source = read_input(&file)?;
                let document = compile_source(&source, &compile_options(&config, &file), &config).await?;
                let lua = emit_with(&document, &emit_options)?;

                if stdout || file == "-" {
                    print!("{}", lua);
                } else {
                    let out_path = lua_path(&file, out.as_deref());
                    std::fs::write(&out_path, &lua)?;
                    println!("{} -> {}", file, out_path);
                }
            }
        }

        Commands::Compile { file, out, timings } => {
            let source = read_input(&file)?;
            let mut options = compile_options(&config, &file);
            options.record_timings |= timings;
            let document = compile_source(&source, &options, &config).await?;
            info!(
                "Compiled {} nodes, {} control flow graphs",
                document.nodes.len(),
                document.control_flow_graphs.len()
            );
            write_output(out.as_deref(), &format!("{}\n", document.to_json_pretty()?))?;
        }

        Commands::Emit { file, out } => {
            let input = read_input(&file)?;
            let document: IrDocument = serde_json::from_str(&input)?;
            let lua = emit_with(&document, &config.emit)?;
            write_output(out.as_deref(), &lua)?;
        }

        Commands::Validate { file } => {
            let input = read_input(&file)?;
            let value: serde_json::Value = serde_json::from_str(&input)?;
            let report = validate_value(&value)?;
            if !report.ok {
                for error in &report.errors {
                    warn!("{}", error);
                }
                return Err(format!("{}: {} validation errors", file, report.errors.len()).into());
            }
            println!("{}: ok", file);
        }

        Commands::Run { file } => {
            let source = read_input(&file)?;
            let document = compile_source(&source, &compile_options(&config, &file), &config).await?;
            let lua = create_runtime()?;
            execute(&lua, &document, &config.emit)?;
        }
    }

    Ok(())
}
