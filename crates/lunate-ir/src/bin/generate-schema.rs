//! Render the JSON Schema for the current node schema.
//!
//! Usage:
//!   cargo run -p rhizome-lunate-ir --bin generate-schema            # print to stdout
//!   cargo run -p rhizome-lunate-ir --bin generate-schema -- archive # write schema/archive/<version>.json

use lunate_ir::schema::NodeSchema;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let schema = NodeSchema::current()?;
    let rendered = serde_json::to_string_pretty(&schema.to_json_schema())?;

    if std::env::args().nth(1).as_deref() == Some("archive") {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("schema").join("archive");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{}.json", schema.version));
        if path.exists() {
            let existing = std::fs::read_to_string(&path)?;
            if existing != rendered {
                return Err(format!(
                    "{} already archived with different contents; bump the schema version",
                    path.display()
                )
                .into());
            }
        }
        std::fs::write(&path, &rendered)?;
        eprintln!("wrote {}", path.display());
    } else {
        println!("{}", rendered);
    }
    Ok(())
}
