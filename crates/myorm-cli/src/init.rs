use crate::cli::InitArgs;
use std::path::Path;

pub fn run(args: InitArgs) -> anyhow::Result<()> {
    write_template(&args.config)
}

pub const TEMPLATE: &str = r#"version = "1"
default_connection = "main"

[connections.main]
# Overridden by DATABASE_URL (also read from .env) when set.
url = "${DATABASE_URL}"

# [connections.reporting]
# url = "mysql://readonly@replica:3306/shop"

[models]
# Generated files land in <out>/c_<connection>/base/.
out = "src/models"
# "naming": `<table>_id` columns reference <table> or its plural.
# "information_schema": declared constraints, falling back to naming.
foreign_keys = "naming"
# If empty, generate every table.
tables = []

# [models.types]
# "datetime" = "String"
"#;

fn write_template(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("refusing to overwrite existing file: {}", path.display());
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!("failed to create directory {}: {e}", parent.display())
            })?;
        }
    }

    std::fs::write(path, TEMPLATE)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;

    println!("wrote {}", path.display());
    Ok(())
}
