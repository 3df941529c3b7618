use crate::cli::SchemaArgs;
use crate::config::ProjectConfig;
use myorm::{ForeignKeyMode, MySqlClient, SchemaSnapshot, introspect};

pub async fn run(args: SchemaArgs) -> anyhow::Result<()> {
    let (url, mode) = if args.config.exists() {
        let project = ProjectConfig::load(args.config.clone())?;
        let (_, url) = project.connection(args.connection.as_deref(), args.database.as_deref())?;
        let mode = project
            .file
            .models
            .as_ref()
            .map(|m| m.foreign_keys)
            .unwrap_or_default();
        (url, mode)
    } else {
        let Some(url) = args.database.clone() else {
            anyhow::bail!(
                "failed to load config {}; provide --database or run `myorm init` first",
                args.config.display()
            );
        };
        (url, ForeignKeyMode::default())
    };

    let snapshot = load_snapshot(&url, mode).await?;
    let json = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| anyhow::anyhow!("failed to serialize schema: {e}"))?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// Connect and introspect the connection's current database.
pub async fn load_snapshot(url: &str, mode: ForeignKeyMode) -> anyhow::Result<SchemaSnapshot> {
    let client = MySqlClient::connect(url).await?;
    let snapshot = introspect(&client, mode).await?;
    if snapshot.tables.is_empty() && snapshot.skipped.is_empty() {
        tracing::warn!("database has no tables");
    }
    Ok(snapshot)
}
