use crate::cli::ModelRunArgs;
use crate::config::ProjectConfig;
use crate::model_codegen::generate_models;
use crate::schema_cmd::load_snapshot;
use crate::write::{WriteOptions, apply_generated_files};

pub async fn run(args: ModelRunArgs) -> anyhow::Result<()> {
    let project = ProjectConfig::load(args.config.clone())?;

    let Some(models_cfg) = project.file.models.as_ref() else {
        anyhow::bail!("missing [models] section in {}", args.config.display());
    };

    let (connection, url) =
        project.connection(args.connection.as_deref(), args.database.as_deref())?;
    let snapshot = load_snapshot(&url, models_cfg.foreign_keys).await?;
    for skipped in &snapshot.skipped {
        eprintln!("warning: {}", skipped.to_error());
    }

    let out_root = project.resolve_path(&models_cfg.out);
    let plan = generate_models(&out_root, &connection, models_cfg, &snapshot)?;

    let summary = apply_generated_files(
        &plan.files,
        &plan.target,
        WriteOptions {
            dry_run: args.dry_run,
            check: args.check,
        },
    )?;

    tracing::info!(
        connection = %connection,
        tables = snapshot.tables.len(),
        skipped = snapshot.skipped.len(),
        written = summary.written.len(),
        removed = summary.removed.len(),
        "model generation finished"
    );
    Ok(())
}
