use crate::model_codegen::BANNER;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

pub const LOCK_FILE: &str = ".myorm.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

/// The generated directory a run owns.
#[derive(Debug, Clone, Default)]
pub struct SyncTarget {
    /// Directory whose stale generated files are removed.
    pub dir: PathBuf,
    /// Files to keep even though this run did not emit them.
    pub keep: BTreeSet<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub dry_run: bool,
    pub check: bool,
}

#[derive(Debug, Default)]
pub struct WriteSummary {
    pub changed: Vec<PathBuf>,
    pub written: Vec<PathBuf>,
    pub stale: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

/// Bring `target.dir` in line with `files`.
///
/// Only changed files are rewritten, each through a temp file and a rename.
/// Stale files are removed only when they carry the generated banner.
pub fn apply_generated_files(
    files: &[GeneratedFile],
    target: &SyncTarget,
    opts: WriteOptions,
) -> anyhow::Result<WriteSummary> {
    let mut files = files.to_vec();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let mut summary = WriteSummary::default();

    for f in &files {
        let existing = std::fs::read_to_string(&f.path).ok();
        if existing.as_deref() != Some(f.content.as_str()) {
            summary.changed.push(f.path.clone());
        }
    }

    let emitted: BTreeSet<&Path> = files.iter().map(|f| f.path.as_path()).collect();
    summary.stale = stale_files(&target.dir, &emitted, &target.keep)?;

    if opts.dry_run {
        for p in &summary.changed {
            println!("would write {}", p.display());
        }
        for p in &summary.stale {
            println!("would remove {}", p.display());
        }
        return Ok(summary);
    }

    if opts.check {
        if !summary.changed.is_empty() || !summary.stale.is_empty() {
            for p in summary.changed.iter().chain(&summary.stale) {
                eprintln!("out of date: {}", p.display());
            }
            anyhow::bail!("generated files are out of date");
        }
        return Ok(summary);
    }

    if summary.changed.is_empty() && summary.stale.is_empty() {
        return Ok(summary);
    }

    let _lock = DirLock::acquire(&target.dir)?;

    for f in &files {
        if !summary.changed.contains(&f.path) {
            continue;
        }
        write_atomic(&f.path, &f.content)?;
        summary.written.push(f.path.clone());
    }

    for p in &summary.stale {
        std::fs::remove_file(p)
            .map_err(|e| anyhow::anyhow!("failed to remove {}: {e}", p.display()))?;
        summary.removed.push(p.clone());
    }

    for p in &summary.written {
        println!("wrote {}", p.display());
    }
    for p in &summary.removed {
        println!("removed {}", p.display());
    }

    Ok(summary)
}

/// Generated `.rs` files directly under `dir` that this run did not emit.
fn stale_files(
    dir: &Path,
    emitted: &BTreeSet<&Path>,
    keep: &BTreeSet<PathBuf>,
) -> anyhow::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => anyhow::bail!("failed to read directory {}: {e}", dir.display()),
    };

    let mut stale = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| anyhow::anyhow!("failed to read directory {}: {e}", dir.display()))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("rs") {
            continue;
        }
        if emitted.contains(path.as_path()) || keep.contains(&path) {
            continue;
        }
        if is_generated(&path) {
            stale.push(path);
        }
    }
    stale.sort();
    Ok(stale)
}

fn is_generated(path: &Path) -> bool {
    std::fs::read_to_string(path).is_ok_and(|content| content.starts_with(BANNER))
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("failed to create directory {}: {e}", parent.display()))?;
    }

    let tmp = tmp_path(path);
    std::fs::write(&tmp, content)
        .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", tmp.display()))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        anyhow::anyhow!(
            "failed to rename {} -> {}: {e}",
            tmp.display(),
            path.display()
        )
    })?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => path.with_extension(format!("{ext}.tmp")),
        None => path.with_extension("tmp"),
    }
}

/// Exclusive lock on an output directory, released on drop.
#[derive(Debug)]
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    pub fn acquire(dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| anyhow::anyhow!("failed to create directory {}: {e}", dir.display()))?;
        let path = dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => anyhow::bail!(
                "{} is locked by another run; delete {} if no generation is in progress",
                dir.display(),
                path.display()
            ),
            Err(e) => anyhow::bail!("failed to create lock {}: {e}", path.display()),
        }
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
