use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Copy the database file at `source` to `destination` byte for byte,
/// creating missing parent directories of `destination`.
///
/// Returns the number of bytes copied.
pub async fn copy_database_file(source: &Path, destination: &Path) -> Result<u64> {
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    tokio::fs::copy(source, destination).await.with_context(|| {
        format!(
            "Failed to copy {} to {}",
            source.display(),
            destination.display()
        )
    })
}

/// Path next to `path` with `suffix` appended to its file name,
/// e.g. `finance.db` -> `finance.db.pre-restore`.
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

/// True when both paths resolve to the same file on disk.
/// A path that does not exist yet never matches.
pub async fn same_file(a: &Path, b: &Path) -> bool {
    match (canonical(a).await, canonical(b).await) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

async fn canonical(path: &Path) -> Option<PathBuf> {
    tokio::fs::canonicalize(path).await.ok()
}
