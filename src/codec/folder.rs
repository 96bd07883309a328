//! Collecting sequence files from disk.

use std::path::{Path, PathBuf};

use futures::future::join_all;
use tracing::debug;

use super::PickedFile;
use crate::error::{SequencerError, SequencerResult};

/// Read every `*.{extension}` file directly inside `dir` (no recursion).
///
/// A relative `dir` is resolved against `base` when one is given. Files are
/// returned sorted by path.
pub async fn open_all_files_in_folder(
    dir: &Path,
    extension: &str,
    base: Option<&Path>,
) -> SequencerResult<Vec<PickedFile>> {
    let dir = match base {
        Some(base) if dir.is_relative() => base.join(dir),
        _ => dir.to_path_buf(),
    };
    if !dir.is_dir() {
        return Err(SequencerError::NotFound(format!(
            "Failed to find the directory {}",
            dir.display()
        )));
    }

    let extension = extension.trim_start_matches('.');
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        extension
    );
    let paths: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|e| SequencerError::NotFound(format!("invalid folder pattern: {e}")))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    debug!(dir = %dir.display(), found = paths.len(), "scanned folder for sequences");

    if paths.is_empty() {
        return Err(SequencerError::NotFound(format!(
            "No .{extension} file found in the selected directory"
        )));
    }
    read_files(&paths).await
}

/// Read the given files concurrently, keeping their order.
pub async fn read_files(paths: &[PathBuf]) -> SequencerResult<Vec<PickedFile>> {
    let reads = paths.iter().map(|path| async move {
        let content = tokio::fs::read_to_string(path).await?;
        Ok::<_, SequencerError>(PickedFile::new(path.clone(), content))
    });
    join_all(reads).await.into_iter().collect()
}
