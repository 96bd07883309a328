//! Importing several sequence files at once.
//!
//! Files are parsed concurrently but committed strictly in input order: the
//! first file becomes the live sequence and every later file is merged into
//! it. The commit happens on a staged copy of the registry under one lock, so
//! a failing file leaves the registry exactly as it was.

use std::path::PathBuf;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{commit, SequenceCodec};
use crate::error::{SequencerError, SequencerResult};
use crate::registry::SequenceRegistry;
use crate::sequence::TestSequenceContainer;

/// A file chosen for import together with its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickedFile {
    pub path: PathBuf,
    pub content: String,
}

impl PickedFile {
    pub fn new(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

/// Parse every file concurrently, then commit them in input order.
///
/// Returns the number of imported files. Nothing is committed unless every
/// file parses and merges cleanly.
pub async fn import_batch(
    codec: &SequenceCodec,
    files: Vec<PickedFile>,
    registry: &Mutex<SequenceRegistry>,
) -> SequencerResult<usize> {
    if files.is_empty() {
        return Ok(0);
    }
    let total = files.len();
    let parsed = parse_all(codec, files).await?;

    let mut guard = registry.lock().await;
    let staged = commit_in_order(&guard, parsed)?;
    *guard = staged;
    info!(files = total, "imported sequence files");
    Ok(total)
}

async fn parse_all(
    codec: &SequenceCodec,
    files: Vec<PickedFile>,
) -> SequencerResult<Vec<(usize, TestSequenceContainer)>> {
    let mut tasks = JoinSet::new();
    for (idx, file) in files.into_iter().enumerate() {
        let codec = codec.clone();
        tasks.spawn(async move { (idx, codec.parse(&file.path, &file.content)) });
    }

    let mut parsed = Vec::new();
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, Ok(container))) => parsed.push((idx, container)),
            Ok((idx, Err(err))) => failures.push((idx, err)),
            Err(join_err) => {
                warn!(error = %join_err, "sequence parse task failed");
                return Err(SequencerError::Cancelled(format!(
                    "sequence import aborted: {join_err}"
                )));
            }
        }
    }

    // Report the failure of the earliest file so the outcome does not depend
    // on task scheduling.
    failures.sort_by_key(|(idx, _)| *idx);
    if let Some((idx, err)) = failures.into_iter().next() {
        warn!(file = idx, error = %err, "sequence import aborted");
        return Err(err);
    }
    Ok(parsed)
}

/// Commit parsed containers onto a copy of `registry`, ordered by their input
/// index. Index 0 is the primary; the rest are secondary merges.
pub(crate) fn commit_in_order(
    registry: &SequenceRegistry,
    mut parsed: Vec<(usize, TestSequenceContainer)>,
) -> SequencerResult<SequenceRegistry> {
    parsed.sort_by_key(|(idx, _)| *idx);
    let mut staged = registry.clone();
    for (idx, container) in parsed {
        debug!(file = idx, sequence = %container.project.name, "committing imported sequence");
        commit(&mut staged, container, idx != 0)?;
    }
    Ok(staged)
}
