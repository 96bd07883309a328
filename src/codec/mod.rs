//! `.tjoy` sequence files: save, parse and import.
//!
//! A sequence file is a JSON document with the top-level keys `project`,
//! `cycle`, `tree` and `elements`. Saving writes a temporary file next to the
//! target and renames it into place.

pub mod batch;
pub mod folder;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::DEFAULT_SEQUENCE_EXTENSION;
use crate::error::{SequencerError, SequencerResult};
use crate::registry::SequenceRegistry;
use crate::sequence::{TestRootNode, TestSequenceContainer};

pub use batch::{import_batch, PickedFile};
pub use folder::{open_all_files_in_folder, read_files};

/// Reads and writes sequence containers.
#[derive(Debug, Clone)]
pub struct SequenceCodec {
    extension: String,
}

impl Default for SequenceCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_EXTENSION)
    }
}

impl SequenceCodec {
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Serialize a container to its file representation.
    pub fn encode(&self, container: &TestSequenceContainer) -> SequencerResult<String> {
        Ok(serde_json::to_string_pretty(container)?)
    }

    /// Write a container to its project location. Returns the written path.
    pub fn save(&self, container: &TestSequenceContainer) -> SequencerResult<PathBuf> {
        let path = container.project.file_path(&self.extension).ok_or_else(|| {
            SequencerError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!(
                    "sequence '{}' has no local storage location",
                    container.project.name
                ),
            ))
        })?;
        let json = self.encode(container)?;
        write_atomic(&path, json.as_bytes())?;
        info!(sequence = %container.project.name, path = %path.display(), "sequence saved");
        Ok(path)
    }

    /// Parse a sequence file read from `path`.
    ///
    /// The project location is set to the directory the file was read from,
    /// and whichever of `tree`/`elements` is missing is derived from the other.
    pub fn parse(&self, path: &Path, raw: &str) -> SequencerResult<TestSequenceContainer> {
        let mut container: TestSequenceContainer =
            serde_json::from_str(raw).map_err(|source| SequencerError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            container.project.project_path = Some(dir.to_path_buf());
        }
        if container.elements.is_empty() && !container.tree.is_empty() {
            container.elements = container.tree.leaves();
        } else if container.tree.is_empty() && !container.elements.is_empty() {
            container.tree = TestRootNode::from_elements(&container.elements)?;
        }
        debug!(
            path = %path.display(),
            sequence = %container.project.name,
            elements = container.elements.len(),
            "parsed sequence file"
        );
        Ok(container)
    }

    /// Parse `raw` and commit it to the registry.
    ///
    /// A primary import establishes (or replaces) the live sequence; a
    /// secondary import appends its tree and elements to the live sequence.
    pub fn import(
        &self,
        path: &Path,
        raw: &str,
        registry: &mut SequenceRegistry,
        is_secondary: bool,
    ) -> SequencerResult<()> {
        let container = self.parse(path, raw)?;
        commit(registry, container, is_secondary)
    }
}

/// Apply one parsed container to the registry.
pub(crate) fn commit(
    registry: &mut SequenceRegistry,
    container: TestSequenceContainer,
    is_secondary: bool,
) -> SequencerResult<()> {
    if is_secondary {
        registry.merge_secondary(container)
    } else {
        registry.activate(container);
        registry.set_unsaved(false);
        Ok(())
    }
}

/// Write to a sibling temporary file, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let mut file = fs::File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
