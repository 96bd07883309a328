use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a sequence is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectLocation<'a> {
    /// A `.tjoy` file inside a local directory.
    Local(&'a Path),
    /// A project stored in the cloud workspace.
    Cloud(&'a str),
    /// Not persisted yet.
    Unsaved,
}

/// Named project identifying a sequence and its persistence location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSequencerProject {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Directory holding the `.tjoy` file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_project_id: Option<String>,
}

impl TestSequencerProject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            project_path: None,
            cloud_project_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_project_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_path = Some(dir.into());
        self
    }

    pub fn with_cloud_project(mut self, project_id: impl Into<String>) -> Self {
        self.cloud_project_id = Some(project_id.into());
        self
    }

    /// A local directory wins over a cloud reference.
    pub fn location(&self) -> ProjectLocation<'_> {
        match (&self.project_path, &self.cloud_project_id) {
            (Some(dir), _) => ProjectLocation::Local(dir),
            (None, Some(id)) => ProjectLocation::Cloud(id),
            (None, None) => ProjectLocation::Unsaved,
        }
    }

    /// Path of the sequence file, if the project is stored locally.
    pub fn file_path(&self, extension: &str) -> Option<PathBuf> {
        self.project_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", self.name, extension)))
    }
}
