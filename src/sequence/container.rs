use serde::{Deserialize, Serialize};

use super::element::TestSequenceElement;
use super::project::TestSequencerProject;
use super::tree::{TestRootNode, TreeError};
use crate::cycle::{Cycle, Run};

/// The complete switchable state of one sequence.
///
/// Only `project`, `cycle`, `tree` and `elements` are persisted. The run
/// history and the unsaved flag travel with the container in memory, so
/// switching keeps each sequence's cycle pointer and pending edits its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSequenceContainer {
    pub project: TestSequencerProject,
    #[serde(default)]
    pub cycle: Cycle,
    #[serde(default)]
    pub tree: TestRootNode,
    #[serde(default)]
    pub elements: Vec<TestSequenceElement>,
    #[serde(skip)]
    pub runs: Vec<Run>,
    /// Edited since it was last saved or loaded.
    #[serde(skip)]
    pub unsaved: bool,
}

impl TestSequenceContainer {
    /// An empty sequence for a project.
    pub fn new(project: TestSequencerProject) -> Self {
        Self {
            project,
            cycle: Cycle::default(),
            tree: TestRootNode::new(),
            elements: Vec::new(),
            runs: Vec::new(),
            unsaved: false,
        }
    }

    /// A flat sequence built from elements.
    pub fn with_elements(
        project: TestSequencerProject,
        elements: Vec<TestSequenceElement>,
    ) -> Result<Self, TreeError> {
        let tree = TestRootNode::from_elements(&elements)?;
        Ok(Self {
            tree,
            elements,
            ..Self::new(project)
        })
    }

    pub fn name(&self) -> &str {
        &self.project.name
    }

    /// A sequence can run once it holds at least one element.
    pub fn is_runnable(&self) -> bool {
        !self.elements.is_empty()
    }
}
