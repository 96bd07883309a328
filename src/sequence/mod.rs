//! Sequence data model: test elements, the sequence tree, projects and the
//! switchable container that bundles them.

pub mod container;
pub mod element;
pub mod project;
pub mod tree;

pub use container::TestSequenceContainer;
pub use element::{generate_element_id, ElementStatus, TestSequenceElement, TestType};
pub use project::{ProjectLocation, TestSequencerProject};
pub use tree::{GroupNode, TestRootNode, TreeError, TreeNode};
