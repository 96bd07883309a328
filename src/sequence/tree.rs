//! Sequence tree with a flat identifier index.
//!
//! Every node reachable from the root (tests and groups) appears exactly once in
//! the index. The index is rebuilt after each structural mutation and on
//! deserialization, so a document with duplicate identifiers is rejected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::element::{generate_element_id, TestSequenceElement};

/// Errors raised by structural edits of a [`TestRootNode`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("duplicate identifier in sequence tree: {0}")]
    DuplicateId(String),

    #[error("unknown identifier in sequence tree: {0}")]
    UnknownId(String),

    #[error("elements to group must be direct children of the root: {0}")]
    NotTopLevel(String),
}

/// A node below the root: a test leaf or a named group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Test(TestSequenceElement),
    Group(GroupNode),
}

impl TreeNode {
    pub fn id(&self) -> &str {
        match self {
            TreeNode::Test(test) => &test.id,
            TreeNode::Group(group) => &group.id,
        }
    }
}

/// Composite node holding ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupNode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

/// Root of a sequence tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRoot", into = "RawRoot")]
pub struct TestRootNode {
    children: Vec<TreeNode>,
    identifiers: Vec<String>,
    index: HashMap<String, Vec<usize>>,
}

/// On-disk shape of the root node.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawRoot {
    #[serde(rename = "type", default = "root_tag")]
    kind: String,
    #[serde(default)]
    children: Vec<TreeNode>,
    #[serde(default)]
    identifiers: Vec<String>,
}

fn root_tag() -> String {
    "root".to_string()
}

impl TryFrom<RawRoot> for TestRootNode {
    type Error = TreeError;

    fn try_from(raw: RawRoot) -> Result<Self, Self::Error> {
        // Stored identifiers are advisory; the index is always recomputed.
        let mut root = TestRootNode {
            children: raw.children,
            identifiers: Vec::new(),
            index: HashMap::new(),
        };
        root.reindex()?;
        Ok(root)
    }
}

impl From<TestRootNode> for RawRoot {
    fn from(root: TestRootNode) -> Self {
        RawRoot {
            kind: root_tag(),
            children: root.children,
            identifiers: root.identifiers,
        }
    }
}

impl TestRootNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a flat tree with one test leaf per element, in order.
    pub fn from_elements(elements: &[TestSequenceElement]) -> Result<Self, TreeError> {
        let mut root = Self::new();
        root.append_elements(elements.to_vec())?;
        Ok(root)
    }

    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Identifiers of every node in depth-first order.
    pub fn identifiers(&self) -> &[String] {
        &self.identifiers
    }

    /// Number of indexed nodes, groups included.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TreeNode> {
        let path = self.index.get(id)?;
        let (last, parent) = path.split_last()?;
        let mut children = &self.children;
        for &i in parent {
            children = match children.get(i)? {
                TreeNode::Group(group) => &group.children,
                TreeNode::Test(_) => return None,
            };
        }
        children.get(*last)
    }

    /// Mutable access to a test leaf. Structure cannot change through it.
    pub fn test_mut(&mut self, id: &str) -> Option<&mut TestSequenceElement> {
        let path = self.index.get(id)?.clone();
        let (last, parent) = path.split_last()?;
        match self.children_at_mut(parent)?.get_mut(*last)? {
            TreeNode::Test(test) => Some(test),
            TreeNode::Group(_) => None,
        }
    }

    /// Append a node at the end of the root.
    pub fn append(&mut self, node: TreeNode) -> Result<(), TreeError> {
        let incoming = collect_ids(std::slice::from_ref(&node))?;
        self.ensure_absent(&incoming)?;
        self.children.push(node);
        self.reindex()
    }

    /// Append test leaves in order. Nothing is added if any id collides.
    pub fn append_elements(&mut self, elements: Vec<TestSequenceElement>) -> Result<(), TreeError> {
        let nodes: Vec<TreeNode> = elements.into_iter().map(TreeNode::Test).collect();
        let incoming = collect_ids(&nodes)?;
        self.ensure_absent(&incoming)?;
        self.children.extend(nodes);
        self.reindex()
    }

    /// Append all top-level nodes of another tree.
    pub fn merge(&mut self, other: TestRootNode) -> Result<(), TreeError> {
        self.ensure_absent(&other.identifiers)?;
        self.children.extend(other.children);
        self.reindex()
    }

    /// Detach a node (and its subtree) from the tree.
    pub fn remove(&mut self, id: &str) -> Result<TreeNode, TreeError> {
        let path = self
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| TreeError::UnknownId(id.to_string()))?;
        let (last, parent) = path
            .split_last()
            .ok_or_else(|| TreeError::UnknownId(id.to_string()))?;
        let siblings = self
            .children_at_mut(parent)
            .ok_or_else(|| TreeError::UnknownId(id.to_string()))?;
        let node = siblings.remove(*last);
        self.reindex()?;
        Ok(node)
    }

    /// Move a node to `position` within its parent, clamped to the sibling count.
    pub fn move_to(&mut self, id: &str, position: usize) -> Result<(), TreeError> {
        let path = self
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| TreeError::UnknownId(id.to_string()))?;
        let (last, parent) = path
            .split_last()
            .ok_or_else(|| TreeError::UnknownId(id.to_string()))?;
        let siblings = self
            .children_at_mut(parent)
            .ok_or_else(|| TreeError::UnknownId(id.to_string()))?;
        let node = siblings.remove(*last);
        let position = position.min(siblings.len());
        siblings.insert(position, node);
        self.reindex()
    }

    /// Wrap top-level nodes into a new group placed where the first of them was.
    ///
    /// Returns the id of the new group.
    pub fn group(&mut self, ids: &[String], name: impl Into<String>) -> Result<String, TreeError> {
        let mut positions = Vec::with_capacity(ids.len());
        for id in ids {
            let path = self
                .index
                .get(id)
                .ok_or_else(|| TreeError::UnknownId(id.clone()))?;
            if path.len() != 1 {
                return Err(TreeError::NotTopLevel(id.clone()));
            }
            positions.push(path[0]);
        }
        positions.sort_unstable();
        positions.dedup();
        let Some(&insert_at) = positions.first() else {
            return Err(TreeError::UnknownId(String::new()));
        };

        let mut members = Vec::with_capacity(positions.len());
        for &pos in positions.iter().rev() {
            members.push(self.children.remove(pos));
        }
        members.reverse();

        let group_id = generate_element_id();
        self.children.insert(
            insert_at,
            TreeNode::Group(GroupNode {
                id: group_id.clone(),
                name: name.into(),
                children: members,
            }),
        );
        self.reindex()?;
        Ok(group_id)
    }

    /// Test leaves in depth-first (execution) order.
    pub fn leaves(&self) -> Vec<TestSequenceElement> {
        let mut out = Vec::new();
        collect_leaves(&self.children, &mut out);
        out
    }

    /// Check that every reachable node is indexed exactly once.
    pub fn validate_index(&self) -> Result<(), TreeError> {
        let ids = collect_ids(&self.children)?;
        if ids != self.identifiers || ids.len() != self.index.len() {
            let stale = ids
                .into_iter()
                .find(|id| !self.index.contains_key(id))
                .unwrap_or_default();
            return Err(TreeError::UnknownId(stale));
        }
        Ok(())
    }

    fn ensure_absent(&self, incoming: &[String]) -> Result<(), TreeError> {
        match incoming.iter().find(|id| self.index.contains_key(*id)) {
            Some(id) => Err(TreeError::DuplicateId(id.clone())),
            None => Ok(()),
        }
    }

    fn children_at_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<TreeNode>> {
        let mut children = &mut self.children;
        for &i in parent {
            children = match children.get_mut(i)? {
                TreeNode::Group(group) => &mut group.children,
                TreeNode::Test(_) => return None,
            };
        }
        Some(children)
    }

    fn reindex(&mut self) -> Result<(), TreeError> {
        let mut identifiers = Vec::new();
        let mut index = HashMap::new();
        let mut prefix = Vec::new();
        index_nodes(&self.children, &mut prefix, &mut identifiers, &mut index)?;
        self.identifiers = identifiers;
        self.index = index;
        Ok(())
    }
}

fn index_nodes(
    nodes: &[TreeNode],
    prefix: &mut Vec<usize>,
    identifiers: &mut Vec<String>,
    index: &mut HashMap<String, Vec<usize>>,
) -> Result<(), TreeError> {
    for (i, node) in nodes.iter().enumerate() {
        prefix.push(i);
        let id = node.id().to_string();
        if index.insert(id.clone(), prefix.clone()).is_some() {
            return Err(TreeError::DuplicateId(id));
        }
        identifiers.push(id);
        if let TreeNode::Group(group) = node {
            index_nodes(&group.children, prefix, identifiers, index)?;
        }
        prefix.pop();
    }
    Ok(())
}

fn collect_ids(nodes: &[TreeNode]) -> Result<Vec<String>, TreeError> {
    let mut identifiers = Vec::new();
    let mut index = HashMap::new();
    index_nodes(nodes, &mut Vec::new(), &mut identifiers, &mut index)?;
    Ok(identifiers)
}

fn collect_leaves(nodes: &[TreeNode], out: &mut Vec<TestSequenceElement>) {
    for node in nodes {
        match node {
            TreeNode::Test(test) => out.push(test.clone()),
            TreeNode::Group(group) => collect_leaves(&group.children, out),
        }
    }
}
