//! Registry of open sequences and the live (active) sequence state.
//!
//! Exactly one sequence is live at a time: its project, cycle controller, tree
//! and elements are held directly on the registry and are the only state that
//! edits touch. Every other sequence is a dormant [`TestSequenceContainer`]
//! snapshot. Switching always deep-copies in both directions, so editing the
//! live state can never reach a dormant container.

use tracing::{debug, info, warn};

use crate::cycle::{Cycle, CycleController};
use crate::error::{SequencerError, SequencerResult};
use crate::sequence::{
    ElementStatus, TestRootNode, TestSequenceContainer, TestSequenceElement,
    TestSequencerProject,
};

/// Live sequence state plus every dormant sequence.
#[derive(Debug, Clone, Default)]
pub struct SequenceRegistry {
    project: Option<TestSequencerProject>,
    cycles: CycleController,
    tree: TestRootNode,
    elements: Vec<TestSequenceElement>,
    sequences: Vec<TestSequenceContainer>,
    unsaved: bool,
    locked: bool,
    commit_hash: Option<String>,
}

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(&self) -> Option<&TestSequencerProject> {
        self.project.as_ref()
    }

    pub fn cycle(&self) -> &Cycle {
        self.cycles.cycle()
    }

    pub fn cycle_controller(&self) -> &CycleController {
        &self.cycles
    }

    pub fn tree(&self) -> &TestRootNode {
        &self.tree
    }

    pub fn elements(&self) -> &[TestSequenceElement] {
        &self.elements
    }

    /// Registered containers. The entry of the live sequence may be stale
    /// until the next switch; use [`SequenceRegistry::all_containers`] for an
    /// up-to-date view.
    pub fn sequences(&self) -> &[TestSequenceContainer] {
        &self.sequences
    }

    pub fn is_unsaved(&self) -> bool {
        self.unsaved
    }

    pub fn set_unsaved(&mut self, unsaved: bool) {
        self.unsaved = unsaved;
    }

    /// Whether any open sequence, live or dormant, has unsaved edits.
    pub fn has_unsaved_sequences(&self) -> bool {
        let live = self.project.as_ref().map(|p| p.name.as_str());
        self.unsaved
            || self
                .sequences
                .iter()
                .any(|c| c.unsaved && Some(c.project.name.as_str()) != live)
    }

    /// Clear the unsaved flag of the sequence named `name`.
    pub fn mark_saved(&mut self, name: &str) {
        if self.project.as_ref().is_some_and(|p| p.name == name) {
            self.unsaved = false;
        }
        if let Some(idx) = self.position(name) {
            self.sequences[idx].unsaved = false;
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }

    pub fn commit_hash(&self) -> Option<&str> {
        self.commit_hash.as_deref()
    }

    pub fn set_commit_hash(&mut self, hash: Option<String>) {
        self.commit_hash = hash;
    }

    // ========================================================================
    // Cycle controller
    // ========================================================================

    pub fn set_cycle_count(&mut self, count: i64) {
        self.cycles.set_cycle_count(count);
    }

    pub fn set_infinite(&mut self, infinite: bool) {
        self.cycles.set_infinite(infinite);
    }

    /// Capture the live elements as a finished cycle.
    pub fn save_run(&mut self) {
        self.cycles.save_run(&self.elements);
    }

    /// Display the previous run. No-op without history.
    pub fn previous_cycle(&mut self) {
        if let Some(elements) = self.cycles.previous_cycle() {
            self.elements = elements;
        }
    }

    /// Display the next run. No-op without history.
    pub fn next_cycle(&mut self) {
        if let Some(elements) = self.cycles.next_cycle() {
            self.elements = elements;
        }
    }

    pub fn clear_previous_runs(&mut self) {
        self.cycles.clear_previous_runs();
    }

    // ========================================================================
    // Switching
    // ========================================================================

    /// Deep copy of the live sequence, if there is one.
    pub fn snapshot(&self) -> Option<TestSequenceContainer> {
        let project = self.project.clone()?;
        let (cycle, runs) = self.cycles.clone().into_parts();
        Some(TestSequenceContainer {
            project,
            cycle,
            tree: self.tree.clone(),
            elements: self.elements.clone(),
            runs,
            unsaved: self.unsaved,
        })
    }

    /// Set the live project. A new project is registered with a snapshot of
    /// the current live state.
    pub fn set_test_sequencer_project(&mut self, project: Option<TestSequencerProject>) {
        self.project = project;
        if self.project.is_some() {
            self.write_back();
        }
    }

    /// Make the sequence named `name` live.
    ///
    /// Returns `Ok(false)` without touching anything when no sequence is live.
    pub fn set_sequence_as_runnable(&mut self, name: &str) -> SequencerResult<bool> {
        let Some(current) = self.project.as_ref() else {
            debug!(name, "no live sequence, switch ignored");
            return Ok(false);
        };
        if current.name == name {
            return Ok(true);
        }
        let idx = self
            .position(name)
            .ok_or_else(|| SequencerError::NotFound(format!("sequence '{name}'")))?;

        self.write_back();
        let target = self.sequences[idx].clone();
        self.load_live(target);
        info!(sequence = name, "switched live sequence");
        Ok(true)
    }

    /// Make the sequence after the live one live. No wraparound.
    pub fn set_next_sequence_as_runnable(&mut self) -> bool {
        let Some(current) = self.project.as_ref() else {
            return false;
        };
        let Some(old_idx) = self.position(&current.name) else {
            warn!(sequence = %current.name, "live sequence is not registered");
            return false;
        };
        if old_idx + 1 >= self.sequences.len() {
            return false;
        }

        self.write_back();
        let target = self.sequences[old_idx + 1].clone();
        info!(sequence = %target.project.name, "switched to next sequence");
        self.load_live(target);
        true
    }

    /// Register a container and make it live. A container with the same
    /// project name is replaced.
    pub fn activate(&mut self, container: TestSequenceContainer) {
        self.write_back();
        let name = container.project.name.clone();
        match self.position(&name) {
            Some(idx) => self.sequences[idx] = container.clone(),
            None => self.sequences.push(container.clone()),
        }
        self.load_live(container);
        info!(sequence = %name, "activated sequence");
    }

    /// Append an imported container's tree and elements to the live sequence.
    pub fn merge_secondary(&mut self, container: TestSequenceContainer) -> SequencerResult<()> {
        if self.project.is_none() {
            return Err(SequencerError::NoProject);
        }
        let added = container.elements.len();
        self.tree.merge(container.tree)?;
        self.elements.extend(container.elements);
        self.unsaved = true;
        debug!(
            from = %container.project.name,
            added,
            "merged secondary sequence"
        );
        Ok(())
    }

    /// Remove the live sequence from the registry. The sequence that takes its
    /// place (if any) becomes live.
    pub fn close_active(&mut self) -> Option<TestSequenceContainer> {
        let closed = self.snapshot()?;
        let idx = self.position(&closed.project.name);
        if let Some(idx) = idx {
            self.sequences.remove(idx);
        }
        let next = idx
            .and_then(|i| self.sequences.get(i).or_else(|| self.sequences.last()))
            .cloned();
        match next {
            Some(container) => self.load_live(container),
            None => self.reset_live(),
        }
        info!(sequence = %closed.project.name, "closed sequence");
        Some(closed)
    }

    /// Forget every sequence.
    pub fn clear_state(&mut self) {
        self.sequences.clear();
        self.reset_live();
        self.unsaved = false;
        self.locked = false;
        self.commit_hash = None;
    }

    /// Registered containers with the live one up to date.
    pub fn all_containers(&self) -> Vec<TestSequenceContainer> {
        let mut containers = self.sequences.clone();
        if let Some(live) = self.snapshot() {
            match containers
                .iter()
                .position(|c| c.project.name == live.project.name)
            {
                Some(idx) => containers[idx] = live,
                None => containers.push(live),
            }
        }
        containers
    }

    /// Whether every open sequence can run.
    pub fn integrity(&self) -> bool {
        self.all_containers().iter().all(|c| c.is_runnable())
    }

    // ========================================================================
    // Element edits on the live sequence
    // ========================================================================

    /// Append new elements to the live sequence.
    pub fn add_new_elems(&mut self, elements: Vec<TestSequenceElement>) -> SequencerResult<()> {
        self.tree.append_elements(elements.clone())?;
        self.elements.extend(elements);
        self.unsaved = true;
        Ok(())
    }

    pub fn remove_element(&mut self, id: &str) -> SequencerResult<()> {
        self.tree.remove(id)?;
        self.sync_elements();
        Ok(())
    }

    pub fn move_element(&mut self, id: &str, position: usize) -> SequencerResult<()> {
        self.tree.move_to(id, position)?;
        self.sync_elements();
        Ok(())
    }

    /// Group top-level elements under a new named group. Returns the group id.
    pub fn group_elements(&mut self, ids: &[String], name: &str) -> SequencerResult<String> {
        let group_id = self.tree.group(ids, name)?;
        self.sync_elements();
        Ok(group_id)
    }

    /// Record an execution outcome. Returns `false` for an unknown element.
    pub fn update_status(
        &mut self,
        id: &str,
        status: ElementStatus,
        completion_time: Option<f64>,
        error: Option<String>,
    ) -> bool {
        let mut found = false;
        if let Some(elem) = self.elements.iter_mut().find(|e| e.id == id) {
            elem.status = status;
            elem.completion_time = completion_time;
            elem.error = error.clone();
            found = true;
        }
        if let Some(leaf) = self.tree.test_mut(id) {
            leaf.status = status;
            leaf.completion_time = completion_time;
            leaf.error = error;
            found = true;
        }
        found
    }

    /// Reset every element to pending before a new execution.
    pub fn reset_statuses(&mut self) {
        for elem in &mut self.elements {
            elem.reset();
        }
        let ids: Vec<String> = self.elements.iter().map(|e| e.id.clone()).collect();
        for id in ids {
            if let Some(leaf) = self.tree.test_mut(&id) {
                leaf.reset();
            }
        }
    }

    fn sync_elements(&mut self) {
        self.elements = self.tree.leaves();
        self.unsaved = true;
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sequences.iter().position(|c| c.project.name == name)
    }

    /// Store a snapshot of the live state in its registry slot.
    fn write_back(&mut self) {
        let Some(snapshot) = self.snapshot() else {
            return;
        };
        match self.position(&snapshot.project.name) {
            Some(idx) => self.sequences[idx] = snapshot,
            None => self.sequences.push(snapshot),
        }
    }

    fn load_live(&mut self, container: TestSequenceContainer) {
        self.project = Some(container.project);
        self.cycles = CycleController::from_parts(container.cycle, container.runs);
        self.tree = container.tree;
        self.elements = container.elements;
        self.unsaved = container.unsaved;
    }

    fn reset_live(&mut self) {
        self.project = None;
        self.cycles = CycleController::new();
        self.tree = TestRootNode::new();
        self.elements.clear();
        self.unsaved = false;
    }
}
