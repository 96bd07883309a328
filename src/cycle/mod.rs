//! Cycle counters and run history for the live sequence.
//!
//! A cycle is one full execution pass over a sequence. After each pass the
//! element list is captured as an immutable [`Run`]. The history pointer
//! `ptr_cycle` always stays within `[-1, runs.len() - 1]`; `-1` only while the
//! history is empty.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sequence::TestSequenceElement;

/// Cycle counters persisted with a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cycle {
    /// Requested number of cycles, at least 1.
    pub cycle_count: u32,
    /// Cycles completed so far.
    pub cycle_number: u32,
    /// Index of the run currently displayed, -1 when there is none.
    pub ptr_cycle: i64,
    /// Run until stopped.
    pub infinite: bool,
}

impl Default for Cycle {
    fn default() -> Self {
        Self {
            cycle_count: 1,
            cycle_number: 0,
            ptr_cycle: -1,
            infinite: false,
        }
    }
}

/// Snapshot of the element list taken at the end of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub cycle_number: u32,
    pub captured_at: DateTime<Utc>,
    elements: Vec<TestSequenceElement>,
}

impl Run {
    pub fn new(cycle_number: u32, elements: Vec<TestSequenceElement>) -> Self {
        Self {
            cycle_number,
            captured_at: Utc::now(),
            elements,
        }
    }

    pub fn elements(&self) -> &[TestSequenceElement] {
        &self.elements
    }
}

/// Owns the cycle counters and run history of the live sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleController {
    cycle: Cycle,
    runs: Vec<Run>,
}

impl CycleController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a controller from a stored container, repairing the pointer.
    pub fn from_parts(mut cycle: Cycle, runs: Vec<Run>) -> Self {
        cycle.cycle_count = cycle.cycle_count.max(1);
        cycle.ptr_cycle = clamp_ptr(cycle.ptr_cycle, runs.len());
        Self { cycle, runs }
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Split into the parts stored in a container.
    pub fn into_parts(self) -> (Cycle, Vec<Run>) {
        (self.cycle, self.runs)
    }

    /// Requested counts below 1 mean "run until stopped".
    pub fn set_cycle_count(&mut self, count: i64) {
        if count < 1 {
            self.cycle.cycle_count = 1;
            self.cycle.infinite = true;
        } else {
            self.cycle.cycle_count = u32::try_from(count).unwrap_or(u32::MAX);
            self.cycle.infinite = false;
        }
        debug!(
            cycle_count = self.cycle.cycle_count,
            infinite = self.cycle.infinite,
            "cycle count updated"
        );
    }

    pub fn set_infinite(&mut self, infinite: bool) {
        self.cycle.infinite = infinite;
    }

    /// Record the given elements as the run of the cycle that just finished.
    pub fn save_run(&mut self, elements: &[TestSequenceElement]) {
        self.cycle.cycle_number = self.cycle.cycle_number.saturating_add(1);
        self.runs
            .push(Run::new(self.cycle.cycle_number, elements.to_vec()));
        self.cycle.ptr_cycle = clamp_ptr(self.cycle.ptr_cycle + 1, self.runs.len());
        debug!(
            cycle_number = self.cycle.cycle_number,
            runs = self.runs.len(),
            "run saved"
        );
    }

    /// Step back in history. Returns a copy of the run to display.
    pub fn previous_cycle(&mut self) -> Option<Vec<TestSequenceElement>> {
        self.step(-1)
    }

    /// Step forward in history. Returns a copy of the run to display.
    pub fn next_cycle(&mut self) -> Option<Vec<TestSequenceElement>> {
        self.step(1)
    }

    /// Drop the history to start a fresh execution series.
    pub fn clear_previous_runs(&mut self) {
        self.runs.clear();
        self.cycle.ptr_cycle = -1;
        self.cycle.cycle_number = 0;
    }

    /// Whether another cycle should be executed.
    pub fn has_remaining_cycles(&self) -> bool {
        self.cycle.infinite || self.cycle.cycle_number < self.cycle.cycle_count
    }

    fn step(&mut self, delta: i64) -> Option<Vec<TestSequenceElement>> {
        if self.runs.is_empty() {
            return None;
        }
        let last = self.runs.len() as i64 - 1;
        let ptr = (self.cycle.ptr_cycle + delta).clamp(0, last);
        self.cycle.ptr_cycle = ptr;
        self.runs
            .get(ptr as usize)
            .map(|run| run.elements().to_vec())
    }
}

fn clamp_ptr(ptr: i64, len: usize) -> i64 {
    if len == 0 {
        -1
    } else {
        ptr.clamp(0, len as i64 - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::{ElementStatus, TestType};

    fn elems(status: ElementStatus) -> Vec<TestSequenceElement> {
        let mut elem = TestSequenceElement::new("t", "t.py", TestType::Python);
        elem.status = status;
        vec![elem]
    }

    #[test]
    fn test_default_cycle() {
        let controller = CycleController::new();
        assert_eq!(*controller.cycle(), Cycle::default());
        assert_eq!(controller.cycle().ptr_cycle, -1);
        assert!(controller.runs().is_empty());
    }

    #[test]
    fn test_set_cycle_count_below_one_is_infinite() {
        let mut controller = CycleController::new();
        for n in [0, -1, -50, i64::MIN] {
            controller.set_cycle_count(n);
            assert_eq!(controller.cycle().cycle_count, 1);
            assert!(controller.cycle().infinite);
        }
    }

    #[test]
    fn test_set_cycle_count_positive() {
        let mut controller = CycleController::new();
        controller.set_infinite(true);
        for n in [1, 2, 500] {
            controller.set_cycle_count(n);
            assert_eq!(controller.cycle().cycle_count, n as u32);
            assert!(!controller.cycle().infinite);
        }
    }

    #[test]
    fn test_set_infinite_keeps_count() {
        let mut controller = CycleController::new();
        controller.set_cycle_count(4);
        controller.set_infinite(true);
        assert_eq!(controller.cycle().cycle_count, 4);
        assert!(controller.cycle().infinite);
    }

    #[test]
    fn test_navigation_on_empty_history_is_noop() {
        let mut controller = CycleController::new();
        assert!(controller.previous_cycle().is_none());
        assert!(controller.next_cycle().is_none());
        assert_eq!(controller.cycle().ptr_cycle, -1);
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut controller = CycleController::new();
        controller.save_run(&elems(ElementStatus::Passed));
        controller.save_run(&elems(ElementStatus::Failed));
        controller.save_run(&elems(ElementStatus::Passed));
        assert_eq!(controller.cycle().ptr_cycle, 2);

        for _ in 0..5 {
            controller.next_cycle();
            assert_eq!(controller.cycle().ptr_cycle, 2);
        }
        let shown = controller.previous_cycle().expect("run");
        assert_eq!(shown[0].status, ElementStatus::Failed);
        for _ in 0..5 {
            controller.previous_cycle();
            let ptr = controller.cycle().ptr_cycle;
            assert!((0..3).contains(&ptr));
        }
        assert_eq!(controller.cycle().ptr_cycle, 0);
    }

    #[test]
    fn test_restored_run_is_a_copy() {
        let mut controller = CycleController::new();
        controller.save_run(&elems(ElementStatus::Passed));
        let mut shown = controller.previous_cycle().expect("run");
        shown[0].status = ElementStatus::Failed;
        assert_eq!(controller.runs()[0].elements()[0].status, ElementStatus::Passed);
    }

    #[test]
    fn test_clear_then_save_run() {
        let mut controller = CycleController::new();
        controller.save_run(&elems(ElementStatus::Passed));
        controller.save_run(&elems(ElementStatus::Passed));
        controller.clear_previous_runs();
        assert_eq!(controller.cycle().ptr_cycle, -1);
        assert_eq!(controller.cycle().cycle_number, 0);

        controller.save_run(&elems(ElementStatus::Passed));
        assert_eq!(controller.runs().len(), 1);
        assert_eq!(controller.cycle().ptr_cycle, 0);
        assert_eq!(controller.cycle().cycle_number, 1);
    }

    #[test]
    fn test_has_remaining_cycles() {
        let mut controller = CycleController::new();
        controller.set_cycle_count(2);
        assert!(controller.has_remaining_cycles());
        controller.save_run(&[]);
        controller.save_run(&[]);
        assert!(!controller.has_remaining_cycles());
        controller.set_cycle_count(0);
        assert!(controller.has_remaining_cycles());
    }

    #[test]
    fn test_from_parts_repairs_pointer() {
        let cycle = Cycle {
            cycle_count: 0,
            cycle_number: 3,
            ptr_cycle: 7,
            infinite: false,
        };
        let controller = CycleController::from_parts(cycle, Vec::new());
        assert_eq!(controller.cycle().ptr_cycle, -1);
        assert_eq!(controller.cycle().cycle_count, 1);

        let runs = vec![Run::new(1, Vec::new()), Run::new(2, Vec::new())];
        let controller = CycleController::from_parts(cycle, runs);
        assert_eq!(controller.cycle().ptr_cycle, 1);
    }

    #[test]
    fn test_cycle_serializes_camel_case() {
        let json = serde_json::to_value(Cycle::default()).expect("serialize");
        assert_eq!(json["cycleCount"], 1);
        assert_eq!(json["ptrCycle"], -1);
        assert_eq!(json["infinite"], false);
    }
}
