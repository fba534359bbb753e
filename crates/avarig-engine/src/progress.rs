//! Progress reporting between evaluation phases.
//!
//! Hooks run on the evaluating thread. They receive names and counters only
//! and have no access to the armature being evaluated.

/// Evaluation phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Expand,
    Morph,
    Bones,
    Hover,
    Reconstruct,
}

impl Phase {
    /// Returns the string identifier for this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Expand => "expand",
            Phase::Morph => "morph",
            Phase::Bones => "bones",
            Phase::Hover => "hover",
            Phase::Reconstruct => "reconstruct",
        }
    }
}

/// Receives progress callbacks from the evaluator.
pub trait ProgressHook {
    /// Called before each phase starts.
    fn on_phase(&mut self, _armature: &str, _phase: Phase) {}

    /// Called after every corrective pass with the number of vertices that
    /// were still out of tolerance.
    fn on_iteration(&mut self, _mesh: &str, _iteration: usize, _remaining: usize) {}
}

/// Hook that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressHook for NoProgress {}

/// Hook that records every callback, for inspection.
#[derive(Debug, Clone, Default)]
pub struct RecordingProgress {
    pub phases: Vec<Phase>,
    pub iterations: Vec<(String, usize, usize)>,
}

impl ProgressHook for RecordingProgress {
    fn on_phase(&mut self, _armature: &str, phase: Phase) {
        self.phases.push(phase);
    }

    fn on_iteration(&mut self, mesh: &str, iteration: usize, remaining: usize) {
        self.iterations.push((mesh.to_string(), iteration, remaining));
    }
}
