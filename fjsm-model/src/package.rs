use serde::{Deserialize, Serialize};

/// Execution mode of a declared task: either one instance, or a fixed fan-out
/// onto `count` distinct machines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    Single,
    Split,
}

/// A declared operation within a job: base name, execution mode, phase
/// ("order"), and the set of machines it may legally run on.
///
/// Invariant: if `mode == Single`, `count` is ignored/absent; if
/// `mode == Split`, `count` must be `Some(k)` with `k >= 1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub mode: TaskMode,
    pub order: u32,
    pub count: Option<u32>,
    pub eligible_machines: Vec<String>,
}

impl Task {
    pub fn base_name(&self) -> String {
        self.name.replace(' ', "_")
    }
}

/// A partially ordered sequence of tasks belonging to one package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: u32,
    pub tasks: Vec<Task>,
}

/// Top-level input aggregate: a set of jobs sharing a deadline, tagged with
/// its storage origin so it can be merged with packages from other backends
/// without uid collisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub package_id: i64,
    pub deadline: String,
    pub jobs: Vec<Job>,
    pub source: String,
}

impl Package {
    /// Globally unique identifier: `source:package_id`.
    pub fn uid(&self) -> String {
        format!("{}:{}", self.source, self.package_id)
    }
}
