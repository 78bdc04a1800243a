use serde::{Deserialize, Serialize};

/// A concrete schedulable unit produced by the Expansion Engine. Immutable
/// during solving, discarded once results are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: u32,
    pub package_uid: String,
    pub job_id: u32,
    pub order: u32,
    /// Display name: the declared task name, with `_0`, `_1`, ... appended
    /// for split siblings.
    pub name: String,
    /// The operation key used to look up durations in the Machine Catalogue.
    pub base_name: String,
    /// Subset of the declared `eligible_machines` with strictly positive
    /// duration for `base_name`.
    pub machine_candidates: Vec<String>,
}

/// A user-imposed pin of a task instance to a machine and start time. Valid
/// only if `machine` is one of the referenced instance's `machine_candidates`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    pub task_instance_id: u32,
    pub machine: String,
    pub start_min: u32,
}
