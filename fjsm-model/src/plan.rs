use serde::{Deserialize, Serialize};

/// One row of the solved schedule: a task instance pinned to a machine and
/// time window. `end_time - start_time` always equals
/// `duration(base_name, assigned_machine)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRow {
    pub task_instance_id: u32,
    pub job_id: u32,
    pub task_name: String,
    pub assigned_machine: String,
    pub start_time: i64,
    pub end_time: i64,
    pub package_uid: String,
}
