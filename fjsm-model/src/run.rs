use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// State machine: `Pending -> Running -> {Completed, Failed}`. Terminal
/// states are immutable; a new attempt uses a new run id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    pub fn as_db_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "PENDING",
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
        }
    }

    /// Parses the persisted UPPERCASE form. Panics on an unrecognised value;
    /// both adapters only ever write values produced by `as_db_str`.
    pub fn from_db_str(s: &str) -> Self {
        match s {
            "PENDING" => RunStatus::Pending,
            "RUNNING" => RunStatus::Running,
            "COMPLETED" => RunStatus::Completed,
            "FAILED" => RunStatus::Failed,
            other => panic!("unrecognised run status '{other}' in store"),
        }
    }
}

/// Metadata row owned exclusively by the Run Coordinator for the lifetime of
/// a single `run_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub makespan: Option<i64>,
    pub solver_status: Option<String>,
    pub error_message: Option<String>,
}

impl RunMetadata {
    pub fn new_pending(run_id: Uuid, created_at: DateTime<Utc>) -> Self {
        RunMetadata {
            run_id,
            status: RunStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            makespan: None,
            solver_status: None,
            error_message: None,
        }
    }
}
