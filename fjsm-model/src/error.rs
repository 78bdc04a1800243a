use thiserror::Error;

/// Which of the two lexicographic solve stages a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Makespan,
    TotalCompletion,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Makespan => write!(f, "stage 1 (makespan)"),
            Stage::TotalCompletion => write!(f, "stage 2 (total completion)"),
        }
    }
}

/// The error taxonomy shared by expansion, solving, and the stores. Variants
/// that reach the Run Coordinator are recorded verbatim into
/// `RunMetadata::error_message`; `InputError` is the only variant the API
/// edge maps directly to an HTTP 4xx rather than a `FAILED` run.
#[derive(Debug, Error)]
pub enum FjsmError {
    #[error("malformed request: {0}")]
    InputError(String),

    #[error("task '{task_name}' in job {job_id} has no eligible machine with positive duration")]
    NoEligibleMachine { job_id: u32, task_name: String },

    #[error(
        "split task '{task_name}' in job {job_id} requests {requested} parts but only {available} machines are eligible"
    )]
    InsufficientMachines {
        job_id: u32,
        task_name: String,
        requested: u32,
        available: usize,
    },

    #[error("lock on task instance {task_instance_id} references machine '{machine}' which is not among its candidates")]
    InvalidLock { task_instance_id: u32, machine: String },

    #[error("{stage} returned neither OPTIMAL nor FEASIBLE within the time cap")]
    InfeasibleOrTimeout { stage: Stage },

    #[error("failed to read input packages: {0}")]
    RepositoryError(String),

    #[error("failed to persist plan: {0}")]
    StoreError(String),

    #[error("no run found with id {run_id}")]
    RunNotFound { run_id: uuid::Uuid },
}

pub type FjsmResult<T> = Result<T, FjsmError>;
