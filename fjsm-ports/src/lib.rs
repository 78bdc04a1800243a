//! Hexagonal "port" traits the core consumes and the storage/queue adapters
//! implement. Named after `core/ports/*.py` in the original source:
//! `fjsm_port.py`, `package_repo_port.py`. The core (`fjsm-expansion`,
//! `fjsm-solver`, `fjsm-coordinator`) depends only on this crate, never on a
//! concrete adapter.

use async_trait::async_trait;
use fjsm_model::{FjsmError, Lock, Package, PlanRow, RunMetadata, RunStatus};
use uuid::Uuid;

/// Read-only source of input packages. Implementations tag each package with
/// a stable `source` and are responsible for mapping their storage shape to
/// the `Package` data model.
#[async_trait]
pub trait PackageRepository: Send + Sync {
    async fn read_packages(&self) -> Result<Vec<Package>, FjsmError>;
}

/// Optional fields to apply on a status transition. `None` means "leave the
/// prior value untouched" (per spec.md §4.4).
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub makespan: Option<i64>,
    pub solver_status: Option<String>,
    pub error_message: Option<String>,
}

/// Durable sink for run metadata and plan rows. Every method is
/// independently atomic; `write_results` atomically replaces the row set for
/// a run (delete-then-insert, even for an empty input).
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Idempotent insert of a PENDING stub. No-op if already present.
    async fn create_run_record(&self, run_id: Uuid) -> Result<(), FjsmError>;

    /// Sets `status`; on transition to RUNNING sets `started_at`; on
    /// transition to a terminal state sets `completed_at`.
    async fn update_run_status(
        &self,
        run_id: Uuid,
        status: RunStatus,
        update: StatusUpdate,
    ) -> Result<(), FjsmError>;

    /// Atomically replaces the plan rows for `run_id`. Returns the number of
    /// rows written.
    async fn write_results(&self, run_id: Uuid, rows: &[PlanRow]) -> Result<usize, FjsmError>;

    async fn get_status(&self, run_id: Uuid) -> Result<Option<RunMetadata>, FjsmError>;

    /// Plan rows for `run_id`, sorted by `start_time` ascending.
    async fn get_plan_rows(&self, run_id: Uuid) -> Result<Vec<PlanRow>, FjsmError>;

    /// Most recently created runs, sorted by `created_at` descending.
    async fn recent(&self, limit: i64) -> Result<Vec<RunMetadata>, FjsmError>;
}

/// Append a single task declaration to a job inside a package in the input
/// store (the write side used by `POST /api/orders`). Kept distinct from
/// `PackageRepository` because it is a backend-specific capability, not part
/// of the read-only core contract (spec.md §4.6 / §3 supplement).
#[async_trait]
pub trait OrderSink: Send + Sync {
    /// Appends a task to `(package_id, job_id)`, creating the job if it does
    /// not yet exist. Returns the assigned task id within its package.
    #[allow(clippy::too_many_arguments)]
    async fn append_task(
        &self,
        package_id: i64,
        job_id: u32,
        name: String,
        mode: fjsm_model::TaskMode,
        order: u32,
        count: Option<u32>,
        eligible_machines: Vec<String>,
        deadline: String,
    ) -> Result<i64, FjsmError>;
}

/// The work item dispatched to a background worker: a run id, the chosen
/// storage backend, and an optional lock list.
#[derive(Debug, Clone)]
pub struct PlanJob {
    pub run_id: Uuid,
    pub backend: Backend,
    pub locks: Vec<Lock>,
}

/// Which storage backend pair a run (or order write) is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Relational,
    Document,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Relational => "relational",
            Backend::Document => "document",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = FjsmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "relational" | "pg" | "postgres" | "postgresql" => Ok(Backend::Relational),
            "document" | "mongo" | "mongodb" => Ok(Backend::Document),
            other => Err(FjsmError::InputError(format!("unknown backend '{other}'"))),
        }
    }
}

/// Background task queue: enqueue a job for asynchronous execution. The
/// concrete in-process implementation lives in `fjsm-coordinator`; this port
/// exists so the Run Coordinator never depends on a specific queue
/// technology (spec.md §2's "background task queue" external collaborator).
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, job: PlanJob);
}
