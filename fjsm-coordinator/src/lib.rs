//! Run Coordinator (spec.md §4.5): ties a client submission to an
//! asynchronous worker and a durable result store. Owns no storage or queue
//! technology directly — routes to whichever `BackendHandles` the caller
//! selected and drives the Expansion Engine and Solver Adapter in between.

mod queue;

pub use queue::{WorkerQueue, WORKER_THREADS};

use std::sync::Arc;

use fjsm_catalogue::MachineCatalogue;
use fjsm_model::{FjsmError, Lock, PlanRow, RunMetadata, RunStatus};
use fjsm_ports::{Backend, JobQueue, OrderSink, PackageRepository, PlanJob, PlanStore, StatusUpdate};
use fjsm_solver::SolverConfig;
use uuid::Uuid;

/// The three driven ports wired to one concrete storage technology.
#[derive(Clone)]
pub struct BackendHandles {
    pub packages: Arc<dyn PackageRepository>,
    pub store: Arc<dyn PlanStore>,
    pub orders: Arc<dyn OrderSink>,
}

pub struct RunCoordinator {
    relational: BackendHandles,
    document: BackendHandles,
    catalogue: Arc<MachineCatalogue>,
    solver_config: SolverConfig,
}

impl RunCoordinator {
    pub fn new(relational: BackendHandles, document: BackendHandles, catalogue: Arc<MachineCatalogue>, solver_config: SolverConfig) -> Self {
        Self {
            relational,
            document,
            catalogue,
            solver_config,
        }
    }

    fn handles(&self, backend: Backend) -> &BackendHandles {
        match backend {
            Backend::Relational => &self.relational,
            Backend::Document => &self.document,
        }
    }

    pub fn order_sink(&self, backend: Backend) -> &Arc<dyn OrderSink> {
        &self.handles(backend).orders
    }

    /// Creates the PENDING stub and hands the job to `queue`. The queue is
    /// supplied by the caller rather than owned here so the coordinator
    /// stays agnostic to which `JobQueue` implementation backs it.
    pub async fn submit(&self, backend: Backend, locks: Vec<Lock>, queue: &dyn JobQueue) -> Result<Uuid, FjsmError> {
        let run_id = Uuid::new_v4();
        self.handles(backend).store.create_run_record(run_id).await?;
        queue.enqueue(PlanJob { run_id, backend, locks });
        Ok(run_id)
    }

    /// Worker-side entry point: runs the full expand/solve/persist pipeline
    /// and records the outcome. Never propagates an error — a failure is
    /// written to the store as `FAILED` and logged (spec.md §7's
    /// propagation policy; there is no external queue here to re-raise to).
    pub async fn execute(&self, job: PlanJob) {
        let handles = self.handles(job.backend);
        if let Err(err) = self.run(handles, job.run_id, &job.locks).await {
            tracing::error!(run_id = %job.run_id, %err, "run failed");
            let update = StatusUpdate {
                error_message: Some(err.to_string()),
                ..Default::default()
            };
            if let Err(store_err) = handles.store.update_run_status(job.run_id, RunStatus::Failed, update).await {
                tracing::error!(run_id = %job.run_id, %store_err, "failed to record FAILED status");
            }
        }
    }

    async fn run(&self, handles: &BackendHandles, run_id: Uuid, locks: &[Lock]) -> Result<(), FjsmError> {
        handles.store.update_run_status(run_id, RunStatus::Running, StatusUpdate::default()).await?;

        let packages = handles.packages.read_packages().await?;
        let instances = fjsm_expansion::expand(&packages, &self.catalogue)?;
        let output = fjsm_solver::solve(&instances, locks, &self.catalogue, self.solver_config).await?;

        handles.store.write_results(run_id, &output.rows).await?;
        let makespan = output.rows.iter().map(|r| r.end_time).max().unwrap_or(0);

        let update = StatusUpdate {
            makespan: Some(makespan),
            solver_status: Some("OPTIMAL".into()),
            error_message: None,
        };
        handles.store.update_run_status(run_id, RunStatus::Completed, update).await?;
        Ok(())
    }

    pub async fn status(&self, backend: Backend, run_id: Uuid) -> Result<Option<RunMetadata>, FjsmError> {
        self.handles(backend).store.get_status(run_id).await
    }

    pub async fn gantt(&self, backend: Backend, run_id: Uuid) -> Result<Vec<PlanRow>, FjsmError> {
        self.handles(backend).store.get_plan_rows(run_id).await
    }

    pub async fn recent(&self, backend: Backend, limit: i64) -> Result<Vec<RunMetadata>, FjsmError> {
        self.handles(backend).store.recent(limit).await
    }
}
