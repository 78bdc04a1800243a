//! Exercises the Run Coordinator's lifecycle (spec.md §8 property 10 and
//! scenarios S1/S6) against in-memory fakes of the three driven ports —
//! no real Postgres/Mongo needed to prove the orchestration is correct.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fjsm_catalogue::MachineCatalogue;
use fjsm_coordinator::{BackendHandles, RunCoordinator};
use fjsm_model::{FjsmError, Job, Package, PlanRow, RunMetadata, RunStatus, Task, TaskMode};
use fjsm_ports::{Backend, JobQueue, OrderSink, PackageRepository, PlanJob, PlanStore, StatusUpdate};
use fjsm_solver::SolverConfig;
use uuid::Uuid;

struct FixedPackageRepository(Vec<Package>);

#[async_trait]
impl PackageRepository for FixedPackageRepository {
    async fn read_packages(&self) -> Result<Vec<Package>, FjsmError> {
        Ok(self.0.clone())
    }
}

#[derive(Default)]
struct InMemoryStore {
    metadata: Mutex<HashMap<Uuid, RunMetadata>>,
    rows: Mutex<HashMap<Uuid, Vec<PlanRow>>>,
}

#[async_trait]
impl PlanStore for InMemoryStore {
    async fn create_run_record(&self, run_id: Uuid) -> Result<(), FjsmError> {
        self.metadata
            .lock()
            .unwrap()
            .entry(run_id)
            .or_insert_with(|| RunMetadata::new_pending(run_id, chrono::Utc::now()));
        Ok(())
    }

    async fn update_run_status(&self, run_id: Uuid, status: RunStatus, update: StatusUpdate) -> Result<(), FjsmError> {
        let mut meta = self.metadata.lock().unwrap();
        let entry = meta.get_mut(&run_id).expect("create_run_record called first");
        entry.status = status;
        if matches!(status, RunStatus::Running) {
            entry.started_at = Some(chrono::Utc::now());
        }
        if status.is_terminal() {
            entry.completed_at = Some(chrono::Utc::now());
        }
        if let Some(m) = update.makespan {
            entry.makespan = Some(m);
        }
        if let Some(s) = update.solver_status {
            entry.solver_status = Some(s);
        }
        if let Some(e) = update.error_message {
            entry.error_message = Some(e);
        }
        Ok(())
    }

    async fn write_results(&self, run_id: Uuid, results: &[PlanRow]) -> Result<usize, FjsmError> {
        self.rows.lock().unwrap().insert(run_id, results.to_vec());
        Ok(results.len())
    }

    async fn get_status(&self, run_id: Uuid) -> Result<Option<RunMetadata>, FjsmError> {
        Ok(self.metadata.lock().unwrap().get(&run_id).cloned())
    }

    async fn get_plan_rows(&self, run_id: Uuid) -> Result<Vec<PlanRow>, FjsmError> {
        Ok(self.rows.lock().unwrap().get(&run_id).cloned().unwrap_or_default())
    }

    async fn recent(&self, limit: i64) -> Result<Vec<RunMetadata>, FjsmError> {
        let mut all: Vec<_> = self.metadata.lock().unwrap().values().cloned().collect();
        all.sort_by_key(|m| std::cmp::Reverse(m.created_at));
        all.truncate(limit as usize);
        Ok(all)
    }
}

struct NoopOrderSink;

#[async_trait]
impl OrderSink for NoopOrderSink {
    async fn append_task(
        &self,
        _package_id: i64,
        _job_id: u32,
        _name: String,
        _mode: TaskMode,
        _order: u32,
        _count: Option<u32>,
        _eligible_machines: Vec<String>,
        _deadline: String,
    ) -> Result<i64, FjsmError> {
        Ok(1)
    }
}

/// Drives a job to completion on its own thread and runtime rather than a
/// long-lived pool — enough to exercise `submit` without pulling in the
/// multi-thread runtime feature in tests.
struct ImmediateQueue {
    coordinator: Arc<RunCoordinator>,
}

impl JobQueue for ImmediateQueue {
    fn enqueue(&self, job: PlanJob) {
        let coordinator = self.coordinator.clone();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(coordinator.execute(job));
        })
        .join()
        .unwrap();
    }
}

fn catalogue() -> Arc<MachineCatalogue> {
    Arc::new(MachineCatalogue::from_json_str(r#"{"cut": {"M1": 5}}"#).unwrap())
}

fn trivial_package() -> Package {
    Package {
        package_id: 1,
        deadline: "2026-01-01".into(),
        jobs: vec![Job {
            job_id: 1,
            tasks: vec![Task {
                name: "cut".into(),
                mode: TaskMode::Single,
                order: 1,
                count: None,
                eligible_machines: vec!["M1".into()],
            }],
        }],
        source: "test".into(),
    }
}

fn coordinator_with_packages(packages: Vec<Package>) -> (Arc<RunCoordinator>, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::default());
    let handles = BackendHandles {
        packages: Arc::new(FixedPackageRepository(packages)),
        store: store.clone(),
        orders: Arc::new(NoopOrderSink),
    };
    let coordinator = Arc::new(RunCoordinator::new(
        handles.clone(),
        handles,
        catalogue(),
        SolverConfig::default(),
    ));
    (coordinator, store)
}

#[tokio::test]
async fn s1_trivial_run_reaches_completed() {
    let (coordinator, _store) = coordinator_with_packages(vec![trivial_package()]);
    let queue = ImmediateQueue { coordinator: coordinator.clone() };

    let run_id = coordinator.submit(Backend::Relational, vec![], &queue).await.unwrap();

    let status = coordinator.status(Backend::Relational, run_id).await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.makespan, Some(5));
    assert_eq!(status.solver_status.as_deref(), Some("OPTIMAL"));

    let rows = coordinator.gantt(Backend::Relational, run_id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].start_time, 0);
    assert_eq!(rows[0].end_time, 5);
}

#[tokio::test]
async fn empty_package_list_completes_with_zero_makespan() {
    let (coordinator, _store) = coordinator_with_packages(vec![]);
    let queue = ImmediateQueue { coordinator: coordinator.clone() };

    let run_id = coordinator.submit(Backend::Relational, vec![], &queue).await.unwrap();

    let status = coordinator.status(Backend::Relational, run_id).await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Completed);
    assert_eq!(status.makespan, Some(0));
    assert!(coordinator.gantt(Backend::Relational, run_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn no_eligible_machine_reaches_failed_with_message() {
    let package = Package {
        package_id: 1,
        deadline: "2026-01-01".into(),
        jobs: vec![Job {
            job_id: 1,
            tasks: vec![Task {
                name: "bend".into(),
                mode: TaskMode::Single,
                order: 1,
                count: None,
                eligible_machines: vec!["M9".into()],
            }],
        }],
        source: "test".into(),
    };
    let (coordinator, _store) = coordinator_with_packages(vec![package]);
    let queue = ImmediateQueue { coordinator: coordinator.clone() };

    let run_id = coordinator.submit(Backend::Relational, vec![], &queue).await.unwrap();

    let status = coordinator.status(Backend::Relational, run_id).await.unwrap().unwrap();
    assert_eq!(status.status, RunStatus::Failed);
    assert!(status.error_message.unwrap().contains("no eligible machine"));
    assert!(coordinator.gantt(Backend::Relational, run_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn recent_lists_runs_newest_first() {
    let (coordinator, _store) = coordinator_with_packages(vec![trivial_package()]);
    let queue = ImmediateQueue { coordinator: coordinator.clone() };

    let first = coordinator.submit(Backend::Relational, vec![], &queue).await.unwrap();
    let second = coordinator.submit(Backend::Relational, vec![], &queue).await.unwrap();

    let recent = coordinator.recent(Backend::Relational, 10).await.unwrap();
    let ids: Vec<Uuid> = recent.iter().map(|m| m.run_id).collect();
    assert!(ids.contains(&first));
    assert!(ids.contains(&second));
}
