//! Document-store Plan Store / Package Repository / Order Sink, backed by
//! `mongodb::Client`. Grounded on `mongo_data_reader_adapter.py`,
//! `mongo_order_writer_adapter.py` and `mongo_plan_result_writer_adapter.py`
//! in the original source: one `packages` collection holding the nested
//! package/job/task document, upsert-based metadata writes, and
//! delete-then-insert plan row writes.

use async_trait::async_trait;
use bson::doc;
use chrono::{DateTime, Utc};
use fjsm_model::{FjsmError, Job, Package, PlanRow, RunMetadata, RunStatus, Task, TaskMode};
use fjsm_ports::{OrderSink, PackageRepository, PlanStore, StatusUpdate};
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn store_err(e: mongodb::error::Error) -> FjsmError {
    FjsmError::StoreError(e.to_string())
}

fn repo_err(e: mongodb::error::Error) -> FjsmError {
    FjsmError::RepositoryError(e.to_string())
}

/// On-disk shape of a task within the `packages` collection. Field names
/// (`type`, `order_id`) mirror the original document layout, not the core
/// `Task` type.
#[derive(Debug, Serialize, Deserialize)]
struct TaskDoc {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    order_id: u32,
    count: Option<u32>,
    eligible_machines: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JobDoc {
    job_id: u32,
    #[serde(default)]
    tasks: Vec<TaskDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PackageDoc {
    package_id: i64,
    deadline: String,
    #[serde(default)]
    jobs: Vec<JobDoc>,
}

fn task_from_doc(t: TaskDoc) -> Result<Task, FjsmError> {
    let mode = match t.kind.as_str() {
        "single" => TaskMode::Single,
        "split" => TaskMode::Split,
        other => return Err(FjsmError::InputError(format!("unknown task mode '{other}' in document store"))),
    };
    Ok(Task {
        name: t.name,
        mode,
        order: t.order_id,
        count: t.count,
        eligible_machines: t.eligible_machines,
    })
}

pub struct MongoPackageRepository {
    packages: Collection<PackageDoc>,
}

impl MongoPackageRepository {
    pub fn new(db: &Database) -> Self {
        Self { packages: db.collection("packages") }
    }
}

#[async_trait]
impl PackageRepository for MongoPackageRepository {
    async fn read_packages(&self) -> Result<Vec<Package>, FjsmError> {
        use futures_util::TryStreamExt;

        let mut cursor = self.packages.find(doc! {}).await.map_err(repo_err)?;
        let mut packages = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(repo_err)? {
            let mut jobs = Vec::with_capacity(doc.jobs.len());
            for j in doc.jobs {
                let tasks = j.tasks.into_iter().map(task_from_doc).collect::<Result<Vec<_>, _>>()?;
                jobs.push(Job { job_id: j.job_id, tasks });
            }
            packages.push(Package {
                package_id: doc.package_id,
                deadline: doc.deadline,
                jobs,
                source: "document".into(),
            });
        }
        Ok(packages)
    }
}

pub struct MongoOrderSink {
    packages: Collection<PackageDoc>,
}

impl MongoOrderSink {
    pub fn new(db: &Database) -> Self {
        Self { packages: db.collection("packages") }
    }
}

#[async_trait]
impl OrderSink for MongoOrderSink {
    async fn append_task(
        &self,
        package_id: i64,
        job_id: u32,
        name: String,
        mode: TaskMode,
        order: u32,
        count: Option<u32>,
        eligible_machines: Vec<String>,
        deadline: String,
    ) -> Result<i64, FjsmError> {
        let mut existing = self
            .packages
            .find_one(doc! { "package_id": package_id })
            .await
            .map_err(store_err)?
            .unwrap_or(PackageDoc { package_id, deadline: deadline.clone(), jobs: Vec::new() });
        existing.deadline = deadline;

        let job = match existing.jobs.iter_mut().find(|j| j.job_id == job_id) {
            Some(j) => j,
            None => {
                existing.jobs.push(JobDoc { job_id, tasks: Vec::new() });
                existing.jobs.last_mut().expect("just pushed")
            }
        };

        let task_id = job.tasks.len() as i64 + 1;
        let kind = match mode {
            TaskMode::Single => "single",
            TaskMode::Split => "split",
        };
        job.tasks.push(TaskDoc {
            name,
            kind: kind.into(),
            order_id: order,
            count,
            eligible_machines,
        });

        self.packages
            .replace_one(doc! { "package_id": package_id }, &existing)
            .upsert(true)
            .await
            .map_err(store_err)?;

        Ok(task_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataDoc {
    run_id: String,
    status: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    makespan: Option<i64>,
    solver_status: Option<String>,
    error_message: Option<String>,
}

impl MetadataDoc {
    fn into_metadata(self) -> Result<RunMetadata, FjsmError> {
        let run_id = Uuid::parse_str(&self.run_id).map_err(|e| FjsmError::StoreError(e.to_string()))?;
        Ok(RunMetadata {
            run_id,
            status: RunStatus::from_db_str(&self.status),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            makespan: self.makespan,
            solver_status: self.solver_status,
            error_message: self.error_message,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanRowDoc {
    run_id: String,
    task_instance_id: u32,
    job_id: u32,
    task_name: String,
    assigned_machine: String,
    start_time: i64,
    end_time: i64,
    package_uid: String,
}

impl From<&PlanRowDoc> for PlanRow {
    fn from(d: &PlanRowDoc) -> Self {
        PlanRow {
            task_instance_id: d.task_instance_id,
            job_id: d.job_id,
            task_name: d.task_name.clone(),
            assigned_machine: d.assigned_machine.clone(),
            start_time: d.start_time,
            end_time: d.end_time,
            package_uid: d.package_uid.clone(),
        }
    }
}

pub struct MongoPlanStore {
    metadata: Collection<MetadataDoc>,
    results: Collection<PlanRowDoc>,
}

impl MongoPlanStore {
    pub fn new(db: &Database) -> Self {
        Self {
            metadata: db.collection("plan_metadata"),
            results: db.collection("plan_result"),
        }
    }
}

#[async_trait]
impl PlanStore for MongoPlanStore {
    async fn create_run_record(&self, run_id: Uuid) -> Result<(), FjsmError> {
        let rid = run_id.to_string();
        self.metadata
            .update_one(
                doc! { "run_id": &rid },
                doc! { "$setOnInsert": {
                    "run_id": &rid,
                    "status": "PENDING",
                    "created_at": bson::DateTime::from(Utc::now()),
                } },
            )
            .upsert(true)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn update_run_status(&self, run_id: Uuid, status: RunStatus, update: StatusUpdate) -> Result<(), FjsmError> {
        let rid = run_id.to_string();
        let now = bson::DateTime::from(Utc::now());
        let mut set = doc! { "status": status.as_db_str() };
        if matches!(status, RunStatus::Running) {
            set.insert("started_at", now);
        }
        if status.is_terminal() {
            set.insert("completed_at", now);
        }
        if let Some(makespan) = update.makespan {
            set.insert("makespan", makespan);
        }
        if let Some(solver_status) = update.solver_status {
            set.insert("solver_status", solver_status);
        }
        if let Some(error_message) = update.error_message {
            set.insert("error_message", error_message);
        }
        self.metadata
            .update_one(doc! { "run_id": &rid }, doc! { "$set": set })
            .upsert(true)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn write_results(&self, run_id: Uuid, rows: &[PlanRow]) -> Result<usize, FjsmError> {
        let rid = run_id.to_string();
        self.results.delete_many(doc! { "run_id": &rid }).await.map_err(store_err)?;
        if rows.is_empty() {
            return Ok(0);
        }
        let docs: Vec<PlanRowDoc> = rows
            .iter()
            .map(|r| PlanRowDoc {
                run_id: rid.clone(),
                task_instance_id: r.task_instance_id,
                job_id: r.job_id,
                task_name: r.task_name.clone(),
                assigned_machine: r.assigned_machine.clone(),
                start_time: r.start_time,
                end_time: r.end_time,
                package_uid: r.package_uid.clone(),
            })
            .collect();
        self.results.insert_many(&docs).await.map_err(store_err)?;
        Ok(docs.len())
    }

    async fn get_status(&self, run_id: Uuid) -> Result<Option<RunMetadata>, FjsmError> {
        let rid = run_id.to_string();
        let doc = self.metadata.find_one(doc! { "run_id": rid }).await.map_err(store_err)?;
        doc.map(MetadataDoc::into_metadata).transpose()
    }

    async fn get_plan_rows(&self, run_id: Uuid) -> Result<Vec<PlanRow>, FjsmError> {
        use futures_util::TryStreamExt;

        let rid = run_id.to_string();
        let sort = doc! { "start_time": 1 };
        let mut cursor = self
            .results
            .find(doc! { "run_id": rid })
            .sort(sort)
            .await
            .map_err(store_err)?;
        let mut rows = Vec::new();
        while let Some(d) = cursor.try_next().await.map_err(store_err)? {
            rows.push(PlanRow::from(&d));
        }
        Ok(rows)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<RunMetadata>, FjsmError> {
        use futures_util::TryStreamExt;

        let sort = doc! { "created_at": -1 };
        let mut cursor = self
            .metadata
            .find(doc! {})
            .sort(sort)
            .limit(limit)
            .await
            .map_err(store_err)?;
        let mut out = Vec::new();
        while let Some(d) = cursor.try_next().await.map_err(store_err)? {
            out.push(d.into_metadata()?);
        }
        Ok(out)
    }
}
