//! Relational Plan Store / Package Repository / Order Sink, backed by
//! `sqlx::PgPool`. Grounded on `postgresql_data_reader_adapter.py`,
//! `postgresql_order_writer_adapter.py` and `plan_result_writer_adapter.py`
//! in the original source: the package/job/task three-table read, the
//! upsert-on-conflict order write, and one-transaction-per-call metadata and
//! result writes. Uses runtime-checked `sqlx::query` (no compile-time
//! `DATABASE_URL`), mirroring how the pack's own `seesaw-job-postgres` talks
//! to Postgres.
//!
//! A pool is handed in rather than opened per call (spec.md §9 preserves
//! per-operation *connections*, which `sqlx::PgPool` already gives us
//! through internal checkout/return — no connection is held across an
//! `.await` boundary between calls).

use async_trait::async_trait;
use chrono::Utc;
use fjsm_model::{FjsmError, Job, Package, PlanRow, RunMetadata, RunStatus, Task, TaskMode};
use fjsm_ports::{OrderSink, PackageRepository, PlanStore, StatusUpdate};
use sqlx::{PgPool, Row};
use uuid::Uuid;

fn store_err(e: sqlx::Error) -> FjsmError {
    FjsmError::StoreError(e.to_string())
}

fn repo_err(e: sqlx::Error) -> FjsmError {
    FjsmError::RepositoryError(e.to_string())
}

pub struct PgPackageRepository {
    pool: PgPool,
}

impl PgPackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PackageRepository for PgPackageRepository {
    async fn read_packages(&self) -> Result<Vec<Package>, FjsmError> {
        let package_rows = sqlx::query("SELECT package_id, deadline FROM package")
            .fetch_all(&self.pool)
            .await
            .map_err(repo_err)?;

        let mut packages = Vec::with_capacity(package_rows.len());
        for pkg in package_rows {
            let package_id: i64 = pkg.try_get("package_id").map_err(repo_err)?;
            let deadline: String = pkg.try_get("deadline").map_err(repo_err)?;

            let job_rows = sqlx::query("SELECT job_id FROM job WHERE package_id = $1")
                .bind(package_id)
                .fetch_all(&self.pool)
                .await
                .map_err(repo_err)?;

            let mut jobs = Vec::with_capacity(job_rows.len());
            for job in job_rows {
                let job_id: i64 = job.try_get("job_id").map_err(repo_err)?;

                let task_rows = sqlx::query("SELECT name, type, order_id, count, eligible_machines FROM task WHERE job_id = $1")
                    .bind(job_id)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(repo_err)?;

                let mut tasks = Vec::with_capacity(task_rows.len());
                for t in task_rows {
                    let mode_str: String = t.try_get("type").map_err(repo_err)?;
                    let mode = match mode_str.as_str() {
                        "single" => TaskMode::Single,
                        "split" => TaskMode::Split,
                        other => return Err(FjsmError::InputError(format!("unknown task mode '{other}' in relational store"))),
                    };
                    let eligible_machines_json: Option<serde_json::Value> = t.try_get("eligible_machines").map_err(repo_err)?;
                    let eligible_machines: Vec<String> = eligible_machines_json
                        .and_then(|v| serde_json::from_value(v).ok())
                        .unwrap_or_default();

                    tasks.push(Task {
                        name: t.try_get("name").map_err(repo_err)?,
                        mode,
                        order: t.try_get::<i32, _>("order_id").map_err(repo_err)? as u32,
                        count: t.try_get::<Option<i32>, _>("count").map_err(repo_err)?.map(|c| c as u32),
                        eligible_machines,
                    });
                }

                jobs.push(Job { job_id: job_id as u32, tasks });
            }

            packages.push(Package {
                package_id,
                deadline,
                jobs,
                source: "relational".into(),
            });
        }
        Ok(packages)
    }
}

pub struct PgOrderSink {
    pool: PgPool,
}

impl PgOrderSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderSink for PgOrderSink {
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
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO package (package_id, deadline) VALUES ($1, $2)
            ON CONFLICT (package_id) DO UPDATE SET deadline = EXCLUDED.deadline
            "#,
        )
        .bind(package_id)
        .bind(&deadline)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        sqlx::query(
            r#"
            INSERT INTO job (job_id, package_id) VALUES ($1, $2)
            ON CONFLICT (job_id) DO UPDATE SET package_id = EXCLUDED.package_id
            "#,
        )
        .bind(job_id as i64)
        .bind(package_id)
        .execute(&mut *tx)
        .await
        .map_err(store_err)?;

        let mode_str = match mode {
            TaskMode::Single => "single",
            TaskMode::Split => "split",
        };
        let eligible_machines_json = serde_json::to_value(&eligible_machines).expect("Vec<String> always serialises");

        let row = sqlx::query(
            r#"
            INSERT INTO task (job_id, name, type, order_id, count, eligible_machines)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING task_id
            "#,
        )
        .bind(job_id as i64)
        .bind(&name)
        .bind(mode_str)
        .bind(order as i32)
        .bind(count.map(|c| c as i32))
        .bind(eligible_machines_json)
        .fetch_one(&mut *tx)
        .await
        .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        row.try_get::<i64, _>("task_id").map_err(store_err)
    }
}

pub struct PgPlanStore {
    pool: PgPool,
}

impl PgPlanStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_metadata(row: &sqlx::postgres::PgRow) -> Result<RunMetadata, FjsmError> {
        let status_str: String = row.try_get("status").map_err(store_err)?;
        Ok(RunMetadata {
            run_id: row.try_get("run_id").map_err(store_err)?,
            status: RunStatus::from_db_str(&status_str),
            created_at: row.try_get("created_at").map_err(store_err)?,
            started_at: row.try_get("started_at").map_err(store_err)?,
            completed_at: row.try_get("completed_at").map_err(store_err)?,
            makespan: row.try_get("makespan").map_err(store_err)?,
            solver_status: row.try_get("solver_status").map_err(store_err)?,
            error_message: row.try_get("error_message").map_err(store_err)?,
        })
    }
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn create_run_record(&self, run_id: Uuid) -> Result<(), FjsmError> {
        sqlx::query(
            r#"
            INSERT INTO plan_metadata (run_id, status, created_at) VALUES ($1, 'PENDING', $2)
            ON CONFLICT (run_id) DO NOTHING
            "#,
        )
        .bind(run_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn update_run_status(&self, run_id: Uuid, status: RunStatus, update: StatusUpdate) -> Result<(), FjsmError> {
        let status_str = status.as_db_str();
        let now = Utc::now();
        let started_at = matches!(status, RunStatus::Running).then_some(now);
        let completed_at = status.is_terminal().then_some(now);

        sqlx::query(
            r#"
            UPDATE plan_metadata SET
                status = $1,
                started_at = COALESCE($2, started_at),
                completed_at = COALESCE($3, completed_at),
                makespan = COALESCE($4, makespan),
                solver_status = COALESCE($5, solver_status),
                error_message = COALESCE($6, error_message)
            WHERE run_id = $7
            "#,
        )
        .bind(status_str)
        .bind(started_at)
        .bind(completed_at)
        .bind(update.makespan)
        .bind(update.solver_status)
        .bind(update.error_message)
        .bind(run_id)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn write_results(&self, run_id: Uuid, rows: &[PlanRow]) -> Result<usize, FjsmError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        sqlx::query("DELETE FROM plan_result WHERE run_id = $1")
            .bind(run_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        for row in rows {
            sqlx::query(
                r#"
                INSERT INTO plan_result
                    (run_id, task_instance_id, job_id, task_name, assigned_machine, start_time, end_time, package_uid)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(run_id)
            .bind(row.task_instance_id as i64)
            .bind(row.job_id as i64)
            .bind(&row.task_name)
            .bind(&row.assigned_machine)
            .bind(row.start_time)
            .bind(row.end_time)
            .bind(&row.package_uid)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(rows.len())
    }

    async fn get_status(&self, run_id: Uuid) -> Result<Option<RunMetadata>, FjsmError> {
        let row = sqlx::query(
            r#"
            SELECT run_id, status, created_at, started_at, completed_at, makespan, solver_status, error_message
            FROM plan_metadata WHERE run_id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(|r| Self::row_to_metadata(&r)).transpose()
    }

    async fn get_plan_rows(&self, run_id: Uuid) -> Result<Vec<PlanRow>, FjsmError> {
        let rows = sqlx::query(
            r#"
            SELECT task_instance_id, job_id, task_name, assigned_machine, start_time, end_time, package_uid
            FROM plan_result WHERE run_id = $1 ORDER BY start_time ASC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter()
            .map(|r| -> Result<PlanRow, FjsmError> {
                Ok(PlanRow {
                    task_instance_id: r.try_get::<i64, _>("task_instance_id").map_err(store_err)? as u32,
                    job_id: r.try_get::<i64, _>("job_id").map_err(store_err)? as u32,
                    task_name: r.try_get("task_name").map_err(store_err)?,
                    assigned_machine: r.try_get("assigned_machine").map_err(store_err)?,
                    start_time: r.try_get("start_time").map_err(store_err)?,
                    end_time: r.try_get("end_time").map_err(store_err)?,
                    package_uid: r.try_get("package_uid").map_err(store_err)?,
                })
            })
            .collect()
    }

    async fn recent(&self, limit: i64) -> Result<Vec<RunMetadata>, FjsmError> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, status, created_at, started_at, completed_at, makespan, solver_status, error_message
            FROM plan_metadata ORDER BY created_at DESC LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.iter().map(Self::row_to_metadata).collect()
    }
}
