//! The Constraint Solver Adapter (spec.md §4.3): builds a two-stage
//! lexicographic MILP (makespan, then total completion) from task instances
//! and locks, and extracts Plan Rows from the winning assignment.

mod config;
mod model;

pub use config::SolverConfig;

use std::time::Duration;

use fjsm_catalogue::MachineCatalogue;
use fjsm_model::{FjsmError, Lock, PlanRow, Stage, TaskInstance};

pub struct SolveOutput {
    pub rows: Vec<PlanRow>,
    pub makespan: i64,
}

/// Runs the full two-stage solve. Validates locks up front (cheap,
/// synchronous); each solve stage then runs on a dedicated OS thread so its
/// wall-clock cap can be enforced by racing it against `tokio::time::timeout`
/// without blocking the async runtime (mirrors the CPU-bound-work-on-a-
/// thread pattern used by the teacher's own planning server).
pub async fn solve(
    instances: &[TaskInstance],
    locks: &[Lock],
    catalogue: &MachineCatalogue,
    config: SolverConfig,
) -> Result<SolveOutput, FjsmError> {
    validate_locks(instances, locks)?;

    if instances.is_empty() {
        return Ok(SolveOutput { rows: Vec::new(), makespan: 0 });
    }

    let horizon = compute_horizon(instances, catalogue, config.horizon_factor);

    let stage1 = run_with_timeout(
        {
            let instances = instances.to_vec();
            let locks = locks.to_vec();
            let catalogue = catalogue.clone();
            move || model::solve_stage1(&instances, &locks, &catalogue, horizon)
        },
        config.stage1_timeout,
    )
    .await
    .ok_or(FjsmError::InfeasibleOrTimeout { stage: Stage::Makespan })?;

    let stage2 = run_with_timeout(
        {
            let instances = instances.to_vec();
            let locks = locks.to_vec();
            let catalogue = catalogue.clone();
            let makespan = stage1.makespan;
            move || model::solve_stage2(&instances, &locks, &catalogue, horizon, makespan)
        },
        config.stage2_timeout,
    )
    .await
    .ok_or(FjsmError::InfeasibleOrTimeout { stage: Stage::TotalCompletion })?;

    let mut rows = Vec::with_capacity(instances.len());
    for t in instances {
        let (machine, start, end) = stage2
            .assignment
            .get(&t.id)
            .cloned()
            .ok_or_else(|| FjsmError::InfeasibleOrTimeout { stage: Stage::TotalCompletion })?;
        rows.push(PlanRow {
            task_instance_id: t.id,
            job_id: t.job_id,
            task_name: t.name.clone(),
            assigned_machine: machine,
            start_time: start,
            end_time: end,
            package_uid: t.package_uid.clone(),
        });
    }
    rows.sort_by_key(|r| r.start_time);

    Ok(SolveOutput { rows, makespan: stage2.makespan })
}

fn validate_locks(instances: &[TaskInstance], locks: &[Lock]) -> Result<(), FjsmError> {
    for lock in locks {
        let instance = instances
            .iter()
            .find(|t| t.id == lock.task_instance_id)
            .ok_or_else(|| FjsmError::InputError(format!("lock references unknown task instance id {}", lock.task_instance_id)))?;
        if !instance.machine_candidates.contains(&lock.machine) {
            return Err(FjsmError::InvalidLock {
                task_instance_id: lock.task_instance_id,
                machine: lock.machine.clone(),
            });
        }
    }
    Ok(())
}

/// H = ceil(horizon_factor * sum_t max_{m in candidates_t} duration(base_name_t, m)).
fn compute_horizon(instances: &[TaskInstance], catalogue: &MachineCatalogue, horizon_factor: f64) -> i64 {
    let worst_case: u64 = instances
        .iter()
        .map(|t| {
            t.machine_candidates
                .iter()
                .map(|m| catalogue.duration(&t.base_name, m) as u64)
                .max()
                .unwrap_or(0)
        })
        .sum();
    (horizon_factor * worst_case as f64).ceil() as i64
}

async fn run_with_timeout<F, T>(work: F, timeout: Duration) -> Option<T>
where
    F: FnOnce() -> Option<T> + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = tokio::sync::oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(work());
    });
    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) | Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjsm_model::{Job, Package, Task, TaskMode};

    fn catalogue(json: &str) -> MachineCatalogue {
        MachineCatalogue::from_json_str(json).unwrap()
    }

    fn instance(id: u32, job_id: u32, order: u32, name: &str, base_name: &str, machines: &[&str]) -> TaskInstance {
        TaskInstance {
            id,
            package_uid: "test:1".into(),
            job_id,
            order,
            name: name.into(),
            base_name: base_name.into(),
            machine_candidates: machines.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn fast_config() -> SolverConfig {
        SolverConfig {
            stage1_timeout: Duration::from_secs(10),
            stage2_timeout: Duration::from_secs(10),
            horizon_factor: 1.5,
        }
    }

    #[tokio::test]
    async fn s1_trivial_single_machine() {
        let cat = catalogue(r#"{"cut": {"M1": 5}}"#);
        let instances = vec![instance(1, 1, 1, "cut", "cut", &["M1"])];
        let out = solve(&instances, &[], &cat, fast_config()).await.unwrap();
        assert_eq!(out.makespan, 5);
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].start_time, 0);
        assert_eq!(out.rows[0].end_time, 5);
    }

    #[tokio::test]
    async fn s2_parallel_machines_use_both() {
        let cat = catalogue(r#"{"cut": {"M1": 5, "M2": 5}}"#);
        let instances = vec![
            instance(1, 1, 1, "cut", "cut", &["M1", "M2"]),
            instance(2, 2, 1, "cut", "cut", &["M1", "M2"]),
        ];
        let out = solve(&instances, &[], &cat, fast_config()).await.unwrap();
        assert_eq!(out.makespan, 5);
        let machines: std::collections::HashSet<_> = out.rows.iter().map(|r| r.assigned_machine.clone()).collect();
        assert_eq!(machines.len(), 2, "each job should land on a different machine");
    }

    #[tokio::test]
    async fn s4_two_phase_precedence() {
        let cat = catalogue(r#"{"cut": {"M1": 4}, "engrave": {"M1": 3}}"#);
        let instances = vec![
            instance(1, 1, 1, "cut", "cut", &["M1"]),
            instance(2, 1, 2, "engrave", "engrave", &["M1"]),
        ];
        let out = solve(&instances, &[], &cat, fast_config()).await.unwrap();
        assert_eq!(out.makespan, 7);
        let phase1 = out.rows.iter().find(|r| r.task_instance_id == 1).unwrap();
        let phase2 = out.rows.iter().find(|r| r.task_instance_id == 2).unwrap();
        assert!(phase2.start_time >= phase1.end_time);
    }

    #[tokio::test]
    async fn s3_split_siblings_land_on_distinct_machines() {
        let cat = catalogue(r#"{"cut": {"M1": 5, "M2": 6, "M3": 7, "M4": 8}}"#);
        let instances = vec![
            instance(1, 1, 1, "cut_0", "cut", &["M1", "M2", "M3", "M4"]),
            instance(2, 1, 1, "cut_1", "cut", &["M1", "M2", "M3", "M4"]),
            instance(3, 1, 1, "cut_2", "cut", &["M1", "M2", "M3", "M4"]),
        ];
        let out = solve(&instances, &[], &cat, fast_config()).await.unwrap();
        assert_eq!(out.makespan, 7, "the three fastest distinct machines (5, 6, 7) run in parallel");
        let machines: std::collections::HashSet<_> = out.rows.iter().map(|r| r.assigned_machine.clone()).collect();
        assert_eq!(machines.len(), 3, "split siblings must never share a machine");
    }

    #[tokio::test]
    async fn s5_lock_is_honoured() {
        let cat = catalogue(r#"{"cut": {"M1": 5, "M2": 5}}"#);
        let instances = vec![
            instance(1, 1, 1, "cut", "cut", &["M1", "M2"]),
            instance(2, 2, 1, "cut", "cut", &["M1", "M2"]),
        ];
        let locks = vec![Lock { task_instance_id: 1, machine: "M2".into(), start_min: 10 }];
        let out = solve(&instances, &locks, &cat, fast_config()).await.unwrap();
        let locked_row = out.rows.iter().find(|r| r.task_instance_id == 1).unwrap();
        assert_eq!(locked_row.assigned_machine, "M2");
        assert_eq!(locked_row.start_time, 10);
        assert!(out.makespan >= 15);
    }

    #[tokio::test]
    async fn s6_lock_on_ineligible_machine_is_rejected() {
        let cat = catalogue(r#"{"cut": {"M1": 5, "M2": 5}}"#);
        let instances = vec![instance(1, 1, 1, "cut", "cut", &["M1", "M2"])];
        let locks = vec![Lock { task_instance_id: 1, machine: "M3".into(), start_min: 0 }];
        let err = solve(&instances, &locks, &cat, fast_config()).await.unwrap_err();
        assert!(matches!(err, FjsmError::InvalidLock { .. }));
    }

    #[tokio::test]
    async fn zero_instances_completes_with_zero_makespan() {
        let cat = catalogue(r#"{}"#);
        let out = solve(&[], &[], &cat, fast_config()).await.unwrap();
        assert_eq!(out.makespan, 0);
        assert!(out.rows.is_empty());
    }

    // kept for reference: package/job/task model not exercised directly by
    // this crate, but the unused-import lint would otherwise flag the
    // fixtures helpers above if the expansion path is ever inlined here.
    #[allow(dead_code)]
    fn unused_package_builder() -> Package {
        Package {
            package_id: 1,
            deadline: "x".into(),
            jobs: vec![Job { job_id: 1, tasks: vec![Task { name: "x".into(), mode: TaskMode::Single, order: 1, count: None, eligible_machines: vec![] } ] }],
            source: "test".into(),
        }
    }
}
