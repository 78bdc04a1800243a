//! Converts a sequence of Packages into a flat, solver-ready sequence of
//! Task Instances, validating machine eligibility and split feasibility
//! along the way (spec.md §4.2).

use fjsm_catalogue::MachineCatalogue;
use fjsm_model::{FjsmError, Package, TaskInstance, TaskMode};

/// Upper bound on the number of instances a single expansion will emit.
/// Bounds worst-case solve time; exceeding it truncates the output and logs
/// a warning rather than failing the run.
pub static MAX_INSTANCES: env_param::EnvParam<usize> = env_param::EnvParam::new("FJSM_MAX_INSTANCES", "1000");

/// Expands `packages` into task instances, in package/job/task declaration
/// order. Instance ids are assigned from a counter local to this call,
/// starting at 1 (never a process-wide singleton — spec.md §9's "Global
/// state" re-architecture note).
pub fn expand(packages: &[Package], catalogue: &MachineCatalogue) -> Result<Vec<TaskInstance>, FjsmError> {
    let mut instances = Vec::new();
    let mut next_id: u32 = 1;

    for package in packages {
        let uid = package.uid();
        for job in &package.jobs {
            for task in &job.tasks {
                let base_name = task.base_name();
                let eligible: Vec<String> = task
                    .eligible_machines
                    .iter()
                    .filter(|m| catalogue.duration(&base_name, m) > 0)
                    .cloned()
                    .collect();

                if eligible.is_empty() {
                    return Err(FjsmError::NoEligibleMachine {
                        job_id: job.job_id,
                        task_name: task.name.clone(),
                    });
                }

                match task.mode {
                    TaskMode::Single => {
                        instances.push(TaskInstance {
                            id: next_id,
                            package_uid: uid.clone(),
                            job_id: job.job_id,
                            order: task.order,
                            name: task.name.clone(),
                            base_name: base_name.clone(),
                            machine_candidates: eligible.clone(),
                        });
                        next_id += 1;
                    }
                    TaskMode::Split => {
                        let count = task.count.unwrap_or(1);
                        if count as usize > eligible.len() {
                            return Err(FjsmError::InsufficientMachines {
                                job_id: job.job_id,
                                task_name: task.name.clone(),
                                requested: count,
                                available: eligible.len(),
                            });
                        }
                        for i in 0..count {
                            instances.push(TaskInstance {
                                id: next_id,
                                package_uid: uid.clone(),
                                job_id: job.job_id,
                                order: task.order,
                                name: format!("{}_{}", task.name, i),
                                base_name: base_name.clone(),
                                machine_candidates: eligible.clone(),
                            });
                            next_id += 1;
                        }
                    }
                }
            }
        }
    }

    let cap = MAX_INSTANCES.get();
    if instances.len() > cap {
        tracing::warn!(
            emitted = instances.len(),
            cap,
            "expansion exceeded the instance safety cap; truncating"
        );
        instances.truncate(cap);
    }

    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjsm_model::{Job, Task};

    fn catalogue() -> MachineCatalogue {
        MachineCatalogue::from_json_str(
            r#"{
                "cut": {"M1": 5, "M2": 5},
                "engrave": {"M1": 3, "M2": 4, "M3": 6, "M4": 8}
            }"#,
        )
        .unwrap()
    }

    fn package(job_tasks: Vec<Task>) -> Package {
        Package {
            package_id: 1,
            deadline: "2026-01-01".into(),
            jobs: vec![Job { job_id: 1, tasks: job_tasks }],
            source: "test".into(),
        }
    }

    #[test]
    fn single_task_yields_one_instance() {
        let pkg = package(vec![Task {
            name: "cut".into(),
            mode: TaskMode::Single,
            order: 1,
            count: None,
            eligible_machines: vec!["M1".into(), "M2".into()],
        }]);
        let instances = expand(&[pkg], &catalogue()).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].id, 1);
        assert_eq!(instances[0].name, "cut");
        assert_eq!(instances[0].machine_candidates, vec!["M1".to_string(), "M2".to_string()]);
    }

    #[test]
    fn split_task_yields_count_instances_with_suffixes() {
        let pkg = package(vec![Task {
            name: "engrave".into(),
            mode: TaskMode::Split,
            order: 1,
            count: Some(3),
            eligible_machines: vec!["M1".into(), "M2".into(), "M3".into(), "M4".into()],
        }]);
        let instances = expand(&[pkg], &catalogue()).unwrap();
        assert_eq!(instances.len(), 3);
        let names: Vec<_> = instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["engrave_0", "engrave_1", "engrave_2"]);
        for i in &instances {
            assert_eq!(i.machine_candidates.len(), 4);
        }
    }

    #[test]
    fn no_eligible_machine_fails() {
        let pkg = package(vec![Task {
            name: "bend".into(),
            mode: TaskMode::Single,
            order: 1,
            count: None,
            eligible_machines: vec!["M1".into()],
        }]);
        let err = expand(&[pkg], &catalogue()).unwrap_err();
        assert!(matches!(err, FjsmError::NoEligibleMachine { .. }));
    }

    #[test]
    fn split_task_with_too_few_machines_fails() {
        let pkg = package(vec![Task {
            name: "cut".into(),
            mode: TaskMode::Split,
            order: 1,
            count: Some(3),
            eligible_machines: vec!["M1".into(), "M2".into()],
        }]);
        let err = expand(&[pkg], &catalogue()).unwrap_err();
        assert!(matches!(err, FjsmError::InsufficientMachines { requested: 3, available: 2, .. }));
    }

    #[test]
    fn zero_duration_machine_is_excluded_from_candidates() {
        let pkg = package(vec![Task {
            name: "cut".into(),
            mode: TaskMode::Single,
            order: 1,
            // M3 has no entry under "cut" at all -> duration 0 -> excluded.
            eligible_machines: vec!["M1".into(), "M3".into()],
            count: None,
        }]);
        let instances = expand(&[pkg], &catalogue()).unwrap();
        assert_eq!(instances[0].machine_candidates, vec!["M1".to_string()]);
    }

    #[test]
    fn instance_ids_are_sequential_across_packages_and_jobs() {
        let pkg1 = package(vec![Task {
            name: "cut".into(),
            mode: TaskMode::Single,
            order: 1,
            count: None,
            eligible_machines: vec!["M1".into()],
        }]);
        let mut pkg2 = package(vec![Task {
            name: "cut".into(),
            mode: TaskMode::Single,
            order: 1,
            count: None,
            eligible_machines: vec!["M1".into()],
        }]);
        pkg2.package_id = 2;
        let instances = expand(&[pkg1, pkg2], &catalogue()).unwrap();
        assert_eq!(instances.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(instances[0].package_uid, "test:1");
        assert_eq!(instances[1].package_uid, "test:2");
    }
}
