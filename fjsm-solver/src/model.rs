//! Builds and solves one stage of the two-stage lexicographic MILP. Kept
//! free of async/tokio: both stages are run on a dedicated OS thread by
//! `crate::solve` so the wall-clock cap can be enforced without blocking the
//! async runtime.

use std::collections::HashMap;

use fjsm_catalogue::MachineCatalogue;
use fjsm_model::{Lock, TaskInstance};
use good_lp::{constraint, variable, variables, Expression, Solution, SolverModel, Variable};

/// Per-instance, per-candidate-machine assignment indicator.
type XKey = (u32, String);

pub struct StageOutcome {
    pub makespan: i64,
    pub assignment: HashMap<u32, (String, i64, i64)>, // instance id -> (machine, start, end)
}

/// Minimises makespan. Returns `None` if the solver could not find a
/// feasible solution (caller maps this to `InfeasibleOrTimeout`).
pub fn solve_stage1(instances: &[TaskInstance], locks: &[Lock], catalogue: &MachineCatalogue, horizon: i64) -> Option<StageOutcome> {
    let built = Model::build(instances, locks, catalogue, horizon, None);
    built.solve(Objective::Makespan)
}

/// Minimises total completion time, with the makespan fixed to the value
/// found by stage 1.
pub fn solve_stage2(
    instances: &[TaskInstance],
    locks: &[Lock],
    catalogue: &MachineCatalogue,
    horizon: i64,
    fixed_makespan: i64,
) -> Option<StageOutcome> {
    let built = Model::build(instances, locks, catalogue, horizon, Some(fixed_makespan));
    built.solve(Objective::TotalCompletion)
}

enum Objective {
    Makespan,
    TotalCompletion,
}

struct Model {
    vars: good_lp::ProblemVariables,
    constraints: Vec<good_lp::Constraint>,
    x: HashMap<XKey, Variable>,
    ms: HashMap<u32, Variable>,
    me: HashMap<u32, Variable>,
    job_end: HashMap<u32, Variable>,
    makespan: Variable,
}

impl Model {
    fn build(instances: &[TaskInstance], locks: &[Lock], catalogue: &MachineCatalogue, horizon: i64, fixed_makespan: Option<i64>) -> Self {
        let h = horizon as f64;
        let mut vars = variables!();
        let mut x: HashMap<XKey, Variable> = HashMap::new();
        let mut ms: HashMap<u32, Variable> = HashMap::new();
        let mut me: HashMap<u32, Variable> = HashMap::new();
        let mut constraints = Vec::new();

        let locks_by_instance: HashMap<u32, &Lock> = locks.iter().map(|l| (l.task_instance_id, l)).collect();

        for t in instances {
            let lock = locks_by_instance.get(&t.id);

            let start_bounds = match lock {
                Some(l) => (l.start_min as f64, l.start_min as f64),
                None => (0.0, h),
            };
            let start_var = vars.add(variable().integer().min(start_bounds.0).max(start_bounds.1));
            ms.insert(t.id, start_var);

            let end_var = vars.add(variable().integer().min(0.0).max(h));
            me.insert(t.id, end_var);

            let mut duration_expr = Expression::from(0.0);
            let mut assignment_sum = Expression::from(0.0);
            for m in &t.machine_candidates {
                let is_locked_choice = lock.map(|l| &l.machine == m);
                let (lo, hi) = match is_locked_choice {
                    Some(true) => (1.0, 1.0),
                    Some(false) => (0.0, 0.0),
                    None => (0.0, 1.0),
                };
                let xv = vars.add(variable().integer().min(lo).max(hi));
                x.insert((t.id, m.clone()), xv);
                let duration = catalogue.duration(&t.base_name, m) as f64;
                duration_expr = duration_expr + duration * xv;
                assignment_sum = assignment_sum + xv;
            }
            constraints.push(constraint!(assignment_sum == 1.0));
            constraints.push(constraint!(end_var == start_var + duration_expr));
        }

        // Precedence: consecutive phases within a job.
        let mut by_job: HashMap<u32, HashMap<u32, Vec<&TaskInstance>>> = HashMap::new();
        for t in instances {
            by_job.entry(t.job_id).or_default().entry(t.order).or_default().push(t);
        }
        let mut job_end: HashMap<u32, Variable> = HashMap::new();
        for (job_id, phases) in &by_job {
            let mut orders: Vec<u32> = phases.keys().copied().collect();
            orders.sort_unstable();
            for w in orders.windows(2) {
                let (cur, next) = (w[0], w[1]);
                for t1 in &phases[&cur] {
                    for t2 in &phases[&next] {
                        constraints.push(constraint!(me[&t1.id] <= ms[&t2.id]));
                    }
                }
            }
            let last_order = *orders.last().expect("job has at least one phase");
            let job_end_var = vars.add(variable().integer().min(0.0).max(h));
            for t in &phases[&last_order] {
                constraints.push(constraint!(job_end_var >= me[&t.id]));
            }
            job_end.insert(*job_id, job_end_var);
        }

        // Resource: per-machine pairwise non-overlap (big-M disjunction).
        let mut by_machine: HashMap<&str, Vec<&TaskInstance>> = HashMap::new();
        for t in instances {
            for m in &t.machine_candidates {
                by_machine.entry(m.as_str()).or_default().push(t);
            }
        }
        for (machine, group) in by_machine {
            for i in 0..group.len() {
                for j in (i + 1)..group.len() {
                    let t1 = group[i];
                    let t2 = group[j];
                    let x1 = x[&(t1.id, machine.to_string())];
                    let x2 = x[&(t2.id, machine.to_string())];
                    let y = vars.add(variable().integer().min(0.0).max(1.0));
                    constraints.push(constraint!(ms[&t2.id] - me[&t1.id] - h * y - h * x1 - h * x2 >= -3.0 * h));
                    constraints.push(constraint!(ms[&t1.id] - me[&t2.id] + h * y - h * x1 - h * x2 >= -2.0 * h));
                }
            }
        }

        let makespan = vars.add(variable().integer().min(0.0).max(h));
        for (_job_id, job_end_var) in &job_end {
            constraints.push(constraint!(makespan >= *job_end_var));
        }
        if let Some(fixed) = fixed_makespan {
            constraints.push(constraint!(makespan == fixed as f64));
        }

        Model {
            vars,
            constraints,
            x,
            ms,
            me,
            job_end,
            makespan,
        }
    }

    fn solve(self, objective: Objective) -> Option<StageOutcome> {
        let objective_expr: Expression = match objective {
            Objective::Makespan => self.makespan.into(),
            Objective::TotalCompletion => {
                let mut sum = Expression::from(0.0);
                for v in self.job_end.values() {
                    sum = sum + *v;
                }
                sum
            }
        };

        let mut problem = self.vars.minimise(objective_expr).using(good_lp::microlp);
        for c in self.constraints {
            problem = problem.with(c);
        }
        let solution = problem.solve().ok()?;

        let makespan = solution.value(self.makespan).round() as i64;
        let mut assignment = HashMap::new();
        for ((instance_id, machine), var) in &self.x {
            let chosen = solution.value(*var).round() > 0.5;
            if chosen {
                let start = solution.value(self.ms[instance_id]).round() as i64;
                let end = solution.value(self.me[instance_id]).round() as i64;
                assignment.insert(*instance_id, (machine.clone(), start, end));
            }
        }
        Some(StageOutcome { makespan, assignment })
    }
}
