//! Fixed-size worker thread pool draining an unbounded `crossbeam_channel`.
//! Grounded on the teacher's own `ParSolver`
//! (`solver/src/solver/parallel/parallel_solver.rs`), which fans work across
//! a pool of OS threads connected by `crossbeam_channel`; here the "solvers"
//! are `RunCoordinator::execute` calls instead of SAT search threads.
//!
//! This queue is in-process only: jobs queued or mid-flight at process exit
//! are lost, and there is no at-least-once redelivery across restarts. A
//! durable external queue is a drop-in replacement behind the same
//! `JobQueue` port.

use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Sender};
use fjsm_ports::{JobQueue, PlanJob};

use crate::RunCoordinator;

/// Number of worker threads draining the job queue. Default 4.
pub static WORKER_THREADS: env_param::EnvParam<usize> = env_param::EnvParam::new("FJSM_WORKER_THREADS", "4");

pub struct WorkerQueue {
    sender: Sender<PlanJob>,
}

impl WorkerQueue {
    /// Spawns the worker pool. Each thread blocks on `handle` to drive the
    /// async `RunCoordinator::execute` to completion, one job at a time.
    pub fn spawn(coordinator: Arc<RunCoordinator>, handle: tokio::runtime::Handle) -> Self {
        let (sender, receiver) = unbounded::<PlanJob>();
        let workers = WORKER_THREADS.get().max(1);
        for worker_id in 0..workers {
            let receiver = receiver.clone();
            let coordinator = coordinator.clone();
            let handle = handle.clone();
            thread::Builder::new()
                .name(format!("fjsm-worker-{worker_id}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        let run_id = job.run_id;
                        handle.block_on(coordinator.execute(job));
                        tracing::debug!(%run_id, worker_id, "run processed");
                    }
                })
                .expect("failed to spawn fjsm worker thread");
        }
        WorkerQueue { sender }
    }
}

impl JobQueue for WorkerQueue {
    fn enqueue(&self, job: PlanJob) {
        let run_id = job.run_id;
        if self.sender.send(job).is_err() {
            tracing::error!(%run_id, "worker pool is gone, job dropped");
        }
    }
}
