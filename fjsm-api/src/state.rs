use std::sync::Arc;

use fjsm_coordinator::RunCoordinator;
use fjsm_ports::JobQueue;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RunCoordinator>,
    pub queue: Arc<dyn JobQueue>,
}
