//! The API Edge (spec.md §4.7 / §6): request validation, backend routing,
//! and CORS. Thin — all domain work is delegated to the Run Coordinator.

mod error;
mod handlers;
mod router;
mod state;

pub use router::build;
pub use state::AppState;
