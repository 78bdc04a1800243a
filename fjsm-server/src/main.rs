//! Binary entry point (spec.md §2's "service process"): wires the storage
//! adapters, the background worker pool, and the HTTP edge together and
//! serves them. Mirrors the teacher's gRPC server binary (`clap::Parser` CLI,
//! `tracing_subscriber::fmt` logging) with `tonic::Server` swapped for
//! `axum::serve` and a single planning service swapped for the Run
//! Coordinator.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use fjsm_catalogue::MachineCatalogue;
use fjsm_coordinator::{BackendHandles, RunCoordinator, WorkerQueue};
use fjsm_document::{MongoOrderSink, MongoPackageRepository, MongoPlanStore};
use fjsm_ports::JobQueue;
use fjsm_postgres::{PgOrderSink, PgPackageRepository, PgPlanStore};
use fjsm_solver::SolverConfig;
use mongodb::Client as MongoClient;
use sqlx::postgres::PgPoolOptions;

/// FJSM scheduling service: accepts package/order input over HTTP, dispatches
/// flexible job-shop runs to a background worker pool, and serves plan
/// results back out.
#[derive(Parser, Debug)]
#[command(version, about = "Flexible job-shop scheduling service.", long_about = None)]
struct Args {
    /// Logging level to use: one of "error", "warn", "info", "debug", "trace".
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// Address to bind the HTTP API to.
    #[arg(long, default_value = "0.0.0.0:8080")]
    bind: SocketAddr,

    /// Path to the machine duration catalogue JSON file (spec.md §4.2).
    #[arg(long, env = "FJSM_CATALOGUE")]
    catalogue: std::path::PathBuf,

    /// Postgres connection string backing the relational storage pair.
    #[arg(long, env = "FJSM_POSTGRES_URL")]
    postgres_url: String,

    /// MongoDB connection string backing the document storage pair.
    #[arg(long, env = "FJSM_MONGO_URL")]
    mongo_url: String,

    /// Database name to use within the MongoDB connection.
    #[arg(long, env = "FJSM_MONGO_DB", default_value = "fjsm")]
    mongo_db: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(Instant::now()))
        .with_thread_ids(true)
        .with_max_level(args.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

    let catalogue = Arc::new(MachineCatalogue::load(&args.catalogue).context("loading machine catalogue")?);

    let pg_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&args.postgres_url)
        .await
        .context("connecting to postgres")?;
    sqlx::migrate!("../fjsm-postgres/migrations").run(&pg_pool).await.context("running postgres migrations")?;

    let mongo_client = MongoClient::with_uri_str(&args.mongo_url).await.context("connecting to mongodb")?;
    let mongo_db = mongo_client.database(&args.mongo_db);

    let relational = BackendHandles {
        packages: Arc::new(PgPackageRepository::new(pg_pool.clone())),
        store: Arc::new(PgPlanStore::new(pg_pool.clone())),
        orders: Arc::new(PgOrderSink::new(pg_pool)),
    };
    let document = BackendHandles {
        packages: Arc::new(MongoPackageRepository::new(&mongo_db)),
        store: Arc::new(MongoPlanStore::new(&mongo_db)),
        orders: Arc::new(MongoOrderSink::new(&mongo_db)),
    };

    let coordinator = Arc::new(RunCoordinator::new(relational, document, catalogue, SolverConfig::default()));
    let queue: Arc<dyn JobQueue> = Arc::new(WorkerQueue::spawn(coordinator.clone(), tokio::runtime::Handle::current()));

    let app = fjsm_api::build(fjsm_api::AppState { coordinator, queue });

    tracing::info!(addr = %args.bind, "starting fjsm-server");
    let listener = tokio::net::TcpListener::bind(args.bind).await.context("binding HTTP listener")?;
    axum::serve(listener, app).await.context("serving HTTP API")?;
    Ok(())
}
