use std::sync::Arc;

use tidemark_core::capture::{CaptureOptions, CaptureService};
use tidemark_core::compaction::{CompactionOptions, CompactionService};
use tidemark_core::jobs::{JobCursorRepositoryTrait, JobLockRegistry, SnapshotJobRunner};
use tidemark_core::retention::RetentionPolicy;
use tidemark_core::SnapshotRepositoryTrait;
use tidemark_storage_sqlite::{
    create_pool, init, run_migrations, spawn_writer, JobCursorRepository, SnapshotRepository,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};
use crate::events::{EventBus, EventBusPublisher};
use crate::valuation::{HttpActiveAccountSupplier, HttpValuationSource};

/// Capacity of the in-process event bus.
const EVENT_BUS_CAPACITY: usize = 1024;

pub struct AppState {
    pub runner: SnapshotJobRunner,
    pub snapshot_repository: Arc<dyn SnapshotRepositoryTrait>,
    pub event_bus: EventBus,
}

pub fn init_tracing(log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init(),
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let policy = RetentionPolicy::from_settings(&config.retention)?;

    let db_path = init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);
    let pool = create_pool(&db_path)?;
    run_migrations(&pool)?;
    let writer = spawn_writer((*pool).clone());

    let snapshot_repository: Arc<dyn SnapshotRepositoryTrait> =
        Arc::new(SnapshotRepository::new(pool.clone(), writer.clone()));
    let cursor_repository: Arc<dyn JobCursorRepositoryTrait> =
        Arc::new(JobCursorRepository::new(pool, writer));

    let event_bus = EventBus::new(EVENT_BUS_CAPACITY);
    let http = reqwest::Client::builder()
        .timeout(config.valuation_timeout)
        .build()?;

    let capture = CaptureService::new(
        snapshot_repository.clone(),
        Arc::new(HttpValuationSource::new(http.clone(), &config.valuation_url)),
        Arc::new(HttpActiveAccountSupplier::new(http, &config.valuation_url)),
        Arc::new(EventBusPublisher::new(event_bus.clone())),
        CaptureOptions {
            valuation_timeout: config.valuation_timeout,
            concurrency: config.capture_concurrency,
        },
    );
    let compaction = CompactionService::new(
        snapshot_repository.clone(),
        policy,
        CompactionOptions {
            concurrency: config.compaction_concurrency,
        },
    );

    let runner = SnapshotJobRunner::new(
        Arc::new(capture),
        Arc::new(compaction),
        cursor_repository,
        JobLockRegistry::new(),
    );

    Ok(Arc::new(AppState {
        runner,
        snapshot_repository,
        event_bus,
    }))
}
