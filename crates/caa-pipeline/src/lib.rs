//! Pipeline orchestration: extraction, aggregation, load, snapshot and the
//! daily scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use caa_core::AggregateBundle;
use caa_source::{queries, SourceStore};
use caa_warehouse::Warehouse;
use tokio::fs;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

pub const CRATE_NAME: &str = "caa-pipeline";

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SNAPSHOT_PATH: &str = "./aggregated_data.json";
/// Daily at midnight local time (sec min hour day month weekday).
pub const DEFAULT_CRON: &str = "0 0 0 * * *";

/// Environment-supplied runtime configuration. Required variables fail fast
/// at startup with an error naming the missing variable.
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    pub mongo_uri: String,
    pub mongo_db: String,
    pub database_url: String,
    pub base_path: String,
    pub port: u16,
    pub snapshot_path: PathBuf,
    pub scheduler_enabled: bool,
    pub cron: String,
}

impl AggregatorConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            mongo_uri: required_var("MONGO_URI")?,
            mongo_db: required_var("MONGO_DB")?,
            database_url: required_var("DATABASE_URL")?,
            base_path: normalize_base_path(&required_var("BASE_PATH")?),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            snapshot_path: std::env::var("SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_SNAPSHOT_PATH)),
            scheduler_enabled: std::env::var("CAA_SCHEDULER_ENABLED")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "True"))
                .unwrap_or(true),
            cron: std::env::var("CAA_CRON").unwrap_or_else(|_| DEFAULT_CRON.to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow!("required environment variable {name} is not set"))
}

/// Normalize a configured URL prefix to leading-slash, no-trailing-slash
/// form; an empty prefix stays empty.
pub fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

/// Sequences extraction, aggregation and load. Strictly sequential; the
/// first failing step aborts the run with no partial result.
pub struct Aggregator {
    source: Arc<dyn SourceStore>,
    warehouse: Arc<dyn Warehouse>,
    snapshot_path: PathBuf,
}

impl Aggregator {
    pub fn new(
        source: Arc<dyn SourceStore>,
        warehouse: Arc<dyn Warehouse>,
        snapshot_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source,
            warehouse,
            snapshot_path: snapshot_path.into(),
        }
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub async fn run(&self) -> Result<AggregateBundle> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "starting aggregation run");

        self.source
            .ping()
            .await
            .context("source store connectivity check")?;

        let appointments_per_doctor = queries::appointments_per_doctor(self.source.as_ref())
            .await
            .context("computing appointments per doctor")?;
        let appointment_frequency = queries::appointment_frequency(self.source.as_ref())
            .await
            .context("computing appointment frequency")?;
        let common_conditions_by_specialty =
            queries::common_conditions_by_specialty(self.source.as_ref())
                .await
                .context("computing common conditions by specialty")?;

        self.warehouse
            .write_doctor_aggregates(&appointments_per_doctor)
            .await
            .context("loading doctor aggregates")?;
        self.warehouse
            .write_frequency_aggregates(&appointment_frequency)
            .await
            .context("loading frequency aggregates")?;
        self.warehouse
            .write_condition_aggregates(&common_conditions_by_specialty)
            .await
            .context("loading condition aggregates")?;

        info!(
            %run_id,
            doctors = appointments_per_doctor.len(),
            months = appointment_frequency.len(),
            specialties = common_conditions_by_specialty.len(),
            "aggregation run completed"
        );

        Ok(AggregateBundle {
            appointments_per_doctor,
            appointment_frequency,
            common_conditions_by_specialty,
        })
    }

    /// Persist the bundle as the on-disk snapshot, full overwrite, via a
    /// temp file and atomic rename.
    pub async fn write_snapshot(&self, bundle: &AggregateBundle) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(bundle).context("serializing snapshot")?;

        let parent = self
            .snapshot_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating snapshot directory {}", parent.display()))?;

        let temp_path = parent.join(format!(".{}.snapshot.tmp", Uuid::new_v4()));
        fs::write(&temp_path, &bytes)
            .await
            .with_context(|| format!("writing temp snapshot {}", temp_path.display()))?;
        if let Err(err) = fs::rename(&temp_path, &self.snapshot_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!("renaming snapshot into place {}", self.snapshot_path.display())
            });
        }

        info!(path = %self.snapshot_path.display(), "snapshot persisted");
        Ok(())
    }
}

/// Read and parse the last persisted snapshot.
pub async fn read_snapshot(path: &Path) -> Result<serde_json::Value> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing snapshot {}", path.display()))
}

/// Build the daily scheduler when enabled. The job runs the pipeline and,
/// on success only, overwrites the snapshot; failures are logged and the
/// next firing proceeds normally.
pub async fn maybe_build_scheduler(
    aggregator: Arc<Aggregator>,
    config: &AggregatorConfig,
) -> Result<Option<JobScheduler>> {
    if !config.scheduler_enabled {
        return Ok(None);
    }

    let sched = JobScheduler::new().await.context("creating scheduler")?;
    let cron = config.cron.clone();
    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let aggregator = aggregator.clone();
        Box::pin(async move {
            info!("running daily aggregation job");
            match aggregator.run().await {
                Ok(bundle) => {
                    if let Err(err) = aggregator.write_snapshot(&bundle).await {
                        error!(error = %err, "failed to persist aggregation snapshot");
                    }
                }
                Err(err) => {
                    error!(error = %err, "daily aggregation job failed");
                }
            }
        })
    })
    .with_context(|| format!("creating scheduler job for cron {cron}"))?;
    sched.add(job).await.context("adding scheduler job")?;
    Ok(Some(sched))
}
