//! Cron-style job scheduler using tokio-cron-scheduler.

use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (with seconds) for the maintenance jobs.
    pub maintenance_schedule: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            maintenance_schedule: "0 * * * * *".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            enabled: std::env::var("SCHEDULER_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            ..Self::default()
        }
    }
}

/// Cron job scheduler wrapper.
pub struct Scheduler {
    inner: JobScheduler,
    config: SchedulerConfig,
}

impl Scheduler {
    pub async fn new(config: SchedulerConfig) -> Result<Self, JobSchedulerError> {
        let inner = JobScheduler::new().await?;
        Ok(Self { inner, config })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Add a cron job.
    pub async fn add_cron<F, Fut>(
        &self,
        name: &'static str,
        schedule: &str,
        task: F,
    ) -> Result<uuid::Uuid, JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let job = Job::new_async(schedule, move |_uuid, _lock| {
            let task = task.clone();
            Box::pin(async move {
                task().await;
            })
        })?;

        let id = self.inner.add(job).await?;
        tracing::info!(job = name, schedule = %schedule, job_id = %id, "Cron job registered");
        Ok(id)
    }

    pub async fn start(&self) -> Result<(), JobSchedulerError> {
        self.inner.start().await?;
        tracing::info!("Scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), JobSchedulerError> {
        self.inner.shutdown().await?;
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
