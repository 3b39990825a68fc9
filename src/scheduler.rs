//! Cron registration of the equipment status sweep

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use crate::{
    config::MonitorConfig,
    error::{AppError, AppResult},
    services::{monitor::MonitorService, today},
};

/// Runs the reconciliation sweep on the configured schedule
pub struct MonitorScheduler {
    scheduler: JobScheduler,
    monitor: MonitorService,
}

impl std::fmt::Debug for MonitorScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorScheduler").finish()
    }
}

impl MonitorScheduler {
    pub async fn new(monitor: MonitorService) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create scheduler: {}", e)))?;
        Ok(Self { scheduler, monitor })
    }

    /// Register the sweep and start ticking
    pub async fn start(&self, config: &MonitorConfig) -> AppResult<()> {
        let monitor = self.monitor.clone();
        let job = CronJob::new_async(config.schedule.as_str(), move |_uuid, _lock| {
            let monitor = monitor.clone();
            Box::pin(async move {
                match monitor.run_scheduled(today()).await {
                    Ok(Some(report)) if report.fixed > 0 => {
                        tracing::warn!(
                            checked = report.checked,
                            fixed = report.fixed,
                            "Scheduled sweep corrected equipment status drift"
                        );
                    }
                    Ok(_) => {}
                    // Retried on the next tick
                    Err(e) => tracing::error!("Scheduled equipment status sweep failed: {}", e),
                }
            })
        })
        .map_err(|e| {
            AppError::Internal(format!("Invalid monitor schedule '{}': {}", config.schedule, e))
        })?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to add monitor schedule: {}", e)))?;
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!(schedule = %config.schedule, "Equipment status monitor scheduled");

        if config.run_on_startup {
            let monitor = self.monitor.clone();
            tokio::spawn(async move {
                if let Err(e) = monitor.run_scheduled(today()).await {
                    tracing::error!("Startup equipment status sweep failed: {}", e);
                }
            });
        }
        Ok(())
    }

    /// Stop the scheduler
    pub async fn shutdown(&mut self) -> AppResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Monitor scheduler shut down");
        Ok(())
    }
}
