//! Background scheduler for periodic project backups.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use crate::config::SchedulerConfig;
use crate::state::SharedState;

pub type SchedulerState = Arc<RwLock<SharedState>>;

pub struct Scheduler {
    state: SchedulerState,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(state: SchedulerState, config: SchedulerConfig) -> Self {
        Self {
            state,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let retention = self.config.retention_count;

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let state = Arc::clone(&state);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_backup_cycle(&state, retention).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        loop {
            if !*self.running.read().await {
                break;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_hours = self.config.backup_interval_hours.max(1);
        let retention = self.config.retention_count;

        info!("Scheduler running: backups every {}h", interval_hours);

        let mut backup_interval =
            interval(Duration::from_secs(u64::from(interval_hours) * 60 * 60));

        // the first tick fires immediately; skip it so startup stays quiet
        backup_interval.tick().await;

        loop {
            backup_interval.tick().await;

            if !*self.running.read().await {
                break;
            }

            run_backup_cycle(&self.state, retention).await;
        }

        Ok(())
    }

    pub async fn stop(&self) {
        *self.running.write().await = false;
    }
}

/// Dumps every known project and prunes each dump directory down to the
/// retention count, oldest archives first.
async fn run_backup_cycle(state: &SchedulerState, retention: usize) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job_name = "backup_projects", "Starting scheduled backup run");

    let (store, backups) = {
        let shared = state.read().await;
        (shared.store.clone(), shared.backups.clone())
    };

    let projects = match store.list_projects().await {
        Ok(projects) => projects,
        Err(e) => {
            error!(event = "job_failed", job_name = "backup_projects", error = %e, "Failed to enumerate projects");
            return;
        }
    };

    for project in &projects {
        if let Err(e) = backups.create(project).await {
            error!(event = "job_failed", job_name = "backup_projects", project, error = %e, "Scheduled backup failed");
            continue;
        }

        if retention == 0 {
            continue;
        }

        match backups.list(project).await {
            Ok(mut timestamps) => {
                // archive names are ms-epoch integers, so numeric order is age order
                timestamps.sort_by_key(|t| t.parse::<i64>().unwrap_or(i64::MAX));

                while timestamps.len() > retention {
                    let oldest = timestamps.remove(0);
                    if let Err(e) = backups.delete(project, &oldest).await {
                        error!(project, timestamp = %oldest, error = %e, "Failed to prune old backup");
                    }
                }
            }
            Err(e) => {
                error!(project, error = %e, "Failed to list backups for pruning");
            }
        }
    }

    info!(
        event = "job_finished",
        job_name = "backup_projects",
        projects = projects.len(),
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Scheduled backup run finished"
    );
}
