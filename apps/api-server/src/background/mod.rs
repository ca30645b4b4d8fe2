//! Background maintenance: periodic sweep of expired local windows.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use fieldguard_infra::RateLimiterContext;

#[cfg(feature = "scheduler")]
pub mod scheduler;

/// Runs [`RateLimiterContext::collect_garbage`] on a fixed interval.
pub struct WindowSweeper {
    #[cfg(feature = "scheduler")]
    scheduler: scheduler::Scheduler,
    #[cfg(not(feature = "scheduler"))]
    task: tokio::task::JoinHandle<()>,
}

impl WindowSweeper {
    #[cfg(feature = "scheduler")]
    pub async fn start(limiter: Arc<RateLimiterContext>, interval: Duration) -> io::Result<Self> {
        let scheduler = scheduler::Scheduler::new().await.map_err(scheduler_error)?;
        scheduler
            .add_repeated(interval, move || {
                let limiter = limiter.clone();
                async move {
                    limiter.collect_garbage();
                }
            })
            .await
            .map_err(scheduler_error)?;
        scheduler.start().await.map_err(scheduler_error)?;

        Ok(Self { scheduler })
    }

    #[cfg(not(feature = "scheduler"))]
    pub async fn start(limiter: Arc<RateLimiterContext>, interval: Duration) -> io::Result<Self> {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.collect_garbage();
            }
        });
        tracing::info!(interval_secs = interval.as_secs(), "Window sweeper started");

        Ok(Self { task })
    }

    pub async fn shutdown(self) {
        #[cfg(feature = "scheduler")]
        {
            let mut scheduler = self.scheduler;
            if let Err(e) = scheduler.shutdown().await {
                tracing::warn!("Scheduler shutdown failed: {:?}", e);
            }
        }

        #[cfg(not(feature = "scheduler"))]
        {
            self.task.abort();
        }
    }
}

#[cfg(feature = "scheduler")]
fn scheduler_error(e: tokio_cron_scheduler::JobSchedulerError) -> io::Error {
    io::Error::other(format!("scheduler: {:?}", e))
}
