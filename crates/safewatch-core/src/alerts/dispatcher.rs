//! Scheduled alert dispatcher - sends alerts whose scheduled time has come

use super::manager::{AlertError, AlertManager};
use chrono::{DateTime, Utc};
use safewatch_storage::repository::SmsAlertStore;
use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, warn};

/// What one dispatcher pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub due: usize,
    pub sent: usize,
    pub errors: usize,
}

/// Background worker that fires due `scheduled` alerts
pub struct AlertDispatcher<S: SmsAlertStore> {
    manager: Arc<AlertManager<S>>,
    /// Interval between passes (seconds)
    poll_interval_secs: u64,
}

impl<S: SmsAlertStore + 'static> AlertDispatcher<S> {
    /// Create a new dispatcher
    pub fn new(manager: Arc<AlertManager<S>>) -> Self {
        Self {
            manager,
            poll_interval_secs: 30,
        }
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs.max(1);
        self
    }

    /// Run forever, one pass per tick
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs(self.poll_interval_secs));

        info!(
            "Scheduled alert dispatcher started (interval: {}s)",
            self.poll_interval_secs
        );

        loop {
            ticker.tick().await;

            match self.dispatch_due(Utc::now()).await {
                Ok(summary) if summary.due > 0 => {
                    info!(
                        due = summary.due,
                        sent = summary.sent,
                        errors = summary.errors,
                        "Dispatched scheduled alerts"
                    );
                }
                Ok(_) => debug!("No scheduled alerts due"),
                Err(e) => error!("Error loading scheduled alerts: {}", e),
            }
        }
    }

    /// Send every alert due at `now`. A failing alert is logged and not
    /// retried within the pass. One with no audience or no eligible
    /// recipients is moved to `failed` so later passes skip it.
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> safewatch_common::Result<DispatchSummary> {
        let due = self.manager.store().due_scheduled(now).await?;
        let mut summary = DispatchSummary {
            due: due.len(),
            ..Default::default()
        };

        for alert in due {
            match self.manager.send_now(alert.id).await {
                Ok(sent) => {
                    debug!(alert_id = %sent.id, status = %sent.status, "Scheduled alert dispatched");
                    summary.sent += 1;
                }
                Err(e) => {
                    warn!(alert_id = %alert.id, error = %e, "Scheduled alert dispatch failed");
                    summary.errors += 1;
                    if matches!(e, AlertError::NoAudience | AlertError::NoRecipients) {
                        self.manager.mark_undeliverable(alert.id, &e).await?;
                    }
                }
            }
        }

        Ok(summary)
    }
}
