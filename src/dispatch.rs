//! Filing reminders and alert forwarding.
//!
//! Reminders go out when the deadline of the open OSS return is a
//! configured number of days away. Every alert raised by the engine is then
//! handed to a [`Notifier`] (e-mail, chat, ...) once, for merchants that
//! opted in.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::core::{Alert, AlertKind, AlertOutbox, DispatchConfig, MerchantContext, Severity};
use crate::report::{filing_deadline, quarter_label};

/// Delivery failure reported by a [`Notifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification failed: {0}")]
pub struct NotifyError(pub String);

/// Delivers alerts to merchants.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, merchant: &MerchantContext, alert: &Alert) -> Result<(), NotifyError>;
}

/// Supplies the merchants the dispatcher works on.
pub trait MerchantSource: Send + Sync {
    fn merchants(&self) -> Vec<MerchantContext>;
}

impl MerchantSource for Vec<MerchantContext> {
    fn merchants(&self) -> Vec<MerchantContext> {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub reminders: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// (merchant, year, quarter, days before the deadline)
type ReminderKey = (String, i32, u32, i64);

pub struct AlertDispatcher {
    outbox: Arc<dyn AlertOutbox>,
    notifier: Arc<dyn Notifier>,
    config: DispatchConfig,
    reminded: DashSet<ReminderKey>,
}

impl AlertDispatcher {
    pub fn new(outbox: Arc<dyn AlertOutbox>, notifier: Arc<dyn Notifier>, config: DispatchConfig) -> Self {
        Self {
            outbox,
            notifier,
            config,
            reminded: DashSet::new(),
        }
    }

    /// Raise due reminders, then forward pending alerts.
    pub async fn run_once(&self, now: NaiveDateTime, merchants: &[MerchantContext]) -> DispatchSummary {
        let mut summary = DispatchSummary {
            reminders: self.raise_reminders(now, merchants),
            ..DispatchSummary::default()
        };

        for alert in self.outbox.undelivered() {
            let Some(merchant) = merchants
                .iter()
                .find(|m| m.id == alert.merchant_id && m.alerts_enabled)
            else {
                continue;
            };
            match self.notifier.notify(merchant, &alert).await {
                Ok(()) => {
                    self.outbox.mark_delivered(alert.id);
                    summary.delivered += 1;
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::error!(merchant = %merchant.id, alert = %alert.id, error = %err, "alert delivery failed");
                }
            }
        }
        summary
    }

    /// Run [`run_once`](Self::run_once) on the configured interval until
    /// `shutdown` fires.
    pub fn spawn(self: &Arc<Self>, merchants: Arc<dyn MerchantSource>, shutdown: CancellationToken) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        let every = Duration::from_secs(self.config.interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("alert dispatcher shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let merchants = merchants.merchants();
                        let summary = dispatcher.run_once(Utc::now().naive_utc(), &merchants).await;
                        tracing::debug!(?summary, "dispatch cycle finished");
                    }
                }
            }
        })
    }

    fn raise_reminders(&self, now: NaiveDateTime, merchants: &[MerchantContext]) -> usize {
        let deadline = filing_deadline(now);
        // Reminders of returns already past their deadline can't repeat.
        self.reminded
            .retain(|(_, year, quarter, _)| (*year, *quarter) >= (deadline.year, deadline.quarter));
        if !self.config.reminder_days.contains(&deadline.days_remaining) {
            return 0;
        }
        let period = quarter_label(deadline.year, deadline.quarter);

        let mut raised = 0;
        for merchant in merchants.iter().filter(|m| m.oss_registered && m.alerts_enabled) {
            let reminder = (
                merchant.id.clone(),
                deadline.year,
                deadline.quarter,
                deadline.days_remaining,
            );
            if !self.reminded.insert(reminder) {
                continue;
            }
            let key = format!(
                "{}:{}:{}:{}",
                merchant.id,
                AlertKind::QuarterlyReminder,
                period,
                deadline.days_remaining
            );
            let alert = Alert::new(
                &merchant.id,
                AlertKind::QuarterlyReminder,
                Severity::Info,
                format!("OSS return for {period} due in {} day(s)", deadline.days_remaining),
                format!(
                    "Your OSS return for {period} must be filed by {}.",
                    deadline.deadline.format("%Y-%m-%d")
                ),
            )
            .action("Generate and submit your quarterly OSS report")
            .dedup_key(key);
            self.outbox.raise(alert);
            raised += 1;
        }
        if raised > 0 {
            tracing::info!(period = %period, days = deadline.days_remaining, raised, "OSS filing reminders raised");
        }
        raised
    }
}
