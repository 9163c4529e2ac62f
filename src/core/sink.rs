//! Alert and audit collaborators.
//!
//! The engine only decides *that* an alert or audit entry is due. Storage,
//! delivery and display belong to the host, which plugs in its own
//! [`AlertSink`] / [`AuditSink`]. The in-memory sinks here back the
//! dispatcher and the tests.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Kind of compliance alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertKind {
    OssThresholdWarning,
    OssThresholdExceeded,
    VatRateError,
    QuarterlyReminder,
}

impl AlertKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OssThresholdWarning => "OSS_THRESHOLD_WARNING",
            Self::OssThresholdExceeded => "OSS_THRESHOLD_EXCEEDED",
            Self::VatRateError => "VAT_RATE_ERROR",
            Self::QuarterlyReminder => "QUARTERLY_REMINDER",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// An alert handed to the [`AlertSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub merchant_id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    /// What the merchant should do about it.
    pub action_required: Option<String>,
    /// At most one unresolved alert per key stands at a time.
    pub dedup_key: String,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        merchant_id: impl Into<String>,
        kind: AlertKind,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let merchant_id = merchant_id.into();
        let dedup_key = format!("{merchant_id}:{kind}");
        Self {
            id: Uuid::new_v4(),
            merchant_id,
            kind,
            severity,
            title: title.into(),
            message: message.into(),
            action_required: None,
            dedup_key,
            created_at: Utc::now(),
        }
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action_required = Some(action.into());
        self
    }

    pub fn dedup_key(mut self, key: impl Into<String>) -> Self {
        self.dedup_key = key.into();
        self
    }
}

/// Receives alerts raised by the engine.
pub trait AlertSink: Send + Sync {
    /// Whether an unresolved alert with this dedup key exists.
    fn has_active(&self, dedup_key: &str) -> bool;

    fn raise(&self, alert: Alert);
}

/// An [`AlertSink`] that also keeps track of delivery to the merchant.
pub trait AlertOutbox: AlertSink {
    /// Alerts not yet forwarded, oldest first.
    fn undelivered(&self) -> Vec<Alert>;

    fn mark_delivered(&self, id: Uuid);
}

/// Audit trail action kinds emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    VatValidated,
    ReportGenerated,
    ReportDownloaded,
    ReportSubmitted,
    AlertCreated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub merchant_id: String,
    pub action: AuditAction,
    pub entity_id: Option<String>,
    pub description: String,
    pub at: DateTime<Utc>,
}

/// Receives audit entries.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Audit sink that only emits `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            merchant = %entry.merchant_id,
            action = ?entry.action,
            entity = entry.entity_id.as_deref().unwrap_or("-"),
            "{}",
            entry.description
        );
    }
}

/// Audit sink keeping entries in memory.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

#[derive(Debug, Clone)]
struct StoredAlert {
    alert: Alert,
    resolved: bool,
    delivered: bool,
}

/// Alert sink keeping alerts in memory with resolve/delivery state.
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: DashMap<Uuid, StoredAlert>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts of a merchant, oldest first.
    pub fn alerts_for(&self, merchant_id: &str) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| entry.alert.merchant_id == merchant_id)
            .map(|entry| entry.alert.clone())
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        alerts
    }

    /// Mark an alert resolved, letting a new one with the same key through.
    pub fn resolve(&self, id: Uuid) -> bool {
        match self.alerts.get_mut(&id) {
            Some(mut entry) => {
                entry.resolved = true;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.alerts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.is_empty()
    }
}

impl AlertSink for MemoryAlertSink {
    fn has_active(&self, dedup_key: &str) -> bool {
        self.alerts
            .iter()
            .any(|entry| !entry.resolved && entry.alert.dedup_key == dedup_key)
    }

    fn raise(&self, alert: Alert) {
        self.alerts.insert(
            alert.id,
            StoredAlert {
                alert,
                resolved: false,
                delivered: false,
            },
        );
    }
}

impl AlertOutbox for MemoryAlertSink {
    fn undelivered(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .alerts
            .iter()
            .filter(|entry| !entry.delivered)
            .map(|entry| entry.alert.clone())
            .collect();
        alerts.sort_by_key(|a| a.created_at);
        alerts
    }

    fn mark_delivered(&self, id: Uuid) {
        if let Some(mut entry) = self.alerts.get_mut(&id) {
            entry.delivered = true;
        }
    }
}
