use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::{AuditAction, AuditEntry, AuditSink, ValidationConfig, registry_country_code};

use super::format::{VatNumber, mask_vat_number, parse_vat_number};
use super::record::{ValidationRecord, ValidationResult, ValidationStatus};
use super::registry::{RegistryError, RegistryResponse, VatRegistry};
use super::store::ValidationStore;

/// Counts of one reconciliation sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub attempted: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Still UNAVAILABLE, rescheduled.
    pub rescheduled: usize,
    /// Moved to ERROR (fault or retry budget spent).
    pub failed: usize,
}

/// Validates VAT numbers against a [`VatRegistry`] with caching, bounded
/// retries and a deferred reconciliation sweep.
///
/// Only one registry call per normalized number is in flight at a time;
/// callers arriving while one runs wait for it and are then served from
/// the cache when it produced a VALID record.
pub struct ValidationClient {
    registry: Arc<dyn VatRegistry>,
    store: Arc<ValidationStore>,
    audit: Arc<dyn AuditSink>,
    config: ValidationConfig,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ValidationClient {
    pub fn new(
        registry: Arc<dyn VatRegistry>,
        store: Arc<ValidationStore>,
        audit: Arc<dyn AuditSink>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            registry,
            store,
            audit,
            config,
            in_flight: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<ValidationStore> {
        &self.store
    }

    /// Validate a VAT number for a merchant.
    ///
    /// Never fails: format problems, registry outages and faults all end up
    /// as a stored record with the matching status.
    pub async fn validate(&self, merchant_id: &str, input: &str, correlation_id: Option<&str>) -> ValidationResult {
        let vat = match parse_vat_number(input) {
            Ok(vat) => vat,
            Err(err) => {
                tracing::info!(
                    merchant = %merchant_id,
                    vat = %mask_vat_number(&err.value),
                    reason = %err.reason,
                    "VAT number rejected by format check"
                );
                let mut record = ValidationRecord::new(
                    merchant_id,
                    err.value.as_str(),
                    err.country_code.as_deref(),
                    correlation_id,
                    ValidationStatus::FormatError,
                );
                record.error_message = Some(err.reason);
                self.store.save(&record);
                return ValidationResult::from(&record);
            }
        };

        if let Some(cached) = self.cached(&vat.normalized) {
            return ValidationResult::from(&cached);
        }

        let lock = self
            .in_flight
            .entry(vat.normalized.clone())
            .or_default()
            .clone();
        let result = {
            let _guard = lock.lock().await;
            // A concurrent caller may have finished while we waited.
            match self.cached(&vat.normalized) {
                Some(cached) => ValidationResult::from(&cached),
                None => self.call_registry(merchant_id, &vat, correlation_id).await,
            }
        };
        drop(lock);
        self.release_key(&vat.normalized);
        result
    }

    /// Run [`validate`](Self::validate) on the tokio runtime without
    /// waiting for it.
    pub fn validate_async(
        self: &Arc<Self>,
        merchant_id: impl Into<String>,
        input: impl Into<String>,
        correlation_id: Option<String>,
    ) -> JoinHandle<ValidationResult> {
        let client = Arc::clone(self);
        let merchant_id = merchant_id.into();
        let input = input.into();
        tokio::spawn(async move {
            client
                .validate(&merchant_id, &input, correlation_id.as_deref())
                .await
        })
    }

    /// Retry every UNAVAILABLE record that is due.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();
        let due = self.store.retryable(now, self.config.max_sweep_retries);
        if due.is_empty() {
            return summary;
        }
        tracing::info!(count = due.len(), "reconciling unavailable VAT validations");

        for mut record in due {
            let Some(number) = record.number.clone() else {
                continue;
            };
            let Some(country) = record.country_code.clone() else {
                continue;
            };
            summary.attempted += 1;
            let masked = mask_vat_number(&record.vat_number);

            let lock = self
                .in_flight
                .entry(record.vat_number.clone())
                .or_default()
                .clone();
            let guard = lock.lock().await;

            match self.check_once(&country, &number).await {
                Ok(response) => {
                    record.error_message = None;
                    record.next_retry_at = None;
                    record.request_id = Some(Uuid::new_v4().to_string());
                    apply_response(&mut record, &response, now);
                    if response.valid {
                        summary.valid += 1;
                    } else {
                        summary.invalid += 1;
                    }
                    tracing::info!(vat = %masked, status = %record.status, "deferred validation resolved");
                    self.record_audit(&record);
                }
                Err(err) if err.is_retryable() => {
                    record.retry_count += 1;
                    if record.retry_count >= self.config.max_sweep_retries {
                        record.status = ValidationStatus::Error;
                        record.next_retry_at = None;
                        record.error_message = Some(format!(
                            "registry still unavailable after {} sweep attempts",
                            record.retry_count
                        ));
                        summary.failed += 1;
                        tracing::warn!(vat = %masked, "giving up on deferred validation");
                    } else {
                        record.next_retry_at =
                            Some(now + Duration::minutes(self.config.sweep_backoff_minutes));
                        summary.rescheduled += 1;
                        tracing::debug!(vat = %masked, retry = record.retry_count, "registry still unavailable");
                    }
                }
                Err(err) => {
                    record.status = ValidationStatus::Error;
                    record.next_retry_at = None;
                    record.error_message = Some(err.to_string());
                    summary.failed += 1;
                    tracing::error!(vat = %masked, error = %err, "deferred validation failed");
                }
            }
            self.store.save(&record);
            drop(guard);
            drop(lock);
            self.release_key(&record.vat_number);
        }
        summary
    }

    /// Run [`reconcile`](Self::reconcile) every `every` until `shutdown`.
    pub fn spawn_reconciler(self: &Arc<Self>, every: StdDuration, shutdown: CancellationToken) -> JoinHandle<()> {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("validation reconciler shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let summary = client.reconcile(Utc::now()).await;
                        if summary.attempted > 0 {
                            tracing::info!(?summary, "reconciliation sweep finished");
                        }
                    }
                }
            }
        })
    }

    /// Drop the in-flight lock of a number once nobody holds or awaits it.
    fn release_key(&self, normalized: &str) {
        self.in_flight
            .remove_if(normalized, |_, l| Arc::strong_count(l) == 1);
    }

    /// Numbers with a registry call in progress or queued.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    fn cached(&self, normalized: &str) -> Option<ValidationRecord> {
        let hit = self.store.cached_valid(
            normalized,
            Utc::now(),
            Duration::hours(self.config.cache_ttl_hours),
        )?;
        tracing::debug!(vat = %mask_vat_number(normalized), "validation served from cache");
        Some(hit)
    }

    async fn check_once(&self, country: &str, number: &str) -> Result<RegistryResponse, RegistryError> {
        let call = self.registry.check(registry_country_code(country), number);
        match tokio::time::timeout(self.config.timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(RegistryError::Timeout),
        }
    }

    async fn call_registry(&self, merchant_id: &str, vat: &VatNumber, correlation_id: Option<&str>) -> ValidationResult {
        let masked = mask_vat_number(&vat.normalized);
        let request_id = Uuid::new_v4().to_string();
        let attempts = self.config.retry_attempts.max(1);

        let mut record = ValidationRecord::new(
            merchant_id,
            vat.normalized.as_str(),
            Some(vat.country_code.as_str()),
            correlation_id,
            ValidationStatus::Pending,
        );
        record.request_id = Some(request_id);

        let mut outcome = None;
        for attempt in 1..=attempts {
            match self.check_once(&vat.country_code, &vat.number).await {
                Ok(response) => {
                    outcome = Some(Ok(response));
                    break;
                }
                Err(err) if err.is_retryable() => {
                    tracing::warn!(vat = %masked, attempt, attempts, error = %err, "registry unavailable");
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay(attempt)).await;
                    }
                }
                Err(err) => {
                    tracing::error!(vat = %masked, error = %err, "registry call failed");
                    outcome = Some(Err(err));
                    break;
                }
            }
        }

        let now = Utc::now();
        match outcome {
            Some(Ok(response)) => apply_response(&mut record, &response, now),
            Some(Err(err)) => {
                record.status = ValidationStatus::Error;
                record.error_message = Some(err.to_string());
            }
            None => {
                record.status = ValidationStatus::Unavailable;
                record.error_message = Some("registry temporarily unavailable".into());
                record.next_retry_at = Some(now + Duration::minutes(self.config.unavailable_retry_minutes));
            }
        }
        record.validated_at = now;

        self.store.save(&record);
        tracing::info!(merchant = %merchant_id, vat = %masked, status = %record.status, "VAT validation stored");
        self.record_audit(&record);
        ValidationResult::from(&record)
    }

    fn record_audit(&self, record: &ValidationRecord) {
        self.audit.record(AuditEntry {
            merchant_id: record.merchant_id.clone(),
            action: AuditAction::VatValidated,
            entity_id: Some(record.id.to_string()),
            description: format!(
                "VAT number {} validated: {}",
                mask_vat_number(&record.vat_number),
                record.status
            ),
            at: record.validated_at,
        });
    }
}

fn apply_response(record: &mut ValidationRecord, response: &RegistryResponse, now: DateTime<Utc>) {
    record.validated_at = now;
    if response.valid {
        record.status = ValidationStatus::Valid;
        record.company_name = response.name.clone();
        record.company_address = response.address.clone();
    } else {
        record.status = ValidationStatus::Invalid;
        record.error_message = Some("VAT number not registered".into());
    }
}
