use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::format::{normalize_vat_number, parse_vat_number};
use super::record::{ValidationRecord, ValidationStatus};

/// In-memory validation history keyed by record id.
#[derive(Debug, Default)]
pub struct ValidationStore {
    records: DashMap<Uuid, ValidationRecord>,
}

impl ValidationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn save(&self, record: &ValidationRecord) {
        self.records.insert(record.id, record.clone());
    }

    pub fn get(&self, id: Uuid) -> Option<ValidationRecord> {
        self.records.get(&id).map(|r| r.clone())
    }

    /// Most recent record for a normalized VAT number.
    pub fn latest_for(&self, vat_number: &str) -> Option<ValidationRecord> {
        self.records
            .iter()
            .filter(|r| r.vat_number == vat_number)
            .max_by_key(|r| r.validated_at)
            .map(|r| r.clone())
    }

    /// Same as [`latest_for`](Self::latest_for) for raw user input.
    ///
    /// Well-formed input is looked up under its canonical key, so `GR` and
    /// `EL` spellings of a Greek number find the same records.
    pub fn latest_for_input(&self, input: &str) -> Option<ValidationRecord> {
        match parse_vat_number(input) {
            Ok(vat) => self.latest_for(&vat.normalized),
            Err(_) => self.latest_for(&normalize_vat_number(input)),
        }
    }

    /// Latest VALID record for the number that is younger than `ttl`.
    pub fn cached_valid(&self, vat_number: &str, now: DateTime<Utc>, ttl: Duration) -> Option<ValidationRecord> {
        self.latest_for(vat_number)
            .filter(|r| r.status == ValidationStatus::Valid && r.validated_at > now - ttl)
    }

    /// UNAVAILABLE records due for another attempt, oldest due first.
    pub fn retryable(&self, now: DateTime<Utc>, max_retries: u32) -> Vec<ValidationRecord> {
        let mut due: Vec<ValidationRecord> = self
            .records
            .iter()
            .filter(|r| {
                r.status == ValidationStatus::Unavailable
                    && r.retry_count < max_retries
                    && r.next_retry_at.is_some_and(|at| at <= now)
            })
            .map(|r| r.clone())
            .collect();
        due.sort_by_key(|r| r.next_retry_at);
        due
    }

    /// Every record of a merchant, newest first.
    pub fn history(&self, merchant_id: &str) -> Vec<ValidationRecord> {
        let mut records: Vec<ValidationRecord> = self
            .records
            .iter()
            .filter(|r| r.merchant_id == merchant_id)
            .map(|r| r.clone())
            .collect();
        records.sort_by(|a, b| b.validated_at.cmp(&a.validated_at));
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(status: ValidationStatus, at: DateTime<Utc>) -> ValidationRecord {
        let mut rec = ValidationRecord::new("m1", "DE123456789", Some("DE"), None, status);
        rec.validated_at = at;
        rec
    }

    #[test]
    fn latest_wins() {
        let store = ValidationStore::new();
        let now = Utc::now();
        store.save(&record(ValidationStatus::Invalid, now - Duration::hours(2)));
        store.save(&record(ValidationStatus::Valid, now));
        assert_eq!(
            store.latest_for_input("de 123 456 789").unwrap().status,
            ValidationStatus::Valid
        );
    }

    #[test]
    fn greek_lookup_ignores_prefix_spelling() {
        let store = ValidationStore::new();
        let rec = ValidationRecord::new("m1", "EL123456789", Some("GR"), None, ValidationStatus::Valid);
        store.save(&rec);
        assert_eq!(store.latest_for_input("GR123456789").unwrap().id, rec.id);
        assert_eq!(store.latest_for_input("el123456789").unwrap().id, rec.id);
    }

    #[test]
    fn cache_respects_ttl_and_status() {
        let store = ValidationStore::new();
        let now = Utc::now();
        store.save(&record(ValidationStatus::Valid, now - Duration::hours(25)));
        assert!(store.cached_valid("DE123456789", now, Duration::hours(24)).is_none());

        store.save(&record(ValidationStatus::Valid, now - Duration::hours(1)));
        assert!(store.cached_valid("DE123456789", now, Duration::hours(24)).is_some());

        store.save(&record(ValidationStatus::Invalid, now));
        assert!(store.cached_valid("DE123456789", now, Duration::hours(24)).is_none());
    }

    #[test]
    fn retryable_filters_due_and_budget() {
        let store = ValidationStore::new();
        let now = Utc::now();

        let mut due = record(ValidationStatus::Unavailable, now);
        due.next_retry_at = Some(now - Duration::minutes(1));
        store.save(&due);

        let mut later = record(ValidationStatus::Unavailable, now);
        later.next_retry_at = Some(now + Duration::minutes(10));
        store.save(&later);

        let mut spent = record(ValidationStatus::Unavailable, now);
        spent.next_retry_at = Some(now - Duration::minutes(1));
        spent.retry_count = 3;
        store.save(&spent);

        let found = store.retryable(now, 3);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, due.id);
    }
}
