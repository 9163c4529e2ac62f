//! Effective-dated standard VAT rates of the EU member states.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::{ComplianceError, country_name, is_eu_member};

/// Rate set of one member state over a validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub country_code: String,
    pub standard_rate: Decimal,
    /// Reduced rates, highest first.
    pub reduced_rates: Vec<Decimal>,
    /// First day the record applies (inclusive).
    pub effective_from: NaiveDate,
    /// Last day the record applies (inclusive); `None` = open-ended.
    pub effective_to: Option<NaiveDate>,
}

impl RateRecord {
    pub fn new(country_code: impl Into<String>, standard_rate: Decimal, effective_from: NaiveDate) -> Self {
        Self {
            country_code: country_code.into(),
            standard_rate,
            reduced_rates: Vec::new(),
            effective_from,
            effective_to: None,
        }
    }

    pub fn until(mut self, effective_to: NaiveDate) -> Self {
        self.effective_to = Some(effective_to);
        self
    }

    pub fn reduced(mut self, rates: &[Decimal]) -> Self {
        self.reduced_rates = rates.to_vec();
        self
    }

    pub fn country_name(&self) -> &str {
        country_name(&self.country_code).unwrap_or(&self.country_code)
    }

    /// Whether `date` falls inside the validity window.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.effective_from <= date && self.effective_to.is_none_or(|to| date <= to)
    }

    fn overlaps(&self, other: &RateRecord) -> bool {
        let starts_before_other_ends = other.effective_to.is_none_or(|to| self.effective_from <= to);
        let ends_after_other_starts = self.effective_to.is_none_or(|to| other.effective_from <= to);
        starts_before_other_ends && ends_after_other_starts
    }
}

/// Lookup table of rate records, at most one valid per (country, date).
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    records: BTreeMap<String, Vec<RateRecord>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard rates of all 27 member states since the OSS start on
    /// 2021-07-01, including the later dated changes.
    pub fn eu_standard() -> Self {
        let mut table = Self::new();
        for record in eu_standard_records() {
            // The seed data is disjoint per country by construction.
            let _ = table.insert(record);
        }
        table
    }

    /// Add a record, rejecting windows that overlap an existing one.
    pub fn insert(&mut self, record: RateRecord) -> Result<(), ComplianceError> {
        if !is_eu_member(&record.country_code) {
            return Err(ComplianceError::InvalidRate(format!(
                "'{}' is not an EU member state",
                record.country_code
            )));
        }
        if record.standard_rate.is_sign_negative() {
            return Err(ComplianceError::InvalidRate(format!(
                "negative standard rate for {}",
                record.country_code
            )));
        }
        if let Some(to) = record.effective_to {
            if to < record.effective_from {
                return Err(ComplianceError::InvalidRate(format!(
                    "window for {} ends before it starts",
                    record.country_code
                )));
            }
        }

        let records = self.records.entry(record.country_code.clone()).or_default();
        if let Some(existing) = records.iter().find(|r| r.overlaps(&record)) {
            return Err(ComplianceError::RateOverlap {
                country: record.country_code,
                existing_from: existing.effective_from,
            });
        }
        records.push(record);
        records.sort_by_key(|r| r.effective_from);
        Ok(())
    }

    /// The record valid for `country` on `date`.
    pub fn record_for(&self, country: &str, date: NaiveDate) -> Option<&RateRecord> {
        self.records.get(country)?.iter().find(|r| r.covers(date))
    }

    /// Standard rate for `country` on `date`, `None` when the table has a gap.
    pub fn rate_for(&self, country: &str, date: NaiveDate) -> Option<Decimal> {
        self.record_for(country, date).map(|r| r.standard_rate)
    }

    /// Standard rate, degrading a gap to zero with a warning.
    pub fn standard_rate_or_zero(&self, country: &str, date: NaiveDate) -> Decimal {
        match self.rate_for(country, date) {
            Some(rate) => rate,
            None => {
                tracing::warn!(country, %date, "no VAT rate on record, treating as 0%");
                Decimal::ZERO
            }
        }
    }

    /// Every record valid on `date`, sorted by country code.
    pub fn current_rates(&self, date: NaiveDate) -> Vec<&RateRecord> {
        self.records
            .values()
            .filter_map(|records| records.iter().find(|r| r.covers(date)))
            .collect()
    }
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap_or_default()
}

fn eu_standard_records() -> Vec<RateRecord> {
    let oss_start = d(2021, 7, 1);
    let stable: &[(&str, Decimal, &[Decimal])] = &[
        ("AT", dec!(20), &[dec!(13), dec!(10)]),
        ("BE", dec!(21), &[dec!(12), dec!(6)]),
        ("BG", dec!(20), &[dec!(9)]),
        ("CY", dec!(19), &[dec!(9), dec!(5)]),
        ("CZ", dec!(21), &[dec!(12)]),
        ("DE", dec!(19), &[dec!(7)]),
        ("DK", dec!(25), &[]),
        ("ES", dec!(21), &[dec!(10), dec!(4)]),
        ("FR", dec!(20), &[dec!(10), dec!(5.5), dec!(2.1)]),
        ("GR", dec!(24), &[dec!(13), dec!(6)]),
        ("HR", dec!(25), &[dec!(13), dec!(5)]),
        ("HU", dec!(27), &[dec!(18), dec!(5)]),
        ("IE", dec!(23), &[dec!(13.5), dec!(9)]),
        ("IT", dec!(22), &[dec!(10), dec!(5), dec!(4)]),
        ("LT", dec!(21), &[dec!(9), dec!(5)]),
        ("LV", dec!(21), &[dec!(12), dec!(5)]),
        ("MT", dec!(18), &[dec!(7), dec!(5)]),
        ("NL", dec!(21), &[dec!(9)]),
        ("PL", dec!(23), &[dec!(8), dec!(5)]),
        ("PT", dec!(23), &[dec!(13), dec!(6)]),
        ("SE", dec!(25), &[dec!(12), dec!(6)]),
        ("SI", dec!(22), &[dec!(9.5), dec!(5)]),
    ];

    let mut records: Vec<RateRecord> = stable
        .iter()
        .map(|(cc, rate, reduced)| RateRecord::new(*cc, *rate, oss_start).reduced(reduced))
        .collect();

    records.extend([
        RateRecord::new("EE", dec!(20), oss_start).until(d(2023, 12, 31)).reduced(&[dec!(9)]),
        RateRecord::new("EE", dec!(22), d(2024, 1, 1)).until(d(2025, 6, 30)).reduced(&[dec!(9)]),
        RateRecord::new("EE", dec!(24), d(2025, 7, 1)).reduced(&[dec!(13), dec!(9)]),
        RateRecord::new("FI", dec!(24), oss_start).until(d(2024, 8, 31)).reduced(&[dec!(14), dec!(10)]),
        RateRecord::new("FI", dec!(25.5), d(2024, 9, 1)).reduced(&[dec!(14), dec!(10)]),
        RateRecord::new("LU", dec!(17), oss_start).until(d(2022, 12, 31)).reduced(&[dec!(8), dec!(3)]),
        RateRecord::new("LU", dec!(16), d(2023, 1, 1)).until(d(2023, 12, 31)).reduced(&[dec!(7), dec!(3)]),
        RateRecord::new("LU", dec!(17), d(2024, 1, 1)).reduced(&[dec!(8), dec!(3)]),
        RateRecord::new("RO", dec!(19), oss_start).until(d(2025, 7, 31)).reduced(&[dec!(9), dec!(5)]),
        RateRecord::new("RO", dec!(21), d(2025, 8, 1)).reduced(&[dec!(11)]),
        RateRecord::new("SK", dec!(20), oss_start).until(d(2024, 12, 31)).reduced(&[dec!(10)]),
        RateRecord::new("SK", dec!(23), d(2025, 1, 1)).reduced(&[dec!(19), dec!(5)]),
    ]);
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_covers_all_member_states() {
        let table = RateTable::eu_standard();
        assert_eq!(table.current_rates(d(2025, 5, 1)).len(), 27);
        assert_eq!(table.current_rates(d(2021, 7, 1)).len(), 27);
    }

    #[test]
    fn current_rates_sorted() {
        let table = RateTable::eu_standard();
        let codes: Vec<_> = table
            .current_rates(d(2025, 5, 1))
            .iter()
            .map(|r| r.country_code.clone())
            .collect();
        let mut sorted = codes.clone();
        sorted.sort();
        assert_eq!(codes, sorted);
    }

    #[test]
    fn dated_changes() {
        let table = RateTable::eu_standard();
        assert_eq!(table.rate_for("EE", d(2025, 6, 30)), Some(dec!(22)));
        assert_eq!(table.rate_for("EE", d(2025, 7, 1)), Some(dec!(24)));
        assert_eq!(table.rate_for("FI", d(2024, 8, 31)), Some(dec!(24)));
        assert_eq!(table.rate_for("FI", d(2024, 9, 1)), Some(dec!(25.5)));
        assert_eq!(table.rate_for("SK", d(2024, 12, 31)), Some(dec!(20)));
        assert_eq!(table.rate_for("SK", d(2025, 1, 1)), Some(dec!(23)));
        assert_eq!(table.rate_for("LU", d(2023, 6, 1)), Some(dec!(16)));
    }

    #[test]
    fn gap_is_none_and_zero() {
        let table = RateTable::eu_standard();
        assert_eq!(table.rate_for("DE", d(2020, 1, 1)), None);
        assert_eq!(table.standard_rate_or_zero("DE", d(2020, 1, 1)), Decimal::ZERO);
        assert_eq!(table.rate_for("US", d(2025, 1, 1)), None);
    }

    #[test]
    fn overlapping_window_rejected() {
        let mut table = RateTable::new();
        table.insert(RateRecord::new("DE", dec!(19), d(2021, 1, 1))).unwrap();
        let err = table
            .insert(RateRecord::new("DE", dec!(16), d(2020, 7, 1)).until(d(2021, 1, 1)))
            .unwrap_err();
        assert!(matches!(err, ComplianceError::RateOverlap { .. }));
    }

    #[test]
    fn adjacent_windows_accepted() {
        let mut table = RateTable::new();
        table
            .insert(RateRecord::new("DE", dec!(16), d(2020, 7, 1)).until(d(2020, 12, 31)))
            .unwrap();
        table.insert(RateRecord::new("DE", dec!(19), d(2021, 1, 1))).unwrap();
        assert_eq!(table.rate_for("DE", d(2020, 12, 31)), Some(dec!(16)));
        assert_eq!(table.rate_for("DE", d(2021, 1, 1)), Some(dec!(19)));
    }

    #[test]
    fn invalid_records_rejected() {
        let mut table = RateTable::new();
        assert!(table.insert(RateRecord::new("CH", dec!(8.1), d(2024, 1, 1))).is_err());
        assert!(table.insert(RateRecord::new("DE", dec!(-1), d(2024, 1, 1))).is_err());
        assert!(
            table
                .insert(RateRecord::new("DE", dec!(19), d(2024, 1, 1)).until(d(2023, 1, 1)))
                .is_err()
        );
    }

    #[test]
    fn record_names() {
        let table = RateTable::eu_standard();
        let rec = table.record_for("FR", d(2025, 1, 1)).unwrap();
        assert_eq!(rec.country_name(), "France");
        assert_eq!(rec.reduced_rates.first(), Some(&dec!(10)));
    }
}
