use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::period::quarter_label;

/// Lifecycle of a quarterly OSS report. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportStatus {
    Draft,
    Generated,
    Downloaded,
    Submitted,
}

impl ReportStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Generated => "GENERATED",
            Self::Downloaded => "DOWNLOADED",
            Self::Submitted => "SUBMITTED",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Generated => "Generated",
            Self::Downloaded => "Downloaded",
            Self::Submitted => "Submitted",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Aggregates over the sales of a report. Always equal to the line sums.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTotals {
    /// Taxable base (net amounts).
    pub total_sales: Decimal,
    pub total_vat: Decimal,
    pub total_orders: usize,
    pub b2b_orders: usize,
    pub b2c_orders: usize,
    pub exempt_orders: usize,
    pub countries_count: usize,
}

/// Quarterly OSS declaration of one merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub merchant_id: String,
    pub year: i32,
    pub quarter: u32,
    pub status: ReportStatus,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub totals: ReportTotals,
    pub generated_at: Option<DateTime<Utc>>,
    pub downloaded_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Report {
    /// E.g. "Q2 2025".
    pub fn quarter_label(&self) -> String {
        quarter_label(self.year, self.quarter)
    }
}

/// One (country, rate) row of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportLine {
    pub report_id: Uuid,
    pub country_code: String,
    pub country_name: String,
    pub vat_rate: Decimal,
    pub taxable_amount: Decimal,
    pub vat_amount: Decimal,
    /// `taxable_amount + vat_amount`.
    pub total_amount: Decimal,
    pub orders_count: usize,
    pub b2c_amount: Decimal,
    /// Exempt B2B sales never enter a report, so this stays zero.
    pub b2b_exempt_amount: Decimal,
}
