use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::report::ReportStatus;

/// Errors returned by the compliance engine.
///
/// None of these are process-level failures: upstream outages and rate gaps
/// degrade to typed statuses on the affected record instead of surfacing here.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComplianceError {
    /// A sale failed structural checks while being built.
    #[error("invalid sale: {0}")]
    InvalidSale(String),

    /// A rate record is malformed (empty window, unknown country, negative rate).
    #[error("invalid rate record: {0}")]
    InvalidRate(String),

    /// A new rate window overlaps one already in the table.
    #[error("rate window for {country} overlaps the record effective from {existing_from}")]
    RateOverlap {
        country: String,
        existing_from: NaiveDate,
    },

    /// Quarter outside 1..=4.
    #[error("quarter must be between 1 and 4, got {0}")]
    InvalidQuarter(u32),

    /// The sale already feeds a report; its derived fields are frozen.
    #[error("sale {sale_id} is frozen by report {report_id}")]
    SaleFrozen { sale_id: String, report_id: Uuid },

    /// No sale with this id is stored.
    #[error("sale {0} not found")]
    SaleNotFound(String),

    /// No report with this id is stored.
    #[error("report {0} not found")]
    ReportNotFound(Uuid),

    /// Report status would move backwards or skip generation.
    #[error("cannot move report from {from} to {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },
}
