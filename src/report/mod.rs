//! Quarterly OSS report aggregation.
//!
//! A report sums every OSS-eligible sale of a merchant in a calendar quarter
//! per destination country and VAT rate. Sales claimed by a report are
//! frozen, so regenerating or generating another quarter never counts them
//! twice.

mod aggregate;
mod generator;
mod model;
mod period;
mod store;

pub use aggregate::aggregate;
pub use generator::{HISTORY_LIMIT, ReportGenerator};
pub use model::{Report, ReportLine, ReportStatus, ReportTotals};
pub use period::{
    Deadline, filing_deadline, next_deadline, quarter_bounds, quarter_dates, quarter_deadline,
    quarter_label, quarter_of,
};
pub use store::ReportStore;
