//! VAT rates, treatment decisions, error detection and OSS threshold tracking.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use eurovat::core::{MerchantContext, SaleBuilder};
//! use eurovat::vat::{RateTable, decide};
//! use rust_decimal_macros::dec;
//!
//! let rates = RateTable::eu_standard();
//! let merchant = MerchantContext::new("m1", "Boutique", "FR");
//! let placed = NaiveDate::from_ymd_opt(2025, 5, 12).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! let sale = SaleBuilder::new("1001", "m1", "de", placed)
//!     .amounts(dec!(100), dec!(19))
//!     .applied_rate(dec!(19))
//!     .build()
//!     .unwrap();
//!
//! let decision = decide(&sale, &merchant, None, &rates);
//! assert_eq!(decision.expected_rate, dec!(19));
//! assert!(decision.is_oss_eligible());
//! ```

mod decision;
mod detect;
mod rates;
mod threshold;

pub use decision::{VatDecision, decide, is_oss_eligible};
pub use detect::{CountryBreakdown, ErrorDetector, VatAnalysis, VatErrorLine, classify};
pub use rates::{RateRecord, RateTable};
pub use threshold::{ThresholdMonitor, ThresholdStatus, evaluate_threshold};
