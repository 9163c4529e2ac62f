//! # eurovat
//!
//! EU VAT compliance engine for merchants selling cross-border inside the
//! Union under the One-Stop-Shop (OSS) scheme: VAT treatment decisions, VAT
//! error detection, the EUR 10,000 distance-selling threshold, quarterly OSS
//! reports and VIES validation of buyer VAT numbers.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use chrono::NaiveDate;
//! use eurovat::core::*;
//! use eurovat::validation::{RegistryError, RegistryResponse, VatRegistry};
//! use eurovat::ComplianceEngine;
//! use rust_decimal_macros::dec;
//!
//! struct Offline;
//!
//! #[async_trait]
//! impl VatRegistry for Offline {
//!     async fn check(&self, _: &str, _: &str) -> Result<RegistryResponse, RegistryError> {
//!         Err(RegistryError::Unavailable("offline".into()))
//!     }
//! }
//!
//! let engine = ComplianceEngine::builder(Arc::new(Offline)).build();
//! let merchant = MerchantContext::new("m1", "Boutique", "FR").with_oss_registration();
//! let placed = NaiveDate::from_ymd_opt(2025, 5, 12).unwrap().and_hms_opt(10, 0, 0).unwrap();
//!
//! // German customer charged French VAT.
//! engine.ingest(
//!     SaleBuilder::new("1001", "m1", "DE", placed)
//!         .amounts(dec!(100), dec!(20))
//!         .applied_rate(dec!(20))
//!         .build()
//!         .unwrap(),
//! );
//!
//! let sale = engine.detect_errors(&merchant, "1001").unwrap();
//! assert!(sale.has_vat_error);
//! assert_eq!(sale.vat_error_kind, Some(VatErrorKind::Overcharged));
//!
//! let report = engine.generate_report(&merchant, 2025, 2).unwrap();
//! assert_eq!(report.totals.total_orders, 1);
//! assert_eq!(report.totals.total_vat, dec!(19.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Rates, decisions, error detection, threshold, reports, validation client |
//! | `vies` | REST and SOAP transports for the EU VIES service |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod vat;

#[cfg(feature = "core")]
pub mod validation;

#[cfg(feature = "core")]
pub mod report;

#[cfg(feature = "core")]
pub mod dispatch;

#[cfg(feature = "core")]
mod engine;

#[cfg(feature = "vies")]
pub mod vies;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;

#[cfg(feature = "core")]
pub use crate::engine::{ComplianceEngine, EngineBuilder};
