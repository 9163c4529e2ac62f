//! VAT number validation against the national registries.
//!
//! Format checks run locally and never reach the registry. VALID answers
//! are cached, outages are retried with a growing delay and then handed to
//! a background sweep, so a checkout never waits on the registry for long.
//!
//! # Example
//!
//! ```
//! use eurovat::validation::{mask_vat_number, parse_vat_number};
//!
//! let vat = parse_vat_number("el 123 456 789").unwrap();
//! assert_eq!(vat.country_code, "GR");
//! assert_eq!(mask_vat_number(&vat.normalized), "EL12***89");
//! ```

mod client;
mod format;
mod record;
mod registry;
mod store;

pub use client::{SweepSummary, ValidationClient};
pub use format::{VatFormatError, VatNumber, mask_vat_number, normalize_vat_number, parse_vat_number};
pub use record::{ValidationRecord, ValidationResult, ValidationStatus};
pub use registry::{RegistryError, RegistryResponse, VatRegistry};
pub use store::ValidationStore;
