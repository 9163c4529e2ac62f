//! Core domain types, country data, money helpers, errors, and collaborator sinks.
//!
//! Everything in here is shared by the VAT decision, validation and report
//! modules. Monetary values are [`rust_decimal::Decimal`] throughout.

mod builder;
mod config;
mod countries;
mod error;
mod money;
mod sales;
pub mod sink;
mod types;

pub use builder::*;
pub use config::*;
pub use countries::*;
pub use error::*;
pub use money::*;
pub use sales::SaleStore;
pub use sink::{
    Alert, AlertKind, AlertOutbox, AlertSink, AuditAction, AuditEntry, AuditSink, MemoryAlertSink,
    MemoryAuditSink, Severity, TracingAuditSink,
};
pub use types::*;
