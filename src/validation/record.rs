use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of a VAT number validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    /// Registered in the national registry.
    Valid,
    /// Registry answered: not registered.
    Invalid,
    /// Registry unreachable; the sweep retries later.
    Unavailable,
    Pending,
    /// Non-retryable fault or sweep budget exhausted.
    Error,
    /// Rejected locally, no registry call made.
    FormatError,
}

impl ValidationStatus {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Invalid => "INVALID",
            Self::Unavailable => "UNAVAILABLE",
            Self::Pending => "PENDING",
            Self::Error => "ERROR",
            Self::FormatError => "FORMAT_ERROR",
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A stored validation attempt for one VAT number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRecord {
    pub id: Uuid,
    pub merchant_id: String,
    /// Normalized number including its prefix.
    pub vat_number: String,
    /// Member state; `None` when the prefix was not recognized.
    pub country_code: Option<String>,
    /// Number without its prefix.
    pub number: Option<String>,
    /// Order reference the validation was requested for.
    pub correlation_id: Option<String>,
    pub status: ValidationStatus,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    /// Identifier of the registry consultation.
    pub request_id: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub validated_at: DateTime<Utc>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl ValidationRecord {
    pub fn new(
        merchant_id: impl Into<String>,
        vat_number: impl Into<String>,
        country_code: Option<&str>,
        correlation_id: Option<&str>,
        status: ValidationStatus,
    ) -> Self {
        let vat_number = vat_number.into();
        let number = country_code
            .and_then(|_| vat_number.get(2..))
            .map(str::to_string);
        Self {
            id: Uuid::new_v4(),
            merchant_id: merchant_id.into(),
            vat_number,
            country_code: country_code.map(str::to_string),
            number,
            correlation_id: correlation_id.map(str::to_string),
            status,
            company_name: None,
            company_address: None,
            request_id: None,
            error_message: None,
            retry_count: 0,
            validated_at: Utc::now(),
            next_retry_at: None,
        }
    }

    /// VALID with a registry request identifier: usable as evidence for
    /// zero-rating an intra-EU B2B sale.
    pub fn is_legal_proof(&self) -> bool {
        self.status == ValidationStatus::Valid
            && self.request_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Message suitable for showing to the merchant.
    pub fn user_message(&self) -> String {
        match self.status {
            ValidationStatus::Valid => format!(
                "VAT number is valid (verified on {})",
                self.validated_at.date_naive()
            ),
            ValidationStatus::Invalid => "VAT number is not registered".into(),
            ValidationStatus::Unavailable => "Validation service temporarily unavailable".into(),
            ValidationStatus::Pending => "Validation in progress".into(),
            ValidationStatus::Error => "Technical error during validation".into(),
            ValidationStatus::FormatError => "Invalid VAT number format".into(),
        }
    }
}

/// What a caller of the validation client gets back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: Uuid,
    pub vat_number: String,
    pub country_code: Option<String>,
    pub status: ValidationStatus,
    pub company_name: Option<String>,
    pub company_address: Option<String>,
    pub validated_at: DateTime<Utc>,
    pub user_message: String,
    pub is_legal_proof: bool,
    pub request_id: Option<String>,
}

impl From<&ValidationRecord> for ValidationResult {
    fn from(record: &ValidationRecord) -> Self {
        Self {
            id: record.id,
            vat_number: record.vat_number.clone(),
            country_code: record.country_code.clone(),
            status: record.status,
            company_name: record.company_name.clone(),
            company_address: record.company_address.clone(),
            validated_at: record.validated_at,
            user_message: record.user_message(),
            is_legal_proof: record.is_legal_proof(),
            request_id: record.request_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_proof_requires_valid_and_request_id() {
        let mut rec = ValidationRecord::new("m1", "DE123456789", Some("DE"), None, ValidationStatus::Valid);
        assert!(!rec.is_legal_proof());
        rec.request_id = Some(String::new());
        assert!(!rec.is_legal_proof());
        rec.request_id = Some("abc".into());
        assert!(rec.is_legal_proof());
        rec.status = ValidationStatus::Unavailable;
        assert!(!rec.is_legal_proof());
    }

    #[test]
    fn number_split_only_with_country() {
        let rec = ValidationRecord::new("m1", "DE123456789", Some("DE"), None, ValidationStatus::Valid);
        assert_eq!(rec.number.as_deref(), Some("123456789"));
        let rec = ValidationRecord::new("m1", "XX1", None, None, ValidationStatus::FormatError);
        assert!(rec.number.is_none());
    }

    #[test]
    fn messages_per_status() {
        let mut rec = ValidationRecord::new("m1", "DE123456789", Some("DE"), None, ValidationStatus::Valid);
        assert!(rec.user_message().starts_with("VAT number is valid"));
        rec.status = ValidationStatus::FormatError;
        assert_eq!(rec.user_message(), "Invalid VAT number format");
    }

    #[test]
    fn status_serializes_screaming() {
        let json = serde_json::to_string(&ValidationStatus::FormatError).unwrap();
        assert_eq!(json, "\"FORMAT_ERROR\"");
    }
}
