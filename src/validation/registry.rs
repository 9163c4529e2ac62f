use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Answer of the national VAT registry for one number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryResponse {
    pub valid: bool,
    pub name: Option<String>,
    pub address: Option<String>,
    /// Date of the consultation as reported by the registry.
    pub request_date: Option<String>,
}

/// Failure talking to the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The registry or the member state's backend is down
    /// (MS_UNAVAILABLE, SERVICE_UNAVAILABLE, ...).
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// No answer within the configured timeout.
    #[error("registry call timed out")]
    Timeout,

    /// The registry rejected the request (invalid input, rate limit, ...).
    #[error("registry fault: {0}")]
    Fault(String),

    /// Connection could not be established.
    #[error("network error: {0}")]
    Network(String),

    /// The response could not be understood.
    #[error("unexpected registry response: {0}")]
    Parse(String),
}

impl RegistryError {
    /// Whether trying again later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::Timeout => true,
            Self::Network(msg) => msg.contains("Connection refused") || msg.contains("timed out"),
            Self::Fault(_) | Self::Parse(_) => false,
        }
    }

    /// Classify a registry fault string.
    pub fn from_fault(fault: &str) -> Self {
        if fault.contains("MS_UNAVAILABLE")
            || fault.contains("SERVICE_UNAVAILABLE")
            || fault.contains("MS_MAX_CONCURRENT_REQ")
            || fault.contains("GLOBAL_MAX_CONCURRENT_REQ")
            || fault.contains("TIMEOUT")
        {
            Self::Unavailable(fault.to_string())
        } else {
            Self::Fault(fault.to_string())
        }
    }
}

/// Remote lookup of a VAT number in the national registries.
///
/// `country_code` is the registry's own code (EL for Greece); `number` has
/// no country prefix.
#[async_trait]
pub trait VatRegistry: Send + Sync {
    async fn check(&self, country_code: &str, number: &str) -> Result<RegistryResponse, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_classification() {
        assert!(RegistryError::from_fault("MS_UNAVAILABLE").is_retryable());
        assert!(RegistryError::from_fault("soap:Server SERVICE_UNAVAILABLE").is_retryable());
        assert!(!RegistryError::from_fault("INVALID_INPUT").is_retryable());
    }

    #[test]
    fn timeout_retryable_parse_not() {
        assert!(RegistryError::Timeout.is_retryable());
        assert!(!RegistryError::Parse("eof".into()).is_retryable());
        assert!(RegistryError::Network("Connection refused".into()).is_retryable());
        assert!(!RegistryError::Network("certificate".into()).is_retryable());
    }
}
