//! VIES REST API transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::validation::{RegistryError, RegistryResponse, VatRegistry};

pub const VIES_REST_URL: &str = "https://ec.europa.eu/taxation_customs/vies/rest-api/check-vat-number";

/// VIES API response structure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViesApiResponse {
    valid: Option<bool>,
    request_date: Option<String>,
    name: Option<String>,
    address: Option<String>,
    error_wrappers: Option<Vec<ViesErrorWrapper>>,
}

#[derive(Debug, Deserialize)]
struct ViesErrorWrapper {
    error: Option<String>,
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViesRequest<'a> {
    country_code: &'a str,
    vat_number: &'a str,
}

/// [`VatRegistry`] backed by the public VIES REST API.
#[derive(Debug, Clone)]
pub struct ViesRestClient {
    http: reqwest::Client,
    url: String,
}

impl ViesRestClient {
    /// Client for the official endpoint. `timeout` bounds each HTTP call.
    pub fn new(timeout: Duration) -> Result<Self, RegistryError> {
        Self::with_url(VIES_REST_URL, timeout)
    }

    pub fn with_url(url: impl Into<String>, timeout: Duration) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Network(e.to_string()))?;
        Ok(Self { http, url: url.into() })
    }
}

#[async_trait]
impl VatRegistry for ViesRestClient {
    async fn check(&self, country_code: &str, number: &str) -> Result<RegistryResponse, RegistryError> {
        let req = ViesRequest {
            country_code,
            vat_number: number,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(map_transport_error)?;
        parse_rest_response(status.as_u16(), &body)
    }
}

pub(crate) fn map_transport_error(e: reqwest::Error) -> RegistryError {
    if e.is_timeout() {
        RegistryError::Timeout
    } else if e.is_connect() {
        RegistryError::Unavailable(e.to_string())
    } else {
        RegistryError::Network(e.to_string())
    }
}

/// Interpret a VIES REST reply.
pub fn parse_rest_response(status: u16, body: &str) -> Result<RegistryResponse, RegistryError> {
    let api_resp: Option<ViesApiResponse> = serde_json::from_str(body).ok();

    // API-level errors come with an error code even on non-2xx replies.
    if let Some(err) = api_resp
        .as_ref()
        .and_then(|r| r.error_wrappers.as_ref())
        .and_then(|errors| errors.first())
    {
        let code = err
            .error
            .clone()
            .or_else(|| err.message.clone())
            .unwrap_or_else(|| "unknown error".into());
        return Err(RegistryError::from_fault(&code));
    }

    if !(200..300).contains(&status) {
        return Err(match status {
            429 | 500..=599 => RegistryError::Unavailable(format!("HTTP {status}")),
            _ => RegistryError::Fault(format!("HTTP {status}: {body}")),
        });
    }

    let api_resp = api_resp.ok_or_else(|| RegistryError::Parse(body.chars().take(200).collect()))?;
    let valid = api_resp
        .valid
        .ok_or_else(|| RegistryError::Parse("missing 'valid' field".into()))?;

    Ok(RegistryResponse {
        valid,
        request_date: api_resp.request_date,
        name: api_resp.name.filter(|n| n != "---" && !n.is_empty()),
        address: api_resp.address.filter(|a| a != "---" && !a.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vies_url_is_https() {
        assert!(VIES_REST_URL.starts_with("https://"));
    }

    #[test]
    fn request_serialization() {
        let req = ViesRequest {
            country_code: "EL",
            vat_number: "123456789",
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"countryCode\":\"EL\""));
        assert!(json.contains("\"vatNumber\":\"123456789\""));
    }

    #[test]
    fn valid_response() {
        let json = r#"{"valid":true,"requestDate":"2025-01-15","name":"ACME SARL","address":"1 RUE X\n75001 PARIS"}"#;
        let r = parse_rest_response(200, json).unwrap();
        assert!(r.valid);
        assert_eq!(r.name.as_deref(), Some("ACME SARL"));
    }

    #[test]
    fn dashes_filtered() {
        let json = r#"{"valid":true,"name":"---","address":"---"}"#;
        let r = parse_rest_response(200, json).unwrap();
        assert!(r.name.is_none());
        assert!(r.address.is_none());
    }

    #[test]
    fn member_state_unavailable_is_retryable() {
        let json = r#"{"actionSucceed":false,"errorWrappers":[{"error":"MS_UNAVAILABLE"}]}"#;
        let err = parse_rest_response(200, json).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_input_is_not_retryable() {
        let json = r#"{"actionSucceed":false,"errorWrappers":[{"error":"INVALID_INPUT"}]}"#;
        let err = parse_rest_response(400, json).unwrap_err();
        assert!(matches!(err, RegistryError::Fault(_)));
    }

    #[test]
    fn server_errors_are_unavailable() {
        assert!(parse_rest_response(503, "Service Unavailable").unwrap_err().is_retryable());
        assert!(matches!(parse_rest_response(200, "<html>"), Err(RegistryError::Parse(_))));
    }
}
