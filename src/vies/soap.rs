//! VIES SOAP (checkVat) transport.

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::validation::{RegistryError, RegistryResponse, VatRegistry};

use super::rest::map_transport_error;

pub const VIES_SOAP_URL: &str = "https://ec.europa.eu/taxation_customs/vies/services/checkVatService";
pub const CHECK_VAT_NS: &str = "urn:ec.europa.eu:taxud:vies:services:checkVat:types";
const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

fn xml_io(e: std::io::Error) -> RegistryError {
    RegistryError::Parse(format!("XML write error: {e}"))
}

/// Build the `checkVat` request envelope.
pub fn check_vat_envelope(country_code: &str, number: &str) -> Result<String, RegistryError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    let mut envelope = BytesStart::new("soapenv:Envelope");
    envelope.push_attribute(("xmlns:soapenv", SOAP_ENV_NS));
    envelope.push_attribute(("xmlns:urn", CHECK_VAT_NS));
    writer.write_event(Event::Start(envelope)).map_err(xml_io)?;
    writer
        .write_event(Event::Empty(BytesStart::new("soapenv:Header")))
        .map_err(xml_io)?;
    writer
        .write_event(Event::Start(BytesStart::new("soapenv:Body")))
        .map_err(xml_io)?;
    writer
        .write_event(Event::Start(BytesStart::new("urn:checkVat")))
        .map_err(xml_io)?;
    for (name, text) in [("urn:countryCode", country_code), ("urn:vatNumber", number)] {
        writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
    }
    for name in ["urn:checkVat", "soapenv:Body", "soapenv:Envelope"] {
        writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
    }

    let buf = writer.into_inner().into_inner();
    String::from_utf8(buf).map_err(|e| RegistryError::Parse(format!("XML UTF-8 error: {e}")))
}

/// Interpret a `checkVatResponse` or SOAP fault.
pub fn parse_soap_response(xml: &str) -> Result<RegistryResponse, RegistryError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut response = RegistryResponse::default();
    let mut seen_valid = false;
    let mut fault: Option<String> = None;
    let mut current = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                current = std::str::from_utf8(e.local_name().as_ref())
                    .unwrap_or("")
                    .to_string();
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                match current.as_str() {
                    "valid" => {
                        response.valid = text == "true";
                        seen_valid = true;
                    }
                    "name" => response.name = Some(text).filter(|n| n != "---"),
                    "address" => response.address = Some(text).filter(|a| a != "---"),
                    "requestDate" => response.request_date = Some(text),
                    "faultstring" => fault = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => current.clear(),
            Ok(Event::Eof) => break,
            Err(e) => return Err(RegistryError::Parse(e.to_string())),
            _ => {}
        }
    }

    if let Some(fault) = fault {
        return Err(RegistryError::from_fault(&fault));
    }
    if !seen_valid {
        return Err(RegistryError::Parse("no 'valid' element in response".into()));
    }
    Ok(response)
}

/// [`VatRegistry`] backed by the VIES SOAP service.
#[derive(Debug, Clone)]
pub struct ViesSoapClient {
    http: reqwest::Client,
    url: String,
}

impl ViesSoapClient {
    pub fn new(timeout: Duration) -> Result<Self, RegistryError> {
        Self::with_url(VIES_SOAP_URL, timeout)
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
impl VatRegistry for ViesSoapClient {
    async fn check(&self, country_code: &str, number: &str) -> Result<RegistryResponse, RegistryError> {
        let envelope = check_vat_envelope(country_code, number)?;
        let resp = self
            .http
            .post(&self.url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .body(envelope)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(map_transport_error)?;
        // Faults arrive as HTTP 500 with a SOAP body.
        match parse_soap_response(&body) {
            Err(RegistryError::Parse(_)) if status.is_server_error() => {
                Err(RegistryError::Unavailable(format!("HTTP {status}")))
            }
            other => other,
        }
    }
}
