//! VIES transports for [`VatRegistry`](crate::validation::VatRegistry).
//!
//! Both talk to the European Commission's VIES service, which relays the
//! query to the member state's registry. Either one can be handed to the
//! engine builder.
//!
//! ```ignore
//! use eurovat::vies::ViesRestClient;
//!
//! let registry = Arc::new(ViesRestClient::new(Duration::from_secs(30))?);
//! let engine = ComplianceEngine::builder(registry).build();
//! ```

mod rest;
mod soap;

pub use rest::{VIES_REST_URL, ViesRestClient, parse_rest_response};
pub use soap::{CHECK_VAT_NS, VIES_SOAP_URL, ViesSoapClient, check_vat_envelope, parse_soap_response};
