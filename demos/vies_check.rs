use std::sync::Arc;
use std::time::Duration;

use eurovat::ComplianceEngine;
use eurovat::validation::parse_vat_number;
use eurovat::vies::ViesRestClient;

#[tokio::main]
async fn main() {
    // Format validation (no network required)
    println!("=== VAT Number Format ===\n");

    let inputs = [
        "DE123456789",
        "el 123 456 789",
        "FR12345678901",
        "NL123456789B01",
        "DE12345678",  // too short
        "XX999999999", // unknown country
    ];
    for input in &inputs {
        match parse_vat_number(input) {
            Ok(vat) => println!("  {input} => valid (country={}, number={})", vat.country_code, vat.number),
            Err(e) => println!("  {input} => INVALID: {e}"),
        }
    }

    // Live VIES lookup
    let vat = std::env::args().nth(1).unwrap_or_else(|| "DE811569869".into());
    println!("\n=== VIES lookup: {vat} ===\n");

    let registry = match ViesRestClient::new(Duration::from_secs(30)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            eprintln!("  cannot build HTTP client: {e}");
            return;
        }
    };
    let engine = ComplianceEngine::builder(registry).build();
    let result = engine.validate("demo", &vat, None).await;

    println!("  status:      {}", result.status);
    println!("  message:     {}", result.user_message);
    println!("  legal proof: {}", result.is_legal_proof);
    if let Some(name) = &result.company_name {
        println!("  company:     {name}");
    }
    if let Some(address) = &result.company_address {
        println!("  address:     {}", address.replace('\n', ", "));
    }
}
