use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use eurovat::ComplianceEngine;
use eurovat::core::*;
use eurovat::validation::{RegistryError, RegistryResponse, VatRegistry};
use rust_decimal_macros::dec;

/// Registry stand-in so the demo runs without network access.
struct Offline;

#[async_trait]
impl VatRegistry for Offline {
    async fn check(&self, _: &str, _: &str) -> Result<RegistryResponse, RegistryError> {
        Err(RegistryError::Unavailable("offline demo".into()))
    }
}

fn main() {
    let engine = ComplianceEngine::builder(Arc::new(Offline)).build();
    let merchant = MerchantContext::new("shop-fr", "Boutique Lumière", "FR").with_oss_registration();

    let orders = [
        ("1001", "DE", 4, 3, dec!(50.00), dec!(19)),
        ("1002", "DE", 6, 30, dec!(25.50), dec!(20)), // French rate charged to a German buyer
        ("1003", "IT", 5, 20, dec!(100.00), dec!(22)),
        ("1004", "ES", 5, 21, dec!(80.00), dec!(0)), // no VAT charged
        ("1005", "FR", 5, 2, dec!(300.00), dec!(20)),
        ("1006", "CH", 5, 2, dec!(120.00), dec!(0)),
    ];
    for (id, country, month, day, subtotal, rate) in orders {
        let placed = NaiveDate::from_ymd_opt(2025, month, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let sale = SaleBuilder::new(id, "shop-fr", country, placed)
            .order_number(format!("#{id}"))
            .amounts(subtotal, vat_amount(subtotal, rate))
            .applied_rate(rate)
            .build()
            .unwrap();
        engine.ingest(sale);
    }

    println!("=== VAT Analysis Q2 2025 ===\n");
    let start = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
    let end = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap().and_hms_opt(23, 59, 59).unwrap();
    let analysis = engine.analyze(&merchant, start, end).unwrap();
    println!(
        "  {} orders, {} with VAT errors ({}%)",
        analysis.total_orders, analysis.errors_count, analysis.error_rate
    );
    for error in &analysis.errors {
        println!(
            "  {}: {} (applied {}%, expected {}%, difference {})",
            error.order_number.as_deref().unwrap_or(&error.sale_id),
            error.kind,
            error.applied_rate,
            error.expected_rate,
            error.vat_difference
        );
    }

    println!("\n=== OSS Threshold ===\n");
    let status = engine.check_threshold(&merchant, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
    println!(
        "  cross-border sales {} EUR = {}% of {} EUR",
        status.eu_sales, status.percentage, status.threshold
    );

    println!("\n=== OSS Report ===\n");
    let report = engine.generate_report(&merchant, 2025, 2).unwrap();
    println!("  {} [{}]", report.quarter_label(), report.status.label());
    for line in engine.report_lines(report.id).unwrap() {
        println!(
            "  {:<12} {:>5}%  taxable {:>10}  VAT {:>8}  ({} orders)",
            line.country_name, line.vat_rate, line.taxable_amount, line.vat_amount, line.orders_count
        );
    }
    println!(
        "  total VAT due: {} EUR across {} countries",
        report.totals.total_vat, report.totals.countries_count
    );

    let now = NaiveDate::from_ymd_opt(2025, 7, 17).unwrap().and_hms_opt(9, 0, 0).unwrap();
    let deadline = eurovat::report::filing_deadline(now);
    println!(
        "\n  Q{} {} due {} ({} days left)",
        deadline.quarter, deadline.year, deadline.deadline, deadline.days_remaining
    );
}
