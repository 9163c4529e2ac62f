#![cfg(feature = "core")]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use eurovat::ComplianceEngine;
use eurovat::core::*;
use eurovat::validation::{
    RegistryError, RegistryResponse, ValidationRecord, ValidationStatus, VatRegistry,
};
use eurovat::vat::*;
use rust_decimal_macros::dec;

struct AlwaysValid;

#[async_trait]
impl VatRegistry for AlwaysValid {
    async fn check(&self, _country: &str, _number: &str) -> Result<RegistryResponse, RegistryError> {
        Ok(RegistryResponse {
            valid: true,
            name: Some("ACME GMBH".into()),
            ..RegistryResponse::default()
        })
    }
}

fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn french_shop() -> MerchantContext {
    MerchantContext::new("shop-fr", "Boutique Lumière", "FR").with_oss_registration()
}

fn b2c(id: &str, country: &str, subtotal: rust_decimal::Decimal, rate: rust_decimal::Decimal) -> Sale {
    SaleBuilder::new(id, "shop-fr", country, at(2025, 5, 12))
        .amounts(subtotal, vat_amount(subtotal, rate))
        .applied_rate(rate)
        .build()
        .unwrap()
}

fn engine_with(alerts: Arc<MemoryAlertSink>) -> ComplianceEngine {
    ComplianceEngine::builder(Arc::new(AlwaysValid))
        .alerts(alerts)
        .build()
}

// ---------------------------------------------------------------------------
// Decision procedure
// ---------------------------------------------------------------------------

#[test]
fn non_eu_destination_is_exempt() {
    let rates = RateTable::eu_standard();
    let sale = b2c("1", "US", dec!(100), dec!(0));
    let decision = decide(&sale, &french_shop(), None, &rates);
    assert!(!decision.is_eu_sale);
    assert!(decision.exempt);
    assert_eq!(decision.exemption_reason, Some(ExemptionReason::NonEuSale));
    assert_eq!(decision.expected_rate, dec!(0));
    assert!(!decision.is_oss_eligible());
}

#[test]
fn domestic_sale_uses_home_rate() {
    let rates = RateTable::eu_standard();
    let sale = b2c("1", "FR", dec!(100), dec!(20));
    let decision = decide(&sale, &french_shop(), None, &rates);
    assert!(decision.is_domestic);
    assert_eq!(decision.expected_rate, dec!(20));
    assert!(!decision.is_oss_eligible());
}

#[test]
fn cross_border_b2c_uses_destination_rate() {
    let rates = RateTable::eu_standard();
    for (country, rate) in [("DE", dec!(19)), ("IT", dec!(22)), ("HU", dec!(27)), ("LU", dec!(17))] {
        let sale = b2c("1", country, dec!(100), rate);
        let decision = decide(&sale, &french_shop(), None, &rates);
        assert_eq!(decision.expected_rate, rate, "{country}");
        assert!(decision.is_oss_eligible());
    }
}

#[test]
fn unregistered_merchant_still_owes_destination_rate() {
    let rates = RateTable::eu_standard();
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR");
    let sale = b2c("1", "DE", dec!(100), dec!(20));
    assert_eq!(decide(&sale, &merchant, None, &rates).expected_rate, dec!(19));
}

#[test]
fn b2b_reverse_charge_needs_proof() {
    let rates = RateTable::eu_standard();
    let sale = SaleBuilder::new("1", "shop-fr", "DE", at(2025, 5, 12))
        .b2b(Some("DE123456789"))
        .amounts(dec!(500), dec!(0))
        .build()
        .unwrap();

    // No verdict: the buyer is treated like a consumer.
    let decision = decide(&sale, &french_shop(), None, &rates);
    assert!(!decision.exempt);
    assert_eq!(decision.expected_rate, dec!(19));

    // VALID without a request id is not proof.
    let mut verdict = ValidationRecord::new(
        "shop-fr",
        "DE123456789",
        Some("DE"),
        None,
        ValidationStatus::Valid,
    );
    assert!(!decide(&sale, &french_shop(), Some(&verdict), &rates).exempt);

    verdict.request_id = Some("4b1d0c2e".into());
    let decision = decide(&sale, &french_shop(), Some(&verdict), &rates);
    assert!(decision.exempt);
    assert_eq!(decision.exemption_reason, Some(ExemptionReason::IntraEuReverseCharge));
    assert_eq!(decision.expected_rate, dec!(0));
}

#[test]
fn unavailable_verdict_is_not_proof() {
    let rates = RateTable::eu_standard();
    let sale = SaleBuilder::new("1", "shop-fr", "DE", at(2025, 5, 12))
        .b2b(Some("DE123456789"))
        .amounts(dec!(500), dec!(95))
        .applied_rate(dec!(19))
        .build()
        .unwrap();
    let mut verdict = ValidationRecord::new(
        "shop-fr",
        "DE123456789",
        Some("DE"),
        None,
        ValidationStatus::Unavailable,
    );
    verdict.request_id = Some("req".into());
    assert!(!decide(&sale, &french_shop(), Some(&verdict), &rates).exempt);
}

#[test]
fn rate_history_is_date_aware() {
    let rates = RateTable::eu_standard();
    // Estonia raised its standard rate from 20% to 22% in 2024.
    assert_eq!(rates.rate_for("EE", at(2023, 6, 1).date()), Some(dec!(20)));
    assert_eq!(rates.rate_for("EE", at(2024, 6, 1).date()), Some(dec!(22)));
}

// ---------------------------------------------------------------------------
// Error detection
// ---------------------------------------------------------------------------

#[test]
fn classify_directions() {
    assert_eq!(classify(dec!(0), dec!(19), dec!(0.01)), Some(VatErrorKind::Missing));
    assert_eq!(classify(dec!(20), dec!(19), dec!(0.01)), Some(VatErrorKind::Overcharged));
    assert_eq!(classify(dec!(7), dec!(19), dec!(0.01)), Some(VatErrorKind::Undercharged));
    assert_eq!(classify(dec!(19.01), dec!(19), dec!(0.01)), None);
}

#[test]
fn classify_with_default_tolerance() {
    let tolerance = DetectionConfig::default().tolerance;
    assert_eq!(classify(dec!(0), dec!(20), tolerance), Some(VatErrorKind::Missing));
    assert_eq!(classify(dec!(25), dec!(20), tolerance), Some(VatErrorKind::Overcharged));
    assert_eq!(classify(dec!(15), dec!(20), tolerance), Some(VatErrorKind::Undercharged));
    assert_eq!(classify(dec!(20.3), dec!(20.0), tolerance), None);
}

#[test]
fn home_rate_charged_abroad_is_flagged() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    engine.ingest(b2c("1", "DE", dec!(100), dec!(20)));

    let sale = engine.detect_errors(&french_shop(), "1").unwrap();
    assert!(sale.has_vat_error);
    assert_eq!(sale.vat_error_kind, Some(VatErrorKind::Overcharged));
    assert_eq!(sale.expected_rate, Some(dec!(19)));
    assert_eq!(sale.calculated_vat, Some(dec!(19.00)));
    assert_eq!(sale.vat_difference, Some(dec!(-1.00)));

    // Persisted, not just returned.
    let stored = engine.sale("shop-fr", "1").unwrap();
    assert_eq!(stored.vat_error_kind, Some(VatErrorKind::Overcharged));
}

#[test]
fn correct_sale_has_no_difference() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    engine.ingest(b2c("1", "IT", dec!(80), dec!(22)));
    let sale = engine.detect_errors(&french_shop(), "1").unwrap();
    assert!(!sale.has_vat_error);
    assert_eq!(sale.vat_difference, None);
    assert_eq!(sale.calculated_vat, Some(dec!(17.60)));
}

#[tokio::test]
async fn validated_buyer_makes_vat_charge_an_error() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    let result = engine.validate("shop-fr", "DE 123 456 789", None).await;
    assert_eq!(result.status, ValidationStatus::Valid);
    assert!(result.is_legal_proof);

    engine.ingest(
        SaleBuilder::new("1", "shop-fr", "DE", at(2025, 5, 12))
            .b2b(Some("de123456789"))
            .amounts(dec!(1000), dec!(190))
            .applied_rate(dec!(19))
            .build()
            .unwrap(),
    );
    let sale = engine.detect_errors(&french_shop(), "1").unwrap();
    assert!(sale.vat_exempt);
    assert_eq!(sale.exemption_reason, Some(ExemptionReason::IntraEuReverseCharge));
    assert_eq!(sale.vat_error_kind, Some(VatErrorKind::Overcharged));
}

#[test]
fn unknown_sale_is_reported() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    assert!(matches!(
        engine.detect_errors(&french_shop(), "nope"),
        Err(ComplianceError::SaleNotFound(_))
    ));
}

#[test]
fn analysis_summarizes_and_alerts_once() {
    let alerts = Arc::new(MemoryAlertSink::new());
    let engine = engine_with(alerts.clone());
    engine.ingest(b2c("1", "DE", dec!(100), dec!(19)));
    engine.ingest(b2c("2", "DE", dec!(100), dec!(20)));
    engine.ingest(b2c("3", "ES", dec!(50), dec!(0)));
    engine.ingest(b2c("4", "ES", dec!(50), dec!(21)));

    let merchant = french_shop();
    let analysis = engine
        .analyze(&merchant, at(2025, 4, 1), at(2025, 6, 30))
        .unwrap();
    assert_eq!(analysis.total_orders, 4);
    assert_eq!(analysis.errors_count, 2);
    assert_eq!(analysis.error_rate, dec!(50.00));
    assert_eq!(analysis.by_country["DE"].orders, 2);
    assert_eq!(analysis.by_country["ES"].orders, 2);
    assert!(analysis.alert_raised);

    let raised = alerts.alerts_for("shop-fr");
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].kind, AlertKind::VatRateError);
    assert_eq!(raised[0].severity, Severity::Warning);

    // A second run while the alert is unresolved does not duplicate it.
    let again = engine
        .analyze(&merchant, at(2025, 4, 1), at(2025, 6, 30))
        .unwrap();
    assert!(!again.alert_raised);
    assert_eq!(alerts.alerts_for("shop-fr").len(), 1);
}

#[test]
fn analysis_outside_period_is_empty() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    engine.ingest(b2c("1", "DE", dec!(100), dec!(20)));
    let analysis = engine
        .analyze(&french_shop(), at(2025, 1, 1), at(2025, 3, 31))
        .unwrap();
    assert_eq!(analysis.total_orders, 0);
    assert_eq!(analysis.error_rate, dec!(0));
    assert!(!analysis.alert_raised);
}

#[test]
fn detection_uses_the_latest_feed_update() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    engine.ingest(b2c("o1", "DE", dec!(100), dec!(19)));
    engine.ingest(
        SaleBuilder::new("o1", "shop-fr", "DE", at(2025, 5, 12))
            .amounts(dec!(50), dec!(9.50))
            .applied_rate(dec!(19))
            .financial_status(FinancialStatus::Refunded)
            .build()
            .unwrap(),
    );

    let sale = engine.detect_errors(&french_shop(), "o1").unwrap();
    assert_eq!(sale.subtotal_amount, dec!(50));
    assert_eq!(sale.calculated_vat, Some(dec!(9.50)));

    let stored = engine.sale("shop-fr", "o1").unwrap();
    assert_eq!(stored.subtotal_amount, dec!(50));
    assert_eq!(stored.financial_status, FinancialStatus::Refunded);
}

#[test]
fn feed_updates_are_not_lost_during_analysis() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    engine.ingest(b2c("o1", "DE", dec!(1), dec!(19)));
    let barrier = std::sync::Barrier::new(2);

    std::thread::scope(|scope| {
        scope.spawn(|| {
            barrier.wait();
            for i in 2..=300u32 {
                engine.ingest(b2c("o1", "DE", rust_decimal::Decimal::from(i), dec!(19)));
            }
        });
        scope.spawn(|| {
            barrier.wait();
            for _ in 0..300 {
                engine
                    .analyze(&french_shop(), at(2025, 5, 1), at(2025, 5, 31))
                    .unwrap();
            }
        });
    });

    let stored = engine.sale("shop-fr", "o1").unwrap();
    assert_eq!(stored.subtotal_amount, dec!(300));
    // Derived fields, when present, belong to the stored amounts.
    if let Some(vat) = stored.calculated_vat {
        assert_eq!(vat, vat_amount(dec!(300), dec!(19)));
    }
}

// ---------------------------------------------------------------------------
// OSS threshold
// ---------------------------------------------------------------------------

#[test]
fn threshold_warning_raised_once() {
    let alerts = Arc::new(MemoryAlertSink::new());
    let engine = engine_with(alerts.clone());
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR");
    engine.ingest(b2c("1", "DE", dec!(5000), dec!(19)));
    engine.ingest(b2c("2", "BE", dec!(2000), dec!(21)));
    // Domestic sales do not count.
    engine.ingest(b2c("3", "FR", dec!(9000), dec!(20)));

    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let status = engine.check_threshold(&merchant, today);
    // 5950 + 2420
    assert_eq!(status.eu_sales, dec!(8370.00));
    assert!(status.warning);
    assert!(!status.exceeded);
    assert!(status.alert_raised);

    let again = engine.check_threshold(&merchant, today);
    assert!(!again.alert_raised);

    let raised = alerts.alerts_for("shop-fr");
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].kind, AlertKind::OssThresholdWarning);
}

#[test]
fn threshold_exceeded_is_critical() {
    let alerts = Arc::new(MemoryAlertSink::new());
    let engine = engine_with(alerts.clone());
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR");
    engine.ingest(b2c("1", "DE", dec!(9000), dec!(19)));

    let status = engine.check_threshold(&merchant, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
    assert!(status.exceeded);
    let raised = alerts.alerts_for("shop-fr");
    assert_eq!(raised[0].kind, AlertKind::OssThresholdExceeded);
    assert_eq!(raised[0].severity, Severity::Critical);
}

#[test]
fn threshold_alert_can_be_rearmed() {
    let alerts = Arc::new(MemoryAlertSink::new());
    let engine = engine_with(alerts.clone());
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR");
    engine.ingest(b2c("1", "DE", dec!(9000), dec!(19)));
    let today = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();

    assert!(engine.check_threshold(&merchant, today).alert_raised);
    engine.clear_threshold_alert("shop-fr");
    assert!(engine.check_threshold(&merchant, today).alert_raised);
    assert_eq!(alerts.alerts_for("shop-fr").len(), 2);
}

#[test]
fn threshold_counts_only_current_year() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR");
    engine.ingest(b2c("1", "DE", dec!(9000), dec!(19)));
    let status = engine.check_threshold(&merchant, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    assert_eq!(status.eu_sales, dec!(0));
    assert!(!status.warning);
}

#[test]
fn current_rates_one_per_member_state() {
    let engine = engine_with(Arc::new(MemoryAlertSink::new()));
    let rates = engine.current_rates(NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    assert_eq!(rates.len(), 27);
    assert!(rates.iter().any(|r| r.country_code == "DE" && r.standard_rate == dec!(19)));
}
