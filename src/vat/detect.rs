//! Compare charged VAT against the expected treatment and classify gaps.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{
    Alert, AlertKind, AlertSink, ComplianceError, DetectionConfig, MerchantContext, Sale,
    SaleStore, Severity, VatErrorKind, percentage_of, vat_amount,
};
use crate::validation::ValidationStore;

use super::decision::{VatDecision, decide};
use super::rates::RateTable;

/// Classify the gap between applied and expected rate.
///
/// Returns `None` within `tolerance` percentage points. The checks are
/// ordered: missing, over, under. [`VatErrorKind::WrongJurisdiction`] is the
/// remaining case and cannot be reached once the gap exceeds the tolerance,
/// since the applied rate is then either above or below the expected one.
pub fn classify(applied: Decimal, expected: Decimal, tolerance: Decimal) -> Option<VatErrorKind> {
    if (applied - expected).abs() <= tolerance {
        return None;
    }
    if applied.is_zero() && expected > Decimal::ZERO {
        return Some(VatErrorKind::Missing);
    }
    if applied > expected {
        return Some(VatErrorKind::Overcharged);
    }
    if applied < expected {
        return Some(VatErrorKind::Undercharged);
    }
    Some(VatErrorKind::WrongJurisdiction)
}

/// One erroneous sale in a [`VatAnalysis`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatErrorLine {
    pub sale_id: String,
    pub order_number: Option<String>,
    pub kind: VatErrorKind,
    pub applied_rate: Decimal,
    pub expected_rate: Decimal,
    pub vat_difference: Decimal,
}

/// Sales and VAT of one destination country.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountryBreakdown {
    pub sales: Decimal,
    pub vat: Decimal,
    pub orders: usize,
}

/// Result of [`ErrorDetector::analyze`] over a date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatAnalysis {
    pub merchant_id: String,
    pub period_start: NaiveDateTime,
    pub period_end: NaiveDateTime,
    pub total_orders: usize,
    pub errors_count: usize,
    /// Share of erroneous orders, in percent.
    pub error_rate: Decimal,
    pub total_sales: Decimal,
    pub total_vat: Decimal,
    pub vat_difference: Decimal,
    /// Keyed by destination country, ascending.
    pub by_country: BTreeMap<String, CountryBreakdown>,
    pub errors: Vec<VatErrorLine>,
    /// Whether this run raised the VAT_RATE_ERROR alert.
    pub alert_raised: bool,
}

/// Runs the decision procedure on sales and persists the derived fields.
pub struct ErrorDetector {
    rates: Arc<RateTable>,
    sales: Arc<SaleStore>,
    validations: Arc<ValidationStore>,
    alerts: Arc<dyn AlertSink>,
    config: DetectionConfig,
}

impl ErrorDetector {
    pub fn new(
        rates: Arc<RateTable>,
        sales: Arc<SaleStore>,
        validations: Arc<ValidationStore>,
        alerts: Arc<dyn AlertSink>,
        config: DetectionConfig,
    ) -> Self {
        Self {
            rates,
            sales,
            validations,
            alerts,
            config,
        }
    }

    /// Decide the treatment of a sale using the stored verdict for its buyer.
    pub fn decision_for(&self, sale: &Sale, merchant: &MerchantContext) -> VatDecision {
        let verdict = if sale.is_b2b {
            sale.buyer_vat_id
                .as_deref()
                .and_then(|vat| self.validations.latest_for_input(vat))
        } else {
            None
        };
        decide(sale, merchant, verdict.as_ref(), &self.rates)
    }

    /// Fill a sale's derived VAT fields in place without persisting.
    ///
    /// Frozen sales are refused: their fields are inputs to a report.
    pub fn evaluate(&self, sale: &mut Sale, merchant: &MerchantContext) -> Result<VatDecision, ComplianceError> {
        if let Some(report_id) = sale.frozen_by() {
            return Err(ComplianceError::SaleFrozen {
                sale_id: sale.id.clone(),
                report_id,
            });
        }

        let decision = self.decision_for(sale, merchant);
        let expected = decision.expected_rate;
        let calculated = vat_amount(sale.subtotal_amount, expected);

        sale.expected_rate = Some(expected);
        sale.calculated_vat = Some(calculated);
        sale.vat_exempt = decision.exempt;
        sale.exemption_reason = decision.exemption_reason;

        match classify(sale.applied_rate, expected, self.config.tolerance) {
            Some(kind) => {
                sale.has_vat_error = true;
                sale.vat_error_kind = Some(kind);
                sale.vat_difference = Some(calculated - sale.tax_amount);
                tracing::warn!(
                    sale = %sale.id,
                    applied = %sale.applied_rate,
                    expected = %expected,
                    kind = %kind,
                    "VAT error detected"
                );
            }
            None => {
                sale.has_vat_error = false;
                sale.vat_error_kind = None;
                sale.vat_difference = None;
            }
        }

        Ok(decision)
    }

    /// Evaluate a stored sale in place and return its updated copy.
    ///
    /// The decision is computed from the live entry under its lock, so a
    /// feed update that lands meanwhile is neither lost nor mixed with
    /// stale derived fields.
    pub fn detect_errors(&self, merchant: &MerchantContext, sale_id: &str) -> Result<Sale, ComplianceError> {
        self.sales.update(&merchant.id, sale_id, |sale| {
            self.evaluate(sale, merchant)?;
            Ok(sale.clone())
        })
    }

    /// Like [`detect_errors`](Self::detect_errors), but a frozen sale is
    /// returned as stored instead of refused.
    pub fn refresh(&self, merchant: &MerchantContext, sale_id: &str) -> Result<Sale, ComplianceError> {
        self.sales.update(&merchant.id, sale_id, |sale| {
            if sale.frozen_by().is_none() {
                self.evaluate(sale, merchant)?;
            }
            Ok(sale.clone())
        })
    }

    /// Run detection over every stored sale of `merchant` in `[start, end]`.
    ///
    /// Sales frozen by a report, including ones frozen while the run is in
    /// progress, are reported from their stored fields.
    /// Raises one VAT_RATE_ERROR alert when errors exist and none is active.
    pub fn analyze(
        &self,
        merchant: &MerchantContext,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<VatAnalysis, ComplianceError> {
        let mut analysis = VatAnalysis {
            merchant_id: merchant.id.clone(),
            period_start: start,
            period_end: end,
            total_orders: 0,
            errors_count: 0,
            error_rate: Decimal::ZERO,
            total_sales: Decimal::ZERO,
            total_vat: Decimal::ZERO,
            vat_difference: Decimal::ZERO,
            by_country: BTreeMap::new(),
            errors: Vec::new(),
            alert_raised: false,
        };

        for candidate in self.sales.in_range(&merchant.id, start, end) {
            let sale = self.refresh(merchant, &candidate.id)?;

            analysis.total_orders += 1;
            analysis.total_sales += sale.total_amount;
            analysis.total_vat += sale.tax_amount;
            analysis.vat_difference += sale.vat_difference.unwrap_or_default();

            let country = analysis
                .by_country
                .entry(sale.destination_country.clone())
                .or_default();
            country.sales += sale.total_amount;
            country.vat += sale.tax_amount;
            country.orders += 1;

            if sale.has_vat_error {
                analysis.errors_count += 1;
                analysis.errors.push(VatErrorLine {
                    sale_id: sale.id.clone(),
                    order_number: sale.order_number.clone(),
                    kind: sale.vat_error_kind.unwrap_or(VatErrorKind::WrongJurisdiction),
                    applied_rate: sale.applied_rate,
                    expected_rate: sale.expected_rate.unwrap_or_default(),
                    vat_difference: sale.vat_difference.unwrap_or_default(),
                });
            }
        }

        analysis.error_rate = percentage_of(
            Decimal::from(analysis.errors_count),
            Decimal::from(analysis.total_orders),
        );

        if analysis.errors_count > 0 {
            analysis.alert_raised = self.raise_error_alert(merchant, analysis.errors_count);
        }

        Ok(analysis)
    }

    fn raise_error_alert(&self, merchant: &MerchantContext, errors: usize) -> bool {
        let alert = Alert::new(
            &merchant.id,
            AlertKind::VatRateError,
            if errors > self.config.error_severity_count {
                Severity::Error
            } else {
                Severity::Warning
            },
            "VAT errors detected",
            format!("{errors} order(s) were charged a VAT rate that does not match the expected rate."),
        )
        .action("Review the tax settings of your shop for the affected countries");

        if self.alerts.has_active(&alert.dedup_key) {
            return false;
        }
        tracing::info!(merchant = %merchant.id, errors, "raising VAT error alert");
        self.alerts.raise(alert);
        true
    }
}
