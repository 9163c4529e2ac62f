//! Determine the VAT treatment a sale legally requires.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{ExemptionReason, MerchantContext, Sale, is_eu_member};
use crate::validation::ValidationRecord;

use super::rates::RateTable;

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VatDecision {
    /// Rate that should have been charged, in percent.
    pub expected_rate: Decimal,
    pub is_eu_sale: bool,
    pub is_domestic: bool,
    pub is_b2b: bool,
    pub exempt: bool,
    pub exemption_reason: Option<ExemptionReason>,
    /// Country whose rate applies when it is not the merchant's own.
    pub applicable_country: Option<String>,
}

impl VatDecision {
    /// Cross-border EU sale taxed at destination, i.e. part of the OSS basis.
    pub fn is_oss_eligible(&self) -> bool {
        self.is_eu_sale && !self.is_domestic && !self.exempt
    }
}

/// Decide the expected VAT rate and exemption of a sale.
///
/// `verdict` is the stored validation of the buyer's VAT number; it only
/// matters for B2B sales and only counts when it is legal proof.
///
/// # Logic (first match wins)
///
/// 1. Destination outside the EU → 0%, exempt (non-EU sale)
/// 2. Destination is the merchant's home country → home standard rate
/// 3. B2B with a proof-bearing VALID verdict → 0%, exempt (reverse charge)
/// 4. Otherwise → destination standard rate, whether or not the merchant
///    is OSS-registered (registration only changes how VAT is remitted)
///
/// Rate-table gaps degrade to 0% with a warning.
pub fn decide(
    sale: &Sale,
    merchant: &MerchantContext,
    verdict: Option<&ValidationRecord>,
    rates: &RateTable,
) -> VatDecision {
    let destination = sale.destination_country.as_str();
    let home = merchant.home_country.as_str();
    let date = sale.order_date.date();

    let mut decision = VatDecision {
        expected_rate: Decimal::ZERO,
        is_eu_sale: is_eu_member(destination),
        is_domestic: destination == home,
        is_b2b: sale.is_b2b,
        exempt: false,
        exemption_reason: None,
        applicable_country: None,
    };

    if !decision.is_eu_sale {
        decision.exempt = true;
        decision.exemption_reason = Some(ExemptionReason::NonEuSale);
        return decision;
    }

    if decision.is_domestic {
        decision.expected_rate = rates.standard_rate_or_zero(home, date);
        return decision;
    }

    if sale.is_b2b && verdict.is_some_and(ValidationRecord::is_legal_proof) {
        decision.exempt = true;
        decision.exemption_reason = Some(ExemptionReason::IntraEuReverseCharge);
        return decision;
    }

    decision.expected_rate = rates.standard_rate_or_zero(destination, date);
    decision.applicable_country = Some(destination.to_string());
    decision
}

/// Whether a sale belongs in the merchant's OSS report basis.
///
/// Uses the sale's stored exemption flag, so run the detector first.
pub fn is_oss_eligible(sale: &Sale, merchant: &MerchantContext) -> bool {
    let destination = sale.destination_country.as_str();
    destination != merchant.home_country
        && is_eu_member(destination)
        && !(sale.is_b2b && sale.vat_exempt)
}
