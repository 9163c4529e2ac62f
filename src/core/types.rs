use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single e-commerce sale as received from the order feed, plus the
/// VAT fields the engine derives for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sale {
    /// External order identifier (unique per merchant).
    pub id: String,
    /// Owning merchant.
    pub merchant_id: String,
    /// Human-readable order number (e.g. "#1042").
    pub order_number: Option<String>,
    /// When the order was placed.
    pub order_date: NaiveDateTime,
    /// Destination country (ISO 3166-1 alpha-2).
    pub destination_country: String,
    /// Buyer's VAT identification number, as entered.
    pub buyer_vat_id: Option<String>,
    /// Whether the buyer declared itself a business.
    pub is_b2b: bool,
    /// Net amount.
    pub subtotal_amount: Decimal,
    /// VAT actually charged.
    pub tax_amount: Decimal,
    /// Gross amount.
    pub total_amount: Decimal,
    /// VAT rate actually charged, in percent.
    pub applied_rate: Decimal,
    /// ISO 4217 currency code.
    pub currency: String,
    pub financial_status: FinancialStatus,

    /// Rate the engine expects, in percent.
    pub expected_rate: Option<Decimal>,
    /// `subtotal * expected_rate / 100`, rounded half-up.
    pub calculated_vat: Option<Decimal>,
    /// `calculated_vat - tax_amount`, set only when an error is detected.
    pub vat_difference: Option<Decimal>,
    pub has_vat_error: bool,
    pub vat_error_kind: Option<VatErrorKind>,
    pub vat_exempt: bool,
    pub exemption_reason: Option<ExemptionReason>,
    /// Set once the sale feeds a report; derived fields are frozen from then on.
    pub included_in_report: bool,
    pub report_id: Option<Uuid>,
}

impl Sale {
    /// Report that froze this sale, if any.
    pub fn frozen_by(&self) -> Option<Uuid> {
        if self.included_in_report {
            self.report_id
        } else {
            None
        }
    }
}

/// Payment state of a sale as reported by the shop platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancialStatus {
    Pending,
    Paid,
    PartiallyRefunded,
    Refunded,
    Voided,
}

/// Classification of a detected VAT discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VatErrorKind {
    /// No VAT charged where some was due.
    Missing,
    /// Charged rate above the expected one.
    Overcharged,
    /// Charged rate below the expected one.
    Undercharged,
    /// Right magnitude, wrong country. Not produced by the current
    /// classifier: any difference above tolerance is either over or under.
    WrongJurisdiction,
}

impl VatErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Missing => "VAT_MISSING",
            Self::Overcharged => "VAT_OVERCHARGED",
            Self::Undercharged => "VAT_UNDERCHARGED",
            Self::WrongJurisdiction => "VAT_WRONG_COUNTRY",
        }
    }
}

impl fmt::Display for VatErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Why a sale carries no VAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExemptionReason {
    /// Destination outside the EU.
    NonEuSale,
    /// Validated business buyer self-assesses the VAT.
    IntraEuReverseCharge,
}

impl fmt::Display for ExemptionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NonEuSale => "non-EU sale",
            Self::IntraEuReverseCharge => "intra-EU B2B reverse charge",
        })
    }
}

/// Read model of the merchant, owned by the onboarding side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantContext {
    pub id: String,
    /// Display name, used in alerts and by report renderers.
    pub name: String,
    /// Country of establishment.
    pub home_country: String,
    pub oss_registered: bool,
    /// Member state of OSS identification, when registered.
    pub oss_registration_country: Option<String>,
    /// The merchant's own VAT number.
    pub vat_number: Option<String>,
    pub currency: String,
    /// Whether the merchant wants alerts forwarded to them.
    pub alerts_enabled: bool,
    /// Whether the OSS threshold alert was already raised.
    pub threshold_alert_sent: bool,
}

impl MerchantContext {
    /// Merchant with alerts enabled, not OSS-registered, trading in EUR.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        home_country: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            home_country: home_country.into(),
            oss_registered: false,
            oss_registration_country: None,
            vat_number: None,
            currency: "EUR".into(),
            alerts_enabled: true,
            threshold_alert_sent: false,
        }
    }

    /// Mark as OSS-registered in the home country.
    pub fn with_oss_registration(mut self) -> Self {
        self.oss_registered = true;
        self.oss_registration_country = Some(self.home_country.clone());
        self
    }

    pub fn with_vat_number(mut self, vat_number: impl Into<String>) -> Self {
        self.vat_number = Some(vat_number.into());
        self
    }
}
