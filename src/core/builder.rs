use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::error::ComplianceError;
use super::types::*;

/// Builder for sales coming off the order feed.
///
/// ```
/// use eurovat::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let placed = NaiveDate::from_ymd_opt(2025, 5, 12).unwrap().and_hms_opt(10, 30, 0).unwrap();
/// let sale = SaleBuilder::new("order-1", "shop-1", "FR", placed)
///     .amounts(dec!(100), dec!(20))
///     .applied_rate(dec!(20))
///     .build()
///     .unwrap();
/// assert_eq!(sale.total_amount, dec!(120));
/// ```
pub struct SaleBuilder {
    id: String,
    merchant_id: String,
    order_number: Option<String>,
    order_date: NaiveDateTime,
    destination_country: String,
    buyer_vat_id: Option<String>,
    is_b2b: bool,
    subtotal_amount: Decimal,
    tax_amount: Decimal,
    total_amount: Option<Decimal>,
    applied_rate: Decimal,
    currency: String,
    financial_status: FinancialStatus,
}

impl SaleBuilder {
    pub fn new(
        id: impl Into<String>,
        merchant_id: impl Into<String>,
        destination_country: impl Into<String>,
        order_date: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            merchant_id: merchant_id.into(),
            order_number: None,
            order_date,
            destination_country: destination_country.into(),
            buyer_vat_id: None,
            is_b2b: false,
            subtotal_amount: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_amount: None,
            applied_rate: Decimal::ZERO,
            currency: "EUR".to_string(),
            financial_status: FinancialStatus::Paid,
        }
    }

    pub fn order_number(mut self, number: impl Into<String>) -> Self {
        self.order_number = Some(number.into());
        self
    }

    /// Mark as a business sale, optionally carrying the buyer's VAT number.
    pub fn b2b(mut self, buyer_vat_id: Option<&str>) -> Self {
        self.is_b2b = true;
        self.buyer_vat_id = buyer_vat_id.map(str::to_string);
        self
    }

    /// Net amount and VAT charged. The total defaults to their sum.
    pub fn amounts(mut self, subtotal: Decimal, tax: Decimal) -> Self {
        self.subtotal_amount = subtotal;
        self.tax_amount = tax;
        self
    }

    /// Override the gross total (e.g. when shipping is included).
    pub fn total(mut self, total: Decimal) -> Self {
        self.total_amount = Some(total);
        self
    }

    pub fn applied_rate(mut self, rate: Decimal) -> Self {
        self.applied_rate = rate;
        self
    }

    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency = code.into();
        self
    }

    pub fn financial_status(mut self, status: FinancialStatus) -> Self {
        self.financial_status = status;
        self
    }

    /// Build the sale with empty derived fields.
    pub fn build(self) -> Result<Sale, ComplianceError> {
        if self.id.trim().is_empty() {
            return Err(ComplianceError::InvalidSale("sale id must not be empty".into()));
        }
        let country = self.destination_country.trim().to_uppercase();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ComplianceError::InvalidSale(format!(
                "destination country '{}' is not an ISO 3166-1 alpha-2 code",
                self.destination_country
            )));
        }
        if self.subtotal_amount.is_sign_negative() || self.tax_amount.is_sign_negative() {
            return Err(ComplianceError::InvalidSale(
                "amounts must not be negative".into(),
            ));
        }
        if self.applied_rate.is_sign_negative() {
            return Err(ComplianceError::InvalidSale(
                "applied rate must not be negative".into(),
            ));
        }

        let total_amount = self
            .total_amount
            .unwrap_or(self.subtotal_amount + self.tax_amount);

        Ok(Sale {
            id: self.id,
            merchant_id: self.merchant_id,
            order_number: self.order_number,
            order_date: self.order_date,
            destination_country: country,
            buyer_vat_id: self.buyer_vat_id.filter(|v| !v.trim().is_empty()),
            is_b2b: self.is_b2b,
            subtotal_amount: self.subtotal_amount,
            tax_amount: self.tax_amount,
            total_amount,
            applied_rate: self.applied_rate,
            currency: self.currency,
            financial_status: self.financial_status,
            expected_rate: None,
            calculated_vat: None,
            vat_difference: None,
            has_vat_error: false,
            vat_error_kind: None,
            vat_exempt: false,
            exemption_reason: None,
            included_in_report: false,
            report_id: None,
        })
    }
}
