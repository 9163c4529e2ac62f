//! OSS registration threshold monitoring.
//!
//! Since 2021-07-01 a merchant whose cross-border B2C sales within the EU
//! exceed EUR 10,000 in a calendar year must charge destination VAT and
//! should register for the One-Stop-Shop scheme.
//!
//! - Basis: total amount of every sale with destination != home country
//! - Window: Jan 1 to Dec 31 of the checked year
//! - Warning from 80% of the threshold, exceeded at 100%

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::core::{
    Alert, AlertKind, AlertSink, AuditAction, AuditEntry, AuditSink, MerchantContext, SaleStore,
    Severity, ThresholdConfig, round_money,
};

/// Result of an OSS threshold check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdStatus {
    /// Cross-border sales of the calendar year so far.
    pub eu_sales: Decimal,
    pub threshold: Decimal,
    /// `eu_sales` as a share of the threshold, 2 decimals.
    pub percentage: Decimal,
    pub exceeded: bool,
    /// At or above the warning level (also true when exceeded).
    pub warning: bool,
    pub oss_registered: bool,
    /// Whether this check raised the threshold alert.
    pub alert_raised: bool,
}

/// Evaluate cross-border sales against the threshold.
pub fn evaluate_threshold(eu_sales: Decimal, config: &ThresholdConfig, oss_registered: bool) -> ThresholdStatus {
    let percentage = if config.threshold.is_zero() {
        Decimal::ZERO
    } else {
        round_money(eu_sales * dec!(100) / config.threshold)
    };
    ThresholdStatus {
        eu_sales,
        threshold: config.threshold,
        percentage,
        exceeded: eu_sales >= config.threshold,
        warning: percentage >= config.warning_percent,
        oss_registered,
        alert_raised: false,
    }
}

/// Re-evaluates merchants and raises the threshold alert once.
///
/// The per-merchant "alert sent" flag starts from
/// [`MerchantContext::threshold_alert_sent`] and stays set until
/// [`clear_alert_flag`](Self::clear_alert_flag) is called.
pub struct ThresholdMonitor {
    sales: Arc<SaleStore>,
    alerts: Arc<dyn AlertSink>,
    audit: Arc<dyn AuditSink>,
    config: ThresholdConfig,
    alert_sent: DashMap<String, bool>,
}

impl ThresholdMonitor {
    pub fn new(
        sales: Arc<SaleStore>,
        alerts: Arc<dyn AlertSink>,
        audit: Arc<dyn AuditSink>,
        config: ThresholdConfig,
    ) -> Self {
        Self {
            sales,
            alerts,
            audit,
            config,
            alert_sent: DashMap::new(),
        }
    }

    /// Sum cross-border sales for the year of `today` and alert if due.
    pub fn check(&self, merchant: &MerchantContext, today: NaiveDate) -> ThresholdStatus {
        let eu_sales = self.eu_sales(merchant, today.year());
        let mut status = evaluate_threshold(eu_sales, &self.config, merchant.oss_registered);

        if status.warning {
            // Entry guard keeps concurrent checks for one merchant from
            // both raising the alert.
            let mut sent = self
                .alert_sent
                .entry(merchant.id.clone())
                .or_insert(merchant.threshold_alert_sent);
            if !*sent {
                self.raise(merchant, &status);
                *sent = true;
                status.alert_raised = true;
            }
        }

        tracing::debug!(
            merchant = %merchant.id,
            eu_sales = %status.eu_sales,
            percentage = %status.percentage,
            "OSS threshold checked"
        );
        status
    }

    /// Whether the threshold alert has been sent for a merchant.
    pub fn alert_sent(&self, merchant: &MerchantContext) -> bool {
        self.alert_sent
            .get(&merchant.id)
            .map(|sent| *sent)
            .unwrap_or(merchant.threshold_alert_sent)
    }

    /// Re-arm the alert, e.g. after a year rollover or re-registration.
    pub fn clear_alert_flag(&self, merchant_id: &str) {
        self.alert_sent.insert(merchant_id.to_string(), false);
    }

    fn eu_sales(&self, merchant: &MerchantContext, year: i32) -> Decimal {
        let (Some(first), Some(last)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Decimal::ZERO;
        };
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
        let start = NaiveDateTime::new(first, NaiveTime::MIN);
        let end = NaiveDateTime::new(last, end_of_day);

        self.sales
            .in_range(&merchant.id, start, end)
            .iter()
            .filter(|s| s.destination_country != merchant.home_country)
            .map(|s| s.total_amount)
            .sum()
    }

    fn raise(&self, merchant: &MerchantContext, status: &ThresholdStatus) {
        let alert = if status.exceeded {
            Alert::new(
                &merchant.id,
                AlertKind::OssThresholdExceeded,
                Severity::Critical,
                "OSS threshold exceeded",
                format!(
                    "Your cross-border EU sales ({:.2} EUR) have exceeded the {} EUR threshold. \
                     Destination-country VAT now applies.",
                    status.eu_sales, status.threshold
                ),
            )
            .action("Register for the OSS scheme with your tax administration")
        } else {
            Alert::new(
                &merchant.id,
                AlertKind::OssThresholdWarning,
                Severity::Warning,
                "Approaching the OSS threshold",
                format!(
                    "Your cross-border EU sales have reached {}% of the {} EUR OSS threshold.",
                    status.percentage, status.threshold
                ),
            )
            .action("Prepare your OSS registration")
        };

        tracing::warn!(
            merchant = %merchant.id,
            kind = %alert.kind,
            percentage = %status.percentage,
            "OSS threshold alert"
        );
        let alert_id = alert.id;
        self.alerts.raise(alert);
        self.audit.record(AuditEntry {
            merchant_id: merchant.id.clone(),
            action: AuditAction::AlertCreated,
            entity_id: Some(alert_id.to_string()),
            description: format!("OSS threshold alert created: {}%", status.percentage),
            at: Utc::now(),
        });
    }
}
