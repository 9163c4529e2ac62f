use std::sync::{Arc, Mutex};

use chrono::{NaiveDateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::core::{
    AuditAction, AuditEntry, AuditSink, ComplianceError, MerchantContext, Sale, SaleStore,
};
use crate::vat::{ErrorDetector, is_oss_eligible};

use super::aggregate::aggregate;
use super::model::{Report, ReportLine, ReportStatus, ReportTotals};
use super::period::{quarter_bounds, quarter_label};
use super::store::ReportStore;

/// How many reports [`ReportGenerator::history`] returns.
pub const HISTORY_LIMIT: usize = 20;

type PeriodKey = (String, i32, u32);

/// Builds quarterly OSS reports and tracks their lifecycle.
///
/// Generation for one (merchant, year, quarter) is serialized: selecting
/// sales, writing lines and flagging the sales happen under one lock, so a
/// sale is counted in at most one report.
pub struct ReportGenerator {
    sales: Arc<SaleStore>,
    reports: Arc<ReportStore>,
    detector: Arc<ErrorDetector>,
    audit: Arc<dyn AuditSink>,
    locks: DashMap<PeriodKey, Arc<Mutex<()>>>,
}

impl ReportGenerator {
    pub fn new(
        sales: Arc<SaleStore>,
        reports: Arc<ReportStore>,
        detector: Arc<ErrorDetector>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            sales,
            reports,
            detector,
            audit,
            locks: DashMap::new(),
        }
    }

    /// Generate the OSS report of a merchant for a quarter.
    ///
    /// A report past DRAFT is returned unchanged. A DRAFT is rebuilt from
    /// scratch after releasing the sales it had claimed.
    pub fn generate(&self, merchant: &MerchantContext, year: i32, quarter: u32) -> Result<Report, ComplianceError> {
        let (period_start, period_end) = quarter_bounds(year, quarter)?;
        let key = (merchant.id.clone(), year, quarter);

        let lock = self.locks.entry(key.clone()).or_default().clone();
        let result = {
            let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            self.generate_locked(merchant, year, quarter, period_start, period_end)
        };
        drop(lock);
        self.locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    fn generate_locked(
        &self,
        merchant: &MerchantContext,
        year: i32,
        quarter: u32,
        period_start: NaiveDateTime,
        period_end: NaiveDateTime,
    ) -> Result<Report, ComplianceError> {
        let label = quarter_label(year, quarter);

        let existing = self.reports.find(&merchant.id, year, quarter);
        if let Some(report) = &existing {
            if report.status != ReportStatus::Draft {
                tracing::info!(merchant = %merchant.id, period = %label, "report already generated");
                return Ok(report.clone());
            }
            let released = self.sales.release_report(report.id);
            tracing::debug!(report = %report.id, released, "regenerating draft report");
        }
        let report_id = existing.as_ref().map_or_else(Uuid::new_v4, |r| r.id);

        // Each sale is evaluated and claimed under its own entry lock, so the
        // line data is exactly what gets frozen.
        let mut selected: Vec<Sale> = Vec::new();
        for candidate in self.sales.in_range(&merchant.id, period_start, period_end) {
            if candidate.frozen_by().is_some() {
                continue;
            }
            let claimed = self.sales.update(&merchant.id, &candidate.id, |sale| {
                if sale.frozen_by().is_some() {
                    return Ok(None);
                }
                self.detector.evaluate(sale, merchant)?;
                if !is_oss_eligible(sale, merchant) {
                    return Ok(None);
                }
                sale.included_in_report = true;
                sale.report_id = Some(report_id);
                Ok(Some(sale.clone()))
            })?;
            selected.extend(claimed);
        }

        let mut report = existing.unwrap_or_else(|| Report {
            id: report_id,
            merchant_id: merchant.id.clone(),
            year,
            quarter,
            status: ReportStatus::Draft,
            period_start,
            period_end,
            totals: ReportTotals::default(),
            generated_at: None,
            downloaded_at: None,
            submitted_at: None,
            notes: None,
        });

        let (lines, totals) = aggregate(report.id, &selected);
        report.period_start = period_start;
        report.period_end = period_end;
        report.totals = totals;
        report.status = ReportStatus::Generated;
        report.generated_at = Some(Utc::now());
        self.reports.save_with_lines(&report, lines);

        self.audit.record(AuditEntry {
            merchant_id: merchant.id.clone(),
            action: AuditAction::ReportGenerated,
            entity_id: Some(report.id.to_string()),
            description: format!(
                "OSS report {label} generated: {} orders, {:.2} EUR VAT",
                report.totals.total_orders, report.totals.total_vat
            ),
            at: Utc::now(),
        });
        tracing::info!(
            merchant = %merchant.id,
            report = %report.id,
            period = %label,
            orders = report.totals.total_orders,
            vat = %report.totals.total_vat,
            "OSS report generated"
        );
        Ok(report)
    }

    /// Periods with a generation in progress or queued.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }

    pub fn report(&self, report_id: Uuid) -> Result<Report, ComplianceError> {
        self.reports
            .get(report_id)
            .ok_or(ComplianceError::ReportNotFound(report_id))
    }

    /// Lines of a report, ordered by country code then rate.
    pub fn report_lines(&self, report_id: Uuid) -> Result<Vec<ReportLine>, ComplianceError> {
        self.report(report_id)?;
        let mut lines = self.reports.lines(report_id);
        lines.sort_by(|a, b| {
            a.country_code
                .cmp(&b.country_code)
                .then_with(|| a.vat_rate.cmp(&b.vat_rate))
        });
        Ok(lines)
    }

    /// Record that the merchant retrieved the report.
    ///
    /// Only the first retrieval moves the status and stamps the time. The
    /// status check and the write happen under the report's entry lock, so
    /// a racing submission is never rolled back.
    pub fn mark_downloaded(&self, report_id: Uuid) -> Result<Report, ComplianceError> {
        let (report, changed) = self.reports.update(report_id, |report| {
            match report.status {
                ReportStatus::Downloaded => return Ok(false),
                ReportStatus::Generated => {}
                from => {
                    return Err(ComplianceError::InvalidTransition {
                        from,
                        to: ReportStatus::Downloaded,
                    });
                }
            }
            report.status = ReportStatus::Downloaded;
            report.downloaded_at = Some(Utc::now());
            Ok(true)
        })?;
        if changed {
            self.record(&report, AuditAction::ReportDownloaded, "OSS report downloaded");
        }
        Ok(report)
    }

    /// Record that the merchant filed the report with their tax office.
    pub fn mark_submitted(&self, report_id: Uuid, notes: Option<String>) -> Result<Report, ComplianceError> {
        let (report, ()) = self.reports.update(report_id, |report| {
            if !matches!(report.status, ReportStatus::Generated | ReportStatus::Downloaded) {
                return Err(ComplianceError::InvalidTransition {
                    from: report.status,
                    to: ReportStatus::Submitted,
                });
            }
            report.status = ReportStatus::Submitted;
            report.submitted_at = Some(Utc::now());
            report.notes = notes;
            Ok(())
        })?;
        self.record(&report, AuditAction::ReportSubmitted, "OSS report marked as submitted");
        Ok(report)
    }

    /// Most recent reports of a merchant, newest period first.
    pub fn history(&self, merchant_id: &str) -> Vec<Report> {
        let mut reports = self.reports.for_merchant(merchant_id);
        reports.truncate(HISTORY_LIMIT);
        reports
    }

    fn record(&self, report: &Report, action: AuditAction, description: &str) {
        tracing::info!(report = %report.id, status = %report.status, "{description}");
        self.audit.record(AuditEntry {
            merchant_id: report.merchant_id.clone(),
            action,
            entity_id: Some(report.id.to_string()),
            description: format!("{description} ({})", report.quarter_label()),
            at: Utc::now(),
        });
    }
}
