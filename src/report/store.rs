use dashmap::DashMap;
use uuid::Uuid;

use crate::core::ComplianceError;

use super::model::{Report, ReportLine};

/// In-memory report and line storage.
#[derive(Debug, Default)]
pub struct ReportStore {
    reports: DashMap<Uuid, Report>,
    lines: DashMap<Uuid, Vec<ReportLine>>,
    by_period: DashMap<(String, i32, u32), Uuid>,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<Report> {
        self.reports.get(&id).map(|r| r.clone())
    }

    pub fn find(&self, merchant_id: &str, year: i32, quarter: u32) -> Option<Report> {
        let id = *self
            .by_period
            .get(&(merchant_id.to_string(), year, quarter))?;
        self.get(id)
    }

    /// Store a report and replace its lines.
    pub fn save_with_lines(&self, report: &Report, lines: Vec<ReportLine>) {
        self.lines.insert(report.id, lines);
        self.save(report);
    }

    pub fn save(&self, report: &Report) {
        self.by_period.insert(
            (report.merchant_id.clone(), report.year, report.quarter),
            report.id,
        );
        self.reports.insert(report.id, report.clone());
    }

    /// Check and change a stored report under its entry lock.
    ///
    /// Returns the report as left by `f` together with `f`'s result. When
    /// `f` fails nothing it changed is rolled back, so it must validate
    /// before mutating.
    pub fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Report) -> Result<T, ComplianceError>,
    ) -> Result<(Report, T), ComplianceError> {
        let mut entry = self
            .reports
            .get_mut(&id)
            .ok_or(ComplianceError::ReportNotFound(id))?;
        let out = f(entry.value_mut())?;
        Ok((entry.value().clone(), out))
    }

    pub fn lines(&self, report_id: Uuid) -> Vec<ReportLine> {
        self.lines
            .get(&report_id)
            .map(|l| l.clone())
            .unwrap_or_default()
    }

    /// Reports of a merchant, most recent period first.
    pub fn for_merchant(&self, merchant_id: &str) -> Vec<Report> {
        let mut reports: Vec<Report> = self
            .reports
            .iter()
            .filter(|r| r.merchant_id == merchant_id)
            .map(|r| r.clone())
            .collect();
        reports.sort_by(|a, b| (b.year, b.quarter).cmp(&(a.year, a.quarter)));
        reports
    }
}
