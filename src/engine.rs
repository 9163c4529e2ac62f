//! One-stop facade wiring the stores, detector, monitor, report generator
//! and validation client together.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::{
    AlertSink, AuditSink, ComplianceError, EngineConfig, MemoryAlertSink, MerchantContext, Sale,
    SaleStore, TracingAuditSink,
};
use crate::report::{Deadline, Report, ReportGenerator, ReportLine, ReportStore, next_deadline};
use crate::validation::{
    SweepSummary, ValidationClient, ValidationRecord, ValidationResult, ValidationStore,
    VatRegistry,
};
use crate::vat::{
    ErrorDetector, RateRecord, RateTable, ThresholdMonitor, ThresholdStatus, VatAnalysis,
    VatDecision, decide,
};

/// Builder for [`ComplianceEngine`].
///
/// Only the registry is required. Alerts default to an in-memory sink,
/// audit entries to `tracing`, rates to [`RateTable::eu_standard`].
pub struct EngineBuilder {
    registry: Arc<dyn VatRegistry>,
    alerts: Option<Arc<dyn AlertSink>>,
    audit: Option<Arc<dyn AuditSink>>,
    rates: Option<RateTable>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn alerts(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(sink);
        self
    }

    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn rates(mut self, rates: RateTable) -> Self {
        self.rates = Some(rates);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> ComplianceEngine {
        let alerts = self
            .alerts
            .unwrap_or_else(|| Arc::new(MemoryAlertSink::new()));
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink));
        let rates = Arc::new(self.rates.unwrap_or_else(RateTable::eu_standard));
        let sales = Arc::new(SaleStore::new());
        let validations = Arc::new(ValidationStore::new());
        let reports = Arc::new(ReportStore::new());

        let detector = Arc::new(ErrorDetector::new(
            Arc::clone(&rates),
            Arc::clone(&sales),
            Arc::clone(&validations),
            Arc::clone(&alerts),
            self.config.detection.clone(),
        ));
        let threshold = ThresholdMonitor::new(
            Arc::clone(&sales),
            Arc::clone(&alerts),
            Arc::clone(&audit),
            self.config.threshold.clone(),
        );
        let reports_gen = ReportGenerator::new(
            Arc::clone(&sales),
            reports,
            Arc::clone(&detector),
            Arc::clone(&audit),
        );
        let validator = Arc::new(ValidationClient::new(
            self.registry,
            validations,
            audit,
            self.config.validation.clone(),
        ));

        ComplianceEngine {
            config: self.config,
            rates,
            sales,
            detector,
            threshold,
            reports: reports_gen,
            validator,
        }
    }
}

/// EU VAT compliance engine for a set of merchants.
pub struct ComplianceEngine {
    config: EngineConfig,
    rates: Arc<RateTable>,
    sales: Arc<SaleStore>,
    detector: Arc<ErrorDetector>,
    threshold: ThresholdMonitor,
    reports: ReportGenerator,
    validator: Arc<ValidationClient>,
}

impl ComplianceEngine {
    pub fn builder(registry: Arc<dyn VatRegistry>) -> EngineBuilder {
        EngineBuilder {
            registry,
            alerts: None,
            audit: None,
            rates: None,
            config: EngineConfig::default(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // --- sales ---

    /// Store a sale from the order feed.
    pub fn ingest(&self, sale: Sale) {
        self.sales.upsert(sale);
    }

    pub fn sale(&self, merchant_id: &str, sale_id: &str) -> Option<Sale> {
        self.sales.get(merchant_id, sale_id)
    }

    // --- VAT ---

    /// Expected treatment of a sale, using the stored verdict for its buyer.
    pub fn decide(&self, sale: &Sale, merchant: &MerchantContext) -> VatDecision {
        self.detector.decision_for(sale, merchant)
    }

    /// Expected treatment of a sale with an explicit verdict.
    pub fn decide_with(
        &self,
        sale: &Sale,
        merchant: &MerchantContext,
        verdict: Option<&ValidationRecord>,
    ) -> VatDecision {
        decide(sale, merchant, verdict, &self.rates)
    }

    /// Re-run error detection on a stored sale and return it updated.
    pub fn detect_errors(&self, merchant: &MerchantContext, sale_id: &str) -> Result<Sale, ComplianceError> {
        self.detector.detect_errors(merchant, sale_id)
    }

    pub fn analyze(
        &self,
        merchant: &MerchantContext,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<VatAnalysis, ComplianceError> {
        self.detector.analyze(merchant, start, end)
    }

    pub fn check_threshold(&self, merchant: &MerchantContext, today: NaiveDate) -> ThresholdStatus {
        self.threshold.check(merchant, today)
    }

    /// Re-arm the threshold alert for a merchant.
    pub fn clear_threshold_alert(&self, merchant_id: &str) {
        self.threshold.clear_alert_flag(merchant_id);
    }

    /// Records valid on `date`, one per member state.
    pub fn current_rates(&self, date: NaiveDate) -> Vec<RateRecord> {
        self.rates.current_rates(date).into_iter().cloned().collect()
    }

    // --- reports ---

    pub fn generate_report(&self, merchant: &MerchantContext, year: i32, quarter: u32) -> Result<Report, ComplianceError> {
        self.reports.generate(merchant, year, quarter)
    }

    pub fn report(&self, report_id: Uuid) -> Result<Report, ComplianceError> {
        self.reports.report(report_id)
    }

    pub fn report_lines(&self, report_id: Uuid) -> Result<Vec<ReportLine>, ComplianceError> {
        self.reports.report_lines(report_id)
    }

    pub fn mark_downloaded(&self, report_id: Uuid) -> Result<Report, ComplianceError> {
        self.reports.mark_downloaded(report_id)
    }

    pub fn mark_submitted(&self, report_id: Uuid, notes: Option<String>) -> Result<Report, ComplianceError> {
        self.reports.mark_submitted(report_id, notes)
    }

    pub fn report_history(&self, merchant_id: &str) -> Vec<Report> {
        self.reports.history(merchant_id)
    }

    pub fn next_deadline(&self, now: NaiveDateTime) -> Deadline {
        next_deadline(now)
    }

    // --- validation ---

    pub async fn validate(&self, merchant_id: &str, vat_number: &str, correlation_id: Option<&str>) -> ValidationResult {
        self.validator
            .validate(merchant_id, vat_number, correlation_id)
            .await
    }

    /// Start a validation in the background; the checkout does not wait.
    pub fn validate_async(
        &self,
        merchant_id: impl Into<String>,
        vat_number: impl Into<String>,
        correlation_id: Option<String>,
    ) -> JoinHandle<ValidationResult> {
        self.validator
            .validate_async(merchant_id, vat_number, correlation_id)
    }

    pub async fn reconcile_validations(&self, now: DateTime<Utc>) -> SweepSummary {
        self.validator.reconcile(now).await
    }

    /// Start the periodic reconciliation sweep.
    pub fn spawn_reconciler(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.validator
            .spawn_reconciler(self.config.validation.sweep_interval(), shutdown)
    }

    pub fn validations(&self) -> &ValidationStore {
        self.validator.store()
    }
}
