use chrono::NaiveDateTime;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::error::ComplianceError;
use super::types::Sale;

/// In-memory sale store keyed by (merchant, sale id).
///
/// Entries are independent, so ingestion and error detection for different
/// sales never contend on the same lock.
#[derive(Debug, Default)]
pub struct SaleStore {
    sales: DashMap<(String, String), Sale>,
}

/// Copy the engine-derived VAT fields, leaving the feed's inputs alone.
fn copy_derived(from: &Sale, to: &mut Sale) {
    to.expected_rate = from.expected_rate;
    to.calculated_vat = from.calculated_vat;
    to.vat_difference = from.vat_difference;
    to.has_vat_error = from.has_vat_error;
    to.vat_error_kind = from.vat_error_kind;
    to.vat_exempt = from.vat_exempt;
    to.exemption_reason = from.exemption_reason;
}

impl SaleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a sale from the order feed.
    ///
    /// An update for a sale that already feeds a report keeps its frozen
    /// derived fields and report reference.
    pub fn upsert(&self, mut sale: Sale) {
        let key = (sale.merchant_id.clone(), sale.id.clone());
        match self.sales.entry(key) {
            Entry::Occupied(mut entry) => {
                if let Some(report_id) = entry.get().frozen_by() {
                    tracing::warn!(
                        sale = %sale.id,
                        report = %report_id,
                        "update for a sale already included in a report; keeping frozen VAT fields"
                    );
                    copy_derived(entry.get(), &mut sale);
                    sale.included_in_report = true;
                    sale.report_id = Some(report_id);
                }
                entry.insert(sale);
            }
            Entry::Vacant(entry) => {
                entry.insert(sale);
            }
        }
    }

    pub fn get(&self, merchant_id: &str, sale_id: &str) -> Option<Sale> {
        self.sales
            .get(&(merchant_id.to_string(), sale_id.to_string()))
            .map(|s| s.clone())
    }

    /// Run `f` on the stored sale while holding its entry.
    ///
    /// Feed updates to the same sale wait until `f` returns, so whatever
    /// `f` derives is computed from the amounts it writes next to.
    pub fn update<T>(
        &self,
        merchant_id: &str,
        sale_id: &str,
        f: impl FnOnce(&mut Sale) -> Result<T, ComplianceError>,
    ) -> Result<T, ComplianceError> {
        let mut entry = self
            .sales
            .get_mut(&(merchant_id.to_string(), sale_id.to_string()))
            .ok_or_else(|| ComplianceError::SaleNotFound(sale_id.to_string()))?;
        f(entry.value_mut())
    }

    /// Write back derived fields computed on a copy of a sale.
    ///
    /// Only the derived VAT fields are written; amounts, status and the
    /// other feed inputs of the stored sale are kept.
    pub fn save(&self, sale: &Sale) -> Result<(), ComplianceError> {
        self.update(&sale.merchant_id, &sale.id, |stored| {
            if let Some(report_id) = stored.frozen_by() {
                return Err(ComplianceError::SaleFrozen {
                    sale_id: sale.id.clone(),
                    report_id,
                });
            }
            copy_derived(sale, stored);
            Ok(())
        })
    }

    /// Sales of a merchant placed within `[start, end]`, oldest first.
    pub fn in_range(&self, merchant_id: &str, start: NaiveDateTime, end: NaiveDateTime) -> Vec<Sale> {
        let mut sales: Vec<Sale> = self
            .sales
            .iter()
            .filter(|e| {
                e.merchant_id == merchant_id && e.order_date >= start && e.order_date <= end
            })
            .map(|e| e.clone())
            .collect();
        sales.sort_by(|a, b| a.order_date.cmp(&b.order_date).then_with(|| a.id.cmp(&b.id)));
        sales
    }

    /// Flag sales as feeding `report_id`. Returns how many were flagged.
    pub fn flag_for_report(&self, merchant_id: &str, sale_ids: &[String], report_id: Uuid) -> usize {
        let mut flagged = 0;
        for id in sale_ids {
            if let Some(mut sale) = self.sales.get_mut(&(merchant_id.to_string(), id.clone())) {
                sale.included_in_report = true;
                sale.report_id = Some(report_id);
                flagged += 1;
            }
        }
        flagged
    }

    /// Clear the inclusion flag on every sale pointing at `report_id`.
    pub fn release_report(&self, report_id: Uuid) -> usize {
        let mut released = 0;
        for mut sale in self.sales.iter_mut() {
            if sale.report_id == Some(report_id) {
                sale.included_in_report = false;
                sale.report_id = None;
                released += 1;
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.sales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sales.is_empty()
    }
}
