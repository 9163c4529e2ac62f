use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::core::{Sale, country_name};

use super::model::{ReportLine, ReportTotals};

/// Group OSS-eligible sales into (country, rate) lines and sum the totals.
///
/// Lines come out ordered by country code, then rate. Totals are summed
/// from the lines, so both views always agree.
pub fn aggregate(report_id: Uuid, sales: &[Sale]) -> (Vec<ReportLine>, ReportTotals) {
    let mut groups: BTreeMap<(String, Decimal), Vec<&Sale>> = BTreeMap::new();
    for sale in sales {
        let rate = sale.expected_rate.unwrap_or_default();
        groups
            .entry((sale.destination_country.clone(), rate))
            .or_default()
            .push(sale);
    }

    let lines: Vec<ReportLine> = groups
        .into_iter()
        .map(|((country, rate), sales)| {
            let taxable: Decimal = sales.iter().map(|s| s.subtotal_amount).sum();
            let vat: Decimal = sales
                .iter()
                .map(|s| s.calculated_vat.unwrap_or_default())
                .sum();
            ReportLine {
                report_id,
                country_name: country_name(&country).unwrap_or(&country).to_string(),
                country_code: country,
                vat_rate: rate,
                taxable_amount: taxable,
                vat_amount: vat,
                total_amount: taxable + vat,
                orders_count: sales.len(),
                b2c_amount: taxable,
                b2b_exempt_amount: Decimal::ZERO,
            }
        })
        .collect();

    let countries: BTreeSet<&str> = lines.iter().map(|l| l.country_code.as_str()).collect();
    let totals = ReportTotals {
        total_sales: lines.iter().map(|l| l.taxable_amount).sum(),
        total_vat: lines.iter().map(|l| l.vat_amount).sum(),
        total_orders: lines.iter().map(|l| l.orders_count).sum(),
        b2b_orders: sales.iter().filter(|s| s.is_b2b).count(),
        b2c_orders: sales.iter().filter(|s| !s.is_b2b).count(),
        exempt_orders: sales.iter().filter(|s| s.vat_exempt).count(),
        countries_count: countries.len(),
    };

    (lines, totals)
}
