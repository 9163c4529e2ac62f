use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use eurovat::ComplianceEngine;
use eurovat::core::*;
use eurovat::report::aggregate;
use eurovat::validation::{RegistryError, RegistryResponse, VatRegistry, parse_vat_number};
use eurovat::vat::{RateTable, decide};

const DESTINATIONS: &[(&str, Decimal)] = &[
    ("AT", dec!(20)),
    ("BE", dec!(21)),
    ("DE", dec!(19)),
    ("ES", dec!(21)),
    ("IT", dec!(22)),
    ("NL", dec!(21)),
    ("PL", dec!(23)),
    ("SE", dec!(25)),
];

struct Offline;

#[async_trait]
impl VatRegistry for Offline {
    async fn check(&self, _: &str, _: &str) -> Result<RegistryResponse, RegistryError> {
        Err(RegistryError::Unavailable("offline".into()))
    }
}

fn placed(n: usize) -> NaiveDateTime {
    let day = u32::try_from(n % 28).unwrap() + 1;
    NaiveDate::from_ymd_opt(2025, 5, day)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn build_sales(count: usize) -> Vec<Sale> {
    (0..count)
        .map(|n| {
            let (country, rate) = DESTINATIONS[n % DESTINATIONS.len()];
            let subtotal = Decimal::new(1999 + (n as i64 % 500) * 37, 2);
            let mut sale = SaleBuilder::new(format!("order-{n}"), "shop-fr", country, placed(n))
                .amounts(subtotal, vat_amount(subtotal, rate))
                .applied_rate(rate)
                .build()
                .unwrap();
            sale.expected_rate = Some(rate);
            sale.calculated_vat = Some(vat_amount(subtotal, rate));
            sale
        })
        .collect()
}

fn bench_decide(c: &mut Criterion) {
    let rates = RateTable::eu_standard();
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR");
    let sales = build_sales(100);
    c.bench_function("decide_100_sales", |b| {
        b.iter(|| {
            for sale in &sales {
                black_box(decide(black_box(sale), &merchant, None, &rates));
            }
        });
    });
}

fn bench_aggregate(c: &mut Criterion) {
    let sales = build_sales(10_000);
    let report_id = Uuid::new_v4();
    c.bench_function("aggregate_10k_sales", |b| {
        b.iter(|| black_box(aggregate(report_id, black_box(&sales))));
    });
}

fn bench_generate_report(c: &mut Criterion) {
    let merchant = MerchantContext::new("shop-fr", "Boutique", "FR").with_oss_registration();
    let sales = build_sales(1_000);
    c.bench_function("generate_report_1k_sales", |b| {
        b.iter(|| {
            let engine = ComplianceEngine::builder(Arc::new(Offline)).build();
            for sale in &sales {
                engine.ingest(sale.clone());
            }
            black_box(engine.generate_report(&merchant, 2025, 2).unwrap())
        });
    });
}

fn bench_parse_vat_number(c: &mut Criterion) {
    let inputs = ["DE123456789", "el 123 456 789", "FR12345678901", "NL123456789B01", "ATU12345678"];
    c.bench_function("parse_vat_number", |b| {
        b.iter(|| {
            for input in inputs {
                let _ = black_box(parse_vat_number(black_box(input)));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_decide,
    bench_aggregate,
    bench_generate_report,
    bench_parse_vat_number,
);
criterion_main!(benches);
