use chrono::{Days, NaiveDate};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use stock_screen::model::{ObservationPoint, ScreeningRecord, UndervaluedRecord};
use stock_screen::{normalize, prepare_series};

fn screening_records(len: usize) -> Vec<ScreeningRecord> {
    (0..len)
        .map(|idx| {
            let step = f64::from(u32::try_from(idx % 997).unwrap_or(0));
            let avg = if idx % 17 == 0 { None } else { Some(50.0 + step) };
            ScreeningRecord::Undervalued(UndervaluedRecord {
                ts_code: format!("{idx:06}.SZ"),
                name: format!("stock-{idx}"),
                total_mv_10k: 10_000_000.0 + step,
                pe_ttm: Some(12.5),
                current_close: 40.0 + (step * 7.0) % 60.0,
                weekly_last_close: 40.0,
                avg_close_1y: avg,
            })
        })
        .collect()
}

fn observations(len: usize) -> Vec<ObservationPoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    let mut points: Vec<ObservationPoint> = (0..len)
        .map(|idx| {
            let offset = u64::try_from(idx).unwrap_or(0);
            let wave = f64::from(u32::try_from(idx % 50).unwrap_or(0));
            ObservationPoint {
                trade_date: start + Days::new(offset),
                open: 10.0 + wave,
                high: 11.0 + wave,
                low: 9.0 + wave,
                close: 10.5 + wave,
                vol: 1_000.0 * (wave + 1.0),
                amount: 250_000.0 + wave,
            }
        })
        .collect();
    points.reverse();
    points
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for len in [100, 1_000, 10_000] {
        let records = screening_records(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &records, |b, records| {
            b.iter(|| normalize(black_box(records)));
        });
    }
    group.finish();
}

fn bench_prepare_series(c: &mut Criterion) {
    let mut group = c.benchmark_group("prepare_series");
    for len in [250, 2_500] {
        let points = observations(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &points, |b, points| {
            b.iter(|| prepare_series(black_box(points)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_prepare_series);
criterion_main!(benches);
