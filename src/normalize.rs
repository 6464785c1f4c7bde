use crate::model::ScreeningRecord;
use std::cmp::Ordering;

/// A screening record plus the deviation from its reference average.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedScreeningRecord {
    pub record: ScreeningRecord,
    /// `current - reference`; `None` when the reference is missing or zero.
    pub deviation: Option<f64>,
    /// `deviation / reference * 100`; present exactly when `deviation` is.
    pub deviation_percent: Option<f64>,
}

impl DerivedScreeningRecord {
    pub fn derive(record: ScreeningRecord) -> Self {
        let (deviation, deviation_percent) =
            match compute_deviation(record.current_price(), record.reference_price()) {
                Some((abs, pct)) => (Some(abs), Some(pct)),
                None => (None, None),
            };
        Self {
            record,
            deviation,
            deviation_percent,
        }
    }

    pub fn is_below_reference(&self) -> bool {
        self.deviation.is_some_and(|value| value < 0.0)
    }

    fn magnitude(&self) -> Option<f64> {
        self.deviation.map(f64::abs)
    }
}

fn compute_deviation(current: Option<f64>, reference: Option<f64>) -> Option<(f64, f64)> {
    let current = current?;
    let reference = reference?;
    if reference == 0.0 || !reference.is_finite() {
        return None;
    }
    let deviation = current - reference;
    let percent = deviation / reference * 100.0;
    if deviation.is_finite() && percent.is_finite() {
        Some((deviation, percent))
    } else {
        None
    }
}

/// Derive deviations and rank records by absolute deviation, largest first.
///
/// Records without a usable reference keep their input order after every
/// record that has one. The sort is stable, so equal magnitudes keep their
/// input order too.
pub fn normalize(records: &[ScreeningRecord]) -> Vec<DerivedScreeningRecord> {
    let mut derived: Vec<DerivedScreeningRecord> = records
        .iter()
        .cloned()
        .map(DerivedScreeningRecord::derive)
        .collect();
    derived.sort_by(compare_by_magnitude);
    derived
}

fn compare_by_magnitude(a: &DerivedScreeningRecord, b: &DerivedScreeningRecord) -> Ordering {
    match (a.magnitude(), b.magnitude()) {
        (Some(mag_a), Some(mag_b)) => mag_b.total_cmp(&mag_a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{UndervaluedRecord, WeeklyVolumeSurgeRecord};
    use proptest::prelude::*;

    fn undervalued(code: &str, current: f64, reference: Option<f64>) -> ScreeningRecord {
        ScreeningRecord::Undervalued(UndervaluedRecord {
            ts_code: code.to_string(),
            name: code.to_string(),
            total_mv_10k: 1_000_000.0,
            pe_ttm: Some(12.0),
            current_close: current,
            weekly_last_close: current,
            avg_close_1y: reference,
        })
    }

    fn codes(derived: &[DerivedScreeningRecord]) -> Vec<&str> {
        derived.iter().map(|d| d.record.ts_code()).collect()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(normalize(&[]).is_empty());
    }

    #[test]
    fn ranks_by_absolute_deviation_with_absent_last() {
        let records = vec![
            undervalued("r1", 90.0, Some(100.0)),
            undervalued("r2", 80.0, Some(50.0)),
            undervalued("r3", 10.0, Some(0.0)),
        ];
        let ranked = normalize(&records);

        assert_eq!(codes(&ranked), vec!["r2", "r1", "r3"]);
        assert_eq!(ranked[0].deviation, Some(30.0));
        assert!((ranked[0].deviation_percent.unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(ranked[1].deviation, Some(-10.0));
        assert!((ranked[1].deviation_percent.unwrap() + 10.0).abs() < 1e-9);
        assert_eq!(ranked[2].deviation, None);
        assert_eq!(ranked[2].deviation_percent, None);
    }

    #[test]
    fn missing_reference_is_kept_not_zeroed() {
        let records = vec![
            undervalued("missing", 500.0, None),
            undervalued("small", 10.1, Some(10.0)),
        ];
        let ranked = normalize(&records);
        assert_eq!(codes(&ranked), vec!["small", "missing"]);
        assert_eq!(ranked[1].deviation, None);
    }

    #[test]
    fn equal_magnitudes_keep_input_order() {
        let records = vec![
            undervalued("a", 42.0, None),
            undervalued("p", 110.0, Some(100.0)),
            undervalued("z", 42.0, Some(0.0)),
            undervalued("m", 90.0, Some(100.0)),
            undervalued("q", 110.0, Some(100.0)),
        ];
        let ranked = normalize(&records);

        assert_eq!(codes(&ranked), vec!["p", "m", "q", "a", "z"]);
        assert_eq!(ranked[0].deviation, Some(10.0));
        assert_eq!(ranked[1].deviation, Some(-10.0));
        assert_eq!(ranked[2].deviation, Some(10.0));
    }

    #[test]
    fn does_not_mutate_input() {
        let records = vec![
            undervalued("a", 1.0, Some(2.0)),
            undervalued("b", 1.0, Some(9.0)),
        ];
        let before = records.clone();
        let _ = normalize(&records);
        assert_eq!(records, before);
    }

    #[test]
    fn non_finite_current_price_counts_as_absent() {
        let records = vec![
            undervalued("nan", f64::NAN, Some(10.0)),
            undervalued("ok", 11.0, Some(10.0)),
        ];
        let ranked = normalize(&records);
        assert_eq!(codes(&ranked), vec!["ok", "nan"]);
    }

    #[test]
    fn strategies_without_reference_keep_upstream_order() {
        let surge = |code: &str, ratio: f64| {
            ScreeningRecord::WeeklyVolumeSurge(WeeklyVolumeSurgeRecord {
                ts_code: code.to_string(),
                name: code.to_string(),
                market_value_yi: 100.0,
                pe_ttm: None,
                price: 5.0,
                surge_ratio: ratio,
                just_started: false,
                weekly_change_pct: 1.0,
                week_date: "2025-06-13".to_string(),
            })
        };
        let records = vec![surge("x", 3.0), surge("y", 5.0), surge("z", 1.0)];
        let ranked = normalize(&records);
        assert_eq!(codes(&ranked), vec!["x", "y", "z"]);
        assert!(ranked.iter().all(|d| d.deviation.is_none()));
    }

    #[test]
    fn below_reference_flag_follows_sign() {
        let ranked = normalize(&[undervalued("a", 90.0, Some(100.0))]);
        assert!(ranked[0].is_below_reference());
        let ranked = normalize(&[undervalued("b", 110.0, Some(100.0))]);
        assert!(!ranked[0].is_below_reference());
    }

    fn record_strategy() -> impl Strategy<Value = (f64, Option<f64>)> {
        (
            1.0f64..1000.0,
            prop_oneof![
                3 => (1.0f64..1000.0).prop_map(Some),
                1 => Just(Some(0.0)),
                1 => Just(None),
            ],
        )
    }

    proptest! {
        #[test]
        fn output_is_sorted_and_stable(inputs in prop::collection::vec(record_strategy(), 0..40)) {
            let records: Vec<ScreeningRecord> = inputs
                .iter()
                .enumerate()
                .map(|(idx, (current, reference))| undervalued(&idx.to_string(), *current, *reference))
                .collect();
            let ranked = normalize(&records);
            prop_assert_eq!(ranked.len(), records.len());

            let mut seen_absent = false;
            for pair in ranked.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                match (a.deviation, b.deviation) {
                    (Some(x), Some(y)) => {
                        prop_assert!(x.abs() >= y.abs());
                        if x.abs() == y.abs() {
                            let ia: usize = a.record.ts_code().parse().unwrap();
                            let ib: usize = b.record.ts_code().parse().unwrap();
                            prop_assert!(ia < ib);
                        }
                    }
                    (None, Some(_)) => prop_assert!(false, "defined deviation after absent one"),
                    (None, None) => {
                        let ia: usize = a.record.ts_code().parse().unwrap();
                        let ib: usize = b.record.ts_code().parse().unwrap();
                        prop_assert!(ia < ib);
                    }
                    (Some(_), None) => {}
                }
                if a.deviation.is_none() {
                    seen_absent = true;
                }
                if seen_absent {
                    prop_assert!(b.deviation.is_none());
                }
            }
        }
    }
}
