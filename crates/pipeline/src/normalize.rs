use crate::join::UnitPair;
use crate::model::MergedRecord;

/// Largest deviation from 1 a proportion sum may carry before it is rescaled.
pub const SIMPLEX_EPSILON: f64 = 1e-8;

/// Divide each raw count by `base`.
pub fn proportions(counts: &[f64], base: f64) -> Vec<f64> {
    counts.iter().map(|c| c / base).collect()
}

/// Rescale proportions so they sum to 1.
///
/// Only applied when the sum is positive and off by more than
/// [`SIMPLEX_EPSILON`]; an all-zero row stays all zeros. Returns whether the
/// row was rescaled.
pub fn close_simplex(props: &mut [f64]) -> bool {
    let sum: f64 = props.iter().sum();
    if sum > 0.0 && (sum - 1.0).abs() > SIMPLEX_EPSILON {
        for p in props.iter_mut() {
            *p /= sum;
        }
        true
    } else {
        false
    }
}

/// Turn one joined unit into solver input.
///
/// Both sides are divided by the *origin* weight so they share a population
/// base, then each side is closed independently.
pub fn normalize_pair(pair: &UnitPair) -> MergedRecord {
    normalize_counted(pair).0
}

/// Normalized record plus how many of its two sides were rescaled.
fn normalize_counted(pair: &UnitPair) -> (MergedRecord, usize) {
    let base = pair.origin_weight;

    let mut x = proportions(&pair.origin_counts, base);
    let mut t = proportions(&pair.destination_counts, base);
    let rescaled = usize::from(close_simplex(&mut x)) + usize::from(close_simplex(&mut t));

    (MergedRecord { n: base, x, t }, rescaled)
}

pub fn normalize_units(pairs: &[UnitPair]) -> Vec<MergedRecord> {
    let mut rescaled = 0usize;
    let records: Vec<MergedRecord> = pairs
        .iter()
        .map(|pair| {
            let (record, sides) = normalize_counted(pair);
            rescaled += sides;
            record
        })
        .collect();

    log::info!("normalized {} units; {rescaled} side(s) rescaled to sum to 1", records.len());

    let empty_sides = records
        .iter()
        .filter(|r| r.x.iter().all(|v| *v == 0.0) || r.t.iter().all(|v| *v == 0.0))
        .count();
    if empty_sides > 0 {
        log::warn!("{empty_sides} unit(s) have no counts on at least one side; passing zeros to the solver");
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(weight: f64, origin: &[f64], destination: &[f64]) -> UnitPair {
        UnitPair {
            key: "u".into(),
            origin_weight: weight,
            destination_weight: weight,
            origin_counts: origin.to_vec(),
            destination_counts: destination.to_vec(),
        }
    }

    #[test]
    fn destination_scaled_by_origin_weight_then_closed() {
        let record = normalize_pair(&pair(100.0, &[60.0, 40.0], &[30.0, 70.0]));
        assert_eq!(record.n, 100.0);
        assert!((record.x[0] - 0.6).abs() < 1e-12);
        assert!((record.x[1] - 0.4).abs() < 1e-12);
        // 0.30 + 0.70 = 1.00 against origin weight 100
        assert!((record.t[0] - 0.3).abs() < 1e-12);
        assert!((record.t[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn short_sums_are_rescaled() {
        // Against weight 105 both sides sum to 0.952...; closing brings them back to 1
        let record = normalize_pair(&pair(105.0, &[60.0, 40.0], &[30.0, 70.0]));
        let sum: f64 = record.t.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!((record.t[0] - 0.3).abs() < 1e-12);
        assert!((record.t[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn all_zero_side_stays_zero() {
        let record = normalize_pair(&pair(100.0, &[0.0, 0.0], &[10.0, 10.0]));
        assert_eq!(record.x, vec![0.0, 0.0]);
        assert!(record.x.iter().all(|v| v.is_finite()));
        assert!((record.t.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn close_simplex_leaves_near_unit_sums_alone() {
        let mut props = vec![0.5, 0.5 + 1e-10];
        assert!(!close_simplex(&mut props));
        assert_eq!(props[1], 0.5 + 1e-10);

        let mut props = vec![0.25, 0.25];
        assert!(close_simplex(&mut props));
        assert_eq!(props, vec![0.5, 0.5]);
    }

    #[test]
    fn sums_above_one_are_scaled_down() {
        let record = normalize_pair(&pair(100.0, &[80.0, 40.0], &[50.0, 50.0]));
        assert!((record.x[0] - 2.0 / 3.0).abs() < 1e-12);
        assert!((record.x[1] - 1.0 / 3.0).abs() < 1e-12);
    }
}
