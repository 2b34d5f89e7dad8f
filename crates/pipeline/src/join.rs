use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;

use crate::config::ColumnSelection;
use crate::error::PipelineError;
use crate::model::{count_of, key_of, Dataset, Record};

/// Lower bound of the stability band: destination weight / origin weight.
pub const STABILITY_LOWER: f64 = 0.85;
/// Upper bound of the stability band.
pub const STABILITY_UPPER: f64 = 1.15;

/// An origin row paired with its destination row, raw counts still attached.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitPair {
    pub key: String,
    pub origin_weight: f64,
    pub destination_weight: f64,
    /// Raw origin counts, in `ColumnSelection::origin` order.
    pub origin_counts: Vec<f64>,
    /// Raw destination counts, in `ColumnSelection::destination` order.
    pub destination_counts: Vec<f64>,
}

/// What happened to every row during the join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinStats {
    pub origin_rows: usize,
    pub destination_rows: usize,
    /// Destination rows with an empty key cell (never indexed).
    pub destination_without_key: usize,
    /// Destination rows shadowed by an earlier row with the same key.
    pub duplicate_destination_keys: usize,
    /// Origin rows with no destination row for their key.
    pub missing_key: usize,
    /// Origin rows whose weight is zero, negative or non-numeric.
    pub nonpositive_weight: usize,
    /// Pairs whose destination weight left the stability band.
    pub unstable: usize,
    pub merged: usize,
}

#[derive(Debug, Clone)]
pub struct JoinOutput {
    pub pairs: Vec<UnitPair>,
    /// Raw count per origin category summed over every merged unit.
    pub origin_totals: Vec<f64>,
    pub stats: JoinStats,
}

/// True when the destination weight lies within ±15% of the origin weight.
///
/// Bounds are the plain f64 products, so `1.15 * 100.0` is just under 115
/// and a unit that grew by exactly 15% falls outside the band.
pub fn is_stable(origin_weight: f64, destination_weight: f64) -> bool {
    destination_weight >= STABILITY_LOWER * origin_weight
        && destination_weight <= STABILITY_UPPER * origin_weight
}

/// Merge origin rows with destination rows sharing the same key.
///
/// The first destination row seen for a key wins. Origin rows without a
/// match, with a non-positive weight, or whose unit changed size by more than
/// the stability band are skipped. Fails with `NoValidUnits` when nothing is
/// left, before any solver work is attempted.
pub fn join_units(
    origin: &Dataset,
    destination: &Dataset,
    selection: &ColumnSelection,
) -> Result<JoinOutput, PipelineError> {
    let mut stats = JoinStats {
        origin_rows: origin.len(),
        destination_rows: destination.len(),
        ..JoinStats::default()
    };

    let mut lookup: HashMap<String, &Record> = HashMap::with_capacity(destination.len());
    for row in &destination.records {
        let Some(key) = key_of(row, &selection.key) else {
            stats.destination_without_key += 1;
            continue;
        };
        match lookup.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(row);
            }
            Entry::Occupied(slot) => {
                log::debug!("destination key {:?} repeats; keeping the first row", slot.key());
                stats.duplicate_destination_keys += 1;
            }
        }
    }

    if stats.duplicate_destination_keys > 0 {
        log::warn!(
            "{} destination row(s) share a key with an earlier row and were ignored",
            stats.duplicate_destination_keys
        );
    }

    let mut pairs = Vec::new();
    let mut origin_totals = vec![0.0; selection.origin.len()];

    for row in &origin.records {
        let Some((key, target)) = key_of(row, &selection.key)
            .and_then(|k| lookup.get(&k).map(|t| (k, *t)))
        else {
            stats.missing_key += 1;
            continue;
        };

        let origin_weight = count_of(row, &selection.weight);
        if origin_weight <= 0.0 {
            stats.nonpositive_weight += 1;
            continue;
        }

        let destination_weight = count_of(target, &selection.weight);
        if !is_stable(origin_weight, destination_weight) {
            log::trace!("unit {key}: weight {origin_weight} -> {destination_weight} outside band");
            stats.unstable += 1;
            continue;
        }

        let origin_counts: Vec<f64> = selection.origin.iter().map(|c| count_of(row, c)).collect();
        let destination_counts: Vec<f64> =
            selection.destination.iter().map(|c| count_of(target, c)).collect();

        for (total, count) in origin_totals.iter_mut().zip(&origin_counts) {
            *total += count;
        }

        pairs.push(UnitPair {
            key,
            origin_weight,
            destination_weight,
            origin_counts,
            destination_counts,
        });
    }

    stats.merged = pairs.len();
    log::info!(
        "joined {} of {} origin rows on '{}' (no match: {}, non-positive weight: {}, unstable: {})",
        stats.merged,
        stats.origin_rows,
        selection.key,
        stats.missing_key,
        stats.nonpositive_weight,
        stats.unstable,
    );

    if pairs.is_empty() {
        return Err(PipelineError::NoValidUnits {
            key: selection.key.clone(),
            weight: selection.weight.clone(),
            stats,
        });
    }

    Ok(JoinOutput {
        pairs,
        origin_totals,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn dataset(headers: &[&str], rows: &[&[Value]]) -> Dataset {
        let mut ds = Dataset::new(headers.iter().map(|h| h.to_string()).collect());
        for row in rows {
            let record = headers
                .iter()
                .zip(row.iter())
                .map(|(h, v)| (h.to_string(), v.clone()))
                .collect();
            ds.push(record);
        }
        ds
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn text(s: &str) -> Value {
        Value::Text(s.into())
    }

    fn selection() -> ColumnSelection {
        ColumnSelection {
            key: "id".into(),
            weight: "pop".into(),
            origin: vec!["p1".into(), "p2".into()],
            destination: vec!["p1".into(), "p2".into()],
        }
    }

    const HEADERS: &[&str] = &["id", "pop", "p1", "p2"];

    #[test]
    fn single_matching_unit() {
        let origin = dataset(HEADERS, &[&[text("A"), num(100.0), num(60.0), num(40.0)]]);
        let destination = dataset(HEADERS, &[&[text("A"), num(105.0), num(30.0), num(70.0)]]);

        let out = join_units(&origin, &destination, &selection()).unwrap();
        assert_eq!(out.pairs.len(), 1);
        assert_eq!(out.pairs[0].key, "A");
        assert_eq!(out.pairs[0].origin_weight, 100.0);
        assert_eq!(out.pairs[0].destination_counts, vec![30.0, 70.0]);
        assert_eq!(out.origin_totals, vec![60.0, 40.0]);
        assert_eq!(out.stats.merged, 1);
    }

    #[test]
    fn unstable_sole_pair_is_input_selection_error() {
        let origin = dataset(HEADERS, &[&[text("A"), num(100.0), num(60.0), num(40.0)]]);
        let destination = dataset(HEADERS, &[&[text("A"), num(200.0), num(30.0), num(70.0)]]);

        match join_units(&origin, &destination, &selection()) {
            Err(PipelineError::NoValidUnits { stats, .. }) => {
                assert_eq!(stats.unstable, 1);
                assert_eq!(stats.merged, 0);
            }
            other => panic!("expected NoValidUnits, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_and_nonpositive_rows_are_skipped() {
        let origin = dataset(
            HEADERS,
            &[
                &[text("A"), num(100.0), num(60.0), num(40.0)],
                &[text("B"), num(0.0), num(0.0), num(0.0)],
                &[text("C"), num(100.0), num(50.0), num(50.0)],
                &[text("D"), text("n/a"), num(10.0), num(10.0)],
            ],
        );
        let destination = dataset(
            HEADERS,
            &[
                &[text("A"), num(95.0), num(50.0), num(45.0)],
                &[text("B"), num(0.0), num(0.0), num(0.0)],
                &[text("D"), num(20.0), num(10.0), num(10.0)],
            ],
        );

        let out = join_units(&origin, &destination, &selection()).unwrap();
        assert_eq!(out.stats.merged, 1);
        assert_eq!(out.stats.missing_key, 1); // C
        assert_eq!(out.stats.nonpositive_weight, 2); // B, D
        assert_eq!(out.origin_totals, vec![60.0, 40.0]);
    }

    #[test]
    fn first_destination_row_wins_for_duplicate_keys() {
        let origin = dataset(HEADERS, &[&[text("A"), num(100.0), num(60.0), num(40.0)]]);
        let destination = dataset(
            HEADERS,
            &[
                &[text("A"), num(100.0), num(10.0), num(90.0)],
                &[text("A"), num(100.0), num(90.0), num(10.0)],
            ],
        );

        let out = join_units(&origin, &destination, &selection()).unwrap();
        assert_eq!(out.pairs[0].destination_counts, vec![10.0, 90.0]);
        assert_eq!(out.stats.duplicate_destination_keys, 1);
    }

    #[test]
    fn numeric_and_text_keys_meet() {
        let origin = dataset(HEADERS, &[&[num(7.0), num(100.0), num(60.0), num(40.0)]]);
        let destination = dataset(HEADERS, &[&[text("7"), num(100.0), num(50.0), num(50.0)]]);
        let out = join_units(&origin, &destination, &selection()).unwrap();
        assert_eq!(out.pairs[0].key, "7");
    }

    #[test]
    fn empty_keys_never_match() {
        let origin = dataset(HEADERS, &[&[Value::Empty, num(100.0), num(60.0), num(40.0)]]);
        let destination = dataset(HEADERS, &[&[Value::Empty, num(100.0), num(50.0), num(50.0)]]);
        match join_units(&origin, &destination, &selection()) {
            Err(PipelineError::NoValidUnits { stats, .. }) => {
                assert_eq!(stats.destination_without_key, 1);
                assert_eq!(stats.missing_key, 1);
            }
            other => panic!("expected NoValidUnits, got {other:?}"),
        }
    }

    #[test]
    fn missing_category_cells_count_as_zero() {
        let origin = dataset(&["id", "pop", "p1"], &[&[text("A"), num(100.0), num(60.0)]]);
        let destination = dataset(HEADERS, &[&[text("A"), num(100.0), num(50.0), text("x")]]);
        let out = join_units(&origin, &destination, &selection()).unwrap();
        assert_eq!(out.pairs[0].origin_counts, vec![60.0, 0.0]);
        assert_eq!(out.pairs[0].destination_counts, vec![50.0, 0.0]);
    }

    #[test]
    fn stability_band_edges() {
        assert!(is_stable(100.0, 100.0));
        assert!(is_stable(100.0, 86.0));
        assert!(is_stable(100.0, 114.0));
        assert!(!is_stable(100.0, 84.0));
        assert!(!is_stable(100.0, 116.0));
        assert!(!is_stable(100.0, 200.0));
    }

    #[test]
    fn stability_band_exact_edges() {
        // 0.85 * 100.0 is exactly 85; 1.15 * 100.0 rounds to 114.99999999999999
        assert!(is_stable(100.0, 85.0));
        assert!(!is_stable(100.0, 115.0));
        assert!(is_stable(200.0, 170.0));
    }
}
