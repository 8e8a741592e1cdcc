#![forbid(unsafe_code)]

//! Shared fixtures and assertion helpers for the conformance suites.
//!
//! The fixtures reproduce the observable inputs the reference behavior
//! was pinned against, so scenario tests across crates agree on the data
//! they exercise.

use ax_types::{NAT_TICKS, Scalar};
use ax_unique::{CountKey, ValueCounts};

pub mod fixtures {
    use super::{NAT_TICKS, Scalar};

    /// The canonical histogram fixture: four distinct labels with counts
    /// 4/3/2/1 and a tie-breaking first-occurrence order.
    #[must_use]
    pub fn histogram_labels() -> Vec<&'static str> {
        vec!["a", "b", "b", "b", "b", "c", "d", "d", "a", "a"]
    }

    /// Histogram fixture with two missing entries replacing "c" and one
    /// extra "b".
    #[must_use]
    pub fn histogram_labels_with_nulls() -> Vec<Scalar> {
        ["a", "b", "b", "b"]
            .into_iter()
            .map(Scalar::from)
            .chain([
                Scalar::Float64(f64::NAN),
                Scalar::Float64(f64::NAN),
            ])
            .chain(["d", "d", "a", "a", "b"].into_iter().map(Scalar::from))
            .collect()
    }

    /// Datetime tick labels with three distinct stamps at counts 3/2/1.
    #[must_use]
    pub fn datetime_ticks() -> Vec<Scalar> {
        [
            1_262_304_000_i64, // three occurrences
            1_262_304_000,
            1_262_304_000,
            1_220_918_400, // two occurrences
            1_220_918_400,
            1_230_768_000, // one occurrence
        ]
        .into_iter()
        .map(Scalar::DateTime64)
        .collect()
    }

    /// Datetime ticks plus a single not-a-time sentinel.
    #[must_use]
    pub fn datetime_ticks_with_nat() -> Vec<Scalar> {
        let mut ticks = datetime_ticks();
        ticks.push(Scalar::DateTime64(NAT_TICKS));
        ticks
    }
}

/// Flatten a label-keyed count table into `(label, count)` pairs.
///
/// Panics on interval keys or normalized counts; scenario tests that use
/// those inspect the entries directly.
#[must_use]
pub fn count_pairs(counts: &ValueCounts) -> Vec<(Scalar, i64)> {
    counts
        .entries()
        .iter()
        .map(|entry| {
            let CountKey::Label(label) = &entry.key else {
                panic!("expected label keys, found interval");
            };
            let Scalar::Int64(count) = &entry.count else {
                panic!("expected integer counts");
            };
            (label.clone(), *count)
        })
        .collect()
}
