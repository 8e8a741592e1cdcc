#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::mem::size_of;

use bumpalo::{Bump, collections::Vec as BumpVec};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ax_index::{LabelIndex, LabelKey};
use ax_types::{DType, Scalar, scalar_cmp};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum UniqueError {
    #[error("bins argument only works with numeric data")]
    BinsNonNumeric { dtype: DType },
    #[error("bins must be a positive integer")]
    InvalidBinCount,
}

/// Distinct labels in first-occurrence order.
///
/// Every missing representation (NaN, NaT, generic null) collapses into a
/// single canonical null entry: null-equality is deliberately true on the
/// dedup path, unlike ordinary float comparison.
#[must_use]
pub fn unique(index: &LabelIndex) -> LabelIndex {
    let mut seen = HashMap::new();
    let mut out = Vec::new();
    for value in index.values() {
        let key = LabelKey::from_scalar(value);
        if seen.insert(key, ()).is_none() {
            out.push(representative(value, index.dtype()));
        }
    }
    LabelIndex::with_dtype(out, index.dtype())
        .expect("unique values stay representable under the source dtype")
}

/// Count of distinct labels; `dropna` excludes the canonical null entry.
#[must_use]
pub fn nunique(index: &LabelIndex, dropna: bool) -> usize {
    let mut seen = HashMap::new();
    let mut count = 0;
    for value in index.values() {
        let key = LabelKey::from_scalar(value);
        if seen.insert(key, ()).is_none() && !(dropna && value.is_missing()) {
            count += 1;
        }
    }
    count
}

fn representative(value: &Scalar, dtype: DType) -> Scalar {
    if value.is_missing() {
        Scalar::missing_for_dtype(dtype)
    } else {
        value.clone()
    }
}

/// A half-open numeric interval `(left, right]` used as a bin descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinInterval {
    pub left: f64,
    pub right: f64,
}

impl BinInterval {
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        value > self.left && value <= self.right
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CountKey {
    Label(Scalar),
    Interval(BinInterval),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountEntry {
    pub key: CountKey,
    /// `Int64` occurrence count, or `Float64` relative frequency when
    /// `normalize` was requested.
    pub count: Scalar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCounts {
    entries: Vec<CountEntry>,
}

impl ValueCounts {
    #[must_use]
    pub fn entries(&self) -> &[CountEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of counts (or frequencies, when normalized).
    #[must_use]
    pub fn total(&self) -> f64 {
        self.entries
            .iter()
            .map(|e| match e.count {
                Scalar::Int64(v) => v as f64,
                Scalar::Float64(v) => v,
                _ => 0.0,
            })
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueCountsOptions {
    pub normalize: bool,
    pub sort: bool,
    pub ascending: bool,
    pub dropna: bool,
    pub bins: Option<usize>,
}

impl Default for ValueCountsOptions {
    fn default() -> Self {
        Self {
            normalize: false,
            sort: true,
            ascending: false,
            dropna: true,
            bins: None,
        }
    }
}

/// Occurrence counts per distinct label.
///
/// Default ordering is descending count with ties resolved by first
/// occurrence (a stable sort over the first-seen sequence, as in
/// `Series.value_counts`). `sort=false` keeps first-occurrence order;
/// `ascending=true` flips the direction, ties still first-seen. With
/// `bins`, output is keyed by interval descriptors in interval order.
pub fn value_counts(
    index: &LabelIndex,
    options: ValueCountsOptions,
) -> Result<ValueCounts, UniqueError> {
    if let Some(bins) = options.bins {
        return binned_counts(index, bins, options.normalize);
    }

    let mut slots: HashMap<LabelKey, usize> = HashMap::new();
    let mut ordering: Vec<(Scalar, usize)> = Vec::new();

    for value in index.values() {
        if options.dropna && value.is_missing() {
            continue;
        }
        let key = LabelKey::from_scalar(value);
        match slots.get(&key) {
            Some(&slot) => ordering[slot].1 += 1,
            None => {
                slots.insert(key, ordering.len());
                ordering.push((representative(value, index.dtype()), 1));
            }
        }
    }

    if options.sort {
        // Stable sort keeps first-seen ordering for tied counts.
        if options.ascending {
            ordering.sort_by(|(_, a), (_, b)| a.cmp(b));
        } else {
            ordering.sort_by(|(_, a), (_, b)| b.cmp(a));
        }
    }

    let total: usize = ordering.iter().map(|(_, count)| count).sum();
    let entries = ordering
        .into_iter()
        .map(|(value, count)| CountEntry {
            key: CountKey::Label(value),
            count: scaled_count(count, total, options.normalize),
        })
        .collect();

    Ok(ValueCounts { entries })
}

fn scaled_count(count: usize, total: usize, normalize: bool) -> Scalar {
    if normalize {
        let total = if total == 0 { 1 } else { total };
        Scalar::Float64(count as f64 / total as f64)
    } else {
        Scalar::Int64(i64::try_from(count).unwrap_or(i64::MAX))
    }
}

/// Partition the observed value range into `bins` equal-width half-open
/// intervals and count elements per interval. The first interval's lower
/// bound is nudged slightly below the true minimum so the minimum value is
/// included; the nudge magnitude is an implementation convention (0.1% of
/// the range). Missing values never enter a bin.
fn binned_counts(
    index: &LabelIndex,
    bins: usize,
    normalize: bool,
) -> Result<ValueCounts, UniqueError> {
    if !index.dtype().is_numeric() {
        return Err(UniqueError::BinsNonNumeric {
            dtype: index.dtype(),
        });
    }
    if bins == 0 {
        return Err(UniqueError::InvalidBinCount);
    }

    let numbers: Vec<f64> = index
        .values()
        .iter()
        .filter(|v| !v.is_missing())
        .map(|v| match v {
            Scalar::Int64(v) => *v as f64,
            Scalar::UInt64(v) => *v as f64,
            Scalar::Float64(v) => *v,
            _ => unreachable!("numeric dtype holds numeric scalars"),
        })
        .collect();

    if numbers.is_empty() {
        return Ok(ValueCounts {
            entries: Vec::new(),
        });
    }

    let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
    let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = if max > min { max - min } else { 1.0 };
    let nudge = span * 0.001;
    let width = span / bins as f64;

    let intervals: Vec<BinInterval> = (0..bins)
        .map(|i| {
            let left = if i == 0 {
                min - nudge
            } else {
                min + width * i as f64
            };
            let right = if i + 1 == bins {
                max.max(min + width * (i + 1) as f64)
            } else {
                min + width * (i + 1) as f64
            };
            BinInterval { left, right }
        })
        .collect();

    let mut counts = vec![0_usize; bins];
    for value in &numbers {
        if let Some(slot) = intervals.iter().position(|iv| iv.contains(*value)) {
            counts[slot] += 1;
        }
    }

    let total = numbers.len();
    let entries = intervals
        .into_iter()
        .zip(counts)
        .map(|(interval, count)| CountEntry {
            key: CountKey::Interval(interval),
            count: scaled_count(count, total, normalize),
        })
        .collect();

    Ok(ValueCounts { entries })
}

/// Parallel integer-code / unique-values encoding of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factorized {
    pub codes: Vec<usize>,
    pub uniques: LabelIndex,
}

pub const DEFAULT_ARENA_BUDGET_BYTES: usize = 256 * 1024 * 1024;

/// Execution knobs for the factorization hot path: intermediates live in
/// a bump arena when the estimate fits the budget, otherwise the global
/// allocator is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub use_arena: bool,
    pub arena_budget_bytes: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            use_arena: true,
            arena_budget_bytes: DEFAULT_ARENA_BUDGET_BYTES,
        }
    }
}

fn estimate_factorize_intermediate_bytes(input_rows: usize) -> usize {
    // codes + ordering positions + map entry overhead estimate.
    input_rows.saturating_mul(size_of::<usize>().saturating_add(size_of::<usize>()).saturating_add(64))
}

/// Assign contiguous integer codes `0..k` to the labels of `index`.
///
/// `sort=false` assigns codes in first-occurrence order, `sort=true` in
/// sorted-unique order. Missing labels share the single canonical-null
/// code, so `uniques[codes[i]]` reconstructs the original sequence under
/// null-aware equality for every position.
#[must_use]
pub fn factorize(index: &LabelIndex, sort: bool) -> Factorized {
    factorize_with_options(index, sort, ExecutionOptions::default())
}

#[must_use]
pub fn factorize_with_options(
    index: &LabelIndex,
    sort: bool,
    exec: ExecutionOptions,
) -> Factorized {
    let estimated = estimate_factorize_intermediate_bytes(index.len());
    if exec.use_arena && estimated <= exec.arena_budget_bytes {
        factorize_with_arena(index, sort)
    } else {
        factorize_with_global_allocator(index, sort)
    }
}

fn factorize_with_global_allocator(index: &LabelIndex, sort: bool) -> Factorized {
    let mut slots: HashMap<LabelKey, usize> = HashMap::new();
    let mut uniques: Vec<Scalar> = Vec::new();
    let mut codes: Vec<usize> = Vec::with_capacity(index.len());

    for value in index.values() {
        let key = LabelKey::from_scalar(value);
        let next = uniques.len();
        let code = *slots.entry(key).or_insert_with(|| {
            uniques.push(representative(value, index.dtype()));
            next
        });
        codes.push(code);
    }

    emit_factorized(index, codes, uniques, sort)
}

/// Arena-backed variant: the per-element code vector is bump-allocated
/// and copied out once, so the intermediate frees in bulk with the arena.
fn factorize_with_arena(index: &LabelIndex, sort: bool) -> Factorized {
    let arena = Bump::new();
    let mut slots: HashMap<LabelKey, usize> = HashMap::new();
    let mut uniques: Vec<Scalar> = Vec::new();
    let mut codes = BumpVec::<usize>::with_capacity_in(index.len(), &arena);

    for value in index.values() {
        let key = LabelKey::from_scalar(value);
        let next = uniques.len();
        let code = *slots.entry(key).or_insert_with(|| {
            uniques.push(representative(value, index.dtype()));
            next
        });
        codes.push(code);
    }

    let codes: Vec<usize> = codes.iter().copied().collect();
    emit_factorized(index, codes, uniques, sort)
}

fn emit_factorized(
    index: &LabelIndex,
    mut codes: Vec<usize>,
    mut uniques: Vec<Scalar>,
    sort: bool,
) -> Factorized {
    if sort && uniques.len() > 1 {
        let mut order: Vec<usize> = (0..uniques.len()).collect();
        order.sort_by(|&a, &b| scalar_cmp(&uniques[a], &uniques[b]));

        let mut remap = vec![0_usize; uniques.len()];
        for (new_code, &old_code) in order.iter().enumerate() {
            remap[old_code] = new_code;
        }
        for code in &mut codes {
            *code = remap[*code];
        }
        uniques = order.into_iter().map(|i| uniques[i].clone()).collect();
    }

    let uniques = LabelIndex::with_dtype(uniques, index.dtype())
        .expect("factorized uniques stay representable under the source dtype");
    Factorized { codes, uniques }
}
