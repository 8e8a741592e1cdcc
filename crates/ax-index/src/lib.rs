#![forbid(unsafe_code)]

use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::mem;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ax_types::codec::{self, IndexInput};
use ax_types::{DType, DTypeFamily, Scalar, TypeError, scalar_cmp};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IndexError {
    #[error("index {position} is out of bounds for axis 0 with size {size}")]
    OutOfBounds { position: i64, size: usize },
    #[error("label {label} is not present in the index")]
    LabelNotFound { label: String },
    #[error("{detail}")]
    UnsupportedOperation { detail: String },
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Hashable lookup key over label values. Cross-representation numeric
/// values (Int64 3, UInt64 3, Float64 3.0) map to the same key, and every
/// missing representation collapses to `Missing`, keeping hash-based
/// lookup consistent with `Scalar::semantic_eq`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum LabelKey {
    Missing,
    Bool(bool),
    Int(i64),
    UInt(u64),
    FloatBits(u64),
    Utf8(String),
    DateTime(i64),
    TimeDelta(i64),
}

impl LabelKey {
    #[must_use]
    pub fn from_scalar(value: &Scalar) -> Self {
        if value.is_missing() {
            return Self::Missing;
        }
        match value {
            Scalar::Bool(v) => Self::Bool(*v),
            Scalar::Int64(v) => Self::Int(*v),
            Scalar::UInt64(v) => {
                i64::try_from(*v).map_or(Self::UInt(*v), Self::Int)
            }
            Scalar::Float64(v) => {
                if v.fract() == 0.0 && *v >= -(2f64.powi(63)) && *v < 2f64.powi(63) {
                    Self::Int(*v as i64)
                } else {
                    Self::FloatBits(v.to_bits())
                }
            }
            Scalar::Utf8(v) => Self::Utf8(v.clone()),
            Scalar::DateTime64(v) => Self::DateTime(*v),
            Scalar::TimeDelta64(v) => Self::TimeDelta(*v),
            Scalar::Null(_) => Self::Missing,
        }
    }
}

/// Closed capability classification of an index, derived from its dtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Numeric,
    Temporal,
    Boolean,
    Text,
    Object,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateKeep {
    First,
    Last,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Monotonicity {
    increasing: bool,
    decreasing: bool,
    strictly_increasing: bool,
    strictly_decreasing: bool,
}

fn detect_monotonicity(values: &[Scalar]) -> Monotonicity {
    if values.len() <= 1 {
        return Monotonicity {
            increasing: true,
            decreasing: true,
            strictly_increasing: true,
            strictly_decreasing: true,
        };
    }
    if values.iter().any(Scalar::is_missing) {
        return Monotonicity::default();
    }

    let mut mono = Monotonicity {
        increasing: true,
        decreasing: true,
        strictly_increasing: true,
        strictly_decreasing: true,
    };
    for pair in values.windows(2) {
        match scalar_cmp(&pair[0], &pair[1]) {
            Ordering::Less => {
                mono.decreasing = false;
                mono.strictly_decreasing = false;
            }
            Ordering::Greater => {
                mono.increasing = false;
                mono.strictly_increasing = false;
            }
            Ordering::Equal => {
                mono.strictly_increasing = false;
                mono.strictly_decreasing = false;
            }
        }
    }
    mono
}

/// Options for the full construction surface. `dtype` forces coercion,
/// `name` labels the index, `copy` forces a fresh backing allocation even
/// when the input buffer could be reused as-is.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub dtype: Option<DType>,
    pub name: Option<String>,
    pub copy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelIndex {
    values: Vec<Scalar>,
    dtype: DType,
    name: Option<String>,
    #[serde(skip)]
    monotonic_cache: OnceCell<Monotonicity>,
    #[serde(skip)]
    lookup_cache: OnceCell<HashMap<LabelKey, Vec<usize>>>,
}

impl PartialEq for LabelIndex {
    fn eq(&self, other: &Self) -> bool {
        self.dtype == other.dtype && self.name == other.name && self.values == other.values
    }
}

impl LabelIndex {
    fn from_parts(values: Vec<Scalar>, dtype: DType, name: Option<String>) -> Self {
        Self {
            values,
            dtype,
            name,
            monotonic_cache: OnceCell::new(),
            lookup_cache: OnceCell::new(),
        }
    }

    pub fn build(
        input: impl Into<IndexInput>,
        options: BuildOptions,
    ) -> Result<Self, TypeError> {
        let resolved = codec::resolve(input.into(), options.dtype)?;
        let values = if options.copy {
            resolved.values.clone()
        } else {
            resolved.values
        };
        Ok(Self::from_parts(values, resolved.dtype, options.name))
    }

    pub fn new(input: impl Into<IndexInput>) -> Result<Self, TypeError> {
        Self::build(input, BuildOptions::default())
    }

    pub fn with_dtype(input: impl Into<IndexInput>, dtype: DType) -> Result<Self, TypeError> {
        Self::build(
            input,
            BuildOptions {
                dtype: Some(dtype),
                ..BuildOptions::default()
            },
        )
    }

    #[must_use]
    pub fn from_i64(values: Vec<i64>) -> Self {
        Self::new(values).expect("integral labels always resolve")
    }

    #[must_use]
    pub fn from_f64(values: Vec<f64>) -> Self {
        Self::new(values).expect("float labels always resolve")
    }

    #[must_use]
    pub fn from_utf8(values: Vec<&str>) -> Self {
        Self::new(values).expect("text labels always resolve")
    }

    #[must_use]
    pub fn rename(&self, name: impl Into<String>) -> Self {
        Self::from_parts(self.values.clone(), self.dtype, Some(name.into()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn kind(&self) -> IndexKind {
        match self.dtype.family() {
            DTypeFamily::Numeric => IndexKind::Numeric,
            DTypeFamily::Temporal => IndexKind::Temporal,
            DTypeFamily::Boolean => IndexKind::Boolean,
            DTypeFamily::Text => IndexKind::Text,
            DTypeFamily::Object | DTypeFamily::Null => IndexKind::Object,
        }
    }

    /// Whether NA-oriented operations (`fillna`, null-aware counting)
    /// apply to this index. When false those operations are no-ops, not
    /// errors.
    #[must_use]
    pub fn can_hold_na(&self) -> bool {
        self.dtype.can_hold_na()
    }

    #[must_use]
    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_missing()).count()
    }

    fn normalize_position(&self, position: i64) -> Result<usize, IndexError> {
        let size = self.values.len();
        let normalized = if position < 0 {
            i128::from(position) + size as i128
        } else {
            i128::from(position)
        };
        if normalized < 0 || normalized >= size as i128 {
            return Err(IndexError::OutOfBounds { position, size });
        }
        Ok(normalized as usize)
    }

    /// Positional access. Negative positions count from the end.
    pub fn get(&self, position: i64) -> Result<&Scalar, IndexError> {
        let pos = self.normalize_position(position)?;
        Ok(&self.values[pos])
    }

    fn monotonic(&self) -> Monotonicity {
        *self
            .monotonic_cache
            .get_or_init(|| detect_monotonicity(&self.values))
    }

    #[must_use]
    pub fn is_monotonic_increasing(&self) -> bool {
        self.monotonic().increasing
    }

    #[must_use]
    pub fn is_monotonic_decreasing(&self) -> bool {
        self.monotonic().decreasing
    }

    #[must_use]
    pub fn is_strictly_monotonic_increasing(&self) -> bool {
        self.monotonic().strictly_increasing
    }

    #[must_use]
    pub fn is_strictly_monotonic_decreasing(&self) -> bool {
        self.monotonic().strictly_decreasing
    }

    fn lookup(&self) -> &HashMap<LabelKey, Vec<usize>> {
        self.lookup_cache.get_or_init(|| {
            let mut map = HashMap::with_capacity(self.values.len());
            for (pos, value) in self.values.iter().enumerate() {
                map.entry(LabelKey::from_scalar(value))
                    .or_insert_with(Vec::new)
                    .push(pos);
            }
            map
        })
    }

    /// First position of `label`, or `None`.
    ///
    /// Strictly ascending indexes are probed by binary search without
    /// materializing the hash map; everything else goes through the
    /// cached label map.
    #[must_use]
    pub fn position(&self, label: &Scalar) -> Option<usize> {
        if self.lookup_cache.get().is_none()
            && self.monotonic().strictly_increasing
            && !label.is_missing()
        {
            let pos = self
                .values
                .partition_point(|v| scalar_cmp(v, label) == Ordering::Less);
            return (pos < self.values.len() && self.values[pos].semantic_eq(label))
                .then_some(pos);
        }
        self.lookup()
            .get(&LabelKey::from_scalar(label))
            .and_then(|positions| positions.first().copied())
    }

    /// All positions of `label`, in order.
    #[must_use]
    pub fn positions(&self, label: &Scalar) -> &[usize] {
        self.lookup()
            .get(&LabelKey::from_scalar(label))
            .map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, label: &Scalar) -> bool {
        self.position(label).is_some()
    }

    /// Label-based lookup; the error names the missing label.
    pub fn get_by_label(&self, label: &Scalar) -> Result<usize, IndexError> {
        self.position(label).ok_or_else(|| IndexError::LabelNotFound {
            label: label.to_string(),
        })
    }

    /// Membership mask; missing values match missing probes.
    #[must_use]
    pub fn isin(&self, probes: &[Scalar]) -> Vec<bool> {
        let probe_keys: HashSet<LabelKey> = probes.iter().map(LabelKey::from_scalar).collect();
        self.values
            .iter()
            .map(|v| probe_keys.contains(&LabelKey::from_scalar(v)))
            .collect()
    }

    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.lookup().values().any(|positions| positions.len() > 1)
    }

    #[must_use]
    pub fn is_unique(&self) -> bool {
        !self.has_duplicates()
    }

    #[must_use]
    pub fn duplicated(&self, keep: DuplicateKeep) -> Vec<bool> {
        let mut result = vec![false; self.values.len()];
        match keep {
            DuplicateKeep::First => {
                let mut seen = HashSet::new();
                for (i, value) in self.values.iter().enumerate() {
                    if !seen.insert(LabelKey::from_scalar(value)) {
                        result[i] = true;
                    }
                }
            }
            DuplicateKeep::Last => {
                let mut seen = HashSet::new();
                for (i, value) in self.values.iter().enumerate().rev() {
                    if !seen.insert(LabelKey::from_scalar(value)) {
                        result[i] = true;
                    }
                }
            }
            DuplicateKeep::None => {
                for positions in self.lookup().values() {
                    if positions.len() > 1 {
                        for &pos in positions {
                            result[pos] = true;
                        }
                    }
                }
            }
        }
        result
    }

    /// Value-wise equality: name-blind, null-aware, and numeric across
    /// integer/float representations. A numeric index never equals a
    /// text index with the same digits.
    #[must_use]
    pub fn equals(&self, other: &Self) -> bool {
        self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a.semantic_eq(b))
    }

    /// `equals` plus matching dtype and name.
    #[must_use]
    pub fn identical(&self, other: &Self) -> bool {
        self.equals(other) && self.dtype == other.dtype && self.name == other.name
    }

    /// New index with `value` spliced in at `position` (which may equal
    /// `len`). Inserting a missing value into an index whose dtype cannot
    /// represent it upgrades the dtype: NaN-class nulls promote integer
    /// indexes to `Float64`, NaT and other incompatible inserts fall back
    /// to `Object`.
    pub fn insert(&self, position: i64, value: Scalar) -> Result<Self, IndexError> {
        let size = self.values.len();
        let normalized = if position < 0 {
            i128::from(position) + size as i128
        } else {
            i128::from(position)
        };
        if normalized < 0 || normalized > size as i128 {
            return Err(IndexError::OutOfBounds { position, size });
        }

        let mut values = self.values.clone();
        values.insert(normalized as usize, value.clone());

        // NaT is representable only by temporal and object indexes.
        if value.is_nat() && !self.dtype.is_temporal() && self.dtype != DType::Object {
            let resolved = codec::resolve(values.into(), Some(DType::Object))?;
            return Ok(Self::from_parts(
                resolved.values,
                resolved.dtype,
                self.name.clone(),
            ));
        }

        let resolved = match codec::resolve(values.clone().into(), Some(self.dtype)) {
            Ok(resolved) => resolved,
            Err(_) => {
                let numeric_insert =
                    value.dtype().is_numeric() || (value.is_missing() && !value.is_nat());
                let upgraded = if self.dtype.is_integer() && numeric_insert {
                    DType::Float64
                } else {
                    DType::Object
                };
                match codec::resolve(values.clone().into(), Some(upgraded)) {
                    Ok(resolved) => resolved,
                    Err(_) => codec::resolve(values.into(), Some(DType::Object))?,
                }
            }
        };

        Ok(Self::from_parts(
            resolved.values,
            resolved.dtype,
            self.name.clone(),
        ))
    }

    /// New index with every missing element replaced by `value`. The
    /// receiver is never mutated; a null-free receiver yields an equal but
    /// distinct index, and an index whose dtype cannot hold NA returns an
    /// unchanged copy.
    pub fn fillna(&self, value: &Scalar) -> Result<Self, TypeError> {
        if !self.can_hold_na() || self.null_count() == 0 {
            return Ok(Self::from_parts(
                self.values.clone(),
                self.dtype,
                self.name.clone(),
            ));
        }

        let filled: Vec<Scalar> = self
            .values
            .iter()
            .map(|v| if v.is_missing() { value.clone() } else { v.clone() })
            .collect();
        let resolved = codec::resolve(filled.into(), None)?;
        Ok(Self::from_parts(
            resolved.values,
            resolved.dtype,
            self.name.clone(),
        ))
    }

    /// Binary-search insertion point in `[0, len]` preserving ascending
    /// order. Defined as a probe; the receiver need not be sorted.
    #[must_use]
    pub fn searchsorted(&self, value: &Scalar) -> usize {
        self.values
            .partition_point(|v| scalar_cmp(v, value) == Ordering::Less)
    }

    /// Logical backing-array footprint in bytes. Shallow mode counts one
    /// fixed-width slot per element (a pointer word for text/object
    /// labels); deep mode adds the heap footprint of variable-sized
    /// elements.
    #[must_use]
    pub fn memory_usage(&self, deep: bool) -> usize {
        if self.values.is_empty() {
            return 0;
        }
        match self.dtype.item_width() {
            Some(width) => self.values.len() * width,
            None => {
                let shallow = self.values.len() * mem::size_of::<usize>();
                if !deep {
                    return shallow;
                }
                let heap: usize = self
                    .values
                    .iter()
                    .map(|v| match v {
                        Scalar::Utf8(s) => mem::size_of::<String>() + s.len(),
                        _ => mem::size_of::<Scalar>(),
                    })
                    .sum();
                shallow + heap
            }
        }
    }

    /// Re-coerce under an explicitly declared dtype.
    pub fn astype(&self, dtype: DType) -> Result<Self, TypeError> {
        let resolved = codec::resolve(self.values.clone().into(), Some(dtype))?;
        Ok(Self::from_parts(
            resolved.values,
            resolved.dtype,
            self.name.clone(),
        ))
    }

    /// Identity reshape of a one-dimensional container. Any explicit axes
    /// argument is rejected.
    pub fn transpose(&self, axes: Option<u32>) -> Result<Self, IndexError> {
        if axes.is_some() {
            return Err(IndexError::UnsupportedOperation {
                detail: "the 'axes' parameter is not supported".to_owned(),
            });
        }
        Ok(Self::from_parts(
            self.values.clone(),
            self.dtype,
            self.name.clone(),
        ))
    }

    pub fn take(&self, positions: &[i64]) -> Result<Self, IndexError> {
        let values = positions
            .iter()
            .map(|&p| self.get(p).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_parts(values, self.dtype, self.name.clone()))
    }

    #[must_use]
    pub fn slice(&self, start: usize, len: usize) -> Self {
        let start = start.min(self.values.len());
        let end = start.saturating_add(len).min(self.values.len());
        Self::from_parts(
            self.values[start..end].to_vec(),
            self.dtype,
            self.name.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{BuildOptions, DuplicateKeep, IndexError, LabelIndex};
    use ax_types::{DType, NAT_TICKS, NullKind, Scalar};

    #[test]
    fn positional_access_supports_negative_positions() {
        let index = LabelIndex::from_i64(vec![10, 20, 30]);
        assert_eq!(index.get(0).expect("get"), &Scalar::Int64(10));
        assert_eq!(index.get(-1).expect("get"), &Scalar::Int64(30));
        assert_eq!(index.get(-3).expect("get"), &Scalar::Int64(10));
    }

    #[test]
    fn out_of_bounds_error_cites_position_axis_and_size() {
        let index = LabelIndex::from_i64(vec![1, 2, 3]);
        let err = index.get(3).expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "index 3 is out of bounds for axis 0 with size 3"
        );
        let err = index.get(-4).expect_err("must fail");
        assert!(matches!(
            err,
            IndexError::OutOfBounds {
                position: -4,
                size: 3
            }
        ));
    }

    #[test]
    fn monotonic_flags_for_ascending_run() {
        let index = LabelIndex::from_i64(vec![1, 2, 3, 4]);
        assert!(index.is_monotonic_increasing());
        assert!(index.is_strictly_monotonic_increasing());
        assert!(!index.is_monotonic_decreasing());
        assert!(!index.is_strictly_monotonic_decreasing());
    }

    #[test]
    fn adjacent_duplicates_keep_weak_monotonicity_only() {
        let index = LabelIndex::from_i64(vec![1, 1, 2, 3]);
        assert!(index.is_monotonic_increasing());
        assert!(!index.is_strictly_monotonic_increasing());

        let index = LabelIndex::from_i64(vec![3, 2, 1, 1]);
        assert!(index.is_monotonic_decreasing());
        assert!(!index.is_strictly_monotonic_decreasing());

        let index = LabelIndex::from_i64(vec![1, 1]);
        assert!(index.is_monotonic_increasing());
        assert!(index.is_monotonic_decreasing());
        assert!(!index.is_strictly_monotonic_increasing());
        assert!(!index.is_strictly_monotonic_decreasing());
    }

    #[test]
    fn descending_run_is_strictly_decreasing() {
        let index = LabelIndex::from_i64(vec![4, 3, 2, 1]);
        assert!(!index.is_monotonic_increasing());
        assert!(index.is_monotonic_decreasing());
        assert!(index.is_strictly_monotonic_decreasing());
    }

    #[test]
    fn empty_and_singleton_are_monotonic_both_ways() {
        for index in [LabelIndex::from_i64(vec![]), LabelIndex::from_i64(vec![1])] {
            assert!(index.is_monotonic_increasing());
            assert!(index.is_monotonic_decreasing());
            assert!(index.is_strictly_monotonic_increasing());
            assert!(index.is_strictly_monotonic_decreasing());
        }
    }

    #[test]
    fn missing_values_break_monotonicity() {
        let index = LabelIndex::from_f64(vec![1.0, f64::NAN, 3.0]);
        assert!(!index.is_monotonic_increasing());
        assert!(!index.is_monotonic_decreasing());
    }

    #[test]
    fn equals_is_name_blind_and_null_aware() {
        let left = LabelIndex::from_f64(vec![1.0, f64::NAN]);
        let right = LabelIndex::from_f64(vec![1.0, f64::NAN]).rename("x");
        assert!(left.equals(&right));
        assert!(left.equals(&left));
    }

    #[test]
    fn equals_crosses_numeric_dtypes_but_not_text() {
        let ints = LabelIndex::from_i64(vec![1, 2]);
        let floats = LabelIndex::from_f64(vec![1.0, 2.0]);
        let text = LabelIndex::from_utf8(vec!["1", "2"]);
        assert!(ints.equals(&floats));
        assert!(floats.equals(&ints));
        assert!(!floats.equals(&text));
        assert!(!text.equals(&floats));
    }

    #[test]
    fn identical_requires_dtype_and_name() {
        let base = LabelIndex::from_f64(vec![1.0, 2.0]);
        assert!(base.identical(&base));

        let renamed = base.rename("foo");
        assert!(base.equals(&renamed));
        assert!(!base.identical(&renamed));

        let object = base.astype(DType::Object).expect("astype");
        assert!(base.equals(&object));
        assert!(!base.identical(&object));
    }

    #[test]
    fn label_lookup_prefers_binary_search_on_sorted_data() {
        let index = LabelIndex::from_i64(vec![10, 20, 30, 40, 50]);
        assert_eq!(index.position(&Scalar::Int64(10)), Some(0));
        assert_eq!(index.position(&Scalar::Int64(30)), Some(2));
        assert_eq!(index.position(&Scalar::Int64(50)), Some(4));
        assert_eq!(index.position(&Scalar::Int64(25)), None);
        assert_eq!(index.position(&Scalar::Int64(100)), None);
    }

    #[test]
    fn label_lookup_falls_back_to_map_on_unsorted_data() {
        let index = LabelIndex::from_i64(vec![30, 10, 20, 10]);
        assert_eq!(index.position(&Scalar::Int64(10)), Some(1));
        assert_eq!(index.positions(&Scalar::Int64(10)), &[1, 3]);
        assert_eq!(index.position(&Scalar::Int64(99)), None);
    }

    #[test]
    fn get_by_label_names_the_missing_label() {
        let index = LabelIndex::from_utf8(vec!["a", "b"]);
        let err = index
            .get_by_label(&Scalar::Utf8("z".to_owned()))
            .expect_err("must fail");
        assert_eq!(err.to_string(), "label z is not present in the index");
    }

    #[test]
    fn isin_matches_missing_probes() {
        let index = LabelIndex::from_f64(vec![1.0, f64::NAN]);
        assert_eq!(index.isin(&[Scalar::Float64(1.0)]), vec![true, false]);
        assert_eq!(index.isin(&[Scalar::Float64(f64::NAN)]), vec![false, true]);
        assert_eq!(
            index.isin(&[Scalar::Float64(1.0), Scalar::Null(NullKind::NaN)]),
            vec![true, true]
        );

        let clean = LabelIndex::from_f64(vec![1.0, 2.0]);
        assert_eq!(
            clean.isin(&[Scalar::Float64(f64::NAN)]),
            vec![false, false]
        );
    }

    #[test]
    fn insert_nan_upgrades_integer_index_to_float() {
        let index = LabelIndex::from_i64(vec![1, 2, 3]);
        let out = index
            .insert(1, Scalar::Null(NullKind::NaN))
            .expect("insert");
        assert_eq!(out.dtype(), DType::Float64);
        assert_eq!(out.values()[0], Scalar::Float64(1.0));
        assert!(out.values()[1].is_missing());
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn insert_nat_falls_back_to_object() {
        let index = LabelIndex::from_i64(vec![1, 2, 3]);
        let out = index
            .insert(1, Scalar::Null(NullKind::NaT))
            .expect("insert");
        assert_eq!(out.dtype(), DType::Object);
        assert_eq!(out.len(), 4);
    }

    #[test]
    fn insert_at_end_and_negative_positions() {
        let index = LabelIndex::from_i64(vec![1, 2]);
        let out = index.insert(2, Scalar::Int64(3)).expect("insert");
        assert_eq!(out.values()[2], Scalar::Int64(3));

        let out = index.insert(-1, Scalar::Int64(9)).expect("insert");
        assert_eq!(out.values()[1], Scalar::Int64(9));

        let err = index.insert(5, Scalar::Int64(0)).expect_err("must fail");
        assert!(matches!(err, IndexError::OutOfBounds { position: 5, size: 2 }));
    }

    #[test]
    fn fillna_replaces_missing_and_keeps_dtype_when_possible() {
        let index = LabelIndex::from_f64(vec![1.0, f64::NAN, 3.0]).rename("x");
        let out = index.fillna(&Scalar::Float64(0.1)).expect("fillna");
        assert_eq!(out.dtype(), DType::Float64);
        assert_eq!(
            out.values(),
            &[
                Scalar::Float64(1.0),
                Scalar::Float64(0.1),
                Scalar::Float64(3.0)
            ]
        );
        assert_eq!(out.name(), Some("x"));

        let as_object = index.fillna(&Scalar::Utf8("obj".to_owned())).expect("fillna");
        assert_eq!(as_object.dtype(), DType::Object);
        assert_eq!(as_object.values()[1], Scalar::Utf8("obj".to_owned()));
    }

    #[test]
    fn fillna_without_nulls_returns_equal_index() {
        let index = LabelIndex::from_i64(vec![1, 2, 3]);
        let out = index.fillna(&Scalar::Int64(0)).expect("fillna");
        assert!(index.equals(&out));
        assert_eq!(index.dtype(), out.dtype());
    }

    #[test]
    fn fillna_is_not_applicable_to_boolean_labels() {
        let index = LabelIndex::new(vec![Scalar::Bool(true), Scalar::Bool(false)])
            .expect("bool index");
        assert!(!index.can_hold_na());
        let out = index.fillna(&Scalar::Bool(true)).expect("fillna");
        assert!(index.equals(&out));
    }

    #[test]
    fn searchsorted_returns_insertion_point() {
        let index = LabelIndex::from_i64(vec![1, 3, 5, 7]);
        assert_eq!(index.searchsorted(&Scalar::Int64(0)), 0);
        assert_eq!(index.searchsorted(&Scalar::Int64(3)), 1);
        assert_eq!(index.searchsorted(&Scalar::Int64(4)), 2);
        assert_eq!(index.searchsorted(&Scalar::Int64(8)), 4);
    }

    #[test]
    fn searchsorted_of_the_maximum_is_within_bounds() {
        let index = LabelIndex::from_i64(vec![2, 9, 4, 1]);
        let max = Scalar::Int64(9);
        let pos = index.searchsorted(&max);
        assert!(pos <= index.len());
    }

    #[test]
    fn memory_usage_zero_when_empty() {
        let index = LabelIndex::from_i64(vec![]);
        assert_eq!(index.memory_usage(false), 0);
        assert_eq!(index.memory_usage(true), 0);
    }

    #[test]
    fn memory_usage_deep_equals_shallow_for_fixed_width() {
        let index = LabelIndex::from_i64(vec![100, 200, 300]);
        assert_eq!(index.memory_usage(false), index.memory_usage(true));
        // Narrowed to Int16: two bytes per element.
        assert_eq!(index.memory_usage(false), 6);
    }

    #[test]
    fn memory_usage_deep_exceeds_shallow_for_text() {
        let index = LabelIndex::from_utf8(vec!["alpha", "beta"]);
        assert!(index.memory_usage(true) > index.memory_usage(false));
    }

    #[test]
    fn duplicated_masks_match_keep_modes() {
        let index = LabelIndex::from_i64(vec![1, 2, 1, 3, 2]);
        assert_eq!(
            index.duplicated(DuplicateKeep::First),
            vec![false, false, true, false, true]
        );
        assert_eq!(
            index.duplicated(DuplicateKeep::Last),
            vec![true, true, false, false, false]
        );
        assert_eq!(
            index.duplicated(DuplicateKeep::None),
            vec![true, true, true, false, true]
        );
        assert!(index.has_duplicates());
        assert!(!LabelIndex::from_i64(vec![1, 2]).has_duplicates());
    }

    #[test]
    fn build_honors_declared_dtype_name_and_copy() {
        let index = LabelIndex::build(
            vec![1_i64, 2, 3],
            BuildOptions {
                dtype: Some(DType::Float64),
                name: Some("score".to_owned()),
                copy: true,
            },
        )
        .expect("build");
        assert_eq!(index.dtype(), DType::Float64);
        assert_eq!(index.name(), Some("score"));
        assert_eq!(index.values()[0], Scalar::Float64(1.0));
    }

    #[test]
    fn temporal_index_round_trips_ticks() {
        let index = LabelIndex::new(vec![
            Scalar::DateTime64(10),
            Scalar::DateTime64(NAT_TICKS),
            Scalar::DateTime64(30),
        ])
        .expect("temporal index");
        assert_eq!(index.dtype(), DType::DateTime64);
        assert_eq!(index.null_count(), 1);
        assert!(index.can_hold_na());
    }

    #[test]
    fn transpose_is_identity_and_rejects_axes() {
        let index = LabelIndex::from_i64(vec![1, 2, 3]);
        let transposed = index.transpose(None).expect("transpose");
        assert!(index.identical(&transposed));

        let err = index.transpose(Some(1)).expect_err("must fail");
        assert_eq!(err.to_string(), "the 'axes' parameter is not supported");
        assert!(matches!(err, IndexError::UnsupportedOperation { .. }));
    }

    #[test]
    fn take_and_slice_select_positions() {
        let index = LabelIndex::from_i64(vec![10, 20, 30, 40]);
        let taken = index.take(&[3, 0, -1]).expect("take");
        assert_eq!(
            taken.values(),
            &[Scalar::Int64(40), Scalar::Int64(10), Scalar::Int64(40)]
        );
        let sliced = index.slice(1, 2);
        assert_eq!(sliced.values(), &[Scalar::Int64(20), Scalar::Int64(30)]);
        let clamped = index.slice(3, 10);
        assert_eq!(clamped.len(), 1);
    }

    #[test]
    fn serde_round_trip_preserves_values_and_name() {
        let index = LabelIndex::from_utf8(vec!["a", "b"]).rename("letters");
        let json = serde_json::to_string(&index).expect("serialize");
        let back: LabelIndex = serde_json::from_str(&json).expect("deserialize");
        assert!(index.identical(&back));
    }

    #[test]
    fn equality_ignores_cache_state() {
        let warm = LabelIndex::from_i64(vec![1, 2, 2]);
        assert!(warm.has_duplicates());
        let cold = LabelIndex::from_i64(vec![1, 2, 2]);
        assert_eq!(warm, cold);
    }
}
