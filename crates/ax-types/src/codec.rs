//! Typed-value codec: turns heterogeneous raw label inputs into a
//! homogeneous backing vector plus its resolved dtype.
//!
//! Widening rules follow the labeling surface, not general array casting:
//! all-integral input narrows to the smallest exact integer dtype, any
//! float or missing value promotes to `Float64` (the only float width
//! produced), and irreconcilable mixes fall back to `Object`.

use crate::{DType, DTypeFamily, NAT_TICKS, Scalar, TypeError};

/// Raw constructor input. Label containers are built from sequences; a
/// bare scalar is rejected with the offending value named in the error.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexInput {
    Scalar(Scalar),
    Sequence(Vec<Scalar>),
}

impl From<Scalar> for IndexInput {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<Scalar>> for IndexInput {
    fn from(values: Vec<Scalar>) -> Self {
        Self::Sequence(values)
    }
}

impl From<Vec<i64>> for IndexInput {
    fn from(values: Vec<i64>) -> Self {
        Self::Sequence(values.into_iter().map(Scalar::Int64).collect())
    }
}

impl From<Vec<f64>> for IndexInput {
    fn from(values: Vec<f64>) -> Self {
        Self::Sequence(values.into_iter().map(Scalar::Float64).collect())
    }
}

impl From<Vec<&str>> for IndexInput {
    fn from(values: Vec<&str>) -> Self {
        Self::Sequence(values.into_iter().map(Scalar::from).collect())
    }
}

/// A coerced backing vector with its resolved dtype. Missing elements are
/// canonicalized to the dtype's missing marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub values: Vec<Scalar>,
    pub dtype: DType,
}

pub fn resolve(input: IndexInput, declared: Option<DType>) -> Result<Resolved, TypeError> {
    let values = match input {
        IndexInput::Sequence(values) => values,
        IndexInput::Scalar(value) => {
            return Err(TypeError::ScalarInput {
                value: value.to_string(),
            });
        }
    };

    match declared {
        Some(dtype) => coerce_declared(values, dtype),
        None => {
            let dtype = infer_dtype(&values);
            Ok(Resolved {
                values: canonicalize(values, dtype),
                dtype,
            })
        }
    }
}

/// Infer the narrowest dtype that represents every input exactly.
#[must_use]
pub fn infer_dtype(values: &[Scalar]) -> DType {
    if values.is_empty() {
        return DType::Object;
    }

    let mut has_missing = false;
    let mut families = Families::default();
    let mut int_min = i64::MAX;
    let mut int_max = i64::MIN;
    let mut needs_unsigned = false;

    for value in values {
        if value.is_missing() {
            has_missing = true;
            continue;
        }
        match value {
            Scalar::Bool(_) => families.bool_ = true,
            Scalar::Int64(v) => {
                families.int = true;
                int_min = int_min.min(*v);
                int_max = int_max.max(*v);
            }
            Scalar::UInt64(v) => {
                families.int = true;
                if let Ok(signed) = i64::try_from(*v) {
                    int_min = int_min.min(signed);
                    int_max = int_max.max(signed);
                } else {
                    needs_unsigned = true;
                }
            }
            Scalar::Float64(_) => families.float = true,
            Scalar::Utf8(_) => families.text = true,
            Scalar::DateTime64(_) => families.datetime = true,
            Scalar::TimeDelta64(_) => families.timedelta = true,
            Scalar::Null(_) => unreachable!("missing handled above"),
        }
    }

    match families.sole() {
        Some(Sole::Bool) if !has_missing => DType::Bool,
        Some(Sole::Bool) => DType::Object,
        Some(Sole::Int) if needs_unsigned && !has_missing => DType::UInt64,
        Some(Sole::Int) if has_missing => DType::Float64,
        Some(Sole::Int) => narrowest_int(int_min, int_max),
        Some(Sole::Float | Sole::Numeric) => DType::Float64,
        Some(Sole::Text) => DType::Utf8,
        Some(Sole::DateTime) => DType::DateTime64,
        Some(Sole::TimeDelta) => DType::TimeDelta64,
        Some(Sole::None) => DType::Float64,
        None => DType::Object,
    }
}

#[derive(Default)]
struct Families {
    bool_: bool,
    int: bool,
    float: bool,
    text: bool,
    datetime: bool,
    timedelta: bool,
}

enum Sole {
    None,
    Bool,
    Int,
    Float,
    Numeric,
    Text,
    DateTime,
    TimeDelta,
}

impl Families {
    /// Collapse the observed families to a single classification, or
    /// `None` when the mix has no common dtype short of `Object`.
    fn sole(&self) -> Option<Sole> {
        let non_numeric =
            [self.bool_, self.text, self.datetime, self.timedelta];
        let numeric = self.int || self.float;

        if numeric && non_numeric.iter().any(|&f| f) {
            return None;
        }
        if non_numeric.iter().filter(|&&f| f).count() > 1 {
            return None;
        }

        Some(match (self.int, self.float) {
            (true, true) => Sole::Numeric,
            (true, false) => Sole::Int,
            (false, true) => Sole::Float,
            (false, false) => {
                if self.bool_ {
                    Sole::Bool
                } else if self.text {
                    Sole::Text
                } else if self.datetime {
                    Sole::DateTime
                } else if self.timedelta {
                    Sole::TimeDelta
                } else {
                    Sole::None
                }
            }
        })
    }
}

fn narrowest_int(min: i64, max: i64) -> DType {
    if min >= i64::from(i8::MIN) && max <= i64::from(i8::MAX) {
        DType::Int8
    } else if min >= i64::from(i16::MIN) && max <= i64::from(i16::MAX) {
        DType::Int16
    } else if min >= i64::from(i32::MIN) && max <= i64::from(i32::MAX) {
        DType::Int32
    } else {
        DType::Int64
    }
}

/// Rewrite values into the canonical representation for `dtype`: numeric
/// payloads in the dtype's scalar variant, missing elements as the
/// dtype's missing marker.
fn canonicalize(values: Vec<Scalar>, dtype: DType) -> Vec<Scalar> {
    values
        .into_iter()
        .map(|value| {
            if value.is_missing() {
                return Scalar::missing_for_dtype(dtype);
            }
            match dtype {
                DType::Float64 => match value {
                    Scalar::Int64(v) => Scalar::Float64(v as f64),
                    Scalar::UInt64(v) => Scalar::Float64(v as f64),
                    other => other,
                },
                DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64 => match value {
                    Scalar::UInt64(v) => {
                        i64::try_from(v).map_or(Scalar::UInt64(v), Scalar::Int64)
                    }
                    other => other,
                },
                DType::UInt64 => match value {
                    Scalar::Int64(v) => {
                        u64::try_from(v).map_or(Scalar::Int64(v), Scalar::UInt64)
                    }
                    other => other,
                },
                _ => value,
            }
        })
        .collect()
}

fn coerce_declared(values: Vec<Scalar>, dtype: DType) -> Result<Resolved, TypeError> {
    let inferred_family = family_of_values(&values);
    let mismatch = || TypeError::IncorrectDtype {
        expected: inferred_family.to_string(),
        received: dtype.family().to_string(),
    };

    let coerced = match dtype {
        DType::Object => canonicalize(values, DType::Object),
        DType::Int8 | DType::Int16 | DType::Int32 | DType::Int64 => {
            coerce_signed(values, dtype)?
        }
        DType::UInt64 => coerce_unsigned(values)?,
        DType::Float64 => coerce_float(values)?,
        DType::Utf8 => {
            for value in &values {
                if !value.is_missing() && !matches!(value, Scalar::Utf8(_)) {
                    return Err(mismatch());
                }
            }
            canonicalize(values, DType::Utf8)
        }
        DType::Bool => {
            for value in &values {
                if value.is_missing() {
                    return Err(TypeError::MissingNotRepresentable { dtype });
                }
                if !matches!(value, Scalar::Bool(_)) {
                    return Err(mismatch());
                }
            }
            values
        }
        DType::DateTime64 | DType::TimeDelta64 => coerce_temporal(values, dtype, &mismatch)?,
        DType::Null => return Err(mismatch()),
    };

    Ok(Resolved {
        values: coerced,
        dtype,
    })
}

fn family_of_values(values: &[Scalar]) -> DTypeFamily {
    infer_dtype(values).family()
}

fn coerce_signed(values: Vec<Scalar>, dtype: DType) -> Result<Vec<Scalar>, TypeError> {
    let fits = |v: i64| -> bool {
        match dtype {
            DType::Int8 => i8::try_from(v).is_ok(),
            DType::Int16 => i16::try_from(v).is_ok(),
            DType::Int32 => i32::try_from(v).is_ok(),
            _ => true,
        }
    };

    values
        .into_iter()
        .map(|value| {
            if value.is_missing() {
                return Err(TypeError::MissingNotRepresentable { dtype });
            }
            let v = match value {
                Scalar::Int64(v) => v,
                Scalar::UInt64(v) => i64::try_from(v).map_err(|_| {
                    TypeError::IncompatibleDtypes {
                        left: DType::UInt64,
                        right: dtype,
                    }
                })?,
                Scalar::Bool(v) => i64::from(v),
                Scalar::Float64(v) => {
                    if v.fract() != 0.0 || !v.is_finite() {
                        return Err(TypeError::LossyFloatToInt { value: v });
                    }
                    v as i64
                }
                Scalar::Utf8(v) => return Err(TypeError::NonNumericText { value: v }),
                other => {
                    return Err(TypeError::IncorrectDtype {
                        expected: other.dtype().family().to_string(),
                        received: dtype.family().to_string(),
                    });
                }
            };
            if !fits(v) {
                return Err(TypeError::IncompatibleDtypes {
                    left: DType::Int64,
                    right: dtype,
                });
            }
            Ok(Scalar::Int64(v))
        })
        .collect()
}

fn coerce_unsigned(values: Vec<Scalar>) -> Result<Vec<Scalar>, TypeError> {
    values
        .into_iter()
        .map(|value| {
            if value.is_missing() {
                return Err(TypeError::MissingNotRepresentable {
                    dtype: DType::UInt64,
                });
            }
            match value {
                Scalar::UInt64(v) => Ok(Scalar::UInt64(v)),
                Scalar::Int64(v) => u64::try_from(v)
                    .map(Scalar::UInt64)
                    .map_err(|_| TypeError::NegativeToUnsigned { value: v }),
                Scalar::Bool(v) => Ok(Scalar::UInt64(u64::from(v))),
                Scalar::Float64(v) => {
                    if v.fract() != 0.0 || !v.is_finite() {
                        return Err(TypeError::LossyFloatToInt { value: v });
                    }
                    if v < 0.0 {
                        return Err(TypeError::NegativeToUnsigned { value: v as i64 });
                    }
                    Ok(Scalar::UInt64(v as u64))
                }
                Scalar::Utf8(v) => Err(TypeError::NonNumericText { value: v }),
                other => Err(TypeError::IncorrectDtype {
                    expected: other.dtype().family().to_string(),
                    received: DTypeFamily::Numeric.to_string(),
                }),
            }
        })
        .collect()
}

fn coerce_float(values: Vec<Scalar>) -> Result<Vec<Scalar>, TypeError> {
    values
        .into_iter()
        .map(|value| {
            if value.is_missing() {
                return Ok(Scalar::missing_for_dtype(DType::Float64));
            }
            match value {
                Scalar::Float64(v) => Ok(Scalar::Float64(v)),
                Scalar::Int64(v) => Ok(Scalar::Float64(v as f64)),
                Scalar::UInt64(v) => Ok(Scalar::Float64(v as f64)),
                Scalar::Bool(v) => Ok(Scalar::Float64(if v { 1.0 } else { 0.0 })),
                Scalar::Utf8(v) => Err(TypeError::NonNumericText { value: v }),
                other => Err(TypeError::IncorrectDtype {
                    expected: other.dtype().family().to_string(),
                    received: DTypeFamily::Numeric.to_string(),
                }),
            }
        })
        .collect()
}

fn coerce_temporal(
    values: Vec<Scalar>,
    dtype: DType,
    mismatch: &dyn Fn() -> TypeError,
) -> Result<Vec<Scalar>, TypeError> {
    values
        .into_iter()
        .map(|value| {
            if value.is_missing() {
                return Ok(Scalar::missing_for_dtype(dtype));
            }
            let ticks = match (&value, dtype) {
                (Scalar::DateTime64(t), DType::DateTime64)
                | (Scalar::TimeDelta64(t), DType::TimeDelta64)
                | (Scalar::Int64(t), _) => *t,
                _ => return Err(mismatch()),
            };
            if ticks == NAT_TICKS {
                return Ok(Scalar::missing_for_dtype(dtype));
            }
            Ok(match dtype {
                DType::DateTime64 => Scalar::DateTime64(ticks),
                _ => Scalar::TimeDelta64(ticks),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{IndexInput, resolve};
    use crate::{DType, NAT_TICKS, NullKind, Scalar, TypeError};

    fn seq(values: Vec<Scalar>) -> IndexInput {
        IndexInput::Sequence(values)
    }

    #[test]
    fn integral_input_narrows_to_smallest_exact_width() {
        let out = resolve(vec![1_i64, 2, 3].into(), None).expect("resolve");
        assert_eq!(out.dtype, DType::Int8);

        let out = resolve(vec![1_i64, 400].into(), None).expect("resolve");
        assert_eq!(out.dtype, DType::Int16);

        let out = resolve(vec![1_i64, 100_000].into(), None).expect("resolve");
        assert_eq!(out.dtype, DType::Int32);

        let out = resolve(vec![1_i64, i64::MAX].into(), None).expect("resolve");
        assert_eq!(out.dtype, DType::Int64);
    }

    #[test]
    fn any_float_forces_float64() {
        let out = resolve(
            seq(vec![Scalar::Float64(1.0), Scalar::Int64(2)]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::Float64);
        assert_eq!(out.values, vec![Scalar::Float64(1.0), Scalar::Float64(2.0)]);
    }

    #[test]
    fn missing_promotes_integers_to_float64() {
        let out = resolve(
            seq(vec![Scalar::Int64(1), Scalar::Null(NullKind::Null)]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::Float64);
        assert_eq!(out.values[1], Scalar::Null(NullKind::NaN));
    }

    #[test]
    fn all_missing_input_is_float64() {
        let out = resolve(
            seq(vec![Scalar::Float64(f64::NAN), Scalar::Null(NullKind::Null)]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::Float64);
        assert!(out.values.iter().all(Scalar::is_missing));
    }

    #[test]
    fn huge_unsigned_values_infer_uint64() {
        let out = resolve(
            seq(vec![Scalar::UInt64(1), Scalar::UInt64(u64::MAX)]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::UInt64);
    }

    #[test]
    fn scalar_input_is_rejected_with_the_value_named() {
        let err = resolve(Scalar::Float64(0.0).into(), None).expect_err("must fail");
        assert!(matches!(err, TypeError::ScalarInput { .. }));
        assert!(err.to_string().contains("collection of some kind"));
        assert!(err.to_string().contains("0 was passed"));
    }

    #[test]
    fn negative_input_under_unsigned_dtype_overflows() {
        let err = resolve(vec![-1_i64].into(), Some(DType::UInt64)).expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "Trying to coerce negative values to unsigned integers"
        );
    }

    #[test]
    fn lossy_float_under_integer_dtype_fails() {
        let err = resolve(
            seq(vec![Scalar::Int64(1), Scalar::Float64(3.5)]),
            Some(DType::Int64),
        )
        .expect_err("must fail");
        assert_eq!(err.to_string(), "Trying to coerce float values to integers");
    }

    #[test]
    fn integral_float_under_integer_dtype_coerces() {
        let out = resolve(
            seq(vec![Scalar::Float64(1.0), Scalar::Float64(2.0)]),
            Some(DType::Int64),
        )
        .expect("resolve");
        assert_eq!(out.values, vec![Scalar::Int64(1), Scalar::Int64(2)]);
    }

    #[test]
    fn text_under_numeric_dtype_fails_with_cast_hint() {
        for bad in [vec!["foo", "bar"], vec!["0", "1", "2"]] {
            let err = resolve(bad.into(), Some(DType::Int64)).expect_err("must fail");
            assert_eq!(
                err.to_string(),
                "String dtype not supported, you may need to explicitly cast to a numeric type"
            );
        }
    }

    #[test]
    fn incompatible_declared_dtype_names_both_families() {
        let err = resolve(
            seq(vec![Scalar::Float64(1.5)]),
            Some(DType::Utf8),
        )
        .expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "Incorrect `dtype` passed: expected numeric, received string"
        );
    }

    #[test]
    fn temporal_input_keeps_ticks_and_collapses_the_sentinel() {
        let out = resolve(
            seq(vec![
                Scalar::DateTime64(86_400),
                Scalar::DateTime64(NAT_TICKS),
            ]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::DateTime64);
        assert_eq!(out.values[0], Scalar::DateTime64(86_400));
        assert_eq!(out.values[1], Scalar::Null(NullKind::NaT));
    }

    #[test]
    fn int_ticks_coerce_under_declared_timedelta() {
        let out = resolve(vec![1_i64, 2, 3].into(), Some(DType::TimeDelta64)).expect("resolve");
        assert_eq!(out.dtype, DType::TimeDelta64);
        assert_eq!(out.values[2], Scalar::TimeDelta64(3));
    }

    #[test]
    fn mixed_families_fall_back_to_object() {
        let out = resolve(
            seq(vec![Scalar::Int64(1), Scalar::Utf8("one".to_owned())]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::Object);
        assert_eq!(out.values.len(), 2);
    }

    #[test]
    fn bool_with_missing_becomes_object() {
        let out = resolve(
            seq(vec![Scalar::Bool(true), Scalar::Null(NullKind::Null)]),
            None,
        )
        .expect("resolve");
        assert_eq!(out.dtype, DType::Object);
    }

    #[test]
    fn empty_input_is_object_dtype() {
        let out = resolve(seq(Vec::new()), None).expect("resolve");
        assert_eq!(out.dtype, DType::Object);
        assert!(out.values.is_empty());
    }
}
