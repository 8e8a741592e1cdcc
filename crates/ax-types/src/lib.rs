#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod codec;

/// Reserved tick value encoding "missing" for datetime/timedelta labels.
pub const NAT_TICKS: i64 = i64::MIN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DType {
    Null,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt64,
    Float64,
    Utf8,
    DateTime64,
    TimeDelta64,
    Object,
}

/// Coarse dtype family used for capability checks and declared-dtype
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DTypeFamily {
    Null,
    Boolean,
    Numeric,
    Text,
    Temporal,
    Object,
}

impl fmt::Display for DTypeFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Numeric => "numeric",
            Self::Text => "string",
            Self::Temporal => "datetime64",
            Self::Object => "object",
        };
        f.write_str(name)
    }
}

impl DType {
    #[must_use]
    pub fn family(self) -> DTypeFamily {
        match self {
            Self::Null => DTypeFamily::Null,
            Self::Bool => DTypeFamily::Boolean,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::UInt64
            | Self::Float64 => DTypeFamily::Numeric,
            Self::Utf8 => DTypeFamily::Text,
            Self::DateTime64 | Self::TimeDelta64 => DTypeFamily::Temporal,
            Self::Object => DTypeFamily::Object,
        }
    }

    #[must_use]
    pub fn is_numeric(self) -> bool {
        matches!(self.family(), DTypeFamily::Numeric)
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::UInt64
        )
    }

    #[must_use]
    pub fn is_temporal(self) -> bool {
        matches!(self, Self::DateTime64 | Self::TimeDelta64)
    }

    /// Whether a container of this dtype can represent a missing element.
    ///
    /// Integer and boolean label arrays cannot; constructing them with
    /// missing inputs promotes the dtype instead (see `codec`).
    #[must_use]
    pub fn can_hold_na(self) -> bool {
        matches!(
            self,
            Self::Float64 | Self::Utf8 | Self::DateTime64 | Self::TimeDelta64 | Self::Object
        )
    }

    /// Fixed per-element width in bytes of the logical backing array.
    /// `None` for variable-sized (text/object) elements, which are
    /// accounted as one pointer word shallow plus heap footprint deep.
    #[must_use]
    pub fn item_width(self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::Bool | Self::Int8 => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 => Some(4),
            Self::Int64 | Self::UInt64 | Self::Float64 | Self::DateTime64 | Self::TimeDelta64 => {
                Some(8)
            }
            Self::Utf8 | Self::Object => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullKind {
    Null,
    NaN,
    NaT,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    Null(NullKind),
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Utf8(String),
    DateTime64(i64),
    TimeDelta64(i64),
}

impl Scalar {
    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Null(_) => DType::Null,
            Self::Bool(_) => DType::Bool,
            Self::Int64(_) => DType::Int64,
            Self::UInt64(_) => DType::UInt64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::DateTime64(_) => DType::DateTime64,
            Self::TimeDelta64(_) => DType::TimeDelta64,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    #[must_use]
    pub fn is_nan(&self) -> bool {
        matches!(self, Self::Null(NullKind::NaN))
            || matches!(self, Self::Float64(v) if v.is_nan())
    }

    #[must_use]
    pub fn is_nat(&self) -> bool {
        matches!(self, Self::Null(NullKind::NaT))
            || matches!(self, Self::DateTime64(t) | Self::TimeDelta64(t) if *t == NAT_TICKS)
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Null(_) => true,
            Self::Float64(v) => v.is_nan(),
            Self::DateTime64(t) | Self::TimeDelta64(t) => *t == NAT_TICKS,
            _ => false,
        }
    }

    /// The canonical missing marker for a dtype family.
    #[must_use]
    pub fn missing_for_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Float64 => Self::Null(NullKind::NaN),
            DType::DateTime64 | DType::TimeDelta64 => Self::Null(NullKind::NaT),
            _ => Self::Null(NullKind::Null),
        }
    }

    /// Null-aware equality used by deduplication, counting and index
    /// equality: any two missing values compare equal, and numeric values
    /// compare by exact value across integer/unsigned/float
    /// representations. This deliberately deviates from IEEE NaN
    /// self-inequality; ordinary `PartialEq` on `Scalar` does not.
    #[must_use]
    pub fn semantic_eq(&self, other: &Self) -> bool {
        if self.is_missing() || other.is_missing() {
            return self.is_missing() && other.is_missing();
        }
        match (self, other) {
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::DateTime64(a), Self::DateTime64(b))
            | (Self::TimeDelta64(a), Self::TimeDelta64(b)) => a == b,
            _ => match (numeric_repr(self), numeric_repr(other)) {
                (Some(a), Some(b)) => a.exact_eq(b),
                _ => false,
            },
        }
    }

    #[must_use]
    pub fn is_na(&self) -> bool {
        self.is_missing()
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null(NullKind::NaN) => f.write_str("nan"),
            Self::Null(NullKind::NaT) => f.write_str("NaT"),
            Self::Null(NullKind::Null) => f.write_str("None"),
            Self::Bool(v) => write!(f, "{}", if *v { "True" } else { "False" }),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::Utf8(v) => write!(f, "{v}"),
            Self::DateTime64(v) | Self::TimeDelta64(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int64(value)
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float64(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Utf8(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Utf8(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Exact numeric representation for cross-dtype comparison.
#[derive(Clone, Copy)]
enum NumericRepr {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl NumericRepr {
    fn exact_eq(self, other: Self) -> bool {
        use NumericRepr::{Float, Signed, Unsigned};
        match (self, other) {
            (Signed(a), Signed(b)) => a == b,
            (Unsigned(a), Unsigned(b)) => a == b,
            (Signed(a), Unsigned(b)) | (Unsigned(b), Signed(a)) => {
                a >= 0 && u64::try_from(a) == Ok(b)
            }
            (Float(a), Float(b)) => a == b,
            (Signed(a), Float(b)) | (Float(b), Signed(a)) => {
                b.fract() == 0.0 && b >= -(2f64.powi(63)) && b < 2f64.powi(63) && b as i64 == a
            }
            (Unsigned(a), Float(b)) | (Float(b), Unsigned(a)) => {
                b.fract() == 0.0 && b >= 0.0 && b < 2f64.powi(64) && b as u64 == a
            }
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Self::Signed(v) => v as f64,
            Self::Unsigned(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

fn numeric_repr(value: &Scalar) -> Option<NumericRepr> {
    match value {
        Scalar::Int64(v) => Some(NumericRepr::Signed(*v)),
        Scalar::UInt64(v) => Some(NumericRepr::Unsigned(*v)),
        Scalar::Float64(v) => Some(NumericRepr::Float(*v)),
        _ => None,
    }
}

/// Total order over scalars, used by search and sorted factorization.
///
/// Within a family the natural order applies (numerics compare by value
/// across representations). Missing values sort after everything else;
/// otherwise families rank Bool < numeric < temporal < text.
#[must_use]
pub fn scalar_cmp(left: &Scalar, right: &Scalar) -> Ordering {
    fn family_rank(value: &Scalar) -> u8 {
        match value {
            Scalar::Bool(_) => 0,
            Scalar::Int64(_) | Scalar::UInt64(_) | Scalar::Float64(_) => 1,
            Scalar::DateTime64(_) | Scalar::TimeDelta64(_) => 2,
            Scalar::Utf8(_) => 3,
            Scalar::Null(_) => 4,
        }
    }

    match (left.is_missing(), right.is_missing()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    match (left, right) {
        (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
        (Scalar::Utf8(a), Scalar::Utf8(b)) => a.cmp(b),
        (Scalar::DateTime64(a), Scalar::DateTime64(b))
        | (Scalar::TimeDelta64(a), Scalar::TimeDelta64(b)) => a.cmp(b),
        _ => match (numeric_repr(left), numeric_repr(right)) {
            (Some(a), Some(b)) => {
                if a.exact_eq(b) {
                    Ordering::Equal
                } else {
                    a.as_f64()
                        .partial_cmp(&b.as_f64())
                        .unwrap_or(Ordering::Equal)
                }
            }
            _ => family_rank(left).cmp(&family_rank(right)),
        },
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypeError {
    #[error("String dtype not supported, you may need to explicitly cast to a numeric type")]
    NonNumericText { value: String },
    #[error("LabelIndex(...) must be called with a collection of some kind, {value} was passed")]
    ScalarInput { value: String },
    #[error("Trying to coerce negative values to unsigned integers")]
    NegativeToUnsigned { value: i64 },
    #[error("Trying to coerce float values to integers")]
    LossyFloatToInt { value: f64 },
    #[error("Incorrect `dtype` passed: expected {expected}, received {received}")]
    IncorrectDtype { expected: String, received: String },
    #[error("cannot convert missing values to dtype {dtype:?}")]
    MissingNotRepresentable { dtype: DType },
    #[error("dtype coercion from {left:?} to {right:?} has no compatible common type")]
    IncompatibleDtypes { left: DType, right: DType },
}
