//! Numeric value model.
//!
//! Every numeric field of a study is logically a function of
//! `(scenario, time)`. The concrete storage is picked at ingest from the
//! shape of the raw input, so a constant, a single time series, a
//! per-scenario level or a full matrix all expose the same accessor.

use serde::de::{Deserializer, Error as DeError};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::error::{AdqError, AdqResult};

/// A `(scenario, time) -> f64` function with shape-dependent storage.
///
/// | Variant | Raw input shape | Semantics |
/// |---|---|---|
/// | `Scalar` | number | constant over `(s, t)` |
/// | `Row` | `[horizon]` | one series, broadcast across scenarios |
/// | `Column` | `[nb_scn, 1]` | one level per scenario, broadcast across time |
/// | `Matrix` | `[nb_scn, horizon]` | exact |
#[derive(Debug, Clone, PartialEq)]
pub enum NumericValue {
    Scalar(f64),
    Row(Vec<f64>),
    Column(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
}

impl NumericValue {
    /// Value at scenario `scn` and time step `t`.
    pub fn at(&self, scn: usize, t: usize) -> f64 {
        match self {
            NumericValue::Scalar(v) => *v,
            NumericValue::Row(row) => row[t],
            NumericValue::Column(col) => col[scn],
            NumericValue::Matrix(m) => m[scn][t],
        }
    }

    fn all(&self, pred: impl Fn(f64) -> bool) -> bool {
        match self {
            NumericValue::Scalar(v) => pred(*v),
            NumericValue::Row(row) => row.iter().all(|&v| pred(v)),
            NumericValue::Column(col) => col.iter().all(|&v| pred(v)),
            NumericValue::Matrix(m) => m.iter().flatten().all(|&v| pred(v)),
        }
    }

    /// True iff `value(s, t) < rhs` for every `(s, t)`.
    pub fn all_lt(&self, rhs: f64) -> bool {
        self.all(|v| v < rhs)
    }

    /// True iff `value(s, t) <= rhs` for every `(s, t)`.
    pub fn all_le(&self, rhs: f64) -> bool {
        self.all(|v| v <= rhs)
    }

    /// True iff `value(s, t) > rhs` for every `(s, t)`.
    pub fn all_gt(&self, rhs: f64) -> bool {
        self.all(|v| v > rhs)
    }

    /// True iff `value(s, t) >= rhs` for every `(s, t)`.
    pub fn all_ge(&self, rhs: f64) -> bool {
        self.all(|v| v >= rhs)
    }

    /// Expand to the `(s, t)` row-major sequence:
    /// `[v(0,0), v(0,1), ..., v(1,0), v(1,1), ...]`.
    pub fn flatten(&self, nb_scn: usize, horizon: usize) -> Vec<f64> {
        match self {
            NumericValue::Scalar(v) => vec![*v; nb_scn * horizon],
            NumericValue::Row(row) => {
                let mut out = Vec::with_capacity(nb_scn * horizon);
                for _ in 0..nb_scn {
                    out.extend_from_slice(row);
                }
                out
            }
            NumericValue::Column(col) => {
                let mut out = Vec::with_capacity(nb_scn * horizon);
                for &v in col {
                    out.extend(std::iter::repeat(v).take(horizon));
                }
                out
            }
            NumericValue::Matrix(m) => m.iter().flatten().copied().collect(),
        }
    }

    /// Check the stored shape against study dimensions. Used to revalidate
    /// values that entered through deserialization instead of a factory.
    pub fn check_dims(&self, nb_scn: usize, horizon: usize) -> AdqResult<()> {
        let ok = match self {
            NumericValue::Scalar(_) => true,
            NumericValue::Row(row) => row.len() == horizon,
            NumericValue::Column(col) => col.len() == nb_scn,
            NumericValue::Matrix(m) => {
                m.len() == nb_scn && m.iter().all(|row| row.len() == horizon)
            }
        };
        if ok {
            Ok(())
        } else {
            Err(AdqError::Shape(format!(
                "value does not match study dimensions nb_scn={} horizon={}: {:?}",
                nb_scn, horizon, self
            )))
        }
    }
}

/// Raw numeric input accepted by [`ValueFactory::create`].
#[derive(Debug, Clone)]
pub enum ValueInput {
    Scalar(f64),
    Series(Vec<f64>),
    Table(Vec<Vec<f64>>),
    Value(NumericValue),
}

impl From<f64> for ValueInput {
    fn from(v: f64) -> Self {
        ValueInput::Scalar(v)
    }
}

impl From<Vec<f64>> for ValueInput {
    fn from(v: Vec<f64>) -> Self {
        ValueInput::Series(v)
    }
}

impl From<Vec<Vec<f64>>> for ValueInput {
    fn from(v: Vec<Vec<f64>>) -> Self {
        ValueInput::Table(v)
    }
}

impl From<NumericValue> for ValueInput {
    fn from(v: NumericValue) -> Self {
        ValueInput::Value(v)
    }
}

/// Classifies raw numeric input against the dimensions of one study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueFactory {
    pub nb_scn: usize,
    pub horizon: usize,
}

impl ValueFactory {
    pub fn new(nb_scn: usize, horizon: usize) -> Self {
        ValueFactory { nb_scn, horizon }
    }

    /// Build a [`NumericValue`] from raw input, failing with
    /// [`AdqError::Shape`] for any shape the study dimensions disallow.
    pub fn create(&self, input: impl Into<ValueInput>) -> AdqResult<NumericValue> {
        match input.into() {
            ValueInput::Scalar(v) => Ok(NumericValue::Scalar(v)),
            ValueInput::Series(series) => {
                if series.len() == self.horizon {
                    Ok(NumericValue::Row(series))
                } else {
                    Err(self.shape_error(series.len(), 1))
                }
            }
            ValueInput::Table(table) => {
                // A (nb_scn, 1) table is always a column, even when
                // horizon is 1, so classification is stable across
                // serialization round-trips.
                if table.len() == self.nb_scn && table.iter().all(|row| row.len() == 1) {
                    Ok(NumericValue::Column(
                        table.into_iter().map(|row| row[0]).collect(),
                    ))
                } else if table.len() == self.nb_scn
                    && table.iter().all(|row| row.len() == self.horizon)
                {
                    Ok(NumericValue::Matrix(table))
                } else {
                    let cols = table.first().map_or(0, Vec::len);
                    Err(self.shape_error(cols, table.len()))
                }
            }
            ValueInput::Value(value) => {
                value.check_dims(self.nb_scn, self.horizon)?;
                Ok(value)
            }
        }
    }

    fn shape_error(&self, horizon_given: usize, nb_scn_given: usize) -> AdqError {
        AdqError::Shape(format!(
            "input must be a number, a (horizon,) series, a (nb_scn, 1) column \
             or a (nb_scn, horizon) matrix: horizon specified is {} but actual \
             is {}, nb_scn specified is {} but actual is {}",
            self.horizon, horizon_given, self.nb_scn, nb_scn_given
        ))
    }
}

// Wire format is `{ "value": ... }` where the payload is a number, a
// one-dim array or a two-dim array depending on the variant.
impl Serialize for NumericValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut st = serializer.serialize_struct("NumericValue", 1)?;
        match self {
            NumericValue::Scalar(v) => st.serialize_field("value", v)?,
            NumericValue::Row(row) => st.serialize_field("value", row)?,
            NumericValue::Column(col) => {
                let rows: Vec<[f64; 1]> = col.iter().map(|&v| [v]).collect();
                st.serialize_field("value", &rows)?;
            }
            NumericValue::Matrix(m) => st.serialize_field("value", m)?,
        }
        st.end()
    }
}

#[derive(Deserialize)]
struct RawNumeric {
    value: RawShape,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawShape {
    Scalar(f64),
    Series(Vec<f64>),
    Table(Vec<Vec<f64>>),
}

impl<'de> Deserialize<'de> for NumericValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawNumeric::deserialize(deserializer)?;
        match raw.value {
            RawShape::Scalar(v) => Ok(NumericValue::Scalar(v)),
            RawShape::Series(row) => Ok(NumericValue::Row(row)),
            RawShape::Table(table) => {
                if table.is_empty() {
                    return Err(D::Error::custom("numeric table must not be empty"));
                }
                if table.iter().all(|row| row.len() == 1) {
                    Ok(NumericValue::Column(
                        table.into_iter().map(|row| row[0]).collect(),
                    ))
                } else {
                    Ok(NumericValue::Matrix(table))
                }
            }
        }
    }
}
