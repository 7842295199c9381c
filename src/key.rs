//! Table, field and key-value identifiers.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifier of one entity type's cache partition.
///
/// Case is preserved; `"User"` and `"user"` are distinct tables.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Table(Cow<'static, str>);

impl Table {
    /// Create a table identifier from a static name without allocating.
    pub const fn from_static(name: &'static str) -> Self {
        Table(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Table {
    fn from(name: &'static str) -> Self {
        Table::from_static(name)
    }
}

impl From<String> for Table {
    fn from(name: String) -> Self {
        Table(Cow::Owned(name))
    }
}

/// Name of a record attribute, used as key or filter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field(Cow<'static, str>);

impl Field {
    pub const fn from_static(name: &'static str) -> Self {
        Field(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Field {
    fn from(name: &'static str) -> Self {
        Field::from_static(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field(Cow::Owned(name))
    }
}

impl From<&Field> for Field {
    fn from(field: &Field) -> Self {
        field.clone()
    }
}

/// Scalar value of a record field.
///
/// Only scalars are representable, so a key value can never be a container.
/// Every integer width maps onto `Int`, so `1u32` and `1i64` are the same key.
/// Floats use ordinary equality, with `-0.0 == 0.0`. NaN is treated as one
/// value equal to itself so it can still be hashed and used as a key.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Char(char),
    Str(String),
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Float(a), FieldValue::Float(b)) => float_bits(*a) == float_bits(*b),
            (FieldValue::Char(a), FieldValue::Char(b)) => a == b,
            (FieldValue::Str(a), FieldValue::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for FieldValue {}

/// Canonical bits: one zero, one NaN.
fn float_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else if v.is_nan() {
        f64::NAN.to_bits()
    } else {
        v.to_bits()
    }
}

impl Hash for FieldValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            FieldValue::Null => {}
            FieldValue::Bool(v) => v.hash(state),
            FieldValue::Int(v) => v.hash(state),
            FieldValue::Float(v) => float_bits(*v).hash(state),
            FieldValue::Char(v) => v.hash(state),
            FieldValue::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("<nil>"),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Int(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Char(v) => write!(f, "{}", v),
            FieldValue::Str(v) => f.write_str(v),
        }
    }
}

macro_rules! int_field_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Int(v as i128)
                }
            }
        )*
    };
}

int_field_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::from(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(if v == 0.0 { 0.0 } else { v })
    }
}

impl From<char> for FieldValue {
    fn from(v: char) -> Self {
        FieldValue::Char(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Str(v)
    }
}

impl From<&String> for FieldValue {
    fn from(v: &String) -> Self {
        FieldValue::Str(v.clone())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
