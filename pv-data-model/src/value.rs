use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Element type of a process variable.
///
/// Numeric element types are always sequence valued, even for logically
/// scalar variables, so every value goes over the wire the same way.
#[derive(Debug, PartialEq, Copy, Clone, Hash, PartialOrd, Eq, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int,
    Double,
    Char,
    String,
    Enum,
}

impl ElementType {
    pub const ALL: [ElementType; 5] = [
        ElementType::Int,
        ElementType::Double,
        ElementType::Char,
        ElementType::String,
        ElementType::Enum,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ElementType::Int => "int",
            ElementType::Double => "double",
            ElementType::Char => "char",
            ElementType::String => "string",
            ElementType::Enum => "enum",
        }
    }

    pub fn kind(self) -> Kind {
        match self {
            ElementType::Int | ElementType::Double | ElementType::Char => Kind::Scalar,
            ElementType::String | ElementType::Enum => Kind::EnumString,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown element type `{0}`")]
pub struct UnknownElementType(pub String);

impl FromStr for ElementType {
    type Err = UnknownElementType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| UnknownElementType(s.to_string()))
    }
}

/// Whether a variable carries numbers/bytes or a fixed string.
#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq, Default, Serialize, Deserialize)]
pub enum Kind {
    #[default]
    Scalar,
    EnumString,
}

#[derive(Debug, PartialEq, Copy, Clone, Hash, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl Access {
    pub fn is_writable(self) -> bool {
        matches!(self, Access::ReadWrite)
    }
}

/// Current value of a process variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    Int(Vec<i64>),
    Double(Vec<f64>),
    Char(Vec<u8>),
    String(String),
    Enum(String),
}

impl Value {
    /// Value a freshly declared variable of type `element_type` starts with.
    pub fn default_for(element_type: ElementType) -> Value {
        match element_type {
            ElementType::Int => Value::Int(vec![0]),
            ElementType::Double => Value::Double(vec![0.0]),
            ElementType::Char => Value::Char(Vec::new()),
            ElementType::String => Value::String(String::new()),
            ElementType::Enum => Value::Enum(String::new()),
        }
    }

    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Int(_) => ElementType::Int,
            Value::Double(_) => ElementType::Double,
            Value::Char(_) => ElementType::Char,
            Value::String(_) => ElementType::String,
            Value::Enum(_) => ElementType::Enum,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value to `target` where no information is lost.
    ///
    /// Integers widen to doubles when every element is exactly representable
    /// and narrow to chars when every element fits in a byte; strings and
    /// enum strings are interchangeable.
    pub fn coerce(self, target: ElementType) -> Option<Value> {
        match (self, target) {
            (v, t) if v.element_type() == t => Some(v),
            (Value::Int(v), ElementType::Double) => v
                .into_iter()
                .map(|i| {
                    let d = i as f64;
                    // i128 so a saturating cast back cannot hide the rounding
                    (d as i128 == i128::from(i)).then_some(d)
                })
                .collect::<Option<Vec<_>>>()
                .map(Value::Double),
            (Value::Int(v), ElementType::Char) => v
                .into_iter()
                .map(|i| u8::try_from(i).ok())
                .collect::<Option<Vec<_>>>()
                .map(Value::Char),
            (Value::Char(v), ElementType::Int) => {
                Some(Value::Int(v.into_iter().map(i64::from).collect()))
            }
            (Value::String(s), ElementType::Enum) => Some(Value::Enum(s)),
            (Value::Enum(s), ElementType::String) => Some(Value::String(s)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{item}")?;
            }
            f.write_str("]")
        }

        match self {
            Value::Int(v) => list(f, v),
            Value::Double(v) => list(f, v),
            Value::Char(v) => list(f, v),
            Value::String(s) | Value::Enum(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Int(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Double(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Char(v)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}
