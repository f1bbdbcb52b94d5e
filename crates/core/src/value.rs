//! Runtime values and the decode/encode value scope.
//!
//! A [`Value`] is the closed union of everything a parameter or
//! argument can hold; [`ParameterValue`] pairs the raw (on-the-wire)
//! and engineering (calibrated) forms; [`ValueMap`] is the
//! insertion-ordered scope that decode builds up and encode consumes.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A single telemetry or command value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer (two's-complement fields, enum raw values)
    Integer(i64),
    /// Unsigned integer (unsigned fields up to 64 bits)
    Unsigned(u64),
    /// IEEE 754 double (float fields, calibrated values, times)
    Float(f64),
    /// Boolean engineering value
    Boolean(bool),
    /// Character string
    String(String),
    /// Opaque byte sequence
    Bytes(Vec<u8>),
    /// Ordered array of homogeneous element values
    Array(Vec<Value>),
}

impl Value {
    /// Short kind name, used in wrong-value-kind errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Unsigned(_) => "unsigned",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
        }
    }

    /// The value as an i64, if it is integral and fits.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Integer(v) => Some(v),
            Value::Unsigned(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// The value as a u64, if it is integral and non-negative.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Integer(v) => u64::try_from(v).ok(),
            Value::Unsigned(v) => Some(v),
            _ => None,
        }
    }

    /// The value as an f64, for numeric kinds.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Integer(v) => Some(v as f64),
            Value::Unsigned(v) => Some(v as f64),
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    /// Numeric ordering across integer, unsigned, and float kinds.
    ///
    /// Integer/integer comparisons are exact (widened to i128);
    /// anything involving a float goes through f64. Non-numeric kinds
    /// compare as `None`.
    pub fn numeric_cmp(&self, other: &Value) -> Option<Ordering> {
        let lhs_int: Option<i128> = match *self {
            Value::Integer(v) => Some(v as i128),
            Value::Unsigned(v) => Some(v as i128),
            _ => None,
        };
        let rhs_int: Option<i128> = match *other {
            Value::Integer(v) => Some(v as i128),
            Value::Unsigned(v) => Some(v as i128),
            _ => None,
        };
        match (lhs_int, rhs_int) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Boolean(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Bytes(v) => {
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Array(v) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Parse a hex string (optionally `0x`-prefixed, whitespace allowed)
/// into bytes. Returns `None` on odd length or non-hex characters.
pub fn parse_hex(s: &str) -> Option<Vec<u8>> {
    let s: String = s
        .trim()
        .trim_start_matches("0x")
        .trim_start_matches("0X")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

/// The raw and engineering forms of one decoded field.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValue {
    /// Bit-exact decoded value, before calibration
    pub raw: Value,
    /// Value after calibration and type interpretation
    pub engineering: Value,
    /// Set when an enumerated type decoded a raw integer with no
    /// declared label; `engineering` then carries the raw integer
    pub unknown_enumeration: bool,
}

impl ParameterValue {
    /// Pair a distinct raw and engineering value.
    pub fn new(raw: Value, engineering: Value) -> Self {
        Self {
            raw,
            engineering,
            unknown_enumeration: false,
        }
    }

    /// Raw and engineering forms coincide (no calibration).
    pub fn identity(value: Value) -> Self {
        Self {
            raw: value.clone(),
            engineering: value,
            unknown_enumeration: false,
        }
    }
}

/// Insertion-ordered mapping from qualified parameter (or argument)
/// name to its value pair.
///
/// Decode returns one of these with entries in decoded order; encode
/// takes one as input, reading engineering values and auto-populating
/// any parameters implied by restriction criteria.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    order: Vec<String>,
    entries: HashMap<String, ParameterValue>,
}

impl ValueMap {
    /// Create an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an engineering value by name (raw form mirrors it until an
    /// encode pass computes the true raw). This is the entry point for
    /// callers building an encode request.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.insert(name.into(), ParameterValue::identity(value));
    }

    /// Insert a full raw/engineering pair, replacing any previous
    /// entry but keeping its original position in the ordering.
    pub fn insert(&mut self, name: String, value: ParameterValue) {
        if !self.entries.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.entries.insert(name, value);
    }

    /// Look up a value pair by qualified name.
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.entries.get(name)
    }

    /// Look up the calibrated or raw half of an entry.
    pub fn value(&self, name: &str, use_calibrated: bool) -> Option<&Value> {
        self.entries.get(name).map(|pv| {
            if use_calibrated {
                &pv.engineering
            } else {
                &pv.raw
            }
        })
    }

    /// Whether the scope holds a value for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> {
        self.order
            .iter()
            .map(move |name| (name.as_str(), &self.entries[name]))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the scope is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
