//! Parameter and argument types.
//!
//! A [`ParameterType`] pairs a wire encoding with its interpretation:
//! calibration, valid ranges, enumeration labels, boolean truth
//! strings, epoch scaling, array element typing. Argument types are
//! the same closed union; commands simply reference them from their
//! argument lists.
//!
//! Every variant implements the same three operations:
//! - `decode`: bits to a raw/engineering value pair
//! - `encode`: an engineering value back to bits, returning the raw
//!   form it produced
//! - `parse_literal`: parse a comparison value string the way this
//!   type reads it

use crate::bitio::{BitReader, BitWriter};
use crate::calibrate::PolynomialCalibrator;
use crate::encoding::{BinaryEncoding, DataEncoding, IntegerEncoding, Signedness, StringEncoding};
use crate::error::{DecodeError, EncodeError, Result, SchemaError};
use crate::schema::Schema;
use crate::value::{parse_hex, ParameterValue, Value, ValueMap};

/// Inclusive engineering or raw bounds on a type's values.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
    /// True: the range constrains the calibrated value.
    /// False: it constrains the raw wire value.
    pub applies_to_calibrated: bool,
}

impl ValidRange {
    fn check(&self, value: f64) -> Result<()> {
        if value < self.min || value > self.max {
            return Err(EncodeError::ValueOutOfRange {
                value,
                min: self.min,
                max: self.max,
            }
            .into());
        }
        Ok(())
    }

    /// The range as a raw-domain filter for calibration inversion,
    /// when it applies to raw values.
    fn raw_bounds(range: &Option<ValidRange>) -> Option<(f64, f64)> {
        range
            .as_ref()
            .filter(|r| !r.applies_to_calibrated)
            .map(|r| (r.min, r.max))
    }
}

/// One label of an enumerated type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumerationLabel {
    pub value: i64,
    pub label: String,
}

/// Array dimension: a literal length, or the name of an integer
/// parameter decoded earlier in the packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayDimension {
    Fixed(usize),
    Parameter(String),
}

/// The closed family of parameter/argument types.
///
/// Anything the XTCE document declares outside this family is rejected
/// or skipped at load; the codec never dispatches on open-ended type
/// objects.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    Integer {
        encoding: IntegerEncoding,
        calibrator: Option<PolynomialCalibrator>,
        valid_range: Option<ValidRange>,
    },
    /// Engineering float; the wire form may be a float or a raw
    /// integer mapped through the calibrator.
    Float {
        encoding: DataEncoding,
        calibrator: Option<PolynomialCalibrator>,
        valid_range: Option<ValidRange>,
    },
    Enumerated {
        encoding: IntegerEncoding,
        labels: Vec<EnumerationLabel>,
    },
    Boolean {
        encoding: IntegerEncoding,
        zero_string: String,
        one_string: String,
    },
    String {
        encoding: StringEncoding,
    },
    Binary {
        encoding: BinaryEncoding,
    },
    /// Seconds since `epoch`, carried as an unsigned 32-bit integer
    /// scaled by `offset + scale * raw`.
    AbsoluteTime {
        epoch: String,
        offset: f64,
        scale: f64,
    },
    Array {
        element_type_ref: String,
        dimension: ArrayDimension,
    },
}

/// The fixed wire encoding of absolute-time values.
fn absolute_time_encoding() -> IntegerEncoding {
    IntegerEncoding {
        size_in_bits: 32,
        signedness: Signedness::Unsigned,
    }
}

impl ParameterType {
    /// Decode one value at the reader's cursor into its raw and
    /// engineering forms.
    pub fn decode(
        &self,
        reader: &mut BitReader,
        scope: &ValueMap,
        schema: &Schema,
    ) -> Result<ParameterValue> {
        match self {
            ParameterType::Integer {
                encoding,
                calibrator,
                ..
            } => {
                let raw = encoding.decode(reader)?;
                let engineering = match calibrator {
                    Some(cal) => Value::Float(cal.calibrate(raw.as_f64().unwrap_or(0.0))),
                    None => raw.clone(),
                };
                Ok(ParameterValue::new(raw, engineering))
            }
            ParameterType::Float {
                encoding,
                calibrator,
                ..
            } => {
                let raw = encoding.decode(reader, scope)?;
                let engineering = match calibrator {
                    Some(cal) => Value::Float(cal.calibrate(raw.as_f64().unwrap_or(0.0))),
                    None => Value::Float(raw.as_f64().unwrap_or(0.0)),
                };
                Ok(ParameterValue::new(raw, engineering))
            }
            ParameterType::Enumerated { encoding, labels } => {
                let raw = encoding.decode(reader)?;
                let looked_up = raw
                    .as_i64()
                    .and_then(|v| labels.iter().find(|l| l.value == v));
                match looked_up {
                    Some(label) => Ok(ParameterValue::new(
                        raw,
                        Value::String(label.label.clone()),
                    )),
                    None => {
                        let mut pv = ParameterValue::identity(raw);
                        pv.unknown_enumeration = true;
                        Ok(pv)
                    }
                }
            }
            ParameterType::Boolean {
                encoding,
                zero_string,
                one_string,
            } => {
                let raw = encoding.decode(reader)?;
                let truthy = raw.as_u64().map(|v| v != 0).unwrap_or(true);
                let engineering = Value::String(if truthy {
                    one_string.clone()
                } else {
                    zero_string.clone()
                });
                Ok(ParameterValue::new(raw, engineering))
            }
            ParameterType::String { encoding } => {
                Ok(ParameterValue::identity(encoding.decode(reader, scope)?))
            }
            ParameterType::Binary { encoding } => {
                Ok(ParameterValue::identity(encoding.decode(reader, scope)?))
            }
            ParameterType::AbsoluteTime { offset, scale, .. } => {
                let raw = absolute_time_encoding().decode(reader)?;
                let engineering = if *offset == 0.0 && *scale == 1.0 {
                    raw.clone()
                } else {
                    Value::Float(offset + scale * raw.as_f64().unwrap_or(0.0))
                };
                Ok(ParameterValue::new(raw, engineering))
            }
            ParameterType::Array {
                element_type_ref,
                dimension,
            } => {
                let element = schema
                    .parameter_type(element_type_ref)
                    .ok_or_else(|| SchemaError::UnknownType(element_type_ref.clone()))?;
                let length = self.resolve_dimension(dimension, scope)?;
                let mut raws = Vec::with_capacity(length);
                let mut engs = Vec::with_capacity(length);
                for _ in 0..length {
                    let pv = element.decode(reader, scope, schema)?;
                    raws.push(pv.raw);
                    engs.push(pv.engineering);
                }
                Ok(ParameterValue::new(Value::Array(raws), Value::Array(engs)))
            }
        }
    }

    /// Encode one engineering value at the writer's cursor.
    ///
    /// Returns the raw value that was written, so callers can keep
    /// the scope's raw side accurate for later comparisons and
    /// dynamic sizes.
    pub fn encode(
        &self,
        writer: &mut BitWriter,
        engineering: &Value,
        scope: &ValueMap,
        schema: &Schema,
    ) -> Result<Value> {
        match self {
            ParameterType::Integer {
                encoding,
                calibrator,
                valid_range,
            } => {
                if let Some(range) = valid_range.as_ref().filter(|r| r.applies_to_calibrated) {
                    range.check(numeric(engineering)?)?;
                }
                let raw = match calibrator {
                    Some(cal) => {
                        let y = numeric(engineering)?;
                        let x = cal
                            .uncalibrate(y, ValidRange::raw_bounds(valid_range))
                            .map_err(EncodeError::Calibration)?;
                        integer_raw(x, encoding.signedness)
                    }
                    None => match engineering {
                        Value::Integer(_) | Value::Unsigned(_) => engineering.clone(),
                        other => {
                            return Err(EncodeError::WrongValueKind {
                                expected: "integer",
                                found: other.kind(),
                            }
                            .into())
                        }
                    },
                };
                if let Some(range) = valid_range.as_ref().filter(|r| !r.applies_to_calibrated) {
                    range.check(numeric(&raw)?)?;
                }
                encoding.encode(writer, &raw)?;
                Ok(raw)
            }
            ParameterType::Float {
                encoding,
                calibrator,
                valid_range,
            } => {
                let y = numeric(engineering)?;
                if let Some(range) = valid_range.as_ref().filter(|r| r.applies_to_calibrated) {
                    range.check(y)?;
                }
                let x = match calibrator {
                    Some(cal) => cal
                        .uncalibrate(y, ValidRange::raw_bounds(valid_range))
                        .map_err(EncodeError::Calibration)?,
                    None => y,
                };
                let raw = match encoding {
                    DataEncoding::Integer(int_enc) => integer_raw(x, int_enc.signedness),
                    _ => Value::Float(x),
                };
                if let Some(range) = valid_range.as_ref().filter(|r| !r.applies_to_calibrated) {
                    range.check(numeric(&raw)?)?;
                }
                encoding.encode(writer, &raw, scope)?;
                Ok(raw)
            }
            ParameterType::Enumerated { encoding, labels } => {
                let raw = match engineering {
                    Value::String(label) => {
                        let found = labels.iter().find(|l| &l.label == label).ok_or_else(|| {
                            EncodeError::UnknownEnumLabel {
                                label: label.clone(),
                            }
                        })?;
                        Value::Integer(found.value)
                    }
                    Value::Integer(_) | Value::Unsigned(_) => engineering.clone(),
                    other => {
                        return Err(EncodeError::WrongValueKind {
                            expected: "enumeration label or integer",
                            found: other.kind(),
                        }
                        .into())
                    }
                };
                encoding.encode(writer, &raw)?;
                Ok(raw)
            }
            ParameterType::Boolean {
                encoding,
                zero_string,
                one_string,
            } => {
                let truthy = match engineering {
                    Value::String(s) if s == one_string => true,
                    Value::String(s) if s == zero_string => false,
                    Value::String(s) => {
                        return Err(EncodeError::UnknownBooleanString { value: s.clone() }.into())
                    }
                    Value::Boolean(b) => *b,
                    other => {
                        return Err(EncodeError::WrongValueKind {
                            expected: "boolean string",
                            found: other.kind(),
                        }
                        .into())
                    }
                };
                let raw = Value::Unsigned(truthy as u64);
                encoding.encode(writer, &raw)?;
                Ok(raw)
            }
            ParameterType::String { encoding } => {
                encoding.encode(writer, engineering, scope)?;
                Ok(engineering.clone())
            }
            ParameterType::Binary { encoding } => {
                encoding.encode(writer, engineering, scope)?;
                Ok(engineering.clone())
            }
            ParameterType::AbsoluteTime { offset, scale, .. } => {
                let seconds = numeric(engineering)?;
                let x = ((seconds - offset) / scale).round();
                if !(0.0..=u32::MAX as f64).contains(&x) {
                    return Err(EncodeError::ValueOutOfRange {
                        value: x,
                        min: 0.0,
                        max: u32::MAX as f64,
                    }
                    .into());
                }
                let raw = Value::Unsigned(x as u64);
                absolute_time_encoding().encode(writer, &raw)?;
                Ok(raw)
            }
            ParameterType::Array {
                element_type_ref,
                dimension,
            } => {
                let element = schema
                    .parameter_type(element_type_ref)
                    .ok_or_else(|| SchemaError::UnknownType(element_type_ref.clone()))?;
                let items = match engineering {
                    Value::Array(items) => items,
                    other => {
                        return Err(EncodeError::WrongValueKind {
                            expected: "array",
                            found: other.kind(),
                        }
                        .into())
                    }
                };
                let length = self.resolve_dimension(dimension, scope)?;
                if items.len() != length {
                    return Err(EncodeError::ArrayLengthMismatch {
                        expected: length,
                        actual: items.len(),
                    }
                    .into());
                }
                let mut raws = Vec::with_capacity(items.len());
                for item in items {
                    raws.push(element.encode(writer, item, scope, schema)?);
                }
                Ok(Value::Array(raws))
            }
        }
    }

    /// Parse a comparison value string the way this type reads
    /// literals. Returns `None` when the string has no meaning for
    /// the type (callers turn that into a schema error at load).
    pub fn parse_literal(&self, s: &str) -> Option<Value> {
        match self {
            ParameterType::Integer { .. } => s
                .parse::<i64>()
                .map(Value::Integer)
                .or_else(|_| s.parse::<u64>().map(Value::Unsigned))
                .ok()
                .or_else(|| s.parse::<f64>().map(Value::Float).ok()),
            ParameterType::Float { .. } | ParameterType::AbsoluteTime { .. } => {
                s.parse::<f64>().map(Value::Float).ok()
            }
            ParameterType::Enumerated { labels, .. } => labels
                .iter()
                .find(|l| l.label == s)
                .map(|l| Value::Integer(l.value))
                .or_else(|| s.parse::<i64>().map(Value::Integer).ok()),
            ParameterType::Boolean {
                zero_string,
                one_string,
                ..
            } => {
                if s == one_string {
                    Some(Value::Boolean(true))
                } else if s == zero_string {
                    Some(Value::Boolean(false))
                } else {
                    None
                }
            }
            ParameterType::String { .. } => Some(Value::String(s.to_string())),
            ParameterType::Binary { .. } => parse_hex(s).map(Value::Bytes),
            ParameterType::Array { .. } => None,
        }
    }

    /// Map a scope value of this enumerated type onto its integer
    /// domain (labels resolve through the declared list).
    pub fn enum_value_of(&self, value: &Value) -> Option<i64> {
        match self {
            ParameterType::Enumerated { labels, .. } => match value {
                Value::String(label) => {
                    labels.iter().find(|l| &l.label == label).map(|l| l.value)
                }
                _ => value.as_i64(),
            },
            _ => None,
        }
    }

    /// Map a scope value of this boolean type onto true/false.
    pub fn boolean_of(&self, value: &Value) -> Option<bool> {
        match self {
            ParameterType::Boolean {
                zero_string,
                one_string,
                ..
            } => match value {
                Value::Boolean(b) => Some(*b),
                Value::String(s) if s == one_string => Some(true),
                Value::String(s) if s == zero_string => Some(false),
                Value::String(_) => None,
                _ => value.as_u64().map(|v| v != 0),
            },
            _ => None,
        }
    }

    /// True for types whose comparisons are numeric orderings; the
    /// rest admit equality/inequality only.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ParameterType::Integer { .. }
                | ParameterType::Float { .. }
                | ParameterType::AbsoluteTime { .. }
        )
    }

    fn resolve_dimension(&self, dimension: &ArrayDimension, scope: &ValueMap) -> Result<usize> {
        match dimension {
            ArrayDimension::Fixed(n) => Ok(*n),
            ArrayDimension::Parameter(name) => {
                let value = scope.value(name, true).ok_or_else(|| {
                    DecodeError::BadDynamicSize {
                        parameter: name.clone(),
                    }
                })?;
                value
                    .as_u64()
                    .map(|v| v as usize)
                    .ok_or_else(|| {
                        DecodeError::BadDynamicSize {
                            parameter: name.clone(),
                        }
                        .into()
                    })
            }
        }
    }
}

/// Numeric view of an engineering value, or a wrong-kind error.
fn numeric(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        EncodeError::WrongValueKind {
            expected: "numeric",
            found: value.kind(),
        }
        .into()
    })
}

/// Round an inverse-calibrated raw to the integer value the encoding
/// will carry.
fn integer_raw(x: f64, signedness: Signedness) -> Value {
    let rounded = x.round();
    match signedness {
        Signedness::Unsigned if rounded >= 0.0 => Value::Unsigned(rounded as u64),
        _ => Value::Integer(rounded as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibrate::PolynomialTerm;
    use crate::schema::Schema;

    fn empty_schema() -> Schema {
        Schema::empty()
    }

    fn u16_type() -> ParameterType {
        ParameterType::Integer {
            encoding: IntegerEncoding {
                size_in_bits: 16,
                signedness: Signedness::Unsigned,
            },
            calibrator: None,
            valid_range: None,
        }
    }

    #[test]
    fn test_integer_round_trip() {
        let ty = u16_type();
        let schema = empty_schema();
        let scope = ValueMap::new();

        let mut writer = BitWriter::new();
        ty.encode(&mut writer, &Value::Unsigned(0x1234), &scope, &schema)
            .unwrap();
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0x12, 0x34]);

        let mut reader = BitReader::new(&bytes);
        let pv = ty.decode(&mut reader, &scope, &schema).unwrap();
        assert_eq!(pv.engineering, Value::Unsigned(0x1234));
    }

    #[test]
    fn test_integer_calibrated_round_trip() {
        // p(x) = 1 + 2x; engineering 5.0 <-> raw 2
        let ty = ParameterType::Integer {
            encoding: IntegerEncoding {
                size_in_bits: 16,
                signedness: Signedness::Unsigned,
            },
            calibrator: Some(PolynomialCalibrator::new(&[
                PolynomialTerm {
                    coefficient: 1.0,
                    exponent: 0,
                },
                PolynomialTerm {
                    coefficient: 2.0,
                    exponent: 1,
                },
            ])),
            valid_range: None,
        };
        let schema = empty_schema();
        let scope = ValueMap::new();

        let mut writer = BitWriter::new();
        let raw = ty
            .encode(&mut writer, &Value::Float(5.0), &scope, &schema)
            .unwrap();
        assert_eq!(raw, Value::Unsigned(2));
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0x00, 0x02]);

        let mut reader = BitReader::new(&bytes);
        let pv = ty.decode(&mut reader, &scope, &schema).unwrap();
        assert_eq!(pv.raw, Value::Unsigned(2));
        assert_eq!(pv.engineering, Value::Float(5.0));
    }

    #[test]
    fn test_integer_float_without_calibrator_fails() {
        let ty = u16_type();
        let mut writer = BitWriter::new();
        let err = ty.encode(
            &mut writer,
            &Value::Float(1.5),
            &ValueMap::new(),
            &empty_schema(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_calibrated_range_check() {
        let ty = ParameterType::Integer {
            encoding: IntegerEncoding {
                size_in_bits: 8,
                signedness: Signedness::Unsigned,
            },
            calibrator: None,
            valid_range: Some(ValidRange {
                min: 0.0,
                max: 100.0,
                applies_to_calibrated: true,
            }),
        };
        let mut writer = BitWriter::new();
        let err = ty.encode(
            &mut writer,
            &Value::Unsigned(101),
            &ValueMap::new(),
            &empty_schema(),
        );
        assert!(matches!(
            err,
            Err(crate::error::Error::Encode(
                EncodeError::ValueOutOfRange { .. }
            ))
        ));
    }

    #[test]
    fn test_enumerated_decode_and_encode() {
        let ty = ParameterType::Enumerated {
            encoding: IntegerEncoding {
                size_in_bits: 8,
                signedness: Signedness::Unsigned,
            },
            labels: vec![
                EnumerationLabel {
                    value: 0,
                    label: "SAFE".into(),
                },
                EnumerationLabel {
                    value: 1,
                    label: "NOMINAL".into(),
                },
            ],
        };
        let schema = empty_schema();
        let scope = ValueMap::new();

        let mut reader = BitReader::new(&[0x01]);
        let pv = ty.decode(&mut reader, &scope, &schema).unwrap();
        assert_eq!(pv.engineering, Value::String("NOMINAL".into()));
        assert!(!pv.unknown_enumeration);

        // Unknown raw value passes through with the flag set
        let mut reader = BitReader::new(&[0x07]);
        let pv = ty.decode(&mut reader, &scope, &schema).unwrap();
        assert_eq!(pv.engineering, Value::Unsigned(7));
        assert!(pv.unknown_enumeration);

        // Encode by label and by integer
        let mut writer = BitWriter::new();
        ty.encode(&mut writer, &Value::String("SAFE".into()), &scope, &schema)
            .unwrap();
        ty.encode(&mut writer, &Value::Integer(1), &scope, &schema)
            .unwrap();
        assert_eq!(writer.finish(), vec![0x00, 0x01]);

        // Unknown label fails
        let mut writer = BitWriter::new();
        assert!(ty
            .encode(&mut writer, &Value::String("BOGUS".into()), &scope, &schema)
            .is_err());
    }

    #[test]
    fn test_boolean_strings() {
        let ty = ParameterType::Boolean {
            encoding: IntegerEncoding {
                size_in_bits: 1,
                signedness: Signedness::Unsigned,
            },
            zero_string: "DISABLED".into(),
            one_string: "ENABLED".into(),
        };
        let schema = empty_schema();
        let scope = ValueMap::new();

        let mut reader = BitReader::new(&[0b1000_0000]);
        let pv = ty.decode(&mut reader, &scope, &schema).unwrap();
        assert_eq!(pv.engineering, Value::String("ENABLED".into()));

        let mut writer = BitWriter::new();
        ty.encode(
            &mut writer,
            &Value::String("DISABLED".into()),
            &scope,
            &schema,
        )
        .unwrap();
        assert_eq!(writer.finish(), vec![0b0000_0000]);

        // Case-sensitive to the declared strings
        let mut writer = BitWriter::new();
        assert!(ty
            .encode(
                &mut writer,
                &Value::String("disabled".into()),
                &scope,
                &schema
            )
            .is_err());
    }

    #[test]
    fn test_absolute_time_scaling() {
        let ty = ParameterType::AbsoluteTime {
            epoch: "2000-01-01T00:00:00Z".into(),
            offset: 10.0,
            scale: 2.0,
        };
        let schema = empty_schema();
        let scope = ValueMap::new();

        let mut writer = BitWriter::new();
        let raw = ty
            .encode(&mut writer, &Value::Float(30.0), &scope, &schema)
            .unwrap();
        assert_eq!(raw, Value::Unsigned(10));

        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        let pv = ty.decode(&mut reader, &scope, &schema).unwrap();
        assert_eq!(pv.engineering, Value::Float(30.0));
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(u16_type().parse_literal("42"), Some(Value::Integer(42)));

        let enum_ty = ParameterType::Enumerated {
            encoding: IntegerEncoding {
                size_in_bits: 8,
                signedness: Signedness::Unsigned,
            },
            labels: vec![EnumerationLabel {
                value: 3,
                label: "ON".into(),
            }],
        };
        assert_eq!(enum_ty.parse_literal("ON"), Some(Value::Integer(3)));
        assert_eq!(enum_ty.parse_literal("3"), Some(Value::Integer(3)));
        assert_eq!(enum_ty.parse_literal("OFF"), None);
    }
}
