//! Load XTCE 1.3 documents into a [`SpaceSystem`] tree.
//!
//! Event-driven pull parser over quick-xml. The loader understands the
//! practical subset of the schema this codec executes; namespace
//! prefixes are ignored (elements are matched by local name) and
//! unknown or unsupported constructs — AggregateType, RelativeTime,
//! Alarms, Algorithms, Streams, Aliases, MessageSet, ServiceSet, and
//! anything else unrecognized — are skipped without error, which keeps
//! the loader forward compatible with richer documents.
//!
//! Accepted shapes, by element:
//! - `IntegerParameterType`/`IntegerArgumentType`: `IntegerDataEncoding`
//!   (`sizeInBits`, `encoding` of `unsigned`/`twosComplement`, optional
//!   `DefaultCalibrator/PolynomialCalibrator/Term*`), optional
//!   `ValidRange`/`ValidRangeSet`
//! - `FloatParameterType`: `FloatDataEncoding` (32/64) or a raw
//!   `IntegerDataEncoding` with calibration
//! - `EnumeratedParameterType`: `EnumerationList/Enumeration*`
//! - `BooleanParameterType`: `zeroStringValue`/`oneStringValue`
//! - `StringParameterType`: `StringDataEncoding` with
//!   `SizeInBits/Fixed/FixedValue`, `SizeInBits/TerminationChar`, or
//!   `SizeInBits/DynamicValue[sizeInBitsIsOf]/ParameterInstanceRef`
//! - `BinaryParameterType`: `BinaryDataEncoding` with fixed or dynamic
//!   `SizeInBits`
//! - `AbsoluteTimeParameterType`: `ReferenceTime/Epoch` plus
//!   `Encoding[scale, offset]`
//! - `ArrayParameterType[arrayTypeRef]`: `DimensionList/Size` with a
//!   `FixedValue` or `DynamicValue`
//! - `SequenceContainer`/`CommandContainer`: `EntryList` with
//!   parameter/argument/container/fixed-value entries, `BaseContainer`
//!   with `RestrictionCriteria`
//! - `MetaCommand`: `BaseMetaCommand`, `ArgumentList`,
//!   `CommandContainer`

use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::calibrate::{PolynomialCalibrator, PolynomialTerm};
use crate::compare::ComparisonOperator;
use crate::container::{EntryLocation, LocationReference};
use crate::encoding::{
    BinaryEncoding, BinarySizing, Charset, DataEncoding, FloatEncoding, IntegerEncoding,
    Signedness, SizeUnits, StringEncoding, StringSizing,
};
use crate::error::{LoadError, Result};
use crate::schema::{
    ArgumentDecl, ComparisonDecl, ContainerDecl, EntryDecl, MetaCommandDecl, ParameterDecl,
    SpaceSystem, TypeDecl,
};
use crate::types::{ArrayDimension, EnumerationLabel, ParameterType, ValidRange};
use crate::value::parse_hex;

type XmlReader<'a> = Reader<&'a [u8]>;

/// Parse an XTCE document from a string.
pub fn load_str(xml: &str) -> Result<SpaceSystem> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"SpaceSystem" => {
                let start = e.to_owned();
                return parse_space_system(&mut reader, &start);
            }
            Ok(Event::Eof) => {
                return Err(LoadError::Xml("document has no SpaceSystem element".into()).into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
}

/// Parse an XTCE document from a file.
pub fn load_file(path: impl AsRef<Path>) -> Result<SpaceSystem> {
    let xml = std::fs::read_to_string(path)?;
    load_str(&xml)
}

fn parse_space_system(reader: &mut XmlReader, start: &BytesStart) -> Result<SpaceSystem> {
    let name = attr_required(start, b"name")?;
    let mut system = SpaceSystem::new(name);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Header" => {
                    system.header = attr(e, b"date")?.or(attr(e, b"version")?);
                    skip_element(reader, "Header")?;
                }
                b"TelemetryMetaData" => parse_telemetry_meta(reader, &mut system)?,
                b"CommandMetaData" => parse_command_meta(reader, &mut system)?,
                b"SpaceSystem" => {
                    let start = e.to_owned();
                    system.children.push(parse_space_system(reader, &start)?);
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"Header" {
                    system.header = attr(e, b"date")?.or(attr(e, b"version")?);
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"SpaceSystem" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "SpaceSystem".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(system)
}

fn parse_telemetry_meta(reader: &mut XmlReader, system: &mut SpaceSystem) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"ParameterTypeSet" => {
                    parse_type_set(reader, "ParameterTypeSet", &mut system.parameter_types)?
                }
                b"ParameterSet" => parse_parameter_set(reader, &mut system.parameters)?,
                b"ContainerSet" => parse_container_set(reader, &mut system.containers)?,
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"TelemetryMetaData" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "TelemetryMetaData".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_command_meta(reader: &mut XmlReader, system: &mut SpaceSystem) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"ParameterTypeSet" => {
                    parse_type_set(reader, "ParameterTypeSet", &mut system.parameter_types)?
                }
                b"ArgumentTypeSet" => {
                    parse_type_set(reader, "ArgumentTypeSet", &mut system.argument_types)?
                }
                b"ParameterSet" => parse_parameter_set(reader, &mut system.parameters)?,
                b"MetaCommandSet" => parse_meta_command_set(reader, &mut system.meta_commands)?,
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"CommandMetaData" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "CommandMetaData".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// Shared parser for ParameterTypeSet and ArgumentTypeSet; the
/// per-type element names differ only in their suffix.
fn parse_type_set(reader: &mut XmlReader, set_name: &str, out: &mut Vec<TypeDecl>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let start = e.to_owned();
                match e.local_name().as_ref() {
                    b"IntegerParameterType" | b"IntegerArgumentType" => {
                        out.push(parse_integer_type(reader, &start)?)
                    }
                    b"FloatParameterType" | b"FloatArgumentType" => {
                        out.push(parse_float_type(reader, &start)?)
                    }
                    b"EnumeratedParameterType" | b"EnumeratedArgumentType" => {
                        out.push(parse_enumerated_type(reader, &start)?)
                    }
                    b"BooleanParameterType" | b"BooleanArgumentType" => {
                        out.push(parse_boolean_type(reader, &start)?)
                    }
                    b"StringParameterType" | b"StringArgumentType" => {
                        out.push(parse_string_type(reader, &start)?)
                    }
                    b"BinaryParameterType" | b"BinaryArgumentType" => {
                        out.push(parse_binary_type(reader, &start)?)
                    }
                    b"AbsoluteTimeParameterType" | b"AbsoluteTimeArgumentType" => {
                        out.push(parse_absolute_time_type(reader, &start)?)
                    }
                    b"ArrayParameterType" | b"ArrayArgumentType" => {
                        out.push(parse_array_type(reader, &start)?)
                    }
                    // AggregateType, RelativeTime and friends carry no
                    // runtime behavior here
                    other => {
                        let other = String::from_utf8_lossy(other).into_owned();
                        skip_element(reader, &other)?;
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"BooleanParameterType"
                    || e.local_name().as_ref() == b"BooleanArgumentType"
                {
                    out.push(boolean_type_from(e, TypeParts::default())?);
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == set_name.as_bytes() => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: set_name.into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// Children shared by the type elements, gathered in one pass.
#[derive(Default)]
struct TypeParts {
    unit: Option<String>,
    integer_encoding: Option<IntegerEncoding>,
    float_encoding: Option<FloatEncoding>,
    string_encoding: Option<StringEncoding>,
    binary_encoding: Option<BinaryEncoding>,
    calibrator: Option<PolynomialCalibrator>,
    valid_range: Option<ValidRange>,
    enumerations: Vec<EnumerationLabel>,
    epoch: Option<String>,
    scale: Option<f64>,
    offset: Option<f64>,
    dimension: Option<ArrayDimension>,
}

fn parse_type_parts(reader: &mut XmlReader, end_name: &[u8]) -> Result<TypeParts> {
    let mut parts = TypeParts::default();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let start = e.to_owned();
                match e.local_name().as_ref() {
                    b"UnitSet" => parts.unit = parse_unit_set(reader)?,
                    b"IntegerDataEncoding" => {
                        let (encoding, calibrator) =
                            parse_integer_encoding(reader, &start, false)?;
                        parts.integer_encoding = Some(encoding);
                        if calibrator.is_some() {
                            parts.calibrator = calibrator;
                        }
                    }
                    b"FloatDataEncoding" => {
                        parts.float_encoding = Some(FloatEncoding {
                            size_in_bits: attr_parse(&start, b"sizeInBits")?.unwrap_or(32),
                        });
                        // Calibrators may hang off float encodings too
                        let calibrator = parse_encoding_children(reader, b"FloatDataEncoding")?;
                        if calibrator.is_some() {
                            parts.calibrator = calibrator;
                        }
                    }
                    b"StringDataEncoding" => {
                        parts.string_encoding = Some(parse_string_encoding(reader, &start)?)
                    }
                    b"BinaryDataEncoding" => {
                        parts.binary_encoding = Some(parse_binary_encoding(reader)?)
                    }
                    b"EnumerationList" => parse_enumeration_list(reader, &mut parts.enumerations)?,
                    b"ValidRange" => {
                        parts.valid_range = Some(parse_valid_range(reader, &start, true)?)
                    }
                    b"ValidRangeSet" => {
                        parts.valid_range = Some(parse_valid_range_set(reader, &start)?)
                    }
                    b"ReferenceTime" => parts.epoch = parse_reference_time(reader)?,
                    b"Encoding" => {
                        parts.scale = attr_parse(&start, b"scale")?;
                        parts.offset = attr_parse(&start, b"offset")?;
                        skip_element(reader, "Encoding")?;
                    }
                    b"DimensionList" => parts.dimension = Some(parse_dimension_list(reader)?),
                    other => {
                        let other = String::from_utf8_lossy(other).into_owned();
                        skip_element(reader, &other)?;
                    }
                }
            }
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"IntegerDataEncoding" => {
                    let (encoding, _) = parse_integer_encoding(reader, e, true)?;
                    parts.integer_encoding = Some(encoding);
                }
                b"FloatDataEncoding" => {
                    parts.float_encoding = Some(FloatEncoding {
                        size_in_bits: attr_parse(e, b"sizeInBits")?.unwrap_or(32),
                    });
                }
                b"ValidRange" => parts.valid_range = Some(valid_range_from(e, true)?),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == end_name => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: String::from_utf8_lossy(end_name).into_owned(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(parts)
}

fn default_integer_encoding() -> IntegerEncoding {
    IntegerEncoding {
        size_in_bits: 8,
        signedness: Signedness::Unsigned,
    }
}

fn parse_integer_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::Integer {
            encoding: parts.integer_encoding.unwrap_or_else(default_integer_encoding),
            calibrator: parts.calibrator,
            valid_range: parts.valid_range,
        },
    })
}

fn parse_float_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    let encoding = match (parts.integer_encoding, parts.float_encoding) {
        (Some(int_enc), _) => DataEncoding::Integer(int_enc),
        (None, Some(float_enc)) => DataEncoding::Float(float_enc),
        (None, None) => DataEncoding::Float(FloatEncoding { size_in_bits: 32 }),
    };
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::Float {
            encoding,
            calibrator: parts.calibrator,
            valid_range: parts.valid_range,
        },
    })
}

fn parse_enumerated_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    if parts.enumerations.is_empty() {
        return Err(LoadError::MissingChild {
            element: name,
            child: "EnumerationList".into(),
        }
        .into());
    }
    let mut labels = parts.enumerations;
    // Duplicate labels would make encode-by-label ambiguous
    labels.sort_by(|a, b| a.label.cmp(&b.label));
    if labels.windows(2).any(|w| w[0].label == w[1].label) {
        return Err(LoadError::InvalidValue {
            element: name,
            value: "duplicate enumeration label".into(),
        }
        .into());
    }
    labels.sort_by_key(|l| l.value);
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::Enumerated {
            encoding: parts.integer_encoding.unwrap_or_else(default_integer_encoding),
            labels,
        },
    })
}

fn parse_boolean_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    boolean_type_from(start, parts)
}

fn boolean_type_from(start: &BytesStart, parts: TypeParts) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::Boolean {
            encoding: parts.integer_encoding.unwrap_or_else(default_integer_encoding),
            zero_string: attr(start, b"zeroStringValue")?.unwrap_or_else(|| "False".into()),
            one_string: attr(start, b"oneStringValue")?.unwrap_or_else(|| "True".into()),
        },
    })
}

fn parse_string_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    let encoding = parts.string_encoding.ok_or_else(|| LoadError::MissingChild {
        element: name.clone(),
        child: "StringDataEncoding".into(),
    })?;
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::String { encoding },
    })
}

fn parse_binary_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    let encoding = parts.binary_encoding.ok_or_else(|| LoadError::MissingChild {
        element: name.clone(),
        child: "BinaryDataEncoding".into(),
    })?;
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::Binary { encoding },
    })
}

fn parse_absolute_time_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::AbsoluteTime {
            epoch: parts.epoch.unwrap_or_default(),
            offset: parts.offset.unwrap_or(0.0),
            scale: parts.scale.unwrap_or(1.0),
        },
    })
}

fn parse_array_type(reader: &mut XmlReader, start: &BytesStart) -> Result<TypeDecl> {
    let name = attr_required(start, b"name")?;
    let element_type_ref = attr_required(start, b"arrayTypeRef")?;
    let parts = parse_type_parts(reader, start.local_name().as_ref())?;
    let dimension = parts.dimension.ok_or_else(|| LoadError::MissingChild {
        element: name.clone(),
        child: "DimensionList".into(),
    })?;
    Ok(TypeDecl {
        name,
        unit: parts.unit,
        kind: ParameterType::Array {
            element_type_ref,
            dimension,
        },
    })
}

fn parse_unit_set(reader: &mut XmlReader) -> Result<Option<String>> {
    let mut unit = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Unit" => {
                let text = read_text(reader, "Unit")?;
                if unit.is_none() && !text.trim().is_empty() {
                    unit = Some(text.trim().to_string());
                }
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"UnitSet" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "UnitSet".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(unit)
}

/// Parse an IntegerDataEncoding start tag; when `empty` the element
/// has no children to consume.
fn parse_integer_encoding(
    reader: &mut XmlReader,
    start: &BytesStart,
    empty: bool,
) -> Result<(IntegerEncoding, Option<PolynomialCalibrator>)> {
    let size_in_bits = attr_parse(start, b"sizeInBits")?.unwrap_or(8);
    let signedness = match attr(start, b"encoding")?.as_deref() {
        None | Some("unsigned") => Signedness::Unsigned,
        Some("twosComplement") => Signedness::TwosComplement,
        Some(other) => {
            return Err(LoadError::InvalidValue {
                element: "IntegerDataEncoding".into(),
                value: other.to_string(),
            }
            .into())
        }
    };
    let calibrator = if empty {
        None
    } else {
        parse_encoding_children(reader, b"IntegerDataEncoding")?
    };
    Ok((
        IntegerEncoding {
            size_in_bits,
            signedness,
        },
        calibrator,
    ))
}

/// Consume an encoding element's children, returning the default
/// calibrator if one is declared.
fn parse_encoding_children(
    reader: &mut XmlReader,
    end_name: &[u8],
) -> Result<Option<PolynomialCalibrator>> {
    let mut calibrator = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"DefaultCalibrator" => {
                    calibrator = parse_default_calibrator(reader)?;
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == end_name => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: String::from_utf8_lossy(end_name).into_owned(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(calibrator)
}

fn parse_default_calibrator(reader: &mut XmlReader) -> Result<Option<PolynomialCalibrator>> {
    let mut terms = Vec::new();
    let mut saw_polynomial = false;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"PolynomialCalibrator" => saw_polynomial = true,
                b"Term" => {
                    let start = e.to_owned();
                    terms.push(parse_term(&start)?);
                    skip_element(reader, "Term")?;
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"Term" => {
                terms.push(parse_term(e)?);
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"DefaultCalibrator" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "DefaultCalibrator".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    if saw_polynomial && !terms.is_empty() {
        Ok(Some(PolynomialCalibrator::new(&terms)))
    } else {
        Ok(None)
    }
}

fn parse_term(e: &BytesStart) -> Result<PolynomialTerm> {
    Ok(PolynomialTerm {
        coefficient: attr_parse(e, b"coefficient")?.ok_or_else(|| LoadError::MissingAttribute {
            element: "Term".into(),
            attribute: "coefficient".into(),
        })?,
        exponent: attr_parse(e, b"exponent")?.ok_or_else(|| LoadError::MissingAttribute {
            element: "Term".into(),
            attribute: "exponent".into(),
        })?,
    })
}

fn parse_charset(value: Option<String>) -> Result<Charset> {
    match value.as_deref() {
        None | Some("UTF-8") => Ok(Charset::Utf8),
        Some("UTF-16") | Some("UTF-16BE") => Ok(Charset::Utf16),
        Some("US-ASCII") => Ok(Charset::UsAscii),
        Some("ISO-8859-1") => Ok(Charset::Iso8859_1),
        Some("Windows-1252") => Ok(Charset::Windows1252),
        Some(other) => Err(LoadError::InvalidValue {
            element: "StringDataEncoding".into(),
            value: other.to_string(),
        }
        .into()),
    }
}

fn parse_string_encoding(reader: &mut XmlReader, start: &BytesStart) -> Result<StringEncoding> {
    let charset = parse_charset(attr(start, b"encoding")?)?;
    let mut sizing = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"SizeInBits" => sizing = Some(parse_string_sizing(reader)?),
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"StringDataEncoding" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "StringDataEncoding".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(StringEncoding {
        charset,
        sizing: sizing.ok_or_else(|| LoadError::MissingChild {
            element: "StringDataEncoding".into(),
            child: "SizeInBits".into(),
        })?,
    })
}

fn parse_string_sizing(reader: &mut XmlReader) -> Result<StringSizing> {
    let mut sizing = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Fixed" => {
                    let bits: u32 = parse_named_number(reader, "Fixed")?;
                    sizing = Some(StringSizing::Fixed { bits });
                }
                b"TerminationChar" => {
                    let text = read_text(reader, "TerminationChar")?;
                    let bytes = parse_hex(&text).ok_or_else(|| LoadError::InvalidValue {
                        element: "TerminationChar".into(),
                        value: text.clone(),
                    })?;
                    let terminator = *bytes.last().unwrap_or(&0);
                    sizing = Some(StringSizing::Terminated { terminator });
                }
                b"DynamicValue" => {
                    let units = match attr(e, b"sizeInBitsIsOf")?.as_deref() {
                        None | Some("stringData") => SizeUnits::Bits,
                        Some("stringLengthInCharacters") => SizeUnits::Characters,
                        Some(other) => {
                            return Err(LoadError::InvalidValue {
                                element: "DynamicValue".into(),
                                value: other.to_string(),
                            }
                            .into())
                        }
                    };
                    let size_ref = parse_dynamic_ref(reader)?;
                    sizing = Some(StringSizing::Dynamic { size_ref, units });
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"SizeInBits" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "SizeInBits".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    sizing.ok_or_else(|| {
        LoadError::MissingChild {
            element: "SizeInBits".into(),
            child: "Fixed | TerminationChar | DynamicValue".into(),
        }
        .into()
    })
}

fn parse_binary_encoding(reader: &mut XmlReader) -> Result<BinaryEncoding> {
    let mut sizing = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"SizeInBits" => sizing = Some(parse_binary_sizing(reader)?),
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"BinaryDataEncoding" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "BinaryDataEncoding".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(BinaryEncoding {
        sizing: sizing.ok_or_else(|| LoadError::MissingChild {
            element: "BinaryDataEncoding".into(),
            child: "SizeInBits".into(),
        })?,
    })
}

fn parse_binary_sizing(reader: &mut XmlReader) -> Result<BinarySizing> {
    let mut sizing = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"FixedValue" => {
                    let text = read_text(reader, "FixedValue")?;
                    let bits: u32 = parse_number(&text, "FixedValue")?;
                    sizing = Some(BinarySizing::Fixed { bits });
                }
                b"DynamicValue" => {
                    let size_ref = parse_dynamic_ref(reader)?;
                    sizing = Some(BinarySizing::Dynamic { size_ref });
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"SizeInBits" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "SizeInBits".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    sizing.ok_or_else(|| {
        LoadError::MissingChild {
            element: "SizeInBits".into(),
            child: "FixedValue | DynamicValue".into(),
        }
        .into()
    })
}

/// `<DynamicValue><ParameterInstanceRef parameterRef=".."/></DynamicValue>`
fn parse_dynamic_ref(reader: &mut XmlReader) -> Result<String> {
    let mut reference = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"ParameterInstanceRef" =>
            {
                reference = attr(e, b"parameterRef")?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"DynamicValue" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "DynamicValue".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    reference.ok_or_else(|| {
        LoadError::MissingChild {
            element: "DynamicValue".into(),
            child: "ParameterInstanceRef".into(),
        }
        .into()
    })
}

fn parse_enumeration_list(reader: &mut XmlReader, out: &mut Vec<EnumerationLabel>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Enumeration" =>
            {
                out.push(EnumerationLabel {
                    value: attr_parse(e, b"value")?.ok_or_else(|| {
                        LoadError::MissingAttribute {
                            element: "Enumeration".into(),
                            attribute: "value".into(),
                        }
                    })?,
                    label: attr_required(e, b"label")?,
                });
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"EnumerationList" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "EnumerationList".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn valid_range_from(e: &BytesStart, applies_to_calibrated: bool) -> Result<ValidRange> {
    Ok(ValidRange {
        min: attr_parse(e, b"minInclusive")?.unwrap_or(f64::NEG_INFINITY),
        max: attr_parse(e, b"maxInclusive")?.unwrap_or(f64::INFINITY),
        applies_to_calibrated: attr_parse(e, b"validRangeAppliesToCalibrated")?
            .unwrap_or(applies_to_calibrated),
    })
}

fn parse_valid_range(
    reader: &mut XmlReader,
    start: &BytesStart,
    applies_to_calibrated: bool,
) -> Result<ValidRange> {
    let range = valid_range_from(start, applies_to_calibrated)?;
    skip_element(reader, "ValidRange")?;
    Ok(range)
}

fn parse_valid_range_set(reader: &mut XmlReader, start: &BytesStart) -> Result<ValidRange> {
    let applies_to_calibrated =
        attr_parse(start, b"validRangeAppliesToCalibrated")?.unwrap_or(true);
    let mut range = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"ValidRange" => {
                range = Some(parse_valid_range(reader, e, applies_to_calibrated)?);
            }
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"ValidRange" => {
                range = Some(valid_range_from(e, applies_to_calibrated)?);
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ValidRangeSet" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ValidRangeSet".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    range.ok_or_else(|| {
        LoadError::MissingChild {
            element: "ValidRangeSet".into(),
            child: "ValidRange".into(),
        }
        .into()
    })
}

fn parse_reference_time(reader: &mut XmlReader) -> Result<Option<String>> {
    let mut epoch = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Epoch" => {
                epoch = Some(read_text(reader, "Epoch")?.trim().to_string());
            }
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ReferenceTime" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ReferenceTime".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(epoch)
}

/// `<DimensionList><Size>...</Size></DimensionList>` with a fixed or
/// dynamic size.
fn parse_dimension_list(reader: &mut XmlReader) -> Result<ArrayDimension> {
    let mut dimension = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"FixedValue" => {
                    let text = read_text(reader, "FixedValue")?;
                    let n: usize = parse_number(&text, "FixedValue")?;
                    dimension = Some(ArrayDimension::Fixed(n));
                }
                b"DynamicValue" => {
                    dimension = Some(ArrayDimension::Parameter(parse_dynamic_ref(reader)?));
                }
                // Size and Dimension wrappers fall through to their
                // children
                b"Size" | b"Dimension" => {}
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"DimensionList" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "DimensionList".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    dimension.ok_or_else(|| {
        LoadError::MissingChild {
            element: "DimensionList".into(),
            child: "FixedValue | DynamicValue".into(),
        }
        .into()
    })
}

fn parse_parameter_set(reader: &mut XmlReader, out: &mut Vec<ParameterDecl>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"Parameter" => {
                out.push(parameter_decl(e)?);
            }
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Parameter" => {
                out.push(parameter_decl(e)?);
                skip_element(reader, "Parameter")?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ParameterSet" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ParameterSet".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parameter_decl(e: &BytesStart) -> Result<ParameterDecl> {
    Ok(ParameterDecl {
        name: attr_required(e, b"name")?,
        type_ref: attr_required(e, b"parameterTypeRef")?,
    })
}

fn parse_container_set(reader: &mut XmlReader, out: &mut Vec<ContainerDecl>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"SequenceContainer" => {
                let start = e.to_owned();
                out.push(parse_container(reader, &start, "SequenceContainer")?);
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ContainerSet" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ContainerSet".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// Shared body for SequenceContainer and CommandContainer.
fn parse_container(
    reader: &mut XmlReader,
    start: &BytesStart,
    end_name: &str,
) -> Result<ContainerDecl> {
    let name = attr_required(start, b"name")?;
    let is_abstract = attr_parse(start, b"abstract")?.unwrap_or(false);
    let mut base_ref = None;
    let mut restriction = Vec::new();
    let mut entries = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"EntryList" => parse_entry_list(reader, &mut entries)?,
                b"BaseContainer" => {
                    base_ref = attr(e, b"containerRef")?;
                    restriction = parse_base_container(reader)?;
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"BaseContainer" => {
                base_ref = attr(e, b"containerRef")?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == end_name.as_bytes() => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: end_name.into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(ContainerDecl {
        name,
        is_abstract,
        base_ref,
        restriction,
        entries,
    })
}

fn parse_base_container(reader: &mut XmlReader) -> Result<Vec<ComparisonDecl>> {
    let mut restriction = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"RestrictionCriteria" => {
                restriction = parse_comparison_group(reader, "RestrictionCriteria")?;
            }
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"BaseContainer" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "BaseContainer".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(restriction)
}

/// Comparisons under RestrictionCriteria or IncludeCondition: either a
/// single `Comparison` or a `ComparisonList`.
fn parse_comparison_group(reader: &mut XmlReader, end_name: &str) -> Result<Vec<ComparisonDecl>> {
    let mut comparisons = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"Comparison" =>
            {
                comparisons.push(comparison_decl(e)?);
            }
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"ComparisonList" => {}
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == end_name.as_bytes() => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: end_name.into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(comparisons)
}

fn comparison_decl(e: &BytesStart) -> Result<ComparisonDecl> {
    let operator_text = attr(e, b"comparisonOperator")?.unwrap_or_else(|| "==".into());
    let operator = ComparisonOperator::parse(&operator_text).ok_or_else(|| {
        LoadError::InvalidValue {
            element: "Comparison".into(),
            value: operator_text,
        }
    })?;
    Ok(ComparisonDecl {
        parameter_ref: attr_required(e, b"parameterRef")?,
        operator,
        value: attr_required(e, b"value")?,
        use_calibrated: attr_parse(e, b"useCalibratedValue")?.unwrap_or(true),
    })
}

fn parse_entry_list(reader: &mut XmlReader, entries: &mut Vec<EntryDecl>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"ParameterRefEntry" => entries.push(EntryDecl::Parameter {
                    parameter_ref: attr_required(e, b"parameterRef")?,
                    location: None,
                }),
                b"ArgumentRefEntry" => entries.push(EntryDecl::Argument {
                    argument_ref: attr_required(e, b"argumentRef")?,
                }),
                b"ContainerRefEntry" => entries.push(EntryDecl::Container {
                    container_ref: attr_required(e, b"containerRef")?,
                    condition: Vec::new(),
                }),
                b"FixedValueEntry" => entries.push(fixed_value_entry(e)?),
                _ => {}
            },
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"ParameterRefEntry" => {
                    let parameter_ref = attr_required(e, b"parameterRef")?;
                    let location = parse_parameter_entry_children(reader)?;
                    entries.push(EntryDecl::Parameter {
                        parameter_ref,
                        location,
                    });
                }
                b"ArgumentRefEntry" => {
                    entries.push(EntryDecl::Argument {
                        argument_ref: attr_required(e, b"argumentRef")?,
                    });
                    skip_element(reader, "ArgumentRefEntry")?;
                }
                b"ContainerRefEntry" => {
                    let container_ref = attr_required(e, b"containerRef")?;
                    let condition = parse_container_entry_children(reader)?;
                    entries.push(EntryDecl::Container {
                        container_ref,
                        condition,
                    });
                }
                b"FixedValueEntry" => {
                    entries.push(fixed_value_entry(e)?);
                    skip_element(reader, "FixedValueEntry")?;
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"EntryList" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "EntryList".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn fixed_value_entry(e: &BytesStart) -> Result<EntryDecl> {
    let hex = attr_required(e, b"binaryValue")?;
    let bytes = parse_hex(&hex).ok_or_else(|| LoadError::InvalidValue {
        element: "FixedValueEntry".into(),
        value: hex,
    })?;
    let size_in_bits = attr_parse(e, b"sizeInBits")?
        .unwrap_or_else(|| bytes.len() as u32 * 8);
    Ok(EntryDecl::FixedValue {
        size_in_bits,
        bytes,
    })
}

/// ParameterRefEntry children: the optional explicit location.
fn parse_parameter_entry_children(reader: &mut XmlReader) -> Result<Option<EntryLocation>> {
    let mut location = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"LocationInContainerInBits" => {
                let reference = match attr(e, b"referenceLocation")?.as_deref() {
                    None | Some("previousEntry") => LocationReference::PreviousEntry,
                    Some("containerStart") => LocationReference::ContainerStart,
                    Some(other) => {
                        return Err(LoadError::InvalidValue {
                            element: "LocationInContainerInBits".into(),
                            value: other.to_string(),
                        }
                        .into())
                    }
                };
                let bit_offset = parse_named_number(reader, "LocationInContainerInBits")?;
                location = Some(EntryLocation {
                    reference,
                    bit_offset,
                });
            }
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ParameterRefEntry" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ParameterRefEntry".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(location)
}

/// ContainerRefEntry children: the optional include condition.
fn parse_container_entry_children(reader: &mut XmlReader) -> Result<Vec<ComparisonDecl>> {
    let mut condition = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"IncludeCondition" => {
                condition = parse_comparison_group(reader, "IncludeCondition")?;
            }
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ContainerRefEntry" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ContainerRefEntry".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(condition)
}

fn parse_meta_command_set(reader: &mut XmlReader, out: &mut Vec<MetaCommandDecl>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"MetaCommand" => {
                let start = e.to_owned();
                out.push(parse_meta_command(reader, &start)?);
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"MetaCommandSet" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "MetaCommandSet".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn parse_meta_command(reader: &mut XmlReader, start: &BytesStart) -> Result<MetaCommandDecl> {
    let name = attr_required(start, b"name")?;
    let is_abstract = attr_parse(start, b"abstract")?.unwrap_or(false);
    let mut base_ref = None;
    let mut arguments = Vec::new();
    let mut container = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"BaseMetaCommand" => {
                    base_ref = attr(e, b"metaCommandRef")?;
                    skip_element(reader, "BaseMetaCommand")?;
                }
                b"ArgumentList" => parse_argument_list(reader, &mut arguments)?,
                b"CommandContainer" => {
                    let start = e.to_owned();
                    container = Some(parse_container(reader, &start, "CommandContainer")?);
                }
                other => {
                    let other = String::from_utf8_lossy(other).into_owned();
                    skip_element(reader, &other)?;
                }
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"BaseMetaCommand" => {
                base_ref = attr(e, b"metaCommandRef")?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"MetaCommand" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "MetaCommand".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(MetaCommandDecl {
        name,
        is_abstract,
        base_ref,
        arguments,
        container,
    })
}

fn parse_argument_list(reader: &mut XmlReader, out: &mut Vec<ArgumentDecl>) -> Result<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"Argument" => {
                out.push(ArgumentDecl {
                    name: attr_required(e, b"name")?,
                    type_ref: attr_required(e, b"argumentTypeRef")?,
                });
            }
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"Argument" => {
                out.push(ArgumentDecl {
                    name: attr_required(e, b"name")?,
                    type_ref: attr_required(e, b"argumentTypeRef")?,
                });
                skip_element(reader, "Argument")?;
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == b"ArgumentList" => break,
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: "ArgumentList".into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

/// Read a `<X><FixedValue>n</FixedValue></X>`-style numeric wrapper
/// until `end_name` closes, returning the number.
fn parse_named_number<T: std::str::FromStr>(reader: &mut XmlReader, end_name: &str) -> Result<T> {
    let mut value = None;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.local_name().as_ref() == b"FixedValue" => {
                let text = read_text(reader, "FixedValue")?;
                value = Some(parse_number(&text, "FixedValue")?);
            }
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::Text(t)) => {
                // Bare text directly inside the wrapper
                let text = t
                    .unescape()
                    .map_err(|err| LoadError::Xml(err.to_string()))?;
                value = Some(parse_number(text.trim(), end_name)?);
            }
            Ok(Event::End(ref e)) if e.local_name().as_ref() == end_name.as_bytes() => break,
            Ok(Event::End(_)) => {}
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: end_name.into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
    value.ok_or_else(|| {
        LoadError::MissingChild {
            element: end_name.into(),
            child: "FixedValue".into(),
        }
        .into()
    })
}

fn read_text(reader: &mut XmlReader, element: &str) -> Result<String> {
    let mut text = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => {
                text.push_str(&t.unescape().map_err(|err| LoadError::Xml(err.to_string()))?)
            }
            Ok(Event::End(_)) => return Ok(text),
            Ok(Event::Start(ref e)) => {
                let other = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                skip_element(reader, &other)?;
            }
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: element.into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
}

fn skip_element(reader: &mut XmlReader, element: &str) -> Result<()> {
    let mut depth = 1usize;
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) => depth += 1,
            Ok(Event::End(_)) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Ok(Event::Eof) => {
                return Err(LoadError::UnexpectedEof {
                    element: element.into(),
                }
                .into())
            }
            Err(err) => return Err(LoadError::Xml(err.to_string()).into()),
            _ => {}
        }
        buf.clear();
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| LoadError::Xml(err.to_string()))?;
        if attribute.key.local_name().as_ref() == name {
            let value = attribute
                .unescape_value()
                .map_err(|err| LoadError::Xml(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr_required(e: &BytesStart, name: &[u8]) -> Result<String> {
    attr(e, name)?.ok_or_else(|| {
        LoadError::MissingAttribute {
            element: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            attribute: String::from_utf8_lossy(name).into_owned(),
        }
        .into()
    })
}

/// Parse an attribute through FromStr (numbers, booleans).
fn attr_parse<T: std::str::FromStr>(e: &BytesStart, name: &[u8]) -> Result<Option<T>> {
    match attr(e, name)? {
        Some(text) => {
            let element = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
            Ok(Some(parse_number(&text, &element)?))
        }
        None => Ok(None),
    }
}

fn parse_number<T: std::str::FromStr>(text: &str, element: &str) -> Result<T> {
    text.trim().parse().map_err(|_| {
        LoadError::InvalidValue {
            element: element.to_string(),
            value: text.to_string(),
        }
        .into()
    })
}
