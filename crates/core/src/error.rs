//! Error types for the XTCE codec.
//!
//! All operations return structured errors rather than panicking.
//! Each failure carries enough context (container, entry, parameter
//! names) to locate the offending bit of schema or packet.

use thiserror::Error;

/// Top-level error type for all operations in the system.
///
/// Each variant corresponds to a specific failure domain:
/// - Bit I/O: reading/writing bits from/to byte buffers
/// - Schema: dangling references, cycles, unsupported constructs
/// - Decode: packet does not match the schema
/// - Encode: provided values cannot be rendered into a packet
/// - Load: the XTCE XML document is malformed
#[derive(Debug, Error)]
pub enum Error {
    /// Bit I/O operation failed (e.g., reading past end of buffer)
    #[error("bit I/O error: {0}")]
    BitIo(#[from] BitIoError),

    /// Schema cross-referencing or validation error
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Packet decoding error
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Packet or command encoding error
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// XTCE document loading error
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bit-level I/O errors.
#[derive(Debug, Error)]
pub enum BitIoError {
    /// Attempted to read more bits than remain in the buffer
    #[error("insufficient bits: requested {requested}, available {available}")]
    InsufficientBits { requested: usize, available: usize },

    /// Invalid bit count (outside 1..=64 for word-sized accesses)
    #[error("invalid bit count: {0}")]
    InvalidBitCount(u32),

    /// Value does not fit in the declared field width
    #[error("value {value} does not fit in {bits} bits")]
    ValueOutOfRange { value: i128, bits: u32 },

    /// Byte-oriented access with a bit length that is not a multiple of 8
    #[error("bit length {bits} is not a whole number of bytes")]
    UnalignedLength { bits: usize },

    /// Seek target lies beyond the end of the readable buffer
    #[error("seek to bit {position} beyond end of stream ({limit} bits)")]
    SeekOutOfBounds { position: usize, limit: usize },
}

/// Schema cross-referencing and validation errors.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A type reference did not resolve
    #[error("unknown parameter or argument type: {0}")]
    UnknownType(String),

    /// A parameter reference did not resolve
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// A container reference did not resolve
    #[error("unknown container: {0}")]
    UnknownContainer(String),

    /// A meta-command reference did not resolve
    #[error("unknown meta-command: {0}")]
    UnknownCommand(String),

    /// An argument entry referenced a name not declared by the
    /// command chain in scope
    #[error("unknown argument: {0}")]
    UnknownArgument(String),

    /// Two schema objects share one name within a space system
    #[error("duplicate name in space system: {0}")]
    DuplicateName(String),

    /// A simple name matched objects in several space systems
    #[error("name {name} is ambiguous: {candidates:?}")]
    AmbiguousName {
        name: String,
        candidates: Vec<String>,
    },

    /// Base-container chain loops back on itself
    #[error("cyclic container inheritance through {0}")]
    CyclicInheritance(String),

    /// A comparison is not meaningful for the referenced parameter's
    /// type (e.g. ordering operators on an enumeration)
    #[error("comparison {operator} is not valid for parameter {parameter}")]
    InvalidComparison { parameter: String, operator: String },

    /// A comparison value string cannot be parsed by the referenced
    /// parameter's type
    #[error("comparison value {value:?} cannot be parsed for parameter {parameter}")]
    InvalidComparisonValue { parameter: String, value: String },

    /// A meta-command was asked to encode but declares no command
    /// container anywhere in its base chain
    #[error("meta-command {0} has no command container")]
    CommandWithoutContainer(String),

    /// An argument entry appeared while decoding a plain telemetry
    /// container (arguments only exist in command scope)
    #[error("argument entry {0} outside of command scope")]
    ArgumentOutsideCommand(String),
}

/// Packet decoding errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// FixedValueEntry bits did not match the declared constant
    #[error(
        "fixed value mismatch in {container} entry {entry_index}: expected {expected}, got {actual}"
    )]
    FixedValueMismatch {
        container: String,
        entry_index: usize,
        expected: String,
        actual: String,
    },

    /// More than one child container's restriction matched the
    /// decoded fields
    #[error("ambiguous child containers of {base}: {candidates:?}")]
    AmbiguousContainer {
        base: String,
        candidates: Vec<String>,
    },

    /// A restriction on the requested container's inheritance chain
    /// failed against the decoded fields
    #[error("restriction criteria violated for container {container}")]
    RestrictionViolated { container: String },

    /// String payload is not valid in the declared character set
    #[error("invalid {charset} data: {detail}")]
    BadCharset {
        charset: &'static str,
        detail: String,
    },

    /// Terminated string ran off the end of the packet without
    /// finding its terminator byte
    #[error("unterminated string: terminator {terminator:#04x} not found")]
    UnterminatedString { terminator: u8 },

    /// A dynamic size reference is not yet decoded, or holds a
    /// non-integer or negative value
    #[error("dynamic size parameter {parameter} holds no usable size")]
    BadDynamicSize { parameter: String },

    /// Failure while decoding one parameter, with packet position context
    #[error("decoding parameter {parameter} in container {container}")]
    Parameter {
        parameter: String,
        container: String,
        #[source]
        source: Box<Error>,
    },
}

/// Packet and command encoding errors.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The value map has no entry for a required parameter/argument
    #[error("missing value for {name}")]
    MissingValue { name: String },

    /// Value lies outside the declared valid range
    #[error("value {value} outside valid range [{min}, {max}]")]
    ValueOutOfRange { value: f64, min: f64, max: f64 },

    /// Enumeration label is not declared by the type
    #[error("unknown enumeration label {label:?}")]
    UnknownEnumLabel { label: String },

    /// Boolean string matches neither declared truth string
    #[error("unrecognized boolean string {value:?}")]
    UnknownBooleanString { value: String },

    /// Provided value has the wrong kind for the target type
    #[error("wrong value kind: expected {expected}, found {found}")]
    WrongValueKind {
        expected: &'static str,
        found: &'static str,
    },

    /// Array value length does not equal the declared dimension
    #[error("array length mismatch: declared {expected}, got {actual}")]
    ArrayLengthMismatch { expected: usize, actual: usize },

    /// Fixed-size string payload does not fill the declared size
    #[error("string length mismatch: field holds {expected} bytes, value is {actual}")]
    StringLengthMismatch { expected: usize, actual: usize },

    /// Binary payload does not match the declared or referenced size
    #[error("binary length mismatch: field holds {expected} bytes, value is {actual}")]
    BinaryLengthMismatch { expected: usize, actual: usize },

    /// A character in the value has no representation in the
    /// declared character set
    #[error("character {character:?} not representable in {charset}")]
    UnencodableCharacter {
        charset: &'static str,
        character: char,
    },

    /// Terminated string payload contains its own terminator byte
    #[error("string contains terminator byte {terminator:#04x}")]
    TerminatorInString { terminator: u8 },

    /// A restriction on the target container's chain is contradicted
    /// by the provided values
    #[error("restriction on container {container} unsatisfied for parameter {parameter}")]
    RestrictionUnsatisfied {
        container: String,
        parameter: String,
    },

    /// Calibration inverse failed
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// Failure while encoding one parameter, with context
    #[error("encoding value for {name}")]
    Parameter {
        name: String,
        #[source]
        source: Box<Error>,
    },
}

/// Numerical failures when inverting a calibrator.
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// The polynomial has no real root for the requested value
    #[error("no real root for engineering value {value}")]
    NoRealRoot { value: f64 },

    /// Real roots exist but none lies in the declared raw range
    #[error("no root in raw range [{min}, {max}] for engineering value {value}")]
    NoRootInRange { value: f64, min: f64, max: f64 },
}

/// XTCE XML document loading errors.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The underlying XML is not well-formed
    #[error("xml: {0}")]
    Xml(String),

    /// A required attribute is absent
    #[error("element {element} is missing attribute {attribute}")]
    MissingAttribute { element: String, attribute: String },

    /// A required child element is absent
    #[error("element {element} is missing child {child}")]
    MissingChild { element: String, child: String },

    /// An attribute or text value could not be parsed
    #[error("invalid value {value:?} in element {element}")]
    InvalidValue { element: String, value: String },

    /// Document ended inside an open element
    #[error("unterminated element {element}")]
    UnexpectedEof { element: String },
}

/// Type alias for Result with our Error type
pub type Result<T> = std::result::Result<T, Error>;
