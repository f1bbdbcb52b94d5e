//! Data encodings: how raw values live in the bitstream.
//!
//! A [`DataEncoding`] is the closed union of the four wire forms this
//! codec supports. Enumerated and boolean types do not appear here;
//! they reuse [`IntegerEncoding`] and put their interpretation in the
//! type layer.
//!
//! Decoding and encoding take the running value scope, because string
//! and binary fields may take their size from a parameter decoded
//! earlier in the same packet.

use crate::bitio::{BitReader, BitWriter};
use crate::error::{BitIoError, DecodeError, EncodeError, Result};
use crate::value::{Value, ValueMap};

/// Integer sign interpretation. Only the two forms named by the
/// support matrix exist; anything else is rejected at load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signedness {
    Unsigned,
    TwosComplement,
}

/// Unsigned or two's-complement integer field, 1..=64 bits, MSB-first.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerEncoding {
    pub size_in_bits: u32,
    pub signedness: Signedness,
}

impl IntegerEncoding {
    pub fn decode(&self, reader: &mut BitReader) -> Result<Value> {
        match self.signedness {
            Signedness::Unsigned => Ok(Value::Unsigned(reader.read_unsigned(self.size_in_bits)?)),
            Signedness::TwosComplement => {
                Ok(Value::Integer(reader.read_signed(self.size_in_bits)?))
            }
        }
    }

    pub fn encode(&self, writer: &mut BitWriter, value: &Value) -> Result<()> {
        match self.signedness {
            Signedness::Unsigned => match *value {
                Value::Unsigned(v) => writer.write_unsigned(v, self.size_in_bits),
                Value::Integer(v) if v >= 0 => writer.write_unsigned(v as u64, self.size_in_bits),
                Value::Integer(v) => Err(BitIoError::ValueOutOfRange {
                    value: v as i128,
                    bits: self.size_in_bits,
                }
                .into()),
                ref other => Err(wrong_kind("integer", other)),
            },
            Signedness::TwosComplement => match *value {
                Value::Integer(v) => writer.write_signed(v, self.size_in_bits),
                Value::Unsigned(v) => match i64::try_from(v) {
                    Ok(v) => writer.write_signed(v, self.size_in_bits),
                    Err(_) => Err(BitIoError::ValueOutOfRange {
                        value: v as i128,
                        bits: self.size_in_bits,
                    }
                    .into()),
                },
                ref other => Err(wrong_kind("integer", other)),
            },
        }
    }
}

/// IEEE 754 float field, 32 or 64 bits.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatEncoding {
    pub size_in_bits: u32,
}

impl FloatEncoding {
    pub fn decode(&self, reader: &mut BitReader) -> Result<Value> {
        Ok(Value::Float(reader.read_float(self.size_in_bits)?))
    }

    pub fn encode(&self, writer: &mut BitWriter, value: &Value) -> Result<()> {
        let v = value.as_f64().ok_or_else(|| wrong_kind("float", value))?;
        writer.write_float(v, self.size_in_bits)
    }
}

/// What a dynamic string size reference counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeUnits {
    /// The referenced value is the payload size in bits
    Bits,
    /// The referenced value is a character count, converted through
    /// the character set's fixed width
    Characters,
}

/// How a string field's extent is determined.
#[derive(Debug, Clone, PartialEq)]
pub enum StringSizing {
    /// Exactly `bits` of payload (a whole number of bytes)
    Fixed { bits: u32 },
    /// Size read from an already-decoded integer parameter
    Dynamic { size_ref: String, units: SizeUnits },
    /// Payload runs until (and consumes) the terminator byte
    Terminated { terminator: u8 },
}

/// Character sets accepted for string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Utf16,
    UsAscii,
    Iso8859_1,
    Windows1252,
}

/// Windows-1252 mappings for 0x80..=0x9F; zero marks the five
/// undefined code points.
const WINDOWS_1252_80_9F: [u16; 32] = [
    0x20AC, 0, 0x201A, 0x0192, 0x201E, 0x2026, 0x2020, 0x2021, 0x02C6, 0x2030, 0x0160, 0x2039,
    0x0152, 0, 0x017D, 0, 0, 0x2018, 0x2019, 0x201C, 0x201D, 0x2022, 0x2013, 0x2014, 0x02DC,
    0x2122, 0x0161, 0x203A, 0x0153, 0, 0x017E, 0x0178,
];

impl Charset {
    /// Charset name as written in XTCE documents.
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16 => "UTF-16",
            Charset::UsAscii => "US-ASCII",
            Charset::Iso8859_1 => "ISO-8859-1",
            Charset::Windows1252 => "Windows-1252",
        }
    }

    /// Bytes per character for character-counted dynamic sizing.
    /// UTF-8 has no fixed width; a character count is treated as a
    /// byte count there.
    fn width_bytes(&self) -> usize {
        match self {
            Charset::Utf16 => 2,
            _ => 1,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<String> {
        let bad = |detail: String| -> crate::error::Error {
            DecodeError::BadCharset {
                charset: self.name(),
                detail,
            }
            .into()
        };
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| bad(e.to_string())),
            Charset::UsAscii => {
                if let Some(b) = bytes.iter().find(|&&b| b >= 0x80) {
                    return Err(bad(format!("byte {b:#04x} outside 7-bit range")));
                }
                Ok(bytes.iter().map(|&b| b as char).collect())
            }
            Charset::Iso8859_1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Windows1252 => bytes
                .iter()
                .map(|&b| match b {
                    0x80..=0x9F => {
                        let cp = WINDOWS_1252_80_9F[(b - 0x80) as usize];
                        if cp == 0 {
                            Err(bad(format!("undefined code point {b:#04x}")))
                        } else {
                            Ok(char::from_u32(cp as u32).unwrap())
                        }
                    }
                    _ => Ok(b as char),
                })
                .collect(),
            Charset::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(bad(format!("odd byte count {}", bytes.len())));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                char::decode_utf16(units.iter().copied())
                    .collect::<std::result::Result<String, _>>()
                    .map_err(|e| bad(e.to_string()))
            }
        }
    }

    fn encode(&self, s: &str) -> Result<Vec<u8>> {
        let unencodable = |c: char| -> crate::error::Error {
            EncodeError::UnencodableCharacter {
                charset: self.name(),
                character: c,
            }
            .into()
        };
        match self {
            Charset::Utf8 => Ok(s.as_bytes().to_vec()),
            Charset::UsAscii => s
                .chars()
                .map(|c| {
                    if c.is_ascii() {
                        Ok(c as u8)
                    } else {
                        Err(unencodable(c))
                    }
                })
                .collect(),
            Charset::Iso8859_1 => s
                .chars()
                .map(|c| {
                    let cp = c as u32;
                    if cp <= 0xFF {
                        Ok(cp as u8)
                    } else {
                        Err(unencodable(c))
                    }
                })
                .collect(),
            Charset::Windows1252 => s
                .chars()
                .map(|c| {
                    let cp = c as u32;
                    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
                        return Ok(cp as u8);
                    }
                    match WINDOWS_1252_80_9F.iter().position(|&m| m as u32 == cp) {
                        Some(i) => Ok(0x80 + i as u8),
                        None => Err(unencodable(c)),
                    }
                })
                .collect(),
            Charset::Utf16 => {
                let mut out = Vec::with_capacity(s.len() * 2);
                for unit in s.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
                Ok(out)
            }
        }
    }
}

/// String field: a character set plus a sizing rule.
#[derive(Debug, Clone, PartialEq)]
pub struct StringEncoding {
    pub charset: Charset,
    pub sizing: StringSizing,
}

impl StringEncoding {
    pub fn decode(&self, reader: &mut BitReader, scope: &ValueMap) -> Result<Value> {
        let bytes = match &self.sizing {
            StringSizing::Fixed { bits } => reader.read_bytes(*bits as usize)?,
            StringSizing::Dynamic { size_ref, units } => {
                let bits = dynamic_bits(scope, size_ref, *units, self.charset)?;
                reader.read_bytes(bits)?
            }
            StringSizing::Terminated { terminator } => {
                let mut bytes = Vec::new();
                loop {
                    if reader.bits_remaining() < 8 {
                        return Err(DecodeError::UnterminatedString {
                            terminator: *terminator,
                        }
                        .into());
                    }
                    let b = reader.read_unsigned(8)? as u8;
                    if b == *terminator {
                        break;
                    }
                    bytes.push(b);
                }
                bytes
            }
        };
        Ok(Value::String(self.charset.decode(&bytes)?))
    }

    pub fn encode(&self, writer: &mut BitWriter, value: &Value, scope: &ValueMap) -> Result<()> {
        let s = match value {
            Value::String(s) => s,
            other => return Err(wrong_kind("string", other)),
        };
        let bytes = self.charset.encode(s)?;
        match &self.sizing {
            StringSizing::Fixed { bits } => {
                let expected = *bits as usize / 8;
                if bytes.len() != expected {
                    return Err(EncodeError::StringLengthMismatch {
                        expected,
                        actual: bytes.len(),
                    }
                    .into());
                }
                writer.write_bytes(&bytes)
            }
            StringSizing::Dynamic { size_ref, units } => {
                // The size parameter is written by its own entry; all
                // we can do here is check consistency when it is known.
                if scope.contains(size_ref) {
                    let bits = dynamic_bits(scope, size_ref, *units, self.charset)?;
                    let declared = bits / 8;
                    let actual = match units {
                        SizeUnits::Characters if self.charset == Charset::Utf16 => {
                            s.encode_utf16().count() * 2
                        }
                        _ => bytes.len(),
                    };
                    if actual != declared {
                        return Err(EncodeError::StringLengthMismatch {
                            expected: declared,
                            actual,
                        }
                        .into());
                    }
                }
                writer.write_bytes(&bytes)
            }
            StringSizing::Terminated { terminator } => {
                if bytes.contains(terminator) {
                    return Err(EncodeError::TerminatorInString {
                        terminator: *terminator,
                    }
                    .into());
                }
                writer.write_bytes(&bytes)?;
                writer.write_unsigned(*terminator as u64, 8)
            }
        }
    }
}

/// How a binary field's extent is determined.
#[derive(Debug, Clone, PartialEq)]
pub enum BinarySizing {
    /// Exactly `bits` of payload (a whole number of bytes)
    Fixed { bits: u32 },
    /// Bit count read from an already-decoded integer parameter
    Dynamic { size_ref: String },
}

/// Opaque byte-sequence field.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryEncoding {
    pub sizing: BinarySizing,
}

impl BinaryEncoding {
    pub fn decode(&self, reader: &mut BitReader, scope: &ValueMap) -> Result<Value> {
        let bits = match &self.sizing {
            BinarySizing::Fixed { bits } => *bits as usize,
            BinarySizing::Dynamic { size_ref } => scope_size_bits(scope, size_ref)?,
        };
        Ok(Value::Bytes(reader.read_bytes(bits)?))
    }

    pub fn encode(&self, writer: &mut BitWriter, value: &Value, scope: &ValueMap) -> Result<()> {
        let bytes = match value {
            Value::Bytes(b) => b,
            other => return Err(wrong_kind("bytes", other)),
        };
        let declared_bits = match &self.sizing {
            BinarySizing::Fixed { bits } => Some(*bits as usize),
            BinarySizing::Dynamic { size_ref } if scope.contains(size_ref) => {
                Some(scope_size_bits(scope, size_ref)?)
            }
            BinarySizing::Dynamic { .. } => None,
        };
        if let Some(bits) = declared_bits {
            if bytes.len() * 8 != bits {
                return Err(EncodeError::BinaryLengthMismatch {
                    expected: bits / 8,
                    actual: bytes.len(),
                }
                .into());
            }
        }
        writer.write_bytes(bytes)
    }
}

/// The closed family of wire encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum DataEncoding {
    Integer(IntegerEncoding),
    Float(FloatEncoding),
    String(StringEncoding),
    Binary(BinaryEncoding),
}

impl DataEncoding {
    /// Decode one raw value at the reader's cursor.
    pub fn decode(&self, reader: &mut BitReader, scope: &ValueMap) -> Result<Value> {
        match self {
            DataEncoding::Integer(e) => e.decode(reader),
            DataEncoding::Float(e) => e.decode(reader),
            DataEncoding::String(e) => e.decode(reader, scope),
            DataEncoding::Binary(e) => e.decode(reader, scope),
        }
    }

    /// Encode one raw value at the writer's cursor.
    pub fn encode(&self, writer: &mut BitWriter, value: &Value, scope: &ValueMap) -> Result<()> {
        match self {
            DataEncoding::Integer(e) => e.encode(writer, value),
            DataEncoding::Float(e) => e.encode(writer, value),
            DataEncoding::String(e) => e.encode(writer, value, scope),
            DataEncoding::Binary(e) => e.encode(writer, value, scope),
        }
    }
}

/// Resolve a dynamic size reference to a bit count.
fn scope_size_bits(scope: &ValueMap, size_ref: &str) -> Result<usize> {
    let bad = || -> crate::error::Error {
        DecodeError::BadDynamicSize {
            parameter: size_ref.to_string(),
        }
        .into()
    };
    let value = scope.value(size_ref, true).ok_or_else(bad)?;
    let bits = value.as_u64().ok_or_else(bad)? as usize;
    Ok(bits)
}

/// Resolve a dynamic string size to a payload bit count, applying the
/// character-count conversion when the reference counts characters.
fn dynamic_bits(
    scope: &ValueMap,
    size_ref: &str,
    units: SizeUnits,
    charset: Charset,
) -> Result<usize> {
    let n = scope_size_bits(scope, size_ref)?;
    Ok(match units {
        SizeUnits::Bits => n,
        SizeUnits::Characters => n * charset.width_bytes() * 8,
    })
}

fn wrong_kind(expected: &'static str, found: &Value) -> crate::error::Error {
    EncodeError::WrongValueKind {
        expected,
        found: found.kind(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_string(enc: &StringEncoding, bytes: &[u8], scope: &ValueMap) -> Result<Value> {
        let mut reader = BitReader::new(bytes);
        enc.decode(&mut reader, scope)
    }

    #[test]
    fn test_integer_unsigned_round_trip() {
        let enc = IntegerEncoding {
            size_in_bits: 12,
            signedness: Signedness::Unsigned,
        };
        let mut writer = BitWriter::new();
        enc.encode(&mut writer, &Value::Unsigned(0xABC)).unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(enc.decode(&mut reader).unwrap(), Value::Unsigned(0xABC));
    }

    #[test]
    fn test_integer_signed_decode() {
        let enc = IntegerEncoding {
            size_in_bits: 8,
            signedness: Signedness::TwosComplement,
        };
        let mut reader = BitReader::new(&[0xFF, 0x80]);
        assert_eq!(enc.decode(&mut reader).unwrap(), Value::Integer(-1));
        assert_eq!(enc.decode(&mut reader).unwrap(), Value::Integer(-128));
    }

    #[test]
    fn test_integer_rejects_negative_unsigned() {
        let enc = IntegerEncoding {
            size_in_bits: 8,
            signedness: Signedness::Unsigned,
        };
        let mut writer = BitWriter::new();
        assert!(enc.encode(&mut writer, &Value::Integer(-1)).is_err());
    }

    #[test]
    fn test_float_round_trip() {
        let enc = FloatEncoding { size_in_bits: 64 };
        let mut writer = BitWriter::new();
        enc.encode(&mut writer, &Value::Float(3.141592653589793))
            .unwrap();
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert_eq!(
            enc.decode(&mut reader).unwrap(),
            Value::Float(3.141592653589793)
        );
    }

    #[test]
    fn test_fixed_string_utf8() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Fixed { bits: 24 },
        };
        let value = decode_string(&enc, b"ABC", &ValueMap::new()).unwrap();
        assert_eq!(value, Value::String("ABC".into()));
    }

    #[test]
    fn test_fixed_string_length_checked_on_encode() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Fixed { bits: 24 },
        };
        let mut writer = BitWriter::new();
        let err = enc.encode(&mut writer, &Value::String("AB".into()), &ValueMap::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_dynamic_string_bytes() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Dynamic {
                size_ref: "len".into(),
                units: SizeUnits::Characters,
            },
        };
        let mut scope = ValueMap::new();
        scope.set("len", Value::Unsigned(3));
        let value = decode_string(&enc, b"ABCDE", &scope).unwrap();
        assert_eq!(value, Value::String("ABC".into()));
    }

    #[test]
    fn test_dynamic_string_missing_size() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Dynamic {
                size_ref: "len".into(),
                units: SizeUnits::Bits,
            },
        };
        assert!(decode_string(&enc, b"ABC", &ValueMap::new()).is_err());
    }

    #[test]
    fn test_terminated_string() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Terminated { terminator: 0x00 },
        };
        let mut reader = BitReader::new(b"hi\x00rest");
        let value = enc.decode(&mut reader, &ValueMap::new()).unwrap();
        assert_eq!(value, Value::String("hi".into()));
        // Terminator consumed; cursor sits on the remainder
        assert_eq!(reader.position(), 24);
    }

    #[test]
    fn test_terminated_string_missing_terminator() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Terminated { terminator: 0x00 },
        };
        let mut reader = BitReader::new(b"never ends");
        assert!(enc.decode(&mut reader, &ValueMap::new()).is_err());
    }

    #[test]
    fn test_terminated_string_encode_rejects_embedded_terminator() {
        let enc = StringEncoding {
            charset: Charset::Utf8,
            sizing: StringSizing::Terminated { terminator: b';' },
        };
        let mut writer = BitWriter::new();
        assert!(enc
            .encode(&mut writer, &Value::String("a;b".into()), &ValueMap::new())
            .is_err());
    }

    #[test]
    fn test_latin1_and_windows1252() {
        // 0xE9 is e-acute in both; 0x80 is the euro sign only in 1252
        let latin = Charset::Iso8859_1.decode(&[0xE9]).unwrap();
        assert_eq!(latin, "é");

        let euro = Charset::Windows1252.decode(&[0x80]).unwrap();
        assert_eq!(euro, "€");
        assert!(Charset::Windows1252.decode(&[0x81]).is_err());

        assert_eq!(Charset::Windows1252.encode("€").unwrap(), vec![0x80]);
    }

    #[test]
    fn test_ascii_rejects_high_bytes() {
        assert!(Charset::UsAscii.decode(&[0x41, 0xC0]).is_err());
        assert!(Charset::UsAscii.encode("é").is_err());
    }

    #[test]
    fn test_utf16_round_trip() {
        let enc = StringEncoding {
            charset: Charset::Utf16,
            sizing: StringSizing::Fixed { bits: 32 },
        };
        let mut writer = BitWriter::new();
        enc.encode(&mut writer, &Value::String("hi".into()), &ValueMap::new())
            .unwrap();
        let bytes = writer.finish();
        assert_eq!(bytes, vec![0x00, b'h', 0x00, b'i']);

        let value = decode_string(&enc, &bytes, &ValueMap::new()).unwrap();
        assert_eq!(value, Value::String("hi".into()));
    }

    #[test]
    fn test_binary_fixed() {
        let enc = BinaryEncoding {
            sizing: BinarySizing::Fixed { bits: 16 },
        };
        let mut reader = BitReader::new(&[0xDE, 0xAD, 0xBE]);
        assert_eq!(
            enc.decode(&mut reader, &ValueMap::new()).unwrap(),
            Value::Bytes(vec![0xDE, 0xAD])
        );
    }

    #[test]
    fn test_binary_dynamic() {
        let enc = BinaryEncoding {
            sizing: BinarySizing::Dynamic {
                size_ref: "blob_bits".into(),
            },
        };
        let mut scope = ValueMap::new();
        scope.set("blob_bits", Value::Unsigned(24));
        let mut reader = BitReader::new(&[1, 2, 3, 4]);
        assert_eq!(
            enc.decode(&mut reader, &scope).unwrap(),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn test_binary_encode_length_mismatch() {
        let enc = BinaryEncoding {
            sizing: BinarySizing::Fixed { bits: 16 },
        };
        let mut writer = BitWriter::new();
        assert!(enc
            .encode(&mut writer, &Value::Bytes(vec![1]), &ValueMap::new())
            .is_err());
    }
}
