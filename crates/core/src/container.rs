//! Container layouts and the packet walk engine.
//!
//! A container is an ordered list of entries, optionally inheriting
//! from a base container with restriction criteria. Decoding walks the
//! root-first inheritance chain, then repeatedly selects the single
//! child container whose restriction is satisfied by the fields
//! decoded so far; there is no backtracking. Encoding walks the same
//! chain, auto-populating parameters implied by equality restrictions.
//!
//! # Bit positions
//!
//! Each chain walk records the bit where it began; an entry with an
//! explicit location seeks relative to that container start or to the
//! end of the previous entry, without consuming the bits in between.
//! A container-ref entry establishes a new container start at its
//! current position.

use std::collections::HashMap;

use crate::bitio::{BitReader, BitWriter};
use crate::compare::{evaluate_all, Comparison, ComparisonOperator};
use crate::error::{BitIoError, DecodeError, EncodeError, Result, SchemaError};
use crate::schema::Schema;
use crate::value::{ParameterValue, ValueMap};

/// Anchor for an explicit entry location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationReference {
    /// Offset from the bit where the container began
    ContainerStart,
    /// Offset from the current cursor (end of the previous entry)
    PreviousEntry,
}

/// Explicit bit position of an entry (`locationInContainerInBits`).
#[derive(Debug, Clone, PartialEq)]
pub struct EntryLocation {
    pub reference: LocationReference,
    /// May be negative for PreviousEntry references
    pub bit_offset: i64,
}

/// One entry of a container's layout, with all references resolved to
/// schema indices.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEntry {
    Parameter {
        parameter: usize,
        location: Option<EntryLocation>,
    },
    Argument {
        name: String,
    },
    ContainerRef {
        container: usize,
        condition: Vec<Comparison>,
    },
    FixedValue {
        size_in_bits: u32,
        /// Expected pattern, right-aligned to `size_in_bits`
        bytes: Vec<u8>,
    },
}

/// A resolved telemetry or command container.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub qualified_name: String,
    pub is_abstract: bool,
    /// Base container index, when this container inherits
    pub base: Option<usize>,
    /// Restriction criteria against the base's fields (AND)
    pub restriction: Vec<Comparison>,
    /// This container's own entries (ancestors contribute theirs
    /// through the chain walk)
    pub entries: Vec<ContainerEntry>,
}

/// Decode-side walk over a packet.
pub(crate) struct Decoder<'a> {
    schema: &'a Schema,
    reader: BitReader<'a>,
    scope: ValueMap,
    /// Argument name -> type index, present when decoding a command
    arguments: Option<HashMap<String, usize>>,
}

impl<'a> Decoder<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        packet: &'a [u8],
        arguments: Option<HashMap<String, usize>>,
    ) -> Self {
        Self {
            schema,
            reader: BitReader::new(packet),
            scope: ValueMap::new(),
            arguments,
        }
    }

    /// Decode starting from the candidate container; returns the most
    /// derived container that matched.
    pub(crate) fn decode(&mut self, container: usize) -> Result<usize> {
        let schema = self.schema;
        let start = self.reader.position();

        for &idx in schema.chain(container) {
            let c = schema.container(idx);
            if !evaluate_all(&c.restriction, schema, &self.scope)? {
                return Err(DecodeError::RestrictionViolated {
                    container: c.qualified_name.clone(),
                }
                .into());
            }
            self.walk_entries(idx, start)?;
        }

        // Child selection: commit to the single child whose
        // restriction holds, then keep descending.
        let mut current = container;
        loop {
            let mut matched = Vec::new();
            for &child in schema.children(current) {
                let c = schema.container(child);
                if evaluate_all(&c.restriction, schema, &self.scope)? {
                    matched.push(child);
                }
            }
            match matched.len() {
                0 => break,
                1 => {
                    let child = matched[0];
                    self.walk_entries(child, start)?;
                    current = child;
                }
                _ => {
                    return Err(DecodeError::AmbiguousContainer {
                        base: schema.container(current).qualified_name.clone(),
                        candidates: matched
                            .iter()
                            .map(|&i| schema.container(i).qualified_name.clone())
                            .collect(),
                    }
                    .into())
                }
            }
        }
        Ok(current)
    }

    /// Take the accumulated value scope.
    pub(crate) fn into_scope(self) -> ValueMap {
        self.scope
    }

    fn walk_entries(&mut self, idx: usize, container_start: usize) -> Result<()> {
        let schema = self.schema;
        let c = schema.container(idx);

        for (entry_index, entry) in c.entries.iter().enumerate() {
            match entry {
                ContainerEntry::Parameter {
                    parameter,
                    location,
                } => {
                    if let Some(location) = location {
                        let target = resolve_location(
                            location,
                            container_start,
                            self.reader.position(),
                        )?;
                        self.reader.seek(target)?;
                    }
                    let p = schema.parameter(*parameter);
                    let ty = schema.type_at(p.type_idx);
                    let pv = ty
                        .decode(&mut self.reader, &self.scope, schema)
                        .map_err(|e| DecodeError::Parameter {
                            parameter: p.qualified_name.clone(),
                            container: c.qualified_name.clone(),
                            source: Box::new(e),
                        })?;
                    self.scope.insert(p.qualified_name.clone(), pv);
                }
                ContainerEntry::Argument { name } => {
                    let type_idx = self.argument_type(name)?;
                    let ty = schema.type_at(type_idx);
                    let pv = ty
                        .decode(&mut self.reader, &self.scope, schema)
                        .map_err(|e| DecodeError::Parameter {
                            parameter: name.clone(),
                            container: c.qualified_name.clone(),
                            source: Box::new(e),
                        })?;
                    self.scope.insert(name.clone(), pv);
                }
                ContainerEntry::ContainerRef {
                    container,
                    condition,
                } => {
                    if evaluate_all(condition, schema, &self.scope)? {
                        self.decode(*container)?;
                    }
                }
                ContainerEntry::FixedValue {
                    size_in_bits,
                    bytes,
                } => {
                    let actual = self.reader.read_bits(*size_in_bits as usize)?;
                    if &actual != bytes {
                        return Err(DecodeError::FixedValueMismatch {
                            container: c.qualified_name.clone(),
                            entry_index,
                            expected: hex_string(bytes),
                            actual: hex_string(&actual),
                        }
                        .into());
                    }
                }
            }
        }
        Ok(())
    }

    fn argument_type(&self, name: &str) -> Result<usize> {
        let arguments = self
            .arguments
            .as_ref()
            .ok_or_else(|| SchemaError::ArgumentOutsideCommand(name.to_string()))?;
        arguments
            .get(name)
            .copied()
            .ok_or_else(|| SchemaError::UnknownArgument(name.to_string()).into())
    }
}

/// Encode-side walk building a packet.
pub(crate) struct Encoder<'a> {
    schema: &'a Schema,
    writer: BitWriter,
    values: ValueMap,
    arguments: Option<HashMap<String, usize>>,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(
        schema: &'a Schema,
        values: ValueMap,
        arguments: Option<HashMap<String, usize>>,
    ) -> Self {
        Self {
            schema,
            writer: BitWriter::new(),
            values,
            arguments,
        }
    }

    /// Encode the full inheritance chain of the target container.
    pub(crate) fn encode(&mut self, container: usize) -> Result<()> {
        let schema = self.schema;
        let chain: Vec<usize> = schema.chain(container).to_vec();

        // Equality restrictions imply values for their parameters;
        // fill in anything the caller left out before verifying.
        for &idx in &chain {
            for comparison in &schema.container(idx).restriction {
                if comparison.operator == ComparisonOperator::Equal
                    && !self.values.contains(&comparison.parameter)
                {
                    if let Some(ty) = schema.parameter_type_of(&comparison.parameter) {
                        if let Some(value) = ty.parse_literal(&comparison.value) {
                            self.values.set(comparison.parameter.clone(), value);
                        }
                    }
                }
            }
        }
        for &idx in &chain {
            let c = schema.container(idx);
            for comparison in &c.restriction {
                if !comparison.evaluate(schema, &self.values)? {
                    return Err(EncodeError::RestrictionUnsatisfied {
                        container: c.qualified_name.clone(),
                        parameter: comparison.parameter.clone(),
                    }
                    .into());
                }
            }
        }

        let start = self.writer.position();
        for &idx in &chain {
            self.walk_entries(idx, start)?;
        }
        Ok(())
    }

    /// Finish and return the packet bytes, zero-padded to whole bytes.
    pub(crate) fn finish(self) -> Vec<u8> {
        self.writer.finish()
    }

    fn walk_entries(&mut self, idx: usize, container_start: usize) -> Result<()> {
        let schema = self.schema;
        let c = schema.container(idx);

        for entry in &c.entries {
            match entry {
                ContainerEntry::Parameter {
                    parameter,
                    location,
                } => {
                    if let Some(location) = location {
                        let target = resolve_location(
                            location,
                            container_start,
                            self.writer.position(),
                        )?;
                        self.writer.seek(target);
                    }
                    let p = schema.parameter(*parameter);
                    let name = p.qualified_name.clone();
                    self.encode_named(&name, p.type_idx)?;
                }
                ContainerEntry::Argument { name } => {
                    let arguments = self.arguments.as_ref().ok_or_else(|| {
                        SchemaError::ArgumentOutsideCommand(name.clone())
                    })?;
                    let type_idx = *arguments
                        .get(name)
                        .ok_or_else(|| SchemaError::UnknownArgument(name.clone()))?;
                    let name = name.clone();
                    self.encode_named(&name, type_idx)?;
                }
                ContainerEntry::ContainerRef {
                    container,
                    condition,
                } => {
                    if evaluate_all(condition, schema, &self.values)? {
                        self.encode(*container)?;
                    }
                }
                ContainerEntry::FixedValue {
                    size_in_bits,
                    bytes,
                } => {
                    self.writer.write_bits(bytes, *size_in_bits as usize)?;
                }
            }
        }
        Ok(())
    }

    /// Encode one named value and record the raw form it produced.
    fn encode_named(&mut self, name: &str, type_idx: usize) -> Result<()> {
        let engineering = self
            .values
            .get(name)
            .ok_or_else(|| EncodeError::MissingValue {
                name: name.to_string(),
            })?
            .engineering
            .clone();
        let ty = self.schema.type_at(type_idx);
        let raw = ty
            .encode(&mut self.writer, &engineering, &self.values, self.schema)
            .map_err(|e| EncodeError::Parameter {
                name: name.to_string(),
                source: Box::new(e),
            })?;
        self.values
            .insert(name.to_string(), ParameterValue::new(raw, engineering));
        Ok(())
    }
}

/// Turn an explicit entry location into an absolute bit position.
fn resolve_location(
    location: &EntryLocation,
    container_start: usize,
    cursor: usize,
) -> Result<usize> {
    let base = match location.reference {
        LocationReference::ContainerStart => container_start as i64,
        LocationReference::PreviousEntry => cursor as i64,
    };
    let target = base + location.bit_offset;
    usize::try_from(target).map_err(|_| {
        BitIoError::SeekOutOfBounds {
            position: 0,
            limit: cursor,
        }
        .into()
    })
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("0x");
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
