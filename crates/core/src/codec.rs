//! Public packet codec API.
//!
//! These four functions are the crate's surface: decode a telemetry
//! packet or command against a compiled [`Schema`], or encode a value
//! map into bit-exact packet bytes. Each call is a pure function of
//! (schema, input); the schema is never mutated and calls share no
//! state, so they may run concurrently without synchronization.

use crate::container::{Decoder, Encoder};
use crate::error::Result;
use crate::schema::Schema;
use crate::value::ValueMap;

/// A fully decoded packet: the most derived container that matched,
/// plus every decoded field in decode order.
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    /// Qualified name of the container the packet resolved to
    pub container: String,
    /// Qualified parameter name -> raw/engineering pair, in decode order
    pub values: ValueMap,
}

/// Decode a telemetry packet starting from a candidate container.
///
/// The candidate's full inheritance chain is walked first; afterwards
/// child containers are selected by their restriction criteria until
/// no child matches. The returned packet names the most derived
/// container.
///
/// # Errors
/// Any [`DecodeError`](crate::error::DecodeError) from the walk, with
/// container/entry/parameter context attached. No partial results.
pub fn decode_packet(schema: &Schema, container: &str, packet: &[u8]) -> Result<DecodedPacket> {
    let idx = schema.resolve_container(container)?;
    let mut decoder = Decoder::new(schema, packet, None);
    let resolved = decoder.decode(idx)?;
    Ok(DecodedPacket {
        container: schema.container(resolved).qualified_name.clone(),
        values: decoder.into_scope(),
    })
}

/// Decode a command packet against a meta-command's container, with
/// the command's argument list (accumulated over its base chain) in
/// scope for argument entries.
pub fn decode_command(schema: &Schema, command: &str, packet: &[u8]) -> Result<DecodedPacket> {
    let cmd = schema.resolve_command(command)?;
    let container = schema.command_container(cmd)?;
    let arguments = schema.command_arguments(cmd);
    let mut decoder = Decoder::new(schema, packet, Some(arguments));
    let resolved = decoder.decode(container)?;
    Ok(DecodedPacket {
        container: schema.container(resolved).qualified_name.clone(),
        values: decoder.into_scope(),
    })
}

/// Encode a value map into a packet laid out by the named container's
/// inheritance chain.
///
/// Parameters fixed by equality restrictions on the chain may be
/// omitted from `values`; they are auto-populated. The final partial
/// byte, if any, is right-padded with zero bits.
pub fn encode_packet(schema: &Schema, container: &str, values: &ValueMap) -> Result<Vec<u8>> {
    let idx = schema.resolve_container(container)?;
    let mut encoder = Encoder::new(schema, values.clone(), None);
    encoder.encode(idx)?;
    Ok(encoder.finish())
}

/// Encode a command: resolve the meta-command, find its command
/// container, and encode the argument map through it.
pub fn encode_command(schema: &Schema, command: &str, arguments: &ValueMap) -> Result<Vec<u8>> {
    let cmd = schema.resolve_command(command)?;
    let container = schema.command_container(cmd)?;
    let argument_types = schema.command_arguments(cmd);
    let mut encoder = Encoder::new(schema, arguments.clone(), Some(argument_types));
    encoder.encode(container)?;
    Ok(encoder.finish())
}
