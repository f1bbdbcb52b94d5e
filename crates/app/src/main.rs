//! xtce-codec: command-line packet decoder/encoder.
//!
//! Loads an XTCE document, compiles it, and runs one decode or encode
//! against it. Packet bytes come in and go out as hex on the command
//! line; decoded values are printed one per line in decode order.

mod config;

use config::{Config, Mode};
use xtce_codec_core::value::parse_hex;
use xtce_codec_core::{
    decode_command, decode_packet, encode_command, encode_packet, loader, DecodedPacket, Schema,
    Value, ValueMap,
};

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!("run with --help for usage");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(&config) {
        eprintln!("error: {err}");
        let mut source = std::error::Error::source(&err);
        while let Some(inner) = source {
            eprintln!("  caused by: {inner}");
            source = inner.source();
        }
        std::process::exit(1);
    }
}

fn run(config: &Config) -> xtce_codec_core::Result<()> {
    let system = loader::load_file(&config.schema_file)?;
    let schema = Schema::build(system)?;

    match &config.mode {
        Mode::Decode { container, hex } => {
            let packet = parse_packet_hex(hex)?;
            let decoded = decode_packet(&schema, container, &packet)?;
            print_decoded(&decoded);
        }
        Mode::DecodeCommand { command, hex } => {
            let packet = parse_packet_hex(hex)?;
            let decoded = decode_command(&schema, command, &packet)?;
            print_decoded(&decoded);
        }
        Mode::Encode { container, sets } => {
            let values = build_value_map(sets);
            let bytes = encode_packet(&schema, container, &values)?;
            println!("{}", hex_string(&bytes));
        }
        Mode::EncodeCommand { command, sets } => {
            let values = build_value_map(sets);
            let bytes = encode_command(&schema, command, &values)?;
            println!("{}", hex_string(&bytes));
        }
        Mode::PrintSchema => print_schema(&schema),
    }
    Ok(())
}

fn parse_packet_hex(hex: &str) -> xtce_codec_core::Result<Vec<u8>> {
    parse_hex(hex).ok_or_else(|| {
        xtce_codec_core::error::LoadError::InvalidValue {
            element: "--hex".into(),
            value: hex.to_string(),
        }
        .into()
    })
}

/// Interpret a command-line value string: numbers numerically,
/// `hex:`-prefixed strings as bytes, everything else as a string
/// (enum labels, boolean truth strings).
fn parse_value(text: &str) -> Value {
    if let Some(hex) = text.strip_prefix("hex:") {
        if let Some(bytes) = parse_hex(hex) {
            return Value::Bytes(bytes);
        }
    }
    if let Ok(v) = text.parse::<i64>() {
        return Value::Integer(v);
    }
    if let Ok(v) = text.parse::<u64>() {
        return Value::Unsigned(v);
    }
    if let Ok(v) = text.parse::<f64>() {
        return Value::Float(v);
    }
    Value::String(text.to_string())
}

fn build_value_map(sets: &[(String, String)]) -> ValueMap {
    let mut values = ValueMap::new();
    for (name, text) in sets {
        values.set(name.clone(), parse_value(text));
    }
    values
}

fn print_decoded(decoded: &DecodedPacket) {
    println!("container: {}", decoded.container);
    for (name, pv) in decoded.values.iter() {
        if pv.raw == pv.engineering {
            println!("  {name} = {}", pv.engineering);
        } else {
            println!("  {name} = {} (raw {})", pv.engineering, pv.raw);
        }
        if pv.unknown_enumeration {
            println!("    (no enumeration label for this raw value)");
        }
    }
}

fn print_schema(schema: &Schema) {
    println!("=== Containers ===");
    for name in schema.container_names() {
        println!("  {name}");
    }
    println!();
    println!("=== Parameters ===");
    for name in schema.parameter_names() {
        println!("  {name}");
    }
    println!();
    println!("=== Commands ===");
    for name in schema.command_names() {
        println!("  {name}");
    }
}

fn hex_string(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
