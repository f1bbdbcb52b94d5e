//! Configuration for the xtce-codec command-line tool.
//!
//! Handles parsing command-line arguments into a run mode. No CLI
//! framework: the flag set is small and the error messages matter
//! more than the plumbing.

use std::path::PathBuf;

/// What the tool has been asked to do.
#[derive(Debug, Clone)]
pub enum Mode {
    /// Decode a telemetry packet against a container
    Decode { container: String, hex: String },
    /// Decode a command packet against a meta-command
    DecodeCommand { command: String, hex: String },
    /// Encode parameter values into a packet
    Encode {
        container: String,
        sets: Vec<(String, String)>,
    },
    /// Encode a command from argument values
    EncodeCommand {
        command: String,
        sets: Vec<(String, String)>,
    },
    /// Print the schema's containers, parameters, and commands
    PrintSchema,
}

/// Complete configuration for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the XTCE document
    pub schema_file: PathBuf,
    pub mode: Mode,
}

impl Config {
    /// Parse configuration from command-line arguments (without the
    /// program name).
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.is_empty() {
            print_help();
            std::process::exit(0);
        }

        let mut schema_file: Option<PathBuf> = None;
        let mut container: Option<String> = None;
        let mut command: Option<String> = None;
        let mut hex: Option<String> = None;
        let mut sets: Vec<(String, String)> = Vec::new();
        let mut action: Option<&str> = None;

        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "decode" | "decode-command" | "encode" | "encode-command" | "schema" => {
                    if action.is_some() {
                        return Err(format!("unexpected extra action: {}", args[i]));
                    }
                    action = Some(match args[i].as_str() {
                        "decode" => "decode",
                        "decode-command" => "decode-command",
                        "encode" => "encode",
                        "encode-command" => "encode-command",
                        _ => "schema",
                    });
                }
                "--schema" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--schema requires a path".to_string());
                    }
                    schema_file = Some(PathBuf::from(&args[i]));
                }
                "--container" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--container requires a name".to_string());
                    }
                    container = Some(args[i].clone());
                }
                "--command" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--command requires a name".to_string());
                    }
                    command = Some(args[i].clone());
                }
                "--hex" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--hex requires packet bytes".to_string());
                    }
                    hex = Some(args[i].clone());
                }
                "--set" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("--set requires name=value".to_string());
                    }
                    match args[i].split_once('=') {
                        Some((name, value)) => sets.push((name.to_string(), value.to_string())),
                        None => return Err(format!("--set needs name=value, got {}", args[i])),
                    }
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                other => {
                    return Err(format!("unknown argument: {other}"));
                }
            }
            i += 1;
        }

        let schema_file = schema_file.ok_or("--schema <file> is required")?;

        let mode = match action.ok_or("an action is required (see --help)")? {
            "decode" => Mode::Decode {
                container: container.ok_or("decode requires --container")?,
                hex: hex.ok_or("decode requires --hex")?,
            },
            "decode-command" => Mode::DecodeCommand {
                command: command.ok_or("decode-command requires --command")?,
                hex: hex.ok_or("decode-command requires --hex")?,
            },
            "encode" => Mode::Encode {
                container: container.ok_or("encode requires --container")?,
                sets,
            },
            "encode-command" => Mode::EncodeCommand {
                command: command.ok_or("encode-command requires --command")?,
                sets,
            },
            _ => Mode::PrintSchema,
        };

        Ok(Config { schema_file, mode })
    }
}

fn print_help() {
    println!("xtce-codec: decode and encode packets against an XTCE schema");
    println!();
    println!("USAGE:");
    println!("    xtce-codec --schema <FILE> <ACTION> [OPTIONS]");
    println!();
    println!("ACTIONS:");
    println!("    decode          Decode a telemetry packet (--container, --hex)");
    println!("    decode-command  Decode a command packet (--command, --hex)");
    println!("    encode          Encode a packet (--container, --set name=value ...)");
    println!("    encode-command  Encode a command (--command, --set name=value ...)");
    println!("    schema          Print containers, parameters, and commands");
    println!();
    println!("OPTIONS:");
    println!("    --schema <FILE>      XTCE document to load");
    println!("    --container <NAME>   Container name (qualified or unique simple name)");
    println!("    --command <NAME>     Meta-command name");
    println!("    --hex <BYTES>        Packet bytes as hex, e.g. 0x1ACFFC1D or '1a cf'");
    println!("    --set <NAME=VALUE>   Value for a parameter or argument (repeatable)");
    println!("    --help, -h           Print this help");
    println!();
    println!("VALUES:");
    println!("    Integers and floats are parsed numerically; hex:AABB denotes bytes;");
    println!("    anything else is taken as a string (enum label, boolean string).");
    println!();
    println!("EXAMPLES:");
    println!("    xtce-codec --schema sat.xml schema");
    println!("    xtce-codec --schema sat.xml decode --container CCSDSPacket --hex 0x002A0005");
    println!("    xtce-codec --schema sat.xml encode-command --command SetMode \\");
    println!("        --set opcode=3 --set mode=NOMINAL");
}
