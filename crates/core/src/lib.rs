//! xtce-codec-core: schema-driven spacecraft packet codec
//!
//! This library compiles an XTCE 1.3 SpaceSystem description into an
//! immutable runtime schema, then decodes binary telemetry/command
//! packets into named, typed values and encodes value maps back into
//! bit-exact packets.
//!
//! # Architecture
//!
//! The system is designed around clear module boundaries:
//! - `bitio`: MSB-first bit-level reading/writing with seeking
//! - `encoding`: the closed family of wire encodings
//! - `calibrate`: polynomial raw/engineering calibration
//! - `types`: parameter and argument types over the encodings
//! - `compare`: restriction and include-condition predicates
//! - `container`: container inheritance and the packet walk engine
//! - `schema`: space system declarations and the compiled index
//! - `loader`: XTCE XML ingestion (quick-xml)
//! - `codec`: the public decode/encode API
//!
//! # Design Principles
//!
//! - **No panics**: all errors are structured and carry context
//! - **Immutable schema**: built once, shared freely across threads
//! - **Closed unions**: every dispatch is an exhaustive match; what
//!   the support matrix excludes is rejected at load, not at runtime
//! - **Pure calls**: decode/encode own their cursors and scopes and
//!   share nothing between concurrent calls

pub mod bitio;
pub mod calibrate;
pub mod codec;
pub mod compare;
pub mod container;
pub mod encoding;
pub mod error;
pub mod loader;
pub mod schema;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use codec::{decode_command, decode_packet, encode_command, encode_packet, DecodedPacket};
pub use error::{Error, Result};
pub use loader::{load_file, load_str};
pub use schema::{Schema, SpaceSystem};
pub use value::{ParameterValue, Value, ValueMap};
