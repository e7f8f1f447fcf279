//! Wire protocol
//!
//! Open Sound Control 1.0: messages, bundles and typed arguments.

pub mod osc;

pub use osc::{decode_packet, encode_bundle, numeric_value, OscArg, OscMessage, IMMEDIATE};
