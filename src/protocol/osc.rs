//! OSC packet codec
//!
//! Wire parsing is done by `rosc`. This module flattens bundles into the
//! queue's message type and picks out the numeric argument the router uses.
//!
//! ```text
//! Message:  [address\0 pad4][,tags\0 pad4][arg0][arg1]...
//! Bundle:   [#bundle\0][timetag u64][size i32][element]...[size i32][element]
//! ```

use rosc::{decoder, encoder, OscBundle, OscPacket, OscTime, OscType};

use crate::error::CodecError;

/// A single OSC argument
pub type OscArg = OscType;

/// Timetag meaning "process immediately"
pub const IMMEDIATE: u64 = 1;

/// Maximum bundle nesting accepted when flattening
const MAX_BUNDLE_DEPTH: usize = 8;

/// Numeric view of an argument, if it has one.
///
/// Booleans count as numbers (`T` = 1.0, `F` = 0.0) so that toggle
/// controllers can drive mapped values directly.
pub fn numeric_value(arg: &OscArg) -> Option<f64> {
    match *arg {
        OscType::Int(v) => Some(v as f64),
        OscType::Float(v) => Some(v as f64),
        OscType::Long(v) => Some(v as f64),
        OscType::Double(v) => Some(v),
        OscType::Bool(v) => Some(if v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Inbound (or outbound) OSC message: an address plus ordered arguments
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// First argument that has a numeric value
    pub fn first_numeric(&self) -> Option<f64> {
        self.args.iter().find_map(numeric_value)
    }

    /// Encode into a standalone OSC message packet
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode_packet(&OscPacket::Message(self.clone().into()))
    }
}

impl From<rosc::OscMessage> for OscMessage {
    fn from(msg: rosc::OscMessage) -> Self {
        Self {
            address: msg.addr,
            args: msg.args,
        }
    }
}

impl From<OscMessage> for rosc::OscMessage {
    fn from(msg: OscMessage) -> Self {
        Self {
            addr: msg.address,
            args: msg.args,
        }
    }
}

/// Encode several messages as one bundle
pub fn encode_bundle(timetag: u64, messages: &[OscMessage]) -> Result<Vec<u8>, CodecError> {
    let bundle = OscBundle {
        timetag: OscTime {
            seconds: (timetag >> 32) as u32,
            fractional: timetag as u32,
        },
        content: messages
            .iter()
            .cloned()
            .map(|msg| OscPacket::Message(msg.into()))
            .collect(),
    };
    encode_packet(&OscPacket::Bundle(bundle))
}

fn encode_packet(packet: &OscPacket) -> Result<Vec<u8>, CodecError> {
    encoder::encode(packet).map_err(|e| CodecError::Encode(format!("{e:?}")))
}

/// Decode a datagram into the messages it carries.
///
/// Bundles are flattened in element order. Bundle timetags are ignored and
/// every message is delivered immediately. One bad message rejects the
/// whole datagram.
pub fn decode_packet(data: &[u8]) -> Result<Vec<OscMessage>, CodecError> {
    if data.is_empty() {
        return Err(CodecError::Empty);
    }
    let (_, packet) = decoder::decode_udp(data).map_err(|e| CodecError::Malformed(format!("{e:?}")))?;

    let mut out = Vec::new();
    flatten(packet, 0, &mut out)?;
    Ok(out)
}

fn flatten(packet: OscPacket, depth: usize, out: &mut Vec<OscMessage>) -> Result<(), CodecError> {
    match packet {
        OscPacket::Message(msg) => {
            if !msg.addr.starts_with('/') {
                return Err(CodecError::InvalidAddress(msg.addr));
            }
            out.push(msg.into());
        }
        OscPacket::Bundle(bundle) => {
            if depth >= MAX_BUNDLE_DEPTH {
                return Err(CodecError::TooDeep(MAX_BUNDLE_DEPTH));
            }
            for element in bundle.content {
                flatten(element, depth + 1, out)?;
            }
        }
    }
    Ok(())
}
