//! # OSC Router
//!
//! Receives OSC control messages over UDP and turns them into ordered,
//! range-mapped update commands for a host application (facial shape keys,
//! bone rotations, arbitrary scene properties).
//!
//! ## Architecture Overview
//!
//! ```text
//!   Face tracker / controller / DAW
//!                │  OSC over UDP
//!                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Listener thread (server::listener)              │
//! │   socket2 bind ─► tokio recv_from ◄─ select! ─► shutdown watch  │
//! │                │                                                │
//! │                ▼  protocol::decode_packet (messages + bundles)  │
//! └────────────────┼────────────────────────────────────────────────┘
//!                  │  push (refuse newest when full)
//!                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │          Bounded message queue (server::queue, lock-free)        │
//! └────────────────┼────────────────────────────────────────────────┘
//!                  │  drain_up_to(max_per_tick)
//!                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              Tick loop, host thread (server::processor)          │
//! │                                                                 │
//! │   RuleSource ─► RoutingTable   address ─► [MappingRule ...]     │
//! │                                   │                             │
//! │                                   ▼  map_value + fan-out        │
//! │                           [UpdateCommand ...]                   │
//! └────────────────┼────────────────────────────────────────────────┘
//!                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │     apply::apply_batch ─► ApplyTarget (host) ─► one refresh      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The queue is the only structure shared between threads. Everything that
//! mutates targets runs on the tick loop's thread.

pub mod apply;
pub mod config;
pub mod error;
pub mod mapping;
pub mod protocol;
pub mod server;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Application name, used for the config directory
    pub const APP_NAME: &str = "osc-router";

    /// Config file name inside the config directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Default bind address (all interfaces)
    pub const DEFAULT_BIND_IP: &str = "0.0.0.0";

    /// Default UDP port for OSC
    pub const DEFAULT_OSC_PORT: u16 = 9000;

    /// Requested socket receive buffer
    pub const DEFAULT_RECV_BUFFER_BYTES: usize = 1 << 20;

    /// Message queue capacity
    pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

    /// Largest UDP payload over IPv4
    pub const MAX_DATAGRAM_SIZE: usize = 65_507;

    /// Messages drained per tick
    pub const DEFAULT_MAX_PER_TICK: usize = 100;

    /// Tick cadence in milliseconds
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 10;

    /// Address given to newly added mapping records
    pub const DEFAULT_ADDRESS: &str = "/param";
}
