//! OSC server: listener thread, message queue, lifecycle and tick processing

pub mod lifecycle;
pub mod listener;
pub mod processor;
pub mod queue;

pub use lifecycle::{ServerRuntime, ServerState};
pub use listener::{ListenerSettings, ListenerStatsSnapshot};
pub use processor::{BatchProcessor, ProcessorStats, Schedule, TickOutcome};
pub use queue::{MessageQueue, SharedQueue};

use std::net::SocketAddr;

use crate::config::AppConfig;
use crate::error::ServerError;
use crate::mapping::table::RuleSource;

/// A server runtime, its batch processor and the rules they route with
pub struct OscRouter<S: RuleSource> {
    runtime: ServerRuntime,
    processor: BatchProcessor,
    source: S,
}

impl<S: RuleSource> OscRouter<S> {
    pub fn new(config: &AppConfig, source: S) -> Self {
        Self {
            runtime: ServerRuntime::new(&config.server),
            processor: BatchProcessor::new(&config.processor),
            source,
        }
    }

    pub fn start(&mut self, ip: &str, port: u16) -> Result<SocketAddr, ServerError> {
        self.runtime.start(ip, port)
    }

    pub fn stop(&mut self) {
        self.runtime.stop();
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.processor.tick(&self.runtime, &self.source)
    }

    pub fn runtime(&self) -> &ServerRuntime {
        &self.runtime
    }

    pub fn processor(&self) -> &BatchProcessor {
        &self.processor
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
