//! Batch processor
//!
//! Runs on the host's single control thread at a fixed cadence. Each tick
//! drains a bounded batch from the queue, routes every message through the
//! current routing table and returns the resulting update commands in
//! order. Applying them is the caller's job (see [`crate::apply`]).

use std::time::Duration;

use crate::apply::UpdateCommand;
use crate::config::ProcessorConfig;
use crate::mapping::table::{RoutingTable, RuleSource};
use crate::protocol::OscMessage;
use crate::server::lifecycle::ServerRuntime;

/// What the caller should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Server is not running; do not tick again
    Stop,
    /// Queue was empty; tick again after the idle delay
    Idle(Duration),
    /// Work was done; tick again after the tick interval
    Again(Duration),
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub commands: Vec<UpdateCommand>,
    pub schedule: Schedule,
}

impl TickOutcome {
    pub fn schedule_again(&self) -> bool {
        !matches!(self.schedule, Schedule::Stop)
    }

    pub fn next_delay(&self) -> Option<Duration> {
        match self.schedule {
            Schedule::Stop => None,
            Schedule::Idle(delay) | Schedule::Again(delay) => Some(delay),
        }
    }
}

/// Counters accumulated across ticks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub ticks: u64,
    pub messages: u64,
    /// Messages with no numeric argument
    pub non_numeric: u64,
    /// Messages whose address had no rules
    pub unrouted: u64,
    pub commands: u64,
    pub table_errors: u64,
}

/// Drains the queue and turns messages into update commands
#[derive(Debug)]
pub struct BatchProcessor {
    max_per_tick: usize,
    tick_interval: Duration,
    idle_interval: Duration,
    stats: ProcessorStats,
}

impl BatchProcessor {
    pub fn new(config: &ProcessorConfig) -> Self {
        Self {
            max_per_tick: config.max_per_tick,
            tick_interval: config.tick_interval(),
            idle_interval: config.idle_interval(),
            stats: ProcessorStats::default(),
        }
    }

    /// Run one tick against `runtime`, routing with rules from `source`.
    ///
    /// The routing table is rebuilt from `source` on every tick that has
    /// messages, so configuration edits apply from the next batch on. If the
    /// source fails, that batch is routed through an empty table.
    pub fn tick<S: RuleSource + ?Sized>(&mut self, runtime: &ServerRuntime, source: &S) -> TickOutcome {
        if !runtime.is_running() {
            return TickOutcome {
                commands: Vec::new(),
                schedule: Schedule::Stop,
            };
        }
        self.stats.ticks += 1;

        let batch = runtime.queue().drain_up_to(self.max_per_tick);
        if batch.is_empty() {
            return TickOutcome {
                commands: Vec::new(),
                schedule: Schedule::Idle(self.idle_interval),
            };
        }

        let table = match RoutingTable::build(source) {
            Ok(table) => table,
            Err(e) => {
                self.stats.table_errors += 1;
                tracing::warn!("Could not read mappings, routing nothing this tick: {}", e);
                RoutingTable::default()
            }
        };

        TickOutcome {
            commands: self.process(&table, &batch),
            schedule: Schedule::Again(self.tick_interval),
        }
    }

    /// Route a batch of messages through `table`
    pub fn process(&mut self, table: &RoutingTable, messages: &[OscMessage]) -> Vec<UpdateCommand> {
        let mut commands = Vec::new();

        for msg in messages {
            self.stats.messages += 1;

            let Some(value) = msg.first_numeric() else {
                self.stats.non_numeric += 1;
                tracing::debug!("No numeric argument in {}, dropping", msg.address);
                continue;
            };

            let Some(rules) = table.lookup(&msg.address) else {
                self.stats.unrouted += 1;
                tracing::trace!("No rules for {}", msg.address);
                continue;
            };

            for (rule_index, rule) in rules.iter().enumerate() {
                let mapped = rule.map_value(value);
                commands.extend(rule.targets().map(|target| UpdateCommand {
                    address: msg.address.clone(),
                    rule_index,
                    target,
                    value: mapped,
                }));
            }
        }

        self.stats.commands += commands.len() as u64;
        commands
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    pub fn max_per_tick(&self) -> usize {
        self.max_per_tick
    }
}

impl Default for BatchProcessor {
    fn default() -> Self {
        Self::new(&ProcessorConfig::default())
    }
}
