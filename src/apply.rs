//! Host apply layer seam
//!
//! The batch processor only *describes* effects as [`UpdateCommand`]s. A host
//! implements [`ApplyTarget`] to perform them, and [`apply_batch`] runs one
//! tick's worth of commands with per-command failure isolation followed by a
//! single refresh.

use std::collections::HashMap;

use crate::error::ApplyError;
use crate::mapping::target::{PropertyTarget, Target};

/// One concrete effect produced by the batch processor
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateCommand {
    /// Address of the message that produced this command
    pub address: String,
    /// Position of the producing rule within its address group
    pub rule_index: usize,
    pub target: Target,
    pub value: f64,
}

/// Something that can perform update commands, typically a host adapter
pub trait ApplyTarget {
    /// Perform one command
    fn apply(&mut self, command: &UpdateCommand) -> Result<(), ApplyError>;

    /// Called once after a batch in which at least one command succeeded
    fn refresh(&mut self) {}
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: usize,
    /// Failed commands by position in the batch
    pub failures: Vec<(usize, ApplyError)>,
    pub refreshed: bool,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply every command in order. A failing command is recorded and skipped;
/// the rest of the batch still runs.
pub fn apply_batch<T: ApplyTarget + ?Sized>(target: &mut T, commands: &[UpdateCommand]) -> ApplyReport {
    let mut report = ApplyReport::default();

    for (i, command) in commands.iter().enumerate() {
        match target.apply(command) {
            Ok(()) => report.applied += 1,
            Err(e) => {
                tracing::warn!("Failed to apply {} from {}: {}", command.target, command.address, e);
                report.failures.push((i, e));
            }
        }
    }

    if report.applied > 0 {
        target.refresh();
        report.refreshed = true;
    }

    report
}

/// Apply target that only logs what it would do
#[derive(Debug, Default)]
pub struct LogSink {
    pub applied: u64,
}

impl ApplyTarget for LogSink {
    fn apply(&mut self, command: &UpdateCommand) -> Result<(), ApplyError> {
        if let Target::Property(PropertyTarget::Unresolved(path)) = &command.target {
            return Err(ApplyError::UnresolvedTarget(path.clone()));
        }
        tracing::info!("{} -> {} = {:.4}", command.address, command.target, command.value);
        self.applied += 1;
        Ok(())
    }
}

/// Last value written to each target.
///
/// Stands in for a host scene: it rejects unresolved paths and non-finite
/// values, and counts refreshes so batching can be observed.
#[derive(Debug, Default)]
pub struct LatestValues {
    values: HashMap<Target, f64>,
    refreshes: u64,
}

impl LatestValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: &Target) -> Option<f64> {
        self.values.get(target).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Target, f64)> {
        self.values.iter().map(|(t, v)| (t, *v))
    }
}

impl ApplyTarget for LatestValues {
    fn apply(&mut self, command: &UpdateCommand) -> Result<(), ApplyError> {
        if let Target::Property(PropertyTarget::Unresolved(path)) = &command.target {
            return Err(ApplyError::UnresolvedTarget(path.clone()));
        }
        if !command.value.is_finite() {
            return Err(ApplyError::Rejected(format!("{} is not finite", command.value)));
        }
        self.values.insert(command.target.clone(), command.value);
        Ok(())
    }

    fn refresh(&mut self) {
        self.refreshes += 1;
    }
}
