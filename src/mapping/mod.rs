//! Address routing and value mapping
//!
//! Configuration records become [`MappingRule`]s, which are grouped by
//! address into a [`RoutingTable`] on every processing tick that has work.

pub mod presets;
pub mod rule;
pub mod table;
pub mod target;

pub use rule::{Axis, CharacterTarget, MappingRule, RotationMode, RuleKind, ValueRange};
pub use table::{RoutingTable, RuleSource, SharedMappings};
pub use target::{PropertyTarget, Target};
