//! Routing table
//!
//! Groups rules by exact address. Within an address the rules keep the
//! order in which the configuration enumerates them, because every rule on
//! an address fires, in order, for each message.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::MappingConfig;
use crate::error::ConfigError;
use crate::mapping::rule::MappingRule;

/// Anything that can enumerate the current mapping rules
pub trait RuleSource {
    /// Visit every configured rule in routing order
    fn for_each_rule(&self, visit: &mut dyn FnMut(MappingRule)) -> Result<(), ConfigError>;
}

impl RuleSource for MappingConfig {
    fn for_each_rule(&self, visit: &mut dyn FnMut(MappingRule)) -> Result<(), ConfigError> {
        self.rules().for_each(visit);
        Ok(())
    }
}

impl RuleSource for [MappingRule] {
    fn for_each_rule(&self, visit: &mut dyn FnMut(MappingRule)) -> Result<(), ConfigError> {
        self.iter().cloned().for_each(visit);
        Ok(())
    }
}

impl RuleSource for Vec<MappingRule> {
    fn for_each_rule(&self, visit: &mut dyn FnMut(MappingRule)) -> Result<(), ConfigError> {
        self.as_slice().for_each_rule(visit)
    }
}

/// Mapping config shared between the tick loop and whatever edits it
#[derive(Debug, Clone, Default)]
pub struct SharedMappings {
    inner: Arc<RwLock<MappingConfig>>,
}

impl SharedMappings {
    pub fn new(config: MappingConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Swap in a new configuration; the next tick sees it
    pub fn replace(&self, config: MappingConfig) {
        *self.inner.write() = config;
    }

    /// Edit in place under the write lock
    pub fn update<R>(&self, edit: impl FnOnce(&mut MappingConfig) -> R) -> R {
        edit(&mut self.inner.write())
    }

    pub fn snapshot(&self) -> MappingConfig {
        self.inner.read().clone()
    }
}

impl RuleSource for SharedMappings {
    fn for_each_rule(&self, visit: &mut dyn FnMut(MappingRule)) -> Result<(), ConfigError> {
        self.inner.read().for_each_rule(visit)
    }
}

/// Address → ordered rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingTable {
    routes: HashMap<String, Vec<MappingRule>>,
    rule_count: usize,
}

impl RoutingTable {
    /// Build from a rule source. Rules are never validated here.
    pub fn build<S: RuleSource + ?Sized>(source: &S) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        source.for_each_rule(&mut |rule| table.insert(rule))?;
        Ok(table)
    }

    pub fn from_rules(rules: impl IntoIterator<Item = MappingRule>) -> Self {
        let mut table = Self::default();
        rules.into_iter().for_each(|rule| table.insert(rule));
        table
    }

    /// Append a rule after any already registered on its address
    pub fn insert(&mut self, rule: MappingRule) {
        self.routes.entry(rule.address.clone()).or_default().push(rule);
        self.rule_count += 1;
    }

    /// Rules for an exact address, in registration order
    pub fn lookup(&self, address: &str) -> Option<&[MappingRule]> {
        self.routes.get(address).map(Vec::as_slice)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.routes.contains_key(address)
    }

    /// Registered addresses, sorted
    pub fn addresses(&self) -> Vec<&str> {
        let mut addresses: Vec<_> = self.routes.keys().map(String::as_str).collect();
        addresses.sort_unstable();
        addresses
    }

    pub fn address_count(&self) -> usize {
        self.routes.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rule_count
    }

    pub fn is_empty(&self) -> bool {
        self.rule_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CharacterRecord, GenericRecord};
    use crate::mapping::rule::RuleKind;
    use crate::mapping::target::PropertyTarget;

    fn sample_config() -> MappingConfig {
        MappingConfig {
            character: vec![
                CharacterRecord::shape_key("Face", "mouthSmile"),
                CharacterRecord {
                    address: "/x".into(),
                    object: "Face".into(),
                    shape_key: "A".into(),
                    ..Default::default()
                },
            ],
            generic: vec![
                GenericRecord {
                    address: "/x".into(),
                    data_path: "objects['Cube'].location[1]".into(),
                    ..Default::default()
                },
                GenericRecord {
                    address: "".into(),
                    data_path: "".into(),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn test_groups_preserve_order_across_categories() {
        let table = RoutingTable::build(&sample_config()).unwrap();
        let rules = table.lookup("/x").unwrap();
        assert_eq!(rules.len(), 2);
        assert!(matches!(rules[0].kind, RuleKind::Character(_)));
        assert!(matches!(rules[1].kind, RuleKind::Generic(_)));
        assert!(table.lookup("/mouthSmile").is_some());
        assert!(table.lookup("/missing").is_none());
    }

    #[test]
    fn test_malformed_entries_are_kept() {
        let table = RoutingTable::build(&sample_config()).unwrap();
        assert_eq!(table.rule_count(), 4);
        let empty = table.lookup("").unwrap();
        assert!(matches!(
            &empty[0].kind,
            RuleKind::Generic(PropertyTarget::Unresolved(text)) if text.is_empty()
        ));
    }

    #[test]
    fn test_build_is_deterministic() {
        let config = sample_config();
        let a = RoutingTable::build(&config).unwrap();
        let b = RoutingTable::build(&config).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.addresses(), vec!["", "/mouthSmile", "/x"]);
    }

    #[test]
    fn test_shared_mappings_changes_are_visible() {
        let shared = SharedMappings::default();
        assert!(RoutingTable::build(&shared).unwrap().is_empty());

        shared.update(|config| {
            let i = config.add_generic();
            config.generic[i].address = "/late".into();
        });
        let table = RoutingTable::build(&shared).unwrap();
        assert!(table.contains("/late"));

        shared.replace(MappingConfig::default());
        assert!(RoutingTable::build(&shared).unwrap().is_empty());
    }

    #[test]
    fn test_from_rules() {
        let rule = CharacterRecord::shape_key("Face", "jawOpen").to_rule();
        let table = RoutingTable::from_rules(vec![rule.clone(), rule]);
        assert_eq!(table.address_count(), 1);
        assert_eq!(table.lookup("/jawOpen").map(<[_]>::len), Some(2));
    }
}
