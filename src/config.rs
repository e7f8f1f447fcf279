//! Application configuration
//!
//! One file holds the server bind settings, processor cadence and the
//! ordered mapping records:
//!
//! ```toml
//! [server]
//! ip = "0.0.0.0"
//! port = 9000
//!
//! [processor]
//! max_per_tick = 100
//!
//! [[mappings.character]]
//! address = "/face/jawOpen"
//! object = "Face"
//! shape_key = "jawOpen"
//!
//! [[mappings.generic]]
//! address = "/Cube/location"
//! data_path = "objects['Cube'].location[0]"
//! min_out = -2.0
//! max_out = 2.0
//! ```
//!
//! Files ending in `.json` are read and written as JSON instead of TOML.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::ConfigError;
use crate::mapping::rule::{Axis, CharacterTarget, MappingRule, RotationMode, RuleKind, ValueRange};
use crate::mapping::target::PropertyTarget;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub processor: ProcessorConfig,
    pub mappings: MappingConfig,
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0" for all interfaces
    pub ip: String,
    /// UDP port, 1-65535
    pub port: u16,
    /// Requested SO_RCVBUF size
    pub recv_buffer_bytes: usize,
    /// Message queue capacity; pushes beyond it are dropped
    pub queue_capacity: usize,
    /// Largest datagram accepted by the listener
    pub max_datagram_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: DEFAULT_BIND_IP.to_string(),
            port: DEFAULT_OSC_PORT,
            recv_buffer_bytes: DEFAULT_RECV_BUFFER_BYTES,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_datagram_bytes: MAX_DATAGRAM_SIZE,
        }
    }
}

/// Batch processor cadence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Most messages drained in one tick
    pub max_per_tick: usize,
    /// Delay before the next tick after work was done
    pub tick_interval_ms: u64,
    /// Delay before the next tick after an empty drain
    pub idle_interval_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_per_tick: DEFAULT_MAX_PER_TICK,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            idle_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

impl ProcessorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

/// Shape key / bone rotation mapping record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub shape_key: String,
    #[serde(default)]
    pub armature: String,
    #[serde(default)]
    pub bone: String,
    #[serde(default)]
    pub axis: Axis,
    #[serde(default)]
    pub rotation_mode: RotationMode,
    #[serde(default)]
    pub min_in: f64,
    #[serde(default = "default_one")]
    pub max_in: f64,
    #[serde(default)]
    pub min_out: f64,
    #[serde(default = "default_one")]
    pub max_out: f64,
    #[serde(default = "default_true")]
    pub clamp: bool,
    #[serde(default)]
    pub invert: bool,
}

impl Default for CharacterRecord {
    fn default() -> Self {
        Self {
            address: default_address(),
            object: String::new(),
            shape_key: String::new(),
            armature: String::new(),
            bone: String::new(),
            axis: Axis::default(),
            rotation_mode: RotationMode::default(),
            min_in: 0.0,
            max_in: 1.0,
            min_out: 0.0,
            max_out: 1.0,
            clamp: true,
            invert: false,
        }
    }
}

impl CharacterRecord {
    /// Shape key record addressed as `/<shape_key>`
    pub fn shape_key(object: &str, shape_key: &str) -> Self {
        Self {
            address: format!("/{shape_key}"),
            object: object.to_string(),
            shape_key: shape_key.to_string(),
            ..Default::default()
        }
    }

    /// Build the rule; names are trimmed and nothing is validated
    pub fn to_rule(&self) -> MappingRule {
        MappingRule {
            address: self.address.trim().to_string(),
            input: ValueRange::new(self.min_in, self.max_in),
            output: ValueRange::new(self.min_out, self.max_out),
            clamp: self.clamp,
            invert: self.invert,
            kind: RuleKind::Character(CharacterTarget {
                object: self.object.trim().to_string(),
                shape_key: self.shape_key.trim().to_string(),
                armature: self.armature.trim().to_string(),
                bone: self.bone.trim().to_string(),
                axis: self.axis,
                rotation_mode: self.rotation_mode,
            }),
        }
    }
}

/// Data-path mapping record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRecord {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default)]
    pub data_path: String,
    #[serde(default)]
    pub min_in: f64,
    #[serde(default = "default_one")]
    pub max_in: f64,
    #[serde(default)]
    pub min_out: f64,
    #[serde(default = "default_one")]
    pub max_out: f64,
    #[serde(default = "default_true")]
    pub clamp: bool,
    #[serde(default)]
    pub invert: bool,
}

impl Default for GenericRecord {
    fn default() -> Self {
        Self {
            address: default_address(),
            data_path: "objects['Cube'].location[0]".to_string(),
            min_in: 0.0,
            max_in: 1.0,
            min_out: 0.0,
            max_out: 1.0,
            clamp: true,
            invert: false,
        }
    }
}

impl GenericRecord {
    /// Build the rule; an unparsable data path becomes an unresolved target
    pub fn to_rule(&self) -> MappingRule {
        MappingRule {
            address: self.address.trim().to_string(),
            input: ValueRange::new(self.min_in, self.max_in),
            output: ValueRange::new(self.min_out, self.max_out),
            clamp: self.clamp,
            invert: self.invert,
            kind: RuleKind::Generic(PropertyTarget::parse_lenient(&self.data_path)),
        }
    }
}

/// Ordered mapping records, one list per rule category
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    pub character: Vec<CharacterRecord>,
    pub generic: Vec<GenericRecord>,
}

impl MappingConfig {
    pub fn len(&self) -> usize {
        self.character.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a blank character record and return its index
    pub fn add_character(&mut self) -> usize {
        self.character.push(CharacterRecord::default());
        self.character.len() - 1
    }

    /// Append a blank generic record and return its index
    pub fn add_generic(&mut self) -> usize {
        self.generic.push(GenericRecord::default());
        self.generic.len() - 1
    }

    /// Append a copy of the character record at `index`
    pub fn duplicate_character(&mut self, index: usize) -> Result<usize, ConfigError> {
        let copy = checked(&self.character, index)?.clone();
        self.character.push(copy);
        Ok(self.character.len() - 1)
    }

    /// Append a copy of the generic record at `index`
    pub fn duplicate_generic(&mut self, index: usize) -> Result<usize, ConfigError> {
        let copy = checked(&self.generic, index)?.clone();
        self.generic.push(copy);
        Ok(self.generic.len() - 1)
    }

    pub fn remove_character(&mut self, index: usize) -> Result<CharacterRecord, ConfigError> {
        checked(&self.character, index)?;
        Ok(self.character.remove(index))
    }

    pub fn remove_generic(&mut self, index: usize) -> Result<GenericRecord, ConfigError> {
        checked(&self.generic, index)?;
        Ok(self.generic.remove(index))
    }

    /// All rules in routing order: character records, then generic records
    pub fn rules(&self) -> impl Iterator<Item = MappingRule> + '_ {
        self.character
            .iter()
            .map(CharacterRecord::to_rule)
            .chain(self.generic.iter().map(GenericRecord::to_rule))
    }
}

fn checked<T>(items: &[T], index: usize) -> Result<&T, ConfigError> {
    items.get(index).ok_or(ConfigError::IndexOutOfRange {
        index,
        len: items.len(),
    })
}

impl AppConfig {
    /// Default config file location for this platform
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", APP_NAME)
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = if is_json(path) {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load_or_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = if is_json(path) {
            serde_json::to_string_pretty(self)?
        } else {
            self.to_toml_string()?
        };
        let write_err = |source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)
    }

    /// Reject settings the runtime cannot work with.
    ///
    /// Mapping records are not checked here; bad targets surface when the
    /// host applies them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.server.port == 0 {
            return invalid("server.port must be in 1..=65535");
        }
        if self.server.ip.trim().is_empty() {
            return invalid("server.ip must not be empty");
        }
        if self.server.queue_capacity == 0 {
            return invalid("server.queue_capacity must be positive");
        }
        if self.server.max_datagram_bytes == 0 {
            return invalid("server.max_datagram_bytes must be positive");
        }
        if self.processor.max_per_tick == 0 {
            return invalid("processor.max_per_tick must be positive");
        }
        if self.processor.tick_interval_ms == 0 || self.processor.idle_interval_ms == 0 {
            return invalid("processor intervals must be positive");
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
port = 9001

[[mappings.character]]
address = " /face/smile "
object = "Face"
shape_key = "mouthSmile"
armature = "Rig"
bone = "lip"
axis = "z"
rotation_mode = "QUATERNION"
invert = true

[[mappings.generic]]
address = "/cube/x"
data_path = "objects['Cube'].location[0]"
min_out = -2.0
max_out = 2.0
clamp = false
"#;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.ip, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.queue_capacity, 10_000);
        assert_eq!(config.processor.max_per_tick, 100);
        assert_eq!(config.processor.tick_interval(), Duration::from_millis(10));
        assert!(config.mappings.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.ip, "0.0.0.0");

        let character = &config.mappings.character[0];
        assert_eq!(character.axis, Axis::Z);
        assert_eq!(character.rotation_mode, RotationMode::Quaternion);
        assert!(character.clamp);
        assert_eq!(character.max_in, 1.0);

        let rules: Vec<_> = config.mappings.rules().collect();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].address, "/face/smile");
        assert!(rules[0].invert);
        assert!(matches!(
            rules[1].kind,
            RuleKind::Generic(PropertyTarget::ArrayElement { index: 0, .. })
        ));
        assert_eq!(rules[1].output, ValueRange::new(-2.0, 2.0));
        assert!(!rules[1].clamp);
    }

    #[test]
    fn test_toml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.mappings.add_generic();
        config.save(&path).unwrap();

        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = AppConfig::from_toml_str(SAMPLE).unwrap();
        config.save(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_start().starts_with('{'));
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = AppConfig::default();
        config.processor.max_per_tick = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_editing_helpers() {
        let mut mappings = MappingConfig::default();
        let first = mappings.add_character();
        mappings.character[first].address = "/a".into();
        let copy = mappings.duplicate_character(first).unwrap();
        assert_eq!(copy, 1);
        assert_eq!(mappings.character[copy].address, "/a");

        assert!(matches!(
            mappings.duplicate_generic(0),
            Err(ConfigError::IndexOutOfRange { index: 0, len: 0 })
        ));

        mappings.add_generic();
        assert_eq!(mappings.len(), 3);
        assert_eq!(mappings.remove_character(0).unwrap().address, "/a");
        assert!(mappings.remove_character(5).is_err());
        assert_eq!(mappings.remove_generic(0).unwrap().address, "/param");
        assert_eq!(mappings.len(), 1);
    }
}
