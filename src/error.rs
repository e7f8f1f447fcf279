//! Error types for the OSC router

use thiserror::Error;

/// Main error type for the router
#[derive(Error, Debug)]
pub enum Error {
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("OSC codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Apply error: {0}")]
    Apply(#[from] ApplyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle errors surfaced by `ServerRuntime::start`
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Server already started")]
    AlreadyRunning,

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Failed to spawn listener thread: {0}")]
    Spawn(String),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),

    #[error("Socket bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to set socket option {option}: {source}")]
    SocketOption {
        option: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    #[error("Listener runtime error: {0}")]
    Runtime(String),
}

/// OSC codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Malformed OSC packet: {0}")]
    Malformed(String),

    #[error("Invalid address pattern: {0:?}")]
    InvalidAddress(String),

    #[error("Bundle nesting deeper than {0}")]
    TooDeep(usize),

    #[error("Empty packet")]
    Empty,

    #[error("Failed to encode OSC packet: {0}")]
    Encode(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine a configuration directory")]
    NoConfigDir,

    #[error("Mapping index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors raised by an apply layer for a single update command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Unresolved target path: {0}")]
    UnresolvedTarget(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Shape key not found: {object}/{shape_key}")]
    ShapeKeyNotFound { object: String, shape_key: String },

    #[error("Bone not found: {armature}/{bone}")]
    BoneNotFound { armature: String, bone: String },

    #[error("Unsupported target: {0}")]
    Unsupported(String),

    #[error("Value rejected: {0}")]
    Rejected(String),
}

/// Result type alias for the router
pub type Result<T> = std::result::Result<T, Error>;
