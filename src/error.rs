use thiserror::Error;

/// Result alias used by the fallible configuration, codec and registry paths.
pub type Result<T> = std::result::Result<T, BurningError>;

/// Errors surfaced by the routing engine.
///
/// Missing storages, missing propagators and zero-capacity outcomes are not
/// errors; they are reported as `None` or as `0` inserted.
#[derive(Debug, Error)]
pub enum BurningError {
    /// A persisted record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// A configuration document could not be parsed.
    #[error("configuration error: {0}")]
    Config(#[from] toml::de::Error),
    /// A caller supplied an argument the engine refuses to accept.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}
