use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileFusionError {
    #[error("Rule document '{identifier}' could not be loaded: {message}")]
    RuleLoad { identifier: String, message: String },

    #[error("Condition '{condition}' failed: {message}")]
    ConditionEvaluation { condition: String, message: String },

    #[error("Cannot read attributes of {path}: {source}")]
    AttributeExtraction {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to relocate {path} after {attempts} attempt(s): {message}")]
    Relocation {
        path: PathBuf,
        attempts: u32,
        message: String,
    },

    #[error("Destination '{destination}' escapes the destination root")]
    UnsafeDestination { destination: String },

    #[error("Source directory does not exist: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Source is not a directory: {path}")]
    SourceNotDirectory { path: PathBuf },

    #[error("Destination directory cannot be created: {path}: {message}")]
    DestinationUnavailable { path: PathBuf, message: String },

    #[error("Source and destination are the same directory: {path}")]
    SourceIsDestination { path: PathBuf },

    #[error("Another organize run holds the lock: {path}")]
    AlreadyRunning { path: PathBuf },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Config key not found: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Invalid config value for {key}: {message}")]
    InvalidConfigValue { key: String, message: String },

    #[error("Invalid exclude pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Home directory not found")]
    HomeNotFound,
}

pub type Result<T> = std::result::Result<T, FileFusionError>;

impl FileFusionError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceNotFound { .. } | Self::SourceNotDirectory { .. } => 2,
            Self::DestinationUnavailable { .. } => 3,
            Self::SourceIsDestination { .. } => 4,
            Self::AlreadyRunning { .. } => 5,
            _ => 1,
        }
    }

    /// Setup errors abort a run before any file is touched.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFound { .. }
                | Self::SourceNotDirectory { .. }
                | Self::DestinationUnavailable { .. }
                | Self::SourceIsDestination { .. }
        )
    }
}
