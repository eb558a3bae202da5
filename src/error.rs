use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid target format: {0}")]
    InvalidTarget(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Module {module} failed: {message}")]
    Module { module: String, message: String },

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<toml::ser::Error> for ScanError {
    fn from(err: toml::ser::Error) -> Self {
        ScanError::Unknown(format!("Failed to serialize config: {}", err))
    }
}

impl ScanError {
    /// Shorthand used by module implementations to report a fault.
    pub fn module(module: impl Into<String>, message: impl Into<String>) -> Self {
        ScanError::Module {
            module: module.into(),
            message: message.into(),
        }
    }
}
