use thiserror::Error;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid glob pattern {pattern:?}: {message}")]
    Glob { pattern: String, message: String },

    #[error("Schema error ({action}): {message}")]
    Schema { action: String, message: String },

    #[error("Host error: {0}")]
    Host(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Terminal error ({shell}): {message}")]
    Terminal { shell: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Toml(_) | Self::Glob { .. } => 3,
            _ => 2,
        }
    }
}
