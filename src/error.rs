use std::path::PathBuf;

/// Errors returned by the tubercle measurement library.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(
        "invalid configuration: unknown profile '{name}', valid profiles: {}",
        valid.join(", ")
    )]
    UnknownProfile { name: String, valid: Vec<String> },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to load image {}: {source}", path.display())]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("toml: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("toml: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }
}
