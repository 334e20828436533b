//! Error types shared by every layer of the crate.

use thiserror::Error;

/// Errors raised while preparing, starting or tearing down a container.
#[derive(Debug, Error)]
pub enum ItestError {
    /// Invalid flag value or option combination (user-fixable).
    #[error("config: {0}")]
    Config(String),

    /// A required environment variable is absent or empty.
    #[error("No environment variable found: {0:?}")]
    MissingEnv(String),

    /// Image pull or lookup failed.
    #[error("image {image}: {reason}")]
    Image { image: String, reason: String },

    /// The engine rejected or failed a container operation.
    #[error("engine: {0}")]
    Engine(String),

    /// Container does not exist (anymore).
    #[error("container not found: {0}")]
    NotFound(String),

    /// Error surfaced by the Docker API client.
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Generic IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type ItestResult<T> = Result<T, ItestError>;

impl ItestError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn image(image: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Image {
            image: image.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_display_quotes_name() {
        let err = ItestError::MissingEnv("DB_PASSWORD".into());
        assert_eq!(
            err.to_string(),
            "No environment variable found: \"DB_PASSWORD\""
        );
    }

    #[test]
    fn test_image_error_display() {
        let err = ItestError::image("postgres:16", "manifest unknown");
        assert_eq!(err.to_string(), "image postgres:16: manifest unknown");
    }

    #[test]
    fn test_io_conversion() {
        let err: ItestError = std::io::Error::other("boom").into();
        assert!(matches!(err, ItestError::Io(_)));
    }
}
