//! Core error type

/// Standard result type for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Errors raised by storage, configuration and serialization helpers
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Storage operation failed: {message}")]
    Storage { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl CoreError {
    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_error(err.to_string())
    }
}

impl From<config::ConfigError> for CoreError {
    fn from(err: config::ConfigError) -> Self {
        Self::invalid_config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_maps_to_storage() {
        let err: CoreError = std::io::Error::other("denied").into();
        assert!(matches!(err, CoreError::Storage { .. }));
        assert_eq!(err.to_string(), "Storage operation failed: denied");
    }

    #[test]
    fn test_config_error_maps_to_invalid_config() {
        let err: CoreError = config::ConfigError::Message("api.base_url: bad".into()).into();
        assert_eq!(err.to_string(), "Invalid configuration: api.base_url: bad");
    }
}
