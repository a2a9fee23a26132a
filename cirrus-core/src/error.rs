use thiserror::Error;

#[derive(Error, Debug)]
pub enum CirrusError {
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid input for {field}: {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Unexpected configuration payload: expected {expected}, got {actual}")]
    UnexpectedPayload { expected: String, actual: String },

    #[error("Cluster operation '{operation}' failed: {details}")]
    ClusterOperationFailed { operation: String, details: String },

    #[error("Endpoint does not support cluster configuration: {message}")]
    UnsupportedEndpoint { message: String },

    #[error("Lock poisoned during {operation}")]
    LockPoisoned { operation: String },

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CirrusError {
    /// Shorthand for lock poisoning inside in-process state guards.
    pub fn lock_poisoned(operation: &str) -> Self {
        CirrusError::LockPoisoned {
            operation: operation.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CirrusError>;
pub type CirrusResult<T> = std::result::Result<T, CirrusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = CirrusError::NotFound {
            resource: "cluster domain-c9".to_string(),
        };
        assert_eq!(err.to_string(), "Resource not found: cluster domain-c9");

        let err = CirrusError::InvalidInput {
            field: "drs_automation_level".to_string(),
            message: "unknown value \"turbo\"".to_string(),
        };
        assert!(err.to_string().contains("drs_automation_level"));
        assert!(err.to_string().contains("turbo"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CirrusError = parse_err.into();
        assert!(matches!(err, CirrusError::JsonError(_)));
    }
}
