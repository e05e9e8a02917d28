use std::time::Duration;

use thiserror::Error;

/// Startup-fatal problems with the controller's own configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown configuration key: {0}")]
    UnknownKey(String),

    #[error("missing mandatory keys: {}", .0.join(", "))]
    MissingMandatoryKeys(Vec<String>),

    #[error("missing required key: {0}")]
    MissingKey(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// A desired-state record that cannot be turned into a cluster spec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("record has no {0}")]
    MissingIdentity(&'static str),

    #[error("record is not labelled {label}={expected}")]
    NotManaged {
        label: &'static str,
        expected: &'static str,
    },

    #[error("record is missing required field {0}")]
    MissingField(&'static str),

    #[error("field {field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },

    #[error("field {field} is out of range: {message}")]
    OutOfRange {
        field: &'static str,
        message: String,
    },
}

/// Failures reported by the orchestration platform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout: Duration,
    },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("platform temporarily unavailable: {0}")]
    Unavailable(String),

    #[error("rejected by platform ({code}): {message}")]
    Rejected { code: u16, message: String },

    #[error("malformed resource: {0}")]
    Malformed(String),
}

impl PlatformError {
    /// Whether the failed call may succeed if issued again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlatformError::Timeout { .. }
                | PlatformError::Conflict(_)
                | PlatformError::Unavailable(_)
        )
    }
}

impl From<kube::Error> for PlatformError {
    fn from(e: kube::Error) -> Self {
        match e {
            kube::Error::Api(resp) => match resp.code {
                409 => PlatformError::Conflict(resp.message),
                429 | 500 | 502 | 503 | 504 => PlatformError::Unavailable(resp.message),
                code => PlatformError::Rejected {
                    code,
                    message: resp.message,
                },
            },
            kube::Error::SerdeError(e) => PlatformError::Malformed(e.to_string()),
            other => PlatformError::Unavailable(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PlatformError {
    fn from(e: serde_json::Error) -> Self {
        PlatformError::Malformed(e.to_string())
    }
}

/// Failure of a reconciliation pass for one cluster.
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Invalid cluster specification: {0}")]
    Spec(#[from] SpecError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: PlatformError },
}

pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Whether this error is transient and the pass should be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            OperatorError::Platform(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Short machine-readable reason, used for events and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OperatorError::Spec(_) => "InvalidSpecification",
            OperatorError::Platform(e) if e.is_transient() => "PlatformUnavailable",
            OperatorError::Platform(_) => "PlatformRejected",
            OperatorError::RetriesExhausted { .. } => "RetriesExhausted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".into(),
            message: format!("status {code}"),
            reason: "Test".into(),
            code,
        })
    }

    #[test]
    fn test_conflict_and_unavailable_are_transient() {
        assert!(PlatformError::from(api_error(409)).is_transient());
        assert!(PlatformError::from(api_error(429)).is_transient());
        assert!(PlatformError::from(api_error(503)).is_transient());
    }

    #[test]
    fn test_validation_rejection_is_permanent() {
        let err = PlatformError::from(api_error(422));
        assert!(!err.is_transient());
        assert_eq!(
            err,
            PlatformError::Rejected {
                code: 422,
                message: "status 422".into()
            }
        );
    }

    #[test]
    fn test_timeout_is_transient() {
        let err = PlatformError::Timeout {
            operation: "list Service".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(OperatorError::from(err).is_transient());
    }

    #[test]
    fn test_spec_error_is_not_transient() {
        let err = OperatorError::from(SpecError::MissingField("kafka-image"));
        assert!(!err.is_transient());
        assert_eq!(err.reason(), "InvalidSpecification");
    }

    #[test]
    fn test_missing_mandatory_keys_message() {
        let err = ConfigError::MissingMandatoryKeys(vec![
            "NAMESPACE".into(),
            "ZOOKEEPER_CONNECT".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "missing mandatory keys: NAMESPACE, ZOOKEEPER_CONNECT"
        );
    }
}
