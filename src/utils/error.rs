use crate::domain::model::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CohortError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cohort service returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        errors: Vec<ServiceError>,
    },

    #[error("Value set already exists: {message}")]
    Conflict { message: String },

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Service,
    Input,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CohortError {
    pub fn validation(message: impl Into<String>) -> Self {
        CohortError::ValidationError {
            message: message.into(),
        }
    }

    /// HTTP status carried by the error, if it came from the service.
    pub fn status(&self) -> Option<u16> {
        match self {
            CohortError::Api { status, .. } => Some(*status),
            CohortError::Conflict { .. } => Some(409),
            CohortError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CohortError::Http(_) => ErrorCategory::Network,
            CohortError::Api { status, .. } if *status >= 500 => ErrorCategory::Service,
            CohortError::Api { .. } | CohortError::Conflict { .. } => ErrorCategory::Input,
            CohortError::ValidationError { .. } => ErrorCategory::Input,
            CohortError::ConfigValidationError { .. }
            | CohortError::InvalidConfigValueError { .. }
            | CohortError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CohortError::ZipError(_)
            | CohortError::IoError(_)
            | CohortError::SerializationError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 409 just means the value set is already there
            CohortError::Conflict { .. } => ErrorSeverity::Low,
            CohortError::Http(_) => ErrorSeverity::Medium,
            CohortError::Api { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            CohortError::Api { .. } | CohortError::ValidationError { .. } => ErrorSeverity::High,
            CohortError::ConfigValidationError { .. }
            | CohortError::InvalidConfigValueError { .. }
            | CohortError::MissingConfigError { .. } => ErrorSeverity::High,
            CohortError::ZipError(_)
            | CohortError::IoError(_)
            | CohortError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            CohortError::Http(_) => {
                "Check that the cohort service is reachable and base_url is correct"
            }
            CohortError::Api { status: 401, .. } | CohortError::Api { status: 403, .. } => {
                "Check the FHIR credentials in [service.auth]"
            }
            CohortError::Api { status: 404, .. } => {
                "Check the measure id or identifier exists on the FHIR server"
            }
            CohortError::Api { status, .. } if *status >= 500 => {
                "The service failed while processing the request; check its logs and retry"
            }
            CohortError::Api { .. } => "Check the request inputs against the service's error details",
            CohortError::Conflict { .. } => "Re-run with --update-if-exists to overwrite the value set",
            CohortError::ZipError(_) => "Check the CQL directory contains readable .cql files",
            CohortError::IoError(_) => "Check the file paths and permissions",
            CohortError::SerializationError(_) => "The service response was not in the expected format",
            CohortError::ConfigValidationError { .. }
            | CohortError::InvalidConfigValueError { .. }
            | CohortError::MissingConfigError { .. } => "Fix the configuration file and try again",
            CohortError::ValidationError { .. } => "Fix the command arguments and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CohortError::Http(e) if e.is_timeout() => {
                "The cohort service did not respond in time".to_string()
            }
            CohortError::Http(e) if e.is_connect() => {
                "Could not connect to the cohort service".to_string()
            }
            CohortError::Api {
                status, errors, message, ..
            } => match errors.first().and_then(|e| e.message.as_deref()) {
                Some(detail) => format!("Request rejected ({}): {}", status, detail),
                None => format!("Request rejected ({}): {}", status, message),
            },
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CohortError>;
