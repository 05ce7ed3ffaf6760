use thiserror::Error;

pub const ORDER_FAILED_MESSAGE: &str = "Failed to create order. Please try again.";
pub const PERMISSION_DENIED_MESSAGE: &str =
    "Order was rejected by access policy. Please sign in again or contact support.";
pub const REQUEST_FAILED_MESSAGE: &str = "The request to the server failed. Please try again.";
pub const ACCESS_DENIED_MESSAGE: &str =
    "You do not have access to this data. Please sign in again or contact support.";

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Unknown service: {service}")]
    UnknownServiceError { service: String },

    #[error("Unknown {kind} '{key}' for service '{service}'")]
    UnknownOptionError {
        service: String,
        kind: String,
        key: String,
    },

    #[error("Backend returned {status}: {message}")]
    BackendError {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Authentication error: {message}")]
    AuthError { message: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Submission step '{step}' failed: {details}")]
    SubmissionError { step: String, details: String },

    /// 下單流程中的失敗，訊息改用下單專屬的文字
    #[error("Order submission failed: {source}")]
    OrderFailed { source: Box<PortalError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Backend,
    Auth,
    Config,
    Input,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PortalError {
    pub fn validation(message: impl Into<String>) -> Self {
        PortalError::ValidationError {
            message: message.into(),
        }
    }

    pub fn order_failed(source: PortalError) -> Self {
        PortalError::OrderFailed {
            source: Box::new(source),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PortalError::OrderFailed { source } => source.category(),
            PortalError::ApiError(_) => ErrorCategory::Network,
            PortalError::BackendError { .. } | PortalError::SubmissionError { .. } => {
                ErrorCategory::Backend
            }
            PortalError::PermissionDenied { .. }
            | PortalError::AuthError { .. }
            | PortalError::NotAuthenticated => ErrorCategory::Auth,
            PortalError::TomlError(_)
            | PortalError::ConfigError { .. }
            | PortalError::ConfigValidationError { .. }
            | PortalError::InvalidConfigValueError { .. }
            | PortalError::MissingConfigError { .. } => ErrorCategory::Config,
            PortalError::ValidationError { .. }
            | PortalError::UnknownServiceError { .. }
            | PortalError::UnknownOptionError { .. }
            | PortalError::SerializationError(_) => ErrorCategory::Input,
            PortalError::IoError(_) | PortalError::CsvError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::Backend | ErrorCategory::Auth => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Config | ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    /// 後端拒絕是否屬於權限 / RLS 政策錯誤
    pub fn is_permission_denied(&self) -> bool {
        match self {
            PortalError::OrderFailed { source } => source.is_permission_denied(),
            PortalError::PermissionDenied { .. } => true,
            PortalError::BackendError {
                status,
                code,
                message,
            } => {
                *status == 401
                    || *status == 403
                    || code.as_deref() == Some("42501")
                    || message.to_ascii_lowercase().contains("row-level security")
                    || message.to_ascii_lowercase().contains("permission denied")
            }
            PortalError::SubmissionError { details, .. } => {
                let details = details.to_ascii_lowercase();
                details.contains("row-level security") || details.contains("permission denied")
            }
            _ => false,
        }
    }

    /// 給終端使用者看的訊息（對應前端的 toast）；下單失敗才用下單專屬文字
    pub fn user_friendly_message(&self) -> String {
        match self {
            PortalError::OrderFailed { source } => order_message(source),
            PortalError::SubmissionError { .. } => order_message(self),
            _ if self.is_permission_denied() => ACCESS_DENIED_MESSAGE.to_string(),
            PortalError::BackendError { .. } | PortalError::ApiError(_) => {
                REQUEST_FAILED_MESSAGE.to_string()
            }
            PortalError::NotAuthenticated => "Please sign in to continue.".to_string(),
            PortalError::AuthError { message } => format!("Sign-in failed: {}", message),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        if self.is_permission_denied() {
            return "Sign in again; if the problem persists the backend access policy needs review";
        }
        match self.category() {
            ErrorCategory::Network => "Check the network connection and the backend URL, then retry",
            ErrorCategory::Backend => "Retry the action with the refresh button; check backend logs if it keeps failing",
            ErrorCategory::Auth => "Check the e-mail and password, or refresh the session",
            ErrorCategory::Config => "Fix the configuration file (see the field named in the error)",
            ErrorCategory::Input => "Correct the highlighted input and submit again",
            ErrorCategory::Io => "Check file paths and permissions",
        }
    }
}

fn order_message(err: &PortalError) -> String {
    if err.is_permission_denied() {
        PERMISSION_DENIED_MESSAGE.to_string()
    } else {
        ORDER_FAILED_MESSAGE.to_string()
    }
}

pub type Result<T> = std::result::Result<T, PortalError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(status: u16, code: Option<&str>, message: &str) -> PortalError {
        PortalError::BackendError {
            status,
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_rls_rejection_during_order_gets_permission_message() {
        let err = PortalError::order_failed(backend(
            400,
            Some("42501"),
            "new row violates row-level security policy for table \"orders\"",
        ));
        assert!(err.is_permission_denied());
        assert_eq!(err.user_friendly_message(), PERMISSION_DENIED_MESSAGE);
        assert_eq!(err.category(), ErrorCategory::Backend);
    }

    #[test]
    fn test_forbidden_status_is_permission_error() {
        assert!(backend(403, None, "forbidden").is_permission_denied());
        assert!(backend(401, None, "JWT expired").is_permission_denied());
    }

    #[test]
    fn test_order_failure_gets_order_failed_message() {
        let err = PortalError::order_failed(backend(500, None, "internal error"));
        assert!(!err.is_permission_denied());
        assert_eq!(err.user_friendly_message(), ORDER_FAILED_MESSAGE);
        assert_eq!(err.severity(), ErrorSeverity::Medium);

        let step = PortalError::SubmissionError {
            step: "create_order".to_string(),
            details: "pipeline finished without creating an order".to_string(),
        };
        assert_eq!(step.user_friendly_message(), ORDER_FAILED_MESSAGE);
    }

    #[test]
    fn test_listing_failure_does_not_mention_orders() {
        let err = backend(500, None, "timeout listing tickets");
        assert_eq!(err.user_friendly_message(), REQUEST_FAILED_MESSAGE);

        let denied = backend(403, Some("42501"), "permission denied for table tickets");
        assert_eq!(denied.user_friendly_message(), ACCESS_DENIED_MESSAGE);
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = PortalError::MissingConfigError {
            field: "backend.url".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Config);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }
}
