use crate::config::models::{ServerConfig, ServerTuning};

/// Validation result type alias
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validation error types
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: String, message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },
}

/// Servlet path pattern reduced to the prefix it is mounted at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServletMapping {
    /// `/*` or `/prefix/*`: everything below the prefix.
    Prefix(String),
    /// `/path`: mounted as given.
    Exact(String),
}

impl ServletMapping {
    pub fn parse(pattern: &str) -> ValidationResult<Self> {
        let invalid = |message: &str| ValidationError::InvalidField {
            field: "servlet_path".to_string(),
            message: format!("'{pattern}': {message}"),
        };

        if !pattern.starts_with('/') {
            return Err(invalid("servlet paths must begin with slash (/)"));
        }
        if let Some(prefix) = pattern.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(invalid("only a single trailing '/*' wildcard is supported"));
            }
            return Ok(Self::Prefix(prefix.to_string()));
        }
        if pattern.contains('*') {
            return Err(invalid("only a single trailing '/*' wildcard is supported"));
        }
        Ok(Self::Exact(pattern.trim_end_matches('/').to_string()))
    }

    pub fn path(&self) -> &str {
        match self {
            Self::Prefix(path) | Self::Exact(path) => path,
        }
    }
}

/// Server configuration validator
pub struct ServerConfigValidator;

impl ServerConfigValidator {
    /// Check everything that must hold before any network resource is acquired.
    pub fn validate(config: &ServerConfig, has_application: bool) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if !has_application {
            errors.push(ValidationError::MissingField {
                field: "application".to_string(),
            });
        }

        match config.context_path.as_deref() {
            None => errors.push(ValidationError::MissingField {
                field: "context_path".to_string(),
            }),
            Some(path) => {
                if let Err(e) = Self::validate_context_path(path) {
                    errors.push(e);
                }
            }
        }

        match config.servlet_path.as_deref() {
            None => errors.push(ValidationError::MissingField {
                field: "servlet_path".to_string(),
            }),
            Some(pattern) => {
                if let Err(e) = ServletMapping::parse(pattern) {
                    errors.push(e);
                }
            }
        }

        Self::finish(errors)
    }

    /// Pool sizing sanity checks.
    pub fn validate_tuning(tuning: &ServerTuning) -> ValidationResult<()> {
        let mut errors = Vec::new();

        if tuning.min_threads == 0 {
            errors.push(ValidationError::InvalidField {
                field: "min_threads".to_string(),
                message: "The worker pool needs at least one thread".to_string(),
            });
        }
        if tuning.min_threads > tuning.max_threads {
            errors.push(ValidationError::InvalidField {
                field: "max_threads".to_string(),
                message: format!(
                    "max_threads ({}) is below min_threads ({})",
                    tuning.max_threads, tuning.min_threads
                ),
            });
        }

        Self::finish(errors)
    }

    fn validate_context_path(path: &str) -> ValidationResult<()> {
        if !path.starts_with('/') {
            return Err(ValidationError::InvalidField {
                field: "context_path".to_string(),
                message: format!("'{path}': context path must begin with slash (/)"),
            });
        }
        Ok(())
    }

    fn finish(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::ValidationFailed {
                message: Self::format_multiple_errors(errors),
            }),
        }
    }

    fn format_multiple_errors(errors: Vec<ValidationError>) -> String {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(context: Option<&str>, servlet: Option<&str>) -> ServerConfig {
        ServerConfig {
            context_path: context.map(str::to_string),
            servlet_path: servlet.map(str::to_string),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_valid_configuration() {
        assert!(ServerConfigValidator::validate(&config(Some("/"), Some("/*")), true).is_ok());
        assert!(ServerConfigValidator::validate(&config(Some("/svc"), Some("/api/*")), true).is_ok());
    }

    #[test]
    fn test_context_path_must_start_with_slash() {
        let err = ServerConfigValidator::validate(&config(Some("svc"), Some("/*")), true).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidField { ref field, .. } if field == "context_path"));
    }

    #[test]
    fn test_missing_pieces_reported() {
        let err = ServerConfigValidator::validate(&config(None, Some("/*")), true).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "context_path".to_string()
            }
        );

        let err = ServerConfigValidator::validate(&config(Some("/"), Some("/*")), false).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingField {
                field: "application".to_string()
            }
        );

        let err = ServerConfigValidator::validate(&config(None, None), false).unwrap_err();
        match err {
            ValidationError::ValidationFailed { message } => {
                assert!(message.contains("application"));
                assert!(message.contains("context_path"));
                assert!(message.contains("servlet_path"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_servlet_mapping() {
        assert_eq!(ServletMapping::parse("/*").unwrap(), ServletMapping::Prefix(String::new()));
        assert_eq!(
            ServletMapping::parse("/api/*").unwrap(),
            ServletMapping::Prefix("/api".to_string())
        );
        assert_eq!(
            ServletMapping::parse("/status/").unwrap(),
            ServletMapping::Exact("/status".to_string())
        );
        assert!(ServletMapping::parse("*.do").is_err());
        assert!(ServletMapping::parse("/a/*/b/*").is_err());
        assert!(ServletMapping::parse("api").is_err());
    }

    #[test]
    fn test_tuning_validation() {
        assert!(ServerConfigValidator::validate_tuning(&ServerTuning::default()).is_ok());

        let inverted = ServerTuning {
            min_threads: 20,
            max_threads: 10,
            ..ServerTuning::default()
        };
        assert!(ServerConfigValidator::validate_tuning(&inverted).is_err());

        let empty = ServerTuning {
            min_threads: 0,
            ..ServerTuning::default()
        };
        assert!(ServerConfigValidator::validate_tuning(&empty).is_err());
    }
}
