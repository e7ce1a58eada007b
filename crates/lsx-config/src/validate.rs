//! Configuration validation errors and semantic validation.

use thiserror::Error;

use crate::options::GatherOptions;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::IoError(_) => 60,
            ValidationError::ParseError(_) => 61,
            ValidationError::InvalidValue { .. } => 65,
        }
    }
}

impl From<ValidationError> for lsx_common::Error {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::IoError(message) => {
                lsx_common::Error::Io(std::io::Error::other(message))
            }
            other => lsx_common::Error::InvalidArgument(other.to_string()),
        }
    }
}

/// Validate gather options semantically.
pub fn validate_options(options: &GatherOptions) -> ValidationResult<()> {
    if options.mounts_path.as_os_str().is_empty() {
        return Err(ValidationError::InvalidValue {
            field: "mounts_path".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    for (idx, entry) in options.exempt_filesystems.iter().enumerate() {
        if !entry.path.is_absolute() {
            return Err(ValidationError::InvalidValue {
                field: format!("exempt_filesystems[{}].path", idx),
                message: format!("{} is not an absolute path", entry.path.display()),
            });
        }
    }

    if let Some(supplement) = &options.mount_supplement {
        if !supplement.is_absolute() {
            return Err(ValidationError::InvalidValue {
                field: "mount_supplement".to_string(),
                message: format!("{} is not an absolute path", supplement.display()),
            });
        }
    }

    if options.blocking.isolate && options.blocking.timeout_ms == 0 {
        return Err(ValidationError::InvalidValue {
            field: "blocking.timeout_ms".to_string(),
            message: "must be positive when isolate is set".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_valid() {
        validate_options(&GatherOptions::default()).unwrap();
    }

    #[test]
    fn test_relative_exemption_rejected() {
        let opts = GatherOptions::default().with_exempt_fs("mnt/nfs", false);
        let err = validate_options(&opts).unwrap_err();
        match err {
            ValidationError::InvalidValue { field, .. } => {
                assert_eq!(field, "exempt_filesystems[0].path")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_relative_supplement_rejected() {
        let opts = GatherOptions::default().with_supplement("supp.txt");
        assert!(matches!(
            validate_options(&opts),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_zero_timeout_only_matters_when_isolating() {
        let mut opts = GatherOptions::default();
        opts.blocking.timeout_ms = 0;
        validate_options(&opts).unwrap();

        opts.blocking.isolate = true;
        let err = validate_options(&opts).unwrap_err();
        assert_eq!(err.code(), 65);
    }

    #[test]
    fn test_into_unified_error() {
        let err: lsx_common::Error = ValidationError::InvalidValue {
            field: "mounts_path".into(),
            message: "must not be empty".into(),
        }
        .into();
        assert_eq!(err.code(), 10);

        let err: lsx_common::Error = ValidationError::IoError("gone".into()).into();
        assert_eq!(err.category(), lsx_common::ErrorCategory::Io);
    }
}
