use thiserror::Error;

/// Error taxonomy shared by every engine operation.
///
/// `Validation` failures are raised before any mutation and propagate to the
/// caller unmodified. `DatabaseError` wraps transaction/commit failures from
/// the store; the enclosing transaction has already been rolled back by the
/// time one surfaces.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(anyhow::anyhow!(msg.into()))
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(anyhow::anyhow!(msg.into()))
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_category_and_cause() {
        let err = AppError::validation("quantity cannot be negative");
        assert_eq!(
            err.to_string(),
            "Validation error: quantity cannot be negative"
        );

        let err = AppError::not_found("product 7 not found");
        assert_eq!(err.to_string(), "Not found: product 7 not found");
    }

    #[test]
    fn io_errors_map_to_internal() {
        let io = std::io::Error::other("disk gone");
        let err: AppError = io.into();
        assert!(matches!(err, AppError::InternalError(_)));
    }
}
