//! Crate-wide error type.
//!
//! Every error maps to a process exit code so the `srt` binary can stay a thin
//! wrapper: `main` prints the message and exits with `exit_code()`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid option or argument combination.
    #[error("{0}")]
    Usage(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV input (headers, encoding, writer failures).
    #[error("CSV error: {0}")]
    Csv(String),

    #[error("insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Data violates an invariant of the table it was loaded into.
    #[error("validation error: {0}")]
    Validation(String),

    /// A subset or lookup matched nothing.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("numerical error: {0}")]
    Numerical(String),
}

impl AppError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Usage(_) | AppError::Io { .. } | AppError::Csv(_) => 2,
            AppError::InsufficientData { .. } | AppError::Validation(_) | AppError::NotFound(_) => 3,
            AppError::Numerical(_) => 4,
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Csv(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        assert_eq!(AppError::Usage("x".into()).exit_code(), 2);
        assert_eq!(AppError::InsufficientData { needed: 3, got: 2 }.exit_code(), 3);
        assert_eq!(AppError::Numerical("x".into()).exit_code(), 4);
    }

    #[test]
    fn insufficient_data_message_names_counts() {
        let err = AppError::InsufficientData { needed: 3, got: 1 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 3 observations, got 1"
        );
    }
}
