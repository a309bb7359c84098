//! Error types shared across csvload crates

use thiserror::Error;

/// Result type alias for shared operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors that are not tied to a particular crate
#[derive(Error, Debug)]
pub enum CommonError {
    /// A setting string did not name a known value
    #[error("Parse error: {0}")]
    Parse(String),
}

impl CommonError {
    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = CommonError::parse("Invalid log level: loud");
        assert_eq!(err.to_string(), "Parse error: Invalid log level: loud");
    }
}
