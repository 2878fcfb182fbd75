use std::fmt;

use thiserror::Error;

use crate::command::CommandError;

/// Pipeline phase a driver serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Extract,
    Transform,
    Load,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Extract => "extract",
            Domain::Transform => "transform",
            Domain::Load => "load",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text a SQL-building driver writes verbatim rather than as a quoted
/// literal, such as `NOW()` or a column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnquotedString(String);

impl UnquotedString {
    pub fn new(value: impl Into<String>) -> Self {
        UnquotedString(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UnquotedString {
    fn from(value: &str) -> Self {
        UnquotedString::new(value)
    }
}

impl From<String> for UnquotedString {
    fn from(value: String) -> Self {
        UnquotedString(value)
    }
}

impl fmt::Display for UnquotedString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors reported by drivers and their handles.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The handle could not build its argument from the commands.
    #[error("invalid command: {0}")]
    Command(#[from] CommandError),

    /// The argument passed back to a handle is not the type it produced.
    #[error("argument is not a {expected}")]
    ArgumentMismatch { expected: &'static str },

    /// Store-level failure, preserving the source error.
    #[error("backend failed")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    Message(String),
}

impl DriverError {
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DriverError::Backend(Box::new(error))
    }

    pub fn message(message: impl Into<String>) -> Self {
        DriverError::Message(message.into())
    }
}

/// Registration and lookup failures.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{domain} driver '{name}' is already registered")]
    Duplicate { domain: Domain, name: String },

    #[error("no {domain} driver registered as '{name}'")]
    NotFound { domain: Domain, name: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_backend_error_preserves_source() {
        let source = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = DriverError::backend(source);

        assert_eq!(err.to_string(), "backend failed");
        assert_eq!(err.source().unwrap().to_string(), "connection reset");
    }

    #[test]
    fn test_unquoted_string_renders_verbatim() {
        let now = UnquotedString::new("NOW()");
        assert_eq!(format!("SET updated_at = {now}"), "SET updated_at = NOW()");
        assert_eq!(now.as_str(), "NOW()");
        assert_eq!(UnquotedString::from("x"), UnquotedString::from("x".to_string()));
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::Duplicate {
            domain: Domain::Load,
            name: "pg".to_string(),
        };
        assert_eq!(err.to_string(), "load driver 'pg' is already registered");

        let err = RegistryError::NotFound {
            domain: Domain::Extract,
            name: "csv".to_string(),
        };
        assert_eq!(err.to_string(), "no extract driver registered as 'csv'");
    }
}
