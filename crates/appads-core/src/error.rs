use thiserror::Error;

/// Validation and consistency errors for domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid identifier \"{value}\": {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },

    #[error("request contains no identifiers")]
    EmptyIdentifierList,

    #[error("request contains {count} identifiers; the maximum is {max}")]
    TooManyIdentifiers { count: usize, max: usize },

    #[error("invalid filter criteria: {0}")]
    InvalidCriteria(String),

    /// A wire-format result whose fields contradict each other.
    #[error("inconsistent lookup result for {identifier}: {reason}")]
    InconsistentResult {
        identifier: String,
        reason: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
