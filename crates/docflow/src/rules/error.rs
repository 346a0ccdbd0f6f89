use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Metadata count value '{0}' is not a number")]
    NonNumericCount(String),

    #[error("Cannot parse date '{value}' with format '{format}'")]
    InvalidDate { value: String, format: String },

    #[error("Rule '{rule}' cannot be decoded: {message}")]
    Decode { rule: String, message: String },

    #[error("Failed to resolve metadata value: {0}")]
    Resolve(String),
}
