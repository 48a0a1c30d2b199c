use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WisardError {
    /// A sample or rule row does not have the width the model expects.
    #[error("shape mismatch: {0}")]
    Shape(String),
    /// Bad hyperparameters or a malformed rule.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A label with no discriminator behind it (or no discriminators at all).
    #[error("unknown label: {0}")]
    UnknownLabel(String),
    #[error("could not (de)serialize wisard: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, WisardError>;
