use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown protocol '{id}'")]
    UnknownProtocol { id: String },

    #[error("protocol '{id}' is already registered")]
    DuplicateProtocol { id: String },

    #[error("invalid protocol definition '{id}': {reason}")]
    InvalidDefinition { id: String, reason: String },

    #[error("protocol '{protocol}' requires field '{field}'")]
    MissingField { protocol: String, field: String },

    #[error("protocol '{protocol}' declares no field '{field}'")]
    UnknownField { protocol: String, field: String },

    #[error("invalid value for field '{field}' of protocol '{protocol}': {reason}")]
    InvalidFieldValue {
        protocol: String,
        field: String,
        reason: String,
    },

    #[error("invalid duration range [{min}, {nominal}, {max}]")]
    InvalidRange { min: u32, nominal: u32, max: u32 },
}

impl Error {
    /// Build an `InvalidDefinition` error for the given protocol id.
    pub fn invalid_definition(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Build an `InvalidFieldValue` error for the given protocol and field.
    pub fn invalid_value(
        protocol: impl Into<String>,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidFieldValue {
            protocol: protocol.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
