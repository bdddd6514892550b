/// Result alias that carries the custom [`EffectsError`] type.
pub type Result<T> = std::result::Result<T, EffectsError>;

/// Error type for the fallible edges of the effects runtime.
///
/// Instance handling itself never fails: unknown or stale references are
/// inert input. Errors only surface when definitions or settings are read
/// from outside the process.
#[derive(Debug, thiserror::Error)]
pub enum EffectsError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// The definitions file is not valid JSON or does not match the schema.
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    /// A single effect definition could not be interpreted.
    #[error("invalid definition `{name}`: {reason}")]
    InvalidDefinition { name: String, reason: String },
}

impl EffectsError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
