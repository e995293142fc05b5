/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed errors raised while building or registering channels.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input payload or parameter is invalid.
    #[error("invalid channel input: {message}")]
    InvalidInput { message: String },

    /// A channel with the same case-insensitive key is already registered.
    #[error("duplicate channel key: {key}")]
    DuplicateChannel { key: String },

    /// The configuration defines no global fallback channel.
    #[error("no global channel configured")]
    MissingGlobal,

    /// The configuration defines more than one global channel.
    #[error("more than one global channel configured: {}", keys.join(", "))]
    MultipleGlobal { keys: Vec<String> },
}

impl Error {
    #[must_use]
    pub fn invalid_input(message: impl std::fmt::Display) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn duplicate_channel(key: impl std::fmt::Display) -> Self {
        Self::DuplicateChannel {
            key: key.to_string(),
        }
    }
}
