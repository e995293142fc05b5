use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("delivery to {recipient} failed: {message}")]
    Delivery { recipient: String, message: String },

    #[error("message log: {message}")]
    Log { message: String },

    #[error("{message}")]
    Message { message: String },

    #[error("{context}: {source}")]
    External {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    #[must_use]
    pub fn delivery(recipient: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Delivery {
            recipient: recipient.into(),
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn log(message: impl std::fmt::Display) -> Self {
        Self::Log {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn external(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

impl huddle_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

huddle_common::impl_context!();

pub type Result<T> = std::result::Result<T, Error>;
