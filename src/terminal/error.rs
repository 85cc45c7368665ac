//! Handler error type.
//!
//! Every message handler returns `Result<_, HandlerError>`. Dispatch logs
//! the error with the handler name and drops it; nothing here escalates
//! past the session.

use crate::channel::ChannelError;

/// Errors raised while handling one inbound message.
#[derive(Debug)]
pub enum HandlerError {
    /// Payload missing a required field or of the wrong shape.
    MalformedPayload {
        /// Handler that rejected the payload.
        handler: &'static str,
        /// What was wrong with it.
        reason: String,
    },
    /// Seed chunk index outside `0..total`.
    InvalidChunk {
        /// Reported chunk index.
        chunk: i64,
        /// Reported total chunk count.
        total: i64,
    },
    /// Emitting a reply on the channel failed.
    Channel(ChannelError),
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedPayload { handler, reason } => {
                write!(f, "Malformed {handler} payload: {reason}")
            }
            Self::InvalidChunk { chunk, total } => {
                write!(f, "Invalid seed chunk {chunk} of {total}")
            }
            Self::Channel(err) => write!(f, "Channel error: {err}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Channel(err) => Some(err),
            Self::MalformedPayload { .. } | Self::InvalidChunk { .. } => None,
        }
    }
}

impl From<ChannelError> for HandlerError {
    fn from(err: ChannelError) -> Self {
        Self::Channel(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_handler() {
        let err = HandlerError::MalformedPayload {
            handler: "seed_ansi",
            reason: "missing field `chunk`".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Malformed seed_ansi payload: missing field `chunk`"
        );
    }

    #[test]
    fn channel_error_is_the_source() {
        let err = HandlerError::from(ChannelError::Closed);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "Channel error: Channel closed");
    }
}
