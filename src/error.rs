use thiserror::Error;

/// Underlying cause of a session store failure.
#[derive(Error, Debug)]
pub enum StoreCause {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("invalid session name")]
    InvalidName,
}

#[derive(Error, Debug)]
pub enum AgError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session store error [{session}]: {cause}")]
    Store {
        session: String,
        #[source]
        cause: StoreCause,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgError {
    pub fn store(session: impl Into<String>, cause: impl Into<StoreCause>) -> Self {
        Self::Store {
            session: session.into(),
            cause: cause.into(),
        }
    }

    /// A short follow-up suggestion printed under the error, if any.
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Config(msg) if msg.contains("AG_DASHSCOPE_API_KEY") => Some(
                "export AG_DASHSCOPE_API_KEY='your-api-key' or pass --api-key".to_string(),
            ),
            Self::Store {
                cause: StoreCause::InvalidName,
                ..
            } => Some(
                "Session names must be non-empty, contain no path separators and not start with '.'"
                    .to_string(),
            ),
            Self::Store {
                cause: StoreCause::Corrupt(_),
                session,
            } => Some(format!(
                "Inspect the record for '{}' or remove it with `ag -c {}`",
                session, session
            )),
            Self::SessionNotFound(_) => {
                Some("Use `ag -s <name>` to create and switch to a session".to_string())
            }
            Self::Stream(_) | Self::Http(_) => {
                Some("Check your network connection and the --base-url setting".to_string())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgError>;

/// Attaches the session name to store I/O and decode failures.
pub trait StoreResultExt<T> {
    fn for_session(self, session: &str) -> Result<T>;
}

impl<T, E> StoreResultExt<T> for std::result::Result<T, E>
where
    E: Into<StoreCause>,
{
    fn for_session(self, session: &str) -> Result<T> {
        self.map_err(|e| AgError::store(session, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_for_session_wraps_io_error() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "nope"));
        let err = result.for_session("demo").unwrap_err();

        match err {
            AgError::Store { session, cause } => {
                assert_eq!(session, "demo");
                assert!(matches!(cause, StoreCause::Io(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_for_session_wraps_json_error() {
        let result: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err = result.for_session("demo").unwrap_err();

        assert!(matches!(
            err,
            AgError::Store {
                cause: StoreCause::Corrupt(_),
                ..
            }
        ));
        assert!(err.hint().is_some());
    }

    #[test]
    fn test_store_error_message_names_session() {
        let err = AgError::store("rust_dev", StoreCause::InvalidName);
        assert_eq!(
            err.to_string(),
            "Session store error [rust_dev]: invalid session name"
        );
    }

    #[test]
    fn test_missing_key_hint() {
        let err = AgError::Config("AG_DASHSCOPE_API_KEY not provided".to_string());
        assert!(err.hint().unwrap().contains("--api-key"));
    }
}
