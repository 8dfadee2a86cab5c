use thiserror::Error;

/// Why a cache operation produced no data.
///
/// The caches never panic or propagate these past their own boundary as
/// anything other than a value; callers that want the legacy "empty on
/// failure" rendering use `LogPage::empty` or `FacetOptions::default`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("request rejected by auth (status {status})")]
    Unauthorized { status: u16 },
    #[error("malformed response body: {0}")]
    Decode(String),
    /// A newer request or configuration replaced this one before it resolved.
    #[error("superseded by a newer request")]
    Superseded,
}

impl FetchError {
    /// Whether the failure came from the network or server rather than from
    /// this client discarding its own stale work.
    pub fn is_failure(&self) -> bool {
        !matches!(self, FetchError::Superseded)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl From<watchtower_wire::Error> for FetchError {
    fn from(err: watchtower_wire::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

pub type FetchResult<T> = Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            FetchError::Transport("refused".to_string()),
            FetchError::Timeout,
            FetchError::Status { status: 500 },
            FetchError::Unauthorized { status: 401 },
            FetchError::Decode("eof".to_string()),
            FetchError::Superseded,
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }

    #[test]
    fn superseded_is_not_a_failure() {
        assert!(!FetchError::Superseded.is_failure());
        assert!(FetchError::Timeout.is_failure());
    }
}
