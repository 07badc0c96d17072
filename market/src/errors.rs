use thiserror::Error;

/// Failure of a single market-data call.
///
/// The variant decides how the fetcher reacts: transport-level problems and
/// payloads of an unexpected shape are retried, a body that is not JSON at
/// all is not, and a well-formed response carrying a non-zero `retCode` is a
/// logical failure that is reported as "no data".
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("http error: {0}")]
    Http(reqwest::Error),

    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),

    #[error("response is not valid json: {0}")]
    Malformed(String),

    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout | FetchError::Http(_) | FetchError::UnexpectedShape(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(e)
        }
    }
}
