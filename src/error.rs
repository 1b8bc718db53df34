use thiserror::Error;

/// Everything that can go wrong between a submit click and the rendered answer.
#[derive(Error, Debug)]
pub enum AdvisorError {
    /// Nothing usable was submitted. The user can simply try again.
    #[error("{0}")]
    Validation(String),
    /// The upload exceeded the configured size limit.
    #[error("The image is larger than {0} bytes. Please upload a smaller photo.")]
    TooLarge(usize),
    /// The upload could not be written to the staging directory.
    #[error("Staging error: {0}")]
    Io(#[from] std::io::Error),
    /// The remote service refused the file, the prompt or an expired handle.
    #[error("Gemini rejected the request: {0}")]
    UpstreamRejected(String),
    #[error("Gemini is unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Gemini did not answer in time")]
    UpstreamTimeout,
    /// Missing or malformed process configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AdvisorError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<reqwest::Error> for AdvisorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout
        } else if err.is_decode() {
            Self::UpstreamRejected(format!("unreadable response: {}", err))
        } else if let Some(status) = err.status().filter(|s| s.is_client_error()) {
            Self::UpstreamRejected(format!("HTTP {}", status))
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AdvisorError {
    fn from(err: serde_json::Error) -> Self {
        Self::UpstreamRejected(format!("unreadable response: {}", err))
    }
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;
