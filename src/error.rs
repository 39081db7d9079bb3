/// Everything that can go wrong while talking to a CTF platform.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("could not parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("server returned no data for {0}")]
    NoData(String),

    #[error("invalid url: {0}")]
    Url(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0} is not supported by this platform")]
    Unsupported(&'static str),
}

impl From<url::ParseError> for RemoteError {
    fn from(err: url::ParseError) -> Self {
        RemoteError::Url(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
