use actix_web::{ResponseError, http::StatusCode};
use thiserror::Error;

/// Everything that can go wrong between building an upstream URL and holding a decoded feed.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("GET {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("unsupported charset: {0}")]
    UnsupportedCharset(String),

    #[error("failed to decode feed: {0}")]
    Decode(#[from] quick_xml::DeError),
}

impl From<quick_xml::Error> for FeedError {
    fn from(err: quick_xml::Error) -> Self {
        FeedError::Decode(err.into())
    }
}

impl ResponseError for FeedError {
    fn status_code(&self) -> StatusCode {
        match self {
            FeedError::Fetch { .. } | FeedError::Status { .. } => StatusCode::BAD_GATEWAY,
            FeedError::UnsupportedCharset(_) | FeedError::Decode(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
