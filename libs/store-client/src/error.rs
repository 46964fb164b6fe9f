use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("store returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("invalid store response: {0}")]
    InvalidResponse(String),
}
