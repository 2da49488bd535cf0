use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("not authorized")]
    Unauthorized,

    #[error("invalid response: {0}")]
    Validation(String),

    #[error("progress channel failed: {0}")]
    Channel(String),

    #[error("credential store error: {0}")]
    Store(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else if err.status() == Some(reqwest::StatusCode::UNAUTHORIZED) {
            ClientError::Unauthorized
        } else if err.is_decode() {
            ClientError::Validation(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
