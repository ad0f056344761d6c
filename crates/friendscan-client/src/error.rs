use friendscan_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Network failure, including timeouts
    #[error("Transport error: {0}")]
    Transport(String),

    /// Body could not be decoded into the expected envelope
    #[error("Decode error: {0}")]
    Decode(String),

    /// The platform answered with a nonzero `BaseResponse.Ret`
    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Transport(format!("request timed out: {}", err))
        } else if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
