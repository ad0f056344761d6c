use friendscan_client::ClientError;
use friendscan_core::CoreError;
use thiserror::Error;

/// Terminal failure of a retried operation.
#[derive(Error, Debug)]
#[error("{operation} failed after {attempts} attempts: {last_error}")]
pub struct RetryExhausted<E>
where
    E: std::error::Error + 'static,
{
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub last_error: E,
}

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error(transparent)]
    ExhaustedRetries(#[from] RetryExhausted<ClientError>),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid probe settings: {0}")]
    InvalidSettings(String),
}

pub type Result<T> = std::result::Result<T, ProbeError>;
