use thiserror::Error;

#[derive(Debug, Error)]
pub enum MainError {
    #[error(transparent)]
    Init(#[from] flights_core::error::InitializationError),
    #[error("configured airport is invalid: {0}")]
    Airport(#[from] flights_core::error::MalformedRecord),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}
