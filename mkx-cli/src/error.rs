use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Extract(#[from] mkx_engine::ExtractError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("{failed} of {total} track(s) could not be extracted")]
    TracksFailed { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, AppError>;
