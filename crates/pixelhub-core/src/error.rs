use thiserror::Error;

#[derive(Debug, Error)]
pub enum PixelhubError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Canvas error: {0}")]
    Canvas(String),

    #[error("Image encoding error: {0}")]
    Image(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PixelhubError>;
