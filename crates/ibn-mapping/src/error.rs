/// Rendering a payload for one device failed.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

pub type RenderResult<T> = Result<T, RenderError>;
