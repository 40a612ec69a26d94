use thiserror::Error;

pub const UNKNOWN_API_ERROR: &str = "An unknown API error occurred.";

/// Failures of the single request/response backend call. `Api` carries the
/// server's message verbatim.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{0}")]
    Api(String),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("snapshot has no area ({width}x{height})")]
    EmptySnapshot { width: u32, height: u32 },

    #[error("page layout error: {0}")]
    Layout(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF rendering failed: {0}")]
    Pdf(#[from] genpdf::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no student selected")]
    NoStudentSelected,

    #[error("student not found: {0}")]
    StudentNotFound(String),

    #[error("First and Last Name are required.")]
    MissingStudentName,

    #[error("tag name is required")]
    MissingTagName,

    #[error("goal title is required")]
    MissingGoalTitle,

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Export(#[from] ExportError),
}
