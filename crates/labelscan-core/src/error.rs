//! Error types for the labelscan-core library.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the labelscan library.
#[derive(Error, Debug)]
pub enum LabelscanError {
    /// Missing or malformed request input.
    #[error("{0}")]
    Validation(String),

    /// Input type not accepted, or the input could not be rasterized.
    #[error("{0}")]
    UnsupportedMedia(#[from] SourceError),

    /// The external label renderer failed.
    #[error("error generating label: {0}")]
    Render(#[from] RenderError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected failure inside the pipeline.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Response-error category of a [`LabelscanError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    UnsupportedMedia,
    Render,
    Internal,
}

impl LabelscanError {
    /// Category used when mapping the error onto a response.
    pub fn category(&self) -> ErrorCategory {
        match self {
            LabelscanError::Validation(_) => ErrorCategory::Validation,
            // A missing renderer library is the server's fault, not the upload's.
            LabelscanError::UnsupportedMedia(SourceError::Pdf(PdfError::Backend(_))) => {
                ErrorCategory::Internal
            }
            LabelscanError::UnsupportedMedia(_) => ErrorCategory::UnsupportedMedia,
            LabelscanError::Render(_) => ErrorCategory::Render,
            LabelscanError::Config(_) | LabelscanError::Io(_) | LabelscanError::Internal(_) => {
                ErrorCategory::Internal
            }
        }
    }

    /// HTTP status code for the error.
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::UnsupportedMedia => 400,
            ErrorCategory::Render | ErrorCategory::Internal => 500,
        }
    }

    /// Wire representation of the error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
        }
    }
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors raised while turning an input into raster pages.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The declared or sniffed media type is not accepted.
    #[error("unsupported media type: {0} (expected application/pdf, image/png or image/jpeg)")]
    UnsupportedType(String),

    /// PDF could not be opened or paged.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Image bytes could not be decoded.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// The rasterization backend is not available.
    #[error("PDF backend unavailable: {0}")]
    Backend(String),
}

/// Errors returned by a label renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The renderer answered with a non-success status.
    #[error("renderer returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The renderer answered with an empty body.
    #[error("renderer returned an empty image")]
    EmptyImage,

    /// The renderer answered with something that is not a PNG image.
    #[error("renderer returned unexpected content ({0})")]
    UnexpectedContent(String),

    /// The rendered image could not be decoded.
    #[error("rendered image could not be decoded: {0}")]
    Decode(#[from] image::ImageError),

    /// Network-level failure talking to the renderer.
    #[error("{message}")]
    Transport { message: String, transient: bool },

    /// Any other renderer failure.
    #[error("{0}")]
    Other(String),
}

impl RenderError {
    /// Whether a caller may retry the request once.
    pub fn is_transient(&self) -> bool {
        match self {
            RenderError::Status { status, .. } => *status == 429 || *status >= 500,
            RenderError::Transport { transient, .. } => *transient,
            _ => false,
        }
    }
}

/// A single page could not be scanned.
///
/// Never aborts a multi-page request; the page contributes zero matches.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanFailure {
    /// The page raster could not be decoded into pixels.
    #[error("unreadable page raster: {0}")]
    Unreadable(String),

    /// Decoded pixels do not match the page's declared dimensions.
    #[error("page raster is {actual:?} but {declared:?} was declared")]
    DimensionMismatch {
        declared: (u32, u32),
        actual: (u32, u32),
    },

    /// The page has zero width or height.
    #[error("page raster is empty")]
    Empty,

    /// The scan itself aborted unexpectedly.
    #[error("scan aborted: {0}")]
    Aborted(String),
}

/// Result type for the labelscan library.
pub type Result<T> = std::result::Result<T, LabelscanError>;
