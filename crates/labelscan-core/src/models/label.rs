//! Request-scoped value objects for rendering and scanning.

use serde::{Deserialize, Serialize};

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// A request carrying ZPL label source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderRequest {
    /// ZPL document text.
    #[serde(default)]
    pub zpl: String,
}

impl RenderRequest {
    pub fn new(zpl: impl Into<String>) -> Self {
        Self { zpl: zpl.into() }
    }
}

/// A request carrying an uploaded document.
#[derive(Debug, Clone, Default)]
pub struct ScanRequest {
    /// The uploaded file, if any.
    pub file: Option<Upload>,
}

impl ScanRequest {
    pub fn new(file: Upload) -> Self {
        Self { file: Some(file) }
    }
}

/// Uploaded file bytes with their declared media type.
#[derive(Debug, Clone)]
pub struct Upload {
    /// File contents.
    pub bytes: Vec<u8>,
    /// Declared media type (`Content-Type` of the part), if any.
    pub media_type: Option<String>,
    /// Original file name, if any.
    pub filename: Option<String>,
}

impl Upload {
    pub fn new(bytes: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            bytes,
            media_type: Some(media_type.into()),
            filename: None,
        }
    }

    /// Upload without a declared media type; the type is sniffed from the bytes.
    pub fn untyped(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            media_type: None,
            filename: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// A rendered label image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLabel {
    /// Encoded image bytes, never empty.
    pub bytes: Vec<u8>,
    /// Media type of `bytes`.
    pub content_type: String,
}

impl RenderedLabel {
    /// Wrap PNG bytes.
    pub fn png(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: "image/png".to_string(),
        }
    }

    /// Whether the bytes start with the PNG signature.
    pub fn is_png(&self) -> bool {
        self.bytes.starts_with(&PNG_SIGNATURE)
    }
}
