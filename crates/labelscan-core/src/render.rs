//! ZPL label renderers.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::RenderError;
use crate::models::config::LabelscanConfig;
use crate::models::label::RenderedLabel;

/// Turns ZPL source into a raster image.
#[async_trait]
pub trait LabelRenderer: Send + Sync {
    /// Render the label. A successful result always holds a non-empty PNG.
    async fn render(&self, zpl: &str) -> Result<RenderedLabel, RenderError>;
}

/// Renderer backed by a Labelary-compatible HTTP API.
#[derive(Debug, Clone)]
pub struct LabelaryRenderer {
    client: reqwest::Client,
    url: String,
}

impl LabelaryRenderer {
    /// Create a renderer for the configured endpoint, label size and density.
    pub fn new(config: &LabelscanConfig) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.renderer.timeout_secs))
            .build()
            .map_err(|e| RenderError::Other(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.render_url(),
        })
    }

    /// Endpoint labels are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl LabelRenderer for LabelaryRenderer {
    async fn render(&self, zpl: &str) -> Result<RenderedLabel, RenderError> {
        debug!("Rendering {} bytes of ZPL via {}", zpl.len(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::ACCEPT, "image/png")
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(zpl.to_string())
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?;
        check_response(status, body.to_vec())
    }
}

fn transport_error(e: reqwest::Error) -> RenderError {
    RenderError::Transport {
        message: format!("renderer request failed: {}", e),
        transient: e.is_timeout() || e.is_connect(),
    }
}

/// Validate a renderer response.
fn check_response(status: u16, body: Vec<u8>) -> Result<RenderedLabel, RenderError> {
    if !(200..300).contains(&status) {
        return Err(RenderError::Status {
            status,
            body: String::from_utf8_lossy(&body).trim().to_string(),
        });
    }
    if body.is_empty() {
        return Err(RenderError::EmptyImage);
    }

    let label = RenderedLabel::png(body);
    if !label.is_png() {
        let kind = infer::get(&label.bytes)
            .map(|k| k.mime_type())
            .unwrap_or("unknown content");
        return Err(RenderError::UnexpectedContent(kind.to_string()));
    }
    Ok(label)
}
