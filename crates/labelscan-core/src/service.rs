//! Request orchestration: render, render-then-scan and upload-then-scan.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::aggregate::{PageScan, aggregate};
use crate::error::{LabelscanError, RenderError, Result, ScanFailure};
use crate::models::barcode::ScanResult;
use crate::models::config::{LabelscanConfig, PipelineConfig};
use crate::models::label::{RenderRequest, RenderedLabel, ScanRequest};
use crate::pipeline::{check_upload, scan_page};
use crate::raster::{MediaType, RasterPage, RasterSource};
use crate::render::{LabelRenderer, LabelaryRenderer};
use crate::scan::BarcodeScanner;

/// Entry point for the three request shapes.
///
/// Holds no per-request state; one instance serves concurrent requests.
pub struct LabelService<R> {
    renderer: R,
    scanner: Arc<BarcodeScanner>,
    source: RasterSource,
    pipeline: PipelineConfig,
}

impl LabelService<LabelaryRenderer> {
    /// Service rendering through the configured Labelary-compatible endpoint.
    pub fn from_config(config: &LabelscanConfig) -> Result<Self> {
        Ok(Self::new(LabelaryRenderer::new(config)?, config))
    }
}

impl<R: LabelRenderer> LabelService<R> {
    pub fn new(renderer: R, config: &LabelscanConfig) -> Self {
        Self {
            renderer,
            scanner: Arc::new(BarcodeScanner::new(&config.scanner)),
            source: RasterSource::new()
                .with_max_pages(config.pipeline.max_pages)
                .with_pdf(config.pdf.clone()),
            pipeline: config.pipeline.clone(),
        }
    }

    /// Replace the scanner, e.g. one with extra detectors registered.
    pub fn with_scanner(mut self, scanner: BarcodeScanner) -> Self {
        self.scanner = Arc::new(scanner);
        self
    }

    pub fn scanner(&self) -> &BarcodeScanner {
        &self.scanner
    }

    /// Render a label to PNG.
    pub async fn render(&self, request: &RenderRequest) -> Result<RenderedLabel> {
        if request.zpl.trim().is_empty() {
            return Err(LabelscanError::Validation("ZPL code is required".to_string()));
        }

        let label = self.renderer.render(&request.zpl).await?;
        if label.bytes.is_empty() {
            return Err(RenderError::EmptyImage.into());
        }
        debug!("Rendered label: {} bytes", label.bytes.len());
        Ok(label)
    }

    /// Render a label and scan the resulting image.
    pub async fn scan_label(&self, request: &RenderRequest) -> Result<ScanResult> {
        let label = self.render(request).await?;
        let page = self.source.from_rendered(&label).map_err(RenderError::Decode)?;

        let result = aggregate(self.scan_pages(vec![page]).await?);
        info!("Rendered label holds {} barcode(s)", result.len());
        Ok(result)
    }

    /// Scan an uploaded image or PDF.
    pub async fn scan_upload(&self, request: &ScanRequest) -> Result<ScanResult> {
        let upload = check_upload(request.file.as_ref(), self.pipeline.max_upload_bytes)?;
        let media_type = MediaType::resolve(upload.media_type.as_deref(), &upload.bytes)?;
        info!(
            "Scanning upload {} ({}, {} bytes)",
            upload.filename.as_deref().unwrap_or("-"),
            media_type,
            upload.bytes.len()
        );

        let source = self.source.clone();
        let bytes = upload.bytes.clone();
        let pages = tokio::task::spawn_blocking(move || source.to_pages(Some(media_type.as_str()), &bytes))
            .await
            .map_err(|e| LabelscanError::Internal(format!("rasterizer task failed: {}", e)))??;

        let page_count = pages.len();
        let result = aggregate(self.scan_pages(pages).await?);
        info!(
            "Scanned {} page(s): {} barcode(s), {} failed page(s)",
            page_count,
            result.len(),
            result.errors.len()
        );
        Ok(result)
    }

    /// Scan pages on the blocking pool, at most `max_concurrent_pages` at a time.
    ///
    /// Outcomes are returned in input order whatever order the scans finish in.
    async fn scan_pages(&self, pages: Vec<RasterPage>) -> Result<Vec<PageScan>> {
        let semaphore = Arc::new(Semaphore::new(self.pipeline.max_concurrent_pages.max(1)));
        let mut slots: Vec<Option<PageScan>> = (0..pages.len()).map(|_| None).collect();
        let mut tasks = JoinSet::new();

        for (slot, page) in pages.into_iter().enumerate() {
            let scanner = Arc::clone(&self.scanner);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let index = page.index;
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => tokio::task::spawn_blocking(move || scan_page(&scanner, &page))
                        .await
                        .unwrap_or_else(|e| Err(ScanFailure::Aborted(e.to_string()))),
                    Err(e) => Err(ScanFailure::Aborted(e.to_string())),
                };
                (slot, PageScan::new(index, outcome))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (slot, scan) =
                joined.map_err(|e| LabelscanError::Internal(format!("page task failed: {}", e)))?;
            slots[slot] = Some(scan);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
