//! Runtime-independent scanning steps shared by the service and the bindings.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::info;

use crate::aggregate::{PageScan, aggregate};
use crate::error::{LabelscanError, Result, ScanFailure};
use crate::models::barcode::{BarcodeMatch, ScanResult};
use crate::models::label::Upload;
use crate::raster::{RasterPage, RasterSource};
use crate::scan::BarcodeScanner;

/// Check that an upload is present, non-empty and within the size limit (0 = unlimited).
pub fn check_upload(upload: Option<&Upload>, max_bytes: usize) -> Result<&Upload> {
    let upload = upload.ok_or_else(|| LabelscanError::Validation("file is required".to_string()))?;

    if upload.bytes.is_empty() {
        return Err(LabelscanError::Validation("uploaded file is empty".to_string()));
    }
    if max_bytes > 0 && upload.bytes.len() > max_bytes {
        return Err(LabelscanError::Validation(format!(
            "uploaded file is {} bytes, the limit is {}",
            upload.bytes.len(),
            max_bytes
        )));
    }
    Ok(upload)
}

/// Scan one page, turning a panic inside the scanner into a page failure.
pub fn scan_page(scanner: &BarcodeScanner, page: &RasterPage) -> std::result::Result<Vec<BarcodeMatch>, ScanFailure> {
    panic::catch_unwind(AssertUnwindSafe(|| scanner.scan(page)))
        .unwrap_or_else(|payload| Err(ScanFailure::Aborted(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "scanner panicked".to_string()
    }
}

/// Scan pages one after another on the current thread.
pub fn scan_pages_sequential(scanner: &BarcodeScanner, pages: &[RasterPage]) -> Vec<PageScan> {
    pages
        .iter()
        .map(|page| PageScan::new(page.index, scan_page(scanner, page)))
        .collect()
}

/// Rasterize and scan a whole document on the current thread.
pub fn scan_document(
    scanner: &BarcodeScanner,
    source: &RasterSource,
    upload: &Upload,
) -> Result<ScanResult> {
    let pages = source.to_pages(upload.media_type.as_deref(), &upload.bytes)?;
    let result = aggregate(scan_pages_sequential(scanner, &pages));
    info!(
        "Scanned {} page(s): {} barcode(s), {} failed page(s)",
        pages.len(),
        result.len(),
        result.errors.len()
    );
    Ok(result)
}
