//! Merges per-page scan outcomes into one result.

use tracing::warn;

use crate::error::ScanFailure;
use crate::models::barcode::{BarcodeMatch, PageError, ScanResult};

/// Scan outcome of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageScan {
    /// Page number (1-indexed); `None` for single-image sources.
    pub index: Option<u32>,
    pub outcome: Result<Vec<BarcodeMatch>, ScanFailure>,
}

impl PageScan {
    pub fn new(index: Option<u32>, outcome: Result<Vec<BarcodeMatch>, ScanFailure>) -> Self {
        Self { index, outcome }
    }
}

/// Combine page outcomes into a [`ScanResult`].
///
/// Pages are ordered by index whatever order they arrive in. Matches carry their
/// page number only when the source had more than one page. Failed pages add
/// nothing to `barcodes` and are listed in `errors`.
pub fn aggregate(mut pages: Vec<PageScan>) -> ScanResult {
    pages.sort_by_key(|p| p.index);
    let multi_page = pages.len() > 1;

    let mut result = ScanResult::empty();
    for page in pages {
        match page.outcome {
            Ok(matches) => {
                result.barcodes.extend(matches.into_iter().map(|mut m| {
                    if multi_page {
                        m.page = page.index;
                    }
                    m
                }));
            }
            Err(failure) => {
                match page.index {
                    Some(index) => warn!("Page {} could not be scanned: {}", index, failure),
                    None => warn!("Image could not be scanned: {}", failure),
                }
                result.errors.push(PageError {
                    page: page.index,
                    message: failure.to_string(),
                });
            }
        }
    }

    result
}
