//! Scan command - decode the barcodes of one image or PDF.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use tracing::{debug, info};

use labelscan_core::LabelService;
use labelscan_core::models::barcode::ScanResult;
use labelscan_core::models::label::{ScanRequest, Upload};

use super::{OutputFormat, format_result, load_config, write_output};

/// Arguments for the scan command.
#[derive(Args)]
pub struct ScanArgs {
    /// Input file (PDF, PNG or JPEG)
    #[arg(required = true)]
    input: PathBuf,

    /// Media type of the input (default: from the file extension, else sniffed)
    #[arg(long)]
    media_type: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

pub async fn run(args: ScanArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Scanning file: {}", args.input.display());
    let service = LabelService::from_config(&config)?;
    let result = scan_file(&service, &args.input, args.media_type.as_deref()).await?;

    write_output(args.output.as_deref(), &format_result(&result, args.format)?)?;
    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Read a file and scan it as an upload.
pub async fn scan_file<R: labelscan_core::LabelRenderer>(
    service: &LabelService<R>,
    path: &Path,
    media_type: Option<&str>,
) -> anyhow::Result<ScanResult> {
    let bytes = fs::read(path)?;
    let mut upload = match media_type.or_else(|| media_type_for(path)) {
        Some(media_type) => Upload::new(bytes, media_type),
        None => Upload::untyped(bytes),
    };
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        upload = upload.with_filename(name);
    }

    Ok(service.scan_upload(&ScanRequest::new(upload)).await?)
}

/// Media type implied by a file extension.
pub fn media_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_lowercase();
    let media_type = match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "txt" => "text/plain",
        "zpl" => "application/zpl",
        _ => return None,
    };
    Some(media_type)
}
