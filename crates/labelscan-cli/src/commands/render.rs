//! Render and scan-label commands.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use labelscan_core::LabelService;
use labelscan_core::models::label::RenderRequest;

use super::{OutputFormat, format_result, load_config, read_zpl, write_output};

/// Arguments for the render command.
#[derive(Args)]
pub struct RenderArgs {
    /// ZPL file to render (`-` or omitted: read stdin)
    input: Option<PathBuf>,

    /// ZPL source given inline
    #[arg(long, conflicts_with = "input")]
    zpl: Option<String>,

    /// Output PNG file
    #[arg(short, long, required = true)]
    output: PathBuf,
}

/// Arguments for the scan-label command.
#[derive(Args)]
pub struct ScanLabelArgs {
    /// ZPL file to render (`-` or omitted: read stdin)
    input: Option<PathBuf>,

    /// ZPL source given inline
    #[arg(long, conflicts_with = "input")]
    zpl: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

pub async fn run_render(args: RenderArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let zpl = read_zpl(args.zpl, args.input.as_deref())?;

    let service = LabelService::from_config(&config)?;
    info!("Rendering via {}", config.render_url());
    let label = service.render(&RenderRequest::new(zpl)).await?;

    fs::write(&args.output, &label.bytes)?;
    eprintln!(
        "{} Label written to {} ({} bytes)",
        style("✓").green(),
        args.output.display(),
        label.bytes.len()
    );

    Ok(())
}

pub async fn run_scan_label(args: ScanLabelArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let zpl = read_zpl(args.zpl, args.input.as_deref())?;

    let service = LabelService::from_config(&config)?;
    let result = service.scan_label(&RenderRequest::new(zpl)).await?;

    write_output(args.output.as_deref(), &format_result(&result, args.format)?)
}
