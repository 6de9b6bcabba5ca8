//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod render;
pub mod scan;

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use console::style;
use tracing::debug;

use labelscan_core::models::barcode::ScanResult;
use labelscan_core::models::config::LabelscanConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per barcode
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// Load the configuration from `path`, else from the default location, else defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<LabelscanConfig> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => {
            let default = config::default_config_path();
            if !default.exists() {
                return Ok(LabelscanConfig::default());
            }
            default
        }
    };

    debug!("Loading configuration from {}", path.display());
    LabelscanConfig::from_file(&path)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))
}

/// Read ZPL from `--zpl`, a file, or stdin (`-` or no input).
pub fn read_zpl(zpl: Option<String>, input: Option<&Path>) -> anyhow::Result<String> {
    if let Some(zpl) = zpl {
        return Ok(zpl);
    }

    match input {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e)),
        _ => {
            let mut zpl = String::new();
            std::io::stdin().read_to_string(&mut zpl)?;
            Ok(zpl)
        }
    }
}

/// Render a scan result in the requested format.
pub fn format_result(result: &ScanResult, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(result)?),
        OutputFormat::Csv => format_result_csv(result),
        OutputFormat::Text => Ok(format_result_text(result)),
    }
}

fn format_result_csv(result: &ScanResult) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["page", "type", "data", "x", "y", "width", "height"])?;

    for m in &result.barcodes {
        let page = m.page.map(|p| p.to_string()).unwrap_or_default();
        wtr.write_record([
            page.as_str(),
            m.symbology.label(),
            &m.payload,
            &m.location.x.to_string(),
            &m.location.y.to_string(),
            &m.location.width.to_string(),
            &m.location.height.to_string(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_result_text(result: &ScanResult) -> String {
    let mut output = String::new();

    if result.is_empty() {
        output.push_str("No barcodes found\n");
    }
    for m in &result.barcodes {
        if let Some(page) = m.page {
            output.push_str(&format!("[page {}] ", page));
        }
        output.push_str(&format!(
            "{} {} at ({}, {}) {}x{}\n",
            m.symbology, m.payload, m.location.x, m.location.y, m.location.width, m.location.height
        ));
    }

    if !result.errors.is_empty() {
        output.push_str("\nPages that could not be scanned:\n");
        for error in &result.errors {
            match error.page {
                Some(page) => output.push_str(&format!("  page {}: {}\n", page, error.message)),
                None => output.push_str(&format!("  {}\n", error.message)),
            }
        }
    }

    output
}

/// Write to a file, or print to stdout when no output path is given.
pub fn write_output(output: Option<&Path>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            fs::write(path, content)?;
            eprintln!("{} Output written to {}", style("✓").green(), path.display());
        }
        None => println!("{}", content.trim_end()),
    }
    Ok(())
}
