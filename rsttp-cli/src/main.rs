pub mod loggers;

use crate::loggers::init_logger;
use anyhow::{bail, Context, Result};
use clap::Parser;
use rsttp::config::{ExtractConfig, Settings};
use rsttp::dates::fill_unknown_start_dates;
use rsttp::ocr::TesseractCli;
use rsttp::parser::parse;
use rsttp::proposer::DetectionFile;
use std::path::Path;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
struct Args {
    /// Timetable PDF, a local path or an http(s) URL.
    #[arg(short, long)]
    pdf: String,

    /// Region detections as JSON, keyed by page number.
    #[arg(short, long)]
    detections: String,

    /// Settings overrides as JSON.
    #[arg(short, long)]
    settings: Option<String>,

    #[arg(short, long)]
    out: Option<String>,

    /// Fill unknown start dates from entries with known dates.
    #[arg(long, default_value_t = false)]
    infer_dates: bool,

    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    let args = Args::parse();

    let is_url = args.pdf.starts_with("http");
    if !is_url && !Path::new(args.pdf.as_str()).exists() {
        bail!("File not found: {}", args.pdf);
    }

    let outfile = args.out.unwrap_or("timetable.json".to_string());
    if !outfile.ends_with(".json") {
        bail!("Output file must be a JSON file: {}", outfile);
    }

    let settings = match &args.settings {
        Some(path) => Settings::from_json_file(path)
            .with_context(|| format!("Invalid settings file: {}", path))?,
        None => Settings::default(),
    };
    let mut config = ExtractConfig::with_settings(settings);

    let proposer = Arc::new(DetectionFile::from_path(&args.detections)?);
    let tesseract = TesseractCli::new(config.settings.ocr.clone());
    tesseract.check()?;
    let ocr = Arc::new(tesseract);

    let result = parse(args.pdf.as_str(), &mut config, proposer, ocr, args.verbose).await;
    if let Err(e) = config.clean_files() {
        tracing::warn!("Failed to remove working files: {}", e);
    }
    let mut entries = result?;

    if args.infer_dates {
        let filled = fill_unknown_start_dates(&mut entries, &config.settings.calendar);
        tracing::info!("Inferred {} start dates", filled);
    }

    let json = serde_json::to_string_pretty(&entries)?;
    std::fs::write(&outfile, json)?;
    tracing::info!("Wrote {} entries to {}", entries.len(), outfile);

    Ok(())
}
