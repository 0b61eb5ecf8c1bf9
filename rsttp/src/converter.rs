use crate::config::{ExtractConfig, PageNumber};
use anyhow::{Error, Result};
use glob::glob;
use opencv::core::Mat;
use opencv::imgcodecs;
use opencv::prelude::*;
use reqwest as request;
use std::{
    fs::File,
    path::Path,
    process::{Command, Stdio},
    time::Duration,
};

pub(crate) fn get_pdf_info(
    config: &mut ExtractConfig,
    verbose: bool,
    time: std::time::Instant,
) -> Result<()> {
    let res =
        Command::new("pdfinfo").args(&[config.pdf_path.clone()]).stdout(Stdio::piped()).output();
    let text = String::from_utf8(res?.stdout)?;

    if text.is_empty() {
        return Err(Error::msg("Error: pdf file is broken or invalid url"));
    }

    for line in text.split("\n") {
        let parts: Vec<&str> = line.splitn(2, ":").collect();
        if parts.len() < 2 {
            continue;
        }
        let key = parts[0].trim().to_string().to_lowercase().replace(" ", "_");
        let value = parts[1].trim().to_string();
        config.pdf_info.insert(key, value);
    }

    if verbose {
        tracing::info!("Extracted PDF Info in {:.2}s", time.elapsed().as_secs_f32());
    }
    return Ok(());
}

/// Parses the page number suffix pdftocairo appends to every rendered file (`name-01.png`).
pub(crate) fn page_number_from_path(path: &Path) -> Result<PageNumber> {
    let number = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.split("-").last())
        .ok_or_else(|| Error::msg(format!("Invalid page image filename format: {:?}", path)))?
        .parse::<PageNumber>()?;
    return Ok(number);
}

/// Renders the first `last_page` pages of the PDF as PNG files with `pdftocairo`.
pub(crate) fn save_pdf_as_images(
    config: &mut ExtractConfig,
    last_page: usize,
    verbose: bool,
    time: std::time::Instant,
) -> Result<()> {
    let pdf_path = Path::new(config.pdf_path.as_str());
    let stem = pdf_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::msg("Invalid pdf path"))?;
    let parent = pdf_path.parent().ok_or_else(|| Error::msg("Invalid pdf path"))?;
    let dst_path = parent.join(stem);

    let output = Command::new("pdftocairo")
        .args(&[
            "-png".to_string(),
            "-r".to_string(),
            config.settings.render_dpi.to_string(),
            "-f".to_string(),
            "1".to_string(),
            "-l".to_string(),
            last_page.to_string(),
            config.pdf_path.clone(),
            dst_path.to_string_lossy().to_string(),
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| Error::msg(format!("Error: failed to run pdftocairo: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::msg(format!(
            "pdftocairo failed with exit code {:?}: {}",
            output.status.code(),
            stderr
        )));
    }

    let glob_query = parent.join(format!("{}*.png", stem));
    let glob_query_str =
        glob_query.to_str().ok_or_else(|| Error::msg("Invalid glob query path"))?;

    let mut retry_count = 100;
    loop {
        let count = glob(glob_query_str)?.count();
        if count > 0 {
            break;
        }
        if retry_count == 0 {
            return Err(Error::msg("Error: Failed to save PDF as PNG files"));
        } else {
            std::thread::sleep(Duration::from_millis(100));
            retry_count -= 1;
        }
    }

    for entry in glob(glob_query_str)? {
        match entry {
            Ok(path) => {
                let page_number = page_number_from_path(&path)?;
                let path_str = path
                    .to_str()
                    .ok_or_else(|| Error::msg(format!("Invalid path encoding: {:?}", path)))?;
                config.page_images.insert(page_number, path_str.to_string());
            }
            Err(e) => return Err(Error::msg(format!("Error: {}", e))),
        }
    }

    if verbose {
        tracing::info!(
            "Rendered {} page images at {} DPI in {:.2}s",
            config.page_images.len(),
            config.settings.render_dpi,
            time.elapsed().as_secs_f32()
        );
    }

    return Ok(());
}

/// Copies (or downloads) the PDF to the working path and renders the timetable pages.
///
/// # Arguments
///
/// * `path_or_url` - A local file path or an `http(s)` URL.
/// * `config` - The working configuration; receives the PDF metadata and page image paths.
/// * `pages` - The number of leading pages to render.
pub async fn save_pdf(
    path_or_url: &str,
    config: &mut ExtractConfig,
    pages: usize,
    verbose: bool,
    time: std::time::Instant,
) -> Result<()> {
    let save_path = config.pdf_path.clone();
    if path_or_url.starts_with("http") {
        let res = request::get(path_or_url).await?.error_for_status()?;
        let bytes = res.bytes().await?;
        let mut out = File::create(&save_path)?;
        std::io::copy(&mut bytes.as_ref(), &mut out)?;
    } else {
        std::fs::copy(Path::new(path_or_url), &save_path)?;
    }

    get_pdf_info(config, verbose, time)?;

    let available = config.page_count().unwrap_or(pages);
    if available < pages {
        tracing::warn!("PDF has {} pages, expected {}", available, pages);
    }
    save_pdf_as_images(config, pages.min(available).max(1), verbose, time)?;

    return Ok(());
}

/// Reads a rendered page image in BGR colour order.
pub fn load_page_image(path: &str) -> Result<Mat> {
    let image = imgcodecs::imread(path, imgcodecs::IMREAD_COLOR)?;
    if image.empty() {
        return Err(Error::msg(format!("Failed to read page image: {}", path)));
    }
    return Ok(image);
}
