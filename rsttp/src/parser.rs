use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use opencv::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ExtractConfig, PageNumber, Settings};
use crate::converter::{load_page_image, save_pdf};
use crate::dates::resolve_week_dates;
use crate::errors::{ExtractError, Result};
use crate::extracter::extract_courses;
use crate::grid::{get_time_rows, get_weeks};
use crate::layout::refine_regions;
use crate::merger::merge_entries;
use crate::models::{BoundingBox, Day, MergedCourseEntry};
use crate::ocr::{recognize_with_retry, OcrEngine};
use crate::proposer::{propose_with_timeout, PageImage, RegionProposer};

/// Extracts the merged course entries of one day page.
///
/// # Arguments
///
/// * `page` - The rendered day page.
/// * `boxes` - Region proposals for the page.
/// * `ocr` - The OCR engine.
/// * `settings` - Pipeline settings.
///
/// # Errors
///
/// [`ExtractError::MissingWeekHeader`] when no week header was proposed, and
/// [`ExtractError::OcrUnavailable`] when the OCR engine cannot be started.
pub fn extract_day(
    page: &PageImage,
    boxes: &[BoundingBox],
    ocr: &dyn OcrEngine,
    settings: &Settings,
) -> Result<Vec<MergedCourseEntry>> {
    let page_words = match recognize_with_retry(ocr, &page.image, None, &settings.ocr) {
        Ok(words) => words,
        Err(ExtractError::OcrUnavailable(msg)) => return Err(ExtractError::OcrUnavailable(msg)),
        Err(e) => {
            tracing::warn!("Page OCR failed on {}, refining without anchors: {}", page.day, e);
            Vec::new()
        }
    };

    let layout = refine_regions(boxes, &page_words, page.image.rows() as f32, &settings.layout)
        .ok_or(ExtractError::MissingWeekHeader { day: page.day })?;
    let weeks = get_weeks(&layout.week_header, &settings.calendar, &settings.layout);
    let time_rows = get_time_rows(&layout.time_axis, &settings.layout);

    let week_dates = resolve_week_dates(
        &page.image,
        &layout.week_header,
        &weeks,
        ocr,
        &settings.layout,
        &settings.ocr,
    )?;

    let entries = extract_courses(
        &page.image,
        &layout,
        &weeks,
        &time_rows,
        page.day,
        &week_dates,
        ocr,
        settings,
    )?;
    let merged = merge_entries(&entries);
    tracing::debug!("{}: {} raw entries merged into {}", page.day, entries.len(), merged.len());
    return Ok(merged);
}

async fn process_day(
    day: Day,
    page_number: PageNumber,
    path: Option<String>,
    proposer: Arc<dyn RegionProposer>,
    ocr: Arc<dyn OcrEngine>,
    settings: Arc<Settings>,
) -> Result<Vec<MergedCourseEntry>> {
    let path = path.ok_or(ExtractError::MissingPage {
        day: day,
        page: page_number,
    })?;
    let image_path = path.clone();
    let image = tokio::task::spawn_blocking(move || load_page_image(&image_path))
        .await?
        .map_err(|e| ExtractError::UnreadablePage {
            day: day,
            page: page_number,
            reason: e.to_string(),
        })?;
    let page = PageImage {
        day: day,
        page_number: page_number,
        path: path,
        image: image,
    };

    let timeout = Duration::from_secs(settings.proposer_timeout_secs);
    let (page, boxes) = propose_with_timeout(proposer, page, timeout).await?;

    let entries =
        tokio::task::spawn_blocking(move || extract_day(&page, &boxes, ocr.as_ref(), &settings)).await??;
    return Ok(entries);
}

/// Extracts every day page already rendered into `config.page_images`.
///
/// Day `i` of the calendar (0-based) is read from page `i + 1`. Pages run
/// concurrently, at most `max_concurrent_pages` at a time, and results are
/// concatenated in day order. A day without a page image or without a week header
/// contributes no entries.
pub async fn extract_pages(
    config: &ExtractConfig,
    proposer: Arc<dyn RegionProposer>,
    ocr: Arc<dyn OcrEngine>,
    verbose: bool,
) -> Result<Vec<MergedCourseEntry>> {
    let settings = Arc::new(config.settings.clone());
    let days = settings.calendar.days.clone();

    let pb: Option<ProgressBar> = if verbose {
        let bar = ProgressBar::new(days.len() as u64);
        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.green/blue} {pos:>7}/{len:7} {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░"));
        }
        Some(bar)
    } else {
        None
    };

    let jobs = days.iter().enumerate().map(|(i, day)| {
        let page_number = (i + 1) as PageNumber;
        (*day, page_number, config.page_images.get(&page_number).cloned())
    });
    let results: Vec<(Day, Result<Vec<MergedCourseEntry>>)> = stream::iter(jobs)
        .map(|(day, page_number, path)| {
            let proposer = proposer.clone();
            let ocr = ocr.clone();
            let settings = settings.clone();
            let pb = pb.clone();
            async move {
                let result = process_day(day, page_number, path, proposer, ocr, settings).await;
                if let Some(pb) = pb {
                    pb.set_message(day.to_string());
                    pb.inc(1);
                }
                (day, result)
            }
        })
        .buffered(settings.max_concurrent_pages.max(1))
        .collect()
        .await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut entries = Vec::new();
    for (day, result) in results {
        match result {
            Ok(day_entries) => {
                if verbose {
                    tracing::info!("{}: {} entries", day, day_entries.len());
                }
                entries.extend(day_entries);
            }
            Err(e) if e.is_page_local() => {
                tracing::warn!("Skipping {}: {}", day, e);
            }
            Err(e) => return Err(e),
        }
    }
    return Ok(entries);
}

/// Parses a timetable PDF into merged course entries.
///
/// # Arguments
///
/// * `path_or_url` - A local file path or an `http(s)` URL of the timetable.
/// * `config` - The working configuration; receives the PDF metadata and page image paths.
/// * `proposer` - Supplies the layout regions of every day page.
/// * `ocr` - The OCR engine.
/// * `verbose` - Logs stage timings and shows a progress bar.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use rsttp::config::ExtractConfig;
/// # use rsttp::ocr::TesseractCli;
/// # use rsttp::parser::{entries2json, parse};
/// # use rsttp::proposer::DetectionFile;
/// # async fn try_main() -> rsttp::errors::Result<()> {
/// let mut config = ExtractConfig::new();
/// let proposer = Arc::new(DetectionFile::from_path("detections.json")?);
/// let ocr = Arc::new(TesseractCli::new(config.settings.ocr.clone()));
/// let entries = parse("timetable.pdf", &mut config, proposer, ocr, true).await?;
/// println!("{}", entries2json(&entries)?);
/// config.clean_files()?;
/// # Ok(())
/// # }
/// ```
pub async fn parse(
    path_or_url: &str,
    config: &mut ExtractConfig,
    proposer: Arc<dyn RegionProposer>,
    ocr: Arc<dyn OcrEngine>,
    verbose: bool,
) -> Result<Vec<MergedCourseEntry>> {
    let time = std::time::Instant::now();
    if verbose {
        tracing::info!("Parsing timetable: {}", path_or_url);
    }

    let days = config.settings.calendar.days.len();
    save_pdf(path_or_url, config, days, verbose, time).await?;

    let entries = extract_pages(config, proposer, ocr, verbose).await?;
    if verbose {
        tracing::info!(
            "Extracted {} course entries in {:.2}s",
            entries.len(),
            time.elapsed().as_secs_f32()
        );
    }
    return Ok(entries);
}

/// Serialises merged entries as a JSON array with camelCase keys.
pub fn entries2json(entries: &[MergedCourseEntry]) -> Result<String> {
    let json = serde_json::to_string(entries)?;
    return Ok(json);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegionClass;
    use crate::test_utils::{blank_page, word, write_page_png, ScriptedOcr, StaticProposer};

    fn proposals() -> Vec<BoundingBox> {
        vec![
            BoundingBox::new(RegionClass::WeekHeader, 300.0, 200.0, 3300.0, 260.0),
            BoundingBox::new(RegionClass::TimeAxis, 100.0, 400.0, 400.0, 2080.0),
        ]
    }

    /// Cell words in crop-local coordinates.
    fn cell_words() -> Vec<crate::models::WordBox> {
        vec![
            word("SC2001", 5.0, 10.0, 80.0, 30.0),
            word("TEL1", 5.0, 50.0, 60.0, 70.0),
            word("LT19", 5.0, 90.0, 60.0, 110.0),
        ]
    }

    #[test_log::test]
    fn test_extract_day_merges_columns() {
        let page = blank_page(Day::Tuesday, 2, 2200, 3400);
        let ocr = ScriptedOcr::always(cell_words());
        let entries = extract_day(&page, &proposals(), &ocr, &Settings::default()).unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.course_code, "SC2001");
        assert_eq!(entry.group, "TEL1");
        assert_eq!(entry.location, "LT19");
        assert_eq!(entry.weeks.len(), 14);
        assert_eq!(entry.weeks[7], "Recess");
        assert_eq!(entry.day, Day::Tuesday);
        assert!(entry.start_date.is_unknown());
    }

    #[test_log::test]
    fn test_extract_day_without_week_header() {
        let page = blank_page(Day::Monday, 1, 100, 100);
        let ocr = ScriptedOcr::always(Vec::new());
        let res = extract_day(&page, &proposals()[1..], &ocr, &Settings::default());
        assert!(matches!(res, Err(ExtractError::MissingWeekHeader { day: Day::Monday })));
    }

    #[test_log::test(tokio::test)]
    async fn test_extract_pages_skips_missing_days() {
        let mut config = ExtractConfig::new();
        config.page_images.insert(1, write_page_png("extract-pages-1", 2200, 3400));
        config.page_images.insert(3, write_page_png("extract-pages-3", 2200, 3400));
        config.settings.ocr.retry_delay_ms = 0;

        let proposer: Arc<dyn RegionProposer> = Arc::new(StaticProposer { boxes: proposals() });
        let ocr: Arc<dyn OcrEngine> = Arc::new(ScriptedOcr::always(cell_words()));
        let entries = extract_pages(&config, proposer, ocr, false).await.unwrap();

        let days: Vec<Day> = entries.iter().map(|e| e.day).collect();
        assert_eq!(days, vec![Day::Monday, Day::Wednesday]);

        let json = entries2json(&entries).unwrap();
        assert!(json.contains("\"courseCode\":\"SC2001\""));
        assert!(json.contains("\"startDate\":\"UNKNOWN\""));
        assert!(json.contains("\"time\":\"0830-0930\""));
        config.clean_files().unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_extract_pages_skips_unreadable_page() {
        let corrupt = "/tmp/rsttp-extract-pages-corrupt.png".to_string();
        std::fs::write(&corrupt, b"not a png").unwrap();
        let mut config = ExtractConfig::new();
        config.page_images.insert(1, corrupt);
        config.page_images.insert(2, write_page_png("extract-pages-readable", 2200, 3400));
        config.settings.ocr.retry_delay_ms = 0;

        let proposer: Arc<dyn RegionProposer> = Arc::new(StaticProposer { boxes: proposals() });
        let ocr: Arc<dyn OcrEngine> = Arc::new(ScriptedOcr::always(cell_words()));
        let entries = extract_pages(&config, proposer, ocr, false).await.unwrap();

        let days: Vec<Day> = entries.iter().map(|e| e.day).collect();
        assert_eq!(days, vec![Day::Tuesday]);
        config.clean_files().unwrap();
    }

    #[test_log::test(tokio::test)]
    async fn test_extract_pages_aborts_without_ocr_engine() {
        let mut config = ExtractConfig::new();
        config.page_images.insert(1, write_page_png("extract-pages-abort", 300, 300));

        let proposer: Arc<dyn RegionProposer> = Arc::new(StaticProposer { boxes: proposals() });
        let ocr: Arc<dyn OcrEngine> = Arc::new(ScriptedOcr::unavailable());
        let res = extract_pages(&config, proposer, ocr, false).await;
        assert!(matches!(res, Err(ExtractError::OcrUnavailable(_))));
        config.clean_files().unwrap();
    }
}
