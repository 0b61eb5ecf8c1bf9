use crate::config::Settings;
use crate::errors::{ExtractError, Result};
use crate::layout::RefinedLayout;
use crate::models::{CourseEntry, Day, LineGroup, TimeRow, WeekColumn, WeekDates, WordBox};
use crate::ocr::{crop_image, preprocess_cell, recognize_with_retry, OcrEngine};
use crate::segmenter::{BlockSegmenter, CellContext};
use opencv::core::Mat;
use std::collections::HashMap;

/// Clusters words into text lines by the vertical centre of each word.
///
/// Words whose centres lie within `eps` of a neighbour share a line, so a line is
/// split wherever two consecutive centres are more than `eps` apart.
///
/// # Returns
///
/// Lines ordered top to bottom, each with its words ordered left to right.
pub fn group_lines(words: Vec<WordBox>, eps: f32) -> Vec<LineGroup> {
    let mut words = words;
    words.sort_by(|a, b| a.yc().partial_cmp(&b.yc()).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines = Vec::new();
    let mut current: Vec<WordBox> = Vec::new();
    for word in words {
        if let Some(last) = current.last() {
            if word.yc() - last.yc() > eps {
                lines.push(LineGroup::new(std::mem::take(&mut current)));
            }
        }
        current.push(word);
    }
    if !current.is_empty() {
        lines.push(LineGroup::new(current));
    }
    return lines;
}

/// Reads the word boxes of one course cell in page coordinates.
///
/// # Returns
///
/// `None` when the cell is empty or its OCR failed after all retries.
fn read_cell(
    image: &Mat,
    (x1, y1, x2, y2): (f32, f32, f32, f32),
    ocr: &dyn OcrEngine,
    settings: &Settings,
) -> Result<Option<Vec<WordBox>>> {
    let Some(crop) = crop_image(image, x1, y1, x2, y2)? else {
        return Ok(None);
    };
    let binary = preprocess_cell(&crop.image)?;
    match recognize_with_retry(ocr, &binary, Some(settings.ocr.cell_psm), &settings.ocr) {
        Ok(words) => Ok(Some(words.into_iter().map(|w| w.offset(crop.x, crop.y)).collect())),
        Err(ExtractError::OcrUnavailable(msg)) => Err(ExtractError::OcrUnavailable(msg)),
        Err(e) => {
            tracing::warn!("Skipping cell at x={:.0}..{:.0}: {}", x1, x2, e);
            Ok(None)
        }
    }
}

/// Extracts the raw course entries of a day page, one week column at a time.
///
/// # Arguments
///
/// * `image` - The day page.
/// * `layout` - The refined layout regions.
/// * `weeks` - Week columns; column 0 is skipped.
/// * `time_rows` - Rows of the time axis.
/// * `day` - Weekday of the page.
/// * `week_dates` - Start/end dates per week label.
/// * `ocr` - OCR engine for the cell crops.
/// * `settings` - Pipeline settings.
///
/// # Returns
///
/// Entries in column order, each tagged with its single week label.
pub fn extract_courses(
    image: &Mat,
    layout: &RefinedLayout,
    weeks: &[WeekColumn],
    time_rows: &[TimeRow],
    day: Day,
    week_dates: &HashMap<String, WeekDates>,
    ocr: &dyn OcrEngine,
    settings: &Settings,
) -> Result<Vec<CourseEntry>> {
    let area = &layout.course_area;
    let margin = settings.layout.cell_margin;

    let mut entries = Vec::new();
    for week in weeks {
        if week.index == 0 || area.x2 < week.x1 || area.x1 > week.x2 {
            continue;
        }
        let x1 = area.x1.max(week.x1 - margin);
        let x2 = area.x2.min(week.x2 + margin);
        let Some(words) = read_cell(image, (x1, area.y1, x2, area.y2), ocr, settings)? else {
            continue;
        };
        if words.is_empty() {
            continue;
        }

        let lines = group_lines(words, settings.layout.line_eps);
        let ctx = CellContext {
            day: day,
            week: &week.label,
            week_dates: week_dates.get(&week.label).copied().unwrap_or(WeekDates::Unknown),
            time_rows: time_rows,
            calendar: &settings.calendar,
            holiday_threshold: settings.layout.holiday_threshold,
        };
        let cell_entries = BlockSegmenter::new(&lines, ctx).segment();
        tracing::debug!(
            "{} week {}: {} lines, {} entries",
            day,
            week.label,
            lines.len(),
            cell_entries.len()
        );
        entries.extend(cell_entries);
    }
    return Ok(entries);
}
