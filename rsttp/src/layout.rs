//! Region refinement.
//!
//! The detector's boxes often clip the "WEEK" caption or the last week number,
//! and its time axis rarely lines up with the header. The refiner corrects the boxes
//! with OCR anchors and the fixed proportions of the timetable layout.

use crate::cleaner::clean_text;
use crate::config::LayoutParams;
use crate::fuzzy::partial_ratio;
use crate::grid::row_bounds;
use crate::models::{BoundingBox, RegionClass, WordBox};

/// The three refined layout regions of a day page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinedLayout {
    pub time_axis: BoundingBox,
    pub week_header: BoundingBox,
    pub course_area: BoundingBox,
}

/// Groups page words into lines: words sorted by top edge, a new line starts
/// whenever the top edge jumps more than `gap` from the previous word.
fn group_anchor_lines(words: &[WordBox], gap: f32) -> Vec<Vec<&WordBox>> {
    let mut sorted: Vec<&WordBox> = words.iter().collect();
    sorted.sort_by(|a, b| a.y1.partial_cmp(&b.y1).unwrap_or(std::cmp::Ordering::Equal));

    let mut lines: Vec<Vec<&WordBox>> = Vec::new();
    let mut current: Vec<&WordBox> = Vec::new();
    let mut last_y: Option<f32> = None;
    for word in sorted {
        match last_y {
            Some(y) if (word.y1 - y).abs() > gap => {
                lines.push(std::mem::take(&mut current));
                current.push(word);
            }
            _ => current.push(word),
        }
        last_y = Some(word.y1);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    return lines;
}

/// Finds the first line containing `first` directly followed by a line containing `second`.
///
/// # Returns
///
/// The top of the first line and the bottom of the second line.
fn find_line_pair(lines: &[Vec<&WordBox>], first: &str, second: &str) -> Option<(f32, f32)> {
    for pair in lines.windows(2) {
        let line1 = pair[0].iter().map(|w| clean_text(&w.text)).collect::<Vec<String>>().join(" ");
        let line2 = pair[1].iter().map(|w| clean_text(&w.text)).collect::<Vec<String>>().join(" ");
        if line1.contains(first) && line2.contains(second) {
            let y1 = pair[0].iter().map(|w| w.y1).fold(f32::INFINITY, f32::min);
            let y2 = pair[1].iter().map(|w| w.y2).fold(f32::NEG_INFINITY, f32::max);
            return Some((y1, y2));
        }
    }
    None
}

/// Widens the week header to the OCR anchors: the "WEEK" caption on the left and
/// the last week number on the right.
fn refine_week_header(mut header: BoundingBox, words: &[WordBox], params: &LayoutParams) -> BoundingBox {
    for word in words {
        let text = clean_text(&word.text);
        let is_week_caption = params
            .week_anchors
            .iter()
            .any(|anchor| partial_ratio(&text, anchor) > params.anchor_fuzzy_threshold);
        if is_week_caption && word.x1 < header.x1 {
            header.x1 = word.x1 - params.week_left_pad;
        }
        if text.contains(params.last_week_anchor.as_str()) && word.x2 > header.x2 {
            header.x2 = word.x2 + params.week_right_pad;
        }
    }
    header
}

/// Refines the proposer's boxes into exactly one box per layout class.
///
/// # Arguments
///
/// * `proposals` - Raw proposer boxes; the first box of each class is used.
/// * `words` - OCR words of the full page.
/// * `page_height` - Height of the page image, used when neither a time axis nor a course area was proposed.
/// * `params` - Layout constants.
///
/// # Returns
///
/// `None` when no week header was proposed; the page cannot be read without one.
pub fn refine_regions(
    proposals: &[BoundingBox],
    words: &[WordBox],
    page_height: f32,
    params: &LayoutParams,
) -> Option<RefinedLayout> {
    let first_of = |class: RegionClass| proposals.iter().find(|b| b.class == class).copied();

    let week_header = refine_week_header(first_of(RegionClass::WeekHeader)?, words, params);
    let header_width = week_header.width();

    let mut time_axis = match first_of(RegionClass::TimeAxis) {
        Some(proposed) => {
            let shift = week_header.x1 - proposed.x1;
            BoundingBox::new(
                RegionClass::TimeAxis,
                proposed.x1 + shift,
                proposed.y1,
                proposed.x2 + shift,
                proposed.y2,
            )
        }
        None => {
            let (y1, y2) = match first_of(RegionClass::CourseArea) {
                Some(area) => (area.y1, area.y2),
                None => (week_header.y2 + week_header.height() * params.date_band_factor, page_height),
            };
            tracing::debug!("No time axis proposed, using fallback geometry");
            BoundingBox::new(
                RegionClass::TimeAxis,
                week_header.x1,
                y1,
                week_header.x1 + header_width * params.time_axis_width_ratio,
                y2,
            )
        }
    };
    time_axis.x2 = time_axis.x1 + header_width / params.week_columns as f32 - params.time_column_margin;

    let lines = group_anchor_lines(words, params.anchor_line_gap);
    let rows = row_bounds(params);
    if let Some((first_start, first_end)) = rows.first() {
        if let Some((top, _)) = find_line_pair(&lines, first_start, first_end) {
            time_axis.y1 = top - params.time_pair_pad;
        }
    }
    if let Some((last_start, last_end)) = rows.last() {
        if let Some((_, bottom)) = find_line_pair(&lines, last_start, last_end) {
            time_axis.y2 = bottom + params.time_pair_pad;
        }
    }

    let course_area = BoundingBox::new(
        RegionClass::CourseArea,
        time_axis.x2 + 1.0,
        time_axis.y1,
        week_header.x2,
        time_axis.y2,
    );

    Some(RefinedLayout {
        time_axis: time_axis,
        week_header: week_header,
        course_area: course_area,
    })
}
