use crate::config::{Calendar, LayoutParams, OcrConfig};
use crate::errors::{ExtractError, Result};
use crate::merger::week_sort_key;
use crate::models::{BoundingBox, MergedCourseEntry, StartDate, WeekColumn, WeekDates, DATE_FORMAT};
use crate::ocr::{crop_image, recognize_with_retry, OcrEngine};
use chrono::{Duration, NaiveDate};
use opencv::core::Mat;
use std::collections::HashMap;

/// Parses the date range printed below a week column.
///
/// The first three tokens form the start date and the next three the end date,
/// both as `D Mon YY`. Month names must be the three-letter abbreviation; anything
/// else yields [`WeekDates::Unknown`].
pub fn parse_date_tokens(tokens: &[String]) -> WeekDates {
    let tokens: Vec<&str> = tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if tokens.len() < 6 {
        return WeekDates::Unknown;
    }
    // chrono's %b also accepts full month names
    if tokens[1].chars().count() != 3 || tokens[4].chars().count() != 3 {
        return WeekDates::Unknown;
    }
    let start = NaiveDate::parse_from_str(&tokens[0..3].join(" "), DATE_FORMAT);
    let end = NaiveDate::parse_from_str(&tokens[3..6].join(" "), DATE_FORMAT);
    match (start, end) {
        (Ok(start), Ok(end)) => WeekDates::Known { start, end },
        _ => WeekDates::Unknown,
    }
}

/// Reads the start and end date of every data week column.
///
/// The band read for each column starts at the header's bottom edge, is
/// `date_band_factor` header heights tall and is padded horizontally by `date_band_pad`.
/// Unreadable columns map to [`WeekDates::Unknown`].
///
/// # Errors
///
/// Only an unavailable OCR engine is reported; every other failure degrades to `Unknown`.
pub fn resolve_week_dates(
    image: &Mat,
    week_header: &BoundingBox,
    weeks: &[WeekColumn],
    ocr: &dyn OcrEngine,
    params: &LayoutParams,
    ocr_config: &OcrConfig,
) -> Result<HashMap<String, WeekDates>> {
    let y1 = week_header.y2;
    let y2 = y1 + week_header.height() * params.date_band_factor;

    let mut week_dates = HashMap::new();
    for week in weeks.iter().filter(|w| w.index != 0) {
        let crop = crop_image(
            image,
            week.x1 - params.date_band_pad,
            y1,
            week.x2 + params.date_band_pad,
            y2,
        );
        let dates = match crop {
            Ok(Some(crop)) => match recognize_with_retry(ocr, &crop.image, None, ocr_config) {
                Ok(words) => {
                    let tokens: Vec<String> = words.into_iter().map(|w| w.text).collect();
                    parse_date_tokens(&tokens)
                }
                Err(ExtractError::OcrUnavailable(msg)) => return Err(ExtractError::OcrUnavailable(msg)),
                Err(e) => {
                    tracing::debug!("Date OCR failed for week {}: {}", week.label, e);
                    WeekDates::Unknown
                }
            },
            Ok(None) => WeekDates::Unknown,
            Err(e) => {
                tracing::debug!("Date band crop failed for week {}: {}", week.label, e);
                WeekDates::Unknown
            }
        };
        if dates == WeekDates::Unknown {
            tracing::debug!("Dates of week {} are unknown", week.label);
        }
        week_dates.insert(week.label.clone(), dates);
    }
    Ok(week_dates)
}

/// Position of a week in calendar order, where recess week falls between weeks 7 and 8.
fn chronological_week_index(week: &str, calendar: &Calendar) -> Option<i64> {
    let mut ordered: Vec<&String> = calendar.weeks.iter().collect();
    ordered.sort_by(|a, b| {
        week_sort_key(a).partial_cmp(&week_sort_key(b)).unwrap_or(std::cmp::Ordering::Equal)
    });
    ordered.iter().position(|w| w.as_str() == week).map(|i| i as i64)
}

fn first_known_week<'a>(entry: &'a MergedCourseEntry, calendar: &Calendar) -> Option<&'a str> {
    entry.weeks.iter().map(|w| w.as_str()).find(|w| calendar.weeks.iter().any(|k| k == w))
}

/// Infers the start date of an entry whose date is unknown from another entry with a known date.
///
/// The first other entry that qualifies wins:
/// - same first week, different day: shifted by the weekday difference
/// - same day, different first week: shifted by the week difference
/// - same day and week: copied
///
/// # Returns
///
/// The inferred date and the index of the entry it came from, or `None` if the
/// entry's date is already known or nothing qualifies.
pub fn infer_start_date(
    entries: &[MergedCourseEntry],
    index: usize,
    calendar: &Calendar,
) -> Option<(NaiveDate, usize)> {
    let course = entries.get(index)?;
    if !course.start_date.is_unknown() {
        return None;
    }
    let course_week = first_known_week(course, calendar);

    for (j, other) in entries.iter().enumerate() {
        if j == index {
            continue;
        }
        let Some(known) = other.start_date.date() else {
            continue;
        };
        let other_week = first_known_week(other, calendar);

        if course_week == other_week && course.day != other.day {
            let diff = calendar.day_offset(course.day)? as i64 - calendar.day_offset(other.day)? as i64;
            return Some((known + Duration::days(diff), j));
        }
        if course.day == other.day && course_week != other_week {
            let (Some(cw), Some(ow)) = (course_week, other_week) else {
                continue;
            };
            let diff = chronological_week_index(cw, calendar)? - chronological_week_index(ow, calendar)?;
            return Some((known + Duration::weeks(diff), j));
        }
        if course.day == other.day && course_week == other_week {
            return Some((known, j));
        }
    }
    None
}

/// Fills every unknown start date that can be inferred from the entries' known dates.
///
/// Only dates known before the call are used as sources.
///
/// # Returns
///
/// The number of entries that received an inferred date.
pub fn fill_unknown_start_dates(entries: &mut [MergedCourseEntry], calendar: &Calendar) -> usize {
    let snapshot = entries.to_vec();
    let mut filled = 0;
    for (i, entry) in entries.iter_mut().enumerate() {
        if let Some((date, source)) = infer_start_date(&snapshot, i, calendar) {
            tracing::info!(
                "Inferred start date {} for {} ({}) from {}",
                date.format(DATE_FORMAT),
                entry.course_code,
                entry.day,
                snapshot[source].course_code
            );
            entry.start_date = StartDate::Date(date);
            filled += 1;
        }
    }
    filled
}
