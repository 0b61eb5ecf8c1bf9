//! Block segmentation and field classification for one course cell.
//!
//! A cell holds zero or more course blocks of three lines each (course code,
//! group, location), optionally preceded by holiday notes. [`BlockSegmenter`] walks
//! the cell's lines with a cursor and turns every block into a [`CourseEntry`].

use crate::cleaner::clean_text;
use crate::config::Calendar;
use crate::fuzzy::{extract_one, token_sort_ratio};
use crate::models::{CourseEntry, Day, LineGroup, StartDate, TimeRange, TimeRow, WeekDates};
use chrono::Duration;

/// Number of lines that make up one course block.
const BLOCK_LINES: usize = 3;

const LOCATION_PREFIXES: [&str; 4] = ["TR", "LT", "LKC", "S"];

/// Lexical class of a single cleaned line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    CourseCode,
    Location,
    Unclassified,
}

fn has_digit_and_letter(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit()) && text.chars().any(|c| c.is_ascii_alphabetic())
}

/// Room-like text: a known room prefix, a `+` or `-`, or a mixed alphanumeric
/// string of at least 5 characters.
pub fn is_location(text: &str) -> bool {
    let text = text.to_uppercase();
    LOCATION_PREFIXES.iter().any(|p| text.starts_with(p))
        || text.contains('+')
        || text.contains('-')
        || (has_digit_and_letter(&text) && text.chars().count() >= 5)
}

/// Mixed alphanumeric text of at least 5 characters that does not look like a room.
pub fn is_course_code(text: &str) -> bool {
    let text = text.to_uppercase();
    text.chars().count() >= 5 && has_digit_and_letter(&text) && !is_location(&text)
}

pub fn classify_line(text: &str) -> LineKind {
    if is_course_code(text) {
        LineKind::CourseCode
    } else if is_location(text) {
        LineKind::Location
    } else {
        LineKind::Unclassified
    }
}

/// The three text fields of a course block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFields {
    pub course_code: String,
    pub group: String,
    pub location: String,
}

/// Assigns course code, location and group to the three lines of a block.
///
/// The course code is the first course-code line, else line 0. The location is the
/// first location line differing from the code, else line 2. The group is the first
/// line that is neither, else line 1.
pub fn assign_fields(lines: [&str; 3]) -> CourseFields {
    let course_code = lines
        .iter()
        .find(|l| classify_line(l) == LineKind::CourseCode)
        .copied()
        .unwrap_or(lines[0]);
    let location = lines
        .iter()
        .find(|l| is_location(l) && **l != course_code)
        .copied()
        .unwrap_or(lines[2]);
    let group = lines
        .iter()
        .find(|l| **l != course_code && **l != location)
        .copied()
        .unwrap_or(lines[1]);

    CourseFields {
        course_code: course_code.to_string(),
        group: group.to_string(),
        location: location.to_string(),
    }
}

/// Matches the joined lines against the calendar's holidays with a token-sort score.
///
/// # Returns
///
/// The upper-cased holiday name when the best score reaches `threshold`.
pub fn detect_holiday(lines: &[&str], calendar: &Calendar, threshold: f64) -> Option<String> {
    let joined = lines.join(" ").to_lowercase();
    let joined = joined.trim();
    match extract_one(joined, &calendar.holidays, token_sort_ratio) {
        Some((name, score)) if score >= threshold => Some(name.to_uppercase()),
        _ => None,
    }
}

/// Everything a cell's entries share: where the cell sits in the timetable and how to read it.
#[derive(Debug, Clone)]
pub struct CellContext<'a> {
    pub day: Day,
    pub week: &'a str,
    pub week_dates: WeekDates,
    pub time_rows: &'a [TimeRow],
    pub calendar: &'a Calendar,
    pub holiday_threshold: f64,
}

impl CellContext<'_> {
    /// The week's start date moved to this cell's weekday.
    fn start_date(&self) -> StartDate {
        match (self.week_dates.start(), self.calendar.day_offset(self.day)) {
            (Some(start), Some(offset)) => StartDate::Date(start + Duration::days(offset as i64)),
            _ => StartDate::Unknown,
        }
    }
}

/// Holiday notes found in front of a block.
struct HolidayScan {
    names: Vec<String>,
    cursor: usize,
    /// Cursor right after the last holiday line, if any matched.
    note_index: Option<usize>,
}

/// Scans the grouped lines of one course cell into course entries.
pub struct BlockSegmenter<'a> {
    lines: &'a [LineGroup],
    texts: Vec<String>,
    ctx: CellContext<'a>,
}

impl<'a> BlockSegmenter<'a> {
    pub fn new(lines: &'a [LineGroup], ctx: CellContext<'a>) -> BlockSegmenter<'a> {
        let texts = lines.iter().map(|l| clean_text(&l.get_text())).collect();
        BlockSegmenter {
            lines: lines,
            texts: texts,
            ctx: ctx,
        }
    }

    fn detect(&self, lines: &[&str]) -> Option<String> {
        detect_holiday(lines, self.ctx.calendar, self.ctx.holiday_threshold)
    }

    /// Consumes holiday lines starting at `cursor`, preferring two-line matches.
    fn scan_holidays(&self, mut cursor: usize) -> HolidayScan {
        let mut names: Vec<String> = Vec::new();
        let mut note_index = None;
        while cursor < self.texts.len() {
            let current = self.texts[cursor].as_str();
            let next = self.texts.get(cursor + 1).map(|t| t.as_str()).unwrap_or("");

            let (holiday, consumed) = match self.detect(&[current, next]) {
                Some(name) => (name, 2),
                None => match self.detect(&[current]) {
                    Some(name) => (name, 1),
                    None => break,
                },
            };
            if !names.contains(&holiday) {
                names.push(holiday);
            }
            cursor += consumed;
            note_index = Some(cursor);
        }
        HolidayScan {
            names: names,
            cursor: cursor,
            note_index: note_index,
        }
    }

    /// Moves the cursor to the first window of three lines without an exact holiday name.
    ///
    /// # Returns
    ///
    /// `None` once fewer than three lines remain.
    fn align(&self, mut cursor: usize) -> Option<usize> {
        while cursor + BLOCK_LINES <= self.texts.len() {
            let window = &self.texts[cursor..cursor + BLOCK_LINES];
            if !window.iter().any(|t| self.ctx.calendar.is_holiday(t)) {
                return Some(cursor);
            }
            cursor += 1;
        }
        None
    }

    /// Maps the vertical span of the block at `start` to the time rows it touches.
    fn time_range(&self, start: usize) -> Option<TimeRange> {
        let block = &self.lines[start..start + BLOCK_LINES];
        let top = block.iter().map(|l| l.top()).fold(f32::INFINITY, f32::min);
        let bottom = block.iter().map(|l| l.bottom()).fold(f32::NEG_INFINITY, f32::max);

        let matched: Vec<&TimeRow> =
            self.ctx.time_rows.iter().filter(|r| !(r.y2 < top || r.y1 > bottom)).collect();
        let first = matched.first()?.label.parse::<TimeRange>().ok()?;
        let last = matched.last()?.label.parse::<TimeRange>().ok()?;
        TimeRange::new(first.start, last.end)
    }

    fn note(&self, holidays: &[String]) -> String {
        format!("{} on Week {}", holidays.join(" ").trim(), self.ctx.week)
    }

    /// Runs the scanner over all lines of the cell.
    pub fn segment(&self) -> Vec<CourseEntry> {
        let mut entries = Vec::new();
        let mut cursor = 0;
        while cursor < self.texts.len() {
            let holidays = self.scan_holidays(cursor);
            let Some(start) = self.align(holidays.cursor) else {
                break;
            };

            let Some(time) = self.time_range(start) else {
                tracing::debug!("Block at line {} of week {} matches no time row", start, self.ctx.week);
                cursor = start + 1;
                continue;
            };

            let fields = assign_fields([
                self.texts[start].as_str(),
                self.texts[start + 1].as_str(),
                self.texts[start + 2].as_str(),
            ]);
            let note = if !holidays.names.is_empty() && holidays.note_index == Some(start) {
                self.note(&holidays.names)
            } else {
                String::new()
            };

            entries.push(CourseEntry {
                course_code: fields.course_code,
                group: fields.group,
                location: fields.location,
                weeks: vec![self.ctx.week.to_string()],
                time: time,
                day: self.ctx.day,
                start_date: self.ctx.start_date(),
                note: note,
            });
            cursor = start + BLOCK_LINES;
        }
        entries
    }
}
