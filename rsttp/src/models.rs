use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/// Date format used on the timetable header and in the output records.
pub const DATE_FORMAT: &str = "%d %b %y";

/// Sentinel written wherever a date could not be read.
pub const UNKNOWN: &str = "UNKNOWN";

/// Layout classes produced by the region proposer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum RegionClass {
    TimeAxis,
    WeekHeader,
    CourseArea,
}

impl TryFrom<u8> for RegionClass {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RegionClass::TimeAxis),
            1 => Ok(RegionClass::WeekHeader),
            2 => Ok(RegionClass::CourseArea),
            other => Err(format!("unknown region class id: {}", other)),
        }
    }
}

/// A rectangular region of a page image in pixel coordinates.
///
/// # Fields
///
/// * `x1`, `y1` - The top-left corner.
/// * `x2`, `y2` - The bottom-right corner.
/// * `class` - The layout class of the region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class: RegionClass,
}

impl BoundingBox {
    pub fn new(class: RegionClass, x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox {
            x1: x1,
            y1: y1,
            x2: x2,
            y2: y2,
            class: class,
        }
    }

    pub fn width(&self) -> f32 {
        return self.x2 - self.x1;
    }

    pub fn height(&self) -> f32 {
        return self.y2 - self.y1;
    }

    /// Whether `x1 < x2` and `y1 < y2`.
    pub fn is_valid(&self) -> bool {
        return self.x1 < self.x2 && self.y1 < self.y2;
    }
}

/// A word recognised by the OCR engine, in page coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordBox {
    pub text: String,
    pub confidence: i32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl WordBox {
    pub fn new(text: &str, confidence: i32, x1: f32, y1: f32, x2: f32, y2: f32) -> WordBox {
        WordBox {
            text: text.to_string(),
            confidence: confidence,
            x1: x1,
            y1: y1,
            x2: x2,
            y2: y2,
        }
    }

    pub fn xc(&self) -> f32 {
        return (self.x1 + self.x2) / 2.0;
    }

    pub fn yc(&self) -> f32 {
        return (self.y1 + self.y2) / 2.0;
    }

    /// Moves the word from crop-local to page coordinates.
    pub fn offset(mut self, dx: f32, dy: f32) -> WordBox {
        self.x1 += dx;
        self.x2 += dx;
        self.y1 += dy;
        self.y2 += dy;
        self
    }
}

/// Words that belong to one visual text line, ordered left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct LineGroup {
    pub words: Vec<WordBox>,
}

impl LineGroup {
    pub fn new(mut words: Vec<WordBox>) -> LineGroup {
        words.sort_by(|a, b| a.x1.partial_cmp(&b.x1).unwrap_or(std::cmp::Ordering::Equal));
        LineGroup { words: words }
    }

    /// Returns the texts of all words joined by single spaces.
    pub fn get_text(&self) -> String {
        self.words.iter().map(|w| w.text.as_str()).collect::<Vec<&str>>().join(" ")
    }

    pub fn top(&self) -> f32 {
        self.words.iter().map(|w| w.y1).fold(f32::INFINITY, f32::min)
    }

    pub fn bottom(&self) -> f32 {
        self.words.iter().map(|w| w.y2).fold(f32::NEG_INFINITY, f32::max)
    }
}

/// One of the equal-width slices of the week header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekColumn {
    pub label: String,
    pub x1: f32,
    pub x2: f32,
    pub index: usize,
}

/// One half-hour row of the time axis, e.g. `0830-0900`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeRow {
    pub label: String,
    pub y1: f32,
    pub y2: f32,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter, EnumString,
)]
pub enum Day {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
}

/// A `HHMM-HHMM` time range with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<TimeRange> {
        if start < end {
            Some(TimeRange { start, end })
        } else {
            None
        }
    }

    pub fn start_minutes(&self) -> u32 {
        self.start.hour() * 60 + self.start.minute()
    }

    pub fn end_minutes(&self) -> u32 {
        self.end.hour() * 60 + self.end.minute()
    }

    /// Half-open overlap test; ranges that only touch do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        !(self.end_minutes() <= other.start_minutes() || other.end_minutes() <= self.start_minutes())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H%M"), self.end.format("%H%M"))
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) =
            s.trim().split_once('-').ok_or_else(|| format!("invalid time range: {}", s))?;
        let start = NaiveTime::parse_from_str(start.trim(), "%H%M")
            .map_err(|e| format!("invalid start time '{}': {}", start, e))?;
        let end = NaiveTime::parse_from_str(end.trim(), "%H%M")
            .map_err(|e| format!("invalid end time '{}': {}", end, e))?;
        TimeRange::new(start, end).ok_or_else(|| format!("time range must end after it starts: {}", s))
    }
}

impl Serialize for TimeRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The start and end date printed below a week column, or `Unknown` when they could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeekDates {
    Known { start: NaiveDate, end: NaiveDate },
    Unknown,
}

impl WeekDates {
    pub fn start(&self) -> Option<NaiveDate> {
        match self {
            WeekDates::Known { start, .. } => Some(*start),
            WeekDates::Unknown => None,
        }
    }
}

/// A calendar date rendered as `DD Mon YY`, or the `UNKNOWN` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDate {
    Date(NaiveDate),
    Unknown,
}

impl StartDate {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            StartDate::Date(date) => Some(*date),
            StartDate::Unknown => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, StartDate::Unknown)
    }
}

impl fmt::Display for StartDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartDate::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            StartDate::Unknown => write!(f, "{}", UNKNOWN),
        }
    }
}

impl FromStr for StartDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(UNKNOWN) {
            return Ok(StartDate::Unknown);
        }
        NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(StartDate::Date)
            .map_err(|e| format!("invalid start date '{}': {}", s, e))
    }
}

impl Serialize for StartDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StartDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// A course block read from a single week column of one day page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseEntry {
    pub course_code: String,
    pub group: String,
    pub location: String,
    pub weeks: Vec<String>,
    pub time: TimeRange,
    pub day: Day,
    pub start_date: StartDate,
    pub note: String,
}

/// A course spanning every week column it was detected in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedCourseEntry {
    pub course_code: String,
    pub group: String,
    pub location: String,
    pub weeks: Vec<String>,
    pub time: TimeRange,
    pub day: Day,
    pub start_date: StartDate,
    pub note: String,
}

impl From<MergedCourseEntry> for CourseEntry {
    fn from(entry: MergedCourseEntry) -> Self {
        CourseEntry {
            course_code: entry.course_code,
            group: entry.group,
            location: entry.location,
            weeks: entry.weeks,
            time: entry.time,
            day: entry.day,
            start_date: entry.start_date,
            note: entry.note,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(s: &str) -> TimeRange {
        s.parse().unwrap()
    }

    #[test]
    fn test_time_range_overlap_excludes_touching() {
        assert!(!range("0830-0900").overlaps(&range("0900-0930")));
        assert!(!range("0900-0930").overlaps(&range("0830-0900")));
        assert!(range("0830-0930").overlaps(&range("0900-1000")));
        assert!(range("0900-1000").overlaps(&range("0830-0930")));
        assert!(range("0830-2230").overlaps(&range("1200-1230")));
    }

    #[test]
    fn test_time_range_parse_and_display() {
        let r = range("0830-1000");
        assert_eq!(r.start_minutes(), 510);
        assert_eq!(r.end_minutes(), 600);
        assert_eq!(r.to_string(), "0830-1000");
        assert!("1000-0830".parse::<TimeRange>().is_err());
        assert!("0830".parse::<TimeRange>().is_err());
        assert!("08x0-0900".parse::<TimeRange>().is_err());
    }

    #[test]
    fn test_start_date_serde() {
        let date = StartDate::Date(NaiveDate::from_ymd_opt(2025, 10, 20).unwrap());
        assert_eq!(serde_json::to_string(&date).unwrap(), "\"20 Oct 25\"");
        assert_eq!(serde_json::to_string(&StartDate::Unknown).unwrap(), "\"UNKNOWN\"");
        let back: StartDate = serde_json::from_str("\"20 Oct 25\"").unwrap();
        assert_eq!(back, date);
        assert!("unknown".parse::<StartDate>().unwrap().is_unknown());
    }

    #[test]
    fn test_course_entry_json_keys() {
        let entry = CourseEntry {
            course_code: "SC2001".to_string(),
            group: "TEL1".to_string(),
            location: "LT19".to_string(),
            weeks: vec!["3".to_string()],
            time: range("0830-1030"),
            day: Day::Tuesday,
            start_date: StartDate::Unknown,
            note: String::new(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["courseCode"], "SC2001");
        assert_eq!(value["startDate"], "UNKNOWN");
        assert_eq!(value["time"], "0830-1030");
        assert_eq!(value["day"], "Tuesday");
    }

    #[test]
    fn test_line_group_orders_words() {
        let line = LineGroup::new(vec![
            WordBox::new("LT1", 90, 50.0, 10.0, 80.0, 20.0),
            WordBox::new("TR+", 90, 0.0, 12.0, 40.0, 24.0),
        ]);
        assert_eq!(line.get_text(), "TR+ LT1");
        assert_eq!(line.top(), 10.0);
        assert_eq!(line.bottom(), 24.0);
    }

    #[test]
    fn test_region_class_ids() {
        assert_eq!(RegionClass::try_from(1u8), Ok(RegionClass::WeekHeader));
        assert!(RegionClass::try_from(7u8).is_err());
    }
}
