use crate::config::PageNumber;
use crate::errors::{ExtractError, Result};
use crate::models::{BoundingBox, CourseEntry, Day, LineGroup, MergedCourseEntry, StartDate, WordBox};
use crate::ocr::OcrEngine;
use crate::proposer::{PageImage, RegionProposer};
use chrono::NaiveDate;
use opencv::core::{Mat, Scalar, CV_8UC3};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn word(text: &str, x1: f32, y1: f32, x2: f32, y2: f32) -> WordBox {
    WordBox::new(text, 90, x1, y1, x2, y2)
}

/// A single-word line spanning `y1..y2`.
pub fn line(text: &str, y1: f32, y2: f32) -> LineGroup {
    LineGroup::new(vec![word(text, 0.0, y1, 100.0, y2)])
}

pub fn white_image(rows: i32, cols: i32) -> Mat {
    Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(255.0)).unwrap()
}

pub fn blank_page(day: Day, page_number: PageNumber, rows: i32, cols: i32) -> PageImage {
    PageImage {
        day: day,
        page_number: page_number,
        path: format!("/tmp/rsttp-test-{}.png", page_number),
        image: white_image(rows, cols),
    }
}

pub fn course_entry(code: &str, day: Day, time: &str, week: &str) -> CourseEntry {
    CourseEntry {
        course_code: code.to_string(),
        group: "TEL1".to_string(),
        location: "LT19".to_string(),
        weeks: vec![week.to_string()],
        time: time.parse().unwrap(),
        day: day,
        start_date: StartDate::Date(NaiveDate::from_ymd_opt(2025, 8, 11).unwrap()),
        note: String::new(),
    }
}

pub fn merged_entry(code: &str, day: Day, weeks: &[&str], start_date: StartDate) -> MergedCourseEntry {
    MergedCourseEntry {
        course_code: code.to_string(),
        group: "TEL1".to_string(),
        location: "LT19".to_string(),
        weeks: weeks.iter().map(|w| w.to_string()).collect(),
        time: "0830-1030".parse().unwrap(),
        day: day,
        start_date: start_date,
        note: String::new(),
    }
}

/// OCR engine that fails a fixed number of times, then always returns the same words.
pub struct ScriptedOcr {
    words: Vec<WordBox>,
    failures: usize,
    unavailable: bool,
    calls: AtomicUsize,
}

impl ScriptedOcr {
    pub fn always(words: Vec<WordBox>) -> ScriptedOcr {
        ScriptedOcr::failing_then(0, words)
    }

    pub fn failing_then(failures: usize, words: Vec<WordBox>) -> ScriptedOcr {
        ScriptedOcr {
            words: words,
            failures: failures,
            unavailable: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> ScriptedOcr {
        ScriptedOcr {
            words: Vec::new(),
            failures: 0,
            unavailable: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, _image: &Mat, _psm: Option<u32>) -> Result<Vec<WordBox>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(ExtractError::OcrUnavailable("scripted".to_string()));
        }
        if call < self.failures {
            return Err(ExtractError::Ocr(format!("scripted failure {}", call + 1)));
        }
        Ok(self.words.clone())
    }
}

/// Proposes the same boxes for every page.
pub struct StaticProposer {
    pub boxes: Vec<BoundingBox>,
}

impl RegionProposer for StaticProposer {
    fn propose(&self, _page: &PageImage) -> Result<Vec<BoundingBox>> {
        Ok(self.boxes.clone())
    }
}

pub struct SlowProposer {
    pub delay: Duration,
}

impl RegionProposer for SlowProposer {
    fn propose(&self, _page: &PageImage) -> Result<Vec<BoundingBox>> {
        std::thread::sleep(self.delay);
        Ok(Vec::new())
    }
}

/// Writes a white PNG page to `/tmp` and returns its path.
pub fn write_page_png(name: &str, rows: i32, cols: i32) -> String {
    let path = format!("/tmp/rsttp-{}.png", name);
    opencv::imgcodecs::imwrite_def(&path, &white_image(rows, cols)).unwrap();
    path
}
