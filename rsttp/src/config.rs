use crate::models::Day;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub type PageNumber = i16;

/// Pixel constants and thresholds used while locating the timetable grid and reading cells.
///
/// The defaults are tuned for pages rendered at 300 DPI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    /// Partial-ratio score a token must exceed to count as a "WEEK" label anchor.
    pub anchor_fuzzy_threshold: f64,
    pub week_anchors: Vec<String>,
    /// Text that marks the last week number of the header.
    pub last_week_anchor: String,
    pub week_left_pad: f32,
    pub week_right_pad: f32,
    /// Gap kept between the time axis and the first data column.
    pub time_column_margin: f32,
    /// Fallback time axis width as a share of the week header width.
    pub time_axis_width_ratio: f32,
    /// Maximum y1 distance between consecutive words of one anchor line.
    pub anchor_line_gap: f32,
    pub time_pair_pad: f32,
    pub shrink_ratio: f32,
    pub cell_margin: f32,
    /// Neighbor radius for vertical line clustering.
    pub line_eps: f32,
    pub holiday_threshold: f64,
    pub date_band_pad: f32,
    /// Height of the date band below the header, in header heights.
    pub date_band_factor: f32,
    pub grid_start: String,
    pub time_rows: usize,
    pub row_minutes: i64,
    pub week_columns: usize,
}

impl Default for LayoutParams {
    fn default() -> Self {
        LayoutParams {
            anchor_fuzzy_threshold: 80.0,
            week_anchors: vec!["WEEK".into(), "VEEK".into(), "EEK".into(), "EKS".into()],
            last_week_anchor: "13".to_string(),
            week_left_pad: 30.0,
            week_right_pad: 60.0,
            time_column_margin: 30.0,
            time_axis_width_ratio: 0.08,
            anchor_line_gap: 10.0,
            time_pair_pad: 15.0,
            shrink_ratio: 0.1,
            cell_margin: 10.0,
            line_eps: 20.0,
            holiday_threshold: 80.0,
            date_band_pad: 5.0,
            date_band_factor: 2.0,
            grid_start: "0830".to_string(),
            time_rows: 28,
            row_minutes: 30,
            week_columns: 15,
        }
    }
}

/// Day names, week labels and holiday names of one academic calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calendar {
    pub days: Vec<Day>,
    /// Week labels in header order (column 1 onwards).
    pub weeks: Vec<String>,
    /// Canonical holiday names, lower-case.
    pub holidays: Vec<String>,
}

impl Default for Calendar {
    fn default() -> Self {
        let mut weeks: Vec<String> = (1..=13).map(|w| w.to_string()).collect();
        weeks.push("Recess".to_string());
        Calendar {
            days: vec![Day::Monday, Day::Tuesday, Day::Wednesday, Day::Thursday, Day::Friday],
            weeks: weeks,
            holidays: [
                "new year's day",
                "chinese new year",
                "good friday",
                "hari raya puasa",
                "labour day",
                "vesak day",
                "hari raya haji",
                "national day",
                "deepavali",
                "christmas day",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        }
    }
}

impl Calendar {
    /// Returns the day's offset from the first day of the week, if the day is part of the calendar.
    pub fn day_offset(&self, day: Day) -> Option<usize> {
        self.days.iter().position(|d| *d == day)
    }

    /// Exact (case-insensitive) membership test against the holiday list.
    pub fn is_holiday(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.holidays.iter().any(|h| h.to_lowercase() == text)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub command: String,
    pub language: String,
    /// Page segmentation mode used for course cells ("uniform block of text").
    pub cell_psm: u32,
    pub retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        OcrConfig {
            command: "tesseract".to_string(),
            language: "eng".to_string(),
            cell_psm: 6,
            retries: 2,
            retry_delay_ms: 200,
        }
    }
}

/// Tunable settings of the extraction pipeline. Every field has a default, so a
/// settings file only needs to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub layout: LayoutParams,
    pub calendar: Calendar,
    pub ocr: OcrConfig,
    pub render_dpi: u32,
    pub proposer_timeout_secs: u64,
    pub max_concurrent_pages: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            layout: LayoutParams::default(),
            calendar: Calendar::default(),
            ocr: OcrConfig::default(),
            render_dpi: 300,
            proposer_timeout_secs: 120,
            max_concurrent_pages: 5,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file. Missing keys keep their defaults.
    pub fn from_json_file(path: &str) -> Result<Settings> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        return Ok(settings);
    }
}

/// `ExtractConfig` holds the working files of one timetable document.
///
/// # Fields
///
/// * `pdf_path` - The file path the PDF document is copied or downloaded to.
/// * `page_images` - A map of page numbers to rendered page image paths.
/// * `pdf_info` - Metadata reported by `pdfinfo`.
/// * `settings` - The tunable pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    pub pdf_path: String,
    pub page_images: HashMap<PageNumber, String>,
    pub pdf_info: HashMap<String, String>,
    pub settings: Settings,
}

impl ExtractConfig {
    /// Creates a new `ExtractConfig` with default settings and a random PDF path in `/tmp`.
    pub fn new() -> ExtractConfig {
        return ExtractConfig::with_settings(Settings::default());
    }

    pub fn with_settings(settings: Settings) -> ExtractConfig {
        let mut rng = rand::rng();
        let random_value = rng.random_range(10000..99999);
        let mut pdf_path = String::new();
        pdf_path.push_str("/tmp/timetable_");
        pdf_path.push_str(&random_value.to_string());
        pdf_path.push_str(".pdf");

        ExtractConfig {
            pdf_path: pdf_path,
            page_images: HashMap::new(),
            pdf_info: HashMap::new(),
            settings: settings,
        }
    }

    /// Returns the number of pages reported by `pdfinfo`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pdfinfo` has not run yet or its value is not a number.
    pub fn page_count(&self) -> Result<usize> {
        self.pdf_info
            .get("pages")
            .ok_or_else(|| anyhow::anyhow!("Page count not available - pdfinfo may have failed"))?
            .parse::<usize>()
            .map_err(|e| anyhow::anyhow!("Invalid pages value: {}", e))
    }

    /// Removes the copied PDF and every rendered page image.
    pub fn clean_files(&self) -> Result<()> {
        if Path::new(&self.pdf_path).exists() {
            std::fs::remove_file(&self.pdf_path)?;
        }
        for image in self.page_images.values() {
            if Path::new(image).exists() {
                std::fs::remove_file(image)?;
            }
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_partial_json_keeps_defaults() {
        let json = r#"{"render_dpi": 200, "layout": {"line_eps": 12.5}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.render_dpi, 200);
        assert_eq!(settings.layout.line_eps, 12.5);
        assert_eq!(settings.layout.time_rows, 28);
        assert_eq!(settings.calendar.weeks.len(), 14);
        assert_eq!(settings.ocr.cell_psm, 6);
    }

    #[test]
    fn test_calendar_lookups() {
        let calendar = Calendar::default();
        assert_eq!(calendar.day_offset(Day::Monday), Some(0));
        assert_eq!(calendar.day_offset(Day::Friday), Some(4));
        assert!(calendar.is_holiday("DEEPAVALI"));
        assert!(!calendar.is_holiday("DEEPAVAL1"));
        assert_eq!(calendar.weeks.last().map(|w| w.as_str()), Some("Recess"));
    }

    #[test]
    fn test_new_config_uses_tmp_pdf_path() {
        let config = ExtractConfig::new();
        assert!(config.pdf_path.starts_with("/tmp/timetable_"));
        assert!(config.pdf_path.ends_with(".pdf"));
        assert!(config.page_count().is_err());
    }
}
