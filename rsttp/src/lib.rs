//! # RuSt TimeTable Parser (rsttp)
//!
//! The `rsttp` library turns a scanned university timetable PDF (one page per weekday,
//! 15 week columns, half-hour rows from 08:30 to 22:30) into structured course entries.
//!
//! ## Quick Start
//!
//! ### Pre-requirements
//! - Poppler: `sudo apt install poppler-utils`
//! - OpenCV: `sudo apt install libopencv-dev clang libclang-dev`
//! - Tesseract: `sudo apt install tesseract-ocr`
//!
//! ### Pipeline
//!
//! For every day page the library
//! 1. asks a [`proposer::RegionProposer`] for the time axis, week header and course area,
//! 2. corrects those regions with OCR anchors ([`layout`]),
//! 3. derives week columns and time rows ([`grid`]) and reads the week dates ([`dates`]),
//! 4. reads every week column, groups its words into lines and segments them into
//!    course blocks ([`extracter`], [`segmenter`]),
//! 5. merges the per-column entries of the day ([`merger`]).
//!
//! ## Examples
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use rsttp::config::ExtractConfig;
//! # use rsttp::ocr::TesseractCli;
//! # use rsttp::parser::{entries2json, parse};
//! # use rsttp::proposer::DetectionFile;
//! # async fn try_main() -> rsttp::errors::Result<()> {
//! let mut config = ExtractConfig::new();
//! let proposer = Arc::new(DetectionFile::from_path("detections.json")?);
//! let ocr = Arc::new(TesseractCli::new(config.settings.ocr.clone()));
//! let entries = parse("timetable.pdf", &mut config, proposer, ocr, true).await?; // Vec<MergedCourseEntry>
//! let json = entries2json(&entries)?; // String
//! # Ok(())
//! # }
//! # #[tokio::main]
//! # async fn main() {
//! #    try_main().await.unwrap();
//! # }
//! ```
//!
//! ## Tests
//!
//! ```sh
//! cargo test
//! ```

pub mod cleaner;
pub mod config;
pub mod converter;
pub mod dates;
pub mod errors;
pub mod extracter;
pub mod fuzzy;
pub mod grid;
pub mod layout;
pub mod merger;
pub mod models;
pub mod ocr;
pub mod parser;
pub mod proposer;
pub mod segmenter;

#[cfg(test)]
pub(crate) mod test_utils;
