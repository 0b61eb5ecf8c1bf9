//! OCR through the Tesseract command line tool.
//!
//! Images are encoded to PNG in memory with OpenCV and piped to
//! `tesseract stdin stdout tsv`; the word rows of the TSV report become [`WordBox`]es.

use crate::config::OcrConfig;
use crate::errors::{ExtractError, Result};
use crate::models::WordBox;
use opencv::core::{self, Mat, Scalar, Vector};
use opencv::imgcodecs;
use opencv::imgproc;
use opencv::prelude::*;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Word-level OCR over an image region. Returned boxes are in the image's local coordinates.
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Mat, psm: Option<u32>) -> Result<Vec<WordBox>>;
}

pub struct TesseractCli {
    config: OcrConfig,
}

impl TesseractCli {
    pub fn new(config: OcrConfig) -> TesseractCli {
        TesseractCli { config: config }
    }

    /// Checks that the tesseract binary can be started.
    pub fn check(&self) -> Result<()> {
        let output = Command::new(&self.config.command)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| ExtractError::OcrUnavailable(format!("{}: {}", self.config.command, e)))?;
        if !output.status.success() {
            return Err(ExtractError::OcrUnavailable(format!(
                "{} --version exited with {:?}",
                self.config.command,
                output.status.code()
            )));
        }
        Ok(())
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, image: &Mat, psm: Option<u32>) -> Result<Vec<WordBox>> {
        if image.empty() || image.cols() == 0 || image.rows() == 0 {
            return Ok(Vec::new());
        }

        let mut png = Vector::<u8>::new();
        imgcodecs::imencode_def(".png", image, &mut png)?;

        let mut args: Vec<String> = vec![
            "stdin".to_string(),
            "stdout".to_string(),
            "-l".to_string(),
            self.config.language.clone(),
        ];
        if let Some(psm) = psm {
            args.push("--psm".to_string());
            args.push(psm.to_string());
        }
        args.push("tsv".to_string());

        let mut child = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ExtractError::OcrUnavailable(format!("{}: {}", self.config.command, e)))?;

        {
            let stdin = child
                .stdin
                .as_mut()
                .ok_or_else(|| ExtractError::Ocr("tesseract stdin is not available".to_string()))?;
            stdin.write_all(png.as_slice())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(ExtractError::Ocr(format!(
                "tesseract exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let tsv = String::from_utf8_lossy(&output.stdout);
        Ok(parse_tsv(&tsv))
    }
}

/// Parses Tesseract's TSV report into word boxes.
///
/// Header and structural rows are skipped; words with empty text or a confidence of `-1` are dropped.
pub fn parse_tsv(tsv: &str) -> Vec<WordBox> {
    let mut words = Vec::new();
    for line in tsv.lines() {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 12 || cols[0] == "level" {
            continue;
        }
        let text = cols[11..].join("\t").trim().to_string();
        if text.is_empty() {
            continue;
        }
        let confidence = match cols[10].trim().parse::<f32>() {
            Ok(conf) if conf >= 0.0 => conf.round() as i32,
            _ => continue,
        };
        let numbers: Option<Vec<f32>> =
            cols[6..10].iter().map(|c| c.trim().parse::<f32>().ok()).collect();
        let Some(numbers) = numbers else {
            continue;
        };
        let (left, top, width, height) = (numbers[0], numbers[1], numbers[2], numbers[3]);
        words.push(WordBox::new(&text, confidence, left, top, left + width, top + height));
    }
    words
}

/// Runs the engine, retrying failed invocations up to `config.retries` more times.
///
/// An unavailable engine is reported immediately.
pub fn recognize_with_retry(
    engine: &dyn OcrEngine,
    image: &Mat,
    psm: Option<u32>,
    config: &OcrConfig,
) -> Result<Vec<WordBox>> {
    let mut attempt = 0;
    loop {
        match engine.recognize(image, psm) {
            Ok(words) => return Ok(words),
            Err(ExtractError::OcrUnavailable(msg)) => return Err(ExtractError::OcrUnavailable(msg)),
            Err(e) if attempt < config.retries => {
                attempt += 1;
                tracing::warn!("OCR attempt {} failed: {}. Retrying...", attempt, e);
                std::thread::sleep(Duration::from_millis(config.retry_delay_ms));
            }
            Err(e) => return Err(e),
        }
    }
}

/// A copied image region and the page position of its top-left pixel.
pub struct Crop {
    pub image: Mat,
    pub x: f32,
    pub y: f32,
}

/// Copies the rectangle `[x1, x2) x [y1, y2)` out of the image, clamped to its bounds.
///
/// # Returns
///
/// `None` when nothing of the rectangle lies inside the image.
pub fn crop_image(image: &Mat, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Option<Crop>> {
    let left = (x1.floor() as i32).clamp(0, image.cols());
    let top = (y1.floor() as i32).clamp(0, image.rows());
    let right = (x2.ceil() as i32).clamp(0, image.cols());
    let bottom = (y2.ceil() as i32).clamp(0, image.rows());
    if right <= left || bottom <= top {
        return Ok(None);
    }
    let roi = Mat::roi(image, core::Rect::new(left, top, right - left, bottom - top))?;
    Ok(Some(Crop {
        image: roi.try_clone()?,
        x: left as f32,
        y: top as f32,
    }))
}

/// Prepares a course cell crop for OCR.
///
/// Cyan highlight is flattened to white, then the image is converted to grayscale,
/// min-max normalised and binarised with an adaptive mean threshold.
pub fn preprocess_cell(crop: &Mat) -> Result<Mat> {
    let mut image = crop.try_clone()?;

    let mut hsv = Mat::default();
    imgproc::cvt_color_def(&image, &mut hsv, imgproc::COLOR_BGR2HSV)?;
    let mut cyan_mask = Mat::default();
    core::in_range(
        &hsv,
        &Scalar::new(70.0, 20.0, 100.0, 0.0),
        &Scalar::new(110.0, 255.0, 255.0, 0.0),
        &mut cyan_mask,
    )?;
    image.set_to(&Scalar::all(255.0), &cyan_mask)?;

    let mut gray = Mat::default();
    imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;

    let mut norm = Mat::default();
    core::normalize(&gray, &mut norm, 0.0, 255.0, core::NORM_MINMAX, -1, &core::no_array())?;

    let mut thresh = Mat::default();
    imgproc::adaptive_threshold(
        &norm,
        &mut thresh,
        255.0,
        imgproc::ADAPTIVE_THRESH_MEAN_C,
        imgproc::THRESH_BINARY,
        15,
        10.0,
    )?;
    Ok(thresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedOcr;
    use opencv::core::CV_8UC3;

    const TSV: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext
1\t1\t0\t0\t0\t0\t0\t0\t400\t300\t-1\t
4\t1\t1\t1\t1\t0\t10\t20\t200\t30\t-1\t
5\t1\t1\t1\t1\t1\t10\t20\t80\t30\t96.123\tSC2001
5\t1\t1\t1\t1\t2\t100\t22\t40\t28\t91\tLEC
5\t1\t1\t1\t1\t3\t150\t22\t40\t28\t95\t
5\t1\t1\t1\t2\t1\t10\t60\t60\t30\t-1\tnoise
";

    #[test]
    fn test_parse_tsv_keeps_words_only() {
        let words = parse_tsv(TSV);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "SC2001");
        assert_eq!(words[0].confidence, 96);
        assert_eq!((words[0].x1, words[0].y1, words[0].x2, words[0].y2), (10.0, 20.0, 90.0, 50.0));
        assert_eq!(words[1].text, "LEC");
        assert_eq!(words[1].yc(), 36.0);
    }

    #[test]
    fn test_parse_tsv_ignores_garbage() {
        assert!(parse_tsv("").is_empty());
        assert!(parse_tsv("5\t1\t1\t1\t1\t1\tx\t20\t80\t30\t96\tWORD").is_empty());
    }

    #[test_log::test]
    fn test_retry_recovers_after_failures() {
        let engine = ScriptedOcr::failing_then(2, vec![WordBox::new("G05", 90, 0.0, 0.0, 10.0, 10.0)]);
        let config = OcrConfig { retries: 2, retry_delay_ms: 0, ..OcrConfig::default() };
        let words = recognize_with_retry(&engine, &Mat::default(), Some(6), &config).unwrap();
        assert_eq!(words.len(), 1);
        assert_eq!(engine.calls(), 3);
    }

    #[test_log::test]
    fn test_retry_gives_up() {
        let engine = ScriptedOcr::failing_then(5, Vec::new());
        let config = OcrConfig { retries: 1, retry_delay_ms: 0, ..OcrConfig::default() };
        assert!(recognize_with_retry(&engine, &Mat::default(), None, &config).is_err());
        assert_eq!(engine.calls(), 2);
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let config = OcrConfig {
            command: "/nonexistent/tesseract-rsttp".to_string(),
            ..OcrConfig::default()
        };
        let engine = TesseractCli::new(config);
        assert!(matches!(engine.check(), Err(ExtractError::OcrUnavailable(_))));
    }

    #[test]
    fn test_crop_image_clamps_to_bounds() {
        let image = Mat::new_rows_cols_with_default(100, 200, CV_8UC3, Scalar::all(255.0)).unwrap();
        let crop = crop_image(&image, -5.5, 10.2, 50.0, 400.0).unwrap().unwrap();
        assert_eq!((crop.x, crop.y), (0.0, 10.0));
        assert_eq!(crop.image.cols(), 50);
        assert_eq!(crop.image.rows(), 90);
        assert!(crop_image(&image, 250.0, 0.0, 300.0, 10.0).unwrap().is_none());
        assert!(crop_image(&image, 20.0, 20.0, 20.0, 30.0).unwrap().is_none());
    }

    #[test]
    fn test_preprocess_cell_whitens_cyan() {
        // BGR cyan highlight: H=90, S=255, V=255 in OpenCV units
        let crop = Mat::new_rows_cols_with_default(40, 40, CV_8UC3, Scalar::new(255.0, 255.0, 0.0, 0.0))
            .unwrap();
        let out = preprocess_cell(&crop).unwrap();
        assert_eq!(out.rows(), 40);
        assert_eq!(out.channels(), 1);
        assert_eq!(*out.at_2d::<u8>(20, 20).unwrap(), 255);
    }
}
