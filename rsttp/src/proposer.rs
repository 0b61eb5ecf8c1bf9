//! Region proposals for the timetable layout.
//!
//! The object detector itself lives outside this crate. [`DetectionFile`] replays
//! detections computed ahead of time, keyed by page number.

use crate::config::PageNumber;
use crate::errors::{ExtractError, Result};
use crate::models::{BoundingBox, Day, RegionClass};
use opencv::core::Mat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// A rendered day page.
pub struct PageImage {
    pub day: Day,
    pub page_number: PageNumber,
    pub path: String,
    pub image: Mat,
}

/// Proposes layout regions for a page image in the image's native pixel space.
///
/// Implementations may return zero or several boxes per class.
pub trait RegionProposer: Send + Sync {
    fn propose(&self, page: &PageImage) -> Result<Vec<BoundingBox>>;
}

/// One raw detection as written by the detector: class id 0 = time axis, 1 = week header, 2 = course area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: u8,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Detection {
    pub fn to_bounding_box(&self) -> Option<BoundingBox> {
        let class = RegionClass::try_from(self.class).ok()?;
        let bbox = BoundingBox::new(class, self.x1, self.y1, self.x2, self.y2);
        if bbox.is_valid() {
            Some(bbox)
        } else {
            None
        }
    }
}

/// Detections loaded from a JSON file of the form `{"1": [{"class": 1, "x1": ..}], "2": [..]}`.
#[derive(Debug, Clone, Default)]
pub struct DetectionFile {
    detections: HashMap<PageNumber, Vec<Detection>>,
}

impl DetectionFile {
    pub fn from_json(text: &str) -> Result<DetectionFile> {
        let raw: HashMap<String, Vec<Detection>> = serde_json::from_str(text)?;
        let mut detections = HashMap::new();
        for (page, boxes) in raw {
            let page = page.trim().parse::<PageNumber>().map_err(|e| {
                ExtractError::ProposerUnavailable(format!("invalid page key '{}': {}", page, e))
            })?;
            detections.insert(page, boxes);
        }
        Ok(DetectionFile { detections })
    }

    pub fn from_path(path: &str) -> Result<DetectionFile> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ExtractError::ProposerUnavailable(format!("{}: {}", path, e)))?;
        DetectionFile::from_json(&text)
    }
}

impl RegionProposer for DetectionFile {
    fn propose(&self, page: &PageImage) -> Result<Vec<BoundingBox>> {
        let boxes = self
            .detections
            .get(&page.page_number)
            .map(|dets| {
                dets.iter()
                    .filter_map(|d| {
                        let bbox = d.to_bounding_box();
                        if bbox.is_none() {
                            tracing::debug!(
                                "Dropping invalid detection on page {}: {:?}",
                                page.page_number,
                                d
                            );
                        }
                        bbox
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(boxes)
    }
}

/// Runs the proposer on a blocking thread under a hard timeout and hands the page back.
pub async fn propose_with_timeout(
    proposer: Arc<dyn RegionProposer>,
    page: PageImage,
    timeout: Duration,
) -> Result<(PageImage, Vec<BoundingBox>)> {
    let day = page.day;
    let task = tokio::task::spawn_blocking(move || {
        let boxes = proposer.propose(&page);
        (page, boxes)
    });
    match tokio::time::timeout(timeout, task).await {
        Ok(joined) => {
            let (page, boxes) = joined?;
            Ok((page, boxes?))
        }
        Err(_) => Err(ExtractError::ProposerTimeout {
            day: day,
            secs: timeout.as_secs(),
        }),
    }
}
