use crate::models::Day;
use thiserror::Error;

/// Errors raised by the extraction pipeline.
///
/// Field-level problems (unreadable dates, cells without a matching time row) never
/// show up here; they degrade to sentinel values instead.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to render PDF: {0}")]
    Render(#[from] anyhow::Error),

    #[error("No rendered page image for {day} (page {page})")]
    MissingPage { day: Day, page: i16 },

    #[error("Unreadable page image for {day} (page {page}): {reason}")]
    UnreadablePage { day: Day, page: i16, reason: String },

    #[error("Region proposer unavailable: {0}")]
    ProposerUnavailable(String),

    #[error("Region proposer timed out after {secs}s on {day}")]
    ProposerTimeout { day: Day, secs: u64 },

    #[error("No week header detected on {day}")]
    MissingWeekHeader { day: Day },

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Image processing error: {0}")]
    Image(#[from] opencv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ExtractError {
    /// Errors after which the page simply contributes no entries.
    pub fn is_page_local(&self) -> bool {
        matches!(
            self,
            ExtractError::MissingWeekHeader { .. }
                | ExtractError::MissingPage { .. }
                | ExtractError::UnreadablePage { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ExtractError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_local_errors() {
        assert!(ExtractError::MissingWeekHeader { day: Day::Monday }.is_page_local());
        assert!(ExtractError::MissingPage { day: Day::Friday, page: 5 }.is_page_local());
        let unreadable = ExtractError::UnreadablePage {
            day: Day::Monday,
            page: 1,
            reason: "empty image".into(),
        };
        assert!(unreadable.is_page_local());
        assert!(!ExtractError::Render(anyhow::anyhow!("pdftocairo failed")).is_page_local());
        assert!(!ExtractError::OcrUnavailable("tesseract".into()).is_page_local());
        assert!(!ExtractError::ProposerTimeout { day: Day::Monday, secs: 3 }.is_page_local());
    }

    #[test]
    fn test_error_messages() {
        let err = ExtractError::MissingWeekHeader { day: Day::Wednesday };
        assert_eq!(err.to_string(), "No week header detected on Wednesday");
    }
}
