use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CropError {
    #[error("Preset limit reached (maximum {limit})")]
    LimitExceeded { limit: usize },

    #[error("Invalid crop geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid page range: {0}")]
    InvalidRange(String),

    #[error("No document loaded")]
    MissingDocument,

    #[error("No crop preset available")]
    MissingPreset,

    #[error("Preset not found: {0}")]
    PresetNotFound(String),

    #[error("Page render failed: {0}")]
    RenderFailure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("PDF operation failed: {0}")]
    Operation(String),
}

impl CropError {
    /// Whether the user can correct the problem without losing editor state.
    ///
    /// Render, storage and PDF failures abort the current operation instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CropError::LimitExceeded { .. }
                | CropError::InvalidGeometry(_)
                | CropError::InvalidRange(_)
                | CropError::MissingDocument
                | CropError::MissingPreset
                | CropError::PresetNotFound(_)
        )
    }
}

impl From<serde_json::Error> for CropError {
    fn from(e: serde_json::Error) -> Self {
        CropError::Storage(format!("Serialization error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(CropError::LimitExceeded { limit: 1 }.is_recoverable());
        assert!(CropError::InvalidGeometry("w".into()).is_recoverable());
        assert!(CropError::InvalidRange("r".into()).is_recoverable());
        assert!(!CropError::RenderFailure("boom".into()).is_recoverable());
        assert!(!CropError::Storage("quota".into()).is_recoverable());
    }

    #[test]
    fn test_limit_message_names_limit() {
        let msg = CropError::LimitExceeded { limit: 3 }.to_string();
        assert_eq!(msg, "Preset limit reached (maximum 3)");
    }
}
