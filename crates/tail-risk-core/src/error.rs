use thiserror::Error;

#[derive(Debug, Error)]
pub enum TailRiskError {
    #[error("Dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    #[error(
        "Insufficient tail data: tail_count={tail_count}, required={required}, alpha={alpha}, window={}",
        window_label(.window)
    )]
    InsufficientTailData {
        tail_count: usize,
        required: usize,
        alpha: f64,
        window: Option<usize>,
    },

    #[error("Empty window: no observations between {start} and {end}")]
    EmptyWindow { start: String, end: String },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Distribution error: {0}")]
    Distribution(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

fn window_label(window: &Option<usize>) -> String {
    match window {
        Some(w) => w.to_string(),
        None => "full".to_string(),
    }
}

impl TailRiskError {
    /// True for the tail-size condition that rolling runs recover from by skipping the window.
    pub fn is_insufficient_tail(&self) -> bool {
        matches!(self, TailRiskError::InsufficientTailData { .. })
    }
}

impl From<serde_json::Error> for TailRiskError {
    fn from(e: serde_json::Error) -> Self {
        TailRiskError::SerializationError(e.to_string())
    }
}
