use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Locator not found: {0}")]
    LocatorNotFound(String),

    #[error("Timeout error: waited for {0}")]
    TimeoutError(String),

    #[error("Selection error: {0}")]
    SelectionError(String),

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element action failed: {0}")]
    ActionFailed(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Anyhow error: {0}")]
    AnyhowError(String),
}

pub type Result<T> = std::result::Result<T, BookingError>;

// headless_chrome reports everything as anyhow::Error
impl From<anyhow::Error> for BookingError {
    fn from(err: anyhow::Error) -> Self {
        BookingError::AnyhowError(err.to_string())
    }
}

impl BookingError {
    /// Stage-level failures that end the run as opposed to driver plumbing errors.
    pub fn is_booking_failure(&self) -> bool {
        matches!(
            self,
            BookingError::LocatorNotFound(_)
                | BookingError::TimeoutError(_)
                | BookingError::SelectionError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anyhow_conversion_keeps_message() {
        let err: BookingError = anyhow::anyhow!("websocket closed").into();
        assert!(matches!(err, BookingError::AnyhowError(ref m) if m == "websocket closed"));
    }

    #[test]
    fn test_booking_failure_classification() {
        assert!(BookingError::SelectionError("no seats".into()).is_booking_failure());
        assert!(BookingError::TimeoutError("results".into()).is_booking_failure());
        assert!(!BookingError::LaunchFailed("no chrome".into()).is_booking_failure());
        assert_eq!(
            BookingError::TimeoutError("search results".into()).to_string(),
            "Timeout error: waited for search results"
        );
    }
}
