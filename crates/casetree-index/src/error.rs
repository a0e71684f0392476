//! Error types for pipeline event delivery

/// Errors delivering events to an [`EventPump`](crate::EventPump)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PumpError {
    /// Pump task has stopped
    #[error("event pump closed")]
    Closed,

    /// Pump task panicked or was aborted
    #[error("event pump task failed: {0}")]
    TaskFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pump_error_display() {
        assert_eq!(PumpError::Closed.to_string(), "event pump closed");
        assert!(PumpError::TaskFailed("boom".to_string())
            .to_string()
            .contains("boom"));
    }
}
