use thiserror::Error;

/// Core error types for supervisor operations
#[derive(Error, Debug)]
pub enum WardenError {
    #[error("Supervisor has not been started")]
    NotStarted,

    #[error("Child process failed to launch: {0}")]
    LaunchFailed(String),

    #[error("Process management error: {0}")]
    ProcessError(String),

    #[error("Status server error: {0}")]
    ServerError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl WardenError {
    pub fn launch_failed(msg: impl Into<String>) -> Self {
        WardenError::LaunchFailed(msg.into())
    }

    pub fn process_error(msg: impl Into<String>) -> Self {
        WardenError::ProcessError(msg.into())
    }

    pub fn server_error(msg: impl Into<String>) -> Self {
        WardenError::ServerError(msg.into())
    }

    pub fn configuration_error(msg: impl Into<String>) -> Self {
        WardenError::ConfigurationError(msg.into())
    }

    /// Check if this error leaves the supervisor in an absorbing state
    ///
    /// A terminal error means the current supervisor instance will never
    /// reach `Running`; a fresh instance is required.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WardenError::LaunchFailed(_)
                | WardenError::ConfigurationError(_)
                | WardenError::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WardenError::launch_failed("no such file");
        let display = format!("{error}");
        assert!(display.contains("failed to launch"));

        let error = WardenError::process_error("kill failed");
        let display = format!("{error}");
        assert!(display.contains("Process management error"));
    }

    #[test]
    fn test_terminal_classification() {
        assert!(WardenError::launch_failed("test").is_terminal());
        assert!(WardenError::configuration_error("test").is_terminal());
        assert!(WardenError::Cancelled.is_terminal());

        assert!(!WardenError::process_error("test").is_terminal());
        assert!(!WardenError::Timeout("test".to_string()).is_terminal());
        assert!(!WardenError::NotStarted.is_terminal());
    }

    #[test]
    fn test_anyhow_bridge() {
        let error: WardenError = anyhow::anyhow!("underlying failure").into();
        assert!(matches!(error, WardenError::Other(_)));
        assert!(format!("{error}").contains("underlying failure"));
    }
}
