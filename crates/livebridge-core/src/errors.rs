use std::error::Error;

/// Base trait for all livebridge errors
pub trait BridgeError: Error + Send + Sync + 'static {
    /// Error code for programmatic handling
    fn error_code(&self) -> &'static str;

    /// Whether this error is caused by operator input (config, paths)
    fn is_user_error(&self) -> bool {
        false
    }
}
