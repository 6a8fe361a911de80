//! Result type alias for kanon

use super::errors::KanonError;

/// Result type alias for kanon operations
///
/// # Examples
///
/// ```
/// use kanon::domain::result::Result;
/// use kanon::domain::errors::KanonError;
///
/// fn example_function() -> Result<String> {
///     Ok("success".to_string())
/// }
///
/// fn failing_function() -> Result<()> {
///     Err(KanonError::TaskFailed("worker panicked".to_string()))
/// }
/// ```
pub type Result<T> = std::result::Result<T, KanonError>;
