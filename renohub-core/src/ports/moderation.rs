//! Moderation port - third-party text scoring

use crate::domain::result::Result;

/// Scores text for profanity
///
/// Implementations call an external API. Rate limiting and thresholding
/// belong to `ModerationService`, not to the client.
pub trait ModerationClient: Send + Sync {
    /// Client name for logs (e.g. "perspective")
    fn name(&self) -> &str;

    /// Offline stand-ins answer locally and need no call spacing
    fn is_offline(&self) -> bool {
        false
    }

    /// Probability-like score in `0.0..=1.0`; higher means more profane
    fn score(&self, text: &str) -> Result<f64>;
}
