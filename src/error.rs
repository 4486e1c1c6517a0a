use thiserror::Error;

/// Failure modes of the review store
///
/// Every variant except `Corrupt` and `Io` is reported before anything is
/// written, so the durable collection is unchanged; `Io` on a rewrite leaves
/// the previous durable content intact.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Required input was missing or empty
    #[error("validation failed: {0}")]
    Validation(String),

    /// Position or id does not address a stored review
    #[error("review not found: {0}")]
    NotFound(String),

    /// Sentiment could not be computed for the given text
    #[error("sentiment classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// The collection file exists but does not hold a review collection
    #[error("review collection corrupt: {0}")]
    Corrupt(String),

    /// Reading or rewriting the collection file failed
    #[error("storage error: {0}")]
    Io(String),
}
