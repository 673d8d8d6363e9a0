use crate::record::Record;
use tokio_util::sync::CancellationToken;

/// Failure modes of a [`Source`] call.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum SourceError {
    /// The caller's token fired before the source responded.
    #[error("query cancelled")]
    Cancelled,

    /// The source's own per-query budget elapsed.
    #[error("query timed out")]
    TimedOut,

    /// The source failed the call for this key.
    #[error("database error: connection timeout for patient {key}")]
    Unavailable { key: String },

    /// The source answered with a record that fails [`Record::validate`].
    #[error("invalid record for patient {key}: {reason}")]
    Malformed { key: String, reason: &'static str },
}

/// An upstream that resolves a request key into a [`Record`].
///
/// Implementations must honor `cancel`: once it fires, the returned future
/// should resolve promptly with [`SourceError::Cancelled`] rather than the
/// outcome it would otherwise have produced. Workers additionally race the
/// future against the token, so a source that ignores cancellation is dropped
/// rather than awaited.
///
/// # Example
///
/// ```
/// use triage::{Record, Source, SourceError};
/// use tokio_util::sync::CancellationToken;
///
/// struct Always;
///
/// impl Source for Always {
///     async fn fetch(
///         &self,
///         key: &str,
///         _cancel: &CancellationToken,
///     ) -> Result<Record, SourceError> {
///         Ok(Record::generate(key))
///     }
/// }
/// ```
pub trait Source: Send + Sync + 'static {
    fn fetch(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Record, SourceError>> + Send;
}
