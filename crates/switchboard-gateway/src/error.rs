use thiserror::Error;
use tracing::{debug, error, warn};

/// Failure classes for hub operations. None of these ever reach the socket
/// loop: every command handler swallows its result through [`report`], so a
/// malformed or hostile event cannot take down a connection or the process.
#[derive(Debug, Error)]
pub enum HubError {
    /// Bad input: blank text, unknown conversation, unknown connection.
    #[error("invalid request: {0}")]
    Invalid(&'static str),

    /// Caller is neither the resource owner nor an admin.
    #[error("not allowed: {0}")]
    Forbidden(&'static str),

    /// The persistence layer failed; the operation was aborted before any
    /// broadcast went out.
    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

/// A blocking persistence task failed to join; counts as a persistence error.
pub(crate) fn blocking_join(e: tokio::task::JoinError) -> HubError {
    HubError::Persistence(anyhow::anyhow!("blocking task failed: {}", e))
}

/// The single reporting seam for swallowed failures. Clients observe
/// "nothing happened"; operators observe a structured log line.
pub fn report(op: &'static str, err: &HubError) {
    match err {
        HubError::Invalid(reason) => debug!(op, reason, "dropped invalid command"),
        HubError::Forbidden(reason) => warn!(op, reason, "dropped unauthorized command"),
        HubError::Persistence(source) => error!(op, %source, "operation aborted"),
    }
}
