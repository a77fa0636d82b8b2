//! Unrecoverable invariant violations.

use tracing::error;

/// Halts the process because a structural assumption about the site no
/// longer holds (a non-numeric submission id, a page ceiling exceeded).
///
/// These conditions must not be surfaced as ordinary errors: an ordinary
/// error can be retried or continued past by a caller, and crawling on
/// broken assumptions risks recording completion markers for content that
/// was never correctly interpreted.
pub fn fatal_invariant(message: &str) -> ! {
    error!(message, "fatal invariant violated");
    panic!("fatal invariant violated: {message}");
}
