//! Constants for the transport module (timeouts, retries, politeness delays).

use std::time::Duration;

/// Total HTTP request timeout. Expiry is a transport failure, subject to retry.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

/// Default number of attempts for a GET before giving up.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default fixed sleep between retry attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Registered-users-online figure above which the long cooldown applies.
/// The site asks that bots stay away while more than 10k registered users
/// are online.
pub const HIGH_USER_THRESHOLD: u64 = 10_000;

/// Cooldown applied when the site reports heavy registered-user load.
pub const HIGH_USER_DELAY: Duration = Duration::from_secs(5 * 60);

/// Small delay applied after every delayed fetch, even under light load.
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);
