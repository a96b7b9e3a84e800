//! Forwarding loop detection

use super::address::normalize;

/// Returns `true` when forwarding to `destination` would route the message
/// back into `worker_domain`.
///
/// `worker_domain` must already be in canonical (trimmed, lowercase) form.
pub fn check_loop(destination: &str, worker_domain: &str) -> bool {
    normalize(destination).domain == worker_domain
}
