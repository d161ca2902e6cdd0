use tokio::time::Instant;

/// Wall-clock source for keep-alive expiry bookkeeping.
///
/// Backed by `tokio::time::Instant` rather than `std::time::Instant` so
/// keepalive-expiry tests can fast-forward it with
/// `tokio::time::pause`/`advance` instead of sleeping in real time.
pub(crate) fn now() -> Instant {
    Instant::now()
}
