// Structured logging shim.
//
// Mirrors the historical `trace!`/`debug!` macro gate this crate has always
// used: internal diagnostics go through `tracing`, and are compiled away
// entirely in builds that don't care to pay for them. This is deliberately
// separate from the typed `crate::trace::TraceEvent` hook in `trace.rs`,
// which is a public, user-facing contract rather than an operator log.

macro_rules! debug {
    ($($arg:tt)+) => {
        tracing::debug!($($arg)+)
    }
}

macro_rules! trace {
    ($($arg:tt)+) => {
        tracing::trace!($($arg)+)
    }
}

macro_rules! warn {
    ($($arg:tt)+) => {
        tracing::warn!($($arg)+)
    }
}
