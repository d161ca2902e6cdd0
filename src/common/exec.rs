use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Abstracts over the async runtime used to drive background tasks (the
/// HTTP/2 connection's read/write loop).
///
/// Implement this for your own runtime if you're not using `tokio`.
///
/// ```
/// # use httpcore::Executor;
/// # use std::future::Future;
/// #[derive(Clone)]
/// struct TokioExecutor;
///
/// impl<F> Executor<F> for TokioExecutor
/// where
///     F: Future + Send + 'static,
///     F::Output: Send + 'static,
/// {
///     fn execute(&self, future: F) {
///         tokio::spawn(future);
///     }
/// }
/// ```
pub trait Executor<Fut> {
    /// Places the future into the executor to be run.
    fn execute(&self, fut: Fut);
}

pub(crate) type BoxSendFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// The default executor: spawns onto the ambient `tokio` runtime via
/// `tokio::spawn`, unless the caller supplied their own via
/// [`PoolConfig::with_executor`](crate::pool::PoolConfig::with_executor).
#[derive(Clone)]
pub(crate) enum Exec {
    Tokio,
    Executor(Arc<dyn Executor<BoxSendFuture> + Send + Sync>),
}

impl Exec {
    pub(crate) fn execute<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match *self {
            Exec::Tokio => {
                tokio::spawn(fut);
            }
            Exec::Executor(ref e) => {
                e.execute(Box::pin(fut));
            }
        }
    }
}

impl fmt::Debug for Exec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exec").finish()
    }
}

impl Default for Exec {
    fn default() -> Self {
        Exec::Tokio
    }
}
