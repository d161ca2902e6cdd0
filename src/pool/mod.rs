//! The connection pool: matches requests to origins, enforcing capacity and
//! keep-alive limits with a single async mutex guarding all scheduling
//! state.
//!
//! I/O (connecting, closing, sending, receiving) never happens while that
//! mutex is held: every method below drops the lock before `.await`-ing
//! anything that touches the network, then re-acquires it to record the
//! outcome. `Notify` wakes waiters blocked on capacity whenever a
//! connection is created, closes, or a response body is released.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, Notify};

use crate::common::exec::{BoxSendFuture, Exec};
use crate::common::Executor;
use crate::connection::{ConnectContext, ConnectRequestContext, Connection, ReleaseOutcome, ReleaseSignal, State};
use crate::error::Error;
use crate::net::{NetworkBackend, TlsConfig, TokioBackend};
use crate::origin::Origin;
use crate::proxy::ProxyConfig;
use crate::request::Request;
use crate::response::Response;

/// Pool-wide configuration, matching the data model's defaults exactly.
#[derive(Clone)]
pub struct PoolConfig {
    pub max_connections: usize,
    pub max_keepalive_connections: usize,
    pub keepalive_expiry: Duration,
    pub http1: bool,
    pub http2: bool,
    pub retries: u32,
    pub local_address: Option<IpAddr>,
    pub uds: Option<String>,
    pub tls_config: Option<TlsConfig>,
    pub proxy: Option<ProxyConfig>,
    pub connect_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> PoolConfig {
        PoolConfig {
            max_connections: 10,
            max_keepalive_connections: 10,
            keepalive_expiry: Duration::from_secs(5),
            http1: true,
            http2: false,
            retries: 0,
            local_address: None,
            uds: None,
            tls_config: None,
            proxy: None,
            connect_timeout: None,
        }
    }
}

/// Builder for [`PoolConfig`] plus the pool's executor, following this
/// crate's `Builder` idiom.
#[derive(Default)]
pub struct Builder {
    config: PoolConfig,
    exec: Option<Exec>,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    pub fn max_connections(mut self, n: usize) -> Builder {
        self.config.max_connections = n;
        self
    }

    pub fn max_keepalive_connections(mut self, n: usize) -> Builder {
        self.config.max_keepalive_connections = n;
        self
    }

    pub fn keepalive_expiry(mut self, d: Duration) -> Builder {
        self.config.keepalive_expiry = d;
        self
    }

    pub fn http1(mut self, enabled: bool) -> Builder {
        self.config.http1 = enabled;
        self
    }

    pub fn http2(mut self, enabled: bool) -> Builder {
        self.config.http2 = enabled;
        self
    }

    pub fn retries(mut self, n: u32) -> Builder {
        self.config.retries = n;
        self
    }

    pub fn local_address(mut self, addr: IpAddr) -> Builder {
        self.config.local_address = Some(addr);
        self
    }

    pub fn tls_config(mut self, tls: TlsConfig) -> Builder {
        self.config.tls_config = Some(tls);
        self
    }

    pub fn proxy(mut self, proxy: ProxyConfig) -> Builder {
        self.config.proxy = Some(proxy);
        self
    }

    pub fn connect_timeout(mut self, d: Duration) -> Builder {
        self.config.connect_timeout = Some(d);
        self
    }

    /// Supplies a custom executor for the HTTP/2 connection driver task,
    /// instead of spawning directly onto the ambient `tokio` runtime.
    pub fn with_executor<E>(mut self, executor: E) -> Builder
    where
        E: Executor<BoxSendFuture> + Send + Sync + 'static,
    {
        self.exec = Some(Exec::Executor(Arc::new(executor)));
        self
    }

    pub fn build(self, network_backend: Arc<dyn NetworkBackend>) -> ConnectionPool {
        ConnectionPool::new_with_exec(self.config, network_backend, self.exec.unwrap_or_default())
    }
}

type ConnArc = Arc<AsyncMutex<Connection>>;

struct Inner {
    connections: HashMap<Origin, Vec<ConnArc>>,
    total: usize,
    closed: bool,
}

/// The top-level dispatcher. Cheaply `Clone`able; clones share the same
/// underlying pool state.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<AsyncMutex<Inner>>,
    notify: Arc<Notify>,
    backend: Arc<dyn NetworkBackend>,
    tls_config: TlsConfig,
    config: Arc<PoolConfig>,
    exec: Exec,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig, network_backend: Arc<dyn NetworkBackend>) -> ConnectionPool {
        Self::new_with_exec(config, network_backend, Exec::default())
    }

    fn new_with_exec(config: PoolConfig, network_backend: Arc<dyn NetworkBackend>, exec: Exec) -> ConnectionPool {
        let tls_config = config
            .tls_config
            .clone()
            .unwrap_or_else(TlsConfig::with_webpki_roots);
        ConnectionPool {
            inner: Arc::new(AsyncMutex::new(Inner {
                connections: HashMap::new(),
                total: 0,
                closed: false,
            })),
            notify: Arc::new(Notify::new()),
            backend: network_backend,
            tls_config,
            config: Arc::new(config),
            exec,
        }
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    /// A pool talking directly to real sockets, with default configuration.
    pub fn with_defaults() -> ConnectionPool {
        ConnectionPool::new(PoolConfig::default(), Arc::new(TokioBackend::default()))
    }

    /// A point-in-time snapshot of live connection counts, for diagnostics
    /// and tests.
    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.total
    }

    pub async fn idle_count(&self) -> usize {
        let inner = self.inner.lock().await;
        let mut count = 0;
        for conns in inner.connections.values() {
            for c in conns {
                if c.lock().await.is_idle() {
                    count += 1;
                }
            }
        }
        count
    }

    /// Closes every connection. Idempotent; afterwards every `handle_request`
    /// fails with a closed-pool error.
    pub async fn close(&self) {
        let to_close: Vec<ConnArc> = {
            let mut inner = self.inner.lock().await;
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.connections.drain().flat_map(|(_, v)| v).collect()
        };
        for conn in to_close {
            conn.lock().await.close().await;
        }
        self.notify.notify_waiters();
    }

    pub async fn handle_request(&self, mut request: Request) -> Result<Response, Error> {
        let origin = request.url.origin();
        let pool_deadline = request.options.timeouts.pool;
        let started = tokio::time::Instant::now();
        let proxy_mode = self.config.proxy.as_ref().map(|p| p.mode);

        // At most one resend: an idle HTTP/1.1 connection the pool handed us
        // may have already been closed by the peer. If that race is caught
        // before any request bytes went out, retry once on a connection that
        // cannot itself be a stale reuse.
        let mut force_fresh = false;
        loop {
            let (conn, reused) = self.acquire_connection(&origin, &request, pool_deadline, started, force_fresh).await?;

            let result = {
                let mut guard = conn.lock().await;
                guard.handle_request(&mut request, proxy_mode).await
            };

            match result {
                Ok((response, signal)) => {
                    self.spawn_release(conn, signal);
                    return Ok(response);
                }
                Err(e) => {
                    conn.lock().await.mark_closing();
                    self.reap_closing().await;
                    self.notify.notify_waiters();
                    if reused && e.retry_with_fresh_connection && !force_fresh {
                        force_fresh = true;
                        continue;
                    }
                    return Err(e.error);
                }
            }
        }
    }

    /// Finds or creates a connection for `origin`. Returns whether it came
    /// from the idle pool (`true`) or was freshly dialed (`false`).
    /// `force_fresh` skips reuse entirely, for the one-shot resend after a
    /// stale-reuse race.
    async fn acquire_connection(
        &self,
        origin: &Origin,
        request: &Request,
        pool_deadline: Option<Duration>,
        started: tokio::time::Instant,
        force_fresh: bool,
    ) -> Result<(ConnArc, bool), Error> {
        loop {
            self.sweep_expired().await;

            if !force_fresh {
                if let Some(conn) = self.try_assign(origin).await {
                    return Ok((conn, true));
                }
            }

            if self.try_reserve_slot().await {
                match self.connect_with_retries(origin, request).await {
                    Ok(conn) => {
                        self.insert(origin.clone(), conn.clone()).await;
                        self.notify.notify_waiters();
                        return Ok((conn, false));
                    }
                    Err(e) => {
                        self.release_slot().await;
                        return Err(e);
                    }
                }
            }

            if self.evict_one_lru(origin).await {
                continue;
            }

            if self.is_closed().await {
                return Err(Error::closed());
            }

            let wait = self.notify.notified();
            match pool_deadline {
                Some(d) => {
                    let elapsed = started.elapsed();
                    let remaining = d.checked_sub(elapsed).unwrap_or(Duration::ZERO);
                    if tokio::time::timeout(remaining, wait).await.is_err() {
                        return Err(Error::pool_timeout());
                    }
                }
                None => wait.await,
            }
        }
    }

    fn spawn_release(&self, conn: ConnArc, signal: ReleaseSignal) {
        let pool = self.clone();
        self.exec.execute(async move {
            let outcome: Option<ReleaseOutcome> = match signal {
                ReleaseSignal::Http1(rx) => rx.await.ok().map(ReleaseOutcome::from),
                ReleaseSignal::Http2(rx) => rx.await.ok().map(|_| ReleaseOutcome::Http2StreamDone),
            };
            if let Some(outcome) = outcome {
                conn.lock().await.on_released(outcome);
            }
            pool.reap_closing().await;
            pool.notify.notify_waiters();
        });
    }

    async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    async fn sweep_expired(&self) {
        let expiry = self.config.keepalive_expiry;
        let candidates: Vec<ConnArc> = {
            let inner = self.inner.lock().await;
            inner.connections.values().flatten().cloned().collect()
        };
        for c in &candidates {
            let mut guard = c.lock().await;
            if guard.has_expired(expiry) {
                guard.mark_closing();
            }
        }
        self.enforce_keepalive_limit(&candidates).await;
        self.reap_closing().await;
    }

    /// Marks the oldest excess idle connections `Closing` once more idle
    /// connections exist than `max_keepalive_connections` allows.
    async fn enforce_keepalive_limit(&self, candidates: &[ConnArc]) {
        let limit = self.config.max_keepalive_connections;
        let mut idle = Vec::new();
        for c in candidates {
            let guard = c.lock().await;
            if let Some(since) = guard.idle_since() {
                idle.push((c.clone(), since));
            }
        }
        if idle.len() <= limit {
            return;
        }
        idle.sort_by_key(|(_, since)| *since);
        for (c, _) in idle.into_iter().take(idle.len().saturating_sub(limit)) {
            c.lock().await.mark_closing();
        }
    }

    /// Actually closes and removes connections left `Closing` with nothing
    /// still in flight, freeing their pool slot.
    async fn reap_closing(&self) {
        let victims: Vec<ConnArc> = {
            let mut inner = self.inner.lock().await;
            let mut victims = Vec::new();
            for conns in inner.connections.values_mut() {
                let mut i = 0;
                while i < conns.len() {
                    let removable = match conns[i].try_lock() {
                        Ok(guard) => matches!(guard.state(), State::Closing) && guard.in_flight() == 0,
                        Err(_) => false,
                    };
                    if removable {
                        victims.push(conns.remove(i));
                    } else {
                        i += 1;
                    }
                }
            }
            inner.total = inner.total.saturating_sub(victims.len());
            victims
        };
        if victims.is_empty() {
            return;
        }
        for v in victims {
            v.lock().await.close().await;
        }
        self.notify.notify_waiters();
    }

    async fn try_assign(&self, origin: &Origin) -> Option<ConnArc> {
        let inner = self.inner.lock().await;
        let candidates = inner.connections.get(origin)?.clone();
        drop(inner);

        let mut best: Option<(ConnArc, usize)> = None;
        for c in candidates {
            let Ok(guard) = c.try_lock() else { continue };
            if guard.can_handle_request(origin) && guard.is_available() {
                let in_flight = guard.in_flight();
                drop(guard);
                if best.as_ref().map(|(_, n)| in_flight > *n).unwrap_or(true) {
                    best = Some((c, in_flight));
                }
            }
        }
        best.map(|(c, _)| c)
    }

    async fn try_reserve_slot(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return false;
        }
        if inner.total < self.config.max_connections {
            inner.total += 1;
            true
        } else {
            false
        }
    }

    async fn release_slot(&self) {
        let mut inner = self.inner.lock().await;
        inner.total = inner.total.saturating_sub(1);
        self.notify.notify_waiters();
    }

    async fn insert(&self, origin: Origin, conn: ConnArc) {
        let mut inner = self.inner.lock().await;
        inner.connections.entry(origin).or_default().push(conn);
    }

    /// Evicts the oldest idle connection whose origin does not match
    /// `origin`, freeing a pool slot. Returns whether one was evicted.
    async fn evict_one_lru(&self, origin: &Origin) -> bool {
        let victim = {
            let inner = self.inner.lock().await;
            let mut victim: Option<(ConnArc, tokio::time::Instant)> = None;
            for (o, conns) in inner.connections.iter() {
                if o == origin {
                    continue;
                }
                for c in conns {
                    if let Ok(guard) = c.try_lock() {
                        if let Some(since) = guard.idle_since() {
                            if victim.as_ref().map(|(_, t)| since < *t).unwrap_or(true) {
                                victim = Some((c.clone(), since));
                            }
                        }
                    }
                }
            }
            victim.map(|(c, _)| c)
        };
        let Some(victim) = victim else { return false };

        {
            let mut inner = self.inner.lock().await;
            for conns in inner.connections.values_mut() {
                conns.retain(|c| !Arc::ptr_eq(c, &victim));
            }
            inner.total = inner.total.saturating_sub(1);
        }
        victim.lock().await.close().await;
        self.notify.notify_waiters();
        true
    }

    async fn connect_with_retries(&self, origin: &Origin, request: &Request) -> Result<ConnArc, Error> {
        let mut attempts_left = self.config.retries + 1;
        let req_cx = ConnectRequestContext::from_request(request);
        loop {
            let cx = ConnectContext {
                backend: &*self.backend,
                tls_config: &self.tls_config,
                proxy: self.config.proxy.as_ref(),
                http1_enabled: self.config.http1,
                http2_enabled: self.config.http2,
                connect_timeout: self.config.connect_timeout,
                local_address: self.config.local_address,
                exec: self.exec.clone(),
            };
            match Connection::connect(origin.clone(), &cx, &req_cx).await {
                Ok(conn) => return Ok(Arc::new(AsyncMutex::new(conn))),
                Err(e) if e.is_connect() && attempts_left > 1 => {
                    attempts_left -= 1;
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
