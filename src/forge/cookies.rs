//! Anti-bot cookie handling.
//!
//! The cloud host sits behind an intermediary that rejects API calls from
//! clients without its session cookies. A single GET against the main site
//! hands those cookies out; [`WarmupGate`] makes sure that GET happens at most
//! once per client, and [`ResettableJar`] lets the client throw the cookies
//! away when the intermediary starts blocking again.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tokio::sync::Mutex;
use url::Url;

/// Cookie store whose contents can be swapped out atomically.
///
/// The transport only ever talks to this wrapper, so a reset takes effect for
/// the next request without rebuilding the HTTP client.
#[derive(Debug, Default)]
pub struct ResettableJar {
    inner: RwLock<Arc<Jar>>,
}

impl ResettableJar {
    pub fn reset(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Arc::new(Jar::default());
    }

    fn current(&self) -> Arc<Jar> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CookieStore for ResettableJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        self.current().set_cookies(cookie_headers, url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.current().cookies(url)
    }
}

/// Double-checked one-shot gate around the warmup request.
#[derive(Debug, Default)]
pub struct WarmupGate {
    ready: AtomicBool,
    lock: Mutex<()>,
}

impl WarmupGate {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Runs `warmup` unless the gate is already open. Callers arriving while a
    /// warmup is in flight wait for it and then return without running their own.
    ///
    /// The gate opens only when `warmup` returns `true`; a `false` leaves it
    /// armed so the next caller tries again. Returns whether this call opened it.
    pub async fn ensure<F, Fut>(&self, warmup: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        if self.is_ready() {
            return false;
        }

        let _guard = self.lock.lock().await;
        if self.is_ready() {
            return false;
        }

        if !warmup().await {
            return false;
        }
        self.ready.store(true, Ordering::Release);
        true
    }

    /// Drops all cookies and re-arms the gate.
    pub async fn reset(&self, jar: &ResettableJar) {
        let _guard = self.lock.lock().await;
        jar.reset();
        self.ready.store(false, Ordering::Release);
    }
}
