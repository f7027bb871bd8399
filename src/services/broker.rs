//! Lookup broker.
//!
//! One resolution algorithm, two call shapes:
//!
//! - [`LookupBroker::lookup_sync`] blocks the calling thread until the single
//!   result is ready.
//! - [`LookupBroker::lookup_async`] returns immediately and hands the result
//!   to a callback, exactly once, from a runtime worker thread.
//!
//! [`LookupBroker::lookup`] is the same resolution as an awaitable future.
//!
//! Resolution: cache check → fetch → parse → cache write. A fetch runs only
//! on a miss or a stale entry. Concurrent misses for one location share a
//! single in-flight fetch, and every waiter receives the same outcome.
//! Failures and empty results never touch the cache.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::oneshot;

use crate::config::BrokerConfig;
use crate::errors::{BrokerError, FetchError, LookupError};
use crate::helpers::{Clock, SystemClock};
use crate::models::{LookupOutcome, LookupResult, WeatherRecord};
use crate::services::cache::ResultCache;
use crate::services::parser::parse_weather;
use crate::services::provider::{encode_location, HttpWeatherProvider, WeatherProvider};

type Flight = Shared<BoxFuture<'static, LookupResult>>;

/// Façade over the result cache and the weather provider.
///
/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct LookupBroker {
    inner: Arc<Inner>,
    runtime: Handle,
}

struct Inner {
    cache: ResultCache,
    provider: Arc<dyn WeatherProvider>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    fetch_timeout: Duration,
    in_flight: Mutex<HashMap<String, Flight>>,
}

enum Step {
    Hit(Arc<WeatherRecord>),
    Wait(Flight),
}

impl LookupBroker {
    /// `runtime` executes background lookups and must outlive the broker.
    ///
    /// It must be a multi-thread runtime: a current-thread runtime only polls
    /// tasks while its owner blocks on it, so background lookups would never
    /// run. Such a handle is rejected with [`BrokerError::CurrentThreadRuntime`].
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        config: &BrokerConfig,
        runtime: Handle,
    ) -> Result<Self, BrokerError> {
        Self::with_clock(provider, config, runtime, Arc::new(SystemClock))
    }

    pub fn with_clock(
        provider: Arc<dyn WeatherProvider>,
        config: &BrokerConfig,
        runtime: Handle,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BrokerError> {
        if runtime.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(BrokerError::CurrentThreadRuntime);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                cache: ResultCache::new(),
                provider,
                clock,
                ttl: config.cache_ttl,
                fetch_timeout: config.fetch_timeout,
                in_flight: Mutex::new(HashMap::new()),
            }),
            runtime,
        })
    }

    /// Broker backed by [`HttpWeatherProvider`] built from `config`.
    pub fn from_config(config: &BrokerConfig, runtime: Handle) -> Result<Self, BrokerError> {
        let provider = HttpWeatherProvider::new(config)?;
        Self::new(Arc::new(provider), config, runtime)
    }

    /// Resolve `location` on the caller's task.
    pub async fn lookup(&self, location: &str) -> LookupResult {
        Inner::resolve(&self.inner, location).await
    }

    /// Resolve `location` on the broker's runtime and block until done.
    ///
    /// Must not be called from a thread inside a tokio runtime context; that
    /// returns [`LookupError::BlockingInRuntime`] without looking anything up.
    /// Await [`LookupBroker::lookup`] there instead.
    pub fn lookup_sync(&self, location: &str) -> LookupResult {
        if Handle::try_current().is_ok() {
            tracing::error!(
                "Blocking lookup for '{}' attempted inside an async runtime",
                location
            );
            return Err(LookupError::BlockingInRuntime);
        }

        let (tx, rx) = oneshot::channel();
        self.spawn_resolve(location, move |result| {
            let _ = tx.send(result);
        });
        rx.blocking_recv().unwrap_or_else(|_| {
            Err(FetchError::Transport("lookup ended without a result".to_string()).into())
        })
    }

    /// Resolve `location` in the background and pass the result to `callback`.
    ///
    /// The callback runs exactly once, on a runtime thread rather than the
    /// caller's. There is no cancellation.
    pub fn lookup_async<F>(&self, location: &str, callback: F)
    where
        F: FnOnce(LookupResult) + Send + 'static,
    {
        self.spawn_resolve(location, callback);
    }

    fn spawn_resolve<F>(&self, location: &str, callback: F)
    where
        F: FnOnce(LookupResult) + Send + 'static,
    {
        let inner = self.inner.clone();
        let location = location.to_string();
        let delivery = Delivery::new(callback);

        self.runtime.spawn(async move {
            let result = Inner::resolve(&inner, &location).await;
            match &result {
                Ok(LookupOutcome::Found(_)) => {
                    tracing::debug!("Lookup for '{}' delivered a record", location)
                }
                Ok(LookupOutcome::NotFound) => {
                    tracing::debug!("Lookup for '{}' found no data", location)
                }
                Err(e) => tracing::warn!("Weather service is not available for '{}': {}", location, e),
            }
            delivery.deliver(result);
        });
    }
}

impl Inner {
    async fn resolve(inner: &Arc<Inner>, location: &str) -> LookupResult {
        let now = inner.clock.now();

        if let Some(record) = inner.fresh_record(location, now) {
            tracing::debug!("Cache hit for '{}'", location);
            return Ok(LookupOutcome::Found(record));
        }

        match inner.join_or_start(location, now) {
            Step::Hit(record) => Ok(LookupOutcome::Found(record)),
            Step::Wait(flight) => flight.await,
        }
    }

    /// The cached record if still fresh; drops entries stamped in the future.
    fn fresh_record(&self, location: &str, now: DateTime<Utc>) -> Option<Arc<WeatherRecord>> {
        let entry = self.cache.get(location)?;
        if ResultCache::is_fresh(&entry, now, self.ttl) {
            return Some(entry.record);
        }
        if entry.fetched_at > now {
            // Written by a fetch that finished after `now` was sampled.
            let current = self.clock.now();
            if ResultCache::is_fresh(&entry, current, self.ttl) {
                return Some(entry.record);
            }
            if entry.fetched_at > current {
                tracing::warn!(
                    "Cache entry for '{}' is stamped {} but clock reads {}; refetching",
                    location,
                    entry.fetched_at,
                    current
                );
                self.cache.invalidate(location);
            }
        }
        None
    }

    fn join_or_start(self: &Arc<Self>, location: &str, now: DateTime<Utc>) -> Step {
        let mut in_flight = self.in_flight.lock();

        if let Some(flight) = in_flight.get(location) {
            tracing::debug!("Joining in-flight fetch for '{}'", location);
            return Step::Wait(flight.clone());
        }

        // A flight may have completed between the first cache check and
        // taking the lock; flights write the cache before deregistering.
        if let Some(entry) = self.cache.get(location) {
            if ResultCache::is_fresh(&entry, self.clock.now(), self.ttl) {
                return Step::Hit(entry.record);
            }
        }

        let flight = Self::fetch_and_store(self.clone(), location.to_string(), now)
            .boxed()
            .shared();
        in_flight.insert(location.to_string(), flight.clone());
        Step::Wait(flight)
    }

    async fn fetch_and_store(
        inner: Arc<Inner>,
        location: String,
        now: DateTime<Utc>,
    ) -> LookupResult {
        let result = inner.fetch_and_parse(&location, now).await;
        inner.in_flight.lock().remove(&location);
        result
    }

    async fn fetch_and_parse(
        &self,
        location: &str,
        now: DateTime<Utc>,
    ) -> LookupResult {
        let encoded = encode_location(location);
        tracing::info!("Querying weather provider for '{}'", location);

        let fetch = AssertUnwindSafe(async { self.provider.fetch(&encoded).await }).catch_unwind();
        let raw = match tokio::time::timeout(self.fetch_timeout, fetch).await {
            Ok(Ok(Ok(raw))) => raw,
            Ok(Ok(Err(e))) => {
                tracing::warn!("Fetch for '{}' failed: {}", location, e);
                return Err(e.into());
            }
            Ok(Err(_panic)) => {
                tracing::error!("Weather provider panicked while fetching '{}'", location);
                return Err(FetchError::Transport("weather provider panicked".to_string()).into());
            }
            Err(_elapsed) => {
                tracing::warn!(
                    "Fetch for '{}' timed out after {:?}",
                    location,
                    self.fetch_timeout
                );
                return Err(FetchError::Timeout(self.fetch_timeout).into());
            }
        };

        let records = parse_weather(raw.as_slice()).map_err(|e| {
            tracing::warn!("Payload for '{}' could not be parsed: {}", location, e);
            LookupError::from(e)
        })?;

        tracing::info!("{} results for location: {}", records.len(), location);

        let Some(first) = records.into_iter().next() else {
            return Ok(LookupOutcome::NotFound);
        };

        let record = Arc::new(first);
        self.cache.put(location, record.clone(), now);
        Ok(LookupOutcome::Found(record))
    }
}

/// Owns a lookup callback and guarantees it runs exactly once.
///
/// If the task carrying it is dropped before delivering (runtime shutdown,
/// panic), the callback receives a transport error instead.
struct Delivery<F: FnOnce(LookupResult)> {
    callback: Option<F>,
}

impl<F: FnOnce(LookupResult)> Delivery<F> {
    fn new(callback: F) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    fn deliver(mut self, result: LookupResult) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }
}

impl<F: FnOnce(LookupResult)> Drop for Delivery<F> {
    fn drop(&mut self) {
        if let Some(callback) = self.callback.take() {
            tracing::warn!("Lookup abandoned before completion");
            callback(Err(
                FetchError::Transport("lookup abandoned before completion".to_string()).into(),
            ));
        }
    }
}
