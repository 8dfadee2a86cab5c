//! Page cache for the behavior-log endpoint.
//!
//! # Purpose
//! Resolves a [`QueryDescriptor`] to one page of log records with as little
//! redundant traffic as possible. Pages are memoized by the full descriptor,
//! continuation cursors are learned as pages arrive, and the total row count
//! is resolved once per configuration by a separate probe.
//!
//! # Key invariants
//! - Cache, cursor table, and total all belong to one [`LogConfiguration`].
//!   A descriptor with a different configuration (or [`LogQueryCache::refresh`])
//!   clears all three and serves page 0.
//! - Page `p + 1`'s cursor is recorded only after page `p` returned one;
//!   pages without a known cursor are fetched by offset.
//! - Every fetch captures the configuration generation. A response that
//!   arrives after the generation moved is dropped as
//!   [`FetchError::Superseded`] and touches nothing.
//!
//! # Concurrency
//! State sits behind a mutex that is never held across an await, so several
//! resolutions can be in flight at once from the same task or from others.
//! The total probe runs as a spawned task and is aborted on invalidation.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use watchtower_wire::{LogConfiguration, LogPageResponse, LogRecord, QueryDescriptor};

use super::cursor::{CursorTable, PageAnchor};
use super::request::{LOGS_PATH, page_params, total_probe_params};
use crate::config::ClientConfig;
use crate::error::{FetchError, FetchResult};
use crate::http::ApiClient;

/// Whether a cache hit short-circuits the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always fetch; callers render [`LogQueryCache::peek`] while waiting.
    #[default]
    Revalidate,
    /// Serve hits without a request.
    PreferCache,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    Cache,
    Network,
}

/// One resolved page as handed to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPage {
    /// Page actually served; 0 after an invalidation.
    pub page: usize,
    pub items: Vec<LogRecord>,
    /// `None` until the total is known. Never coerce this to zero.
    pub total: Option<u64>,
    pub has_more: bool,
    pub source: PageSource,
}

impl LogPage {
    /// The degraded rendering used when a fetch fails.
    pub fn empty(page: usize) -> Self {
        Self {
            page,
            items: Vec::new(),
            total: None,
            has_more: false,
            source: PageSource::Network,
        }
    }

    pub fn pager(&self, page_size: usize) -> Pager {
        Pager::new(self.page, page_size, self.total, self.has_more)
    }
}

/// Previous/next availability for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    pub can_prev: bool,
    pub can_next: bool,
    pub last_page: Option<usize>,
}

impl Pager {
    pub fn new(page: usize, page_size: usize, total: Option<u64>, has_more: bool) -> Self {
        let page_size = page_size.max(1) as u64;
        let last_page = total.map(|total| (total.div_ceil(page_size).max(1) - 1) as usize);
        let can_next = match last_page {
            Some(last) => page < last,
            None => has_more,
        };
        Self {
            can_prev: page > 0,
            can_next,
            last_page,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedPage {
    items: Vec<LogRecord>,
    total: Option<u64>,
    has_more: bool,
}

#[derive(Debug, Clone, Copy)]
struct ResolvedTotal {
    count: u64,
    resolved_at: Instant,
}

#[derive(Default)]
struct CacheState {
    configuration: Option<LogConfiguration>,
    generation: u64,
    pages: HashMap<QueryDescriptor, CachedPage>,
    cursors: CursorTable,
    total: Option<ResolvedTotal>,
    probe: Option<JoinHandle<()>>,
}

impl CacheState {
    fn reset(&mut self) {
        self.generation += 1;
        self.pages.clear();
        self.cursors.clear();
        self.total = None;
        if let Some(probe) = self.probe.take() {
            probe.abort();
        }
    }

    /// Adopts the descriptor's configuration; returns the descriptor to serve.
    fn select(&mut self, descriptor: &QueryDescriptor) -> (QueryDescriptor, bool) {
        let configuration = descriptor.configuration();
        match &self.configuration {
            Some(current) if *current == configuration => (descriptor.clone(), false),
            Some(_) => {
                self.reset();
                self.configuration = Some(configuration);
                (descriptor.with_page(0), true)
            }
            None => {
                self.configuration = Some(configuration);
                (descriptor.clone(), false)
            }
        }
    }

    fn known_total(&self) -> Option<u64> {
        self.total.map(|total| total.count)
    }

    fn set_total(&mut self, count: u64) {
        self.total = Some(ResolvedTotal {
            count,
            resolved_at: Instant::now(),
        });
        for page in self.pages.values_mut() {
            page.total = Some(count);
        }
    }

    fn total_is_fresh(&self, ttl: Duration) -> bool {
        self.total
            .is_some_and(|total| total.resolved_at.elapsed() < ttl)
    }
}

struct Inner {
    api: ApiClient,
    policy: CachePolicy,
    total_ttl: Duration,
    state: Mutex<CacheState>,
    total_tx: watch::Sender<Option<u64>>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, CacheState> {
        // State stays consistent across every mutation, so a poisoned lock is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fetch(&self, params: &[(&str, String)]) -> FetchResult<LogPageResponse> {
        let body = self.api.get(LOGS_PATH, params).await?;
        Ok(LogPageResponse::from_slice(&body)?)
    }

    fn publish_total(&self, total: Option<u64>) {
        self.total_tx.send_replace(total);
    }

    async fn probe_total(self: Arc<Self>, descriptor: QueryDescriptor, generation: u64) {
        debug!(generation, "probing total row count");
        let result = self.fetch(&total_probe_params(&descriptor)).await;
        let mut state = self.state();
        if state.generation != generation {
            debug!(generation, current = state.generation, "dropping stale total probe");
            return;
        }
        state.probe = None;
        match result {
            Ok(response) => match response.total {
                Some(count) => {
                    state.set_total(count);
                    drop(state);
                    debug!(generation, total = count, "total resolved");
                    self.publish_total(Some(count));
                }
                None => debug!(generation, "total probe returned no count"),
            },
            Err(err) => warn!(generation, error = %err, "total probe failed"),
        }
    }
}

/// Cached, paginated view over `GET /behavior-logs`. One instance per view.
pub struct LogQueryCache {
    inner: Arc<Inner>,
}

impl LogQueryCache {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self::with_policy(api, config, CachePolicy::default())
    }

    pub fn with_policy(api: ApiClient, config: &ClientConfig, policy: CachePolicy) -> Self {
        let (total_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                api,
                policy,
                total_ttl: config.total_ttl(),
                state: Mutex::new(CacheState::default()),
                total_tx,
            }),
        }
    }

    /// Cached page for `descriptor`, without any network traffic.
    ///
    /// Returns `None` when the descriptor belongs to a configuration other
    /// than the current one, since resolving it would invalidate the cache.
    pub fn peek(&self, descriptor: &QueryDescriptor) -> Option<LogPage> {
        let state = self.inner.state();
        if state.configuration.as_ref() != Some(&descriptor.configuration()) {
            return None;
        }
        state.pages.get(descriptor).map(|cached| LogPage {
            page: descriptor.page,
            items: cached.items.clone(),
            total: cached.total.or(state.known_total()),
            has_more: cached.has_more,
            source: PageSource::Cache,
        })
    }

    /// Resolves one page, invalidating first if the configuration changed.
    pub async fn resolve_page(&self, descriptor: &QueryDescriptor) -> FetchResult<LogPage> {
        let (descriptor, generation, anchor, invalidated) = {
            let mut state = self.inner.state();
            let (descriptor, invalidated) = state.select(descriptor);
            if invalidated {
                debug!(generation = state.generation, "log configuration changed; cache cleared");
                t_counter!("watchtower_log_cache_invalidations_total").increment(1);
            }
            if self.inner.policy == CachePolicy::PreferCache
                && let Some(cached) = state.pages.get(&descriptor)
            {
                t_counter!("watchtower_log_cache_hits_total").increment(1);
                return Ok(LogPage {
                    page: descriptor.page,
                    items: cached.items.clone(),
                    total: cached.total.or(state.known_total()),
                    has_more: cached.has_more,
                    source: PageSource::Cache,
                });
            }
            let anchor = state.cursors.anchor(&descriptor);
            (descriptor, state.generation, anchor, invalidated)
        };
        if invalidated {
            self.inner.publish_total(None);
        }

        debug!(
            page = descriptor.page,
            generation,
            by_cursor = matches!(anchor, PageAnchor::Cursor(_)),
            "fetching log page"
        );
        let result = self.inner.fetch(&page_params(&descriptor, &anchor)).await;

        let mut state = self.inner.state();
        if state.generation != generation {
            debug!(
                page = descriptor.page,
                generation,
                current = state.generation,
                "dropping stale log page"
            );
            return Err(FetchError::Superseded);
        }
        let response = match result {
            Ok(response) => response,
            Err(err) => {
                warn!(page = descriptor.page, error = %err, "log page fetch failed");
                return Err(err);
            }
        };

        if let Some(cursor) = response.next_cursor.clone() {
            state.cursors.record(descriptor.page + 1, cursor);
        }
        let mut total_changed = false;
        if let Some(count) = response.total {
            total_changed = state.known_total() != Some(count);
            state.set_total(count);
        }
        let total = response.total.or(state.known_total());
        state.pages.insert(
            descriptor.clone(),
            CachedPage {
                items: response.items.clone(),
                total,
                has_more: response.has_more,
            },
        );

        if descriptor.page == 0
            && !state.total_is_fresh(self.inner.total_ttl)
            && state.probe.as_ref().is_none_or(JoinHandle::is_finished)
        {
            let inner = Arc::clone(&self.inner);
            state.probe = Some(tokio::spawn(inner.probe_total(descriptor.clone(), generation)));
        }
        drop(state);
        if total_changed {
            self.inner.publish_total(total);
        }

        Ok(LogPage {
            page: descriptor.page,
            items: response.items,
            total,
            has_more: response.has_more,
            source: PageSource::Network,
        })
    }

    /// Explicit user refresh: drops pages, cursors, and total even when the
    /// configuration is unchanged. Callers continue from page 0.
    pub fn refresh(&self) {
        let mut state = self.inner.state();
        state.reset();
        let generation = state.generation;
        drop(state);
        debug!(generation, "log cache refreshed");
        self.inner.publish_total(None);
    }

    /// Total row count for the current configuration, if resolved.
    pub fn total(&self) -> Option<u64> {
        self.inner.state().known_total()
    }

    /// Watches the total; emits `None` on invalidation and the count once known.
    pub fn subscribe_total(&self) -> watch::Receiver<Option<u64>> {
        self.inner.total_tx.subscribe()
    }

    /// Waits for an in-flight total probe, then reports the known total.
    pub async fn settle_total(&self) -> Option<u64> {
        let probe = self.inner.state().probe.take();
        if let Some(probe) = probe {
            let _ = probe.await;
        }
        self.total()
    }

    /// Number of cached pages for the current configuration.
    pub fn cached_pages(&self) -> usize {
        self.inner.state().pages.len()
    }

    /// Known continuation cursor for `page` in the current configuration.
    pub fn cursor_for(&self, page: usize) -> Option<watchtower_wire::Cursor> {
        self.inner.state().cursors.get(page).cloned()
    }
}

impl Drop for LogQueryCache {
    fn drop(&mut self) {
        if let Some(probe) = self.inner.state().probe.take() {
            probe.abort();
        }
    }
}
