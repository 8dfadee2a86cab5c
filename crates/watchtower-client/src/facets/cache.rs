//! Debounced, TTL-cached facet option lookup.
//!
//! # Purpose
//! Resolves the departments/teams/employees available under a partial
//! filter without issuing a request per keystroke. Bursts of calls are
//! coalesced by a debounce window; settled results are cached per
//! [`FacetQuery`] for a fixed TTL.
//!
//! # Sharing
//! Entries live in a [`FacetStore`]. Each [`FacetCache`] gets its own store
//! unless one is passed in; [`FacetStore::global`] is the process-wide
//! instance. Sharing is safe because the key captures every input that
//! shapes the option lists and a newer write simply replaces an entry.
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use watchtower_wire::{FacetOptions, FacetQuery};

use crate::config::ClientConfig;
use crate::error::{FetchError, FetchResult};
use crate::http::ApiClient;

pub(crate) const FACETS_PATH: &str = "/behavior-logs/facets";

static GLOBAL_STORE: OnceLock<FacetStore> = OnceLock::new();

#[derive(Debug, Clone)]
struct CachedFacets {
    value: FacetOptions,
    fetched_at: Instant,
}

/// Facet entries keyed by [`FacetQuery`].
#[derive(Debug, Clone, Default)]
pub struct FacetStore {
    entries: Arc<DashMap<FacetQuery, CachedFacets>>,
}

impl FacetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> Self {
        GLOBAL_STORE.get_or_init(FacetStore::new).clone()
    }

    fn get_fresh(&self, query: &FacetQuery, ttl: Duration) -> Option<FacetOptions> {
        self.entries.get(query).and_then(|entry| {
            if entry.fetched_at.elapsed() < ttl {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    fn insert(&self, query: FacetQuery, value: FacetOptions) {
        self.entries.insert(
            query,
            CachedFacets {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

pub struct FacetCache {
    api: ApiClient,
    store: FacetStore,
    ttl: Duration,
    debounce: Duration,
    latest: AtomicU64,
}

impl FacetCache {
    pub fn new(api: ApiClient, config: &ClientConfig) -> Self {
        Self::with_store(api, config, FacetStore::new())
    }

    pub fn with_store(api: ApiClient, config: &ClientConfig, store: FacetStore) -> Self {
        Self {
            api,
            store,
            ttl: config.facet_ttl(),
            debounce: config.facet_debounce(),
            latest: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &FacetStore {
        &self.store
    }

    /// Debounced resolution.
    ///
    /// Every call waits out the debounce window. Only a call that is still
    /// the newest when its window ends goes on to resolve; the others return
    /// [`FetchError::Superseded`].
    pub async fn resolve_facets(&self, query: &FacetQuery) -> FetchResult<FacetOptions> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        if self.latest.load(Ordering::SeqCst) != ticket {
            debug!(ticket, "facet lookup superseded during debounce");
            return Err(FetchError::Superseded);
        }
        self.resolve_now(query).await
    }

    /// Cache-or-fetch without debouncing.
    pub async fn resolve_now(&self, query: &FacetQuery) -> FetchResult<FacetOptions> {
        if let Some(options) = self.store.get_fresh(query, self.ttl) {
            t_counter!("watchtower_facet_cache_hits_total").increment(1);
            return Ok(options);
        }

        let result = async {
            let body = self.api.get(FACETS_PATH, &query.params()).await?;
            Ok::<_, FetchError>(FacetOptions::from_slice(&body)?)
        }
        .await;

        match result {
            Ok(options) => {
                debug!(
                    departments = options.departments.len(),
                    teams = options.teams.len(),
                    employees = options.employees.len(),
                    "facets resolved"
                );
                self.store.insert(query.clone(), options.clone());
                Ok(options)
            }
            Err(err) => {
                warn!(error = %err, "facet lookup failed");
                Err(err)
            }
        }
    }
}
