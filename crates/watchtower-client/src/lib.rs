//! Client-side data layer for the watchtower monitoring dashboard.
//!
//! Three independent pieces share one [`ApiClient`] and [`ClientConfig`]:
//!
//! - [`AlertStreamClient`] keeps a reconnecting WebSocket open per
//!   organization and forwards recognized anomaly alerts to a subscriber.
//! - [`LogQueryCache`] resolves paged, filtered behavior-log queries over a
//!   hybrid cursor/offset protocol and memoizes pages per configuration.
//! - [`FacetCache`] resolves filter option lists with debouncing and a TTL.
//!
//! Cache operations return [`FetchResult`] so callers can tell "no rows"
//! from "fetch failed"; [`LogPage::empty`] and `FacetOptions::default()` give
//! the degraded rendering when they choose not to.
#[macro_use]
mod macros;

pub mod alerts;
pub mod config;
pub mod error;
pub mod facets;
pub mod http;
pub mod logs;

pub use alerts::{AlertNotification, AlertStreamClient, AlertSubscriber, ConnectionState};
pub use config::ClientConfig;
pub use error::{FetchError, FetchResult};
pub use facets::{FacetCache, FacetStore, FilterChange, FilterSelection};
pub use http::{ApiClient, AuthObserver, CredentialProvider, StaticCredential};
pub use logs::{CachePolicy, LogPage, LogQueryCache, PageSource, Pager};
