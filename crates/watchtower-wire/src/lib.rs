// Data model shared by the watchtower data layer.
// Query descriptors, response decoding and alert frames; no I/O lives here.
pub mod alert;
pub mod page;
pub mod query;

pub use alert::{AlertFrame, AlertKind, DEFAULT_ALERT_MESSAGE};
pub use page::{Cursor, FacetOptions, LogPageResponse, LogRecord};
pub use query::{
    DATE_FORMAT, DateRange, EventType, EventTypeFilter, FacetQuery, LogConfiguration,
    QueryDescriptor, SortKey, SortOrder,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("unknown event type {0:?}")]
    UnknownEventType(String),
    #[error("unknown sort key {0:?}")]
    UnknownSortKey(String),
    #[error("unknown sort order {0:?}")]
    UnknownSortOrder(String),
    #[error("malformed response body")]
    Malformed(#[source] serde_json::Error),
}
