// Paginated behavior-log access.
mod cache;
mod cursor;
mod request;

pub use cache::{CachePolicy, LogPage, LogQueryCache, PageSource, Pager};
pub use cursor::{CursorTable, PageAnchor};
