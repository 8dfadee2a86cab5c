// Filter option lookup and the filter state it feeds.
mod cache;
mod selection;

pub use cache::{FacetCache, FacetStore};
pub use selection::{FilterChange, FilterSelection};
