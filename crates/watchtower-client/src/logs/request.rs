// Query-string construction for `GET /behavior-logs`.
use watchtower_wire::QueryDescriptor;

use super::cursor::PageAnchor;

pub(crate) const LOGS_PATH: &str = "/behavior-logs";

/// Fetch of one page: filters, sort, page size, and the page anchor.
pub(crate) fn page_params(
    descriptor: &QueryDescriptor,
    anchor: &PageAnchor,
) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", descriptor.page_size.to_string())];
    params.extend(descriptor.filter_params());
    params.extend(anchor.params());
    params
}

/// Minimal request that only asks the server to count the configuration's rows.
pub(crate) fn total_probe_params(descriptor: &QueryDescriptor) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", "1".to_string())];
    params.extend(descriptor.filter_params());
    params.push(("include_total", "1".to_string()));
    params.push(("offset", "0".to_string()));
    params
}
