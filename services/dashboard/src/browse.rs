// One pass over the behavior log the way the dashboard view drives it:
// apply filters, load facet options, then page forward while the pager allows.
use tracing::{info, warn};
use watchtower_client::{
    ApiClient, FacetCache, FacetStore, FetchError, FilterSelection, LogPage, LogQueryCache,
};

use crate::config::DashboardConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BrowseSummary {
    pub pages: usize,
    pub rows: usize,
    pub total: Option<u64>,
    pub departments: usize,
    pub failures: usize,
}

pub struct Browser {
    selection: FilterSelection,
    logs: LogQueryCache,
    facets: FacetCache,
    max_pages: usize,
}

impl Browser {
    pub fn new(api: ApiClient, config: &DashboardConfig) -> Self {
        let mut selection = FilterSelection::new(config.client.page_size);
        selection.select_department(config.department.clone());
        selection.select_team(config.team.clone());
        selection.set_event_types(config.event_types.clone());
        selection.set_date_range(config.date_range);
        Self {
            selection,
            logs: LogQueryCache::new(api.clone(), &config.client),
            facets: FacetCache::with_store(api, &config.client, FacetStore::global()),
            max_pages: config.pages,
        }
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn logs(&self) -> &LogQueryCache {
        &self.logs
    }

    pub async fn run(&mut self) -> BrowseSummary {
        let mut summary = BrowseSummary::default();

        match self.facets.resolve_now(&self.selection.facet_query()).await {
            Ok(options) => {
                info!(
                    departments = options.departments.len(),
                    teams = options.teams.len(),
                    employees = options.employees.len(),
                    "filter options loaded"
                );
                summary.departments = options.departments.len();
                self.selection.apply_options(options);
            }
            Err(err) => {
                summary.failures += 1;
                warn!(error = %err, "filter options unavailable");
            }
        }

        for _ in 0..self.max_pages {
            let descriptor = self.selection.descriptor().clone();
            let page = match self.logs.resolve_page(&descriptor).await {
                Ok(page) => page,
                Err(FetchError::Superseded) => continue,
                Err(err) => {
                    summary.failures += 1;
                    warn!(page = descriptor.page, error = %err, "showing empty page");
                    LogPage::empty(descriptor.page)
                }
            };
            summary.pages += 1;
            summary.rows += page.items.len();
            let pager = page.pager(descriptor.page_size);
            info!(
                page = page.page,
                rows = page.items.len(),
                total = ?page.total,
                next = pager.can_next,
                "behavior log page"
            );
            if !pager.can_next {
                break;
            }
            self.selection.go_to_page(page.page + 1);
        }

        summary.total = self.logs.settle_total().await;
        summary
    }
}
