// Filter state with dependent-field resets.
use watchtower_wire::{
    DateRange, EventType, EventTypeFilter, FacetOptions, FacetQuery, QueryDescriptor, SortKey,
    SortOrder,
};

/// What the consumer must do after a filter edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterChange {
    /// Re-resolve facet options for the new [`FacetQuery`].
    pub refresh_facets: bool,
}

/// Current filter descriptor plus the option lists offered for it.
///
/// Every edit returns to page 0. Selecting a department clears team and
/// employee (and their option lists); selecting a team clears employee.
/// Date and event-type edits keep selections but require new facets.
#[derive(Debug, Clone, Default)]
pub struct FilterSelection {
    descriptor: QueryDescriptor,
    options: FacetOptions,
}

impl FilterSelection {
    pub fn new(page_size: usize) -> Self {
        Self {
            descriptor: QueryDescriptor::new(page_size),
            options: FacetOptions::default(),
        }
    }

    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    pub fn facet_query(&self) -> FacetQuery {
        self.descriptor.facet_query()
    }

    pub fn options(&self) -> &FacetOptions {
        &self.options
    }

    /// Installs the options resolved for [`Self::facet_query`].
    pub fn apply_options(&mut self, options: FacetOptions) {
        self.options = options;
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.descriptor.page = page;
    }

    pub fn select_department(&mut self, department: Option<String>) -> FilterChange {
        self.descriptor.department = non_empty(department);
        self.descriptor.team = None;
        self.descriptor.employee = None;
        self.options.teams.clear();
        self.options.employees.clear();
        self.changed(true)
    }

    pub fn select_team(&mut self, team: Option<String>) -> FilterChange {
        self.descriptor.team = non_empty(team);
        self.descriptor.employee = None;
        self.options.employees.clear();
        self.changed(true)
    }

    /// Employee narrows logs only; it is not a facet input.
    pub fn select_employee(&mut self, employee: Option<String>) -> FilterChange {
        self.descriptor.employee = non_empty(employee);
        self.changed(false)
    }

    pub fn set_date_range(&mut self, range: DateRange) -> FilterChange {
        self.descriptor.date_from = range.from;
        self.descriptor.date_to = range.to;
        self.changed(true)
    }

    pub fn set_event_types(&mut self, event_types: EventTypeFilter) -> FilterChange {
        self.descriptor.event_types = event_types;
        self.changed(true)
    }

    pub fn toggle_event_type(&mut self, event_type: EventType) -> FilterChange {
        let toggled = self.descriptor.event_types.toggle(event_type);
        self.set_event_types(toggled)
    }

    /// Clicking a column: same column flips the order, a new column starts
    /// at its default order.
    pub fn sort_by(&mut self, key: SortKey) -> FilterChange {
        if self.descriptor.sort_key == key {
            self.descriptor.sort_order = self.descriptor.sort_order.reversed();
        } else {
            self.descriptor.sort_key = key;
            self.descriptor.sort_order = key.default_order();
        }
        self.changed(false)
    }

    pub fn set_sort(&mut self, key: SortKey, order: SortOrder) -> FilterChange {
        self.descriptor.sort_key = key;
        self.descriptor.sort_order = order;
        self.changed(false)
    }

    /// Back to no filters, default sort, page 0.
    pub fn reset(&mut self) -> FilterChange {
        self.descriptor = QueryDescriptor::new(self.descriptor.page_size);
        self.options = FacetOptions::default();
        self.changed(true)
    }

    fn changed(&mut self, refresh_facets: bool) -> FilterChange {
        self.descriptor.page = 0;
        FilterChange { refresh_facets }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
