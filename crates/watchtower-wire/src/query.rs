//! Query descriptors for the behavior-log and facet endpoints.
//!
//! # Purpose
//! A [`QueryDescriptor`] fully determines one page of the behavior log. It is
//! an immutable value: equality is field-wise (the event-type selection is a
//! set, so selection order never matters) and the whole descriptor is the page
//! cache key.
//!
//! # Key invariants
//! - [`LogConfiguration`] is the descriptor minus `page`. Any change to it
//!   invalidates cached pages and continuation cursors.
//! - [`FacetQuery`] keeps only the fields that narrow facet option sets
//!   (department, team, date range, event types). Employee and sort are
//!   excluded on purpose.
//! - [`EventTypeFilter::Only`] never holds an empty set or every known type;
//!   both collapse to [`EventTypeFilter::All`].
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Wire format of every date parameter.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Logon,
    Email,
    Http,
    Device,
    File,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::Logon,
        EventType::Email,
        EventType::Http,
        EventType::Device,
        EventType::File,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Logon => "logon",
            EventType::Email => "email",
            EventType::Http => "http",
            EventType::Device => "device",
            EventType::File => "file",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "logon" => Ok(EventType::Logon),
            "email" => Ok(EventType::Email),
            "http" => Ok(EventType::Http),
            "device" => Ok(EventType::Device),
            "file" => Ok(EventType::File),
            other => Err(Error::UnknownEventType(other.to_string())),
        }
    }
}

/// Event-type restriction of a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum EventTypeFilter {
    /// No server-side restriction.
    #[default]
    All,
    Only(BTreeSet<EventType>),
}

impl EventTypeFilter {
    /// Builds a filter from a selection, collapsing "none" and "every type" to `All`.
    pub fn from_types<I>(types: I) -> Self
    where
        I: IntoIterator<Item = EventType>,
    {
        let selected: BTreeSet<EventType> = types.into_iter().collect();
        if selected.is_empty() || selected.len() == EventType::ALL.len() {
            EventTypeFilter::All
        } else {
            EventTypeFilter::Only(selected)
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, EventTypeFilter::All)
    }

    pub fn contains(&self, event_type: EventType) -> bool {
        match self {
            EventTypeFilter::All => true,
            EventTypeFilter::Only(types) => types.contains(&event_type),
        }
    }

    /// Flips one type in or out of the selection.
    ///
    /// Toggling a type while `All` is active starts a fresh single-type selection.
    pub fn toggle(&self, event_type: EventType) -> Self {
        let mut selected = match self {
            EventTypeFilter::All => BTreeSet::new(),
            EventTypeFilter::Only(types) => types.clone(),
        };
        if !selected.remove(&event_type) {
            selected.insert(event_type);
        }
        Self::from_types(selected)
    }

    /// Comma-joined wire value, `None` when no restriction applies.
    pub fn wire_value(&self) -> Option<String> {
        match self {
            EventTypeFilter::All => None,
            EventTypeFilter::Only(types) => Some(
                types
                    .iter()
                    .map(EventType::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
        }
    }

    /// Parses a comma-joined list; `"all"` anywhere means no restriction.
    pub fn parse_list(value: &str) -> Result<Self, Error> {
        let mut types = Vec::new();
        for part in value.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            if part == "all" {
                return Ok(EventTypeFilter::All);
            }
            types.push(part.parse::<EventType>()?);
        }
        Ok(Self::from_types(types))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Time,
    Department,
    Team,
    User,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Time => "time",
            SortKey::Department => "department",
            SortKey::Team => "team",
            SortKey::User => "user",
        }
    }

    /// Order applied when the user switches to this column.
    pub fn default_order(&self) -> SortOrder {
        match self {
            SortKey::Time => SortOrder::Desc,
            SortKey::Department | SortKey::Team | SortKey::User => SortOrder::Asc,
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "time" => Ok(SortKey::Time),
            "department" => Ok(SortKey::Department),
            "team" => Ok(SortKey::Team),
            "user" => Ok(SortKey::User),
            other => Err(Error::UnknownSortKey(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortOrder::Asc => SortOrder::Desc,
            SortOrder::Desc => SortOrder::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::UnknownSortOrder(other.to_string())),
        }
    }
}

/// Inclusive calendar range; either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self { from, to }
    }

    /// Parses compact digit entry: `YYYYMMDD` for the start, the next 8 digits
    /// for the end. Non-digits are skipped; incomplete or invalid halves stay open.
    pub fn from_digits(input: &str) -> Self {
        let digits: String = input
            .chars()
            .filter(char::is_ascii_digit)
            .take(16)
            .collect();
        let parse = |chunk: &str| {
            if chunk.len() == 8 {
                NaiveDate::parse_from_str(chunk, "%Y%m%d").ok()
            } else {
                None
            }
        };
        let (first, second) = digits.split_at(digits.len().min(8));
        Self {
            from: parse(first),
            to: parse(second),
        }
    }
}

/// Full description of one behavior-log page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryDescriptor {
    pub department: Option<String>,
    pub team: Option<String>,
    pub employee: Option<String>,
    pub event_types: EventTypeFilter,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page: usize,
    pub page_size: usize,
}

impl QueryDescriptor {
    pub fn new(page_size: usize) -> Self {
        Self {
            department: None,
            team: None,
            employee: None,
            event_types: EventTypeFilter::All,
            sort_key: SortKey::Time,
            sort_order: SortKey::Time.default_order(),
            date_from: None,
            date_to: None,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    pub fn with_page(&self, page: usize) -> Self {
        Self {
            page,
            ..self.clone()
        }
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_from = range.from;
        self.date_to = range.to;
        self
    }

    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.date_from, self.date_to)
    }

    /// Row offset of this page for offset-based pagination.
    pub fn offset(&self) -> u64 {
        (self.page as u64).saturating_mul(self.page_size as u64)
    }

    pub fn configuration(&self) -> LogConfiguration {
        LogConfiguration {
            department: self.department.clone(),
            team: self.team.clone(),
            employee: self.employee.clone(),
            event_types: self.event_types.clone(),
            sort_key: self.sort_key,
            sort_order: self.sort_order,
            date_from: self.date_from,
            date_to: self.date_to,
            page_size: self.page_size,
        }
    }

    pub fn facet_query(&self) -> FacetQuery {
        FacetQuery {
            department: self.department.clone(),
            team: self.team.clone(),
            date_from: self.date_from,
            date_to: self.date_to,
            event_types: self.event_types.clone(),
        }
    }

    /// Filter and sort parameters shared by page fetches and total probes.
    ///
    /// Pagination (`limit`, `offset`, cursor) and `include_total` are added by the caller.
    pub fn filter_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(8);
        push_text(&mut params, "department", self.department.as_deref());
        push_text(&mut params, "team", self.team.as_deref());
        push_text(&mut params, "user", self.employee.as_deref());
        params.push(("sort_by", self.sort_key.as_str().to_string()));
        params.push(("sort_order", self.sort_order.as_str().to_string()));
        if let Some(types) = self.event_types.wire_value() {
            params.push(("event_types", types));
        }
        push_date(&mut params, "date_from", self.date_from);
        push_date(&mut params, "date_to", self.date_to);
        params
    }
}

impl Default for QueryDescriptor {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Everything in a [`QueryDescriptor`] except the page index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogConfiguration {
    pub department: Option<String>,
    pub team: Option<String>,
    pub employee: Option<String>,
    pub event_types: EventTypeFilter,
    pub sort_key: SortKey,
    pub sort_order: SortOrder,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub page_size: usize,
}

/// Facet narrowing inputs; also the facet cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FacetQuery {
    pub department: Option<String>,
    pub team: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub event_types: EventTypeFilter,
}

impl FacetQuery {
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(5);
        push_text(&mut params, "department", self.department.as_deref());
        push_text(&mut params, "team", self.team.as_deref());
        push_date(&mut params, "date_from", self.date_from);
        push_date(&mut params, "date_to", self.date_to);
        if let Some(types) = self.event_types.wire_value() {
            params.push(("event_types", types));
        }
        params
    }
}

fn push_text(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<&str>) {
    if let Some(value) = value
        && !value.is_empty()
    {
        params.push((name, value.to_string()));
    }
}

fn push_date(params: &mut Vec<(&'static str, String)>, name: &'static str, value: Option<NaiveDate>) {
    if let Some(date) = value {
        params.push((name, date.format(DATE_FORMAT).to_string()));
    }
}
