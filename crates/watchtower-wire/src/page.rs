//! Response bodies of the behavior-log and facet endpoints.
//!
//! Decoding is lenient: a body that is valid JSON but has the wrong shape
//! degrades field by field (missing list -> empty, bad total -> unknown)
//! instead of failing the whole page. Only a body that is not JSON at all is
//! reported as [`Error::Malformed`].
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::Error;

/// Opaque continuation token for keyset pagination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cursor {
    pub after_ts: String,
    #[serde(deserialize_with = "string_or_number")]
    pub after_id: String,
}

impl Cursor {
    pub fn new(after_ts: impl Into<String>, after_id: impl Into<String>) -> Self {
        Self {
            after_ts: after_ts.into(),
            after_id: after_id.into(),
        }
    }

    pub fn params(&self) -> [(&'static str, String); 2] {
        [
            ("after_ts", self.after_ts.clone()),
            ("after_id", self.after_id.clone()),
        ]
    }

    fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let after_ts = scalar_text(object.get("after_ts")?)?;
        let after_id = scalar_text(object.get("after_id")?)?;
        if after_ts.is_empty() || after_id.is_empty() {
            return None;
        }
        Some(Self { after_ts, after_id })
    }
}

/// One behavior-log row as rendered by the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub timestamp: String,
    pub event_type: String,
    pub department: Option<String>,
    pub team: Option<String>,
    pub user: Option<String>,
    pub employee_id: Option<String>,
    pub pc_id: Option<String>,
    pub detail: Option<String>,
    pub url: Option<String>,
    pub url_host: Option<String>,
    pub from_addr: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub attachment: Option<i64>,
    pub email_size: Option<i64>,
    pub email_to_count: Option<i64>,
    pub filename: Option<String>,
    pub filename_ext: Option<String>,
    pub device_activity: Option<String>,
    pub logon_activity: Option<String>,
}

/// Decoded `GET /behavior-logs` body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogPageResponse {
    pub items: Vec<LogRecord>,
    pub total: Option<u64>,
    pub has_more: bool,
    pub next_cursor: Option<Cursor>,
}

impl LogPageResponse {
    pub fn from_slice(body: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(body).map_err(Error::Malformed)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        // Older servers deliver the rows under `data`.
        let rows = value
            .get("items")
            .and_then(Value::as_array)
            .or_else(|| value.get("data").and_then(Value::as_array));
        let items = rows
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| match LogRecord::deserialize(row) {
                        Ok(record) => Some(record),
                        Err(err) => {
                            tracing::debug!(error = %err, "skipping undecodable log row");
                            None
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            items,
            total: value.get("total").and_then(Value::as_u64),
            has_more: value
                .get("has_more")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            next_cursor: value.get("next_cursor").and_then(Cursor::from_value),
        }
    }
}

/// Available filter options for the current partial filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOptions {
    pub departments: Vec<String>,
    pub teams: Vec<String>,
    pub employees: Vec<String>,
}

impl FacetOptions {
    pub fn from_slice(body: &[u8]) -> Result<Self, Error> {
        let value: Value = serde_json::from_slice(body).map_err(Error::Malformed)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        let list = |name: &str| {
            value
                .get(name)
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(scalar_text).collect())
                .unwrap_or_default()
        };
        Self {
            departments: list("departments"),
            teams: list("teams"),
            employees: list("employees"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.departments.is_empty() && self.teams.is_empty() && self.employees.is_empty()
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(String::new()),
        other => scalar_text(&other)
            .ok_or_else(|| serde::de::Error::custom("expected string or number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_cursor_and_total() {
        let body = json!({
            "items": [{"id": 7, "timestamp": "2024-01-01T00:00:00", "event_type": "logon", "user": "ACM1"}],
            "total": 120,
            "has_more": true,
            "next_cursor": {"after_ts": "2024-01-01T00:00:00", "after_id": 7}
        });
        let page = LogPageResponse::from_value(&body);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, "7");
        assert_eq!(page.items[0].user.as_deref(), Some("ACM1"));
        assert_eq!(page.total, Some(120));
        assert!(page.has_more);
        assert_eq!(
            page.next_cursor,
            Some(Cursor::new("2024-01-01T00:00:00", "7"))
        );
    }

    #[test]
    fn falls_back_to_data_rows() {
        let page = LogPageResponse::from_value(&json!({"data": [{"id": "a"}]}));
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total, None);
        assert!(!page.has_more);
    }

    #[test]
    fn wrong_shapes_degrade_to_empty() {
        let page = LogPageResponse::from_value(&json!({
            "items": "nope",
            "total": -3,
            "has_more": "yes",
            "next_cursor": {"after_ts": "t", "after_id": ""}
        }));
        assert_eq!(page, LogPageResponse::default());
        assert!(LogPageResponse::from_slice(b"<html>").is_err());
    }

    #[test]
    fn facets_keep_scalar_entries() {
        let facets = FacetOptions::from_value(&json!({
            "departments": ["Eng", "Ops"],
            "teams": null,
            "employees": ["ACM1", 42, {"bad": true}]
        }));
        assert_eq!(facets.departments, vec!["Eng", "Ops"]);
        assert!(facets.teams.is_empty());
        assert_eq!(facets.employees, vec!["ACM1", "42"]);
        assert!(FacetOptions::default().is_empty());
    }
}
