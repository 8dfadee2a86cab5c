// Alert frames pushed over `/ws/alerts/{organization_id}`.
use serde_json::Value;
use std::fmt;

/// Message used when a recognized alert carries no `message` field.
pub const DEFAULT_ALERT_MESSAGE: &str =
    "Suspicious user logon detected and blocked automatically";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AlertKind {
    AnomalyUserLogon,
    AnomalyLogon,
    /// Liveness greeting sent by the server after the socket opens.
    Hello,
    /// Any other `type`, or a frame without one.
    Other(String),
}

impl AlertKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "anomaly_user_logon" => AlertKind::AnomalyUserLogon,
            "anomaly_logon" => AlertKind::AnomalyLogon,
            "hello" => AlertKind::Hello,
            other => AlertKind::Other(other.to_string()),
        }
    }

    /// Kinds forwarded to subscribers. Everything else is dropped for forward compatibility.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, AlertKind::Other(_))
    }

    pub fn is_anomaly(&self) -> bool {
        matches!(self, AlertKind::AnomalyUserLogon | AlertKind::AnomalyLogon)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::AnomalyUserLogon => f.write_str("anomaly_user_logon"),
            AlertKind::AnomalyLogon => f.write_str("anomaly_logon"),
            AlertKind::Hello => f.write_str("hello"),
            AlertKind::Other(other) => f.write_str(other),
        }
    }
}

/// One inbound text frame after best-effort JSON decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertFrame {
    pub kind: AlertKind,
    pub message: String,
    /// Decoded JSON, or the raw text as a JSON string when decoding failed.
    pub raw: Value,
}

impl AlertFrame {
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(raw) => {
                let kind = AlertKind::parse(raw.get("type").and_then(Value::as_str).unwrap_or(""));
                let message = raw
                    .get("message")
                    .and_then(Value::as_str)
                    .filter(|message| !message.is_empty())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{DEFAULT_ALERT_MESSAGE}: {raw}"));
                Self { kind, message, raw }
            }
            Err(_) => Self {
                kind: AlertKind::Other(String::new()),
                message: text.to_string(),
                raw: Value::String(text.to_string()),
            },
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.raw.get(name).and_then(Value::as_str)
    }
}
