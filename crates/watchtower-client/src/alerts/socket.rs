// Duplex alert channel seam plus its WebSocket implementation.
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

/// Orderly shutdown; the only close code that does not schedule a reconnect.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame without a status code.
pub const NO_STATUS: u16 = 1005;
/// Connection lost without a close handshake (also used for failed dials).
pub const ABNORMAL_CLOSURE: u16 = 1006;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Text(String),
    /// Transport error. A `Closed` event always follows.
    Error(String),
    Closed { code: u16, reason: String },
}

/// One open alert connection.
#[async_trait]
pub trait AlertSocket: Send {
    /// Next inbound event. Must not be called again after `Closed`.
    async fn next_event(&mut self) -> SocketEvent;
    async fn close(&mut self, code: u16, reason: &str);
}

/// Opens alert connections; swapped out in tests.
#[async_trait]
pub trait AlertConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn AlertSocket>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl AlertConnector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn AlertSocket>> {
        let (stream, response) = connect_async(url)
            .await
            .with_context(|| format!("open alert socket {url}"))?;
        debug!(url, status = response.status().as_u16(), "alert socket handshake done");
        Ok(Box::new(WsSocket {
            stream,
            errored: false,
        }))
    }
}

struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    errored: bool,
}

#[async_trait]
impl AlertSocket for WsSocket {
    async fn next_event(&mut self) -> SocketEvent {
        if self.errored {
            return SocketEvent::Closed {
                code: ABNORMAL_CLOSURE,
                reason: String::new(),
            };
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Text(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|frame| (u16::from(frame.code), frame.reason.as_str().to_owned()))
                        .unwrap_or((NO_STATUS, String::new()));
                    return SocketEvent::Closed { code, reason };
                }
                // Pings are answered by the protocol layer; binary frames carry no alerts.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    self.errored = true;
                    return SocketEvent::Error(err.to_string());
                }
                None => {
                    return SocketEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: String::new(),
                    };
                }
            }
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        if let Err(err) = self.stream.close(Some(frame)).await {
            debug!(error = %err, "alert socket close failed");
        }
    }
}

/// `<base>/ws/alerts/{organization_id}` with the scheme switched to ws/wss.
pub fn alert_stream_url(base_url: &str, organization_id: &str) -> Result<String> {
    let base = base_url.trim().trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        bail!("unsupported api url scheme: {base_url}");
    };
    let organization_id = organization_id.trim();
    if organization_id.is_empty() {
        bail!("organization id is required for the alert stream");
    }
    Ok(format!("{ws_base}/ws/alerts/{organization_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_switches_scheme() {
        assert_eq!(
            alert_stream_url("http://127.0.0.1:8000/", "org-7").expect("url"),
            "ws://127.0.0.1:8000/ws/alerts/org-7"
        );
        assert_eq!(
            alert_stream_url("https://api.example.com/v1", "42").expect("url"),
            "wss://api.example.com/v1/ws/alerts/42"
        );
    }

    #[test]
    fn stream_url_rejects_bad_input() {
        assert!(alert_stream_url("ftp://host", "1").is_err());
        assert!(alert_stream_url("http://host", "  ").is_err());
    }
}
