//! Reconnecting alert subscription for one organization.
//!
//! # Lifecycle
//! ```text
//! Idle --connect()--> Connecting --open--> Open
//!   ^                    |  ^               |
//!   |  close 1000        |  |   sleep       | close != 1000, failed dial
//!   +--------------------+  +-- Reconnecting <+
//!
//! teardown() from any state --> Closed (terminal)
//! ```
//!
//! # Key invariants
//! - At most one connection task per client; [`AlertStreamClient::connect`]
//!   is a no-op while one is connecting, open, or waiting to reconnect.
//! - Only a close event schedules a reconnect. Transport errors are logged
//!   and the close that follows them is the single trigger.
//! - Once teardown begins no further dial happens: the pending reconnect
//!   timer is dropped and an open socket is closed with 1000.
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use watchtower_wire::{AlertFrame, AlertKind};

use super::backoff::ReconnectBackoff;
use super::socket::{
    ABNORMAL_CLOSURE, AlertConnector, AlertSocket, NORMAL_CLOSURE, SocketEvent, WsConnector,
    alert_stream_url,
};
use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    /// Waiting `delay` before dial number `attempt` of the current outage.
    Reconnecting { attempt: u32, delay: Duration },
    /// Torn down; terminal.
    Closed,
}

/// A recognized alert delivered to the subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertNotification {
    pub organization_id: Arc<str>,
    pub kind: AlertKind,
    pub message: String,
    pub raw: Value,
}

pub trait AlertSubscriber: Send + Sync + 'static {
    fn on_alert(&self, alert: AlertNotification);
}

impl<F> AlertSubscriber for F
where
    F: Fn(AlertNotification) + Send + Sync + 'static,
{
    fn on_alert(&self, alert: AlertNotification) {
        self(alert)
    }
}

struct Shared {
    organization_id: Arc<str>,
    url: String,
    connector: Arc<dyn AlertConnector>,
    subscriber: Arc<dyn AlertSubscriber>,
    backoff_base: Duration,
    backoff_cap: Duration,
    state: watch::Sender<ConnectionState>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        t_gauge!("watchtower_alert_stream_open")
            .set(if state == ConnectionState::Open { 1.0 } else { 0.0 });
        self.state.send_replace(state);
    }

    fn dispatch(&self, text: &str) {
        let frame = AlertFrame::parse(text);
        if !frame.kind.is_recognized() {
            debug!(org = %self.organization_id, kind = %frame.kind, "ignoring alert frame");
            return;
        }
        t_counter!("watchtower_alerts_received_total", "kind" => frame.kind.to_string())
            .increment(1);
        self.subscriber.on_alert(AlertNotification {
            organization_id: Arc::clone(&self.organization_id),
            kind: frame.kind,
            message: frame.message,
            raw: frame.raw,
        });
    }
}

/// Long-lived alert channel for one organization.
pub struct AlertStreamClient {
    shared: Arc<Shared>,
    closing: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AlertStreamClient {
    pub fn new(
        config: &ClientConfig,
        organization_id: &str,
        subscriber: impl AlertSubscriber,
    ) -> anyhow::Result<Self> {
        Self::with_connector(config, organization_id, subscriber, WsConnector)
    }

    pub fn with_connector(
        config: &ClientConfig,
        organization_id: &str,
        subscriber: impl AlertSubscriber,
        connector: impl AlertConnector + 'static,
    ) -> anyhow::Result<Self> {
        let url = alert_stream_url(&config.base_url, organization_id)?;
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (closing, _) = watch::channel(false);
        Ok(Self {
            shared: Arc::new(Shared {
                organization_id: Arc::from(organization_id.trim()),
                url,
                connector: Arc::new(connector),
                subscriber: Arc::new(subscriber),
                backoff_base: config.alert_backoff_base(),
                backoff_cap: config.alert_backoff_cap(),
                state,
            }),
            closing,
            task: Mutex::new(None),
        })
    }

    pub fn organization_id(&self) -> &str {
        &self.shared.organization_id
    }

    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Starts the connection task unless one is already live.
    ///
    /// Ignored after teardown has begun. After a server-side normal close the
    /// client is `Idle` again and this starts a fresh connection.
    pub async fn connect(&self) {
        let mut task = self.task.lock().await;
        if *self.closing.borrow() {
            debug!(org = %self.shared.organization_id, "connect after teardown ignored");
            return;
        }
        let idle = *self.shared.state.borrow() == ConnectionState::Idle;
        if let Some(handle) = task.as_ref()
            && !handle.is_finished()
            && !idle
        {
            debug!(org = %self.shared.organization_id, "alert stream already active");
            return;
        }
        let stop = self.closing.subscribe();
        self.shared.set_state(ConnectionState::Connecting);
        *task = Some(tokio::spawn(run_stream(Arc::clone(&self.shared), stop)));
    }

    /// Stops the stream for good. No reconnect fires once this is called.
    pub async fn teardown(&self) {
        self.closing.send_replace(true);
        let handle = self.task.lock().await.take();
        if let Some(handle) = handle
            && let Err(err) = handle.await
        {
            warn!(org = %self.shared.organization_id, error = %err, "alert stream task failed");
        }
        self.shared.set_state(ConnectionState::Closed);
        info!(org = %self.shared.organization_id, "alert stream torn down");
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }
}

impl Drop for AlertStreamClient {
    fn drop(&mut self) {
        // The task sees the flag, closes its socket, and exits.
        self.closing.send_replace(true);
    }
}

async fn closing(stop: &mut watch::Receiver<bool>) {
    // A dropped sender means the client is gone; treat it as teardown.
    let _ = stop.wait_for(|closing| *closing).await;
}

enum Step {
    Stop,
    Event(SocketEvent),
}

async fn run_stream(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    let org = Arc::clone(&shared.organization_id);
    let mut backoff = ReconnectBackoff::new(shared.backoff_base, shared.backoff_cap);
    let mut attempt: u32 = 0;

    loop {
        shared.set_state(ConnectionState::Connecting);
        let dialed = tokio::select! {
            biased;
            _ = closing(&mut stop) => return,
            dialed = shared.connector.connect(&shared.url) => dialed,
        };

        let code = match dialed {
            Ok(mut socket) => {
                backoff.reset();
                attempt = 0;
                shared.set_state(ConnectionState::Open);
                info!(%org, url = %shared.url, "alert stream open");
                match pump(&shared, socket.as_mut(), &mut stop).await {
                    Some(code) => code,
                    None => {
                        socket.close(NORMAL_CLOSURE, "client teardown").await;
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(%org, error = %err, "alert stream dial failed");
                ABNORMAL_CLOSURE
            }
        };

        if *stop.borrow() {
            return;
        }
        if code == NORMAL_CLOSURE {
            info!(%org, "alert stream closed normally");
            shared.set_state(ConnectionState::Idle);
            return;
        }

        attempt = attempt.saturating_add(1);
        let delay = backoff.next_delay();
        info!(%org, code, attempt, delay_ms = delay.as_millis() as u64, "alert stream reconnect scheduled");
        t_counter!("watchtower_alert_reconnects_total").increment(1);
        shared.set_state(ConnectionState::Reconnecting { attempt, delay });
        tokio::select! {
            biased;
            _ = closing(&mut stop) => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Reads until the socket closes (returns its code) or teardown begins (`None`).
async fn pump(
    shared: &Shared,
    socket: &mut dyn AlertSocket,
    stop: &mut watch::Receiver<bool>,
) -> Option<u16> {
    loop {
        let step = tokio::select! {
            biased;
            _ = closing(stop) => Step::Stop,
            event = socket.next_event() => Step::Event(event),
        };
        match step {
            Step::Stop => return None,
            Step::Event(SocketEvent::Text(text)) => shared.dispatch(&text),
            Step::Event(SocketEvent::Error(err)) => {
                warn!(org = %shared.organization_id, error = %err, "alert stream transport error");
            }
            Step::Event(SocketEvent::Closed { code, reason }) => {
                debug!(org = %shared.organization_id, code, %reason, "alert socket closed");
                return Some(code);
            }
        }
    }
}
