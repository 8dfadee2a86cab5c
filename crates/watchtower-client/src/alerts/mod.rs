// Live anomaly alerts over a reconnecting WebSocket.
mod backoff;
mod socket;
mod stream;

pub use backoff::ReconnectBackoff;
pub use socket::{
    ABNORMAL_CLOSURE, AlertConnector, AlertSocket, NO_STATUS, NORMAL_CLOSURE, SocketEvent,
    WsConnector, alert_stream_url,
};
pub use stream::{AlertNotification, AlertStreamClient, AlertSubscriber, ConnectionState};
