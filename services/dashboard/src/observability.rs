//! Logging setup for the dashboard process.
//!
//! `RUST_LOG` selects what is printed (default `info`). Metrics are recorded
//! by the client crate when built with the `telemetry` feature; exporting
//! them is left to whatever recorder the embedding process installs.
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_observability(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    init_subscriber(tracing_subscriber::registry().with(filter).with(fmt_layer));
    tracing::debug!(service = service_name, "observability initialized");
}

/// In tests several cases may race to install the global subscriber, so
/// only the first wins and the rest are ignored.
fn init_subscriber<S>(subscriber: S)
where
    S: tracing::Subscriber + Send + Sync + 'static,
{
    #[cfg(test)]
    {
        let _ = subscriber.try_init();
    }
    #[cfg(not(test))]
    {
        subscriber.init();
    }
}
