// Dashboard service main entry point.
mod observability;

use anyhow::{Context, Result};
use dashboard::browse::Browser;
use dashboard::config::DashboardConfig;
use std::future::Future;
use watchtower_client::{AlertNotification, AlertStreamClient, ApiClient};

#[tokio::main]
async fn main() -> Result<()> {
    run_with_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    observability::init_observability("watchtower-dashboard");

    let config = DashboardConfig::from_env_or_yaml()?;
    tracing::info!(api = %config.client.base_url, "dashboard started");

    let api = ApiClient::builder(&config.client)
        .auth_observer(|status: u16, path: &str| {
            tracing::warn!(status, path, "session rejected; sign in again");
        })
        .build()
        .context("build api client")?;

    let alerts = match config.organization_id.as_deref() {
        Some(organization_id) => {
            let client = AlertStreamClient::new(
                &config.client,
                organization_id,
                |alert: AlertNotification| {
                    tracing::warn!(
                        org = %alert.organization_id,
                        kind = %alert.kind,
                        "{}",
                        alert.message
                    );
                },
            )
            .context("create alert stream")?;
            client.connect().await;
            Some(client)
        }
        None => {
            tracing::info!("alert stream disabled (WATCHTOWER_ORG_ID not set)");
            None
        }
    };

    let mut browser = Browser::new(api, &config);
    let summary = browser.run().await;
    tracing::info!(
        pages = summary.pages,
        rows = summary.rows,
        total = ?summary.total,
        failures = summary.failures,
        "behavior log browsed"
    );

    // Keep tailing alerts until interrupted.
    shutdown.await;
    if let Some(client) = alerts {
        client.teardown().await;
    }
    tracing::info!("dashboard stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::get};
    use serde_json::json;
    use serial_test::serial;
    use tokio::net::TcpListener;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    async fn start_server(app: Router) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app.into_make_service()).await;
        });
        Ok(format!("http://{}", addr))
    }

    #[tokio::test]
    #[serial]
    async fn run_with_shutdown_without_alerts() -> Result<()> {
        let app = Router::new()
            .route(
                "/behavior-logs",
                get(|| async { Json(json!({ "items": [], "has_more": false, "total": 0 })) }),
            )
            .route(
                "/behavior-logs/facets",
                get(|| async { Json(json!({ "departments": [], "teams": [], "employees": [] })) }),
            );
        let base_url = start_server(app).await?;
        let _g1 = EnvGuard::set("WATCHTOWER_API_URL", &base_url);
        let _g2 = EnvGuard::unset("WATCHTOWER_ORG_ID");
        let _g3 = EnvGuard::unset("WATCHTOWER_DASHBOARD_CONFIG");
        let _g4 = EnvGuard::unset("WATCHTOWER_CLIENT_CONFIG");
        run_with_shutdown(async {}).await?;
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn run_with_shutdown_survives_failing_api() -> Result<()> {
        let app = Router::new().fallback(|| async { StatusCode::INTERNAL_SERVER_ERROR });
        let base_url = start_server(app).await?;
        let _g1 = EnvGuard::set("WATCHTOWER_API_URL", &base_url);
        let _g2 = EnvGuard::set("WATCHTOWER_ORG_ID", "org-1");
        let _g3 = EnvGuard::unset("WATCHTOWER_DASHBOARD_CONFIG");
        let _g4 = EnvGuard::unset("WATCHTOWER_CLIENT_CONFIG");
        run_with_shutdown(async {}).await?;
        Ok(())
    }
}
