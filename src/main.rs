use std::{net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use tokio::signal;
use tracing::{error, info};

use storefront as api;
use storefront::models::Coupon;
use storefront::services::{CouponDirectory, InMemoryCouponDirectory};

/// Reads a JSON array of coupons; accepts the legacy `discountType` shape too.
fn load_seed_coupons(path: &Path) -> anyhow::Result<Vec<Coupon>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read coupon seed file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse coupon seed file {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);
    api::handlers::health::init_start_time();

    let directory = match cfg.coupon_seed_file.as_deref() {
        Some(path) => {
            let coupons = load_seed_coupons(Path::new(path))?;
            let count = coupons.len();
            let directory = InMemoryCouponDirectory::with_coupons(coupons)
                .context("coupon seed file contains invalid coupons")?;
            info!(count, path, "coupon directory seeded");
            directory
        }
        None => {
            info!("No coupon seed file configured; starting with an empty directory");
            InMemoryCouponDirectory::new()
        }
    };
    let coupons: Arc<dyn CouponDirectory> = Arc::new(directory);

    let app = api::app(api::AppState::new(cfg.clone(), coupons));

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("storefront-api listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("storefront-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
