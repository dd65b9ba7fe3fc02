mod api;
mod middleware;
mod notify;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::{
    api::{build_app, AppState},
    middleware::AuthState,
    notify::LogMailer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(tienda_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = tienda_db::PoolConfig::from_app_config(&config);
    let pool = tienda_db::connect_pool(&config.database_url, pool_config).await?;
    tienda_db::run_migrations(&pool).await?;

    let payments = Arc::new(tienda_payments::PaymentClient::new(
        &config.payment_base_url,
        config.payment_access_token.clone(),
        &config.checkout_return_url,
        config.http_request_timeout_secs,
    )?);
    let platform = Arc::new(tienda_platform::PlatformClient::new(
        config.platform_webhook_url.clone(),
        config.platform_api_token.clone(),
        config.http_request_timeout_secs,
    )?);

    let auth = AuthState::from_env(matches!(config.env, tienda_core::Environment::Development))?;
    let bind_addr = config.bind_addr;
    let app = build_app(
        AppState {
            pool,
            config,
            payments,
            platform,
            mailer: Arc::new(LogMailer),
        },
        auth,
    );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}
