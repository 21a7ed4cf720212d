use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use trustlet_api::auth::{AppState, AppStateInner};
use trustlet_api::{Workflow, WorkflowConfig};
use trustlet_db::Database;
use trustlet_notify::NotificationDispatcher;
use trustlet_server::config::{ConfigError, ServerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    trustlet_server::init_tracing("trustlet=debug,trustlet_api=debug,trustlet_notify=debug,tower_http=debug");

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::InsecureSecret) => {
            eprintln!("FATAL: TRUSTLET_JWT_SECRET is unset or still a placeholder.");
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let db = Arc::new(Database::open(&config.db_path, config.busy_timeout)?);
    let notifier = NotificationDispatcher::new(config.mail.mailer()?, config.mail.from.clone());
    let workflow = Workflow::new(
        db,
        notifier,
        WorkflowConfig {
            beta_cap: config.beta_cap,
            store_timeout: config.store_timeout,
        },
    );

    let state: AppState = Arc::new(AppStateInner {
        workflow,
        jwt_secret: config.jwt_secret.clone(),
    });

    let app = trustlet_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Trustlet server listening on {}", addr);
    match config.beta_cap {
        Some(cap) => info!("Beta cap: {} members", cap),
        None => info!("Beta cap: none"),
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(e) => {
                    tracing::warn!("Could not install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    info!("Received Ctrl+C, shutting down...");
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
