//! SafeWatch - Campaign management server entry point

use anyhow::{Context, Result};
use safewatch_api::{create_router, AppState};
use safewatch_common::config::{BootstrapAdmin, Config, GatewayKind, LoggingConfig, SmsConfig};
use safewatch_core::password::hash_password;
use safewatch_core::users::{validate_new_user, NewUserInput};
use safewatch_core::{AlertDispatcher, HttpSmsGateway, SimulatedGateway, SmsGateway};
use safewatch_storage::repository::UserRepository;
use safewatch_storage::DatabasePool;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = match std::env::var_os("SAFEWATCH_CONFIG") {
        Some(path) => Config::from_file(Path::new(&path))?,
        None => Config::load()?,
    };

    // Initialize logging
    init_logging(&config.logging);

    info!("Starting SafeWatch server...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;

    // Run migrations
    db_pool.migrate().await?;

    if let Some(admin) = &config.auth.bootstrap_admin {
        bootstrap_admin(&db_pool, admin).await?;
    }

    let gateway = build_gateway(&config.sms)?;
    let dispatch = config
        .sms
        .dispatch_enabled
        .then_some(config.sms.dispatch_interval_secs);
    let addr = config.server.listen_addr();

    if !config.auth.require_auth {
        warn!("auth.require_auth is off; only profile and notification calls need a token");
    }

    let state = Arc::new(AppState::new(db_pool, config, gateway));

    // Start scheduled alert dispatcher
    let dispatcher_handle = dispatch.map(|secs| {
        let dispatcher = AlertDispatcher::new(state.alerts.clone()).with_poll_interval(secs);
        tokio::spawn(async move {
            dispatcher.run().await;
        })
    });
    if dispatcher_handle.is_none() {
        info!("Scheduled alert dispatcher disabled");
    }

    // Start API server
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;
    info!("SafeWatch API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = dispatcher_handle {
        handle.abort();
    }

    info!("SafeWatch server shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},safewatch=debug", logging.level)));

    if logging.format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true).with_level(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}

fn build_gateway(sms: &SmsConfig) -> Result<Arc<dyn SmsGateway>> {
    match sms.gateway {
        GatewayKind::Simulated => {
            info!(success_rate = sms.success_rate, "Using simulated SMS gateway");
            Ok(Arc::new(SimulatedGateway::new(sms.success_rate)))
        }
        GatewayKind::Http => {
            let http = sms
                .http
                .as_ref()
                .context("sms.gateway = \"http\" needs an [sms.http] section")?;
            info!(url = %http.url, "Using HTTP SMS gateway");
            Ok(Arc::new(HttpSmsGateway::new(http)?))
        }
    }
}

/// Create the configured administrator when the users table is empty
async fn bootstrap_admin(db_pool: &DatabasePool, admin: &BootstrapAdmin) -> Result<()> {
    let users = UserRepository::new(db_pool.pool().clone());
    if users.count().await? > 0 {
        return Ok(());
    }

    let (user, password) = validate_new_user(NewUserInput {
        username: admin.username.clone(),
        email: admin.email.clone(),
        password: admin.password.clone(),
        full_name: admin.full_name.clone(),
        role: Some("admin".to_string()),
        phone: None,
    })
    .context("Invalid auth.bootstrap_admin")?;

    let created = users.create(user, hash_password(&password)?).await?;
    info!(user_id = %created.id, username = %created.username, "Bootstrap administrator created");
    Ok(())
}
