// API server implementation using actix-web

use crate::api::{auth, handlers::SyncContext, middleware, routes};
use crate::db::Db;
use crate::shop::ShopClient;
use crate::sync::alerts::{LogNotifier, Notifier, WebhookNotifier};
use crate::sync::SyncConfig;
use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;

pub struct ApiServer {
    pub host: String,
    pub port: u16,
    pub sync_secret: String,
    pub allowed_origins: String,
}

impl ApiServer {
    /// Create server from environment variables
    pub fn from_env() -> Result<Self> {
        crate::util::env::init_env();

        let host = env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("Invalid API_PORT")?;

        let sync_secret =
            env::var("SYNC_SECRET").context("SYNC_SECRET environment variable is required")?;

        let allowed_origins = env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000,http://localhost:8000".to_string());

        Ok(Self {
            host,
            port,
            sync_secret,
            allowed_origins,
        })
    }

    /// Start the HTTP server
    pub async fn run(self, db: Db) -> Result<()> {
        let bind_addr = format!("{}:{}", self.host, self.port);

        tracing::info!(
            host = %self.host,
            port = %self.port,
            "Starting storepulse API server"
        );

        let shop = ShopClient::from_env()?;
        let notifier: Arc<dyn Notifier> = match WebhookNotifier::from_env()? {
            Some(webhook) => Arc::new(webhook),
            None => Arc::new(LogNotifier),
        };
        let ctx = web::Data::new(SyncContext {
            shop,
            notifier,
            config: SyncConfig::from_env(),
            guard: tokio::sync::Mutex::new(()),
        });

        let db_data = web::Data::new(db);
        let sync_secret = self.sync_secret.clone();
        let allowed_origins = self.allowed_origins.clone();

        HttpServer::new(move || {
            let (logger, compress) = middleware::setup_middleware();
            let cors = middleware::setup_cors(&allowed_origins);
            let auth = auth::Auth::new(sync_secret.clone());

            App::new()
                .app_data(db_data.clone())
                .app_data(ctx.clone())
                .wrap(logger)
                .wrap(compress)
                .wrap(cors)
                .wrap(auth)
                .configure(routes::configure_routes)
        })
        .bind(&bind_addr)
        .with_context(|| format!("Failed to bind to {}", bind_addr))?
        .run()
        .await
        .context("HTTP server error")?;

        Ok(())
    }
}
