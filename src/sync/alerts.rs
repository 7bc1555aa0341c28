use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::util::env::{env_opt, env_parse};

/// Emitted when a SKU's projected cover falls at or below the restock
/// threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct RestockAlert {
    pub sku: String,
    pub current_stock: i64,
    pub rolling_30: f64,
}

/// Alert sink. Delivery failures are logged and swallowed by the caller;
/// they never fail a sync run.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &RestockAlert) -> Result<()>;
}

/// Posts alerts to a webhook-style sink as a small JSON document.
pub struct WebhookNotifier {
    http: reqwest::Client,
    endpoint: String,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let timeout = std::time::Duration::from_secs(env_parse("ALERT_HTTP_TIMEOUT_SECS", 10u64));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build alert http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }

    /// None when ALERT_WEBHOOK_URL is not configured.
    pub fn from_env() -> Result<Option<Self>> {
        match env_opt("ALERT_WEBHOOK_URL") {
            Some(url) => Ok(Some(Self::new(url)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, alert: &RestockAlert) -> Result<()> {
        let payload = json!({
            "type": "restock",
            "sku": alert.sku,
            "current_stock": alert.current_stock,
            "avg_daily_sales_30d": alert.rolling_30,
            "text": format!(
                "Restock {}: {} units on hand, selling {:.2}/day",
                alert.sku, alert.current_stock, alert.rolling_30
            ),
        });
        let resp = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("alert webhook request to {} failed", self.endpoint))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("alert webhook {} returned {status}: {body}", self.endpoint);
        }
        Ok(())
    }
}

/// Fallback sink when no webhook is configured; alerts only reach the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, alert: &RestockAlert) -> Result<()> {
        info!(
            sku = %alert.sku,
            current_stock = alert.current_stock,
            rolling_30 = alert.rolling_30,
            "restock alert"
        );
        Ok(())
    }
}
