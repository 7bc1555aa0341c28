// API request/response models (DTOs)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub uptime_seconds: u64,
}

/// Latest stored metrics for one SKU plus the read-time trend.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetricResponse {
    pub sku: String,
    pub metric_date: NaiveDate,
    pub daily_sales: i64,
    pub rolling_7: f64,
    pub rolling_30: f64,
    pub current_stock: i64,
    /// null whenever the 30-day average is zero
    pub days_of_cover: Option<f64>,
    pub trend: String,
}

/// Last recorded sync run.
#[derive(Debug, Serialize, Deserialize)]
pub struct SyncRunResponse {
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub products: i64,
    pub orders: i64,
    pub line_items: i64,
    pub alerts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
