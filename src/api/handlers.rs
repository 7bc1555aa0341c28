// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::db::Db;
use crate::shop::ShopClient;
use crate::store::{MetricRow, SyncStore};
use crate::sync::alerts::Notifier;
use crate::sync::metrics::{classify_trend, month_to_date_windows, Trend};
use crate::sync::{run_sync, SyncConfig};
use actix_web::{web, HttpResponse, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::SystemTime;

/// Shared state for the sync trigger: the remote client, the alert sink,
/// and the one-run-at-a-time guard.
pub struct SyncContext {
    pub shop: ShopClient,
    pub notifier: Arc<dyn Notifier>,
    pub config: SyncConfig,
    pub guard: tokio::sync::Mutex<()>,
}

/// Health check endpoint
pub async fn health_check(db: web::Data<Db>) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match sqlx::query_scalar::<_, bool>("SELECT true")
        .fetch_one(&db.pool)
        .await
    {
        Ok(_) => "connected",
        Err(_) => "disconnected",
    };

    let uptime = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        uptime_seconds: uptime,
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Trigger one full sync run. Plain-text response; one run at a time.
pub async fn trigger_sync(
    db: web::Data<Db>,
    ctx: web::Data<SyncContext>,
) -> Result<HttpResponse> {
    let Ok(_guard) = ctx.guard.try_lock() else {
        return Ok(HttpResponse::Conflict()
            .content_type("text/plain; charset=utf-8")
            .body("sync already running\n"));
    };

    tracing::info!("sync run triggered");
    match run_sync(&ctx.shop, db.get_ref(), ctx.notifier.as_ref(), &ctx.config).await {
        Ok(summary) => Ok(HttpResponse::Ok()
            .content_type("text/plain; charset=utf-8")
            .body(format!("{summary}\n"))),
        Err(err) => {
            tracing::error!(error = %err, "sync run failed");
            Ok(HttpResponse::InternalServerError()
                .content_type("text/plain; charset=utf-8")
                .body(format!("sync failed: {err:#}\n")))
        }
    }
}

/// Latest metrics row for a SKU, with the trend derived at read time.
pub async fn get_metric(path: web::Path<String>, db: web::Data<Db>) -> Result<HttpResponse> {
    let sku = path.into_inner();

    let metric = match db.latest_metric(&sku).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(ApiResponse::<MetricResponse>::error(
                format!("no metrics for sku {sku}"),
            )))
        }
        Err(err) => {
            tracing::error!(sku = %sku, error = %err, "metric lookup failed");
            return Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<MetricResponse>::error("metric lookup failed")));
        }
    };

    let trend = match trend_for(db.get_ref(), &sku, &metric).await {
        Ok(trend) => trend,
        Err(err) => {
            tracing::error!(sku = %sku, error = %err, "trend computation failed");
            return Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<MetricResponse>::error("trend computation failed")));
        }
    };

    let response = ApiResponse::success(MetricResponse {
        sku: metric.sku,
        metric_date: metric.metric_date,
        daily_sales: metric.daily_sales,
        rolling_7: metric.rolling_7,
        rolling_30: metric.rolling_30,
        current_stock: metric.current_stock,
        days_of_cover: metric.days_of_cover,
        trend: trend.as_str().to_string(),
    });
    Ok(HttpResponse::Ok().json(response))
}

/// Month-to-date quantity against the same elapsed days of the previous
/// month; falls back to the stored rolling windows when last month has no
/// usable data. Computed here, never stored.
async fn trend_for<S>(store: &S, sku: &str, metric: &MetricRow) -> anyhow::Result<Trend>
where
    S: SyncStore + ?Sized,
{
    let today = Utc::now().date_naive();
    let ((mtd_from, mtd_to), (prev_from, prev_to)) = month_to_date_windows(today);
    let month_to_date = store.units_sold_between(sku, mtd_from, mtd_to).await?;
    let prev = store.units_sold_between(sku, prev_from, prev_to).await?;
    let prev = (prev > 0).then_some(prev);
    Ok(classify_trend(
        month_to_date,
        prev,
        metric.rolling_7,
        metric.rolling_30,
    ))
}

/// Last recorded sync run.
pub async fn sync_status(db: web::Data<Db>) -> Result<HttpResponse> {
    match db.last_sync_run().await {
        Ok(Some(run)) => Ok(HttpResponse::Ok().json(ApiResponse::success(SyncRunResponse {
            status: run.status,
            started_at: run.started_at,
            finished_at: run.finished_at,
            products: run.products,
            orders: run.orders,
            line_items: run.line_items,
            alerts: run.alerts,
            error: run.error,
        }))),
        Ok(None) => Ok(HttpResponse::NotFound()
            .json(ApiResponse::<SyncRunResponse>::error("no sync runs recorded"))),
        Err(err) => {
            tracing::error!(error = %err, "sync status lookup failed");
            Ok(HttpResponse::InternalServerError()
                .json(ApiResponse::<SyncRunResponse>::error("status lookup failed")))
        }
    }
}
