pub mod pg;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// One sellable variant, keyed by SKU. Last-fetched values win on re-sync.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub sku: String,
    pub title: String,
    pub product_id: i64,
    pub variant_id: i64,
    /// Numeric key inventory payloads join on; may be backfilled later.
    pub inventory_item_id: Option<i64>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub handle: Option<String>,
}

/// Per-location stock observation; one row per (SKU, location).
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryRecord {
    pub sku: String,
    pub location_id: i64,
    pub available: i64,
    pub observed_at: DateTime<Utc>,
}

/// One order line; at most one row per (order, SKU).
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineRecord {
    pub order_id: i64,
    pub sku: String,
    pub quantity: i64,
    pub price: Option<f64>,
    pub ordered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub sku: String,
    pub metric_date: NaiveDate,
    pub daily_sales: i64,
    pub rolling_7: f64,
    pub rolling_30: f64,
    pub current_stock: i64,
    /// None whenever the 30-day average is zero.
    pub days_of_cover: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SyncRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub products: i64,
    pub orders: i64,
    pub line_items: i64,
    pub alerts: i64,
    pub error: Option<String>,
}

/// Persistence surface of the sync routine. The Postgres pool implements it
/// for real; tests inject an in-memory store.
#[async_trait]
pub trait SyncStore: Send + Sync {
    /// Insert-or-update keyed by SKU. Callers must de-duplicate by SKU
    /// within one batch.
    async fn upsert_products(&self, rows: &[ProductRecord]) -> Result<u64>;

    /// Insert-or-update keyed by (SKU, location); last write wins. Callers
    /// must de-duplicate by key within one batch.
    async fn upsert_inventory_levels(&self, rows: &[InventoryRecord]) -> Result<u64>;

    /// Insert with skip-on-conflict on (order_id, SKU); returns the number
    /// of rows actually inserted.
    async fn insert_order_lines(&self, rows: &[OrderLineRecord]) -> Result<u64>;

    async fn sku_for_inventory_item(&self, inventory_item_id: i64) -> Result<Option<String>>;

    /// Record a mapping discovered from an inventory payload; never
    /// overwrites an existing mapping.
    async fn backfill_inventory_item(&self, sku: &str, inventory_item_id: i64) -> Result<()>;

    async fn known_skus(&self) -> Result<Vec<String>>;

    /// Summed order quantity per calendar day over `from..=to`. Days without
    /// sales are absent here; the metrics layer fills the gaps with zero.
    async fn daily_sales(
        &self,
        sku: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, i64)>>;

    async fn units_sold_between(&self, sku: &str, from: NaiveDate, to: NaiveDate) -> Result<i64>;

    /// Fresh sum of `available` across all locations for the SKU.
    async fn current_stock(&self, sku: &str) -> Result<i64>;

    async fn upsert_daily_metric(&self, row: &MetricRow) -> Result<()>;

    async fn latest_metric(&self, sku: &str) -> Result<Option<MetricRow>>;

    async fn record_sync_run(&self, run: &SyncRun) -> Result<()>;

    async fn last_sync_run(&self) -> Result<Option<SyncRun>>;
}

/// Trailing numeric component of a platform identifier, e.g.
/// "gid://shop/InventoryItem/48123" -> 48123.
pub fn trailing_numeric_id(raw: &str) -> Option<i64> {
    let bytes = raw.as_bytes();
    let mut end = bytes.len();
    while end > 0 && !bytes[end - 1].is_ascii_digit() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }
    if start == end {
        return None;
    }
    raw.get(start..end)?.parse::<i64>().ok()
}
