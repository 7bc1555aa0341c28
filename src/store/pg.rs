//! Postgres implementation of the sync store on top of the shared pool.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{QueryBuilder, Row};

use crate::db::Db;
use crate::store::{
    InventoryRecord, MetricRow, OrderLineRecord, ProductRecord, SyncRun, SyncStore,
};

// Keeps bulk statements well under the Postgres bind-parameter limit.
const INSERT_CHUNK: usize = 1000;

#[async_trait]
impl SyncStore for Db {
    async fn upsert_products(&self, rows: &[ProductRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO products (sku, title, product_id, variant_id, inventory_item_id, image_url, price, handle, updated_at) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(&r.sku)
                    .push_bind(&r.title)
                    .push_bind(r.product_id)
                    .push_bind(r.variant_id)
                    .push_bind(r.inventory_item_id)
                    .push_bind(&r.image_url)
                    .push_bind(r.price)
                    .push_bind(&r.handle)
                    .push("now()");
            });
            // Last-fetched values win, except the inventory-item mapping: a
            // payload that omits it must not erase an established mapping.
            qb.push(
                " ON CONFLICT (sku) DO UPDATE SET \
                   title = EXCLUDED.title, \
                   product_id = EXCLUDED.product_id, \
                   variant_id = EXCLUDED.variant_id, \
                   inventory_item_id = COALESCE(EXCLUDED.inventory_item_id, products.inventory_item_id), \
                   image_url = EXCLUDED.image_url, \
                   price = EXCLUDED.price, \
                   handle = EXCLUDED.handle, \
                   updated_at = now()",
            );
            qb.build().persistent(false).execute(&self.pool).await?;
        }
        Ok(rows.len() as u64)
    }

    async fn upsert_inventory_levels(&self, rows: &[InventoryRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO inventory_levels (sku, location_id, available, observed_at) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(&r.sku)
                    .push_bind(r.location_id)
                    .push_bind(r.available)
                    .push_bind(r.observed_at);
            });
            qb.push(
                " ON CONFLICT (sku, location_id) DO UPDATE SET \
                   available = EXCLUDED.available, \
                   observed_at = EXCLUDED.observed_at",
            );
            qb.build().persistent(false).execute(&self.pool).await?;
        }
        Ok(rows.len() as u64)
    }

    async fn insert_order_lines(&self, rows: &[OrderLineRecord]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let mut inserted = 0u64;
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb: QueryBuilder<'_, sqlx::Postgres> = QueryBuilder::new(
                "INSERT INTO orders_lineitems (order_id, sku, quantity, price, ordered_at) ",
            );
            qb.push_values(chunk, |mut b, r| {
                b.push_bind(r.order_id)
                    .push_bind(&r.sku)
                    .push_bind(r.quantity)
                    .push_bind(r.price)
                    .push_bind(r.ordered_at);
            });
            qb.push(" ON CONFLICT (order_id, sku) DO NOTHING");
            let res = qb.build().persistent(false).execute(&self.pool).await?;
            inserted += res.rows_affected();
        }
        Ok(inserted)
    }

    async fn sku_for_inventory_item(&self, inventory_item_id: i64) -> Result<Option<String>> {
        let sku = sqlx::query_scalar::<_, String>(
            "SELECT sku FROM products WHERE inventory_item_id = $1 LIMIT 1",
        )
        .persistent(false)
        .bind(inventory_item_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(sku)
    }

    async fn backfill_inventory_item(&self, sku: &str, inventory_item_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE products SET inventory_item_id = $2 \
             WHERE sku = $1 AND inventory_item_id IS NULL",
        )
        .persistent(false)
        .bind(sku)
        .bind(inventory_item_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn known_skus(&self) -> Result<Vec<String>> {
        let skus = sqlx::query_scalar::<_, String>("SELECT sku FROM products ORDER BY sku")
            .persistent(false)
            .fetch_all(&self.pool)
            .await?;
        Ok(skus)
    }

    async fn daily_sales(
        &self,
        sku: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<(NaiveDate, i64)>> {
        let rows = sqlx::query(
            "SELECT ordered_at::date AS day, SUM(quantity)::bigint AS qty \
             FROM orders_lineitems \
             WHERE sku = $1 AND ordered_at::date BETWEEN $2 AND $3 \
             GROUP BY 1 ORDER BY 1",
        )
        .persistent(false)
        .bind(sku)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("day"), r.get("qty")))
            .collect())
    }

    async fn units_sold_between(&self, sku: &str, from: NaiveDate, to: NaiveDate) -> Result<i64> {
        let qty = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(quantity), 0)::bigint \
             FROM orders_lineitems \
             WHERE sku = $1 AND ordered_at::date BETWEEN $2 AND $3",
        )
        .persistent(false)
        .bind(sku)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(qty)
    }

    async fn current_stock(&self, sku: &str) -> Result<i64> {
        let stock = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(available), 0)::bigint FROM inventory_levels WHERE sku = $1",
        )
        .persistent(false)
        .bind(sku)
        .fetch_one(&self.pool)
        .await?;
        Ok(stock)
    }

    async fn upsert_daily_metric(&self, row: &MetricRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO metrics_daily \
               (sku, metric_date, daily_sales, rolling_7, rolling_30, current_stock, days_of_cover, computed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now()) \
             ON CONFLICT (sku, metric_date) DO UPDATE SET \
               daily_sales = EXCLUDED.daily_sales, \
               rolling_7 = EXCLUDED.rolling_7, \
               rolling_30 = EXCLUDED.rolling_30, \
               current_stock = EXCLUDED.current_stock, \
               days_of_cover = EXCLUDED.days_of_cover, \
               computed_at = now()",
        )
        .persistent(false)
        .bind(&row.sku)
        .bind(row.metric_date)
        .bind(row.daily_sales)
        .bind(row.rolling_7)
        .bind(row.rolling_30)
        .bind(row.current_stock)
        .bind(row.days_of_cover)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_metric(&self, sku: &str) -> Result<Option<MetricRow>> {
        let row = sqlx::query(
            "SELECT sku, metric_date, daily_sales, rolling_7, rolling_30, current_stock, days_of_cover \
             FROM metrics_daily WHERE sku = $1 \
             ORDER BY metric_date DESC LIMIT 1",
        )
        .persistent(false)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| MetricRow {
            sku: r.get("sku"),
            metric_date: r.get("metric_date"),
            daily_sales: r.get("daily_sales"),
            rolling_7: r.get("rolling_7"),
            rolling_30: r.get("rolling_30"),
            current_stock: r.get("current_stock"),
            days_of_cover: r.get("days_of_cover"),
        }))
    }

    async fn record_sync_run(&self, run: &SyncRun) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_runs \
               (started_at, finished_at, status, products, orders, line_items, alerts, error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .persistent(false)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(&run.status)
        .bind(run.products)
        .bind(run.orders)
        .bind(run.line_items)
        .bind(run.alerts)
        .bind(&run.error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn last_sync_run(&self) -> Result<Option<SyncRun>> {
        let row = sqlx::query(
            "SELECT started_at, finished_at, status, products, orders, line_items, alerts, error \
             FROM sync_runs ORDER BY id DESC LIMIT 1",
        )
        .persistent(false)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| SyncRun {
            started_at: r.get("started_at"),
            finished_at: r.get("finished_at"),
            status: r.get("status"),
            products: r.get("products"),
            orders: r.get("orders"),
            line_items: r.get("line_items"),
            alerts: r.get("alerts"),
            error: r.get("error"),
        }))
    }
}
