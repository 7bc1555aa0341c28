//! The sync routine: paginated fetch, idempotent persistence, metrics
//! rollup, restock alerting.

pub mod alerts;
pub mod metrics;
pub mod paginate;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::shop::types::{InventoryLevel, Product, ProductVariant};
use crate::shop::ShopApi;
use crate::store::{
    trailing_numeric_id, InventoryRecord, MetricRow, OrderLineRecord, ProductRecord, SyncRun,
    SyncStore,
};
use alerts::{Notifier, RestockAlert};
use metrics::{
    build_daily_series, days_of_cover, mean, RESTOCK_COVER_DAYS, SALES_WINDOW_DAYS,
    SHORT_WINDOW_DAYS,
};
use paginate::{fetch_all, PagePolicy};

/// Tunables for one sync invocation.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Trailing window for the orders fetch, in days.
    pub order_window_days: i64,
    /// Page size requested from the platform.
    pub page_limit: u32,
    pub policy: PagePolicy,
}

impl SyncConfig {
    pub fn from_env() -> Self {
        Self {
            order_window_days: crate::util::env::env_parse("SYNC_ORDER_WINDOW_DAYS", 60i64),
            page_limit: crate::util::env::env_parse("SYNC_PAGE_LIMIT", 250u32),
            policy: PagePolicy::from_env(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            order_window_days: 60,
            page_limit: 250,
            policy: PagePolicy::default(),
        }
    }
}

#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct SyncSummary {
    pub products: u64,
    pub inventory_levels: u64,
    pub orders: u64,
    pub line_items: u64,
    pub metrics: u64,
    pub alerts: u64,
}

impl std::fmt::Display for SyncSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "synced {} products, {} inventory levels, {} orders ({} new line items), {} metric rows, {} alerts",
            self.products,
            self.inventory_levels,
            self.orders,
            self.line_items,
            self.metrics,
            self.alerts
        )
    }
}

/// Run one full sync pass and record its outcome. The store handle is
/// explicit; nothing here reads ambient global state.
pub async fn run_sync<A, S, N>(
    shop: &A,
    store: &S,
    notifier: &N,
    cfg: &SyncConfig,
) -> Result<SyncSummary>
where
    A: ShopApi + ?Sized,
    S: SyncStore + ?Sized,
    N: Notifier + ?Sized,
{
    let started = Utc::now();
    // Reference date for every date-window computation in this run.
    let today = started.date_naive();
    match sync_once(shop, store, notifier, cfg, started, today).await {
        Ok(summary) => {
            store
                .record_sync_run(&SyncRun {
                    started_at: started,
                    finished_at: Some(Utc::now()),
                    status: "ok".into(),
                    products: summary.products as i64,
                    orders: summary.orders as i64,
                    line_items: summary.line_items as i64,
                    alerts: summary.alerts as i64,
                    error: None,
                })
                .await?;
            info!(%summary, "sync run complete");
            Ok(summary)
        }
        Err(err) => {
            // Best effort; the original error is the one worth surfacing.
            let _ = store
                .record_sync_run(&SyncRun {
                    started_at: started,
                    finished_at: Some(Utc::now()),
                    status: "failed".into(),
                    products: 0,
                    orders: 0,
                    line_items: 0,
                    alerts: 0,
                    error: Some(format!("{err:#}")),
                })
                .await;
            Err(err)
        }
    }
}

async fn sync_once<A, S, N>(
    shop: &A,
    store: &S,
    notifier: &N,
    cfg: &SyncConfig,
    started: DateTime<Utc>,
    today: NaiveDate,
) -> Result<SyncSummary>
where
    A: ShopApi + ?Sized,
    S: SyncStore + ?Sized,
    N: Notifier + ?Sized,
{
    let mut summary = SyncSummary::default();

    // (a) product catalog; nothing downstream makes sense without it
    let products = fetch_all("products", cfg.policy, |cursor| {
        shop.products_page(cursor, cfg.page_limit)
    })
    .await
    .context("product catalog fetch failed")?;
    info!(products = products.len(), "catalog fetched");

    // (b) inventory; absence degrades stock to zero downstream
    let mut raw_levels: Vec<InventoryLevel> = Vec::new();
    match shop.locations().await {
        Ok(locations) => {
            for loc in &locations {
                match fetch_all("inventory_levels", cfg.policy, |page| {
                    shop.inventory_page(loc.id, page, cfg.page_limit)
                })
                .await
                {
                    Ok(levels) => raw_levels.extend(levels),
                    Err(err) => warn!(
                        location_id = loc.id,
                        error = %err,
                        "inventory fetch failed; continuing without this location"
                    ),
                }
            }
        }
        Err(err) => {
            warn!(error = %err, "locations fetch failed; continuing with no inventory")
        }
    }

    // (c) recent orders; absence degrades sales to zero
    let created_min = started - Duration::days(cfg.order_window_days);
    let orders = match fetch_all("orders", cfg.policy, |cursor| {
        shop.orders_page(created_min, cursor, cfg.page_limit)
    })
    .await
    {
        Ok(orders) => orders,
        Err(err) => {
            warn!(error = %err, "orders fetch failed; continuing with empty order set");
            Vec::new()
        }
    };
    summary.orders = orders.len() as u64;

    // (d) persist, products first so the inventory-item mapping is queryable
    let mut product_rows: HashMap<String, ProductRecord> = HashMap::new();
    for product in &products {
        for variant in &product.variants {
            let Some(sku) = variant_sku(variant) else {
                continue; // no SKU, not an error
            };
            product_rows.insert(
                sku.to_string(),
                ProductRecord {
                    sku: sku.to_string(),
                    title: display_title(product, variant),
                    product_id: product.id,
                    variant_id: variant.id,
                    inventory_item_id: variant
                        .inventory_item_gid
                        .as_deref()
                        .and_then(trailing_numeric_id),
                    image_url: product.image.as_ref().and_then(|i| i.src.clone()),
                    price: variant.price.as_deref().and_then(|p| p.parse::<f64>().ok()),
                    handle: product.handle.clone(),
                },
            );
        }
    }
    let product_rows: Vec<ProductRecord> = product_rows.into_values().collect();
    summary.products = store.upsert_products(&product_rows).await?;

    let mut inventory_rows: HashMap<(String, i64), InventoryRecord> = HashMap::new();
    for level in &raw_levels {
        let Some(sku) = resolve_level_sku(store, level).await? else {
            continue;
        };
        inventory_rows.insert(
            (sku.clone(), level.location_id),
            InventoryRecord {
                sku,
                location_id: level.location_id,
                available: level.available.unwrap_or(0),
                observed_at: level.updated_at.unwrap_or(started),
            },
        );
    }
    let inventory_rows: Vec<InventoryRecord> = inventory_rows.into_values().collect();
    summary.inventory_levels = store.upsert_inventory_levels(&inventory_rows).await?;

    let mut line_rows: Vec<OrderLineRecord> = Vec::new();
    for order in &orders {
        for line in &order.line_items {
            let Some(sku) = line.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            line_rows.push(OrderLineRecord {
                order_id: order.id,
                sku: sku.to_string(),
                quantity: line.quantity,
                price: line.price.as_deref().and_then(|p| p.parse::<f64>().ok()),
                ordered_at: order.created_at,
            });
        }
    }
    summary.line_items = store.insert_order_lines(&line_rows).await?;

    // (e) metrics rollup + restock alerts
    let window_start = today - Duration::days(SALES_WINDOW_DAYS as i64 - 1);
    for sku in store.known_skus().await? {
        let rows = store.daily_sales(&sku, window_start, today).await?;
        let series = build_daily_series(&rows, today);
        let rolling_30 = mean(&series);
        let rolling_7 = mean(&series[SALES_WINDOW_DAYS - SHORT_WINDOW_DAYS..]);
        let daily_sales = series[SALES_WINDOW_DAYS - 1];
        let current_stock = store.current_stock(&sku).await?;
        let cover = days_of_cover(current_stock, rolling_30);
        store
            .upsert_daily_metric(&MetricRow {
                sku: sku.clone(),
                metric_date: today,
                daily_sales,
                rolling_7,
                rolling_30,
                current_stock,
                days_of_cover: cover,
            })
            .await?;
        summary.metrics += 1;

        if let Some(cover) = cover {
            if cover <= RESTOCK_COVER_DAYS {
                let alert = RestockAlert {
                    sku: sku.clone(),
                    current_stock,
                    rolling_30,
                };
                summary.alerts += 1;
                if let Err(err) = notifier.notify(&alert).await {
                    // never allowed to fail the run
                    warn!(sku = %sku, error = %err, "restock alert delivery failed");
                }
            }
        }
    }

    Ok(summary)
}

fn variant_sku(variant: &ProductVariant) -> Option<&str> {
    variant
        .sku
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn display_title(product: &Product, variant: &ProductVariant) -> String {
    match variant.title.as_deref().map(str::trim) {
        Some(vt) if !vt.is_empty() && !vt.eq_ignore_ascii_case("default title") => {
            format!("{} - {}", product.title, vt)
        }
        _ => product.title.clone(),
    }
}

/// SKU for one inventory payload row: the stored inventory-item mapping
/// first, then any SKU embedded in the payload directly (opportunistically
/// backfilling the mapping for future runs).
async fn resolve_level_sku<S>(store: &S, level: &InventoryLevel) -> Result<Option<String>>
where
    S: SyncStore + ?Sized,
{
    if let Some(item_id) = level.inventory_item_id {
        if let Some(sku) = store.sku_for_inventory_item(item_id).await? {
            return Ok(Some(sku));
        }
    }
    let Some(sku) = level.sku.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    if let Some(item_id) = level.inventory_item_id {
        if let Err(err) = store.backfill_inventory_item(sku, item_id).await {
            warn!(sku, inventory_item_id = item_id, error = %err, "inventory item backfill failed");
        }
    }
    Ok(Some(sku.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shop::types::{
        Location, Order, OrderLineItem, ProductImage,
    };
    use crate::sync::paginate::Page;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        products: Mutex<HashMap<String, ProductRecord>>,
        inventory: Mutex<HashMap<(String, i64), InventoryRecord>>,
        lines: Mutex<HashMap<(i64, String), OrderLineRecord>>,
        metrics: Mutex<HashMap<(String, NaiveDate), MetricRow>>,
        runs: Mutex<Vec<SyncRun>>,
    }

    impl MemStore {
        fn metric(&self, sku: &str) -> Option<MetricRow> {
            self.metrics
                .lock()
                .unwrap()
                .values()
                .filter(|m| m.sku == sku)
                .max_by_key(|m| m.metric_date)
                .cloned()
        }

        fn product(&self, sku: &str) -> Option<ProductRecord> {
            self.products.lock().unwrap().get(sku).cloned()
        }

        fn counts(&self) -> (usize, usize, usize) {
            (
                self.products.lock().unwrap().len(),
                self.inventory.lock().unwrap().len(),
                self.lines.lock().unwrap().len(),
            )
        }
    }

    #[async_trait]
    impl SyncStore for MemStore {
        async fn upsert_products(&self, rows: &[ProductRecord]) -> Result<u64> {
            let mut map = self.products.lock().unwrap();
            for r in rows {
                map.insert(r.sku.clone(), r.clone());
            }
            Ok(rows.len() as u64)
        }

        async fn upsert_inventory_levels(&self, rows: &[InventoryRecord]) -> Result<u64> {
            let mut map = self.inventory.lock().unwrap();
            for r in rows {
                map.insert((r.sku.clone(), r.location_id), r.clone());
            }
            Ok(rows.len() as u64)
        }

        async fn insert_order_lines(&self, rows: &[OrderLineRecord]) -> Result<u64> {
            let mut map = self.lines.lock().unwrap();
            let mut inserted = 0;
            for r in rows {
                let key = (r.order_id, r.sku.clone());
                if let std::collections::hash_map::Entry::Vacant(e) = map.entry(key) {
                    e.insert(r.clone());
                    inserted += 1;
                }
            }
            Ok(inserted)
        }

        async fn sku_for_inventory_item(&self, inventory_item_id: i64) -> Result<Option<String>> {
            Ok(self
                .products
                .lock()
                .unwrap()
                .values()
                .find(|p| p.inventory_item_id == Some(inventory_item_id))
                .map(|p| p.sku.clone()))
        }

        async fn backfill_inventory_item(&self, sku: &str, inventory_item_id: i64) -> Result<()> {
            if let Some(p) = self.products.lock().unwrap().get_mut(sku) {
                if p.inventory_item_id.is_none() {
                    p.inventory_item_id = Some(inventory_item_id);
                }
            }
            Ok(())
        }

        async fn known_skus(&self) -> Result<Vec<String>> {
            let mut skus: Vec<String> = self.products.lock().unwrap().keys().cloned().collect();
            skus.sort();
            Ok(skus)
        }

        async fn daily_sales(
            &self,
            sku: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<Vec<(NaiveDate, i64)>> {
            let mut by_day: HashMap<NaiveDate, i64> = HashMap::new();
            for r in self.lines.lock().unwrap().values() {
                if r.sku != sku {
                    continue;
                }
                let day = r.ordered_at.date_naive();
                if day < from || day > to {
                    continue;
                }
                *by_day.entry(day).or_insert(0) += r.quantity;
            }
            let mut rows: Vec<(NaiveDate, i64)> = by_day.into_iter().collect();
            rows.sort();
            Ok(rows)
        }

        async fn units_sold_between(
            &self,
            sku: &str,
            from: NaiveDate,
            to: NaiveDate,
        ) -> Result<i64> {
            let rows = self.daily_sales(sku, from, to).await?;
            Ok(rows.iter().map(|(_, qty)| qty).sum())
        }

        async fn current_stock(&self, sku: &str) -> Result<i64> {
            Ok(self
                .inventory
                .lock()
                .unwrap()
                .values()
                .filter(|r| r.sku == sku)
                .map(|r| r.available)
                .sum())
        }

        async fn upsert_daily_metric(&self, row: &MetricRow) -> Result<()> {
            self.metrics
                .lock()
                .unwrap()
                .insert((row.sku.clone(), row.metric_date), row.clone());
            Ok(())
        }

        async fn latest_metric(&self, sku: &str) -> Result<Option<MetricRow>> {
            Ok(self.metric(sku))
        }

        async fn record_sync_run(&self, run: &SyncRun) -> Result<()> {
            self.runs.lock().unwrap().push(run.clone());
            Ok(())
        }

        async fn last_sync_run(&self) -> Result<Option<SyncRun>> {
            Ok(self.runs.lock().unwrap().last().cloned())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        alerts: Mutex<Vec<RestockAlert>>,
        fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, alert: &RestockAlert) -> Result<()> {
            if self.fail {
                bail!("webhook sink unavailable");
            }
            self.alerts.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemShop {
        products: Vec<Product>,
        locations: Vec<Location>,
        inventory: HashMap<i64, Vec<InventoryLevel>>,
        orders: Vec<Order>,
        fail_products: bool,
        fail_locations: bool,
        fail_inventory: bool,
        fail_orders: bool,
    }

    #[async_trait]
    impl ShopApi for MemShop {
        async fn products_page(
            &self,
            _since_id: Option<i64>,
            _limit: u32,
        ) -> Result<Page<Product, i64>> {
            if self.fail_products {
                bail!("products endpoint unavailable");
            }
            Ok(Page {
                items: self.products.clone(),
                next: None,
            })
        }

        async fn locations(&self) -> Result<Vec<Location>> {
            if self.fail_locations {
                bail!("locations endpoint unavailable");
            }
            Ok(self.locations.clone())
        }

        async fn inventory_page(
            &self,
            location_id: i64,
            _page_info: Option<String>,
            _limit: u32,
        ) -> Result<Page<InventoryLevel, String>> {
            if self.fail_inventory {
                bail!("inventory endpoint unavailable");
            }
            Ok(Page {
                items: self.inventory.get(&location_id).cloned().unwrap_or_default(),
                next: None,
            })
        }

        async fn orders_page(
            &self,
            _created_min: DateTime<Utc>,
            _since_id: Option<i64>,
            _limit: u32,
        ) -> Result<Page<Order, i64>> {
            if self.fail_orders {
                bail!("orders endpoint unavailable");
            }
            Ok(Page {
                items: self.orders.clone(),
                next: None,
            })
        }
    }

    fn product(id: i64, title: &str, variants: Vec<ProductVariant>) -> Product {
        Product {
            id,
            title: title.to_string(),
            handle: Some(title.to_ascii_lowercase()),
            image: Some(ProductImage {
                src: Some(format!("https://cdn.example.com/{id}.jpg")),
            }),
            variants,
        }
    }

    fn variant(id: i64, sku: Option<&str>, gid: Option<&str>) -> ProductVariant {
        ProductVariant {
            id,
            title: Some("Default Title".into()),
            sku: sku.map(Into::into),
            price: Some("19.99".into()),
            inventory_item_gid: gid.map(Into::into),
        }
    }

    fn level(item_id: Option<i64>, location_id: i64, available: i64) -> InventoryLevel {
        InventoryLevel {
            inventory_item_id: item_id,
            location_id,
            available: Some(available),
            updated_at: Some(Utc::now()),
            sku: None,
        }
    }

    fn order(id: i64, days_ago: i64, lines: Vec<OrderLineItem>) -> Order {
        Order {
            id,
            created_at: Utc::now() - Duration::days(days_ago),
            line_items: lines,
        }
    }

    fn line(sku: Option<&str>, quantity: i64) -> OrderLineItem {
        OrderLineItem {
            sku: sku.map(Into::into),
            quantity,
            price: Some("19.99".into()),
        }
    }

    /// SKU A-1: stock 5+3 across two locations, 2/day for the last 7 days.
    /// SKU B-2: stock 100, no sales. One skuless variant that must be skipped.
    fn shop_fixture() -> MemShop {
        let mut inventory = HashMap::new();
        inventory.insert(
            1,
            vec![level(Some(48123), 1, 5), level(Some(55001), 1, 100)],
        );
        inventory.insert(2, vec![level(Some(48123), 2, 3)]);
        let orders = (0..7)
            .map(|i| order(1000 + i, i, vec![line(Some("A-1"), 2)]))
            .collect();
        MemShop {
            products: vec![
                product(
                    11,
                    "Shirt",
                    vec![
                        variant(111, Some("A-1"), Some("gid://shop/InventoryItem/48123")),
                        variant(112, None, None),
                    ],
                ),
                product(
                    22,
                    "Mug",
                    vec![variant(221, Some("B-2"), Some("gid://shop/InventoryItem/55001"))],
                ),
            ],
            locations: vec![
                Location {
                    id: 1,
                    name: Some("Main".into()),
                },
                Location {
                    id: 2,
                    name: Some("Overflow".into()),
                },
            ],
            inventory,
            orders,
            ..MemShop::default()
        }
    }

    #[tokio::test]
    async fn full_run_persists_and_rolls_up() {
        let shop = shop_fixture();
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.products, 2);
        assert_eq!(summary.inventory_levels, 3);
        assert_eq!(summary.orders, 7);
        assert_eq!(summary.line_items, 7);
        assert_eq!(summary.metrics, 2);

        // A-1: 23 dead days then 2/day for 7 days
        let a1 = store.metric("A-1").unwrap();
        assert!((a1.rolling_30 - 14.0 / 30.0).abs() < 1e-12);
        assert!((a1.rolling_7 - 2.0).abs() < 1e-12);
        assert_eq!(a1.daily_sales, 2);
        assert_eq!(a1.current_stock, 8);
        // 8 / 0.4667 is over the 14-day threshold: no alert
        assert!(a1.days_of_cover.unwrap() > RESTOCK_COVER_DAYS);

        // B-2: zero demand means undefined cover, never an alert
        let b2 = store.metric("B-2").unwrap();
        assert_eq!(b2.rolling_30, 0.0);
        assert_eq!(b2.days_of_cover, None);
        assert_eq!(b2.current_stock, 100);

        assert!(notifier.alerts.lock().unwrap().is_empty());
        assert_eq!(summary.alerts, 0);

        let run = store.last_sync_run().await.unwrap().unwrap();
        assert_eq!(run.status, "ok");
        assert_eq!(run.products, 2);
    }

    #[tokio::test]
    async fn rerun_over_same_payloads_is_idempotent() {
        let shop = shop_fixture();
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();
        let cfg = SyncConfig::default();

        run_sync(&shop, &store, &notifier, &cfg).await.unwrap();
        let counts_first = store.counts();
        let second = run_sync(&shop, &store, &notifier, &cfg).await.unwrap();

        assert_eq!(store.counts(), counts_first);
        // everything the second run saw was already stored
        assert_eq!(second.line_items, 0);
    }

    #[tokio::test]
    async fn repeat_sku_within_one_order_collapses_to_one_row() {
        let mut shop = shop_fixture();
        shop.orders = vec![order(
            3000,
            0,
            vec![line(Some("A-1"), 1), line(Some("A-1"), 4)],
        )];
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.line_items, 1);
        let lines = store.lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[&(3000, "A-1".to_string())].quantity, 1);
    }

    #[tokio::test]
    async fn overwritten_inventory_is_summed_fresh() {
        let mut shop = shop_fixture();
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();
        let cfg = SyncConfig::default();

        run_sync(&shop, &store, &notifier, &cfg).await.unwrap();
        assert_eq!(store.metric("A-1").unwrap().current_stock, 8);

        // location 1 restocks down to 2; total must become 2+3, not 8+5
        shop.inventory.insert(
            1,
            vec![level(Some(48123), 1, 2), level(Some(55001), 1, 100)],
        );
        run_sync(&shop, &store, &notifier, &cfg).await.unwrap();
        assert_eq!(store.metric("A-1").unwrap().current_stock, 5);
    }

    #[tokio::test]
    async fn orders_failure_degrades_to_zero_sales() {
        let mut shop = shop_fixture();
        shop.fail_orders = true;
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.orders, 0);
        let a1 = store.metric("A-1").unwrap();
        assert_eq!(a1.rolling_30, 0.0);
        assert_eq!(a1.days_of_cover, None);
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn locations_failure_degrades_stock_to_zero() {
        let mut shop = shop_fixture();
        shop.fail_locations = true;
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.inventory_levels, 0);
        assert_eq!(store.metric("A-1").unwrap().current_stock, 0);
    }

    #[tokio::test]
    async fn inventory_failure_degrades_stock_to_zero() {
        let mut shop = shop_fixture();
        shop.fail_inventory = true;
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.inventory_levels, 0);
        assert_eq!(store.metric("B-2").unwrap().current_stock, 0);
    }

    #[tokio::test]
    async fn product_fetch_failure_aborts_the_run() {
        let mut shop = shop_fixture();
        shop.fail_products = true;
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let result = run_sync(&shop, &store, &notifier, &SyncConfig::default()).await;

        assert!(result.is_err());
        assert_eq!(store.counts(), (0, 0, 0));
        let run = store.last_sync_run().await.unwrap().unwrap();
        assert_eq!(run.status, "failed");
        assert!(run.error.is_some());
    }

    #[tokio::test]
    async fn low_cover_triggers_a_restock_alert() {
        let mut shop = shop_fixture();
        // 2/day across the whole 30-day window; stock 10 -> 5 days of cover
        shop.orders = (0..30)
            .map(|i| order(4000 + i, i, vec![line(Some("A-1"), 2)]))
            .collect();
        shop.inventory.insert(1, vec![level(Some(48123), 1, 10)]);
        shop.inventory.insert(2, vec![]);
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.alerts, 1);
        let alerts = notifier.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].sku, "A-1");
        assert_eq!(alerts[0].current_stock, 10);
        assert!((alerts[0].rolling_30 - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn alert_delivery_failure_never_fails_the_run() {
        let mut shop = shop_fixture();
        shop.orders = (0..30)
            .map(|i| order(4000 + i, i, vec![line(Some("A-1"), 2)]))
            .collect();
        shop.inventory.insert(1, vec![level(Some(48123), 1, 10)]);
        shop.inventory.insert(2, vec![]);
        let store = MemStore::default();
        let notifier = RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        };

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        assert_eq!(summary.alerts, 1);
        assert_eq!(store.last_sync_run().await.unwrap().unwrap().status, "ok");
    }

    #[tokio::test]
    async fn payload_sku_fallback_backfills_the_mapping() {
        let mut shop = shop_fixture();
        // E-5 has no stored inventory-item mapping; the payload embeds the SKU
        shop.products.push(product(33, "Hat", vec![variant(331, Some("E-5"), None)]));
        shop.inventory.insert(
            2,
            vec![InventoryLevel {
                inventory_item_id: Some(777),
                location_id: 2,
                available: Some(4),
                updated_at: None,
                sku: Some("E-5".into()),
            }],
        );
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        let inventory = store.inventory.lock().unwrap();
        assert_eq!(inventory[&("E-5".to_string(), 2)].available, 4);
        drop(inventory);
        assert_eq!(store.product("E-5").unwrap().inventory_item_id, Some(777));
    }

    #[tokio::test]
    async fn unmapped_levels_without_payload_sku_are_skipped() {
        let mut shop = shop_fixture();
        shop.inventory
            .get_mut(&1)
            .unwrap()
            .push(level(Some(999999), 1, 50));
        let store = MemStore::default();
        let notifier = RecordingNotifier::default();

        let summary = run_sync(&shop, &store, &notifier, &SyncConfig::default())
            .await
            .unwrap();

        // the orphan level contributes nothing
        assert_eq!(summary.inventory_levels, 3);
    }
}
