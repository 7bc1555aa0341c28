pub mod client;
pub mod types;

pub use client::ShopClient;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::sync::paginate::Page;
use types::{InventoryLevel, Location, Order, Product};

/// Remote platform surface the sync routine drives. The HTTP client
/// implements it for real; tests inject an in-memory fake.
#[async_trait]
pub trait ShopApi: Send + Sync {
    /// One page of the product catalog, walked by `since_id` cursor.
    async fn products_page(&self, since_id: Option<i64>, limit: u32)
        -> Result<Page<Product, i64>>;

    async fn locations(&self) -> Result<Vec<Location>>;

    /// One page of inventory levels for a location; continuation is the
    /// `page_info` token from the response's Link header.
    async fn inventory_page(
        &self,
        location_id: i64,
        page_info: Option<String>,
        limit: u32,
    ) -> Result<Page<InventoryLevel, String>>;

    /// One page of orders created at or after `created_min`.
    async fn orders_page(
        &self,
        created_min: DateTime<Utc>,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Page<Order, i64>>;
}
