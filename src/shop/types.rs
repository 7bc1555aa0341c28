//! Wire types for the storefront platform's admin REST API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ProductsResponse {
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub image: Option<ProductImage>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductImage {
    #[serde(default)]
    pub src: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductVariant {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    /// Absent or empty SKUs are skipped during sync, not treated as errors.
    #[serde(default)]
    pub sku: Option<String>,
    /// Decimal string, e.g. "19.99".
    #[serde(default)]
    pub price: Option<String>,
    /// Platform-internal inventory item reference,
    /// e.g. "gid://shop/InventoryItem/48123". The trailing numeric component
    /// is the key inventory payloads are joined on.
    #[serde(default)]
    pub inventory_item_gid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationsResponse {
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Location {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InventoryLevelsResponse {
    pub inventory_levels: Vec<InventoryLevel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryLevel {
    #[serde(default)]
    pub inventory_item_id: Option<i64>,
    pub location_id: i64,
    #[serde(default)]
    pub available: Option<i64>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Some payloads embed the SKU directly; used as fallback when the
    /// inventory item mapping is not stored yet.
    #[serde(default)]
    pub sku: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrdersResponse {
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Order {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub line_items: Vec<OrderLineItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineItem {
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: i64,
    #[serde(default)]
    pub price: Option<String>,
}
