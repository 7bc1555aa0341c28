use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;

use crate::shop::types::{
    InventoryLevel, InventoryLevelsResponse, Location, LocationsResponse, Order, OrdersResponse,
    Product, ProductsResponse,
};
use crate::shop::ShopApi;
use crate::sync::paginate::Page;
use crate::util::env::{env_opt, env_parse, env_req, init_env};

/// Client for the storefront platform's admin REST API.
#[derive(Clone)]
pub struct ShopClient {
    http: Client,
    base: url::Url,
    token: String,
}

impl ShopClient {
    pub fn from_env() -> Result<Self> {
        init_env();
        let domain = env_req("SHOP_DOMAIN")?;
        let token = env_req("SHOP_API_TOKEN")?;
        let version = env_opt("SHOP_API_VERSION").unwrap_or_else(|| "2024-10".into());
        let timeout_secs: u64 = env_parse("SHOP_HTTP_TIMEOUT_SECS", 30u64);
        Self::new(
            &format!("https://{domain}/admin/api/{version}/"),
            &token,
            Duration::from_secs(timeout_secs),
        )
    }

    pub fn new(base: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        let base = url::Url::parse(base).context("invalid shop base url")?;
        Ok(Self {
            http,
            base,
            token: token.to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        op: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<(T, HeaderMap)> {
        let mut url = self
            .base
            .join(path)
            .with_context(|| format!("{op}: invalid path {path}"))?;
        for (k, v) in query {
            url.query_pairs_mut().append_pair(k, v);
        }
        let resp = self
            .http
            .get(url.clone())
            .header("X-Shop-Access-Token", &self.token)
            .send()
            .await
            .with_context(|| format!("{op}: request to {url} failed"))?;
        let status = resp.status();
        let headers = resp.headers().clone();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("{op}: {url} returned {status}: {body}");
        }
        let parsed = resp
            .json::<T>()
            .await
            .with_context(|| format!("{op}: invalid response body"))?;
        Ok((parsed, headers))
    }
}

#[async_trait]
impl ShopApi for ShopClient {
    async fn products_page(
        &self,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Page<Product, i64>> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(id) = since_id {
            query.push(("since_id", id.to_string()));
        }
        let (body, _) = self
            .get_json::<ProductsResponse>("products.fetch", "products.json", &query)
            .await?;
        let next = next_since_id(&body.products, limit, |p| p.id);
        Ok(Page {
            items: body.products,
            next,
        })
    }

    async fn locations(&self) -> Result<Vec<Location>> {
        let (body, _) = self
            .get_json::<LocationsResponse>("locations.fetch", "locations.json", &[])
            .await?;
        Ok(body.locations)
    }

    async fn inventory_page(
        &self,
        location_id: i64,
        page_info: Option<String>,
        limit: u32,
    ) -> Result<Page<InventoryLevel, String>> {
        let mut query = vec![("limit", limit.to_string())];
        match page_info {
            // Continuation requests must not repeat filter params; the
            // page_info token carries them.
            Some(token) => query.push(("page_info", token)),
            None => query.push(("location_ids", location_id.to_string())),
        }
        let (body, headers) = self
            .get_json::<InventoryLevelsResponse>(
                "inventory.fetch",
                "inventory_levels.json",
                &query,
            )
            .await?;
        let next = next_page_info(&headers);
        Ok(Page {
            items: body.inventory_levels,
            next,
        })
    }

    async fn orders_page(
        &self,
        created_min: DateTime<Utc>,
        since_id: Option<i64>,
        limit: u32,
    ) -> Result<Page<Order, i64>> {
        let mut query = vec![
            ("limit", limit.to_string()),
            ("status", "any".to_string()),
            ("created_at_min", created_min.to_rfc3339()),
        ];
        if let Some(id) = since_id {
            query.push(("since_id", id.to_string()));
        }
        let (body, _) = self
            .get_json::<OrdersResponse>("orders.fetch", "orders.json", &query)
            .await?;
        let next = next_since_id(&body.orders, limit, |o| o.id);
        Ok(Page {
            items: body.orders,
            next,
        })
    }
}

/// Continuation for `since_id` walks: a short page means the sequence is
/// exhausted; a full page continues from its last id.
fn next_since_id<T>(items: &[T], limit: u32, id: impl Fn(&T) -> i64) -> Option<i64> {
    if items.len() < limit as usize {
        None
    } else {
        items.last().map(id)
    }
}

fn next_page_info(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(reqwest::header::LINK)?.to_str().ok()?;
    parse_link_next(raw)
}

/// Extract the `page_info` token for rel="next" from a Link header, e.g.
/// `<https://x/inventory_levels.json?limit=250&page_info=abc>; rel="next"`.
fn parse_link_next(raw: &str) -> Option<String> {
    for part in raw.split(',') {
        let part = part.trim();
        if !part.contains(r#"rel="next""#) {
            continue;
        }
        let start = part.find('<')? + 1;
        let end = part.find('>')?;
        let url = url::Url::parse(part.get(start..end)?).ok()?;
        for (k, v) in url.query_pairs() {
            if k == "page_info" {
                return Some(v.into_owned());
            }
        }
    }
    None
}
