//! Cart and product endpoints
//!
//! Order creation runs alongside the live stream and never touches the
//! roster collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::error::{FetchError, FetchResult};
use super::fetch::{fetch_json, Fetch, FetchRequest};
use super::{CART_CREATE, CART_PRODUCT, CART_PRODUCTS_BULK, PRODUCT_LIST};
use crate::model::{Page, PersonId, MAX_PAGE_SIZE};

/// Most cart products accepted by one bulk request
pub const MAX_BULK_CART_PRODUCTS: usize = 100;

/// Request body for a new cart
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewCart {
    pub person: PersonId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_number: Option<u32>,
}

/// A created cart
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cart {
    pub id: Uuid,
    #[serde(default)]
    pub person: Option<PersonId>,
    #[serde(default)]
    pub table_number: Option<u32>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Fields not modelled here
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// Request body linking a product to a cart
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewCartProduct {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<Uuid>,
    pub cart: Uuid,
    pub product: Uuid,
}

/// A cart/product link
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartProduct {
    pub id: Uuid,
    #[serde(default)]
    pub organization: Option<Uuid>,
    pub cart: Uuid,
    pub product: Uuid,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Response of a bulk cart product creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BulkCartProducts {
    pub created_count: usize,
    #[serde(default)]
    pub cart_products: Vec<CartProduct>,
}

/// A sellable product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
}

#[derive(Serialize)]
struct BulkRequest<'a> {
    cart_products: &'a [NewCartProduct],
}

/// Client for cart and product endpoints
#[derive(Clone)]
pub struct OrdersApi {
    fetch: Arc<dyn Fetch>,
}

impl OrdersApi {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    pub async fn create_cart(&self, cart: &NewCart) -> FetchResult<Cart> {
        let request = FetchRequest::post(CART_CREATE).json(cart)?;
        let created: Cart = fetch_json(self.fetch.as_ref(), request).await?;
        tracing::info!(cart_id = %created.id, person_id = %cart.person, "Cart created");
        Ok(created)
    }

    pub async fn add_cart_product(&self, item: &NewCartProduct) -> FetchResult<CartProduct> {
        let request = FetchRequest::post(CART_PRODUCT).json(item)?;
        fetch_json(self.fetch.as_ref(), request).await
    }

    /// Link several products at once
    ///
    /// Validated locally first: 1 to 100 items, no repeated cart/product pair.
    pub async fn add_cart_products_bulk(
        &self,
        items: &[NewCartProduct],
    ) -> FetchResult<BulkCartProducts> {
        validate_bulk(items)?;
        let request = FetchRequest::post(CART_PRODUCTS_BULK).json(&BulkRequest {
            cart_products: items,
        })?;
        fetch_json(self.fetch.as_ref(), request).await
    }

    /// First page of the product catalogue
    pub async fn list_products(&self, page_size: u32) -> FetchResult<Vec<Product>> {
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let request = FetchRequest::get(PRODUCT_LIST).param("page_size", page_size);
        let value = self.fetch.fetch(request).await?;
        let page: Page<Product> = Page::from_value(value, 1, page_size)?;
        Ok(page.results)
    }
}

fn validate_bulk(items: &[NewCartProduct]) -> FetchResult<()> {
    if items.is_empty() || items.len() > MAX_BULK_CART_PRODUCTS {
        return Err(FetchError::InvalidRequest(format!(
            "bulk request needs 1 to {} items, got {}",
            MAX_BULK_CART_PRODUCTS,
            items.len()
        )));
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert((item.cart, item.product)) {
            return Err(FetchError::InvalidRequest(format!(
                "duplicate cart={} product={}",
                item.cart, item.product
            )));
        }
    }
    Ok(())
}
