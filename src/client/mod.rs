//! Backend REST client
//!
//! The `Fetch` trait is the seam between roster logic and HTTP. `HttpClient`
//! is the reqwest implementation; the `*Api` services wrap it with typed
//! requests for each endpoint group.

mod error;
mod fetch;
mod http;
pub mod orders;
pub mod persons;
pub mod statistics;

pub use error::{FetchError, FetchResult};
pub use fetch::{fetch_json, Fetch, FetchRequest, Method};
pub use http::HttpClient;
pub use orders::OrdersApi;
pub use persons::PersonsApi;
pub use statistics::StatisticsApi;

// Paths relative to the REST root (`{base_url}/api/`)
pub const PERSON_LIST: &str = "client/persons/";
pub const PERSON_DETAIL: &str = "client/person/{id}/";
pub const PERSON_DETAIL_WITH_CARTS: &str = "client/person/{id}/detail/";
pub const PERSON_SUMMARY: &str = "client/person/{id}/summary/";
pub const PERSON_ORDERS: &str = "client/person/{id}/orders/";
pub const CART_CREATE: &str = "client/cart/";
pub const CART_PRODUCT: &str = "client/cart-product/";
pub const CART_PRODUCTS_BULK: &str = "client/cart-products/bulk/";
pub const PRODUCT_LIST: &str = "client/products/";
pub const STATISTICS_VISIT_COUNT: &str = "client/statistics/visit-count/";
pub const STATISTICS_BODY_TYPE: &str = "client/statistics/body-type/";
pub const STATISTICS_GENDER: &str = "client/statistics/gender/";
pub const STATISTICS_EMOTION: &str = "client/statistics/emotion/";
pub const STATISTICS_AGE: &str = "client/statistics/age/";
