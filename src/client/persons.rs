//! Person endpoints
//!
//! Listing, per-record update, and the read-only detail views the operator
//! opens from a roster card.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::{FetchError, FetchResult};
use super::fetch::{fetch_json, Fetch, FetchRequest};
use super::{PERSON_DETAIL, PERSON_DETAIL_WITH_CARTS, PERSON_LIST, PERSON_ORDERS, PERSON_SUMMARY};
use crate::model::{Page, Person, PersonId, PersonUpdate};

/// Client for the person endpoints
#[derive(Clone)]
pub struct PersonsApi {
    fetch: Arc<dyn Fetch>,
}

impl PersonsApi {
    pub fn new(fetch: Arc<dyn Fetch>) -> Self {
        Self { fetch }
    }

    /// Fetch one page of the person listing
    pub async fn list_page(&self, page: u32, page_size: u32) -> FetchResult<Page<Person>> {
        let request = list_request(page, page_size);
        let value = self.fetch.fetch(request).await?;
        Page::from_value(value, page, page_size).map_err(FetchError::from)
    }

    pub async fn get_person(&self, id: PersonId) -> FetchResult<Person> {
        fetch_json(self.fetch.as_ref(), FetchRequest::get(person_path(PERSON_DETAIL, id))).await
    }

    /// Partially update a person; returns the full updated record
    pub async fn update_person(&self, id: PersonId, update: &PersonUpdate) -> FetchResult<Person> {
        if update.is_empty() {
            return Err(FetchError::InvalidRequest("empty person update".to_string()));
        }

        let request = FetchRequest::put(person_path(PERSON_DETAIL, id)).json(update)?;
        let person: Person = fetch_json(self.fetch.as_ref(), request).await?;

        tracing::debug!(person_id = %person.id, "Person updated");
        Ok(person)
    }

    /// Order history of a person
    pub async fn order_history(&self, id: PersonId) -> FetchResult<OrderHistory> {
        fetch_json(self.fetch.as_ref(), FetchRequest::get(person_path(PERSON_ORDERS, id))).await
    }

    /// AI summary of a person's preferences (free-form JSON)
    pub async fn summary(&self, id: PersonId) -> FetchResult<Value> {
        self.fetch
            .fetch(FetchRequest::get(person_path(PERSON_SUMMARY, id)))
            .await
    }

    /// Person with carts and products (free-form JSON)
    pub async fn detail_with_carts(&self, id: PersonId) -> FetchResult<Value> {
        self.fetch
            .fetch(FetchRequest::get(person_path(PERSON_DETAIL_WITH_CARTS, id)))
            .await
    }
}

/// Listing request for one page
pub(crate) fn list_request(page: u32, page_size: u32) -> FetchRequest {
    FetchRequest::get(PERSON_LIST)
        .param("page", page)
        .param("page_size", page_size)
}

fn person_path(template: &str, id: PersonId) -> String {
    template.replace("{id}", &id.to_string())
}

/// Order history response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderHistory {
    pub person_id: PersonId,
    #[serde(default)]
    pub person_name: Option<String>,
    #[serde(default)]
    pub total_orders: u32,
    #[serde(default)]
    pub orders: Vec<OrderEntry>,
}

/// One past order (cart) of a person
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderEntry {
    pub cart_id: uuid::Uuid,
    #[serde(default)]
    pub cart_created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cart_updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub products: Vec<HashMap<String, Value>>,
    #[serde(default)]
    pub total_products: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::HttpClient;
    use crate::config::ApiConfig;

    fn api(server: &MockServer) -> PersonsApi {
        let config = ApiConfig {
            base_url: server.uri(),
            ..ApiConfig::default()
        };
        PersonsApi::new(Arc::new(HttpClient::new(&config).unwrap()))
    }

    #[test]
    fn test_person_path() {
        let id = Uuid::from_u128(1);
        assert_eq!(
            person_path(PERSON_DETAIL, id),
            format!("client/person/{}/", id)
        );
    }

    #[tokio::test]
    async fn test_list_page() {
        let server = MockServer::start().await;
        let id = Uuid::from_u128(7);
        Mock::given(method("GET"))
            .and(path("/api/client/persons/"))
            .and(query_param("page", "1"))
            .and(query_param("page_size", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 11,
                "total_pages": 2,
                "current_page": 1,
                "has_next": true,
                "results": [{"id": id.to_string(), "full_name": "Seven"}]
            })))
            .mount(&server)
            .await;

        let page = api(&server).list_page(1, 10).await.unwrap();
        assert_eq!(page.results[0].id, id);
        assert!(page.info.has_next);
        assert_eq!(page.info.total_pages, 2);
    }

    #[tokio::test]
    async fn test_update_person() {
        let server = MockServer::start().await;
        let id = Uuid::from_u128(3);
        Mock::given(method("PUT"))
            .and(path(format!("/api/client/person/{}/", id)))
            .and(body_json(json!({"full_name": "Grace", "age": 40})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": id.to_string(),
                "full_name": "Grace",
                "age": 40
            })))
            .expect(1)
            .mount(&server)
            .await;

        let update = PersonUpdate {
            full_name: Some("Grace".to_string()),
            age: Some(40),
            ..Default::default()
        };
        let person = api(&server).update_person(id, &update).await.unwrap();
        assert_eq!(person.full_name.as_deref(), Some("Grace"));
        assert_eq!(person.age, Some(40));
    }

    #[tokio::test]
    async fn test_empty_update_rejected_locally() {
        let server = MockServer::start().await;
        let err = api(&server)
            .update_person(Uuid::from_u128(1), &PersonUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_order_history() {
        let server = MockServer::start().await;
        let id = Uuid::from_u128(5);
        let cart = Uuid::from_u128(50);
        Mock::given(method("GET"))
            .and(path(format!("/api/client/person/{}/orders/", id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "person_id": id.to_string(),
                "person_name": "Five",
                "total_orders": 1,
                "orders": [{
                    "cart_id": cart.to_string(),
                    "cart_created_at": "2024-05-01T10:00:00Z",
                    "cart_updated_at": "2024-05-01T10:00:00Z",
                    "products": [{"name": "Tea"}],
                    "total_products": 1
                }]
            })))
            .mount(&server)
            .await;

        let history = api(&server).order_history(id).await.unwrap();
        assert_eq!(history.total_orders, 1);
        assert_eq!(history.orders[0].cart_id, cart);
        assert_eq!(history.orders[0].products[0]["name"], "Tea");
    }
}
