use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ConsoleError;
use crate::models::driver::NearbyDriver;
use crate::models::ingest::{RawDriverCandidate, RawOrder, normalize_candidate, normalize_order};
use crate::models::order::{GeoPoint, Order, Priority, ServiceKind};
use crate::transport::{
    AssignReceipt, CancelReceipt, DataSource, OrderFilters, OrderTransport, Page, Sourced,
    total_pages,
};

pub struct HttpTransport {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self, ConsoleError> {
        let client = Client::builder()
            .timeout(config.api_timeout())
            .build()
            .map_err(|err| ConsoleError::Internal(format!("http client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ConsoleError> {
        let request = self.authorize(self.client.get(self.url(path)).query(query));
        let response = request.send().await?;
        Self::read_response(response).await
    }

    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ConsoleError> {
        let request = self.authorize(self.client.post(self.url(path)).json(body));
        let response = request.send().await?;
        Self::read_response(response).await
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ConsoleError> {
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED => ConsoleError::Unauthorized,
                StatusCode::FORBIDDEN => ConsoleError::Forbidden(message),
                StatusCode::NOT_FOUND => ConsoleError::NotFound(message),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    ConsoleError::Validation(message)
                }
                _ => ConsoleError::Upstream {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        response.json().await.map_err(Into::into)
    }
}

#[async_trait]
impl OrderTransport for HttpTransport {
    async fn list_orders(&self, filters: &OrderFilters) -> Result<Page<Order>, ConsoleError> {
        debug!(page = filters.page, "listing orders");
        let query = filter_query(filters);
        let raw: RawPage = self.get_json("orders", &query).await?;
        Ok(normalize_page(raw, filters))
    }

    async fn get_order(&self, id: Uuid) -> Result<Sourced<Order>, ConsoleError> {
        let raw: RawOrder = self.get_json(&format!("orders/{id}"), &[]).await?;
        Ok(Sourced::backend(normalize_order(raw)))
    }

    async fn assign_order(
        &self,
        order_id: Uuid,
        driver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        let body = AssignBody {
            order_ids: None,
            driver_id,
            notes: notes.map(str::to_string),
        };
        let ack: AssignAck = self
            .post_json(&format!("orders/{order_id}/assign"), &body)
            .await?;

        Ok(AssignReceipt {
            order_ids: vec![order_id],
            driver_id,
            assigned_at: ack.assigned_at.unwrap_or_else(Utc::now),
        })
    }

    async fn assign_bulk(
        &self,
        order_ids: &[Uuid],
        driver_id: Uuid,
        notes: Option<&str>,
    ) -> Result<AssignReceipt, ConsoleError> {
        let body = AssignBody {
            order_ids: Some(order_ids.to_vec()),
            driver_id,
            notes: notes.map(str::to_string),
        };
        let ack: AssignAck = self.post_json("orders/assign", &body).await?;

        Ok(AssignReceipt {
            order_ids: order_ids.to_vec(),
            driver_id,
            assigned_at: ack.assigned_at.unwrap_or_else(Utc::now),
        })
    }

    async fn cancel_order(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        let body = CancelBody {
            order_ids: None,
            reason: reason.to_string(),
        };
        let ack: CancelAck = self
            .post_json(&format!("orders/{order_id}/cancel"), &body)
            .await?;

        Ok(CancelReceipt {
            order_ids: vec![order_id],
            reason: reason.to_string(),
            cancelled_at: ack.cancelled_at.unwrap_or_else(Utc::now),
        })
    }

    async fn cancel_bulk(
        &self,
        order_ids: &[Uuid],
        reason: &str,
    ) -> Result<CancelReceipt, ConsoleError> {
        let body = CancelBody {
            order_ids: Some(order_ids.to_vec()),
            reason: reason.to_string(),
        };
        let ack: CancelAck = self.post_json("orders/cancel", &body).await?;

        Ok(CancelReceipt {
            order_ids: order_ids.to_vec(),
            reason: reason.to_string(),
            cancelled_at: ack.cancelled_at.unwrap_or_else(Utc::now),
        })
    }

    async fn nearby_drivers(
        &self,
        order_id: Uuid,
        _pickup: GeoPoint,
        radius_m: f64,
        limit: usize,
    ) -> Result<Sourced<Vec<NearbyDriver>>, ConsoleError> {
        let query = [
            ("radius_m", radius_m.to_string()),
            ("limit", limit.to_string()),
        ];
        let raw: RawCandidates = self
            .get_json(&format!("orders/{order_id}/nearby-drivers"), &query)
            .await?;

        Ok(Sourced::backend(
            raw.drivers.into_iter().map(normalize_candidate).collect(),
        ))
    }
}

fn filter_query(filters: &OrderFilters) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("page", filters.page.to_string()),
        ("page_size", filters.page_size.to_string()),
    ];

    for status in &filters.statuses {
        query.push(("status", status.label().to_string()));
    }
    for service in &filters.services {
        query.push(("service", service_label(*service).to_string()));
    }
    for priority in &filters.priorities {
        query.push(("priority", priority_label(*priority).to_string()));
    }
    if let Some(from) = filters.from {
        query.push(("from", from.to_rfc3339()));
    }
    if let Some(to) = filters.to {
        query.push(("to", to.to_rfc3339()));
    }
    if let Some(search) = &filters.search {
        query.push(("search", search.clone()));
    }

    query
}

fn service_label(service: ServiceKind) -> &'static str {
    match service {
        ServiceKind::Ride => "ride",
        ServiceKind::Delivery => "delivery",
    }
}

fn priority_label(priority: Priority) -> &'static str {
    match priority {
        Priority::Normal => "normal",
        Priority::High => "high",
        Priority::Urgent => "urgent",
    }
}

fn normalize_page(raw: RawPage, filters: &OrderFilters) -> Page<Order> {
    let items: Vec<Order> = raw.items.into_iter().map(normalize_order).collect();
    let total = raw.total.unwrap_or(items.len() as u64);
    let page = raw.page.unwrap_or(filters.page);
    let page_size = raw.page_size.unwrap_or(filters.page_size);
    let pages = raw
        .total_pages
        .unwrap_or_else(|| total_pages(total, page_size));

    Page {
        items,
        total,
        page,
        page_size,
        total_pages: pages,
        source: DataSource::Backend,
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawPage {
    #[serde(alias = "orders", alias = "data", alias = "results")]
    items: Vec<RawOrder>,
    #[serde(alias = "totalCount", alias = "count")]
    total: Option<u64>,
    #[serde(alias = "pageNumber", alias = "currentPage")]
    page: Option<u32>,
    #[serde(alias = "pageSize", alias = "perPage")]
    page_size: Option<u32>,
    #[serde(alias = "totalPages")]
    total_pages: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCandidates {
    #[serde(alias = "items", alias = "data")]
    drivers: Vec<RawDriverCandidate>,
}

#[derive(Debug, Serialize)]
struct AssignBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    order_ids: Option<Vec<Uuid>>,
    driver_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

#[derive(Debug, Serialize)]
struct CancelBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    order_ids: Option<Vec<Uuid>>,
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssignAck {
    #[serde(alias = "assignedAt")]
    assigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CancelAck {
    #[serde(alias = "cancelledAt", alias = "canceledAt")]
    cancelled_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RawPage, filter_query, normalize_page};
    use crate::models::order::OrderStatus;
    use crate::transport::{DataSource, OrderFilters};

    #[test]
    fn page_math_falls_back_to_requested_values() {
        let raw: RawPage = serde_json::from_value(json!({
            "orders": [],
            "totalCount": 50
        }))
        .expect("raw page parses");

        let filters = OrderFilters::default().with_page(2);
        let page = normalize_page(raw, &filters);

        assert_eq!(page.total, 50);
        assert_eq!(page.page, 2);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.source, DataSource::Backend);
    }

    #[test]
    fn missing_total_counts_the_items_on_hand() {
        let raw: RawPage = serde_json::from_value(json!({
            "items": [{ "orderId": uuid::Uuid::from_u128(1), "status": "Pending" }]
        }))
        .expect("raw page parses");

        let page = normalize_page(raw, &OrderFilters::default());

        assert_eq!(page.total, 1);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.items[0].status, OrderStatus::Pending);
    }

    #[test]
    fn filter_query_repeats_multi_value_keys() {
        let filters = OrderFilters {
            statuses: vec![OrderStatus::Searching, OrderStatus::Assigned],
            search: Some("ada".to_string()),
            ..OrderFilters::default()
        };

        let query = filter_query(&filters);

        let statuses: Vec<&str> = query
            .iter()
            .filter(|(k, _)| *k == "status")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(statuses, vec!["Searching", "Assigned"]);
        assert!(query.contains(&("search", "ada".to_string())));
        assert!(query.contains(&("page", "1".to_string())));
    }
}
