//! Product writes and the cache invalidation that follows them.

use std::sync::Arc;

use catalog_api_types::{Product, UpdateProductRequest};
use metrics::counter;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheEvent, EventKind, InvalidationPlan, ResourceCache};
use crate::infra::transport::{ClientError, Transport, decode};

use super::error::AppError;
use super::validation::{ProductForm, validate_update};

const PRODUCTS_PATH: &str = "/products";
const METRIC_MUTATION: &str = "catalog_mutation_total";

/// Performs create/update/delete and invalidates affected tags on success.
///
/// A failed write leaves the cache untouched.
#[derive(Clone)]
pub struct MutationDispatcher {
    cache: Arc<ResourceCache>,
    transport: Arc<dyn Transport>,
}

impl MutationDispatcher {
    pub fn new(cache: Arc<ResourceCache>, transport: Arc<dyn Transport>) -> Self {
        Self { cache, transport }
    }

    pub async fn create(&self, form: &ProductForm) -> Result<Product, AppError> {
        let request = form.validate()?;
        let body = to_body(&request)?;
        let value = self
            .write("create", Method::POST, PRODUCTS_PATH, Some(body))
            .await?;

        let id = value
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.invalidate(EventKind::ProductCreated { id });
        Ok(decode(value)?)
    }

    pub async fn update(
        &self,
        id: &str,
        request: &UpdateProductRequest,
    ) -> Result<Product, AppError> {
        validate_update(request)?;
        let body = to_body(request)?;
        let path = format!("{PRODUCTS_PATH}/{id}");
        let value = self.write("update", Method::PUT, &path, Some(body)).await?;

        let slug = value
            .get("slug")
            .and_then(Value::as_str)
            .map(str::to_string);
        self.invalidate(EventKind::ProductUpdated {
            id: id.to_string(),
            slug,
        });
        Ok(decode(value)?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), AppError> {
        let path = format!("{PRODUCTS_PATH}/{id}");
        self.write("delete", Method::DELETE, &path, None).await?;
        self.invalidate(EventKind::ProductDeleted { id: id.to_string() });
        Ok(())
    }

    async fn write(
        &self,
        op: &'static str,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ClientError> {
        match self.transport.send(method, path, body).await {
            Ok(value) => {
                counter!(METRIC_MUTATION, "op" => op, "outcome" => "ok").increment(1);
                Ok(value)
            }
            Err(err) => {
                counter!(METRIC_MUTATION, "op" => op, "outcome" => "error").increment(1);
                warn!(op, path, error = %err, "Product write failed");
                Err(err)
            }
        }
    }

    fn invalidate(&self, kind: EventKind) {
        let event = CacheEvent::new(kind);
        info!(event_id = %event.id, kind = ?event.kind, "Product write committed");
        let plan = InvalidationPlan::from_events([event]);
        let affected = self.cache.apply(&plan);
        debug!(%plan, affected, "Invalidated cached reads");
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, ClientError> {
    serde_json::to_value(value).map_err(|err| ClientError::Decode(err.to_string()))
}
