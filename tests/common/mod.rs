//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog_sync::application::executor::QueryExecutor;
use catalog_sync::application::mutations::MutationDispatcher;
use catalog_sync::cache::ResourceCache;
use catalog_sync::infra::transport::{ClientError, Transport};
use reqwest::Method;
use serde_json::{Value, json};

pub fn product(id: &str, category: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "description": "A product used in tests",
        "images": ["https://img.example/p.png"],
        "price": 9.5,
        "slug": format!("p-{id}"),
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z",
        "category": {"id": category, "name": category, "createdAt": "2024-01-01T00:00:00Z"}
    })
}

struct Route {
    method: Method,
    fragment: String,
    delay: Duration,
    body: Value,
}

/// In-process API: the first route whose method matches and whose fragment
/// occurs in the request path answers, after its delay. Unmatched requests
/// fail with a 404.
#[derive(Default)]
pub struct ScriptedApi {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, method: Method, fragment: &str, delay: Duration, body: Value) {
        self.routes.lock().expect("routes").push(Route {
            method,
            fragment: fragment.to_string(),
            delay,
            body,
        });
    }

    pub fn get(&self, fragment: &str, delay_ms: u64, body: Value) {
        self.route(Method::GET, fragment, Duration::from_millis(delay_ms), body);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.contains(fragment))
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedApi {
    async fn send(
        &self,
        method: Method,
        path: &str,
        _body: Option<Value>,
    ) -> Result<Value, ClientError> {
        self.calls
            .lock()
            .expect("calls")
            .push(format!("{method} {path}"));
        let answer = self
            .routes
            .lock()
            .expect("routes")
            .iter()
            .find(|route| route.method == method && path.contains(&route.fragment))
            .map(|route| (route.delay, route.body.clone()));

        match answer {
            Some((delay, body)) => {
                tokio::time::sleep(delay).await;
                Ok(body)
            }
            None => Err(ClientError::Http {
                status: 404,
                body: format!("no route for {method} {path}"),
            }),
        }
    }

    fn set_token(&self, _token: Option<String>) {}

    fn has_token(&self) -> bool {
        true
    }
}

pub struct Services {
    pub api: Arc<ScriptedApi>,
    pub cache: Arc<ResourceCache>,
    pub executor: QueryExecutor,
    pub mutations: MutationDispatcher,
}

pub fn services(api: Arc<ScriptedApi>) -> Services {
    let cache = Arc::new(ResourceCache::default());
    let transport: Arc<dyn Transport> = api.clone();
    Services {
        executor: QueryExecutor::new(Arc::clone(&cache), Arc::clone(&transport)),
        mutations: MutationDispatcher::new(Arc::clone(&cache), transport),
        api,
        cache,
    }
}
