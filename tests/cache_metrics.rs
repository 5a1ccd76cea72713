mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use catalog_sync::application::catalog::{GetProduct, ListProducts};
use catalog_sync::application::executor::{Query, QueryExecutor};
use catalog_sync::application::mutations::MutationDispatcher;
use catalog_sync::cache::{CacheConfig, ResourceCache, ResourceKind, Tag};
use catalog_sync::infra::telemetry::describe_metrics;
use catalog_sync::infra::transport::Transport;
use metrics_util::debugging::DebuggingRecorder;
use reqwest::Method;
use serde_json::json;
use serial_test::serial;

use common::{ScriptedApi, product};

#[tokio::test]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    describe_metrics();

    let api = ScriptedApi::new();
    api.get("/products?", 1, json!([product("1", "c1")]));
    api.get("/products/p-1", 1, product("1", "c1"));
    api.route(
        Method::DELETE,
        "/products/1",
        Duration::from_millis(1),
        serde_json::Value::Null,
    );
    let transport: Arc<dyn Transport> = api.clone();
    let cache = Arc::new(ResourceCache::new(CacheConfig {
        max_entries: 1,
        ..Default::default()
    }));
    let executor = QueryExecutor::new(Arc::clone(&cache), Arc::clone(&transport));
    let mutations = MutationDispatcher::new(Arc::clone(&cache), transport);

    // miss, fetch, then hit
    let list = ListProducts::page(1, 20, None);
    executor.ensure(list.clone()).await;
    executor.ensure(list.clone()).await;

    // coalesced
    tokio::join!(executor.execute(list.clone()), executor.execute(list.clone()));

    // failed fetch
    executor
        .execute(GetProduct {
            slug: "missing".into(),
        })
        .await;

    // eviction past the one-entry cap
    executor.execute(GetProduct { slug: "p-1".into() }).await;
    assert!(cache.len() <= 2);

    // invalidation through a write
    let _observer = executor.subscribe(list.key());
    executor.execute(list.clone()).await;
    mutations.delete("1").await.expect("delete succeeds");
    assert!(cache.read(&list.key()).stale);
    assert!(cache.tags_for(&list.key()).contains(&Tag::list(ResourceKind::Product)));

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "catalog_cache_hit_total",
        "catalog_cache_miss_total",
        "catalog_cache_coalesced_total",
        "catalog_cache_evict_total",
        "catalog_cache_invalidated_total",
        "catalog_fetch_total",
        "catalog_fetch_error_total",
        "catalog_fetch_ms",
        "catalog_mutation_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
