#![deny(clippy::all, clippy::pedantic)]

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use httpmock::MockServer;
use serde_json::json;

use catalog_sync::application::auth::{CredentialStore, Credentials};
use catalog_sync::application::error::AppError;
use catalog_sync::config::Settings;
use catalog_sync::infra::credentials::MemoryCredentialStore;
use catalog_sync::infra::transport::ApiClient;

use crate::args::{CategoriesCmd, Cli, Commands, ProductsCmd};
use crate::client::{CliError, Ctx};
use crate::handlers::{auth, categories, products};

fn signed_in() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with(Credentials {
        token: "secret".into(),
        email: "me@example.com".into(),
    }))
}

fn ctx(server: &MockServer, store: Arc<MemoryCredentialStore>) -> Ctx {
    let settings = Settings::defaults().expect("default settings");
    let api = ApiClient::new(&server.base_url(), Duration::from_secs(5)).expect("client");
    Ctx::new(settings, Arc::new(api), store).expect("ctx")
}

fn product(id: &str, category: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "description": "A product used in tests",
        "images": ["https://img.example/p.png"],
        "price": 12.5,
        "slug": format!("product-{id}"),
        "createdAt": "2024-01-01T00:00:00Z",
        "updatedAt": "2024-01-01T00:00:00Z",
        "category": {"id": category, "name": category, "createdAt": "2024-01-01T00:00:00Z"}
    })
}

#[test]
fn parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "catalog-cli",
        "products",
        "list",
        "--category",
        "c1",
        "--page-size",
        "5",
    ])
    .expect("parse");
    assert_eq!(cli.config.page_size, Some(5));
    let Commands::Products(args) = cli.command else {
        panic!("expected products command");
    };
    let ProductsCmd::List { category, page, .. } = args.action else {
        panic!("expected list action");
    };
    assert_eq!(category.as_deref(), Some("c1"));
    assert_eq!(page, 1);
}

#[tokio::test]
async fn protected_commands_require_a_session() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET").path("/categories");
        then.status(200).body("[]");
    });
    let ctx = ctx(&server, Arc::new(MemoryCredentialStore::new()));

    let err = categories::handle(
        &ctx,
        CategoriesCmd::List {
            offset: 0,
            limit: None,
        },
    )
    .await
    .expect_err("anonymous");
    assert!(matches!(err, CliError::App(AppError::Unauthenticated)));
    mock.assert_calls(0);
}

#[tokio::test]
async fn categories_list_sends_token_and_limit() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/categories")
            .query_param("offset", "0")
            .query_param("limit", "100")
            .header("authorization", "Bearer secret");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"id":"c1","name":"Lighting","createdAt":"2024-01-01T00:00:00Z"}]"#);
    });
    let ctx = ctx(&server, signed_in());

    categories::handle(
        &ctx,
        CategoriesCmd::List {
            offset: 0,
            limit: None,
        },
    )
    .await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn products_list_forwards_page_and_category() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/products")
            .query_param("offset", "20")
            .query_param("limit", "20")
            .query_param("categoryId", "c1");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([product("1", "c1")]));
    });
    let ctx = ctx(&server, signed_in());

    products::list(&ctx, None, Some("c1".into()), 2).await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn products_search_narrows_by_category() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/products/search")
            .query_param("searchedText", "lamp");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!([product("1", "c1"), product("2", "c2")]));
    });
    let ctx = ctx(&server, signed_in());

    products::list(&ctx, Some("lamp".into()), Some("c2".into()), 1).await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn products_list_surfaces_server_errors() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/products");
        then.status(500).body("boom");
    });
    let ctx = ctx(&server, signed_in());

    let err = products::list(&ctx, None, None, 1)
        .await
        .expect_err("server error");
    assert!(matches!(err, CliError::App(AppError::Query(ref info)) if info.status == Some(500)));
}

#[tokio::test]
async fn delete_hits_endpoint() -> Result<(), CliError> {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("DELETE").path("/products/42");
        then.status(200).body("");
    });
    let ctx = ctx(&server, signed_in());

    products::handle(&ctx, ProductsCmd::Delete { id: "42".into() }).await?;
    mock.assert();
    Ok(())
}

#[tokio::test]
async fn login_then_logout_round_trips_the_store() -> Result<(), CliError> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/auth");
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"token":"fresh"}"#);
    });
    let store = Arc::new(MemoryCredentialStore::new());
    let ctx = ctx(&server, Arc::clone(&store));

    auth::login(&ctx, "me@example.com").await?;
    assert_eq!(
        store.load()?.map(|c| c.token),
        Some("fresh".to_string())
    );

    auth::logout(&ctx)?;
    assert!(store.load()?.is_none());
    Ok(())
}
