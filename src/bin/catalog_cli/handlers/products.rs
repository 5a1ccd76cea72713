#![deny(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use catalog_api_types::UpdateProductRequest;
use catalog_sync::application::catalog::GetProduct;
use catalog_sync::application::error::AppError;
use catalog_sync::application::filter::FilterState;
use catalog_sync::application::listing::{ListingController, ListingView};
use catalog_sync::application::location::{Location, MemoryNavigator, to_query};
use catalog_sync::application::validation::ProductForm;
use serde_json::{Value, json};

use crate::args::ProductsCmd;
use crate::client::{CliError, Ctx};
use crate::print::print_json;

const LISTING_PATH: &str = "/products";

pub async fn handle(ctx: &Ctx, cmd: ProductsCmd) -> Result<(), CliError> {
    ctx.require_session()?;
    match cmd {
        ProductsCmd::List {
            search,
            category,
            page,
        } => list(ctx, search, category, page).await,
        ProductsCmd::Get { slug } => get(ctx, slug).await,
        ProductsCmd::Create {
            name,
            description,
            price,
            category_id,
            images,
        } => {
            let form = ProductForm {
                name,
                description,
                price,
                category_id,
                images,
            };
            let product = ctx.mutations.create(&form).await?;
            print_json(&product)
        }
        ProductsCmd::Update {
            id,
            name,
            description,
            price,
            category_id,
            images,
        } => {
            let request = UpdateProductRequest {
                name,
                description,
                images: (!images.is_empty()).then_some(images),
                price,
                category_id,
            };
            let product = ctx.mutations.update(&id, &request).await?;
            print_json(&product)
        }
        ProductsCmd::Delete { id } => {
            ctx.mutations.delete(&id).await?;
            println!("deleted");
            Ok(())
        }
    }
}

/// Drive the listing view-model from a one-shot address.
pub async fn list(
    ctx: &Ctx,
    search: Option<String>,
    category: Option<String>,
    page: u32,
) -> Result<(), CliError> {
    let state = FilterState::new(
        search.unwrap_or_default(),
        category.unwrap_or_default(),
        page,
    );
    let navigator = Arc::new(MemoryNavigator::new(Location::new(
        LISTING_PATH,
        to_query(&state),
    )));
    let mut listing = ListingController::new(
        ctx.executor.clone(),
        ctx.mutations.clone(),
        navigator,
        ctx.settings.listing.clone(),
    );
    listing.mount();
    listing.set_page(state.page);

    let view = listing.settled_view().await;
    print_json(&render(&view)?)
}

async fn get(ctx: &Ctx, slug: String) -> Result<(), CliError> {
    let product = ctx
        .executor
        .load(GetProduct { slug })
        .await
        .map_err(AppError::from)?;
    print_json(&*product)
}

fn render(view: &ListingView) -> Result<Value, CliError> {
    match view {
        ListingView::Ready {
            products, pages, ..
        } => {
            let pages = pages.as_ref().map(|window| {
                json!({
                    "current": window.current,
                    "total": window.total,
                    "numbers": window.numbers(),
                    "hasPrevious": window.has_previous(),
                    "hasNext": window.has_next(),
                })
            });
            Ok(json!({ "products": products, "pages": pages }))
        }
        ListingView::Failed { error } => Err(AppError::Query(error.clone()).into()),
        ListingView::Loading => Err(CliError::Render("listing did not settle".into())),
    }
}
