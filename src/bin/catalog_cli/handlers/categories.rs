#![deny(clippy::all, clippy::pedantic)]

use catalog_sync::application::catalog::{ListCategories, SearchCategories};
use catalog_sync::application::error::AppError;

use crate::args::CategoriesCmd;
use crate::client::{CliError, Ctx};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, cmd: CategoriesCmd) -> Result<(), CliError> {
    ctx.require_session()?;
    match cmd {
        CategoriesCmd::List { offset, limit } => {
            let limit = limit.unwrap_or(ctx.settings.listing.category_limit.get());
            let categories = ctx
                .executor
                .load(ListCategories { offset, limit })
                .await
                .map_err(AppError::from)?;
            print_json(&*categories)
        }
        CategoriesCmd::Search { text } => {
            let categories = ctx
                .executor
                .load(SearchCategories { text })
                .await
                .map_err(AppError::from)?;
            print_json(&*categories)
        }
    }
}
