//! catalog-cli: command-line client for the product catalog API.
//! Every command goes through the same cache, executor and auth services a
//! long-running client would use.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod client;
mod handlers;
mod print;

#[cfg(test)]
mod tests;

use clap::Parser;

use args::{Cli, Commands};
use client::{CliError, Ctx};
use handlers::{auth, categories, products};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = catalog_sync::config::load(&cli.config)?;
    catalog_sync::infra::telemetry::init(&settings.logging)?;
    let ctx = Ctx::from_settings(settings)?;

    match cli.command {
        Commands::Login { email } => auth::login(&ctx, &email).await?,
        Commands::Logout => auth::logout(&ctx)?,
        Commands::Whoami => auth::whoami(&ctx)?,
        Commands::Categories(cmd) => categories::handle(&ctx, cmd.action).await?,
        Commands::Products(cmd) => products::handle(&ctx, cmd.action).await?,
    }

    Ok(())
}
