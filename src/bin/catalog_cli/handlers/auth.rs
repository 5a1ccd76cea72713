#![deny(clippy::all, clippy::pedantic)]

use serde_json::json;

use crate::client::{CliError, Ctx};
use crate::print::print_json;

pub async fn login(ctx: &Ctx, email: &str) -> Result<(), CliError> {
    let session = ctx.auth.login(email).await?;
    print_json(&session)
}

pub fn logout(ctx: &Ctx) -> Result<(), CliError> {
    ctx.auth.logout()?;
    println!("signed out");
    Ok(())
}

pub fn whoami(ctx: &Ctx) -> Result<(), CliError> {
    let session = ctx.auth.session();
    print_json(&json!({
        "authenticated": session.is_authenticated(),
        "email": session.email(),
    }))
}
