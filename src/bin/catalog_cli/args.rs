//! Command-line surface for `catalog-cli`.

#![deny(clippy::all, clippy::pedantic)]

use clap::{Parser, Subcommand};

use catalog_sync::config::ConfigArgs;

#[derive(Parser, Debug)]
#[command(name = "catalog-cli", version, about = "Product catalog API client", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Exchange an email for a token and store it
    Login { email: String },
    /// Forget the stored token
    Logout,
    /// Show the signed-in email
    Whoami,
    /// Category lookup
    Categories(CategoriesArgs),
    /// Product listing, search and management
    Products(ProductsArgs),
}

#[derive(Parser, Debug)]
pub struct CategoriesArgs {
    #[command(subcommand)]
    pub action: CategoriesCmd,
}

#[derive(Subcommand, Debug)]
pub enum CategoriesCmd {
    /// List categories
    List {
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Defaults to `listing.category_limit`
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Search categories by name
    Search { text: String },
}

#[derive(Parser, Debug)]
pub struct ProductsArgs {
    #[command(subcommand)]
    pub action: ProductsCmd,
}

#[derive(Subcommand, Debug)]
pub enum ProductsCmd {
    /// List one page of products, or search when `--search` is given
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Get a product by slug
    Get { slug: String },
    /// Create a product
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        category_id: String,
        /// Image URL; repeat for a gallery
        #[arg(long = "image", required = true)]
        images: Vec<String>,
    },
    /// Update the given fields of a product
    Update {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        category_id: Option<String>,
        /// Replaces the whole gallery when given
        #[arg(long = "image")]
        images: Vec<String>,
    },
    /// Delete a product
    Delete {
        #[arg(long)]
        id: String,
    },
}
