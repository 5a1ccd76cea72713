//! Client-side data synchronization for a product catalog API.
//!
//! [`cache::ResourceCache`] keeps one entry per request key and marks
//! entries stale by tag. [`application::executor::QueryExecutor`] fetches
//! through it with request deduplication, and the listing controller maps
//! search, category and page state onto queries and the address bar.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
