//! Catalog services built on the cache: queries, writes, auth and the
//! listing view-model.

pub mod auth;
pub mod catalog;
pub mod debounce;
pub mod error;
pub mod executor;
pub mod filter;
pub mod listing;
pub mod location;
pub mod mutations;
pub mod pagination;
pub mod validation;
