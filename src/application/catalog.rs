//! Catalog read queries and the cache tags they produce.

use std::collections::HashSet;

use async_trait::async_trait;
use catalog_api_types::{Category, Product};
use reqwest::Method;

use crate::cache::{QueryKey, ResourceKind, Tag};
use crate::infra::transport::{ClientError, Transport, decode};

use super::executor::Query;
use super::pagination::offset_for;

const CATEGORIES_PATH: &str = "/categories";
const CATEGORY_SEARCH_PATH: &str = "/categories/search";
const PRODUCTS_PATH: &str = "/products";
const PRODUCT_SEARCH_PATH: &str = "/products/search";
const SEARCH_PARAM: &str = "searchedText";

async fn get<T: serde::de::DeserializeOwned>(
    transport: &dyn Transport,
    key: &QueryKey,
) -> Result<T, ClientError> {
    let value = transport
        .send(Method::GET, &key.path_and_query(), None)
        .await?;
    decode(value)
}

fn product_tags(products: &[Product]) -> HashSet<Tag> {
    products
        .iter()
        .map(|product| Tag::entity(ResourceKind::Product, product.id.clone()))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListCategories {
    pub offset: u32,
    pub limit: u32,
}

impl ListCategories {
    pub fn first(limit: u32) -> Self {
        Self { offset: 0, limit }
    }
}

#[async_trait]
impl Query for ListCategories {
    type Output = Vec<Category>;

    fn key(&self) -> QueryKey {
        QueryKey::new(CATEGORIES_PATH)
            .with_param("offset", self.offset)
            .with_param("limit", self.limit)
    }

    fn tags(&self) -> HashSet<Tag> {
        HashSet::from([Tag::list(ResourceKind::Category)])
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Self::Output, ClientError> {
        get(transport, &self.key()).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCategories {
    pub text: String,
}

#[async_trait]
impl Query for SearchCategories {
    type Output = Vec<Category>;

    fn key(&self) -> QueryKey {
        QueryKey::new(CATEGORY_SEARCH_PATH).with_param(SEARCH_PARAM, &self.text)
    }

    fn tags(&self) -> HashSet<Tag> {
        HashSet::from([Tag::search(ResourceKind::Category)])
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Self::Output, ClientError> {
        get(transport, &self.key()).await
    }
}

/// One page of the product listing, optionally narrowed to a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListProducts {
    pub offset: u32,
    pub limit: u32,
    pub category_id: Option<String>,
}

impl ListProducts {
    pub fn page(page: u32, page_size: u32, category_id: Option<String>) -> Self {
        Self {
            offset: offset_for(page, page_size),
            limit: page_size,
            category_id: category_id.filter(|id| !id.is_empty()),
        }
    }
}

#[async_trait]
impl Query for ListProducts {
    type Output = Vec<Product>;

    fn key(&self) -> QueryKey {
        QueryKey::new(PRODUCTS_PATH)
            .with_param("offset", self.offset)
            .with_param("limit", self.limit)
            .with_optional_param("categoryId", self.category_id.as_deref())
    }

    fn tags(&self) -> HashSet<Tag> {
        HashSet::from([Tag::list(ResourceKind::Product)])
    }

    fn result_tags(&self, output: &Self::Output) -> HashSet<Tag> {
        product_tags(output)
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Self::Output, ClientError> {
        get(transport, &self.key()).await
    }
}

/// Free-text product search. The endpoint takes no category or paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchProducts {
    pub text: String,
}

#[async_trait]
impl Query for SearchProducts {
    type Output = Vec<Product>;

    fn key(&self) -> QueryKey {
        QueryKey::new(PRODUCT_SEARCH_PATH).with_param(SEARCH_PARAM, &self.text)
    }

    fn tags(&self) -> HashSet<Tag> {
        HashSet::from([Tag::search(ResourceKind::Product)])
    }

    fn result_tags(&self, output: &Self::Output) -> HashSet<Tag> {
        product_tags(output)
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Self::Output, ClientError> {
        get(transport, &self.key()).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetProduct {
    pub slug: String,
}

#[async_trait]
impl Query for GetProduct {
    type Output = Product;

    fn key(&self) -> QueryKey {
        QueryKey::new(format!("{PRODUCTS_PATH}/{}", self.slug))
    }

    fn tags(&self) -> HashSet<Tag> {
        HashSet::from([Tag::entity(ResourceKind::Product, self.slug.clone())])
    }

    /// Also tag by id, so writes addressed by id reach a detail fetched by slug.
    fn result_tags(&self, output: &Self::Output) -> HashSet<Tag> {
        HashSet::from([Tag::entity(ResourceKind::Product, output.id.clone())])
    }

    async fn fetch(&self, transport: &dyn Transport) -> Result<Self::Output, ClientError> {
        get(transport, &self.key())
            .await
            .map_err(|err| err.into_not_found(format!("product `{}`", self.slug)))
    }
}
