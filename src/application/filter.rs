//! Filter/search state and the query it selects.

use crate::cache::QueryKey;

use super::catalog::{ListProducts, SearchProducts};
use super::executor::Query;

/// The user-controlled inputs that determine which products are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    pub search_text: String,
    pub category_id: String,
    /// 1-based.
    pub page: u32,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            category_id: String::new(),
            page: 1,
        }
    }
}

impl FilterState {
    pub fn new(search_text: impl Into<String>, category_id: impl Into<String>, page: u32) -> Self {
        Self {
            search_text: search_text.into(),
            category_id: category_id.into(),
            page: page.max(1),
        }
    }

    pub fn category(&self) -> Option<&str> {
        (!self.category_id.is_empty()).then_some(self.category_id.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    /// Paginated listing, category and page forwarded to the server.
    Idle,
    /// Search results, narrowed to the category on the client.
    Searching,
}

/// The data source selected by the current filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActiveQuery {
    Listing(ListProducts),
    Search {
        query: SearchProducts,
        category_id: Option<String>,
    },
}

impl ActiveQuery {
    pub fn key(&self) -> QueryKey {
        match self {
            Self::Listing(query) => query.key(),
            Self::Search { query, .. } => query.key(),
        }
    }
}

/// Owns [`FilterState`] plus the debounced search text.
///
/// User edits reset the page to 1; [`restore`](Self::restore) applies a
/// state verbatim, as when it comes from the address bar.
#[derive(Debug, Clone)]
pub struct FilterController {
    state: FilterState,
    debounced: String,
    page_size: u32,
}

impl FilterController {
    pub fn new(page_size: u32) -> Self {
        Self {
            state: FilterState::default(),
            debounced: String::new(),
            page_size: page_size.max(1),
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    pub fn debounced_text(&self) -> &str {
        &self.debounced
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Apply a state without user-edit side effects. The search text is
    /// taken as already settled.
    pub fn restore(&mut self, state: FilterState) {
        self.debounced = state.search_text.clone();
        self.state = FilterState {
            page: state.page.max(1),
            ..state
        };
    }

    /// User typed into the search box. Returns whether the text changed.
    pub fn set_search_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if text == self.state.search_text {
            return false;
        }
        self.state.search_text = text;
        self.state.page = 1;
        true
    }

    /// User picked a category (empty clears it). Returns whether it changed.
    pub fn set_category(&mut self, category_id: impl Into<String>) -> bool {
        let category_id = category_id.into();
        if category_id == self.state.category_id {
            return false;
        }
        self.state.category_id = category_id;
        self.state.page = 1;
        true
    }

    pub fn set_page(&mut self, page: u32) {
        self.state.page = page.max(1);
    }

    /// The debounce gate settled on `text`.
    pub fn apply_debounced(&mut self, text: impl Into<String>) {
        self.debounced = text.into();
    }

    /// Reset every input, including the debounced text.
    pub fn clear(&mut self) {
        self.state = FilterState::default();
        self.debounced.clear();
    }

    pub fn mode(&self) -> FilterMode {
        if self.debounced.trim().is_empty() {
            FilterMode::Idle
        } else {
            FilterMode::Searching
        }
    }

    pub fn active_query(&self) -> ActiveQuery {
        match self.mode() {
            FilterMode::Idle => ActiveQuery::Listing(ListProducts::page(
                self.state.page,
                self.page_size,
                self.state.category().map(str::to_string),
            )),
            FilterMode::Searching => ActiveQuery::Search {
                query: SearchProducts {
                    text: self.debounced.trim().to_string(),
                },
                category_id: self.state.category().map(str::to_string),
            },
        }
    }

    pub fn active_key(&self) -> QueryKey {
        self.active_query().key()
    }
}
