//! Product listing view-model.
//!
//! Ties the filter state, debounce gate, address bar and query executor
//! together. What is rendered is always read from the cache under the key
//! derived from the *current* filter state, so a response for an older key
//! can never replace the view of a newer one.

use std::sync::Arc;

use catalog_api_types::Product;
use tokio::sync::mpsc;
use tracing::debug;

use crate::cache::{CacheEntry, ErrorInfo, ErrorKind, QueryKey, QueryStatus};
use crate::config::ListingSettings;

use super::debounce::DebounceGate;
use super::error::AppError;
use super::executor::{QueryExecutor, QueryObserver};
use super::filter::{ActiveQuery, FilterController, FilterMode, FilterState};
use super::location::{Location, Navigator, UrlSynchronizer, from_query};
use super::mutations::MutationDispatcher;
use super::pagination::{PageWindow, total_pages};

/// What the listing should render right now.
#[derive(Debug, Clone, PartialEq)]
pub enum ListingView {
    /// Nothing to show yet for the current key.
    Loading,
    /// The current key failed; `refresh` retries.
    Failed { error: ErrorInfo },
    Ready {
        products: Vec<Product>,
        /// Data is known to be outdated; a refresh is scheduled or running.
        stale: bool,
        /// A fetch for the current key is in flight.
        fetching: bool,
        /// Page controls; `None` for search results.
        pages: Option<PageWindow>,
    },
}

pub struct ListingController {
    executor: QueryExecutor,
    mutations: MutationDispatcher,
    settings: ListingSettings,
    filter: FilterController,
    gate: DebounceGate,
    debounced: mpsc::UnboundedReceiver<String>,
    url: UrlSynchronizer,
    observer: Option<QueryObserver>,
}

impl ListingController {
    /// Must be created within a Tokio runtime.
    pub fn new(
        executor: QueryExecutor,
        mutations: MutationDispatcher,
        navigator: Arc<dyn Navigator>,
        settings: ListingSettings,
    ) -> Self {
        let (gate, debounced) = DebounceGate::new(settings.search_debounce);
        Self {
            executor,
            mutations,
            filter: FilterController::new(settings.page_size.get()),
            settings,
            gate,
            debounced,
            url: UrlSynchronizer::new(navigator),
            observer: None,
        }
    }

    pub fn state(&self) -> &FilterState {
        self.filter.state()
    }

    pub fn mode(&self) -> FilterMode {
        self.filter.mode()
    }

    pub fn active_key(&self) -> QueryKey {
        self.filter.active_key()
    }

    /// Seed the filter from the current address. The first `view` starts
    /// loading.
    pub fn mount(&mut self) {
        let state = self.url.read();
        debug!(?state, "Listing mounted");
        self.filter.restore(state);
    }

    /// The user edited the search box.
    ///
    /// The page resets and the address updates at once; the query itself
    /// switches only when the debounce gate settles.
    pub fn input_search(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.filter.set_search_text(text.clone()) {
            self.sync_url();
        }
        self.gate.on_input(text);
    }

    pub fn apply_debounced(&mut self, text: impl Into<String>) {
        self.filter.apply_debounced(text);
    }

    /// Apply the most recent debounced value, if any arrived.
    pub fn pump_debounced(&mut self) -> bool {
        let mut latest = None;
        while let Ok(text) = self.debounced.try_recv() {
            latest = Some(text);
        }
        match latest {
            Some(text) => {
                self.apply_debounced(text);
                true
            }
            None => false,
        }
    }

    /// Wait for the debounce gate to emit, then apply the value.
    pub async fn next_debounced(&mut self) -> Option<String> {
        let text = self.debounced.recv().await?;
        self.apply_debounced(text.clone());
        Some(text)
    }

    /// Search now instead of waiting for the quiet period.
    pub fn submit_search(&mut self) {
        self.discard_debounced();
        let text = self.filter.state().search_text.clone();
        self.apply_debounced(text);
    }

    pub fn select_category(&mut self, category_id: impl Into<String>) {
        if self.filter.set_category(category_id) {
            self.sync_url();
        }
    }

    pub fn clear_filters(&mut self) {
        self.discard_debounced();
        self.filter.clear();
        self.sync_url();
    }

    pub fn set_page(&mut self, page: u32) {
        self.filter.set_page(page);
    }

    /// Back/forward or a followed link changed the address.
    ///
    /// The new state is applied without writing the address back.
    pub fn on_external_navigation(&mut self, location: &Location) {
        self.discard_debounced();
        self.url.suppress_writes();
        self.filter.restore(from_query(&location.query));
        self.sync_url();
        self.url.resume_writes();
        debug!(%location, state = ?self.filter.state(), "Applied external navigation");
    }

    /// Snapshot for the current key, starting a fetch when needed.
    pub fn view(&mut self) -> ListingView {
        self.pump_debounced();
        let active = self.filter.active_query();
        let entry = self.observe(&active);
        self.render(&active, &entry)
    }

    /// Wait until the current key settles, then render it.
    pub async fn settled_view(&mut self) -> ListingView {
        self.view();
        if let Some(observer) = self.observer.as_mut() {
            observer.settled(self.executor.cache()).await;
        }
        self.view()
    }

    /// Retry the current key, e.g. after `Failed`.
    pub fn refresh(&mut self) {
        match self.filter.active_query() {
            ActiveQuery::Listing(query) => self.executor.prefetch(query),
            ActiveQuery::Search { query, .. } => self.executor.prefetch(query),
        };
    }

    /// Delete a product; the listing revalidates on the next `view`.
    pub async fn delete_product(&mut self, id: &str) -> Result<(), AppError> {
        self.mutations.delete(id).await
    }

    /// Stop timers and drop the subscription. Fetches already running
    /// still land in the cache.
    pub fn teardown(&mut self) {
        self.discard_debounced();
        self.observer = None;
        debug!("Listing torn down");
    }

    /// Stop the timer and drop values it already emitted but `view` has
    /// not applied yet; they describe input the new state replaces.
    fn discard_debounced(&mut self) {
        self.gate.cancel();
        let mut dropped = 0_usize;
        while self.debounced.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!(dropped, "Discarded unapplied search input");
        }
    }

    fn sync_url(&self) {
        self.url.write(self.filter.state());
    }

    fn observe(&mut self, active: &ActiveQuery) -> CacheEntry {
        let key = active.key();
        let executor = &self.executor;
        let observer = match self.observer.take() {
            Some(observer) if observer.key() == &key => observer,
            _ => executor.subscribe(key),
        };
        let observer = self.observer.insert(observer);

        match active {
            ActiveQuery::Listing(query) => executor.observe(observer, query.clone()),
            ActiveQuery::Search { query, .. } => executor.observe(observer, query.clone()),
        }
    }

    fn render(&self, active: &ActiveQuery, entry: &CacheEntry) -> ListingView {
        match entry.status {
            QueryStatus::Idle => return ListingView::Loading,
            QueryStatus::Loading if !entry.has_data() => return ListingView::Loading,
            QueryStatus::Error => {
                let error = entry
                    .error
                    .clone()
                    .unwrap_or_else(|| ErrorInfo::new(ErrorKind::Network, "request failed"));
                return ListingView::Failed { error };
            }
            QueryStatus::Loading | QueryStatus::Success => {}
        }

        let data = entry.data::<Vec<Product>>().unwrap_or_default();
        let (products, pages) = match active {
            ActiveQuery::Listing(query) => {
                let page = self.filter.state().page;
                let total = total_pages(
                    self.settings.total_pages.map(|pages| pages.get()),
                    page,
                    data.len(),
                    query.limit,
                );
                (data.to_vec(), Some(PageWindow::new(page, total)))
            }
            ActiveQuery::Search { category_id, .. } => {
                let products = data
                    .iter()
                    .filter(|product| {
                        category_id
                            .as_deref()
                            .is_none_or(|id| product.category.id == id)
                    })
                    .cloned()
                    .collect();
                (products, None)
            }
        };

        ListingView::Ready {
            products,
            stale: entry.stale,
            fetching: entry.is_loading(),
            pages,
        }
    }
}

impl Drop for ListingController {
    fn drop(&mut self) {
        self.teardown();
    }
}
