//! Address-bar synchronization for the filter state.
//!
//! Only `search` and `category` are serialized. The page is session-local,
//! so a reload or shared link always starts on page 1.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};
use url::form_urlencoded;

use super::filter::FilterState;

const SEARCH_PARAM: &str = "search";
const CATEGORY_PARAM: &str = "category";

/// A navigable path plus query string (without the leading `?`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: String,
}

impl Location {
    pub fn new(path: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: query.into(),
        }
    }

    /// Split `path?query`.
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('?') {
            Some((path, query)) => Self::new(path, query),
            None => Self::new(raw, ""),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.query.is_empty() {
            f.write_str(&self.path)
        } else {
            write!(f, "{}?{}", self.path, self.query)
        }
    }
}

/// Serialize the shareable part of `state`; empty fields are omitted.
pub fn to_query(state: &FilterState) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    if !state.search_text.is_empty() {
        serializer.append_pair(SEARCH_PARAM, &state.search_text);
    }
    if !state.category_id.is_empty() {
        serializer.append_pair(CATEGORY_PARAM, &state.category_id);
    }
    serializer.finish()
}

/// Parse a query string into a state on page 1. Unknown parameters are
/// ignored; the first occurrence of a repeated parameter wins.
pub fn from_query(query: &str) -> FilterState {
    let query = query.strip_prefix('?').unwrap_or(query);
    let mut state = FilterState::default();
    let mut seen_search = false;
    let mut seen_category = false;
    for (name, value) in form_urlencoded::parse(query.as_bytes()) {
        match name.as_ref() {
            SEARCH_PARAM if !seen_search => {
                state.search_text = value.into_owned();
                seen_search = true;
            }
            CATEGORY_PARAM if !seen_category => {
                state.category_id = value.into_owned();
                seen_category = true;
            }
            _ => {}
        }
    }
    state
}

/// Navigation primitive of the host: read the current location and push a
/// new one without a full reload.
///
/// External changes (back/forward, followed links) are delivered by the host
/// to the listing controller.
pub trait Navigator: Send + Sync {
    fn current(&self) -> Location;

    fn push(&self, location: Location);
}

#[derive(Debug, Default)]
struct History {
    entries: Vec<Location>,
    index: usize,
}

/// In-process history stack.
#[derive(Debug)]
pub struct MemoryNavigator {
    history: Mutex<History>,
}

impl MemoryNavigator {
    pub fn new(initial: Location) -> Self {
        Self {
            history: Mutex::new(History {
                entries: vec![initial],
                index: 0,
            }),
        }
    }

    /// Step back; returns the location to hand to the controller.
    pub fn back(&self) -> Option<Location> {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.index == 0 {
            return None;
        }
        history.index -= 1;
        history.entries.get(history.index).cloned()
    }

    pub fn forward(&self) -> Option<Location> {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        if history.index + 1 >= history.entries.len() {
            return None;
        }
        history.index += 1;
        history.entries.get(history.index).cloned()
    }

    /// Number of entries in the stack.
    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Navigator for MemoryNavigator {
    fn current(&self) -> Location {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .entries
            .get(history.index)
            .cloned()
            .unwrap_or_default()
    }

    fn push(&self, location: Location) {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let keep = history.index + 1;
        history.entries.truncate(keep);
        history.entries.push(location);
        history.index = history.entries.len() - 1;
    }
}

/// Two-way mapping between [`FilterState`] and the navigator's location.
pub struct UrlSynchronizer {
    navigator: Arc<dyn Navigator>,
    suppressed: bool,
}

impl UrlSynchronizer {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            suppressed: false,
        }
    }

    pub fn navigator(&self) -> &Arc<dyn Navigator> {
        &self.navigator
    }

    pub fn read(&self) -> FilterState {
        from_query(&self.navigator.current().query)
    }

    /// Push `state` to the address bar. Skipped while writes are suppressed
    /// or when the query would not change. Returns whether a push happened.
    pub fn write(&self, state: &FilterState) -> bool {
        let current = self.navigator.current();
        let query = to_query(state);
        if self.suppressed {
            trace!(query, "URL write suppressed during restore");
            return false;
        }
        if query == current.query {
            return false;
        }
        let next = Location::new(current.path, query);
        debug!(location = %next, "URL updated");
        self.navigator.push(next);
        true
    }

    /// Suppress writes while a URL-triggered update is applied.
    pub fn suppress_writes(&mut self) {
        self.suppressed = true;
    }

    pub fn resume_writes(&mut self) {
        self.suppressed = false;
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }
}

impl fmt::Debug for UrlSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSynchronizer")
            .field("current", &self.navigator.current())
            .field("suppressed", &self.suppressed)
            .finish()
    }
}
