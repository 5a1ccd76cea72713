//! Invalidation plan generation.
//!
//! Merges cache events into the deduplicated set of tags to invalidate.

use std::collections::HashSet;
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::{ResourceKind, Tag};

/// Tags to invalidate after one or more writes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub tags: HashSet<Tag>,
    /// Reset the whole cache instead of marking tagged entries stale.
    pub clear_all: bool,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<String> = self.tags.iter().map(ToString::to_string).collect();
        tags.sort();
        write!(
            f,
            "InvalidationPlan {{ tags: [{}], clear_all: {} }}",
            tags.join(", "),
            self.clear_all
        )
    }
}

impl InvalidationPlan {
    pub fn from_events(events: impl IntoIterator<Item = CacheEvent>) -> Self {
        let mut plan = Self::default();
        for event in events {
            plan.add(&event.kind);
        }
        plan
    }

    pub fn from_kind(kind: &EventKind) -> Self {
        let mut plan = Self::default();
        plan.add(kind);
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && !self.clear_all
    }

    fn add(&mut self, kind: &EventKind) {
        match kind {
            EventKind::ProductCreated { .. } => self.add_product_collections(),
            EventKind::ProductUpdated { id, slug } => {
                self.add_product_collections();
                self.tags.insert(Tag::entity(ResourceKind::Product, id.clone()));
                if let Some(slug) = slug {
                    self.tags
                        .insert(Tag::entity(ResourceKind::Product, slug.clone()));
                }
            }
            EventKind::ProductDeleted { id } => {
                self.add_product_collections();
                self.tags.insert(Tag::entity(ResourceKind::Product, id.clone()));
            }
            EventKind::SessionEnded => self.clear_all = true,
        }
    }

    fn add_product_collections(&mut self) {
        self.tags.insert(Tag::list(ResourceKind::Product));
        self.tags.insert(Tag::search(ResourceKind::Product));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_invalidates_product_collections_only() {
        let plan = InvalidationPlan::from_kind(&EventKind::ProductCreated { id: "1".into() });
        assert_eq!(plan.tags.len(), 2);
        assert!(plan.tags.contains(&Tag::list(ResourceKind::Product)));
        assert!(plan.tags.contains(&Tag::search(ResourceKind::Product)));
        assert!(!plan.clear_all);
    }

    #[test]
    fn update_adds_entity_tags_for_id_and_slug() {
        let plan = InvalidationPlan::from_kind(&EventKind::ProductUpdated {
            id: "42".into(),
            slug: Some("lamp".into()),
        });
        assert!(plan.tags.contains(&Tag::entity(ResourceKind::Product, "42")));
        assert!(plan.tags.contains(&Tag::entity(ResourceKind::Product, "lamp")));
        assert!(plan.tags.contains(&Tag::list(ResourceKind::Product)));
    }

    #[test]
    fn events_merge_and_deduplicate() {
        let plan = InvalidationPlan::from_events([
            CacheEvent::new(EventKind::ProductDeleted { id: "1".into() }),
            CacheEvent::new(EventKind::ProductDeleted { id: "1".into() }),
            CacheEvent::new(EventKind::ProductCreated { id: "2".into() }),
        ]);
        assert_eq!(plan.tags.len(), 3);
        assert_eq!(
            plan.to_string(),
            "InvalidationPlan { tags: [Product:1, Product:LIST, Product:SEARCH], clear_all: false }"
        );
    }

    #[test]
    fn session_end_clears_everything() {
        let plan = InvalidationPlan::from_kind(&EventKind::SessionEnded);
        assert!(plan.clear_all);
        assert!(!plan.is_empty());
        assert!(InvalidationPlan::default().is_empty());
    }
}
