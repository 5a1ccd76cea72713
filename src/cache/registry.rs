//! Bidirectional tag registry.
//!
//! Tracks which cache entries carry which tags, so invalidating a tag finds
//! every affected entry and evicting an entry cleans up its tags.

use std::collections::{HashMap, HashSet};

use super::keys::{QueryKey, Tag};

/// Tracks tag → keys and key → tags mappings.
///
/// The registry is not synchronized on its own: it lives inside the cache
/// state and is only touched while the cache lock is held, so tag bookkeeping
/// and entry transitions change together.
#[derive(Debug, Default)]
pub struct TagRegistry {
    /// Maps tags to all keys carrying them
    tag_to_keys: HashMap<Tag, HashSet<QueryKey>>,
    /// Maps keys to all tags they carry
    key_to_tags: HashMap<QueryKey, HashSet<Tag>>,
}

impl TagRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tag set of `key`.
    pub fn register(&mut self, key: &QueryKey, tags: HashSet<Tag>) {
        self.unregister(key);
        if tags.is_empty() {
            return;
        }
        for tag in &tags {
            self.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
        self.key_to_tags.insert(key.clone(), tags);
    }

    /// Keys currently carrying `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> HashSet<QueryKey> {
        self.tag_to_keys.get(tag).cloned().unwrap_or_default()
    }

    /// Tags currently carried by `key`.
    pub fn tags_for_key(&self, key: &QueryKey) -> HashSet<Tag> {
        self.key_to_tags.get(key).cloned().unwrap_or_default()
    }

    /// Drop `key` and any tag left without keys.
    pub fn unregister(&mut self, key: &QueryKey) {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return;
        };
        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.tag_to_keys.clear();
        self.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        self.tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        self.key_to_tags.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::keys::ResourceKind;

    fn tags(list: &[Tag]) -> HashSet<Tag> {
        list.iter().cloned().collect()
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = TagRegistry::new();
        let key = QueryKey::new("/products/shoe");
        let tag = Tag::entity(ResourceKind::Product, "shoe");

        registry.register(&key, tags(&[tag.clone()]));

        assert!(registry.keys_for_tag(&tag).contains(&key));
        assert!(registry.tags_for_key(&key).contains(&tag));
    }

    #[test]
    fn register_replaces_previous_tags() {
        let mut registry = TagRegistry::new();
        let key = QueryKey::new("/products").with_param("offset", 0);
        let list = Tag::list(ResourceKind::Product);
        let item = Tag::entity(ResourceKind::Product, "7");

        registry.register(&key, tags(&[list.clone(), item.clone()]));
        registry.register(&key, tags(&[list.clone()]));

        assert!(registry.keys_for_tag(&item).is_empty());
        assert_eq!(registry.tag_count(), 1);
        assert!(registry.keys_for_tag(&list).contains(&key));
    }

    #[test]
    fn many_keys_share_a_collection_tag() {
        let mut registry = TagRegistry::new();
        let list = Tag::list(ResourceKind::Product);
        let first = QueryKey::new("/products").with_param("offset", 0);
        let second = QueryKey::new("/products").with_param("offset", 20);

        registry.register(&first, tags(&[list.clone()]));
        registry.register(&second, tags(&[list.clone()]));

        let keys = registry.keys_for_tag(&list);
        assert_eq!(keys.len(), 2);
        assert!(keys.contains(&first));
        assert!(keys.contains(&second));
    }

    #[test]
    fn unregister_cleans_up_both_directions() {
        let mut registry = TagRegistry::new();
        let key = QueryKey::new("/categories");
        registry.register(&key, tags(&[Tag::list(ResourceKind::Category)]));
        assert_eq!(registry.key_count(), 1);

        registry.unregister(&key);
        assert_eq!(registry.key_count(), 0);
        assert_eq!(registry.tag_count(), 0);
    }

    #[test]
    fn clear_removes_all_mappings() {
        let mut registry = TagRegistry::new();
        registry.register(
            &QueryKey::new("/categories"),
            tags(&[Tag::list(ResourceKind::Category)]),
        );
        registry.clear();
        assert_eq!(registry.key_count(), 0);
        assert_eq!(registry.tag_count(), 0);
    }
}
