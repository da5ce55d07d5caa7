//! Bounded LRU cache of raw response bodies.
//!
//! Purely in-memory; never persisted, never consulted on startup. Bodies are
//! truncated to the byte cap at insertion time and never re-truncated later.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::ident::ListingId;

pub struct RawCache {
    entries: Option<LruCache<ListingId, String>>,
    max_bytes: usize,
}

impl RawCache {
    /// An item cap of 0 disables the cache entirely (`put` becomes a no-op).
    pub fn new(max_items: usize, max_bytes: usize) -> Self {
        let entries = NonZeroUsize::new(max_items).map(LruCache::new);
        Self { entries, max_bytes }
    }

    /// Store a body, truncated to the byte cap, touching the key to
    /// most-recently-used. Evicts least-recently-touched entries beyond the
    /// item cap.
    pub fn put(&mut self, id: ListingId, body: &str) {
        let Some(entries) = self.entries.as_mut() else {
            return;
        };
        entries.put(id, truncate_to_boundary(body, self.max_bytes).to_string());
    }

    /// Fetch a cached body; counts as a touch.
    pub fn get(&mut self, id: &ListingId) -> Option<&str> {
        self.entries.as_mut()?.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, LruCache::len)
    }
}

/// Truncate to at most `max_bytes`, backing off to a char boundary.
fn truncate_to_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ListingId {
        ListingId::from_number(n)
    }

    #[test]
    fn test_put_get() {
        let mut cache = RawCache::new(10, 1000);
        cache.put(id(1), "<html>one</html>");
        assert_eq!(cache.get(&id(1)), Some("<html>one</html>"));
        assert_eq!(cache.get(&id(3)), None);
    }

    #[test]
    fn test_evicts_least_recently_touched() {
        let mut cache = RawCache::new(2, 1000);
        cache.put(id(1), "a");
        cache.put(id(3), "b");
        // touch 1 so that 3 becomes the eviction candidate
        assert!(cache.get(&id(1)).is_some());
        cache.put(id(5), "c");

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&id(1)).is_some());
        assert!(cache.get(&id(3)).is_none());
        assert!(cache.get(&id(5)).is_some());
    }

    #[test]
    fn test_eviction_order_without_touches() {
        let mut cache = RawCache::new(3, 1000);
        for n in [1, 3, 5, 7, 9] {
            cache.put(id(n), "x");
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.get(&id(1)).is_none());
        assert!(cache.get(&id(3)).is_none());
        assert!(cache.get(&id(5)).is_some());
        assert!(cache.get(&id(9)).is_some());
    }

    #[test]
    fn test_body_truncated_at_insert() {
        let mut cache = RawCache::new(2, 5);
        cache.put(id(1), "abcdefghij");
        assert_eq!(cache.get(&id(1)), Some("abcde"));
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        // "ąžuolas" - 'ą' and 'ž' are 2 bytes each
        let mut cache = RawCache::new(2, 3);
        cache.put(id(1), "ąžuolas");
        assert_eq!(cache.get(&id(1)), Some("ą"));
    }

    #[test]
    fn test_zero_cap_disables() {
        let mut cache = RawCache::new(0, 1000);
        cache.put(id(1), "body");
        assert_eq!(cache.get(&id(1)), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_overwrite_replaces_body() {
        let mut cache = RawCache::new(2, 1000);
        cache.put(id(1), "first");
        cache.put(id(1), "second");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&id(1)), Some("second"));
    }
}
