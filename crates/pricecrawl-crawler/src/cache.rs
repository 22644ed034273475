//! In-memory memo of aggregate reports keyed by normalized product name.
//!
//! There is no TTL and no eviction: entries live until they are invalidated
//! by key, replaced after an item edit, or the whole cache is cleared.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use pricecrawl_core::normalize_query_key;
use serde::Serialize;

use crate::aggregator::AggregateReport;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEntry {
    pub report: AggregateReport,
    pub captured_at: DateTime<Utc>,
}

/// Shared report cache. Writers take the lock exclusively, so a `get` never
/// observes a half-written entry.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, product_name: &str) -> Option<CacheEntry> {
        let key = normalize_query_key(product_name);
        self.read().get(&key).cloned()
    }

    /// Store `report` under the normalized `product_name`, replacing any
    /// previous entry. Blank names are ignored.
    pub fn put(&self, product_name: &str, report: AggregateReport) -> Option<CacheEntry> {
        let key = normalize_query_key(product_name);
        if key.is_empty() {
            return None;
        }
        let entry = CacheEntry {
            report,
            captured_at: Utc::now(),
        };
        self.write().insert(key, entry.clone());
        Some(entry)
    }

    /// Returns `true` when an entry was removed.
    pub fn invalidate(&self, product_name: &str) -> bool {
        let key = normalize_query_key(product_name);
        self.write().remove(&key).is_some()
    }

    /// Drop the entry for `old_name` when an item's text changes to `new_name`.
    ///
    /// Edits that normalize to the same key (case or spacing only) keep the
    /// cached report.
    pub fn invalidate_for_edit(&self, old_name: &str, new_name: &str) -> bool {
        if normalize_query_key(old_name) == normalize_query_key(new_name) {
            return false;
        }
        self.invalidate(old_name)
    }

    /// Remove everything, returning how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut entries = self.write();
        let removed = entries.len();
        entries.clear();
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Entries are replaced wholesale, so a writer that panicked cannot leave
    // one half-updated; the poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pricecrawl_core::PriceQuote;
    use rust_decimal::Decimal;

    use super::*;

    fn report(price: i64) -> AggregateReport {
        AggregateReport {
            quotes: vec![PriceQuote {
                store: "Walmart".to_owned(),
                title: "Milk".to_owned(),
                price: Decimal::new(price, 2),
                url: None,
                image_url: None,
            }],
            failures: Vec::new(),
            sources_queried: 1,
        }
    }

    #[test]
    fn keys_are_case_and_whitespace_insensitive() {
        let cache = ResultCache::new();
        cache.put("Whole  Milk", report(199));
        let hit = cache.get("  whole milk ").expect("cache hit");
        assert_eq!(hit.report, report(199));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_on_unknown_key() {
        let cache = ResultCache::new();
        assert!(cache.get("eggs").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn put_replaces_previous_entry() {
        let cache = ResultCache::new();
        cache.put("milk", report(199));
        cache.put("MILK", report(149));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("milk").unwrap().report, report(149));
    }

    #[test]
    fn blank_key_is_not_stored() {
        let cache = ResultCache::new();
        assert!(cache.put("   ", report(100)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_single_entry() {
        let cache = ResultCache::new();
        cache.put("milk", report(199));
        cache.put("eggs", report(299));
        assert!(cache.invalidate("Milk"));
        assert!(!cache.invalidate("milk"));
        assert!(cache.get("milk").is_none());
        assert!(cache.get("eggs").is_some());
    }

    #[test]
    fn edit_drops_old_key_unless_text_is_equivalent() {
        let cache = ResultCache::new();
        cache.put("milk", report(199));
        assert!(!cache.invalidate_for_edit("milk", "  MILK "));
        assert!(cache.get("milk").is_some());
        assert!(cache.invalidate_for_edit("milk", "oat milk"));
        assert!(cache.get("milk").is_none());
    }

    #[test]
    fn clear_reports_removed_count() {
        let cache = ResultCache::new();
        cache.put("milk", report(199));
        cache.put("eggs", report(299));
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_writers_and_readers_do_not_race() {
        let cache = Arc::new(ResultCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        let key = format!("item {}", (i + n) % 10);
                        cache.put(&key, report(100 + n));
                        let _ = cache.get(&key);
                        if n % 7 == 0 {
                            cache.invalidate(&key);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 10);
    }
}
