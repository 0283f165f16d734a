/*!
 * In-memory expectation store
 *
 * Test harnesses program canned outcomes per correlation key. Entries live
 * until deleted or the process exits; nothing is persisted.
 */

use dashmap::DashMap;
use std::collections::BTreeMap;

/// An expectation addressable by its correlation key
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Concurrent key -> expectation map. Later inserts for a key replace earlier ones.
pub struct ExpectationStore<E> {
    entries: DashMap<String, E>,
}

impl<E> ExpectationStore<E>
where
    E: Keyed + Clone + Default,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub fn insert(&self, expectation: E) {
        self.entries
            .insert(expectation.key().to_string(), expectation);
    }

    /// Stored expectation, or the default (no override) when absent.
    pub fn get(&self, key: &str) -> E {
        self.lookup(key).unwrap_or_default()
    }

    pub fn lookup(&self, key: &str) -> Option<E> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Returns whether an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn snapshot(&self) -> BTreeMap<String, E> {
        self.entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<E> Default for ExpectationStore<E>
where
    E: Keyed + Clone + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Canned {
        key: String,
        decision: String,
        delay: u64,
    }

    impl Keyed for Canned {
        fn key(&self) -> &str {
            &self.key
        }
    }

    fn canned(key: &str, decision: &str, delay: u64) -> Canned {
        Canned {
            key: key.to_string(),
            decision: decision.to_string(),
            delay,
        }
    }

    #[test]
    fn absent_key_yields_default() {
        let store = ExpectationStore::<Canned>::new();
        let value = store.get("never-inserted");
        assert!(value.decision.is_empty());
        assert_eq!(value.delay, 0);
        assert!(store.lookup("never-inserted").is_none());
    }

    #[test]
    fn last_write_wins() {
        let store = ExpectationStore::new();
        store.insert(canned("rid-1", "APPROVED", 1));
        store.insert(canned("rid-1", "REJECTED", 4));

        assert_eq!(store.get("rid-1"), canned("rid-1", "REJECTED", 4));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn delete_restores_default() {
        let store = ExpectationStore::new();
        store.insert(canned("rid-1", "REJECTED", 2));

        assert!(store.delete("rid-1"));
        assert!(!store.delete("rid-1"));
        assert_eq!(store.get("rid-1"), Canned::default());
    }

    #[test]
    fn clear_empties_store() {
        let store = ExpectationStore::new();
        store.insert(canned("a", "REJECTED", 0));
        store.insert(canned("b", "APPROVED", 0));

        let keys: Vec<_> = store.snapshot().into_keys().collect();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_writers() {
        let store = Arc::new(ExpectationStore::new());
        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        store.insert(canned(&format!("{worker}-{i}"), "REJECTED", i));
                        if i % 2 == 0 {
                            store.delete(&format!("{worker}-{i}"));
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8 * 50);
    }
}
