/*!
 * Biometric Store
 * Inserted references and the template hashes they hold
 */

use crate::error::FailureReason;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

/// One template of an inserted reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricSegment {
    /// `FACE`, `FINGER`, `IRIS`
    pub modality: String,
    pub subtype: String,
    /// Lowercase hex SHA-256 of the decoded template
    pub template_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BiometricRecord {
    pub reference_id: String,
    pub request_id: String,
    pub inserted_at: String,
    pub segments: Vec<BiometricSegment>,
}

impl BiometricRecord {
    pub fn hashes(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.template_hash.as_str())
    }
}

/// Another reference sharing templates with the requesting reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    pub reference_id: String,
    /// Segments of the matched reference whose hash the requesting reference also holds
    pub segments: Vec<BiometricSegment>,
}

#[derive(Default)]
pub struct BiometricStore {
    records: DashMap<String, BiometricRecord>,
}

impl BiometricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: BiometricRecord) -> Result<(), FailureReason> {
        match self.records.entry(record.reference_id.clone()) {
            Entry::Occupied(_) => Err(FailureReason::ReferenceIdAlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    pub fn get(&self, reference_id: &str) -> Option<BiometricRecord> {
        self.records.get(reference_id).map(|r| r.value().clone())
    }

    pub fn contains(&self, reference_id: &str) -> bool {
        self.records.contains_key(reference_id)
    }

    pub fn delete(&self, reference_id: &str) -> Option<BiometricRecord> {
        self.records.remove(reference_id).map(|(_, record)| record)
    }

    pub fn clear(&self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every distinct template hash held by any reference, sorted
    pub fn hashes(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|r| r.hashes().map(str::to_string).collect::<Vec<_>>())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Hashes of one reference's templates
    pub fn hashes_of(&self, reference_id: &str) -> Vec<String> {
        self.records
            .get(reference_id)
            .map(|r| r.hashes().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Reference IDs holding a template with `hash`, sorted
    pub fn references_with(&self, hash: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.hashes().any(|h| h == hash))
            .map(|r| r.reference_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Other references sharing at least one template hash with `reference_id`,
    /// optionally restricted to `gallery`, ascending by reference ID.
    pub fn duplicates_of(&self, reference_id: &str, gallery: Option<&[String]>) -> Vec<DuplicateMatch> {
        let own_hashes: HashSet<String> = self.hashes_of(reference_id).into_iter().collect();
        if own_hashes.is_empty() {
            return Vec::new();
        }

        let mut matches: Vec<DuplicateMatch> = self
            .records
            .iter()
            .filter(|r| r.reference_id != reference_id)
            .filter(|r| gallery.map_or(true, |g| g.contains(&r.reference_id)))
            .filter_map(|r| {
                let segments: Vec<BiometricSegment> = r
                    .segments
                    .iter()
                    .filter(|s| own_hashes.contains(&s.template_hash))
                    .cloned()
                    .collect();
                (!segments.is_empty()).then(|| DuplicateMatch {
                    reference_id: r.reference_id.clone(),
                    segments,
                })
            })
            .collect();

        matches.sort_by(|a, b| a.reference_id.cmp(&b.reference_id));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(modality: &str, hash: &str) -> BiometricSegment {
        BiometricSegment {
            modality: modality.to_string(),
            subtype: String::new(),
            template_hash: hash.to_string(),
        }
    }

    fn record(reference_id: &str, segments: Vec<BiometricSegment>) -> BiometricRecord {
        BiometricRecord {
            reference_id: reference_id.to_string(),
            request_id: format!("req-{reference_id}"),
            inserted_at: "2024-04-22T10:00:00.000Z".to_string(),
            segments,
        }
    }

    fn populated() -> BiometricStore {
        let store = BiometricStore::new();
        store
            .insert(record("ref-a", vec![segment("FINGER", "h1"), segment("IRIS", "h2")]))
            .unwrap();
        store
            .insert(record("ref-c", vec![segment("FINGER", "h1")]))
            .unwrap();
        store
            .insert(record("ref-b", vec![segment("IRIS", "h2"), segment("FACE", "h9")]))
            .unwrap();
        store.insert(record("ref-d", vec![segment("FACE", "h7")])).unwrap();
        store
    }

    #[test]
    fn duplicate_reference_id_is_rejected() {
        let store = BiometricStore::new();
        store.insert(record("ref-a", vec![])).unwrap();
        assert_eq!(
            store.insert(record("ref-a", vec![segment("FACE", "h")])),
            Err(FailureReason::ReferenceIdAlreadyExists)
        );
        assert!(store.get("ref-a").unwrap().segments.is_empty());
    }

    #[test]
    fn duplicates_are_sorted_and_grouped() {
        let store = populated();
        let duplicates = store.duplicates_of("ref-a", None);

        let ids: Vec<_> = duplicates.iter().map(|d| d.reference_id.as_str()).collect();
        assert_eq!(ids, vec!["ref-b", "ref-c"]);
        assert_eq!(duplicates[0].segments, vec![segment("IRIS", "h2")]);
        assert_eq!(duplicates[1].segments, vec![segment("FINGER", "h1")]);
    }

    #[test]
    fn gallery_restricts_duplicates() {
        let store = populated();
        let gallery = vec!["ref-c".to_string(), "ref-d".to_string()];
        let duplicates = store.duplicates_of("ref-a", Some(&gallery));

        assert_eq!(duplicates.len(), 1);
        assert_eq!(duplicates[0].reference_id, "ref-c");
    }

    #[test]
    fn unknown_reference_has_no_duplicates() {
        let store = populated();
        assert!(store.duplicates_of("ref-z", None).is_empty());
        assert!(store.duplicates_of("ref-d", None).is_empty());
    }

    #[test]
    fn hash_views() {
        let store = populated();
        assert_eq!(store.hashes(), vec!["h1", "h2", "h7", "h9"]);
        assert_eq!(store.references_with("h1"), vec!["ref-a", "ref-c"]);
        assert!(store.references_with("nope").is_empty());

        assert!(store.delete("ref-c").is_some());
        assert!(store.delete("ref-c").is_none());
        assert_eq!(store.references_with("h1"), vec!["ref-a"]);

        store.clear();
        assert!(store.is_empty());
    }
}
