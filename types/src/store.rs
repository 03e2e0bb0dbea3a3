//! Deduplicating store for specific and blanket course references.
//!
//! The store relies on the subsumption rule: a [`BlanketCourse`] for a given
//! `url_id` contains every [`SpecificCourse`] sharing it. Specific entries that
//! are covered this way are redundant and removed by [`CourseStore::optimize`].
//!
//! The store is a plain value with no internal locking. It is confined to the
//! task that owns it; concurrent producers never mutate it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::course::{BlanketCourse, CourseRef, SpecificCourse, UrlId};

/// A reference of a kind the store cannot hold.
///
/// This is a logic defect in the caller and should abort the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("course store cannot hold a {kind} reference ({url_id})")]
pub struct TypeFault {
    pub kind: &'static str,
    pub url_id: UrlId,
}

/// One element of the compact serialized form.
///
/// Serializes as a bare string for a blanket entry and as a two-element array
/// for a specific entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompactEntry {
    Blanket(UrlId),
    Specific(UrlId, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CompactEntry>", into = "Vec<CompactEntry>")]
pub struct CourseStore {
    specific: BTreeSet<SpecificCourse>,
    blanket: BTreeSet<BlanketCourse>,
}

impl CourseStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from references, failing on the first unsupported one.
    pub fn from_courses(
        courses: impl IntoIterator<Item = CourseRef>,
    ) -> Result<Self, TypeFault> {
        let mut store = Self::new();
        for course in courses {
            store.add(course)?;
        }
        Ok(store)
    }

    /// Insert a specific or blanket reference.
    ///
    /// Bare references carry no checkout identity and are rejected.
    pub fn add(&mut self, course: CourseRef) -> Result<(), TypeFault> {
        match course {
            CourseRef::Specific(course) => {
                self.specific.insert(course);
            }
            CourseRef::Blanket(course) => {
                self.blanket.insert(course);
            }
            bare @ CourseRef::Bare { .. } => return Err(type_fault(&bare)),
        }
        Ok(())
    }

    /// Remove a reference if present. Missing entries are not an error.
    pub fn discard(&mut self, course: &CourseRef) -> Result<(), TypeFault> {
        match course {
            CourseRef::Specific(course) => {
                self.specific.remove(course);
            }
            CourseRef::Blanket(course) => {
                self.blanket.remove(course);
            }
            CourseRef::Bare { .. } => return Err(type_fault(course)),
        }
        Ok(())
    }

    /// Whether the store covers `course`.
    ///
    /// A blanket entry covers every reference with its `url_id`; a specific
    /// reference is otherwise covered only by an exact match.
    #[must_use]
    pub fn contains(&self, course: &CourseRef) -> bool {
        if self.covers(course.url_id()) {
            return true;
        }
        match course {
            CourseRef::Specific(course) => self.specific.contains(course),
            CourseRef::Blanket(_) | CourseRef::Bare { .. } => false,
        }
    }

    #[must_use]
    pub fn contains_specific(&self, course: &SpecificCourse) -> bool {
        self.covers(course.url_id()) || self.specific.contains(course)
    }

    /// Number of stored entries. May shrink after [`optimize`](Self::optimize).
    #[must_use]
    pub fn len(&self) -> usize {
        self.specific.len() + self.blanket.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specific.is_empty() && self.blanket.is_empty()
    }

    /// Drop specific entries already covered by a blanket entry.
    pub fn optimize(&mut self) {
        let blanket = &self.blanket;
        self.specific
            .retain(|course| !blanket.contains(&course.to_blanket()));
    }

    /// Iterate over all entries: specific entries first, then blanket ones.
    pub fn iter(&self) -> impl Iterator<Item = CourseRef> + '_ {
        self.specific
            .iter()
            .cloned()
            .map(CourseRef::Specific)
            .chain(self.blanket.iter().cloned().map(CourseRef::Blanket))
    }

    /// The compact form of the optimized store.
    ///
    /// Covered specific entries are left out, so restoring the result yields
    /// this store as it would be after `optimize()`.
    #[must_use]
    pub fn to_compact(&self) -> Vec<CompactEntry> {
        let specific = self
            .specific
            .iter()
            .filter(|course| !self.covers(course.url_id()))
            .map(|course| CompactEntry::Specific(course.url_id().clone(), course.token().to_string()));
        let blanket = self
            .blanket
            .iter()
            .map(|course| CompactEntry::Blanket(course.url_id().clone()));
        specific.chain(blanket).collect()
    }

    #[must_use]
    pub fn from_compact(entries: impl IntoIterator<Item = CompactEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            match entry {
                CompactEntry::Blanket(url_id) => {
                    store.blanket.insert(BlanketCourse::new(url_id));
                }
                CompactEntry::Specific(url_id, token) => {
                    store.specific.insert(SpecificCourse::new(url_id, token));
                }
            }
        }
        store
    }

    fn covers(&self, url_id: &UrlId) -> bool {
        self.blanket.contains(&BlanketCourse::new(url_id.clone()))
    }
}

impl From<Vec<CompactEntry>> for CourseStore {
    fn from(entries: Vec<CompactEntry>) -> Self {
        Self::from_compact(entries)
    }
}

impl From<CourseStore> for Vec<CompactEntry> {
    fn from(store: CourseStore) -> Self {
        store.to_compact()
    }
}

fn type_fault(course: &CourseRef) -> TypeFault {
    TypeFault {
        kind: course.kind(),
        url_id: course.url_id().clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specific(id: &str, token: &str) -> CourseRef {
        CourseRef::Specific(SpecificCourse::new(id, token))
    }

    fn blanket(id: &str) -> CourseRef {
        CourseRef::Blanket(BlanketCourse::new(id))
    }

    #[test]
    fn blanket_covers_every_token() {
        let mut store = CourseStore::new();
        store.add(blanket("abc")).unwrap();

        assert!(store.contains(&specific("abc", "NEVER-ADDED")));
        assert!(store.contains(&specific("abc", "OTHER")));
        assert!(store.contains(&CourseRef::Bare {
            url_id: UrlId::new("abc")
        }));
        assert!(!store.contains(&specific("xyz", "NEVER-ADDED")));
    }

    #[test]
    fn specific_requires_exact_match() {
        let mut store = CourseStore::new();
        store.add(specific("abc", "TOK1")).unwrap();

        assert!(store.contains(&specific("abc", "TOK1")));
        assert!(!store.contains(&specific("abc", "TOK2")));
        assert!(!store.contains(&blanket("abc")));
    }

    #[test]
    fn one_blanket_per_url_id() {
        let mut store = CourseStore::new();
        store.add(blanket("abc")).unwrap();
        store.add(blanket("abc")).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn bare_reference_is_a_type_fault() {
        let mut store = CourseStore::new();
        let bare = CourseRef::Bare {
            url_id: UrlId::new("abc"),
        };

        let err = store.add(bare.clone()).unwrap_err();
        assert_eq!(err.kind, "bare");
        assert!(store.discard(&bare).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn discard_is_noop_when_missing() {
        let mut store = CourseStore::new();
        store.add(specific("abc", "TOK1")).unwrap();

        store.discard(&specific("abc", "TOK2")).unwrap();
        store.discard(&blanket("zzz")).unwrap();
        assert_eq!(store.len(), 1);

        store.discard(&specific("abc", "TOK1")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn optimize_compacts_and_is_idempotent() {
        let mut store = CourseStore::new();
        store.add(specific("abc", "TOK1")).unwrap();
        store.add(blanket("abc")).unwrap();
        assert_eq!(store.len(), 2);

        store.optimize();
        assert_eq!(store.len(), 1);
        store.optimize();
        assert_eq!(store.len(), 1);

        assert_eq!(store.to_compact(), vec![CompactEntry::Blanket(UrlId::new("abc"))]);
    }

    #[test]
    fn iterates_specific_before_blanket() {
        let mut store = CourseStore::new();
        store.add(blanket("aaa")).unwrap();
        store.add(specific("zzz", "T")).unwrap();

        let kinds: Vec<_> = store.iter().map(|course| course.kind()).collect();
        assert_eq!(kinds, vec!["specific", "blanket"]);
    }

    #[test]
    fn compact_round_trip_matches_optimized_store() {
        let mut store = CourseStore::new();
        store.add(specific("abc", "TOK1")).unwrap();
        store.add(specific("def", "TOK2")).unwrap();
        store.add(specific("def", "TOK3")).unwrap();
        store.add(blanket("abc")).unwrap();
        store.add(blanket("ghi")).unwrap();
        store.discard(&specific("def", "TOK3")).unwrap();

        let restored = CourseStore::from_compact(store.to_compact());

        store.optimize();
        assert_eq!(restored, store);
        assert_eq!(restored.len(), store.len());
        for candidate in [
            specific("abc", "ANY"),
            specific("def", "TOK2"),
            specific("def", "TOK3"),
            blanket("ghi"),
            blanket("def"),
        ] {
            assert_eq!(
                restored.contains(&candidate),
                store.contains(&candidate),
                "{candidate}"
            );
        }
    }

    fn random_course() -> CourseRef {
        let id = ["abc", "def", "ghi", "jkl"][rand::random_range(0..4)];
        if rand::random_bool(0.3) {
            blanket(id)
        } else {
            specific(id, ["T1", "T2", "T3"][rand::random_range(0..3)])
        }
    }

    #[test]
    fn compact_round_trip_holds_for_random_histories() {
        let universe: Vec<CourseRef> = ["abc", "def", "ghi", "jkl", "mno"]
            .into_iter()
            .flat_map(|id| {
                [specific(id, "T1"), specific(id, "T2"), specific(id, "T3"), blanket(id)]
            })
            .collect();

        for _ in 0..200 {
            let mut store = CourseStore::new();
            let mut history = Vec::new();
            for _ in 0..rand::random_range(0..24) {
                let course = random_course();
                if rand::random_bool(0.75) {
                    store.add(course.clone()).unwrap();
                    history.push(format!("+{course}"));
                } else {
                    store.discard(&course).unwrap();
                    history.push(format!("-{course}"));
                }
            }

            let restored = CourseStore::from_compact(store.to_compact());
            let mut optimized = store.clone();
            optimized.optimize();
            assert_eq!(restored, optimized, "history: {history:?}");
            assert_eq!(restored.len(), optimized.len(), "history: {history:?}");
            for candidate in &universe {
                assert_eq!(
                    restored.contains(candidate),
                    store.contains(candidate),
                    "{candidate} after {history:?}"
                );
            }

            let once = optimized.len();
            optimized.optimize();
            assert_eq!(optimized.len(), once, "history: {history:?}");
            assert_eq!(optimized, restored, "history: {history:?}");
        }
    }

    #[test]
    fn serializes_as_compact_json() {
        let mut store = CourseStore::new();
        store.add(specific("def", "TOK2")).unwrap();
        store.add(blanket("abc")).unwrap();

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json, serde_json::json!([["def", "TOK2"], "abc"]));

        let restored: CourseStore = serde_json::from_value(json).unwrap();
        assert_eq!(restored, store);
    }
}
