//! Replicated spacecraft registries: an ordered list of shared records, each
//! owned by one or more spacecraft, plus an identifier → entry index kept in
//! sync on every change.
//!
//! Entries come and go dynamically, so callers never see indices. Everything
//! external is keyed by [`SpacecraftId`].

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// SpacecraftId
// ---------------------------------------------------------------------------

/// Globally unique spacecraft identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpacecraftId(pub u64);

// ---------------------------------------------------------------------------
// RegistryEntry
// ---------------------------------------------------------------------------

/// One record and the spacecraft sharing it (a convoy, or a docked group).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry<T> {
    /// Spacecraft sharing this record. Never empty.
    pub identifiers: Vec<SpacecraftId>,
    /// The shared record.
    pub record: T,
}

// ---------------------------------------------------------------------------
// SpacecraftRegistry
// ---------------------------------------------------------------------------

/// Mapping from spacecraft to a shared record, with each spacecraft present
/// in at most one entry.
#[derive(Debug, Clone)]
pub struct SpacecraftRegistry<T> {
    entries: Vec<RegistryEntry<T>>,
    index: HashMap<SpacecraftId, usize>,
}

impl<T> SpacecraftRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Builds a registry from raw entries (e.g. after deserialization).
    ///
    /// Empty entries are dropped and an identifier listed twice keeps only its
    /// last occurrence.
    pub fn from_entries(entries: Vec<RegistryEntry<T>>) -> Self {
        let mut registry = Self::new();
        for entry in entries {
            registry.insert(entry.identifiers, entry.record);
        }
        registry
    }

    /// Adds one record shared by `identifiers`, first detaching each of them
    /// from whatever entry held them.
    pub fn insert(&mut self, identifiers: Vec<SpacecraftId>, record: T) {
        let mut unique: Vec<SpacecraftId> = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            if !unique.contains(&identifier) {
                unique.push(identifier);
            }
        }
        if unique.is_empty() {
            return;
        }

        for identifier in &unique {
            self.detach(*identifier);
        }
        self.entries.push(RegistryEntry {
            identifiers: unique,
            record,
        });
        self.rebuild_index();
    }

    /// Removes a spacecraft. The shared record is dropped once nobody uses it.
    /// Returns `true` when the spacecraft was present.
    pub fn remove(&mut self, identifier: SpacecraftId) -> bool {
        let removed = self.detach(identifier);
        if removed {
            self.rebuild_index();
        }
        removed
    }

    /// Removes several spacecraft at once.
    pub fn remove_all(&mut self, identifiers: &[SpacecraftId]) {
        let mut changed = false;
        for identifier in identifiers {
            changed |= self.detach(*identifier);
        }
        if changed {
            self.rebuild_index();
        }
    }

    /// Record for a spacecraft, if any.
    pub fn get(&self, identifier: SpacecraftId) -> Option<&T> {
        self.entry(identifier).map(|entry| &entry.record)
    }

    /// Entry holding a spacecraft, if any.
    pub fn entry(&self, identifier: SpacecraftId) -> Option<&RegistryEntry<T>> {
        self.index
            .get(&identifier)
            .and_then(|index| self.entries.get(*index))
    }

    /// Whether the spacecraft has a record.
    pub fn contains(&self, identifier: SpacecraftId) -> bool {
        self.index.contains_key(&identifier)
    }

    /// All entries.
    pub fn entries(&self) -> &[RegistryEntry<T>] {
        &self.entries
    }

    /// Every (spacecraft, record) pair.
    pub fn iter(&self) -> impl Iterator<Item = (SpacecraftId, &T)> {
        self.entries.iter().flat_map(|entry| {
            entry
                .identifiers
                .iter()
                .map(move |identifier| (*identifier, &entry.record))
        })
    }

    /// All spacecraft with a record.
    pub fn identifiers(&self) -> impl Iterator<Item = SpacecraftId> + '_ {
        self.index.keys().copied()
    }

    /// Number of spacecraft with a record.
    pub fn spacecraft_count(&self) -> usize {
        self.index.len()
    }

    /// Number of distinct records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes a spacecraft out of its entry without reindexing. Empty entries
    /// are dropped.
    fn detach(&mut self, identifier: SpacecraftId) -> bool {
        let Some(&position) = self.index.get(&identifier) else {
            return false;
        };
        self.index.remove(&identifier);

        let entry = &mut self.entries[position];
        entry.identifiers.retain(|id| *id != identifier);
        if entry.identifiers.is_empty() {
            self.entries.remove(position);
            // Later entries shifted down by one.
            for slot in self.index.values_mut() {
                if *slot > position {
                    *slot -= 1;
                }
            }
        }
        true
    }

    /// Rebuilds the identifier → entry index from the entry list.
    fn rebuild_index(&mut self) {
        self.index.clear();
        for (position, entry) in self.entries.iter().enumerate() {
            for identifier in &entry.identifiers {
                let previous = self.index.insert(*identifier, position);
                debug_assert!(
                    previous.is_none(),
                    "spacecraft {identifier:?} listed in two registry entries"
                );
            }
        }
    }
}

impl<T: PartialEq> SpacecraftRegistry<T> {
    /// Sets a single spacecraft's record as part of a group. It joins an
    /// existing entry only when that entry holds the same record and every
    /// member is listed in `shared_with`; otherwise it gets an entry of its
    /// own. Replicas use this to rebuild the authority's entries from
    /// per-spacecraft updates.
    pub fn upsert_grouped(&mut self, identifier: SpacecraftId, shared_with: &[SpacecraftId], record: T) {
        let joinable = |entry: &RegistryEntry<T>| {
            entry.record == record
                && entry
                    .identifiers
                    .iter()
                    .all(|member| *member == identifier || shared_with.contains(member))
        };
        let unchanged = self.entry(identifier).is_some_and(|entry| {
            joinable(entry)
                && shared_with
                    .iter()
                    .all(|member| *member == identifier || entry.identifiers.contains(member))
        });
        if unchanged {
            return;
        }

        self.detach(identifier);
        match self.entries.iter().position(|entry| joinable(entry)) {
            Some(position) => self.entries[position].identifiers.push(identifier),
            None => self.entries.push(RegistryEntry {
                identifiers: vec![identifier],
                record,
            }),
        }
        self.rebuild_index();
    }
}

impl<T> Default for SpacecraftRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Serialize for SpacecraftRegistry<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for SpacecraftRegistry<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<RegistryEntry<T>>::deserialize(deserializer)?;
        Ok(Self::from_entries(entries))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
