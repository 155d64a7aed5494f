//! Identity assignment and the name-keyed identity maps of one normalization pass.
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::legacy::LegacyId;
use crate::models::{Genre, Person, PersonRole};

/// Namespace for every id this loader derives. Changing it re-keys the whole target.
const NAMESPACE: Uuid = Uuid::from_u128(0x6d2c_71a4_4a5e_4c7e_9a53_0b8e_1f2d_7c41);

fn derive(kind: &str, key: &str) -> Uuid {
    Uuid::new_v5(&NAMESPACE, format!("{kind}:{key}").as_bytes())
}

/// A film keeps its legacy id when that is already a UUID.
pub fn film_work_id(legacy: &LegacyId, parsed: Option<Uuid>) -> Uuid {
    parsed.unwrap_or_else(|| derive("film_work", legacy.as_str()))
}

pub fn genre_id(name: &str) -> Uuid {
    derive("genre", name)
}

pub fn person_id(full_name: &str) -> Uuid {
    derive("person", full_name)
}

pub fn genre_film_work_id(film: Uuid, genre: Uuid) -> Uuid {
    derive("genre_film_work", &format!("{film}:{genre}"))
}

pub fn person_film_work_id(film: Uuid, person: Uuid, role: PersonRole) -> Uuid {
    derive("person_film_work", &format!("{film}:{person}:{}", role.as_str()))
}

/// Genres by name; first sighting mints the identity.
#[derive(Debug)]
pub struct GenreRegistry {
    now: DateTime<Utc>,
    by_name: IndexMap<String, Genre>,
}

impl GenreRegistry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            by_name: IndexMap::new(),
        }
    }

    pub fn resolve(&mut self, name: &str) -> Uuid {
        let now = self.now;
        self.by_name
            .entry(name.to_string())
            .or_insert_with(|| Genre {
                id: genre_id(name),
                name: name.to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .id
    }

    pub fn into_genres(self) -> Vec<Genre> {
        self.by_name.into_values().collect()
    }
}

/// Legacy roster a person id belongs to; actor and writer ids live in separate id spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Roster {
    Actors,
    Writers,
}

/// People by full name, plus per-roster legacy id → identity.
///
/// Dedup is by name only: two different people sharing a name become one person, in any role.
#[derive(Debug)]
pub struct PersonRegistry {
    now: DateTime<Utc>,
    by_name: IndexMap<String, Person>,
    by_legacy_id: HashMap<(Roster, LegacyId), Uuid>,
}

impl PersonRegistry {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            by_name: IndexMap::new(),
            by_legacy_id: HashMap::new(),
        }
    }

    /// Lookup-or-create by name.
    pub fn resolve_name(&mut self, full_name: &str) -> Uuid {
        let now = self.now;
        self.by_name
            .entry(full_name.to_string())
            .or_insert_with(|| Person {
                id: person_id(full_name),
                full_name: full_name.to_string(),
                birth_date: None,
                created_at: now,
                updated_at: now,
            })
            .id
    }

    /// Registers a roster row; the name decides the identity.
    pub fn register(&mut self, roster: Roster, legacy: LegacyId, full_name: &str) -> Uuid {
        let id = self.resolve_name(full_name);
        self.by_legacy_id.insert((roster, legacy), id);
        id
    }

    pub fn by_legacy_id(&self, roster: Roster, legacy: &LegacyId) -> Option<Uuid> {
        self.by_legacy_id.get(&(roster, legacy.clone())).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn into_persons(self) -> Vec<Person> {
        self.by_name.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_ids_are_stable_and_distinct() {
        assert_eq!(genre_id("Drama"), genre_id("Drama"));
        assert_ne!(genre_id("Drama"), person_id("Drama"));
        let film = Uuid::new_v4();
        let person = person_id("Jane Doe");
        assert_ne!(
            person_film_work_id(film, person, PersonRole::Writer),
            person_film_work_id(film, person, PersonRole::Director)
        );
    }

    #[test]
    fn legacy_uuid_film_ids_are_reused() {
        let legacy = LegacyId::from_text("tt0076759").unwrap();
        let existing = Uuid::new_v4();
        assert_eq!(film_work_id(&legacy, Some(existing)), existing);
        assert_eq!(film_work_id(&legacy, None), film_work_id(&legacy, None));
    }

    #[test]
    fn first_genre_sighting_wins() {
        let mut genres = GenreRegistry::new(Utc::now());
        let a = genres.resolve("Action");
        let d = genres.resolve("Drama");
        assert_eq!(genres.resolve("Action"), a);
        let out = genres.into_genres();
        assert_eq!(out.iter().map(|g| g.id).collect::<Vec<_>>(), vec![a, d]);
    }

    #[test]
    fn one_person_per_name_across_rosters_and_roles() {
        let mut people = PersonRegistry::new(Utc::now());
        let w = people.register(Roster::Writers, LegacyId::from_text("w1").unwrap(), "Jane Doe");
        let a = people.register(Roster::Actors, LegacyId::from_text("1").unwrap(), "Jane Doe");
        assert_eq!(w, a);
        assert_eq!(people.resolve_name("Jane Doe"), w);
        assert_eq!(people.len(), 1);

        // same legacy id in the other roster is a different key
        assert_eq!(
            people.by_legacy_id(Roster::Actors, &LegacyId::from_text("w1").unwrap()),
            None
        );
        assert_eq!(
            people.by_legacy_id(Roster::Writers, &LegacyId::from_text("w1").unwrap()),
            Some(w)
        );
    }
}
