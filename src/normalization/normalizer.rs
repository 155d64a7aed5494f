use std::collections::HashMap;

use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::coerce::coerce;
use super::identity::{self, GenreRegistry, PersonRegistry, Roster};
use super::rating::LegacyRating;
use crate::error::{EtlError, EtlResult};
use crate::legacy::{tables, LegacyId, LegacyRow, LegacySnapshot, LegacyTable};
use crate::models::{
    EntityBatch, FieldType, FieldValue, FilmWork, FilmWorkGenre, FilmWorkPerson, FilmWorkType,
    PersonRole,
};

/// Film legacy id → actor legacy ids, each actor once per film.
type CastByFilm = HashMap<LegacyId, IndexSet<LegacyId>>;

/// Reshapes the legacy snapshot into the five target collections.
///
/// Identity maps live for this call only. Any unresolvable reference aborts the whole pass:
/// a film with a partial credit list is worse than no film.
#[instrument(skip_all)]
pub fn normalize(snapshot: &LegacySnapshot, now: DateTime<Utc>) -> EtlResult<EntityBatch> {
    let movies = snapshot.table(tables::MOVIES)?;
    movies.require_columns(tables::MOVIES_COLUMNS)?;
    let actors = snapshot.table(tables::ACTORS)?;
    actors.require_columns(tables::ROSTER_COLUMNS)?;
    let writers = snapshot.table(tables::WRITERS)?;
    writers.require_columns(tables::ROSTER_COLUMNS)?;
    let movie_actors = snapshot.table(tables::MOVIE_ACTORS)?;
    movie_actors.require_columns(tables::MOVIE_ACTORS_COLUMNS)?;

    let mut pass = Pass {
        now,
        people: PersonRegistry::new(now),
        genres: GenreRegistry::new(now),
        cast: cast_by_film(movie_actors)?,
        batch: EntityBatch::default(),
    };
    pass.register_roster(actors, Roster::Actors);
    pass.register_roster(writers, Roster::Writers);

    for (idx, row) in movies.rows.iter().enumerate() {
        pass.film(idx, row)?;
    }

    let Pass {
        people,
        genres,
        mut batch,
        ..
    } = pass;
    batch.genres = genres.into_genres();
    batch.persons = people.into_persons();
    info!(
        film_works = batch.film_works.len(),
        genres = batch.genres.len(),
        persons = batch.persons.len(),
        genre_links = batch.genre_film_works.len(),
        person_links = batch.person_film_works.len(),
        "normalized legacy snapshot"
    );
    Ok(batch)
}

struct Pass {
    now: DateTime<Utc>,
    people: PersonRegistry,
    genres: GenreRegistry,
    cast: CastByFilm,
    batch: EntityBatch,
}

impl Pass {
    fn register_roster(&mut self, table: &LegacyTable, roster: Roster) {
        for (idx, row) in table.rows.iter().enumerate() {
            let (Some(legacy), Some(name)) = (LegacyId::from_raw(row.get("id")), text(row, "name"))
            else {
                warn!(table = %table.name, row = idx + 1, "roster row without id or name; skipped");
                continue;
            };
            self.people.register(roster, legacy, &name);
        }
    }

    fn film(&mut self, idx: usize, row: &LegacyRow) -> EtlResult<()> {
        let legacy = LegacyId::from_raw(row.get("id")).ok_or_else(|| {
            EtlError::normalization(format!("at row {}", idx + 1), "missing film id")
        })?;
        let film_label = legacy.to_string();
        let title = text(row, "title")
            .ok_or_else(|| EtlError::normalization(&film_label, "missing title"))?;
        let legacy_uuid = coerce(row.get("id"), FieldType::Uuid)
            .ok()
            .and_then(|v| v.as_uuid());
        let film_id = identity::film_work_id(&legacy, legacy_uuid);

        self.batch.film_works.push(FilmWork {
            id: film_id,
            title,
            description: text(row, "plot"),
            creation_date: None,
            certificate: None,
            file_path: None,
            rating: LegacyRating::from_raw(row.get("imdb_rating")).stored(),
            kind: FilmWorkType::Movie,
            created_at: self.now,
            updated_at: self.now,
        });

        let mut film_genres: IndexSet<Uuid> = IndexSet::new();
        if let Some(list) = text(row, "genre") {
            for name in split_names(&list) {
                film_genres.insert(self.genres.resolve(name));
            }
        }
        for genre_id in film_genres {
            self.batch.genre_film_works.push(FilmWorkGenre {
                id: identity::genre_film_work_id(film_id, genre_id),
                film_work_id: film_id,
                genre_id,
                created_at: self.now,
            });
        }

        let credits = self.credits(&legacy, &film_label, row)?;
        for (person_id, role) in credits {
            self.batch.person_film_works.push(FilmWorkPerson {
                id: identity::person_film_work_id(film_id, person_id, role),
                film_work_id: film_id,
                person_id,
                role: Some(role),
                created_at: self.now,
            });
        }
        Ok(())
    }

    /// Writers, then directors, then actors; a (person, role) pair appears once.
    fn credits(
        &mut self,
        legacy: &LegacyId,
        film: &str,
        row: &LegacyRow,
    ) -> EtlResult<IndexSet<(Uuid, PersonRole)>> {
        let mut credits = IndexSet::new();

        let mut writer_ids: Vec<LegacyId> = LegacyId::from_raw(row.get("writer")).into_iter().collect();
        if let Some(raw) = text(row, "writers") {
            let listed = parse_writer_list(&raw)
                .map_err(|reason| EtlError::normalization(film, format!("writers: {reason}")))?;
            writer_ids.extend(listed);
        }
        for writer in &writer_ids {
            let person = self
                .people
                .by_legacy_id(Roster::Writers, writer)
                .ok_or_else(|| EtlError::normalization(film, format!("unknown writer id '{writer}'")))?;
            credits.insert((person, PersonRole::Writer));
        }

        if let Some(list) = text(row, "director") {
            for name in split_names(&list) {
                credits.insert((self.people.resolve_name(name), PersonRole::Director));
            }
        }

        if let Some(cast) = self.cast.get(legacy) {
            for actor in cast {
                let person = self
                    .people
                    .by_legacy_id(Roster::Actors, actor)
                    .ok_or_else(|| EtlError::normalization(film, format!("unknown actor id '{actor}'")))?;
                credits.insert((person, PersonRole::Actor));
            }
        }
        Ok(credits)
    }
}

fn cast_by_film(table: &LegacyTable) -> EtlResult<CastByFilm> {
    let mut cast = CastByFilm::new();
    for (idx, row) in table.rows.iter().enumerate() {
        let film = LegacyId::from_raw(row.get("movie_id"));
        let actor = LegacyId::from_raw(row.get("actor_id"));
        let (Some(film), Some(actor)) = (film, actor) else {
            return Err(EtlError::normalization(
                format!("{} row {}", table.name, idx + 1),
                "association row without movie_id or actor_id",
            ));
        };
        cast.entry(film).or_default().insert(actor);
    }
    Ok(cast)
}

/// Trimmed text of `column`, absent when null or blank.
fn text(row: &LegacyRow, column: &str) -> Option<String> {
    match coerce(row.get(column), FieldType::Text) {
        Ok(FieldValue::Text(v)) => v,
        _ => None,
    }
}

fn split_names(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|n| !n.is_empty())
}

/// `[{"id": "w1"}, {"id": 2}]` → legacy ids. Objects without an `id` key use their first value
/// in document order.
fn parse_writer_list(raw: &str) -> Result<Vec<LegacyId>, String> {
    let entries: Vec<serde_json::Map<String, Value>> =
        serde_json::from_str(raw).map_err(|e| format!("malformed JSON list: {e}"))?;
    entries
        .iter()
        .enumerate()
        .map(|(pos, entry)| {
            let value = entry.get("id").or_else(|| entry.values().next());
            let id = match value {
                Some(Value::String(s)) => LegacyId::from_text(s),
                Some(Value::Number(n)) => LegacyId::from_text(&n.to_string()),
                _ => None,
            };
            id.ok_or_else(|| format!("entry {pos} has no usable id"))
        })
        .collect()
}
