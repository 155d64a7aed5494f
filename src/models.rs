//! Normalized target model of the `content` schema.
//!
//! Every table declares its fields once (`TargetTable::fields`); entity rows are produced as
//! `Vec<FieldValue>` in that same order, which is what the writer binds.
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

pub const FILM_WORK_TYPES: &[&str] = &["movie", "tv_show"];
pub const PERSON_ROLES: &[&str] = &["actor", "writer", "director"];

/// Declared type of a target field; drives coercion of legacy values and SQL binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    Uuid,
    Text,
    Float,
    Date,
    Timestamp,
    /// Text restricted to the listed variants.
    Enum(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
}

const fn field(name: &'static str, ty: FieldType, nullable: bool) -> FieldSpec {
    FieldSpec { name, ty, nullable }
}

const FILM_WORK_FIELDS: &[FieldSpec] = &[
    field("id", FieldType::Uuid, false),
    field("title", FieldType::Text, false),
    field("description", FieldType::Text, true),
    field("creation_date", FieldType::Date, true),
    field("certificate", FieldType::Text, true),
    field("file_path", FieldType::Text, true),
    field("rating", FieldType::Float, false),
    field("type", FieldType::Enum(FILM_WORK_TYPES), false),
    field("created_at", FieldType::Timestamp, false),
    field("updated_at", FieldType::Timestamp, false),
];

const GENRE_FIELDS: &[FieldSpec] = &[
    field("id", FieldType::Uuid, false),
    field("name", FieldType::Text, false),
    field("description", FieldType::Text, true),
    field("created_at", FieldType::Timestamp, false),
    field("updated_at", FieldType::Timestamp, false),
];

const PERSON_FIELDS: &[FieldSpec] = &[
    field("id", FieldType::Uuid, false),
    field("full_name", FieldType::Text, false),
    field("birth_date", FieldType::Date, true),
    field("created_at", FieldType::Timestamp, false),
    field("updated_at", FieldType::Timestamp, false),
];

const GENRE_FILM_WORK_FIELDS: &[FieldSpec] = &[
    field("id", FieldType::Uuid, false),
    field("film_work_id", FieldType::Uuid, false),
    field("genre_id", FieldType::Uuid, false),
    field("created_at", FieldType::Timestamp, false),
];

const PERSON_FILM_WORK_FIELDS: &[FieldSpec] = &[
    field("id", FieldType::Uuid, false),
    field("film_work_id", FieldType::Uuid, false),
    field("person_id", FieldType::Uuid, false),
    field("role", FieldType::Enum(PERSON_ROLES), true),
    field("created_at", FieldType::Timestamp, false),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTable {
    FilmWork,
    Genre,
    Person,
    GenreFilmWork,
    PersonFilmWork,
}

/// Entities before the link tables that reference them.
pub const WRITE_ORDER: [TargetTable; 5] = [
    TargetTable::FilmWork,
    TargetTable::Genre,
    TargetTable::Person,
    TargetTable::GenreFilmWork,
    TargetTable::PersonFilmWork,
];

impl TargetTable {
    pub fn name(self) -> &'static str {
        match self {
            TargetTable::FilmWork => "film_work",
            TargetTable::Genre => "genre",
            TargetTable::Person => "person",
            TargetTable::GenreFilmWork => "genre_film_work",
            TargetTable::PersonFilmWork => "person_film_work",
        }
    }

    pub fn fields(self) -> &'static [FieldSpec] {
        match self {
            TargetTable::FilmWork => FILM_WORK_FIELDS,
            TargetTable::Genre => GENRE_FIELDS,
            TargetTable::Person => PERSON_FIELDS,
            TargetTable::GenreFilmWork => GENRE_FILM_WORK_FIELDS,
            TargetTable::PersonFilmWork => PERSON_FILM_WORK_FIELDS,
        }
    }

    /// `(column, referenced table)`; every reference targets the referenced table's `id`.
    pub fn foreign_keys(self) -> &'static [(&'static str, TargetTable)] {
        match self {
            TargetTable::GenreFilmWork => &[
                ("film_work_id", TargetTable::FilmWork),
                ("genre_id", TargetTable::Genre),
            ],
            TargetTable::PersonFilmWork => &[
                ("film_work_id", TargetTable::FilmWork),
                ("person_id", TargetTable::Person),
            ],
            _ => &[],
        }
    }
}

impl fmt::Display for TargetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed, possibly absent value of one target field. `None` binds as a typed SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Uuid(Option<Uuid>),
    Text(Option<String>),
    Float(Option<f64>),
    Date(Option<NaiveDate>),
    Timestamp(Option<DateTime<Utc>>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Uuid(v) => v.is_none(),
            FieldValue::Text(v) => v.is_none(),
            FieldValue::Float(v) => v.is_none(),
            FieldValue::Date(v) => v.is_none(),
            FieldValue::Timestamp(v) => v.is_none(),
        }
    }

    /// Whether this value can be stored in a field declared as `ty`.
    pub fn fits(&self, ty: FieldType) -> bool {
        match (self, ty) {
            (FieldValue::Uuid(_), FieldType::Uuid)
            | (FieldValue::Float(_), FieldType::Float)
            | (FieldValue::Date(_), FieldType::Date)
            | (FieldValue::Timestamp(_), FieldType::Timestamp)
            | (FieldValue::Text(_), FieldType::Text) => true,
            (FieldValue::Text(None), FieldType::Enum(_)) => true,
            (FieldValue::Text(Some(v)), FieldType::Enum(allowed)) => allowed.contains(&v.as_str()),
            _ => false,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            FieldValue::Uuid(v) => *v,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilmWorkType {
    #[default]
    Movie,
    TvShow,
}

impl FilmWorkType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilmWorkType::Movie => "movie",
            FilmWorkType::TvShow => "tv_show",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PersonRole {
    Actor,
    Writer,
    Director,
}

impl PersonRole {
    pub fn as_str(self) -> &'static str {
        match self {
            PersonRole::Actor => "actor",
            PersonRole::Writer => "writer",
            PersonRole::Director => "director",
        }
    }
}

/// A row-shaped entity of one target table.
pub trait Record {
    /// Values aligned with the owning table's `fields()`.
    fn values(&self) -> Vec<FieldValue>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilmWork {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub certificate: Option<String>,
    pub file_path: Option<String>,
    pub rating: f64,
    pub kind: FilmWorkType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for FilmWork {
    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uuid(Some(self.id)),
            FieldValue::Text(Some(self.title.clone())),
            FieldValue::Text(self.description.clone()),
            FieldValue::Date(self.creation_date),
            FieldValue::Text(self.certificate.clone()),
            FieldValue::Text(self.file_path.clone()),
            FieldValue::Float(Some(self.rating)),
            FieldValue::Text(Some(self.kind.as_str().to_string())),
            FieldValue::Timestamp(Some(self.created_at)),
            FieldValue::Timestamp(Some(self.updated_at)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Genre {
    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uuid(Some(self.id)),
            FieldValue::Text(Some(self.name.clone())),
            FieldValue::Text(self.description.clone()),
            FieldValue::Timestamp(Some(self.created_at)),
            FieldValue::Timestamp(Some(self.updated_at)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for Person {
    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uuid(Some(self.id)),
            FieldValue::Text(Some(self.full_name.clone())),
            FieldValue::Date(self.birth_date),
            FieldValue::Timestamp(Some(self.created_at)),
            FieldValue::Timestamp(Some(self.updated_at)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilmWorkGenre {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub genre_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Record for FilmWorkGenre {
    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uuid(Some(self.id)),
            FieldValue::Uuid(Some(self.film_work_id)),
            FieldValue::Uuid(Some(self.genre_id)),
            FieldValue::Timestamp(Some(self.created_at)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilmWorkPerson {
    pub id: Uuid,
    pub film_work_id: Uuid,
    pub person_id: Uuid,
    pub role: Option<PersonRole>,
    pub created_at: DateTime<Utc>,
}

impl Record for FilmWorkPerson {
    fn values(&self) -> Vec<FieldValue> {
        vec![
            FieldValue::Uuid(Some(self.id)),
            FieldValue::Uuid(Some(self.film_work_id)),
            FieldValue::Uuid(Some(self.person_id)),
            FieldValue::Text(self.role.map(|r| r.as_str().to_string())),
            FieldValue::Timestamp(Some(self.created_at)),
        ]
    }
}

/// Output of one normalization pass, one collection per target table.
#[derive(Debug, Clone, Default)]
pub struct EntityBatch {
    pub film_works: Vec<FilmWork>,
    pub genres: Vec<Genre>,
    pub persons: Vec<Person>,
    pub genre_film_works: Vec<FilmWorkGenre>,
    pub person_film_works: Vec<FilmWorkPerson>,
}

impl EntityBatch {
    pub fn len(&self, table: TargetTable) -> usize {
        match table {
            TargetTable::FilmWork => self.film_works.len(),
            TargetTable::Genre => self.genres.len(),
            TargetTable::Person => self.persons.len(),
            TargetTable::GenreFilmWork => self.genre_film_works.len(),
            TargetTable::PersonFilmWork => self.person_film_works.len(),
        }
    }

    /// Rows of `table` as bindable values, in collection order.
    pub fn rows(&self, table: TargetTable) -> Vec<Vec<FieldValue>> {
        fn collect<R: Record>(items: &[R]) -> Vec<Vec<FieldValue>> {
            items.iter().map(Record::values).collect()
        }
        match table {
            TargetTable::FilmWork => collect(&self.film_works),
            TargetTable::Genre => collect(&self.genres),
            TargetTable::Person => collect(&self.persons),
            TargetTable::GenreFilmWork => collect(&self.genre_film_works),
            TargetTable::PersonFilmWork => collect(&self.person_film_works),
        }
    }
}
