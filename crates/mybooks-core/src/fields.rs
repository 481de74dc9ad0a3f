//! Caller-supplied field sets
//!
//! `*Fields` are the mutable, non-relational fields of an entity and are used
//! both for creation and for full replacement. `*Patch` types carry a subset
//! of those fields; nullable fields use a double `Option` so that an absent
//! key (leave as is) differs from an explicit `null` (clear the value).

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::models::{Author, Book, List};

/// Deserialize a present key (even `null`) as `Some(..)`
fn present<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Keep only the first occurrence of each id
pub(crate) fn dedup_ids(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

// ==================== Author ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorFields {
    pub name: String,
    #[serde(default)]
    pub born: Option<NaiveDate>,
    #[serde(default)]
    pub died: Option<NaiveDate>,
    #[serde(default)]
    pub nationality: Option<String>,
    #[serde(default)]
    pub biography: Option<String>,
}

impl AuthorFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Overwrite every mutable field of `author`
    pub fn apply_to(&self, author: &mut Author) {
        author.name = self.name.clone();
        author.born = self.born;
        author.died = self.died;
        author.nationality = self.nationality.clone();
        author.biography = self.biography.clone();
    }

    /// Build a new author with a fresh id
    pub fn into_author(self) -> Author {
        let mut author = Author::new(self.name.clone());
        self.apply_to(&mut author);
        author
    }
}

impl From<&Author> for AuthorFields {
    fn from(author: &Author) -> Self {
        Self {
            name: author.name.clone(),
            born: author.born,
            died: author.died,
            nationality: author.nationality.clone(),
            biography: author.biography.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub born: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub died: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub nationality: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub biography: Option<Option<String>>,
}

impl AuthorPatch {
    pub fn apply_to(&self, fields: &mut AuthorFields) {
        if let Some(name) = &self.name {
            fields.name = name.clone();
        }
        if let Some(born) = self.born {
            fields.born = born;
        }
        if let Some(died) = self.died {
            fields.died = died;
        }
        if let Some(nationality) = &self.nationality {
            fields.nationality = nationality.clone();
        }
        if let Some(biography) = &self.biography {
            fields.biography = biography.clone();
        }
    }
}

// ==================== Book ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookFields {
    pub title: String,
    #[serde(default)]
    pub book_type: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    pub publication_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: Option<String>,
}

impl BookFields {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Overwrite the descriptive fields of `book`; membership is untouched
    pub fn apply_to(&self, book: &mut Book) {
        book.title = self.title.clone();
        book.book_type = self.book_type.clone();
        book.genre = self.genre.clone();
        book.publication_date = self.publication_date;
        book.description = self.description.clone();
    }
}

impl From<&Book> for BookFields {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            book_type: book.book_type.clone(),
            genre: book.genre.clone(),
            publication_date: book.publication_date,
            description: book.description.clone(),
        }
    }
}

/// A book to create, with the ids of its authors and lists
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookForCreation {
    #[serde(flatten)]
    pub fields: BookFields,
    pub authors: Vec<Uuid>,
    #[serde(default)]
    pub lists: Vec<Uuid>,
}

impl BookForCreation {
    pub fn new(title: impl Into<String>, authors: Vec<Uuid>) -> Self {
        Self {
            fields: BookFields::new(title),
            authors,
            lists: Vec::new(),
        }
    }

    pub fn in_lists(mut self, lists: Vec<Uuid>) -> Self {
        self.lists = lists;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub book_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub genre: Option<Option<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl BookPatch {
    pub fn apply_to(&self, fields: &mut BookFields) {
        if let Some(title) = &self.title {
            fields.title = title.clone();
        }
        if let Some(book_type) = &self.book_type {
            fields.book_type = book_type.clone();
        }
        if let Some(genre) = &self.genre {
            fields.genre = genre.clone();
        }
        if let Some(date) = self.publication_date {
            fields.publication_date = date;
        }
        if let Some(description) = &self.description {
            fields.description = description.clone();
        }
    }
}

// ==================== List ====================

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListFields {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ListFields {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn apply_to(&self, list: &mut List) {
        list.name = self.name.clone();
        list.description = self.description.clone();
    }
}

impl From<&List> for ListFields {
    fn from(list: &List) -> Self {
        Self {
            name: list.name.clone(),
            description: list.description.clone(),
        }
    }
}

/// A list to create, with the ids of the books it starts with
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListForCreation {
    #[serde(flatten)]
    pub fields: ListFields,
    #[serde(default)]
    pub books: Vec<Uuid>,
}

impl ListForCreation {
    pub fn new(name: impl Into<String>, books: Vec<Uuid>) -> Self {
        Self {
            fields: ListFields::new(name),
            books,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl ListPatch {
    pub fn apply_to(&self, fields: &mut ListFields) {
        if let Some(name) = &self.name {
            fields.name = name.clone();
        }
        if let Some(description) = &self.description {
            fields.description = description.clone();
        }
    }
}
