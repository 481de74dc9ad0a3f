//! Data models for MyBooks
//!
//! Defines the three catalog entities (Author, Book, List) and the shorthand
//! projections they embed of each other. Mirror collections behave like
//! ordered sets keyed by id: the mutation helpers are idempotent and report
//! whether anything changed.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::ETag;

/// Display projection of an Author, embedded in Books and List items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorShorthand {
    pub id: Uuid,
    pub name: String,
}

/// Display projection of a Book, embedded in Authors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookShorthand {
    pub id: Uuid,
    pub title: String,
}

/// Display projection of a List, embedded in Books
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListShorthand {
    pub id: Uuid,
    pub name: String,
}

/// An entry in a List: the Book plus who wrote it and when it was added
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BookListItem {
    pub id: Uuid,
    pub title: String,
    pub authors: Vec<AuthorShorthand>,
    pub date_added: DateTime<Utc>,
}

/// An author and the books they wrote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    /// Unique identifier (also the partition key)
    pub id: Uuid,
    pub name: String,
    pub born: Option<NaiveDate>,
    pub died: Option<NaiveDate>,
    pub nationality: Option<String>,
    pub biography: Option<String>,
    /// Mirror of every Book listing this Author
    #[serde(default)]
    pub books: Vec<BookShorthand>,
    /// Entity tag this instance was read with
    #[serde(skip)]
    pub etag: Option<ETag>,
}

impl Author {
    /// Create a new author with a fresh id and no books
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            born: None,
            died: None,
            nationality: None,
            biography: None,
            books: Vec::new(),
            etag: None,
        }
    }

    /// The shorthand other documents embed for this author
    pub fn shorthand(&self) -> AuthorShorthand {
        AuthorShorthand {
            id: self.id,
            name: self.name.clone(),
        }
    }

    pub fn has_book(&self, book_id: Uuid) -> bool {
        self.books.iter().any(|b| b.id == book_id)
    }

    /// Add a book to the mirror. Returns false if it was already present.
    pub fn add_book(&mut self, book: BookShorthand) -> bool {
        if self.has_book(book.id) {
            return false;
        }
        self.books.push(book);
        true
    }

    /// Remove a book from the mirror. Returns false if it was absent.
    pub fn remove_book(&mut self, book_id: Uuid) -> bool {
        let before = self.books.len();
        self.books.retain(|b| b.id != book_id);
        self.books.len() != before
    }
}

/// A book, the authors who wrote it and the lists it appears in
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Unique identifier (also the partition key)
    pub id: Uuid,
    pub title: String,
    pub book_type: Option<String>,
    pub genre: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub description: Option<String>,
    /// Authoritative authorship; never empty while the book exists
    #[serde(default)]
    pub authors: Vec<AuthorShorthand>,
    /// Mirror of every List holding this Book
    #[serde(default)]
    pub lists: Vec<ListShorthand>,
    #[serde(skip)]
    pub etag: Option<ETag>,
}

impl Book {
    /// Create a new book with a fresh id, no authors and no lists
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            book_type: None,
            genre: None,
            publication_date: None,
            description: None,
            authors: Vec::new(),
            lists: Vec::new(),
            etag: None,
        }
    }

    pub fn shorthand(&self) -> BookShorthand {
        BookShorthand {
            id: self.id,
            title: self.title.clone(),
        }
    }

    /// The item a List embeds for this book, stamped with the current time
    pub fn list_item(&self) -> BookListItem {
        BookListItem {
            id: self.id,
            title: self.title.clone(),
            authors: self.authors.clone(),
            date_added: Utc::now(),
        }
    }

    pub fn has_author(&self, author_id: Uuid) -> bool {
        self.authors.iter().any(|a| a.id == author_id)
    }

    /// True when `author_id` is the one and only author of this book
    pub fn is_sole_author(&self, author_id: Uuid) -> bool {
        self.authors.len() == 1 && self.authors[0].id == author_id
    }

    pub fn add_author(&mut self, author: AuthorShorthand) -> bool {
        if self.has_author(author.id) {
            return false;
        }
        self.authors.push(author);
        true
    }

    pub fn remove_author(&mut self, author_id: Uuid) -> bool {
        let before = self.authors.len();
        self.authors.retain(|a| a.id != author_id);
        self.authors.len() != before
    }

    pub fn in_list(&self, list_id: Uuid) -> bool {
        self.lists.iter().any(|l| l.id == list_id)
    }

    pub fn add_list(&mut self, list: ListShorthand) -> bool {
        if self.in_list(list.id) {
            return false;
        }
        self.lists.push(list);
        true
    }

    pub fn remove_list(&mut self, list_id: Uuid) -> bool {
        let before = self.lists.len();
        self.lists.retain(|l| l.id != list_id);
        self.lists.len() != before
    }
}

/// A named, user-curated collection of books
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct List {
    /// Unique identifier (also the partition key)
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Mirror of every Book in this List, in insertion order
    #[serde(default)]
    pub books: Vec<BookListItem>,
    #[serde(skip)]
    pub etag: Option<ETag>,
}

impl List {
    /// Create a new, empty list with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            books: Vec::new(),
            etag: None,
        }
    }

    pub fn shorthand(&self) -> ListShorthand {
        ListShorthand {
            id: self.id,
            name: self.name.clone(),
        }
    }

    pub fn has_book(&self, book_id: Uuid) -> bool {
        self.books.iter().any(|b| b.id == book_id)
    }

    pub fn add_book(&mut self, item: BookListItem) -> bool {
        if self.has_book(item.id) {
            return false;
        }
        self.books.push(item);
        true
    }

    pub fn remove_book(&mut self, book_id: Uuid) -> bool {
        let before = self.books.len();
        self.books.retain(|b| b.id != book_id);
        self.books.len() != before
    }

    /// Show `author` on the item for `book_id`, if the book is in this list
    pub fn add_item_author(&mut self, book_id: Uuid, author: &AuthorShorthand) -> bool {
        match self.books.iter_mut().find(|b| b.id == book_id) {
            Some(item) if !item.authors.iter().any(|a| a.id == author.id) => {
                item.authors.push(author.clone());
                true
            }
            _ => false,
        }
    }

    /// Stop showing `author_id` on the item for `book_id`
    pub fn remove_item_author(&mut self, book_id: Uuid, author_id: Uuid) -> bool {
        match self.books.iter_mut().find(|b| b.id == book_id) {
            Some(item) => {
                let before = item.authors.len();
                item.authors.retain(|a| a.id != author_id);
                item.authors.len() != before
            }
            None => false,
        }
    }
}
