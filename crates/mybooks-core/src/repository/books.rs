//! Book lifecycle and Book/Author linking

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Repository, RepositoryError, RepositoryResult};
use crate::fields::{dedup_ids, BookFields, BookForCreation, BookPatch};
use crate::document::EntityKind;
use crate::models::{Author, Book, List};
use crate::storage::DocumentStore;

impl<S: DocumentStore> Repository<S> {
    /// Create a book and add it to its authors and lists
    ///
    /// Every referenced author and list is checked before anything is
    /// written. The book itself is written before any mirror.
    pub async fn create_book(&self, input: BookForCreation) -> RepositoryResult<Uuid> {
        let author_ids = dedup_ids(&input.authors);
        if author_ids.is_empty() {
            return Err(RepositoryError::InvalidOperation(
                "a book needs at least one author".to_string(),
            ));
        }

        let mut authors = Vec::with_capacity(author_ids.len());
        for id in author_ids {
            authors.push(self.fetch::<Author>(id).await?);
        }
        let mut lists = Vec::new();
        for id in dedup_ids(&input.lists) {
            lists.push(self.fetch::<List>(id).await?);
        }

        let mut book = Book::new(input.fields.title.clone());
        input.fields.apply_to(&mut book);
        book.authors = authors.iter().map(Author::shorthand).collect();
        book.lists = lists.iter().map(List::shorthand).collect();
        self.insert(&mut book).await?;

        let shorthand = book.shorthand();
        for author in &authors {
            debug!(book = %book.id, author = %author.id, "mirroring book on author");
            self.mutate_existing(author.id, |author: &mut Author| {
                author.add_book(shorthand.clone())
            })
            .await?;
        }

        let item = book.list_item();
        for list in &lists {
            debug!(book = %book.id, list = %list.id, "mirroring book on list");
            self.mutate_existing(list.id, |list: &mut List| list.add_book(item.clone()))
                .await?;
        }

        info!(
            book = %book.id,
            title = %book.title,
            authors = book.authors.len(),
            lists = book.lists.len(),
            "created book"
        );
        Ok(book.id)
    }

    /// Overwrite a book's descriptive fields, re-reading it first
    pub async fn update_book(&self, id: Uuid, fields: &BookFields) -> RepositoryResult<Book> {
        let book = self
            .mutate_existing(id, |book: &mut Book| {
                if BookFields::from(&*book) == *fields {
                    return false;
                }
                fields.apply_to(book);
                true
            })
            .await?;
        info!(book = %id, "updated book");
        Ok(book)
    }

    /// Overwrite the descriptive fields of a book the caller already read
    pub async fn update_book_from(
        &self,
        mut book: Book,
        fields: &BookFields,
    ) -> RepositoryResult<Book> {
        fields.apply_to(&mut book);
        self.save_instance(&mut book).await?;
        info!(book = %book.id, "updated book");
        Ok(book)
    }

    /// Apply a partial update on top of the current stored book
    pub async fn patch_book(&self, id: Uuid, patch: &BookPatch) -> RepositoryResult<Book> {
        let book = self
            .mutate_existing(id, |book: &mut Book| {
                let current = BookFields::from(&*book);
                let mut patched = current.clone();
                patch.apply_to(&mut patched);
                if patched == current {
                    return false;
                }
                patched.apply_to(book);
                true
            })
            .await?;
        info!(book = %id, "patched book");
        Ok(book)
    }

    /// Delete a book, removing it from its authors and lists first
    pub async fn delete_book(&self, id: Uuid) -> RepositoryResult<()> {
        let book: Book = self.fetch(id).await?;
        self.cascade_delete_book(book, None).await
    }

    /// Delete a book the caller already read
    pub async fn delete_book_from(&self, book: Book) -> RepositoryResult<()> {
        self.cascade_delete_book(book, None).await
    }

    /// Add an author to a book
    ///
    /// Also shows the author on the book's entries in every list it is in.
    pub async fn add_author(&self, book_id: Uuid, author_id: Uuid) -> RepositoryResult<()> {
        let book: Book = self.fetch(book_id).await?;
        let author: Author = self.fetch(author_id).await?;

        let book_shorthand = book.shorthand();
        self.mutate_existing(author_id, |author: &mut Author| {
            author.add_book(book_shorthand.clone())
        })
        .await?;

        let author_shorthand = author.shorthand();
        let book = self
            .mutate_existing(book_id, |book: &mut Book| {
                book.add_author(author_shorthand.clone())
            })
            .await?;

        for list in &book.lists {
            let touched = self
                .mutate(list.id, |list: &mut List| {
                    list.add_item_author(book_id, &author_shorthand)
                })
                .await?;
            if touched.is_none() {
                warn!(book = %book_id, list = %list.id, "skipping vanished list");
            }
        }

        info!(book = %book_id, author = %author_id, "added author to book");
        Ok(())
    }

    /// Remove an author from a book
    ///
    /// Fails with `InvalidOperation`, writing nothing, if the author is the
    /// book's only author. The check is repeated against the stored book at
    /// write time, so concurrent removals cannot strip the last author.
    pub async fn remove_author(&self, book_id: Uuid, author_id: Uuid) -> RepositoryResult<()> {
        let book: Book = self.fetch(book_id).await?;
        if book.is_sole_author(author_id) {
            return Err(sole_author(book_id, author_id));
        }
        self.fetch::<Author>(author_id).await?;

        match self.unlink_author_from_book(book_id, author_id).await? {
            Unlinked::Removed => {}
            Unlinked::SoleAuthor(_) => return Err(sole_author(book_id, author_id)),
            Unlinked::Vanished => {
                return Err(RepositoryError::not_found(EntityKind::Book, book_id))
            }
        }

        let touched = self
            .mutate(author_id, |author: &mut Author| author.remove_book(book_id))
            .await?;
        if touched.is_none() {
            warn!(book = %book_id, author = %author_id, "skipping vanished author");
        }

        info!(book = %book_id, author = %author_id, "removed author from book");
        Ok(())
    }

    /// Take an author off a book, then off the book's list entries
    ///
    /// The book is written first and refuses to lose its last author. The
    /// author's own mirror is left to the caller.
    pub(super) async fn unlink_author_from_book(
        &self,
        book_id: Uuid,
        author_id: Uuid,
    ) -> RepositoryResult<Unlinked> {
        let mut sole = false;
        let updated = self
            .mutate(book_id, |book: &mut Book| {
                sole = book.is_sole_author(author_id);
                !sole && book.remove_author(author_id)
            })
            .await?;

        let book = match updated {
            Some(book) if sole => return Ok(Unlinked::SoleAuthor(book)),
            Some(book) => book,
            None => return Ok(Unlinked::Vanished),
        };

        for list in &book.lists {
            let touched = self
                .mutate(list.id, |list: &mut List| {
                    list.remove_item_author(book_id, author_id)
                })
                .await?;
            if touched.is_none() {
                warn!(book = %book_id, list = %list.id, "skipping vanished list");
            }
        }
        Ok(Unlinked::Removed)
    }

    /// Delete a book after cleaning up every mirror that points at it
    ///
    /// When the delete comes from deleting `initiating_author`, that author's
    /// mirror is left alone: the author document is about to go.
    pub(super) async fn cascade_delete_book(
        &self,
        book: Book,
        initiating_author: Option<Uuid>,
    ) -> RepositoryResult<()> {
        for author in &book.authors {
            if Some(author.id) == initiating_author {
                continue;
            }
            let touched = self
                .mutate(author.id, |author: &mut Author| author.remove_book(book.id))
                .await?;
            if touched.is_none() {
                warn!(book = %book.id, author = %author.id, "skipping vanished author");
            }
        }

        for list in &book.lists {
            let touched = self
                .mutate(list.id, |list: &mut List| list.remove_book(book.id))
                .await?;
            if touched.is_none() {
                warn!(book = %book.id, list = %list.id, "skipping vanished list");
            }
        }

        if !self.remove::<Book>(book.id).await? {
            debug!(book = %book.id, "book was already deleted");
        }
        info!(book = %book.id, title = %book.title, "deleted book");
        Ok(())
    }
}


/// What happened when taking an author off a book
pub(super) enum Unlinked {
    Removed,
    /// The stored book has only this author left; nothing was written
    SoleAuthor(Book),
    Vanished,
}

fn sole_author(book_id: Uuid, author_id: Uuid) -> RepositoryError {
    RepositoryError::InvalidOperation(format!(
        "'{}' is the only author of book '{}'",
        author_id, book_id
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::RepositoryError;
    use crate::fields::{BookFields, BookForCreation, BookPatch};
    use crate::EntityKind;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_create_book_mirrors_authors_and_lists() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let george = author(&repo, "George").await;
        let favorites = list(&repo, "Favorites", &[]).await;

        let logic = repo
            .create_book(
                BookForCreation::new("Logic", vec![ada, george, ada]).in_lists(vec![favorites]),
            )
            .await
            .unwrap();

        let book = repo.get_book(logic).await.unwrap();
        let names: Vec<_> = book.authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "George"]);
        assert_eq!(book.lists.len(), 1);
        assert_eq!(book.lists[0].name, "Favorites");

        for id in [ada, george] {
            let author = repo.get_author(id).await.unwrap();
            assert_eq!(author.books.len(), 1);
            assert_eq!(author.books[0].title, "Logic");
        }

        let list = repo.get_list(favorites).await.unwrap();
        assert_eq!(list.books.len(), 1);
        assert_eq!(list.books[0].title, "Logic");
        assert_eq!(list.books[0].authors, book.authors);
        assert_consistent(&repo).await;
    }

    #[tokio::test]
    async fn test_create_book_with_missing_author_writes_nothing() {
        let repo = repo();
        let missing = Uuid::new_v4();

        let err = repo
            .create_book(BookForCreation::new("Ghost", vec![missing]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NotFound { kind: EntityKind::Author, id } if id == missing
        ));
        assert_eq!(repo.store().write_count(), 0);
        assert!(repo.store().is_empty());
    }

    #[tokio::test]
    async fn test_create_book_with_missing_list_writes_nothing() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let before = repo.store().snapshot();

        let err = repo
            .create_book(BookForCreation::new("Logic", vec![ada]).in_lists(vec![Uuid::new_v4()]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NotFound {
                kind: EntityKind::List,
                ..
            }
        ));
        assert_eq!(repo.store().snapshot(), before);
    }

    #[tokio::test]
    async fn test_create_book_without_authors_is_invalid() {
        let repo = repo();
        let err = repo
            .create_book(BookForCreation::new("Anonymous", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidOperation(_)));
        assert!(repo.store().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_patch_book_leave_membership() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let logic = book(&repo, "Logic", &[ada]).await;

        let mut fields = BookFields::new("The Laws of Thought");
        fields.genre = Some("Mathematics".to_string());
        let updated = repo.update_book(logic, &fields).await.unwrap();
        assert_eq!(updated.title, "The Laws of Thought");
        assert_eq!(updated.authors.len(), 1);

        let patch: BookPatch = serde_json::from_str(r#"{"bookType": "Hardcover"}"#).unwrap();
        let patched = repo.patch_book(logic, &patch).await.unwrap();
        assert_eq!(patched.book_type.as_deref(), Some("Hardcover"));
        assert_eq!(patched.genre.as_deref(), Some("Mathematics"));
        assert_eq!(patched.authors.len(), 1);
    }

    #[tokio::test]
    async fn test_update_book_from_instance() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let logic = book(&repo, "Logic", &[ada]).await;

        let current = repo.get_book(logic).await.unwrap();
        repo.update_book_from(current, &BookFields::new("Logic, 2nd ed."))
            .await
            .unwrap();
        assert_eq!(repo.get_book(logic).await.unwrap().title, "Logic, 2nd ed.");
    }

    #[tokio::test]
    async fn test_delete_book_leaves_no_orphans() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let george = author(&repo, "George").await;
        let logic = book(&repo, "Logic", &[ada, george]).await;
        let favorites = list(&repo, "Favorites", &[logic]).await;

        repo.delete_book(logic).await.unwrap();

        assert!(repo.get_author(ada).await.unwrap().books.is_empty());
        assert!(repo.get_author(george).await.unwrap().books.is_empty());
        assert!(repo.get_list(favorites).await.unwrap().books.is_empty());
        assert!(matches!(
            repo.get_book(logic).await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert_consistent(&repo).await;
    }

    #[tokio::test]
    async fn test_delete_book_from_instance() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let logic = book(&repo, "Logic", &[ada]).await;

        let book = repo.get_book(logic).await.unwrap();
        repo.delete_book_from(book).await.unwrap();

        assert!(repo.list_books().await.unwrap().is_empty());
        assert_consistent(&repo).await;
    }

    #[tokio::test]
    async fn test_add_author_is_idempotent() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let george = author(&repo, "George").await;
        let logic = book(&repo, "Logic", &[ada]).await;
        let favorites = list(&repo, "Favorites", &[logic]).await;

        repo.add_author(logic, george).await.unwrap();
        let after_first = repo.store().snapshot();
        repo.add_author(logic, george).await.unwrap();
        assert_eq!(repo.store().snapshot(), after_first);

        let book = repo.get_book(logic).await.unwrap();
        assert_eq!(book.authors.len(), 2);
        assert_eq!(repo.get_author(george).await.unwrap().books.len(), 1);

        // The list entry shows the new author too
        let list = repo.get_list(favorites).await.unwrap();
        assert_eq!(list.books[0].authors.len(), 2);
        assert_consistent(&repo).await;
    }

    #[tokio::test]
    async fn test_add_missing_author_writes_nothing() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let logic = book(&repo, "Logic", &[ada]).await;
        let before = repo.store().snapshot();

        let err = repo.add_author(logic, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NotFound {
                kind: EntityKind::Author,
                ..
            }
        ));
        assert_eq!(repo.store().snapshot(), before);

        let err = repo.add_author(Uuid::new_v4(), ada).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NotFound {
                kind: EntityKind::Book,
                ..
            }
        ));
        assert_eq!(repo.store().snapshot(), before);
    }

    #[tokio::test]
    async fn test_remove_sole_author_is_refused() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let logic = book(&repo, "Logic", &[ada]).await;
        list(&repo, "Favorites", &[logic]).await;
        let before = repo.store().snapshot();

        let err = repo.remove_author(logic, ada).await.unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidOperation(_)));
        assert_eq!(repo.store().snapshot(), before);
    }

    #[tokio::test]
    async fn test_remove_author_strips_list_entries() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let george = author(&repo, "George").await;
        let logic = book(&repo, "Logic", &[ada, george]).await;
        let favorites = list(&repo, "Favorites", &[logic]).await;
        let reading = list(&repo, "Reading", &[logic]).await;

        repo.remove_author(logic, george).await.unwrap();

        let book = repo.get_book(logic).await.unwrap();
        assert_eq!(book.authors.len(), 1);
        assert_eq!(book.authors[0].id, ada);
        assert!(repo.get_author(george).await.unwrap().books.is_empty());
        for id in [favorites, reading] {
            let list = repo.get_list(id).await.unwrap();
            assert_eq!(list.books.len(), 1);
            assert_eq!(list.books[0].authors.len(), 1);
            assert_eq!(list.books[0].authors[0].id, ada);
        }
        assert_consistent(&repo).await;

        // Running it again changes nothing
        let after = repo.store().snapshot();
        repo.remove_author(logic, george).await.unwrap();
        assert_eq!(repo.store().snapshot(), after);
    }

    #[tokio::test]
    async fn test_create_book_surfaces_mirror_failure() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;

        // The author passes the existence check but cannot take the mirror
        repo.store().block_writes_to(ada.to_string());
        let err = repo
            .create_book(BookForCreation::new("Logic", vec![ada]))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::StoreUnavailable { .. }));

        // The book exists and points at its author; the mirror is what lags
        let books = repo.list_books().await.unwrap();
        assert_eq!(books.len(), 1);
        assert!(repo.get_author(ada).await.unwrap().books.is_empty());

        // Re-linking after the store recovers repairs the mirror
        repo.store().clear_faults();
        repo.add_author(books[0].id, ada).await.unwrap();
        assert_consistent(&repo).await;
    }
}
