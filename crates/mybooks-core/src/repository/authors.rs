//! Author lifecycle

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::books::Unlinked;
use super::{Repository, RepositoryResult};
use crate::fields::{AuthorFields, AuthorPatch};
use crate::models::{Author, Book};
use crate::storage::DocumentStore;

impl<S: DocumentStore> Repository<S> {
    /// Create an author with no books and return its id
    pub async fn create_author(&self, fields: AuthorFields) -> RepositoryResult<Uuid> {
        let mut author = fields.into_author();
        self.insert(&mut author).await?;
        info!(author = %author.id, name = %author.name, "created author");
        Ok(author.id)
    }

    /// Overwrite an author's fields, re-reading it first
    pub async fn update_author(&self, id: Uuid, fields: &AuthorFields) -> RepositoryResult<Author> {
        let author = self
            .mutate_existing(id, |author: &mut Author| {
                if AuthorFields::from(&*author) == *fields {
                    return false;
                }
                fields.apply_to(author);
                true
            })
            .await?;
        info!(author = %id, "updated author");
        Ok(author)
    }

    /// Overwrite the fields of an author the caller already read
    pub async fn update_author_from(
        &self,
        mut author: Author,
        fields: &AuthorFields,
    ) -> RepositoryResult<Author> {
        fields.apply_to(&mut author);
        self.save_instance(&mut author).await?;
        info!(author = %author.id, "updated author");
        Ok(author)
    }

    /// Apply a partial update on top of the current stored author
    pub async fn patch_author(&self, id: Uuid, patch: &AuthorPatch) -> RepositoryResult<Author> {
        let author = self
            .mutate_existing(id, |author: &mut Author| {
                let current = AuthorFields::from(&*author);
                let mut patched = current.clone();
                patch.apply_to(&mut patched);
                if patched == current {
                    return false;
                }
                patched.apply_to(author);
                true
            })
            .await?;
        info!(author = %id, "patched author");
        Ok(author)
    }

    /// Delete an author
    ///
    /// Books this author wrote alone are deleted with it; books written with
    /// others just lose this author. The author document goes last, so an
    /// interrupted delete can be run again.
    pub async fn delete_author(&self, id: Uuid) -> RepositoryResult<()> {
        let author: Author = self.fetch(id).await?;

        let mut deleted = 0;
        let mut unlinked = 0;
        for shorthand in &author.books {
            let book = match self.read::<Book>(shorthand.id).await? {
                Some(book) => book,
                None => {
                    warn!(author = %id, book = %shorthand.id, "skipping vanished book");
                    continue;
                }
            };

            if book.is_sole_author(id) {
                self.cascade_delete_book(book, Some(id)).await?;
                deleted += 1;
            } else if book.has_author(id) {
                match self.unlink_author_from_book(book.id, id).await? {
                    Unlinked::Removed => unlinked += 1,
                    Unlinked::SoleAuthor(book) => {
                        // The co-authors left since the book was read
                        debug!(author = %id, book = %book.id, "book is now solely authored");
                        self.cascade_delete_book(book, Some(id)).await?;
                        deleted += 1;
                    }
                    Unlinked::Vanished => {
                        warn!(author = %id, book = %book.id, "skipping vanished book");
                    }
                }
            } else {
                debug!(author = %id, book = %book.id, "book no longer lists author");
            }
        }

        self.remove::<Author>(id).await?;
        info!(author = %id, deleted, unlinked, "deleted author");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::RepositoryError;
    use crate::fields::{AuthorFields, AuthorPatch, BookForCreation};
    use crate::EntityKind;
    use chrono::NaiveDate;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_create_author() {
        let repo = repo();
        let fields = AuthorFields {
            name: "Ada".to_string(),
            born: NaiveDate::from_ymd_opt(1815, 12, 10),
            ..AuthorFields::default()
        };
        let id = repo.create_author(fields).await.unwrap();

        let author = repo.get_author(id).await.unwrap();
        assert_eq!(author.name, "Ada");
        assert_eq!(author.born, NaiveDate::from_ymd_opt(1815, 12, 10));
        assert!(author.books.is_empty());
        assert!(author.etag.is_some());
    }

    #[tokio::test]
    async fn test_update_author_keeps_books() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        book(&repo, "Logic", &[ada]).await;

        let updated = repo
            .update_author(ada, &AuthorFields::new("Augusta Ada"))
            .await
            .unwrap();
        assert_eq!(updated.name, "Augusta Ada");
        assert_eq!(updated.books.len(), 1);
        assert_eq!(repo.get_author(ada).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_missing_author() {
        let repo = repo();
        let err = repo
            .update_author(Uuid::new_v4(), &AuthorFields::new("Nobody"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::NotFound {
                kind: EntityKind::Author,
                ..
            }
        ));
        assert_eq!(repo.store().write_count(), 0);
    }

    #[tokio::test]
    async fn test_unchanged_update_is_not_written() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let writes = repo.store().write_count();

        repo.update_author(ada, &AuthorFields::new("Ada"))
            .await
            .unwrap();
        assert_eq!(repo.store().write_count(), writes);
    }

    #[tokio::test]
    async fn test_update_author_from_fresh_instance() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;

        let current = repo.get_author(ada).await.unwrap();
        let updated = repo
            .update_author_from(current, &AuthorFields::new("Ada King"))
            .await
            .unwrap();
        assert_eq!(repo.get_author(ada).await.unwrap().name, "Ada King");
        assert_eq!(repo.get_author(ada).await.unwrap().etag, updated.etag);
    }

    #[tokio::test]
    async fn test_patch_author() {
        let repo = repo();
        let ada = repo
            .create_author(AuthorFields {
                name: "Ada".to_string(),
                nationality: Some("British".to_string()),
                biography: Some("Wrote the first program".to_string()),
                ..AuthorFields::default()
            })
            .await
            .unwrap();

        let patch: AuthorPatch =
            serde_json::from_str(r#"{"nationality": null, "died": "1852-11-27"}"#).unwrap();
        let patched = repo.patch_author(ada, &patch).await.unwrap();

        assert_eq!(patched.name, "Ada");
        assert!(patched.nationality.is_none());
        assert_eq!(patched.died, NaiveDate::from_ymd_opt(1852, 11, 27));
        assert_eq!(patched.biography.as_deref(), Some("Wrote the first program"));
    }

    #[tokio::test]
    async fn test_delete_author_without_books() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;

        repo.delete_author(ada).await.unwrap();
        assert!(repo.store().is_empty());

        let err = repo.delete_author(ada).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_author_cascades_by_authorship() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let george = author(&repo, "George").await;
        let solo = book(&repo, "Notes", &[ada]).await;
        let shared = book(&repo, "Logic", &[ada, george]).await;
        let favorites = list(&repo, "Favorites", &[solo, shared]).await;

        repo.delete_author(ada).await.unwrap();

        // The solely-authored book is gone, from the list too
        assert!(repo.get_book(solo).await.is_err());
        let list = repo.get_list(favorites).await.unwrap();
        assert_eq!(list.books.len(), 1);
        assert_eq!(list.books[0].id, shared);
        // and the list item no longer shows the deleted author
        assert_eq!(list.books[0].authors.len(), 1);
        assert_eq!(list.books[0].authors[0].id, george);

        // The co-authored book survives with one author
        let shared = repo.get_book(shared).await.unwrap();
        assert_eq!(shared.authors.len(), 1);
        assert_eq!(shared.authors[0].id, george);

        assert!(repo.get_author(ada).await.is_err());
        assert_consistent(&repo).await;
    }

    #[tokio::test]
    async fn test_delete_author_skips_vanished_books() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let logic = book(&repo, "Logic", &[ada]).await;

        use crate::storage::DocumentStore;
        let key = logic.to_string();
        repo.store().delete(&key, &key).await.unwrap();

        repo.delete_author(ada).await.unwrap();
        assert!(repo.store().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_delete_converges_on_rerun() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        let george = author(&repo, "George").await;
        let solo = book(&repo, "Notes", &[ada]).await;
        let shared = book(&repo, "Logic", &[ada, george]).await;
        let favorites = list(&repo, "Favorites", &[solo, shared]).await;

        // The co-authored book cannot be written: the cascade stops part way
        repo.store().block_writes_to(&shared.to_string());
        let err = repo.delete_author(ada).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StoreUnavailable { .. }));

        // The author is still resolvable for a retry
        assert!(repo.get_author(ada).await.is_ok());

        repo.store().clear_faults();
        repo.delete_author(ada).await.unwrap();

        assert!(repo.get_author(ada).await.is_err());
        assert!(repo.get_book(solo).await.is_err());
        assert_eq!(repo.get_book(shared).await.unwrap().authors.len(), 1);
        assert_eq!(repo.get_list(favorites).await.unwrap().books.len(), 1);
        assert_consistent(&repo).await;
    }

    #[tokio::test]
    async fn test_delete_author_of_many_books() {
        let repo = repo();
        let ada = author(&repo, "Ada").await;
        for i in 0..5 {
            repo.create_book(BookForCreation::new(format!("Volume {}", i), vec![ada]))
                .await
                .unwrap();
        }

        repo.delete_author(ada).await.unwrap();
        assert!(repo.list_books().await.unwrap().is_empty());
        assert!(repo.store().is_empty());
    }
}
