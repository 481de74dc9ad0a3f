//! List lifecycle and Book/List linking

use tracing::{info, warn};
use uuid::Uuid;

use super::{Repository, RepositoryResult};
use crate::fields::{dedup_ids, ListFields, ListForCreation, ListPatch};
use crate::models::{Book, List};
use crate::storage::DocumentStore;

impl<S: DocumentStore> Repository<S> {
    /// Create a list holding the given books
    pub async fn create_list(&self, input: ListForCreation) -> RepositoryResult<Uuid> {
        let mut books = Vec::new();
        for id in dedup_ids(&input.books) {
            books.push(self.fetch::<Book>(id).await?);
        }

        let mut list = List::new(input.fields.name.clone());
        input.fields.apply_to(&mut list);
        list.books = books.iter().map(Book::list_item).collect();
        self.insert(&mut list).await?;

        let shorthand = list.shorthand();
        for book in &books {
            self.mutate_existing(book.id, |book: &mut Book| book.add_list(shorthand.clone()))
                .await?;
        }

        info!(list = %list.id, name = %list.name, books = list.books.len(), "created list");
        Ok(list.id)
    }

    /// Overwrite a list's fields, re-reading it first
    pub async fn update_list(&self, id: Uuid, fields: &ListFields) -> RepositoryResult<List> {
        let list = self
            .mutate_existing(id, |list: &mut List| {
                if ListFields::from(&*list) == *fields {
                    return false;
                }
                fields.apply_to(list);
                true
            })
            .await?;
        info!(list = %id, "updated list");
        Ok(list)
    }

    /// Overwrite the fields of a list the caller already read
    pub async fn update_list_from(
        &self,
        mut list: List,
        fields: &ListFields,
    ) -> RepositoryResult<List> {
        fields.apply_to(&mut list);
        self.save_instance(&mut list).await?;
        info!(list = %list.id, "updated list");
        Ok(list)
    }

    pub async fn patch_list(&self, id: Uuid, patch: &ListPatch) -> RepositoryResult<List> {
        let list = self
            .mutate_existing(id, |list: &mut List| {
                let current = ListFields::from(&*list);
                let mut patched = current.clone();
                patch.apply_to(&mut patched);
                if patched == current {
                    return false;
                }
                patched.apply_to(list);
                true
            })
            .await?;
        info!(list = %id, "patched list");
        Ok(list)
    }

    /// Delete a list, taking it off every book first
    pub async fn delete_list(&self, id: Uuid) -> RepositoryResult<()> {
        let list: List = self.fetch(id).await?;

        for item in &list.books {
            let touched = self
                .mutate(item.id, |book: &mut Book| book.remove_list(id))
                .await?;
            if touched.is_none() {
                warn!(list = %id, book = %item.id, "skipping vanished book");
            }
        }

        self.remove::<List>(id).await?;
        info!(list = %id, name = %list.name, "deleted list");
        Ok(())
    }

    /// Put a book on a list
    pub async fn add_book(&self, list_id: Uuid, book_id: Uuid) -> RepositoryResult<()> {
        let list: List = self.fetch(list_id).await?;
        let book: Book = self.fetch(book_id).await?;

        let item = book.list_item();
        self.mutate_existing(list_id, |list: &mut List| list.add_book(item.clone()))
            .await?;
        let shorthand = list.shorthand();
        self.mutate_existing(book_id, |book: &mut Book| book.add_list(shorthand.clone()))
            .await?;

        info!(list = %list_id, book = %book_id, "added book to list");
        Ok(())
    }

    /// Take a book off a list; the list may end up empty
    pub async fn remove_book(&self, list_id: Uuid, book_id: Uuid) -> RepositoryResult<()> {
        self.fetch::<List>(list_id).await?;
        self.fetch::<Book>(book_id).await?;

        // Either side vanishing mid-way means it no longer holds the link
        if self
            .mutate(list_id, |list: &mut List| list.remove_book(book_id))
            .await?
            .is_none()
        {
            warn!(list = %list_id, book = %book_id, "skipping vanished list");
        }
        if self
            .mutate(book_id, |book: &mut Book| book.remove_list(list_id))
            .await?
            .is_none()
        {
            warn!(list = %list_id, book = %book_id, "skipping vanished book");
        }

        info!(list = %list_id, book = %book_id, "removed book from list");
        Ok(())
    }
}
