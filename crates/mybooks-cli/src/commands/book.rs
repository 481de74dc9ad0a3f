//! Book command handlers

use anyhow::{Context, Result};
use uuid::Uuid;

use mybooks_core::{BookFields, BookForCreation, BookPatch};

use super::{check_clear, confirm, match_prefix};
use crate::output::Output;
use crate::{BookArgs, Repo};

const CLEARABLE: &[&str] = &["type", "genre", "published", "description"];

/// Build the descriptive field set from CLI arguments
pub fn fields(title: String, args: BookArgs) -> BookFields {
    BookFields {
        title,
        book_type: args.book_type,
        genre: args.genre,
        publication_date: args.published,
        description: args.description,
    }
}

/// Build a patch: given flags set a value, `--clear` names reset one
pub fn patch_from(title: Option<String>, args: BookArgs, clear: &[String]) -> Result<BookPatch> {
    check_clear(clear, CLEARABLE)?;
    let cleared = |field: &str| clear.iter().any(|c| c == field);

    Ok(BookPatch {
        title,
        book_type: if cleared("type") {
            Some(None)
        } else {
            args.book_type.map(Some)
        },
        genre: if cleared("genre") {
            Some(None)
        } else {
            args.genre.map(Some)
        },
        publication_date: if cleared("published") {
            Some(None)
        } else {
            args.published.map(Some)
        },
        description: if cleared("description") {
            Some(None)
        } else {
            args.description.map(Some)
        },
    })
}

/// Resolve a book id (full UUID or prefix)
pub async fn resolve(repo: &Repo, id: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }
    let books = repo.list_books().await?;
    match_prefix(id, "book", books.iter().map(|b| (b.id, b.title.as_str())))
}

/// Create a new book
pub async fn create(
    repo: &Repo,
    fields: BookFields,
    authors: &[String],
    lists: &[String],
    output: &Output,
) -> Result<()> {
    let mut author_ids = Vec::with_capacity(authors.len());
    for id in authors {
        author_ids.push(super::author::resolve(repo, id).await?);
    }
    let mut list_ids = Vec::with_capacity(lists.len());
    for id in lists {
        list_ids.push(super::list::resolve(repo, id).await?);
    }

    let input = BookForCreation {
        fields,
        authors: author_ids,
        lists: list_ids,
    };
    let id = repo
        .create_book(input)
        .await
        .context("Failed to create book")?;
    output.created("book", &id);
    Ok(())
}

/// List all books
pub async fn list(repo: &Repo, output: &Output) -> Result<()> {
    let mut books = repo.list_books().await?;
    books.sort_by(|a, b| a.title.cmp(&b.title));
    output.print_books(&books);
    Ok(())
}

/// Show a single book
pub async fn show(repo: &Repo, id: &str, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let book = repo.get_book(uuid).await?;
    output.print_book(&book);
    Ok(())
}

/// Replace the descriptive fields of a book
pub async fn update(repo: &Repo, id: &str, fields: BookFields, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let book = repo
        .update_book(uuid, &fields)
        .await
        .context("Failed to update book")?;

    output.success("Book updated");
    output.print_book(&book);
    Ok(())
}

/// Change some fields of a book
pub async fn patch(repo: &Repo, id: &str, patch: BookPatch, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let book = repo
        .patch_book(uuid, &patch)
        .await
        .context("Failed to update book")?;

    output.success("Book updated");
    output.print_book(&book);
    Ok(())
}

/// Delete a book
pub async fn delete(repo: &Repo, id: &str, yes: bool, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let book = repo.get_book(uuid).await?;

    // Confirm deletion
    if output.should_prompt() && !yes {
        println!("Delete book: {} - {}", &book.id.to_string()[..8], book.title);
        if !confirm("Are you sure?")? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    // The book was just read, no need to read it again
    repo.delete_book_from(book)
        .await
        .context("Failed to delete book")?;

    output.success(&format!("Deleted book: {}", uuid));
    Ok(())
}

/// Add an author to a book
pub async fn add_author(repo: &Repo, book: &str, author: &str, output: &Output) -> Result<()> {
    let book_id = resolve(repo, book).await?;
    let author_id = super::author::resolve(repo, author).await?;

    repo.add_author(book_id, author_id)
        .await
        .context("Failed to add author")?;

    output.success(&format!("Added author {} to book {}", author_id, book_id));
    Ok(())
}

/// Remove an author from a book
pub async fn remove_author(repo: &Repo, book: &str, author: &str, output: &Output) -> Result<()> {
    let book_id = resolve(repo, book).await?;
    let author_id = super::author::resolve(repo, author).await?;

    repo.remove_author(book_id, author_id)
        .await
        .context("Failed to remove author")?;

    output.success(&format!("Removed author {} from book {}", author_id, book_id));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn args() -> BookArgs {
        BookArgs {
            book_type: Some("Hardcover".to_string()),
            genre: None,
            published: NaiveDate::from_ymd_opt(1854, 1, 1),
            description: None,
        }
    }

    #[test]
    fn test_fields_from_args() {
        let fields = fields("Logic".to_string(), args());
        assert_eq!(fields.title, "Logic");
        assert_eq!(fields.book_type.as_deref(), Some("Hardcover"));
        assert_eq!(fields.publication_date, NaiveDate::from_ymd_opt(1854, 1, 1));
    }

    #[test]
    fn test_patch_from_flags() {
        let patch = patch_from(Some("Logic".to_string()), args(), &["genre".to_string()]).unwrap();
        assert_eq!(patch.title.as_deref(), Some("Logic"));
        assert_eq!(patch.book_type, Some(Some("Hardcover".to_string())));
        assert_eq!(patch.genre, Some(None));
        assert_eq!(patch.description, None);
    }

    #[test]
    fn test_title_cannot_be_cleared() {
        assert!(patch_from(None, args(), &["title".to_string()]).is_err());
    }
}
