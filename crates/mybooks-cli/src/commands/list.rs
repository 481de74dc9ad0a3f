//! List command handlers

use anyhow::{Context, Result};
use uuid::Uuid;

use mybooks_core::{ListFields, ListForCreation, ListPatch};

use super::{check_clear, confirm, match_prefix};
use crate::output::Output;
use crate::Repo;

/// Build a patch: given flags set a value, `--clear` names reset one
pub fn patch_from(
    name: Option<String>,
    description: Option<String>,
    clear: &[String],
) -> Result<ListPatch> {
    check_clear(clear, &["description"])?;

    let description = if clear.iter().any(|c| c == "description") {
        Some(None)
    } else {
        description.map(Some)
    };
    Ok(ListPatch { name, description })
}

/// Resolve a list id (full UUID or prefix)
pub async fn resolve(repo: &Repo, id: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }
    let lists = repo.list_lists().await?;
    match_prefix(id, "list", lists.iter().map(|l| (l.id, l.name.as_str())))
}

/// Create a new list
pub async fn create(
    repo: &Repo,
    name: String,
    description: Option<String>,
    books: &[String],
    output: &Output,
) -> Result<()> {
    let mut book_ids = Vec::with_capacity(books.len());
    for id in books {
        book_ids.push(super::book::resolve(repo, id).await?);
    }

    let input = ListForCreation {
        fields: ListFields { name, description },
        books: book_ids,
    };
    let id = repo
        .create_list(input)
        .await
        .context("Failed to create list")?;
    output.created("list", &id);
    Ok(())
}

/// List all lists
pub async fn list(repo: &Repo, output: &Output) -> Result<()> {
    let mut lists = repo.list_lists().await?;
    lists.sort_by(|a, b| a.name.cmp(&b.name));
    output.print_lists(&lists);
    Ok(())
}

/// Show a list and its books
pub async fn show(repo: &Repo, id: &str, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let list = repo.get_list(uuid).await?;
    output.print_list(&list);
    Ok(())
}

/// Replace the fields of a list
pub async fn update(
    repo: &Repo,
    id: &str,
    name: String,
    description: Option<String>,
    output: &Output,
) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let list = repo
        .update_list(uuid, &ListFields { name, description })
        .await
        .context("Failed to update list")?;

    output.success("List updated");
    output.print_list(&list);
    Ok(())
}

/// Change some fields of a list
pub async fn patch(repo: &Repo, id: &str, patch: ListPatch, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let list = repo
        .patch_list(uuid, &patch)
        .await
        .context("Failed to update list")?;

    output.success("List updated");
    output.print_list(&list);
    Ok(())
}

/// Delete a list
pub async fn delete(repo: &Repo, id: &str, yes: bool, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let list = repo.get_list(uuid).await?;

    // Confirm deletion
    if output.should_prompt() && !yes {
        println!(
            "Delete list: {} - {} ({} book(s))",
            &list.id.to_string()[..8],
            list.name,
            list.books.len()
        );
        if !confirm("Are you sure?")? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    repo.delete_list(uuid)
        .await
        .context("Failed to delete list")?;

    output.success(&format!("Deleted list: {}", uuid));
    Ok(())
}

/// Add a book to a list
pub async fn add_book(repo: &Repo, list: &str, book: &str, output: &Output) -> Result<()> {
    let list_id = resolve(repo, list).await?;
    let book_id = super::book::resolve(repo, book).await?;

    repo.add_book(list_id, book_id)
        .await
        .context("Failed to add book")?;

    output.success(&format!("Added book {} to list {}", book_id, list_id));
    Ok(())
}

/// Remove a book from a list
pub async fn remove_book(repo: &Repo, list: &str, book: &str, output: &Output) -> Result<()> {
    let list_id = resolve(repo, list).await?;
    let book_id = super::book::resolve(repo, book).await?;

    repo.remove_book(list_id, book_id)
        .await
        .context("Failed to remove book")?;

    output.success(&format!("Removed book {} from list {}", book_id, list_id));
    Ok(())
}
