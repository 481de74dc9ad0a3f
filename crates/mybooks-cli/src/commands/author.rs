//! Author command handlers

use anyhow::{Context, Result};
use uuid::Uuid;

use mybooks_core::{AuthorFields, AuthorPatch};

use super::{check_clear, confirm, match_prefix};
use crate::output::Output;
use crate::{AuthorArgs, Repo};

const CLEARABLE: &[&str] = &["born", "died", "nationality", "biography"];

/// Build the full field set from CLI arguments
pub fn fields(name: String, args: AuthorArgs) -> AuthorFields {
    AuthorFields {
        name,
        born: args.born,
        died: args.died,
        nationality: args.nationality,
        biography: args.biography,
    }
}

/// Build a patch: given flags set a value, `--clear` names reset one
pub fn patch_from(name: Option<String>, args: AuthorArgs, clear: &[String]) -> Result<AuthorPatch> {
    check_clear(clear, CLEARABLE)?;
    let cleared = |field: &str| clear.iter().any(|c| c == field);

    Ok(AuthorPatch {
        name,
        born: if cleared("born") { Some(None) } else { args.born.map(Some) },
        died: if cleared("died") { Some(None) } else { args.died.map(Some) },
        nationality: if cleared("nationality") {
            Some(None)
        } else {
            args.nationality.map(Some)
        },
        biography: if cleared("biography") {
            Some(None)
        } else {
            args.biography.map(Some)
        },
    })
}

/// Resolve an author id (full UUID or prefix)
pub async fn resolve(repo: &Repo, id: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }
    let authors = repo.list_authors().await?;
    match_prefix(id, "author", authors.iter().map(|a| (a.id, a.name.as_str())))
}

/// Create a new author
pub async fn create(repo: &Repo, fields: AuthorFields, output: &Output) -> Result<()> {
    let id = repo
        .create_author(fields)
        .await
        .context("Failed to create author")?;
    output.created("author", &id);
    Ok(())
}

/// List all authors
pub async fn list(repo: &Repo, output: &Output) -> Result<()> {
    let mut authors = repo.list_authors().await?;
    authors.sort_by(|a, b| a.name.cmp(&b.name));
    output.print_authors(&authors);
    Ok(())
}

/// Show a single author
pub async fn show(repo: &Repo, id: &str, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let author = repo.get_author(uuid).await?;
    output.print_author(&author);
    Ok(())
}

/// Show the books an author wrote
pub async fn books(repo: &Repo, id: &str, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let books = repo.books_of_author(uuid).await?;
    output.print_books(&books);
    Ok(())
}

/// Replace every field of an author
pub async fn update(repo: &Repo, id: &str, fields: AuthorFields, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let author = repo
        .update_author(uuid, &fields)
        .await
        .context("Failed to update author")?;

    output.success("Author updated");
    output.print_author(&author);
    Ok(())
}

/// Change some fields of an author
pub async fn patch(repo: &Repo, id: &str, patch: AuthorPatch, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let author = repo
        .patch_author(uuid, &patch)
        .await
        .context("Failed to update author")?;

    output.success("Author updated");
    output.print_author(&author);
    Ok(())
}

/// Delete an author
pub async fn delete(repo: &Repo, id: &str, yes: bool, output: &Output) -> Result<()> {
    let uuid = resolve(repo, id).await?;
    let author = repo.get_author(uuid).await?;

    // Confirm deletion
    if output.should_prompt() && !yes {
        println!("Delete author: {} - {}", &author.id.to_string()[..8], author.name);
        if !author.books.is_empty() {
            println!(
                "Books written only by {} are deleted too ({} book(s) to check).",
                author.name,
                author.books.len()
            );
        }
        if !confirm("Are you sure?")? {
            output.message("Cancelled.");
            return Ok(());
        }
    }

    repo.delete_author(uuid)
        .await
        .context("Failed to delete author")?;

    output.success(&format!("Deleted author: {}", uuid));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn args() -> AuthorArgs {
        AuthorArgs {
            born: None,
            died: NaiveDate::from_ymd_opt(1852, 11, 27),
            nationality: None,
            biography: None,
        }
    }

    #[test]
    fn test_patch_from_flags() {
        let patch = patch_from(None, args(), &["nationality".to_string()]).unwrap();
        assert_eq!(patch.name, None);
        assert_eq!(patch.born, None);
        assert_eq!(patch.died, Some(NaiveDate::from_ymd_opt(1852, 11, 27)));
        assert_eq!(patch.nationality, Some(None));
        assert_eq!(patch.biography, None);
    }

    #[test]
    fn test_patch_rejects_unknown_clear() {
        assert!(patch_from(None, args(), &["name".to_string()]).is_err());
    }

    #[test]
    fn test_fields_from_args() {
        let fields = fields("Ada".to_string(), args());
        assert_eq!(fields.name, "Ada");
        assert_eq!(fields.died, NaiveDate::from_ymd_opt(1852, 11, 27));
    }
}
