//! Status command handler

use anyhow::{Context, Result};

use mybooks_core::{Config, EntityKind};

use crate::output::{Output, OutputFormat};
use crate::Repo;

/// Show status information
pub fn show(repo: &Repo, config: &Config, output: &Output) -> Result<()> {
    let store = repo.store();
    let count = |kind: EntityKind| {
        store
            .count(Some(kind.as_str()))
            .with_context(|| format!("Failed to count {} documents", kind))
    };
    let authors = count(EntityKind::Author)?;
    let books = count(EntityKind::Book)?;
    let lists = count(EntityKind::List)?;

    let db_path = config.sqlite_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "storage": {
                        "data_dir": config.data_dir,
                        "database": db_path,
                        "database_size": db_size
                    },
                    "concurrency": repo.concurrency(),
                    "counts": {
                        "authors": authors,
                        "books": books,
                        "lists": lists
                    }
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{} {} {}", authors, books, lists);
        }
        OutputFormat::Human => {
            println!("MyBooks Status");
            println!("==============");
            println!();
            println!("Storage:");
            println!("  Location:    {}", db_path.display());
            println!("  Size:        {}", human_size(db_size));
            println!("  Concurrency: {}", repo.concurrency());
            println!();
            println!("Contents:");
            println!("  Authors: {}", authors);
            println!("  Books:   {}", books);
            println!("  Lists:   {}", lists);
        }
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
