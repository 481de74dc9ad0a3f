//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag), printing only ids

use serde::Serialize;

use mybooks_core::{Author, Book, List};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single author with their books
    pub fn print_author(&self, author: &Author) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", author.id);
                println!("Name:        {}", author.name);
                if let Some(born) = author.born {
                    println!("Born:        {}", born);
                }
                if let Some(died) = author.died {
                    println!("Died:        {}", died);
                }
                if let Some(ref nationality) = author.nationality {
                    println!("Nationality: {}", nationality);
                }
                if let Some(ref biography) = author.biography {
                    println!("Biography:   {}", truncate_line(biography, 60));
                }

                if !author.books.is_empty() {
                    println!();
                    println!("── Books ({}) ──", author.books.len());
                    for book in &author.books {
                        println!("{} | {}", short_id(&book.id), book.title);
                    }
                }
            }
            OutputFormat::Json => print_json(author),
            OutputFormat::Quiet => println!("{}", author.id),
        }
    }

    /// Print a list of authors
    pub fn print_authors(&self, authors: &[Author]) {
        match self.format {
            OutputFormat::Human => {
                if authors.is_empty() {
                    println!("No authors found.");
                    return;
                }
                for author in authors {
                    println!(
                        "{} | {} | {} book(s)",
                        short_id(&author.id),
                        truncate(&author.name, 35),
                        author.books.len()
                    );
                }
                println!("\n{} author(s)", authors.len());
            }
            OutputFormat::Json => print_json(&authors),
            OutputFormat::Quiet => {
                for author in authors {
                    println!("{}", author.id);
                }
            }
        }
    }

    /// Print a single book with its authors and lists
    pub fn print_book(&self, book: &Book) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", book.id);
                println!("Title:       {}", book.title);
                let authors: Vec<_> = book.authors.iter().map(|a| a.name.as_str()).collect();
                println!("Authors:     {}", authors.join(", "));
                if let Some(ref book_type) = book.book_type {
                    println!("Type:        {}", book_type);
                }
                if let Some(ref genre) = book.genre {
                    println!("Genre:       {}", genre);
                }
                if let Some(date) = book.publication_date {
                    println!("Published:   {}", date);
                }
                if let Some(ref desc) = book.description {
                    println!("Description: {}", truncate_line(desc, 60));
                }
                if !book.lists.is_empty() {
                    let lists: Vec<_> = book.lists.iter().map(|l| l.name.as_str()).collect();
                    println!("Lists:       {}", lists.join(", "));
                }
            }
            OutputFormat::Json => print_json(book),
            OutputFormat::Quiet => println!("{}", book.id),
        }
    }

    /// Print a list of books
    pub fn print_books(&self, books: &[Book]) {
        match self.format {
            OutputFormat::Human => {
                if books.is_empty() {
                    println!("No books found.");
                    return;
                }
                for book in books {
                    let authors: Vec<_> = book.authors.iter().map(|a| a.name.as_str()).collect();
                    println!(
                        "{} | {} | {}",
                        short_id(&book.id),
                        truncate(&book.title, 35),
                        truncate(&authors.join(", "), 40)
                    );
                }
                println!("\n{} book(s)", books.len());
            }
            OutputFormat::Json => print_json(&books),
            OutputFormat::Quiet => {
                for book in books {
                    println!("{}", book.id);
                }
            }
        }
    }

    /// Print a single list with its entries
    pub fn print_list(&self, list: &List) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", list.id);
                println!("Name:        {}", list.name);
                if let Some(ref desc) = list.description {
                    println!("Description: {}", truncate_line(desc, 60));
                }

                println!();
                if list.books.is_empty() {
                    println!("This list is empty.");
                    return;
                }
                println!("── Books ({}) ──", list.books.len());
                for item in &list.books {
                    let authors: Vec<_> = item.authors.iter().map(|a| a.name.as_str()).collect();
                    println!(
                        "[{}] {} | {} | {}",
                        item.date_added.format("%Y-%m-%d"),
                        short_id(&item.id),
                        truncate(&item.title, 35),
                        authors.join(", ")
                    );
                }
            }
            OutputFormat::Json => print_json(list),
            OutputFormat::Quiet => println!("{}", list.id),
        }
    }

    /// Print a list of lists
    pub fn print_lists(&self, lists: &[List]) {
        match self.format {
            OutputFormat::Human => {
                if lists.is_empty() {
                    println!("No lists found.");
                    return;
                }
                for list in lists {
                    println!(
                        "{} | {} | {} book(s)",
                        short_id(&list.id),
                        truncate(&list.name, 35),
                        list.books.len()
                    );
                }
                println!("\n{} list(s)", lists.len());
            }
            OutputFormat::Json => print_json(&lists),
            OutputFormat::Quiet => {
                for list in lists {
                    println!("{}", list.id);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a created entity's id (the only output in quiet mode)
    pub fn created(&self, kind: &str, id: &uuid::Uuid) {
        match self.format {
            OutputFormat::Human => println!("✓ Created {}: {}", kind, id),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "kind": kind, "id": id})
                );
            }
            OutputFormat::Quiet => println!("{}", id),
        }
    }

    /// Check if we should prompt for confirmation
    pub fn should_prompt(&self) -> bool {
        self.format == OutputFormat::Human
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not encode output as JSON: {}", e),
    }
}

/// First 8 characters of an id
fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
