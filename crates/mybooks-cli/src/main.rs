//! MyBooks CLI
//!
//! Command-line interface for MyBooks - authors, books and reading lists.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mybooks_core::{Config, Repository, RepositoryError, SqliteDocumentStore};

mod commands;
mod output;

use output::{Output, OutputFormat};

/// The repository every command works against
pub type Repo = Repository<SqliteDocumentStore>;

#[derive(Parser)]
#[command(name = "mybooks")]
#[command(about = "MyBooks - Authors, books and reading lists")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Use a different config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage authors
    Author {
        #[command(subcommand)]
        command: AuthorCommands,
    },
    /// Manage books
    Book {
        #[command(subcommand)]
        command: BookCommands,
    },
    /// Manage reading lists
    List {
        #[command(subcommand)]
        command: ListCommands,
    },
    /// Show status (document counts, data location)
    Status,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Author fields shared by create and update
#[derive(clap::Args)]
pub struct AuthorArgs {
    /// Date of birth (YYYY-MM-DD)
    #[arg(long)]
    pub born: Option<NaiveDate>,
    /// Date of death (YYYY-MM-DD)
    #[arg(long)]
    pub died: Option<NaiveDate>,
    #[arg(long)]
    pub nationality: Option<String>,
    #[arg(long)]
    pub biography: Option<String>,
}

#[derive(Subcommand)]
enum AuthorCommands {
    /// Create a new author
    #[command(alias = "add")]
    Create {
        name: String,
        #[command(flatten)]
        fields: AuthorArgs,
    },
    /// List all authors
    #[command(alias = "ls")]
    List,
    /// Show author details
    Show {
        /// Author ID (full UUID or prefix)
        id: String,
    },
    /// Show the books an author wrote
    Books {
        /// Author ID (full UUID or prefix)
        id: String,
    },
    /// Replace every field of an author
    Update {
        /// Author ID (full UUID or prefix)
        id: String,
        name: String,
        #[command(flatten)]
        fields: AuthorArgs,
    },
    /// Change some fields of an author
    Patch {
        /// Author ID (full UUID or prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        fields: AuthorArgs,
        /// Clear a field (born, died, nationality, biography)
        #[arg(long)]
        clear: Vec<String>,
    },
    /// Delete an author, and every book they wrote alone
    #[command(alias = "rm")]
    Delete {
        /// Author ID (full UUID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

/// Book fields shared by create and update
#[derive(clap::Args)]
pub struct BookArgs {
    /// Format, e.g. Hardcover
    #[arg(long = "type")]
    pub book_type: Option<String>,
    #[arg(long)]
    pub genre: Option<String>,
    /// Publication date (YYYY-MM-DD)
    #[arg(long)]
    pub published: Option<NaiveDate>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Subcommand)]
enum BookCommands {
    /// Create a new book
    #[command(alias = "add")]
    Create {
        title: String,
        /// Author ID (repeatable, at least one)
        #[arg(short, long = "author", required = true)]
        authors: Vec<String>,
        /// List ID to add the book to (repeatable)
        #[arg(short, long = "list")]
        lists: Vec<String>,
        #[command(flatten)]
        fields: BookArgs,
    },
    /// List all books
    #[command(alias = "ls")]
    List,
    /// Show book details
    Show {
        /// Book ID (full UUID or prefix)
        id: String,
    },
    /// Replace the descriptive fields of a book
    Update {
        /// Book ID (full UUID or prefix)
        id: String,
        title: String,
        #[command(flatten)]
        fields: BookArgs,
    },
    /// Change some fields of a book
    Patch {
        /// Book ID (full UUID or prefix)
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: BookArgs,
        /// Clear a field (type, genre, published, description)
        #[arg(long)]
        clear: Vec<String>,
    },
    /// Delete a book
    #[command(alias = "rm")]
    Delete {
        /// Book ID (full UUID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Add an author to a book
    AddAuthor {
        /// Book ID (full UUID or prefix)
        book: String,
        /// Author ID (full UUID or prefix)
        author: String,
    },
    /// Remove an author from a book
    RemoveAuthor {
        /// Book ID (full UUID or prefix)
        book: String,
        /// Author ID (full UUID or prefix)
        author: String,
    },
}

#[derive(Subcommand)]
enum ListCommands {
    /// Create a new list
    #[command(alias = "add")]
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        /// Book ID to start with (repeatable)
        #[arg(short, long = "book")]
        books: Vec<String>,
    },
    /// List all lists
    #[command(alias = "ls")]
    List,
    /// Show a list and its books
    Show {
        /// List ID (full UUID or prefix)
        id: String,
    },
    /// Replace the fields of a list
    Update {
        /// List ID (full UUID or prefix)
        id: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change some fields of a list
    Patch {
        /// List ID (full UUID or prefix)
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Clear a field (description)
        #[arg(long)]
        clear: Vec<String>,
    },
    /// Delete a list (its books are kept)
    #[command(alias = "rm")]
    Delete {
        /// List ID (full UUID or prefix)
        id: String,
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },
    /// Add a book to a list
    AddBook {
        /// List ID (full UUID or prefix)
        list: String,
        /// Book ID (full UUID or prefix)
        book: String,
    },
    /// Remove a book from a list
    RemoveBook {
        /// List ID (full UUID or prefix)
        list: String,
        /// Book ID (full UUID or prefix)
        book: String,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (data_dir, page_size, concurrency, log_level, max_attempts, max_conflict_retries)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let output = Output::new(OutputFormat::from_flags(cli.json, cli.quiet));

    match run(cli, &output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, &output);
            ExitCode::from(exit_code(&err))
        }
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_ref();

    // Config commands must work even when the stored config is broken
    if let Commands::Config { command } = &cli.command {
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(key, value, config_path, output)
            }
        };
    }

    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    init_logging(&config);

    let store = SqliteDocumentStore::open(&config).context("Failed to open document store")?;
    let repo = Repository::from_config(store, &config);

    match cli.command {
        Commands::Author { command } => handle_author_command(command, &repo, output).await,
        Commands::Book { command } => handle_book_command(command, &repo, output).await,
        Commands::List { command } => handle_list_command(command, &repo, output).await,
        Commands::Status => commands::status::show(&repo, &config, output),
        Commands::Config { .. } => unreachable!(), // Handled above
    }
}

async fn handle_author_command(command: AuthorCommands, repo: &Repo, output: &Output) -> Result<()> {
    use commands::author;

    match command {
        AuthorCommands::Create { name, fields } => {
            author::create(repo, author::fields(name, fields), output).await
        }
        AuthorCommands::List => author::list(repo, output).await,
        AuthorCommands::Show { id } => author::show(repo, &id, output).await,
        AuthorCommands::Books { id } => author::books(repo, &id, output).await,
        AuthorCommands::Update { id, name, fields } => {
            author::update(repo, &id, author::fields(name, fields), output).await
        }
        AuthorCommands::Patch {
            id,
            name,
            fields,
            clear,
        } => author::patch(repo, &id, author::patch_from(name, fields, &clear)?, output).await,
        AuthorCommands::Delete { id, yes } => author::delete(repo, &id, yes, output).await,
    }
}

async fn handle_book_command(command: BookCommands, repo: &Repo, output: &Output) -> Result<()> {
    use commands::book;

    match command {
        BookCommands::Create {
            title,
            authors,
            lists,
            fields,
        } => book::create(repo, book::fields(title, fields), &authors, &lists, output).await,
        BookCommands::List => book::list(repo, output).await,
        BookCommands::Show { id } => book::show(repo, &id, output).await,
        BookCommands::Update { id, title, fields } => {
            book::update(repo, &id, book::fields(title, fields), output).await
        }
        BookCommands::Patch {
            id,
            title,
            fields,
            clear,
        } => book::patch(repo, &id, book::patch_from(title, fields, &clear)?, output).await,
        BookCommands::Delete { id, yes } => book::delete(repo, &id, yes, output).await,
        BookCommands::AddAuthor { book, author } => {
            book::add_author(repo, &book, &author, output).await
        }
        BookCommands::RemoveAuthor { book, author } => {
            book::remove_author(repo, &book, &author, output).await
        }
    }
}

async fn handle_list_command(command: ListCommands, repo: &Repo, output: &Output) -> Result<()> {
    use commands::list;

    match command {
        ListCommands::Create {
            name,
            description,
            books,
        } => list::create(repo, name, description, &books, output).await,
        ListCommands::List => list::list(repo, output).await,
        ListCommands::Show { id } => list::show(repo, &id, output).await,
        ListCommands::Update {
            id,
            name,
            description,
        } => list::update(repo, &id, name, description, output).await,
        ListCommands::Patch {
            id,
            name,
            description,
            clear,
        } => {
            let patch = list::patch_from(name, description, &clear)?;
            list::patch(repo, &id, patch, output).await
        }
        ListCommands::Delete { id, yes } => list::delete(repo, &id, yes, output).await,
        ListCommands::AddBook { list: id, book } => list::add_book(repo, &id, &book, output).await,
        ListCommands::RemoveBook { list: id, book } => {
            list::remove_book(repo, &id, &book, output).await
        }
    }
}

/// Log to stderr so that stdout stays clean for --json
///
/// MYBOOKS_LOG takes a full filter directive; otherwise the configured
/// level applies to the mybooks crates.
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_env("MYBOOKS_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "mybooks_core={level},mybooks_cli={level}",
            level = config.log_level
        ))
    });

    // Ignore error if already initialized
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Map an error to the process exit code for its kind
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RepositoryError>() {
        Some(RepositoryError::NotFound { .. }) => 2,
        Some(RepositoryError::InvalidOperation(_)) => 3,
        Some(RepositoryError::Conflict { .. }) => 4,
        Some(RepositoryError::StoreUnavailable { .. }) => 5,
        _ => 1,
    }
}

fn report_error(err: &anyhow::Error, output: &Output) {
    let suggestion = err
        .downcast_ref::<RepositoryError>()
        .and_then(RepositoryError::recovery_suggestion);

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "status": "error",
                "code": exit_code(err),
                "message": format!("{:#}", err),
                "suggestion": suggestion,
            })
        );
        return;
    }

    eprintln!("Error: {:#}", err);
    if let Some(suggestion) = suggestion {
        if !output.is_quiet() {
            eprintln!("  {}", suggestion);
        }
    }
}
