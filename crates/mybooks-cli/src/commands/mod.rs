//! CLI command handlers

pub mod author;
pub mod book;
pub mod config;
pub mod list;
pub mod status;

use std::io::{self, IsTerminal, Write};

use anyhow::{bail, Result};
use uuid::Uuid;

/// Resolve a full UUID or an unambiguous id prefix
///
/// `candidates` are `(id, label)` pairs; labels are only used to explain an
/// ambiguous prefix.
pub fn match_prefix<'a>(
    id: &str,
    kind: &str,
    candidates: impl IntoIterator<Item = (Uuid, &'a str)>,
) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }

    let matches: Vec<_> = candidates
        .into_iter()
        .filter(|(candidate, _)| candidate.to_string().starts_with(id))
        .collect();

    match matches.len() {
        0 => bail!("No {} found matching: {}", kind, id),
        1 => Ok(matches[0].0),
        _ => {
            eprintln!("Multiple {}s match '{}':", kind, id);
            for (candidate, label) in &matches {
                eprintln!("  {} - {}", candidate, label);
            }
            bail!("Ambiguous ID. Please provide more characters.");
        }
    }
}

/// Prompt for confirmation
///
/// Returns true if user confirms, false otherwise.
/// In non-interactive mode (no TTY), returns false.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !io::stdin().is_terminal() {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}

/// Check that every `--clear` name is one of `allowed`
pub fn check_clear(clear: &[String], allowed: &[&str]) -> Result<()> {
    for field in clear {
        if !allowed.contains(&field.as_str()) {
            bail!(
                "Cannot clear '{}'. Clearable fields: {}",
                field,
                allowed.join(", ")
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_uuid_needs_no_candidates() {
        let id = Uuid::new_v4();
        let resolved = match_prefix(&id.to_string(), "author", Vec::new()).unwrap();
        assert_eq!(resolved, id);
    }

    #[test]
    fn test_prefix_match() {
        let a = Uuid::parse_str("aaaaaaaa-0000-4000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("abbbbbbb-0000-4000-8000-000000000002").unwrap();
        let candidates = vec![(a, "Ada"), (b, "George")];

        assert_eq!(match_prefix("aa", "author", candidates.clone()).unwrap(), a);
        assert_eq!(match_prefix("ab", "author", candidates.clone()).unwrap(), b);
        assert!(match_prefix("a", "author", candidates.clone()).is_err());
        assert!(match_prefix("c", "author", candidates).is_err());
    }

    #[test]
    fn test_check_clear() {
        assert!(check_clear(&["genre".to_string()], &["genre", "type"]).is_ok());
        assert!(check_clear(&["title".to_string()], &["genre", "type"]).is_err());
    }
}
