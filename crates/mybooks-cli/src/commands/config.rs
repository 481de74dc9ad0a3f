//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use mybooks_core::{ConcurrencyMode, Config};

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "page_size": config.page_size,
                    "concurrency": config.concurrency,
                    "retry": config.retry,
                    "log_level": config.log_level
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:             {}", config.data_dir.display());
            println!("  page_size:            {}", config.page_size);
            println!("  concurrency:          {}", config.concurrency);
            println!("  log_level:            {}", config.log_level);
            println!("  max_attempts:         {}", config.retry.max_attempts);
            println!("  initial_backoff_ms:   {}", config.retry.initial_backoff_ms);
            println!("  max_backoff_ms:       {}", config.retry.max_backoff_ms);
            println!("  max_conflict_retries: {}", config.retry.max_conflict_retries);
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "page_size" => {
            let page_size: usize = value
                .parse()
                .context("Invalid value for page_size. Use a positive number.")?;
            if page_size == 0 {
                bail!("Invalid value for page_size. Use a positive number.");
            }
            config.page_size = page_size;
        }
        "concurrency" => {
            config.concurrency = value.parse::<ConcurrencyMode>()?;
        }
        "log_level" => {
            config.log_level = value.to_string();
        }
        "max_attempts" => {
            config.retry.max_attempts = value
                .parse()
                .context("Invalid value for max_attempts. Use a number.")?;
        }
        "initial_backoff_ms" => {
            config.retry.initial_backoff_ms = value
                .parse()
                .context("Invalid value for initial_backoff_ms. Use a number.")?;
        }
        "max_backoff_ms" => {
            config.retry.max_backoff_ms = value
                .parse()
                .context("Invalid value for max_backoff_ms. Use a number.")?;
        }
        "max_conflict_retries" => {
            config.retry.max_conflict_retries = value
                .parse()
                .context("Invalid value for max_conflict_retries. Use a number.")?;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, page_size, concurrency, log_level, max_attempts, \
                 initial_backoff_ms, max_backoff_ms, max_conflict_retries",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();
        apply(&mut config, "concurrency", "locked").unwrap();
        apply(&mut config, "page_size", "25").unwrap();
        apply(&mut config, "max_conflict_retries", "9").unwrap();

        assert_eq!(config.concurrency, ConcurrencyMode::Locked);
        assert_eq!(config.page_size, 25);
        assert_eq!(config.retry.max_conflict_retries, 9);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();
        assert!(apply(&mut config, "page_size", "0").is_err());
        assert!(apply(&mut config, "page_size", "many").is_err());
        assert!(apply(&mut config, "concurrency", "eventually").is_err());
        assert!(apply(&mut config, "sync_url", "ws://localhost").is_err());
    }

    #[test]
    fn test_saved_value_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config {
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        };
        apply(&mut config, "concurrency", "last-writer-wins").unwrap();
        config.save_to_path(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let loaded = Config::load_from_str(&content).unwrap();
        assert_eq!(loaded.concurrency, ConcurrencyMode::LastWriterWins);
    }
}
