use anyhow::{Context, Result};
use std::path::Path;

const ENV_PATHS: [&str; 3] = [".env", ".env.local", "../.env"];

/// Loads the first `.env` file found and returns its path, or `None` when
/// there is none. Variables already set in the environment are never
/// overridden. Runs before the logger exists, so the outcome is returned
/// for the caller to log.
pub fn load_env() -> Result<Option<&'static str>> {
    for path in ENV_PATHS {
        if Path::new(path).exists() {
            load_env_from_file(path)?;
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn load_env_from_file(file_path: &str) -> Result<()> {
    let content = std::fs::read_to_string(file_path)
        .with_context(|| format!("Failed to read env file {}", file_path))?;

    for (key, value) in parse_env_lines(&content) {
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

/// `KEY=value` pairs; comments, blank lines and lines without `=` are skipped.
fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().trim_matches('"').to_string()))
        })
        .collect()
}
