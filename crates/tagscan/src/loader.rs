//! Rule catalog loading from strings, files, and directories.
//!
//! Loading is the only hard-failure surface of the library: a malformed
//! rules file fails the whole call with no partial catalog. Rules that parse
//! but do not validate (bad regexes, unknown kinds) become violations on the
//! returned catalog instead.

use std::fs;
use std::path::{Path, PathBuf};

use tagscan_domain::RuleCatalog;
use tagscan_types::Rule;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("read rules from '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse rules from {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_rules_from_str(text: &str) -> Result<RuleCatalog, LoadError> {
    let rules: Vec<Rule> = serde_json::from_str(text).map_err(|source| LoadError::Parse {
        origin: "string".to_string(),
        source,
    })?;
    Ok(RuleCatalog::from_rules(rules))
}

pub fn load_rules_from_file(path: &Path) -> Result<RuleCatalog, LoadError> {
    Ok(RuleCatalog::from_rules(read_rule_file(path)?))
}

/// Merge every `*.json` file in a directory, in name order, into one
/// catalog. Fails on the first unreadable or malformed file.
pub fn load_rules_from_dir(path: &Path) -> Result<RuleCatalog, LoadError> {
    let entries = fs::read_dir(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    let mut rules = Vec::new();
    for p in &paths {
        rules.extend(read_rule_file(p)?);
    }
    debug!(files = paths.len(), rules = rules.len(), "loaded rule directory");
    Ok(RuleCatalog::from_rules(rules))
}

fn read_rule_file(path: &Path) -> Result<Vec<Rule>, LoadError> {
    debug!(path = %path.display(), "loading rules");
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| LoadError::Parse {
        origin: format!("'{}'", path.display()),
        source,
    })
}
