//! Optional project file declaring extra networks
//!
//! ```toml
//! [network.local]
//! url = "http://127.0.0.1:8545"
//! accounts_env = ["LOCAL_KEY"]
//! gas_price = 1000000000
//! ```
//!
//! The file only names the environment variables holding keys; it never
//! stores a key itself.

use crate::config::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// One `[network.<name>]` table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkEntry {
    pub url: String,
    /// Variables to read signing keys from, in account order
    #[serde(default)]
    pub accounts_env: Vec<String>,
    /// Fixed gas price in wei
    #[serde(default)]
    pub gas_price: Option<u64>,
}

/// Parsed project file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectFile {
    #[serde(default)]
    pub network: BTreeMap<String, NetworkEntry>,
}

impl ProjectFile {
    /// Load the project file, or `None` if it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "project file not found");
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let project = Self::parse(&content)?;
        debug!(
            path = %path.display(),
            networks = project.network.len(),
            "loaded project file"
        );

        Ok(Some(project))
    }

    /// Parse project file contents
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let project: ProjectFile =
            toml::from_str(content).map_err(|err| toml_error(content, &err))?;

        for (name, entry) in &project.network {
            if name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "network name cannot be empty".to_string(),
                ));
            }

            if let Some(var) = entry.accounts_env.iter().find(|v| v.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "network '{}' lists an empty account variable name: '{}'",
                    name, var
                )));
            }
        }

        Ok(project)
    }
}

/// Build a parse error without the source snippet toml puts in `Display`
///
/// A key pasted into the file would otherwise be echoed back, so only the
/// message and position are kept, with quoted values masked.
fn toml_error(content: &str, err: &toml::de::Error) -> ConfigError {
    let message = mask_quoted(err.message());

    let position = err
        .span()
        .and_then(|span| content.get(..span.start))
        .map(|before| {
            let line = before.matches('\n').count() + 1;
            let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
            format!(" at line {}, column {}", line, column)
        })
        .unwrap_or_default();

    ConfigError::TomlError(format!("{}{}", message, position))
}

/// Replace the contents of every double-quoted segment with `***`
fn mask_quoted(message: &str) -> String {
    let mut masked = String::with_capacity(message.len());
    let mut in_quote = false;

    for c in message.chars() {
        if c == '"' {
            if in_quote {
                masked.push_str("***");
            }
            masked.push('"');
            in_quote = !in_quote;
        } else if !in_quote {
            masked.push(c);
        }
    }

    if in_quote {
        masked.push_str("***");
    }

    masked
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_full_entry() {
        let project = ProjectFile::parse(
            r#"
[network.local]
url = "http://127.0.0.1:8545"
accounts_env = ["LOCAL_KEY", "SECOND_KEY"]
gas_price = 1000000000
"#,
        )
        .unwrap();

        let local = &project.network["local"];
        assert_eq!(local.url, "http://127.0.0.1:8545");
        assert_eq!(local.accounts_env, vec!["LOCAL_KEY", "SECOND_KEY"]);
        assert_eq!(local.gas_price, Some(1_000_000_000));
    }

    #[test]
    fn test_parse_defaults() {
        let project = ProjectFile::parse("[network.local]\nurl = \"http://localhost:8545\"\n").unwrap();

        let local = &project.network["local"];
        assert!(local.accounts_env.is_empty());
        assert!(local.gas_price.is_none());
    }

    #[test]
    fn test_parse_empty_file() {
        let project = ProjectFile::parse("").unwrap();
        assert!(project.network.is_empty());
    }

    #[test]
    fn test_parse_rejects_unknown_fields() {
        let result = ProjectFile::parse("[network.local]\nurl = \"http://x\"\nprivate_key = \"0x1\"\n");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_parse_error_does_not_echo_values() {
        let err = ProjectFile::parse(
            "[network.local]\nurl = \"http://x\"\nprivate_key = \"0xSECRETSECRET\"\n",
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, ConfigError::TomlError(_)));
        assert!(!message.contains("SECRETSECRET"));
        assert!(message.contains("private_key"));
        assert!(message.contains("line 3"));
    }

    #[test]
    fn test_parse_type_error_masks_string_value() {
        let err = ProjectFile::parse(
            "[network.local]\nurl = \"http://x\"\naccounts_env = \"0xSECRETSECRET\"\n",
        )
        .unwrap_err();

        assert!(!err.to_string().contains("SECRETSECRET"));
    }

    #[test]
    fn test_mask_quoted() {
        assert_eq!(mask_quoted("invalid type: string \"0xabc\""), "invalid type: string \"***\"");
        assert_eq!(mask_quoted("unknown field `x`"), "unknown field `x`");
        assert_eq!(mask_quoted("open \"abc"), "open \"***");
    }

    #[test]
    fn test_parse_rejects_missing_url() {
        let result = ProjectFile::parse("[network.local]\naccounts_env = [\"KEY\"]\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_blank_account_variable() {
        let result =
            ProjectFile::parse("[network.local]\nurl = \"http://x\"\naccounts_env = [\" \"]\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let result = ProjectFile::load(&tmp.path().join("networks.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_load_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("networks.toml");
        fs::write(&path, "[network.devnet]\nurl = \"https://devnet.example.org\"\n").unwrap();

        let project = ProjectFile::load(&path).unwrap().unwrap();
        assert!(project.network.contains_key("devnet"));
    }
}
