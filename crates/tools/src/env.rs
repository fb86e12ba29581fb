//! Environment snapshot used to resolve credentials
//!
//! Instead of merging the env file into the process environment, the loader
//! works on an explicit [`Environment`] built from the process variables and
//! the env file. Nothing here writes to the process environment.

use crate::config::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Where an environment value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarSource {
    /// Inherited from the process environment
    Process,
    /// Read from the env file
    DotEnv,
}

impl VarSource {
    /// Human-readable name for logs
    pub fn as_str(&self) -> &'static str {
        match self {
            VarSource::Process => "process environment",
            VarSource::DotEnv => ".env file",
        }
    }
}

#[derive(Clone)]
struct EnvValue {
    value: String,
    source: VarSource,
}

/// Read-only view of the variables available to the loader
#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, EnvValue>,
    /// Whether the snapshot was taken from the process environment
    inherits_process: bool,
}

impl Environment {
    /// Snapshot with no variables
    pub fn empty() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .map(|(key, value)| {
                (
                    key,
                    EnvValue {
                        value,
                        source: VarSource::Process,
                    },
                )
            })
            .collect();

        Self {
            vars,
            inherits_process: true,
        }
    }

    /// Snapshot from explicit pairs, tagged as process variables
    ///
    /// The snapshot does not inherit the process environment.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(key, value)| {
                (
                    key.into(),
                    EnvValue {
                        value: value.into(),
                        source: VarSource::Process,
                    },
                )
            })
            .collect();

        Self {
            vars,
            inherits_process: false,
        }
    }

    /// Merge `KEY=VALUE` pairs from an env file
    ///
    /// Variables already present keep their value. Returns `Ok(false)` when
    /// the file does not exist, which is not an error.
    ///
    /// `$VAR` substitution is resolved by dotenvy against the process
    /// environment, so a snapshot that does not inherit the process
    /// environment rejects files using it. Single-quoted values and `\$`
    /// are literal and always accepted.
    pub fn merge_dotenv(&mut self, path: &Path) -> Result<bool, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "env file not found, using process environment only");
                return Ok(false);
            }
            Err(err) => {
                return Err(ConfigError::EnvFile {
                    path: path.to_path_buf(),
                    reason: err.to_string(),
                })
            }
        };

        if !self.inherits_process {
            if let Some(line) = find_substitution(&content) {
                return Err(ConfigError::EnvFile {
                    path: path.to_path_buf(),
                    reason: format!(
                        "variable substitution on line {} needs the process environment",
                        line
                    ),
                });
            }
        }

        let mut merged = 0usize;
        for item in dotenvy::from_read_iter(content.as_bytes()) {
            let (key, value) = item.map_err(|err| env_file_error(path, err))?;

            if self.vars.contains_key(&key) {
                debug!(key = %key, "variable already set, ignoring env file value");
                continue;
            }

            self.vars.insert(
                key,
                EnvValue {
                    value,
                    source: VarSource::DotEnv,
                },
            );
            merged += 1;
        }

        debug!(path = %path.display(), merged, "merged env file");
        Ok(true)
    }

    /// Value of `key`, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(|v| v.value.as_str())
    }

    /// Where `key` was read from, if set
    pub fn source(&self, key: &str) -> Option<VarSource> {
        self.vars.get(key).map(|v| v.source)
    }
}

// Values may be secrets, so only names and sources are printed
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.vars.iter().collect();
        keys.sort_by(|a, b| a.0.cmp(b.0));

        f.debug_map()
            .entries(keys.into_iter().map(|(k, v)| (k, v.source)))
            .finish()
    }
}

/// First line (1-based) with an unescaped `$` outside single quotes
fn find_substitution(content: &str) -> Option<usize> {
    for (index, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('#') {
            continue;
        }

        let value = trimmed.split_once('=').map_or(trimmed, |(_, v)| v).trim_start();
        if value.starts_with('\'') {
            continue;
        }

        let mut escaped = false;
        for c in value.chars() {
            match c {
                '\\' if !escaped => escaped = true,
                '$' if !escaped => return Some(index + 1),
                '#' if !escaped && !value.starts_with('"') => break,
                _ => escaped = false,
            }
        }
    }

    None
}

/// Build an env file error without echoing the offending line, which may hold a key
fn env_file_error(path: &Path, err: dotenvy::Error) -> ConfigError {
    let reason = match err {
        dotenvy::Error::LineParse(_, index) => {
            format!("malformed line (parse error at character {})", index)
        }
        dotenvy::Error::Io(io) => io.to_string(),
        other => other.to_string(),
    };

    ConfigError::EnvFile {
        path: path.to_path_buf(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_from_pairs_and_get() {
        let env = Environment::from_pairs([("PRIVATE_KEY", "0xabc123")]);
        assert_eq!(env.get("PRIVATE_KEY"), Some("0xabc123"));
        assert_eq!(env.source("PRIVATE_KEY"), Some(VarSource::Process));
        assert_eq!(env.get("MISSING"), None);
    }

    #[test]
    fn test_empty_environment() {
        let env = Environment::empty();
        assert_eq!(env.get("PRIVATE_KEY"), None);
    }

    #[test]
    fn test_merge_dotenv_reads_pairs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        fs::write(&path, "# comment\nPRIVATE_KEY=0xabc123\nOTHER=\"quoted value\"\n").unwrap();

        let mut env = Environment::empty();
        assert!(env.merge_dotenv(&path).unwrap());

        assert_eq!(env.get("PRIVATE_KEY"), Some("0xabc123"));
        assert_eq!(env.source("PRIVATE_KEY"), Some(VarSource::DotEnv));
        assert_eq!(env.get("OTHER"), Some("quoted value"));
    }

    #[test]
    fn test_merge_dotenv_missing_file_is_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut env = Environment::from_pairs([("A", "1")]);

        let found = env.merge_dotenv(&tmp.path().join(".env")).unwrap();

        assert!(!found);
        assert_eq!(env.get("A"), Some("1"));
        assert_eq!(env.source("A"), Some(VarSource::Process));
    }

    #[test]
    fn test_merge_dotenv_does_not_override_existing() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        fs::write(&path, "PRIVATE_KEY=from-file\nEXTRA=1\n").unwrap();

        let mut env = Environment::from_pairs([("PRIVATE_KEY", "from-process")]);
        env.merge_dotenv(&path).unwrap();

        assert_eq!(env.get("PRIVATE_KEY"), Some("from-process"));
        assert_eq!(env.source("PRIVATE_KEY"), Some(VarSource::Process));
        assert_eq!(env.source("EXTRA"), Some(VarSource::DotEnv));
    }

    #[test]
    fn test_merge_dotenv_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut env = Environment::empty();

        let result = env.merge_dotenv(tmp.path());
        assert!(matches!(result, Err(ConfigError::EnvFile { .. })));
    }

    #[test]
    fn test_merge_dotenv_malformed_line_hides_content() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        fs::write(&path, "PRIVATE_KEY='0xsecretvalue\n").unwrap();

        let mut env = Environment::empty();
        let err = env.merge_dotenv(&path).unwrap_err();

        assert!(matches!(err, ConfigError::EnvFile { .. }));
        assert!(!err.to_string().contains("0xsecretvalue"));
    }

    #[test]
    fn test_merge_dotenv_isolated_rejects_substitution() {
        std::env::set_var("NATUREDEFENDER_TEST_HOST_KEY", "0xFROMPROCESS");

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        fs::write(&path, "PRIVATE_KEY=${NATUREDEFENDER_TEST_HOST_KEY}\n").unwrap();

        let mut env = Environment::empty();
        let err = env.merge_dotenv(&path).unwrap_err();

        std::env::remove_var("NATUREDEFENDER_TEST_HOST_KEY");

        assert!(matches!(err, ConfigError::EnvFile { .. }));
        assert!(err.to_string().contains("line 1"));
        assert!(!err.to_string().contains("FROMPROCESS"));
        assert_eq!(env.get("PRIVATE_KEY"), None);
    }

    #[test]
    fn test_merge_dotenv_isolated_accepts_literal_dollar() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        fs::write(&path, "A='$literal'\n# $comment\n").unwrap();

        let mut env = Environment::from_pairs([("OTHER", "1")]);
        assert!(env.merge_dotenv(&path).unwrap());
        assert_eq!(env.get("A"), Some("$literal"));
    }

    #[test]
    fn test_merge_dotenv_inheriting_snapshot_substitutes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".env");
        fs::write(
            &path,
            "NATUREDEFENDER_TEST_BASE=abc\nNATUREDEFENDER_TEST_DERIVED=${NATUREDEFENDER_TEST_BASE}\n",
        )
        .unwrap();

        let mut env = Environment::from_process();
        env.merge_dotenv(&path).unwrap();

        assert_eq!(env.get("NATUREDEFENDER_TEST_DERIVED"), Some("abc"));
    }

    #[test]
    fn test_find_substitution() {
        assert_eq!(find_substitution("A=1\nB=2\n"), None);
        assert_eq!(find_substitution("A=1\nB=${A}\n"), Some(2));
        assert_eq!(find_substitution("A=\"x $HOME\"\n"), Some(1));
        assert_eq!(find_substitution("A='$HOME'\n"), None);
        assert_eq!(find_substitution("A=\\$HOME\n"), None);
        assert_eq!(find_substitution("# uses $HOME\nA=1 # $HOME\n"), None);
    }

    #[test]
    fn test_debug_prints_names_only() {
        let env = Environment::from_pairs([("PRIVATE_KEY", "0xsupersecret")]);
        let debug = format!("{:?}", env);

        assert!(debug.contains("PRIVATE_KEY"));
        assert!(!debug.contains("0xsupersecret"));
    }
}
