//! Bot definitions: one captured curl command per agent, stored as `<name>.bot`.
//!
//! Only two values are extracted from a definition: the bearer token from the
//! `authorization` header line and the session cookie from the `cookie`
//! header line. A missing line leaves that credential unset.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use tokio::fs;
use tracing::{debug, info};

use crate::agent::Credentials;
use crate::error::DefinitionError;

/// File extension of a definition.
pub const DEFINITION_EXT: &str = "bot";

static BEARER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^  -H 'authorization: Bearer ([^'\r\n]*)").expect("valid bearer pattern")
});

static COOKIE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^  -H 'cookie: ?([^'\r\n]*)").expect("valid cookie pattern")
});

/// Extract credentials from a captured curl command. When a header line
/// repeats, the last one wins.
pub fn parse_credentials(text: &str) -> Credentials {
    let capture = |re: &Regex| {
        re.captures_iter(text)
            .last()
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    };
    Credentials::new(capture(&BEARER_LINE), capture(&COOKIE_LINE))
}

/// Check that `name` can be used as a definition file stem.
pub fn validate_name(name: &str) -> Result<(), DefinitionError> {
    let reason = if name.trim().is_empty() {
        Some("name is empty")
    } else if name != name.trim() {
        Some("name has surrounding whitespace")
    } else if name.starts_with('.') {
        Some("name starts with a dot")
    } else if name.contains(['/', '\\']) {
        Some("name contains a path separator")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(DefinitionError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

/// A stored definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub name: String,
    pub content: String,
}

impl Definition {
    pub fn credentials(&self) -> Credentials {
        parse_credentials(&self.content)
    }
}

/// Directory of `<name>.bot` definitions.
pub struct DefinitionStore {
    dir: PathBuf,
}

impl DefinitionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the directory if missing.
    pub async fn ensure_dir(&self) -> Result<(), DefinitionError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Path of the definition for `name`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, DefinitionError> {
        validate_name(name)?;
        Ok(self.dir.join(format!("{name}.{DEFINITION_EXT}")))
    }

    /// Read the definition stored for `name`.
    pub async fn read(&self, name: &str) -> Result<Definition, DefinitionError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(DefinitionError::NotFound {
                name: name.to_string(),
            });
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Definition {
            name: name.to_string(),
            content,
        })
    }

    /// Create or replace the definition for `name`.
    pub async fn write(&self, name: &str, content: &str) -> Result<(), DefinitionError> {
        let path = self.path_for(name)?;
        self.ensure_dir().await?;
        fs::write(&path, content).await?;
        info!(name = %name, path = %path.display(), "Definition saved");
        Ok(())
    }

    /// Every stored definition, sorted by name. A missing directory yields none.
    pub async fn load_all(&self) -> Result<Vec<Definition>, DefinitionError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut read_dir = fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(DEFINITION_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_name(stem).is_err() {
                debug!(path = %path.display(), "Skipping definition with unusable name");
                continue;
            }
            names.push(stem.to_string());
        }
        names.sort();

        let mut definitions = Vec::with_capacity(names.len());
        for name in names {
            info!(name = %name, dir = %self.dir.display(), "Loading definition");
            definitions.push(self.read(&name).await?);
        }
        Ok(definitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURL: &str = "curl 'https://banterbubbles.com/api/airdrop' \\\n  -H 'accept: */*' \\\n  -H 'authorization: Bearer eyJhbGc.abc' \\\n  -H 'cookie: session=xyz; other=1' \\\n  --compressed\n";

    #[test]
    fn parses_both_markers() {
        let creds = parse_credentials(CURL);
        assert_eq!(creds.bearer(), Some("eyJhbGc.abc"));
        assert_eq!(creds.session(), Some("session=xyz; other=1"));
    }

    #[test]
    fn missing_marker_leaves_field_unset() {
        let creds = parse_credentials("curl 'x' \\\n  -H 'cookie: a=b' \\\n");
        assert_eq!(creds.bearer(), None);
        assert_eq!(creds.session(), Some("a=b"));
    }

    #[test]
    fn marker_must_start_the_line() {
        let creds = parse_credentials("curl -H 'authorization: Bearer inline'\n");
        assert_eq!(creds.bearer(), None);
    }

    #[test]
    fn repeated_header_keeps_last() {
        let text = "curl 'x' \\\n  -H 'authorization: Bearer OLD' \\\n  -H 'authorization: Bearer NEW' \\\n";
        assert_eq!(parse_credentials(text).bearer(), Some("NEW"));
    }

    #[test]
    fn last_header_without_continuation() {
        let creds = parse_credentials("curl 'x' \\\n  -H 'cookie: last=1'");
        assert_eq!(creds.session(), Some("last=1"));
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("alice").is_ok());
        assert!(validate_name("bot-2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(" alice").is_err());
        assert!(validate_name(".hidden").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a/b").is_err());
    }

    #[tokio::test]
    async fn write_then_load_all_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefinitionStore::new(dir.path().join("bots"));

        store.write("zed", CURL).await.unwrap();
        store.write("alice", "curl 'x'\n").await.unwrap();
        std::fs::write(dir.path().join("bots/notes.txt"), "ignored").unwrap();

        let defs = store.load_all().await.unwrap();
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "zed"]);
        assert!(defs[1].credentials().is_complete());
        assert!(!defs[0].credentials().is_complete());
    }

    #[tokio::test]
    async fn write_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefinitionStore::new(dir.path());

        store.write("alice", "old").await.unwrap();
        store.write("alice", "new").await.unwrap();
        assert_eq!(store.read("alice").await.unwrap().content, "new");
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefinitionStore::new(dir.path());
        assert!(matches!(
            store.read("ghost").await,
            Err(DefinitionError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn missing_dir_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefinitionStore::new(dir.path().join("absent"));
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_name_rejected_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = DefinitionStore::new(dir.path());
        assert!(matches!(
            store.write("../escape", "x").await,
            Err(DefinitionError::InvalidName { .. })
        ));
    }
}
