use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Source of the API key. Absent means "no key", never an error.
pub trait CredentialProvider {
    fn api_key(&self) -> Option<String>;
}

/// Key known up front (environment or config file).
#[derive(Debug, Clone)]
pub struct StaticKey(pub Option<String>);

impl CredentialProvider for StaticKey {
    fn api_key(&self) -> Option<String> {
        self.0.clone()
    }
}

/// The qBraid key file, re-read on every lookup so edits apply immediately.
#[derive(Debug, Clone)]
pub struct QbraidrcFile {
    path: PathBuf,
}

impl QbraidrcFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialProvider for QbraidrcFile {
    fn api_key(&self) -> Option<String> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read qbraidrc");
                return None;
            }
        };

        let key = parse_api_key(&text);
        if key.is_none() {
            tracing::warn!(path = %self.path.display(), "API key not found in qbraidrc");
        }
        key
    }
}

fn api_key_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"api-key\s*=\s*(\S+)").expect("static regex"))
}

/// First `api-key = <value>` entry in an INI-style qbraidrc.
pub fn parse_api_key(text: &str) -> Option<String> {
    api_key_pattern()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}
