use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default model (optional; falls back to the first catalog entry)
    pub model: Option<String>,

    /// Transport identifier ("http" or "stub").
    pub transport: Option<String>,

    /// API base URL, e.g. "https://api.qbraid.com/api".
    pub base_url: Option<String>,

    /// API key. QBRAID_API_KEY takes precedence; ~/.qbraid/qbraidrc is the fallback.
    pub api_key: Option<String>,

    /// Whole-request timeout handed to the HTTP client.
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }
}
