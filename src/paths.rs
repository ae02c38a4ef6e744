use anyhow::Context;
use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

/// Where qchat looks for its config and keeps its state.
///
/// Resolving never touches the filesystem; directories are created by whatever
/// writes into them first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirs {
    pub config: PathBuf,
    pub state: PathBuf,
}

impl Dirs {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::resolve(|name| env::var_os(name))
    }

    /// `QCHAT_HOME` wins, then the XDG variables, then `~/.config` and `~/.local/state`.
    fn resolve(var: impl Fn(&str) -> Option<OsString>) -> anyhow::Result<Self> {
        if let Some(base) = var("QCHAT_HOME").map(PathBuf::from) {
            return Ok(Self {
                config: base.join("config"),
                state: base.join("state"),
            });
        }

        let home = || -> anyhow::Result<PathBuf> { var("HOME").map(PathBuf::from).context("HOME is not set") };

        let config = match var("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg).join("qchat"),
            None => home()?.join(".config").join("qchat"),
        };
        let state = match var("XDG_STATE_HOME") {
            Some(xdg) => PathBuf::from(xdg).join("qchat"),
            None => home()?.join(".local").join("state").join("qchat"),
        };
        Ok(Self { config, state })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config.join("config.toml")
    }

    pub fn context_file(&self) -> PathBuf {
        self.state.join("context.json")
    }
}

/// The qBraid SDK's key file. Read only; qBraid tooling owns it.
pub fn qbraidrc_path() -> anyhow::Result<PathBuf> {
    let home = env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".qbraid").join("qbraidrc"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve_with(vars: &[(&str, &str)]) -> anyhow::Result<Dirs> {
        let vars: HashMap<String, OsString> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), OsString::from(v)))
            .collect();
        Dirs::resolve(|name| vars.get(name).cloned())
    }

    #[test]
    fn qchat_home_overrides_everything() {
        let dirs = resolve_with(&[("QCHAT_HOME", "/q"), ("XDG_CONFIG_HOME", "/x"), ("HOME", "/h")]).unwrap();
        assert_eq!(dirs.config_file(), PathBuf::from("/q/config/config.toml"));
        assert_eq!(dirs.context_file(), PathBuf::from("/q/state/context.json"));
    }

    #[test]
    fn xdg_then_home() {
        let dirs = resolve_with(&[("XDG_STATE_HOME", "/xs"), ("HOME", "/h")]).unwrap();
        assert_eq!(dirs.config, PathBuf::from("/h/.config/qchat"));
        assert_eq!(dirs.state, PathBuf::from("/xs/qchat"));
    }

    #[test]
    fn missing_home_is_an_error() {
        assert!(resolve_with(&[]).is_err());
    }

    #[test]
    fn resolving_creates_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("qchat-home");
        let dirs = resolve_with(&[("QCHAT_HOME", base.to_str().unwrap())]).unwrap();
        assert!(!dirs.config.exists());
        assert!(!dirs.state.exists());
        assert!(!base.exists());
    }
}
