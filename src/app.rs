use crate::auth::{CredentialProvider, QbraidrcFile, StaticKey};
use crate::client::ChatClient;
use crate::store::{ContextStore, FileKvStore, MemoryKvStore, Role};
use crate::transport::{self, HttpTransport, StubTransport, Transport};
use crate::{config, paths};
use anyhow::Context;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

/// Settings resolved from flags, then config, then defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub transport: String,
    pub base_url: String,
    pub model: Option<String>,
    pub ephemeral: bool,
}

impl Settings {
    pub fn resolve(args: &crate::cli::Args, cfg: Option<&config::Config>) -> Self {
        Self {
            transport: args
                .transport
                .clone()
                .or_else(|| cfg.and_then(|c| c.transport.clone()))
                .unwrap_or_else(|| "http".to_string()),
            base_url: args
                .base_url
                .clone()
                .or_else(|| cfg.and_then(|c| c.base_url.clone()))
                .unwrap_or_else(|| transport::http::DEFAULT_BASE_URL.to_string()),
            model: args.model.clone().or_else(|| cfg.and_then(|c| c.model.clone())),
            ephemeral: args.ephemeral,
        }
    }
}

pub fn build_http(cfg: Option<&config::Config>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")));
    if let Some(secs) = cfg.and_then(|c| c.request_timeout_secs) {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build().context("failed to build HTTP client")
}

pub fn build_transport(
    http: &reqwest::Client,
    settings: &Settings,
) -> anyhow::Result<Box<dyn Transport + Send + Sync>> {
    match settings.transport.as_str() {
        "http" => Ok(Box::new(HttpTransport::new(http.clone(), &settings.base_url)?)),
        "stub" => Ok(Box::new(StubTransport::new())),
        other => anyhow::bail!("unknown transport: {other}"),
    }
}

pub fn build_credentials(cfg: Option<&config::Config>) -> anyhow::Result<Box<dyn CredentialProvider + Send + Sync>> {
    let key = std::env::var("QBRAID_API_KEY")
        .ok()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| cfg.and_then(|c| c.api_key.clone()));

    if let Some(key) = key {
        return Ok(Box::new(StaticKey(Some(key))));
    }

    let rc = QbraidrcFile::new(paths::qbraidrc_path()?);
    tracing::debug!(path = %rc.path().display(), "using qbraidrc for API key");
    Ok(Box::new(rc))
}

pub fn build_store(settings: &Settings, dirs: Option<&paths::Dirs>) -> ContextStore {
    if settings.ephemeral {
        return ContextStore::new(Arc::new(MemoryKvStore::new()));
    }

    match dirs {
        Some(dirs) => {
            let path = dirs.context_file();
            tracing::debug!(path = %path.display(), "using file-backed context");
            ContextStore::new(Arc::new(FileKvStore::new(path)))
        }
        None => {
            tracing::warn!("no state directory; conversation will not be remembered");
            ContextStore::detached()
        }
    }
}

pub fn build_client(
    http: &reqwest::Client,
    cfg: Option<&config::Config>,
    settings: &Settings,
    dirs: Option<&paths::Dirs>,
) -> anyhow::Result<ChatClient> {
    let transport = build_transport(http, settings)?;
    let credentials = build_credentials(cfg)?;
    let store = build_store(settings, dirs);
    Ok(ChatClient::new(transport, credentials, store))
}

/// Configured model, or the first entry of the catalog.
pub async fn resolve_model(client: &ChatClient, settings: &Settings) -> anyhow::Result<String> {
    if let Some(m) = &settings.model {
        return Ok(m.clone());
    }

    let models = client.list_models().await?;
    let Some(first) = models.into_iter().map(|m| m.model).find(|m| !m.is_empty()) else {
        anyhow::bail!("the model catalog is empty; pass --model explicitly");
    };
    tracing::info!(model = %first, "no model configured; using first catalog entry");
    Ok(first)
}

pub async fn cmd_chat(client: &ChatClient, settings: &Settings, prompt: &str, stream: bool) -> anyhow::Result<()> {
    let model = resolve_model(client, settings).await?;
    let reply = client.send_message(prompt, &model, stream).await?;

    let mut out = std::io::stdout();
    writeln!(out, "{reply}")?;
    Ok(())
}

pub async fn cmd_models(client: &ChatClient) -> anyhow::Result<()> {
    let models = client.list_models().await?;
    let mut out = std::io::stdout();
    if models.is_empty() {
        writeln!(out, "(no models available)")?;
        return Ok(());
    }
    for m in &models {
        writeln!(
            out,
            "{}\t{} in / {} out per {}\t{}",
            m.model, m.pricing.input, m.pricing.output, m.pricing.units, m.description
        )?;
    }
    Ok(())
}

pub fn cmd_history(client: &ChatClient) -> anyhow::Result<()> {
    let ctx = client.context();
    let mut out = std::io::stdout();
    if ctx.messages.is_empty() {
        writeln!(out, "(no conversation history)")?;
        return Ok(());
    }
    for m in &ctx.messages {
        let who = match m.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        writeln!(out, "{who}: {}\n", m.content.trim())?;
    }
    Ok(())
}

pub fn cmd_clear(client: &ChatClient) -> anyhow::Result<()> {
    client.clear_context();
    writeln!(std::io::stdout(), "Conversation history cleared.")?;
    Ok(())
}

pub fn cmd_auth(client: &ChatClient) -> anyhow::Result<()> {
    if !client.has_credential() {
        anyhow::bail!(crate::error::ChatError::MissingCredential);
    }
    writeln!(std::io::stdout(), "API key found.")?;
    Ok(())
}
