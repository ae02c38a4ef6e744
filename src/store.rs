use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Key the conversation is persisted under.
pub const CONTEXT_KEY: &str = "qbraidChat.conversationContext";

/// Where an undecodable context is moved before it gets overwritten.
pub const CORRUPT_CONTEXT_KEY: &str = "qbraidChat.conversationContext.corrupt";

/// Most recent messages kept at rest.
pub const MAX_MESSAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Milliseconds since UNIX epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Reserved; carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<String>,
}

impl ConversationContext {
    fn push_bounded(&mut self, msg: Message) {
        self.messages.push(msg);
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }
}

enum Stored {
    Empty,
    Context(ConversationContext),
    Malformed(Value),
}

/// Get/set of JSON blobs by key.
pub trait KvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;
}

/// All keys live in a single JSON object on disk.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    path: PathBuf,
}

impl FileKvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> anyhow::Result<HashMap<String, Value>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read state: {}", self.path.display()))
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse state JSON: {}", self.path.display()))
    }

    fn save_atomic(&self, map: &HashMap<String, Value>) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create state directory: {}", dir.display()))?;

        let mut tmp = self.path.clone();
        let file = self
            .path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "state.json".to_string());
        tmp.set_file_name(format!("{file}.tmp"));

        let bytes = serde_json::to_vec_pretty(map).context("failed to serialize state")?;
        std::fs::write(&tmp, bytes)
            .with_context(|| format!("failed to write temp state: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move state into place: {}", self.path.display()))?;
        Ok(())
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut map = self.load()?;
        map.insert(key.to_string(), value);
        self.save_atomic(&map)
    }
}

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: Mutex<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let map = self.inner.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut map = self.inner.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        map.insert(key.to_string(), value);
        Ok(())
    }
}

/// Bounded conversation history on top of a [`KvStore`].
///
/// Every operation is best-effort: backend failures are logged and the store
/// behaves as if it were empty.
pub struct ContextStore {
    kv: Option<Arc<dyn KvStore + Send + Sync>>,
    write_lock: Mutex<()>,
}

impl ContextStore {
    pub fn new(kv: Arc<dyn KvStore + Send + Sync>) -> Self {
        Self {
            kv: Some(kv),
            write_lock: Mutex::new(()),
        }
    }

    /// A store with no backend. Reads are empty and writes are dropped.
    pub fn detached() -> Self {
        Self {
            kv: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn read(&self) -> ConversationContext {
        match self.load() {
            Stored::Context(ctx) => ctx,
            Stored::Empty => ConversationContext::default(),
            Stored::Malformed(_) => {
                tracing::warn!("stored context is malformed; using empty context");
                ConversationContext::default()
            }
        }
    }

    fn load(&self) -> Stored {
        let Some(kv) = &self.kv else {
            return Stored::Empty;
        };

        let value = match kv.get(CONTEXT_KEY) {
            Ok(Some(v)) => v,
            Ok(None) => return Stored::Empty,
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "context store unavailable; using empty context");
                return Stored::Empty;
            }
        };

        match serde_json::from_value(value.clone()) {
            Ok(ctx) => Stored::Context(ctx),
            Err(e) => {
                tracing::debug!(error = %e, "failed to decode stored context");
                Stored::Malformed(value)
            }
        }
    }

    pub fn append(&self, role: Role, content: &str) {
        let Some(kv) = &self.kv else {
            tracing::debug!(?role, "no context backend; dropping turn");
            return;
        };

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut ctx = match self.load() {
            Stored::Context(ctx) => ctx,
            Stored::Empty => ConversationContext::default(),
            Stored::Malformed(raw) => {
                tracing::warn!(
                    backup = CORRUPT_CONTEXT_KEY,
                    "replacing undecodable stored context; previous value moved aside"
                );
                if let Err(e) = kv.set(CORRUPT_CONTEXT_KEY, raw) {
                    tracing::warn!(error = %format!("{e:#}"), "failed to back up undecodable context");
                }
                ConversationContext::default()
            }
        };
        ctx.push_bounded(Message {
            role,
            content: content.to_string(),
            timestamp: now_millis(),
        });
        let len = ctx.messages.len();
        self.persist(kv.as_ref(), &ctx);
        tracing::debug!(?role, len, "appended turn to context");
    }

    pub fn clear(&self) {
        let Some(kv) = &self.kv else {
            tracing::debug!("no context backend; nothing to clear");
            return;
        };

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.persist(kv.as_ref(), &ConversationContext::default());
    }

    fn persist(&self, kv: &(dyn KvStore + Send + Sync), ctx: &ConversationContext) {
        let value = match serde_json::to_value(ctx) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize context");
                return;
            }
        };
        if let Err(e) = kv.set(CONTEXT_KEY, value) {
            tracing::warn!(error = %format!("{e:#}"), "failed to persist context");
        }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as i64
}
