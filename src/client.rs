use crate::auth::CredentialProvider;
use crate::error::ChatError;
use crate::prompt;
use crate::store::{ContextStore, ConversationContext, Role};
use crate::transport::{ChatRequest, ChunkStream, Model, Transport};
use tokio_stream::StreamExt;

/// Conversation-aware client for the remote chat service.
///
/// Owns the context store: it is the only thing that records turns, and it
/// records the assistant turn only after the full response has arrived.
pub struct ChatClient {
    transport: Box<dyn Transport + Send + Sync>,
    credentials: Box<dyn CredentialProvider + Send + Sync>,
    store: ContextStore,
}

impl ChatClient {
    pub fn new(
        transport: Box<dyn Transport + Send + Sync>,
        credentials: Box<dyn CredentialProvider + Send + Sync>,
        store: ContextStore,
    ) -> Self {
        Self {
            transport,
            credentials,
            store,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.api_key().is_some()
    }

    pub fn context(&self) -> ConversationContext {
        self.store.read()
    }

    pub fn clear_context(&self) {
        self.store.clear();
    }

    pub async fn list_models(&self) -> Result<Vec<Model>, ChatError> {
        let api_key = self.credentials.api_key().ok_or(ChatError::MissingCredential)?;

        let models = self
            .transport
            .list_models(&api_key)
            .await
            .map_err(ChatError::model_fetch)?;
        tracing::debug!(count = models.len(), "fetched chat models");
        Ok(models)
    }

    /// Send one prompt and wait for the whole reply.
    pub async fn send_message(&self, prompt: &str, model: &str, stream: bool) -> Result<String, ChatError> {
        let api_key = self.credentials.api_key().ok_or(ChatError::MissingCredential)?;

        // The user's own turn is part of the history it is sent with.
        self.store.append(Role::User, prompt);
        let history = self.store.read();
        let augmented = prompt::render(&history.messages, prompt);
        tracing::debug!(model, history = history.messages.len(), "sending chat request");

        let req = ChatRequest {
            prompt: augmented,
            model: model.to_string(),
            stream,
        };
        let chunks = self.transport.open_chat(&api_key, req).await.map_err(|e| {
            tracing::warn!(error = %e, "chat request failed");
            ChatError::Request(e)
        })?;

        let text = aggregate(chunks).await.map_err(|e| {
            tracing::warn!(error = %format!("{e:#}"), "chat stream failed; discarding partial reply");
            ChatError::stream(e)
        })?;

        self.store.append(Role::Assistant, &text);
        Ok(text)
    }
}

/// Concatenate every chunk until end of stream.
///
/// Bytes are decoded once at the end, so the result does not depend on where
/// chunk boundaries fall.
pub async fn aggregate(mut chunks: ChunkStream) -> anyhow::Result<String> {
    let mut buf: Vec<u8> = Vec::new();
    let mut count = 0usize;
    while let Some(chunk) = chunks.next().await {
        buf.extend_from_slice(&chunk?);
        count += 1;
    }
    tracing::debug!(chunks = count, bytes = buf.len(), "response stream complete");

    Ok(match String::from_utf8(buf) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}
