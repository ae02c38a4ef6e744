use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures surfaced by [`crate::client::ChatClient`].
///
/// Context persistence never shows up here; it is best-effort and only logged.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No API key could be found. Nothing was sent.
    #[error("API key is missing (set QBRAID_API_KEY or add `api-key = ...` to ~/.qbraid/qbraidrc)")]
    MissingCredential,

    /// The request failed before a response body was available.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// The response stream broke after it had started. Partial text is dropped.
    #[error("response stream failed: {0}")]
    Stream(#[source] BoxError),

    /// Listing the model catalog failed.
    #[error("failed to fetch chat models: {0}")]
    ModelFetch(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum RequestError {
    /// The server answered with a non-2xx status.
    #[error("API error: {status} - {body}")]
    RemoteRejected { status: u16, body: String },

    /// The request went out but nothing came back.
    #[error("no response received from the API: {0}")]
    NoResponse(String),

    /// The request never left the client.
    #[error("request error: {0}")]
    LocalSetup(String),
}

impl ChatError {
    pub fn stream(e: anyhow::Error) -> Self {
        ChatError::Stream(e.into())
    }

    pub fn model_fetch(e: anyhow::Error) -> Self {
        ChatError::ModelFetch(e.into())
    }
}
