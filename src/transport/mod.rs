pub mod http;
pub mod stub;

use crate::error::RequestError;
use bytes::Bytes;
use futures_core::future::BoxFuture;
use futures_core::stream::BoxStream;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub use http::HttpTransport;
pub use stub::StubTransport;

/// Body of `POST /chat`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub prompt: String,
    pub model: String,
    pub stream: bool,
}

/// One entry of the remote model catalog.
///
/// Decoding never fails: null or mistyped fields fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    #[serde(deserialize_with = "lenient_string")]
    pub model: String,
    #[serde(deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(deserialize_with = "lenient_pricing")]
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pricing {
    #[serde(deserialize_with = "lenient_string")]
    pub units: String,
    #[serde(deserialize_with = "lenient_number")]
    pub input: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub output: f64,
}

impl Model {
    /// Convert one catalog entry; anything that is not an object becomes a blank model.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0.0,
    })
}

fn lenient_pricing<'de, D: Deserializer<'de>>(d: D) -> Result<Pricing, D::Error> {
    Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
}

/// Raw response body, chunk by chunk, in arrival order.
pub type ChunkStream = BoxStream<'static, anyhow::Result<Bytes>>;

/// Network seam used by the chat client.
pub trait Transport {
    fn name(&self) -> &'static str;

    /// Fetch the model catalog.
    fn list_models(&self, api_key: &str) -> BoxFuture<'static, anyhow::Result<Vec<Model>>>;

    /// Start a chat request. Resolves once response headers are in.
    fn open_chat(
        &self,
        api_key: &str,
        req: ChatRequest,
    ) -> BoxFuture<'static, Result<ChunkStream, RequestError>>;
}
