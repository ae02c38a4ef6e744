use super::{ChatRequest, ChunkStream, Model, Pricing, Transport};
use crate::error::RequestError;
use crate::prompt;
use bytes::Bytes;
use futures_core::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Offline transport. Echoes the request back in a few chunks.
#[derive(Debug, Default, Clone)]
pub struct StubTransport;

impl StubTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for StubTransport {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn list_models(&self, _api_key: &str) -> BoxFuture<'static, anyhow::Result<Vec<Model>>> {
        Box::pin(async move {
            Ok(vec![Model {
                model: "stub-echo".to_string(),
                description: "Offline echo model".to_string(),
                pricing: Pricing {
                    units: "1M tokens".to_string(),
                    input: 0.0,
                    output: 0.0,
                },
            }])
        })
    }

    fn open_chat(
        &self,
        _api_key: &str,
        req: ChatRequest,
    ) -> BoxFuture<'static, Result<ChunkStream, RequestError>> {
        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<anyhow::Result<Bytes>>(32);

            tokio::spawn(async move {
                let question = current_question(&req.prompt).to_string();

                let parts = [
                    format!("[stub model: {}] ", req.model),
                    "You asked: ".to_string(),
                    question,
                ];

                for p in parts {
                    tokio::time::sleep(std::time::Duration::from_millis(40)).await;
                    if tx.send(Ok(Bytes::from(p))).await.is_err() {
                        break;
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}

/// The new prompt inside a rendered request, minus the history and closing line.
fn current_question(rendered: &str) -> &str {
    let rest = rendered
        .rsplit_once("Current question:\n")
        .map(|(_, rest)| rest)
        .unwrap_or(rendered);
    rest.strip_suffix(prompt::CLOSING_INSTRUCTION)
        .and_then(|q| q.strip_suffix("\n\n"))
        .unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn echoes_current_question() {
        let req = ChatRequest {
            prompt: prompt::render(&[], "What is entanglement?"),
            model: "stub-echo".to_string(),
            stream: true,
        };
        let mut stream = StubTransport::new().open_chat("k", req).await.unwrap();
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[stub model: stub-echo] You asked: What is entanglement?"
        );
    }

    #[test]
    fn keeps_every_paragraph_of_the_question() {
        let rendered = prompt::render(&[], "First paragraph.\n\nSecond paragraph.");
        assert_eq!(current_question(&rendered), "First paragraph.\n\nSecond paragraph.");
    }
}
