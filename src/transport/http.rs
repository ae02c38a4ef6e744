use super::{ChatRequest, ChunkStream, Model, Transport};
use crate::error::RequestError;
use anyhow::{anyhow, Context};
use futures_core::future::BoxFuture;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use tokio_stream::StreamExt;

pub const DEFAULT_BASE_URL: &str = "https://api.qbraid.com/api";

#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    api_base: Url,
}

impl HttpTransport {
    pub fn new(http: reqwest::Client, base: &str) -> anyhow::Result<Self> {
        // Url::join drops the last segment unless the base ends with '/'.
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let api_base = Url::parse(&base).with_context(|| format!("invalid API base URL: {base}"))?;
        Ok(Self { http, api_base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, RequestError> {
        self.api_base
            .join(path)
            .map_err(|e| RequestError::LocalSetup(format!("invalid endpoint {path}: {e}")))
    }

    fn headers(api_key: &str) -> Result<HeaderMap, RequestError> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        h.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let v = HeaderValue::from_str(api_key)
            .map_err(|e| RequestError::LocalSetup(format!("API key is not a valid header value: {e}")))?;
        h.insert("api-key", v);
        Ok(h)
    }
}

/// Builder errors never reached the wire; everything else did.
fn classify_send_error(e: reqwest::Error) -> RequestError {
    if e.is_builder() {
        RequestError::LocalSetup(e.to_string())
    } else {
        RequestError::NoResponse(e.to_string())
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    fn list_models(&self, api_key: &str) -> BoxFuture<'static, anyhow::Result<Vec<Model>>> {
        let http = self.http.clone();
        let url = self.endpoint("chat/models");
        let headers = Self::headers(api_key);

        Box::pin(async move {
            let url = url?;
            let resp = http
                .get(url)
                .headers(headers?)
                .send()
                .await
                .context("failed to request chat models")?;

            let status = resp.status();
            let body = resp.bytes().await.context("failed to read chat models response")?;
            if !status.is_success() {
                return Err(anyhow!(
                    "chat models request failed: HTTP {status}: {}",
                    String::from_utf8_lossy(&body)
                ));
            }

            let entries: Vec<serde_json::Value> =
                serde_json::from_slice(&body).context("chat models response is not a JSON array")?;
            Ok(entries.into_iter().map(Model::from_value).collect())
        })
    }

    fn open_chat(
        &self,
        api_key: &str,
        req: ChatRequest,
    ) -> BoxFuture<'static, Result<ChunkStream, RequestError>> {
        let http = self.http.clone();
        let url = self.endpoint("chat");
        let headers = Self::headers(api_key);

        Box::pin(async move {
            let resp = http
                .post(url?)
                .headers(headers?)
                .json(&req)
                .send()
                .await
                .map_err(classify_send_error)?;

            let status = resp.status();
            if !status.is_success() {
                let body = match resp.text().await {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read rejected response body");
                        format!("<unreadable body: {e}>")
                    }
                };
                tracing::warn!(status = status.as_u16(), %body, "chat request rejected");
                return Err(RequestError::RemoteRejected {
                    status: status.as_u16(),
                    body,
                });
            }

            let stream = resp
                .bytes_stream()
                .map(|item| item.map_err(|e| anyhow!(e).context("network stream error")));
            Ok(Box::pin(stream) as ChunkStream)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn drain(mut stream: ChunkStream) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::new(reqwest::Client::new(), base).unwrap()
    }

    #[tokio::test]
    async fn lists_models_with_api_key_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chat/models"))
            .and(header("api-key", "secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "model": "gpt-4o-mini",
                    "description": "small and fast",
                    "pricing": {"units": "1M tokens", "input": 0.15, "output": 0.6}
                },
                {"model": "bare"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let t = transport(&format!("{}/api", server.uri()));
        let models = t.list_models("secret").await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].model, "gpt-4o-mini");
        assert_eq!(models[0].pricing.units, "1M tokens");
        assert_eq!(models[1].description, "");
    }

    #[tokio::test]
    async fn list_models_tolerates_null_and_string_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "model": "gpt-4o",
                    "description": null,
                    "pricing": {"units": "1M tokens", "input": "2.50", "output": 10}
                }
            ])))
            .mount(&server)
            .await;

        let models = transport(&server.uri()).list_models("k").await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].model, "gpt-4o");
        assert_eq!(models[0].description, "");
        assert_eq!(models[0].pricing.input, 2.5);
        assert_eq!(models[0].pricing.output, 10.0);
    }

    #[tokio::test]
    async fn list_models_rejects_non_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"models": []})))
            .mount(&server)
            .await;

        let err = transport(&server.uri()).list_models("k").await.unwrap_err();
        assert!(format!("{err:#}").contains("JSON array"));
    }

    #[tokio::test]
    async fn list_models_surfaces_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/chat/models"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = transport(&server.uri()).list_models("k").await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("401"));
        assert!(msg.contains("bad key"));
    }

    #[tokio::test]
    async fn posts_prompt_model_and_stream_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("api-key", "secret"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "prompt": "augmented",
                "model": "m1",
                "stream": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("Hello there"))
            .expect(1)
            .mount(&server)
            .await;

        let req = ChatRequest {
            prompt: "augmented".to_string(),
            model: "m1".to_string(),
            stream: true,
        };
        let stream = transport(&server.uri()).open_chat("secret", req).await.unwrap();
        assert_eq!(drain(stream).await, "Hello there");
    }

    #[tokio::test]
    async fn non_success_status_is_remote_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"error":"bad model"}"#))
            .mount(&server)
            .await;

        let req = ChatRequest {
            prompt: "p".to_string(),
            model: "nope".to_string(),
            stream: true,
        };
        match transport(&server.uri()).open_chat("k", req).await {
            Err(RequestError::RemoteRejected { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.contains("bad model"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a rejection"),
        }
    }

    #[tokio::test]
    async fn truncated_rejection_body_is_reported() {
        use std::io::{Read, Write};

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            // Consume the whole request (headers plus JSON body) before answering.
            while !(seen.windows(4).any(|w| w == b"\r\n\r\n") && seen.ends_with(b"}")) {
                match sock.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => seen.extend_from_slice(&buf[..n]),
                }
            }
            // Promise more body than is sent, then hang up.
            sock.write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial")
                .unwrap();
        });

        let req = ChatRequest {
            prompt: "p".to_string(),
            model: "m".to_string(),
            stream: true,
        };
        let res = transport(&format!("http://127.0.0.1:{port}")).open_chat("k", req).await;
        server.join().unwrap();

        match res {
            Err(RequestError::RemoteRejected { status, body }) => {
                assert_eq!(status, 500);
                assert!(body.starts_with("<unreadable body"), "body was {body:?}");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a rejection"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_no_response() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let req = ChatRequest {
            prompt: "p".to_string(),
            model: "m".to_string(),
            stream: true,
        };
        let res = transport(&format!("http://127.0.0.1:{port}")).open_chat("k", req).await;
        assert!(matches!(res, Err(RequestError::NoResponse(_))));
    }

    #[tokio::test]
    async fn bad_header_value_is_local_setup() {
        let req = ChatRequest {
            prompt: "p".to_string(),
            model: "m".to_string(),
            stream: true,
        };
        let res = transport("http://127.0.0.1:9").open_chat("bad\nkey", req).await;
        assert!(matches!(res, Err(RequestError::LocalSetup(_))));
    }

    #[test]
    fn base_without_trailing_slash_keeps_last_segment() {
        let t = transport("https://api.qbraid.com/api");
        assert_eq!(
            t.endpoint("chat/models").unwrap().as_str(),
            "https://api.qbraid.com/api/chat/models"
        );
    }
}
