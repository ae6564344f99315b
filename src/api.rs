//! Blocking HTTP client for the LifeTrace backend

use crate::error::ApiError;
use log::{debug, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::Read;
use std::time::Duration;

/// Images larger than this are truncated when downloaded.
const MAX_IMAGE_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotData {
    pub id: i64,
    #[serde(default)]
    pub file_path: String,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    #[serde(default)]
    pub created_at: String,
    pub text_content: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrResult {
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub processing_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotDetail {
    #[serde(flatten)]
    pub screenshot: ScreenshotData,
    pub ocr_result: Option<OcrResult>,
}

/// Event summary: a run of screenshots sharing one app/window context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub id: i64,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    #[serde(default)]
    pub start_time: String,
    pub end_time: Option<String>,
    #[serde(default)]
    pub screenshot_count: u32,
    pub first_screenshot_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    pub id: i64,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    #[serde(default)]
    pub start_time: String,
    pub end_time: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<ScreenshotData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticSearchResult {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub ocr_result: Option<OcrResult>,
    pub screenshot: Option<ScreenshotData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SemanticSearchRequest {
    pub query: String,
    pub top_k: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_rerank: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieve_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Map<String, Value>>,
}

/// Optional filters for the list endpoints.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub app_name: Option<String>,
}

impl ListParams {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut out = Vec::with_capacity(5);
        if let Some(v) = self.limit {
            out.push(("limit", v.to_string()));
        }
        if let Some(v) = self.offset {
            out.push(("offset", v.to_string()));
        }
        if let Some(v) = &self.start_date {
            out.push(("start_date", v.clone()));
        }
        if let Some(v) = &self.end_date {
            out.push(("end_date", v.clone()));
        }
        if let Some(v) = &self.app_name {
            out.push(("app_name", v.clone()));
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Raw screenshot bytes plus what we could tell about them.
#[derive(Debug, Clone)]
pub struct ImageBlob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

impl ImageBlob {
    /// Format sniffed from magic bytes, falling back to the content type.
    pub fn format(&self) -> &str {
        let b = &self.bytes;
        if b.starts_with(&[0x89, b'P', b'N', b'G']) {
            "PNG"
        } else if b.starts_with(&[0xFF, 0xD8, 0xFF]) {
            "JPEG"
        } else if b.len() >= 12 && &b[0..4] == b"RIFF" && &b[8..12] == b"WEBP" {
            "WEBP"
        } else if b.starts_with(b"GIF8") {
            "GIF"
        } else {
            self.content_type.as_deref().unwrap_or("unknown")
        }
    }
}

/// Streaming response body of the chat endpoint.
pub type ChatStream = Box<dyn Read + Send + Sync + 'static>;

/// Thin wrapper over two ureq agents: one with an overall timeout for
/// request/response calls, one without for the chat stream.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    agent: ureq::Agent,
    stream_agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build();
        let stream_agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
            stream_agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let mut req = self.agent.get(&self.url(endpoint));
        for (k, v) in query {
            req = req.query(k, v);
        }
        debug!("GET {}", endpoint);
        let response = req.call()?;
        Ok(response.into_json::<T>()?)
    }

    fn post_json<T: DeserializeOwned>(&self, endpoint: &str, body: Value) -> Result<T, ApiError> {
        debug!("POST {}", endpoint);
        let response = self.agent.post(&self.url(endpoint)).send_json(body)?;
        Ok(response.into_json::<T>()?)
    }

    pub fn health(&self) -> Result<Health, ApiError> {
        self.get_json("/health", &[])
    }

    pub fn list_events(&self, params: &ListParams) -> Result<Vec<EventData>, ApiError> {
        self.get_json("/api/events", &params.pairs())
    }

    pub fn event_detail(&self, event_id: i64) -> Result<EventDetail, ApiError> {
        self.get_json(&format!("/api/events/{}", event_id), &[])
    }

    pub fn list_screenshots(&self, params: &ListParams) -> Result<Vec<ScreenshotData>, ApiError> {
        self.get_json("/api/screenshots", &params.pairs())
    }

    pub fn screenshot_detail(&self, screenshot_id: i64) -> Result<ScreenshotDetail, ApiError> {
        self.get_json(&format!("/api/screenshots/{}", screenshot_id), &[])
    }

    pub fn screenshot_image_url(&self, screenshot_id: i64) -> String {
        self.url(&format!("/api/screenshots/{}/image", screenshot_id))
    }

    pub fn screenshot_image(&self, screenshot_id: i64) -> Result<ImageBlob, ApiError> {
        let response = self.agent.get(&self.screenshot_image_url(screenshot_id)).call()?;
        let content_type = response.header("Content-Type").map(str::to_string);
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)?;
        Ok(ImageBlob { bytes, content_type })
    }

    /// Keyword search over events (OCR text aggregated per event).
    pub fn search_events(&self, query: &str, limit: usize) -> Result<Vec<EventData>, ApiError> {
        self.post_json("/api/event-search", json!({ "query": query, "limit": limit }))
    }

    pub fn semantic_search_events(&self, query: &str, top_k: usize) -> Result<Vec<EventData>, ApiError> {
        self.post_json("/api/event-semantic-search", json!({ "query": query, "top_k": top_k }))
    }

    /// Semantic search first, keyword search if that fails for any reason.
    pub fn search_events_with_fallback(&self, query: &str, limit: usize) -> Result<Vec<EventData>, ApiError> {
        match self.semantic_search_events(query, limit) {
            Ok(events) => Ok(events),
            Err(e) => {
                warn!("Semantic search failed, falling back to keyword search: {}", e);
                self.search_events(query, limit)
            }
        }
    }

    pub fn search_screenshots(&self, query: &str, params: &ListParams) -> Result<Vec<ScreenshotData>, ApiError> {
        let mut body = Map::new();
        body.insert("query".into(), Value::from(query));
        for (k, v) in params.pairs() {
            let value = match k {
                "limit" | "offset" => v.parse::<u64>().map(Value::from).unwrap_or(Value::from(v)),
                _ => Value::from(v),
            };
            body.insert(k.into(), value);
        }
        self.post_json("/api/search", Value::Object(body))
    }

    pub fn semantic_search(&self, request: &SemanticSearchRequest) -> Result<Vec<SemanticSearchResult>, ApiError> {
        let body = serde_json::to_value(request).map_err(|e| ApiError::Decode(e.into()))?;
        self.post_json("/api/semantic-search", body)
    }

    /// Open the chat stream. The returned reader yields raw bytes as the
    /// server produces them.
    pub fn chat_stream(&self, message: &str) -> Result<ChatStream, ApiError> {
        debug!("POST /api/chat/stream ({} chars)", message.chars().count());
        let response = self
            .stream_agent
            .post(&self.url("/api/chat/stream"))
            .send_json(json!({ "message": message }))?;
        Ok(response.into_reader())
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! One-shot HTTP fixture server for client tests.

    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// Captured request: request line and body.
    pub struct Captured {
        pub request_line: String,
        pub body: String,
    }

    /// Serve the given raw responses (one per connection, in order) and
    /// return the base URL plus a receiver of captured requests.
    pub fn serve(responses: Vec<Vec<u8>>) -> (String, mpsc::Receiver<Captured>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else { return };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut request_line = String::new();
                reader.read_line(&mut request_line).unwrap();
                let mut content_length = 0usize;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if let Some(v) = lower.strip_prefix("content-length:") {
                        content_length = v.trim().parse().unwrap_or(0);
                    }
                }
                let mut body = vec![0u8; content_length];
                reader.read_exact(&mut body).unwrap();
                let _ = tx.send(Captured {
                    request_line: request_line.trim_end().to_string(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
                stream.write_all(&response).unwrap();
                stream.flush().unwrap();
            }
        });
        (format!("http://{}", addr), rx)
    }

    pub fn json_response(status: &str, body: &str) -> Vec<u8> {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
        .into_bytes()
    }
}
