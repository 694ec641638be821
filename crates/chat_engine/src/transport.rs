use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;

use crate::fragments::FragmentStream;
use crate::{FailureKind, TurnError};

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TurnError>> + Send>>;

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    /// Whole-request deadline. None leaves the reply unbounded in time.
    pub request_timeout: Option<Duration>,
    pub max_bytes: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/query".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

/// A started reply whose body has not been read yet.
pub struct ResponseBody {
    pub content_type: Option<String>,
    pub stream: ByteStream,
}

impl ResponseBody {
    pub fn new(content_type: Option<String>, stream: ByteStream) -> Self {
        Self {
            content_type,
            stream,
        }
    }

    /// Decoded text fragments in arrival order.
    pub fn into_fragments(self) -> FragmentStream {
        FragmentStream::new(self.content_type.as_deref(), self.stream)
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, query: &str) -> Result<ResponseBody, TurnError>;
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    settings: TransportSettings,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, TurnError> {
        let mut builder = reqwest::Client::builder().connect_timeout(self.settings.connect_timeout);
        if let Some(timeout) = self.settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|err| TurnError::new(FailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn open(&self, query: &str) -> Result<ResponseBody, TurnError> {
        let url = reqwest::Url::parse(&self.settings.endpoint)
            .map_err(|err| TurnError::new(FailureKind::InvalidEndpoint, err.to_string()))?;
        let body = serde_json::to_vec(&QueryRequest { query })
            .map_err(|err| TurnError::new(FailureKind::Network, err.to_string()))?;
        let client = self.build_client()?;

        let response = client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TurnError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let max_bytes = self.settings.max_bytes;
        if let Some(content_len) = response.content_length() {
            if content_len > max_bytes {
                return Err(TurnError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: content_len,
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let mut received: u64 = 0;
        let stream = response.bytes_stream().map(move |chunk| {
            let chunk = chunk.map_err(map_reqwest_error)?;
            received += chunk.len() as u64;
            if received > max_bytes {
                return Err(TurnError::new(
                    FailureKind::TooLarge {
                        max_bytes,
                        actual: received,
                    },
                    "response too large",
                ));
            }
            Ok(chunk)
        });

        Ok(ResponseBody::new(content_type, Box::pin(stream)))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TurnError {
    if err.is_timeout() {
        return TurnError::new(FailureKind::Timeout, err.to_string());
    }
    TurnError::new(FailureKind::Network, err.to_string())
}
