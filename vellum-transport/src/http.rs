//! Request/response transport to the remote peer

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};
use vellum_index::Manifest;

use crate::errors::{Result, TransportError};
use crate::messages::{CheckResponse, ChunkInfo, PayloadEncoding, TransferPayload};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the payload encoding on download responses.
pub const ENCODING_HEADER: &str = "x-vellum-encoding";

/// Stateless calls the sync engine makes against the remote peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submit the local manifest; the remote answers with what to transfer
    /// and any divergences it detected.
    async fn check(&self, manifest: &Manifest) -> Result<CheckResponse>;

    async fn upload(&self, path: &str, payload: TransferPayload) -> Result<()>;

    async fn download(&self, path: &str) -> Result<TransferPayload>;

    /// Connectivity and auth probe.
    async fn ping(&self) -> Result<()>;

    async fn login(&self, username: &str, password: &str) -> Result<String>;

    async fn acknowledge_conflict(&self, id: &str, resolution: &str) -> Result<()>;
}

/// HTTP implementation of [`Transport`].
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpTransport {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: RwLock::new(token),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self) -> Option<String> {
        self.token.read().expect("token lock poisoned").clone()
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.bearer() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let resp = req.send().await.map_err(request_error)?;
        match resp.status() {
            s if s.is_success() => Ok(resp),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(TransportError::Auth(
                format!("remote rejected credentials ({})", resp.status()),
            )),
            s => Err(TransportError::Protocol(format!(
                "unexpected status {} from {}",
                s,
                resp.url()
            ))),
        }
    }
}

fn request_error(e: reqwest::Error) -> TransportError {
    TransportError::Network(e.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn check(&self, manifest: &Manifest) -> Result<CheckResponse> {
        debug!("check: {} local entries", manifest.len());
        let req = self
            .authorize(self.client.post(self.url("/api/sync/check")))
            .json(manifest);
        let resp = self.send(req).await?;
        resp.json::<CheckResponse>()
            .await
            .map_err(|e| TransportError::Protocol(format!("invalid check response: {}", e)))
    }

    async fn upload(&self, path: &str, payload: TransferPayload) -> Result<()> {
        trace!("upload: {} ({} bytes)", path, payload.data.len());
        let mut form = reqwest::multipart::Form::new()
            .text("path", path.to_string())
            .text("encoding", payload.encoding.as_str())
            .part(
                path.to_string(),
                reqwest::multipart::Part::bytes(payload.data.to_vec()),
            );
        if let Some(ChunkInfo { index, count }) = payload.chunk {
            form = form
                .text("chunk_index", index.to_string())
                .text("chunk_count", count.to_string());
        }

        let req = self
            .authorize(self.client.post(self.url("/api/sync/upload")))
            .multipart(form);
        self.send(req).await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<TransferPayload> {
        trace!("download: {}", path);
        let req = self
            .authorize(self.client.post(self.url("/api/sync/download")))
            .json(&json!({ "path": path }));
        let resp = self.send(req).await?;

        let encoding = resp
            .headers()
            .get(ENCODING_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(PayloadEncoding::parse)
            .unwrap_or(PayloadEncoding::Identity);

        let data: Bytes = resp.bytes().await.map_err(request_error)?;
        Ok(TransferPayload {
            data,
            encoding,
            chunk: None,
        })
    }

    async fn ping(&self) -> Result<()> {
        let req = self.authorize(self.client.get(self.url("/api/sync/ping")));
        self.send(req).await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<String> {
        #[derive(Deserialize)]
        struct LoginResponse {
            token: String,
        }

        let req = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({ "username": username, "password": password }));
        let resp = self.send(req).await?;
        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("invalid login response: {}", e)))?;

        *self.token.write().expect("token lock poisoned") = Some(body.token.clone());
        Ok(body.token)
    }

    async fn acknowledge_conflict(&self, id: &str, resolution: &str) -> Result<()> {
        let req = self
            .authorize(
                self.client
                    .put(self.url(&format!("/api/sync/conflicts/{}", id))),
            )
            .json(&json!({ "resolution": resolution }));
        self.send(req).await?;
        Ok(())
    }
}
