//! Wire access to the upstream index.
//!
//! [`Transport`] is the seam between the metadata client and the network: an
//! RPC-style `call` against the index endpoint and a plain `get` for text
//! listings and file bytes. [`HttpTransport`] speaks JSON-RPC 2.0 over
//! `reqwest`; tests substitute an in-memory implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use exn::ResultExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use url::Url;

use crate::error::{ErrorKind, Result};

pub const DEFAULT_INDEX_URL: &str = "https://pypi.python.org/pypi";
pub const DEFAULT_DAYTIME_URL: &str = "https://pypi.python.org/daytime";

#[async_trait]
pub trait Transport: Send + Sync {
    /// Invokes `method` on the index endpoint and returns its decoded result.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;

    /// Fetches `url`. `Ok(None)` means the server answered "not modified".
    async fn get(&self, url: &Url) -> Result<Option<Vec<u8>>>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize)]
struct RpcFault {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcFault>,
}

/// Options for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub endpoint: Url,
    pub user_agent: String,
    pub timeout: Duration,
}

pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(options: HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .build()
            .or_raise(|| ErrorKind::Transport("client construction".to_string()))?;
        Ok(HttpTransport {
            client,
            endpoint: options.endpoint,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn check_status(status: StatusCode) -> Result<()> {
    if !status.is_success() {
        exn::bail!(ErrorKind::Status(status.as_u16()));
    }
    Ok(())
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, params), fields(endpoint = %self.endpoint))]
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .or_raise(|| ErrorKind::Transport(method.to_string()))?;
        check_status(response.status())?;
        let body: RpcResponse = response.json().await.or_raise(|| ErrorKind::Decode)?;
        if let Some(fault) = body.error {
            exn::bail!(ErrorKind::Fault(format!("{} ({})", fault.message, fault.code)));
        }
        Ok(body.result.unwrap_or(Value::Null))
    }

    #[instrument(level = "debug", skip(self), fields(url = %url))]
    async fn get(&self, url: &Url) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .or_raise(|| ErrorKind::Transport(url.to_string()))?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        check_status(response.status())?;
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Transport(url.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }
}
