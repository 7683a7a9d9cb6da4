//! Recon probe client.
//!
//! Performs one HTTP `GET` against one node's recon endpoint with an
//! explicit timeout. No retries and no shared state: retry policy belongs
//! to the caller.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use tracing::debug;

use swiftex_core::Target;

use crate::error::{ProbeError, ProbeResult};
use crate::payload::{ReconEndpoint, ReconPayload};

/// Largest response body accepted from a recon endpoint.
pub const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// Boxed future returned by [`ReconProbe::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = ProbeResult<ReconPayload>> + Send + 'a>>;

/// Anything that can run a single recon query against a single node.
///
/// Implementations must honour `timeout` and must not retry.
pub trait ReconProbe: Send + Sync {
    fn probe<'a>(
        &'a self,
        target: &'a Target,
        endpoint: ReconEndpoint,
        timeout: Duration,
    ) -> ProbeFuture<'a>;
}

/// HTTP/1.1 recon client over a fresh TCP connection per probe.
#[derive(Debug, Clone)]
pub struct HttpReconClient {
    user_agent: String,
}

impl HttpReconClient {
    pub fn new() -> Self {
        Self {
            user_agent: format!("swiftex/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for HttpReconClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconProbe for HttpReconClient {
    fn probe<'a>(
        &'a self,
        target: &'a Target,
        endpoint: ReconEndpoint,
        timeout: Duration,
    ) -> ProbeFuture<'a> {
        Box::pin(async move {
            match tokio::time::timeout(timeout, self.fetch(target, endpoint)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(node = %target, %endpoint, "recon probe timed out");
                    Err(ProbeError::Timeout(timeout))
                }
            }
        })
    }
}

impl HttpReconClient {
    async fn fetch(&self, target: &Target, endpoint: ReconEndpoint) -> ProbeResult<ReconPayload> {
        let authority = target.authority();
        let uri = format!("http://{authority}{}", endpoint.path());

        let stream = tokio::net::TcpStream::connect(authority.as_str())
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "recon probe connection failed");
                ProbeError::Connection(e.to_string())
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| {
                debug!(error = %e, %uri, "recon probe handshake failed");
                ProbeError::Connection(e.to_string())
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", &authority)
            .header("user-agent", &self.user_agent)
            .header("accept", "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(|e| ProbeError::Connection(format!("invalid request: {e}")))?;

        let resp = sender.send_request(req).await.map_err(|e| {
            debug!(error = %e, %uri, "recon probe request failed");
            ProbeError::Connection(e.to_string())
        })?;

        if !resp.status().is_success() {
            debug!(status = %resp.status(), %uri, "recon probe non-2xx");
            return Err(ProbeError::Status(resp.status().as_u16()));
        }

        let body = Limited::new(resp.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| ProbeError::Malformed(format!("failed to read body: {e}")))?
            .to_bytes();

        endpoint.decode(&body)
    }
}
