use crate::common::{Error, Result};
use futures_util::future::BoxFuture;
use std::time::Duration;

/// Calls the master issues against chunkservers
pub trait ChunkserverClient: Send + Sync {
    /// Delete one chunk of an object from the chunkserver at `endpoint`.
    ///
    /// Any non-success outcome is an error; the caller decides whether it matters.
    fn delete_chunk<'a>(
        &'a self,
        endpoint: &'a str,
        object_id: &'a str,
        chunk_index: u64,
    ) -> BoxFuture<'a, Result<()>>;
}

/// Chunkserver client over HTTP
///
/// `DELETE {endpoint}/api/chunk/delete?object_id=..&chunk_index=..`
pub struct HttpChunkserverClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpChunkserverClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    fn delete_url(endpoint: &str) -> String {
        format!("{}/api/chunk/delete", endpoint.trim_end_matches('/'))
    }
}

impl ChunkserverClient for HttpChunkserverClient {
    fn delete_chunk<'a>(
        &'a self,
        endpoint: &'a str,
        object_id: &'a str,
        chunk_index: u64,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let index = chunk_index.to_string();
            let response = self
                .client
                .delete(Self::delete_url(endpoint))
                .query(&[("object_id", object_id), ("chunk_index", index.as_str())])
                .send()
                .await
                .map_err(|e| Error::ChunkserverRequest {
                    endpoint: endpoint.to_string(),
                    reason: if e.is_timeout() {
                        format!("timed out after {:?}", self.timeout)
                    } else {
                        e.to_string()
                    },
                })?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::ChunkserverRequest {
                    endpoint: endpoint.to_string(),
                    reason: format!("HTTP {}", status),
                });
            }

            Ok(())
        })
    }
}
