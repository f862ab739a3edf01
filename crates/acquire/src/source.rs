//! Where bundle archives come from

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Url};
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::time::error::Elapsed;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::AttemptError;

/// Fetches a bundle archive into a local file
#[async_trait]
pub trait BundleSource: Send + Sync {
    /// Write the resource at `url` to `dest`, returning the byte count
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, AttemptError>;
}

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Plain HTTP(S) download with a streamed body.
///
/// Waiting longer than the idle timeout for response headers or for the next
/// body chunk fails the fetch with [`AttemptError::Stalled`].
pub struct HttpBundleSource {
    client: Client,
    idle_timeout: Duration,
}

impl HttpBundleSource {
    pub fn new(connect_timeout: Duration, idle_timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().connect_timeout(connect_timeout).build()?;
        Ok(Self::with_client(client).idle_timeout(idle_timeout))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }
}

impl Default for HttpBundleSource {
    fn default() -> Self {
        Self::with_client(Client::new())
    }
}

#[async_trait]
impl BundleSource for HttpBundleSource {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<u64, AttemptError> {
        trace!("requesting {}", url);
        let idle = self.idle_timeout;
        let stalled = |_: Elapsed| {
            warn!("no data from {} for {:?}", url, idle);
            AttemptError::Stalled(idle)
        };

        let response = timeout(idle, self.client.get(url.clone()).send())
            .await
            .map_err(stalled)??;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::HttpStatus(status.as_u16()));
        }

        let file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| AttemptError::io(dest, e))?;
        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = timeout(idle, stream.next()).await.map_err(stalled)? {
            let chunk = chunk?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| AttemptError::io(dest, e))?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(|e| AttemptError::io(dest, e))?;

        debug!("wrote {} bytes to {:?}", written, dest);
        Ok(written)
    }
}
