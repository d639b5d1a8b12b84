//! Transfer of a URL to a local file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::path::Path;
use std::sync::Arc;

use crate::http::HttpClient;
use crate::progress::ProgressSink;
use crate::runtime::Runtime;

/// Fetches `url` into `dest`, reporting through `progress`.
///
/// A canceled transfer fails with [`crate::http::NonRetryableError::Canceled`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path, progress: Arc<dyn ProgressSink>)
    -> Result<()>;
}

/// [`Downloader`] over [`HttpClient`], writing through the [`Runtime`].
pub struct HttpDownloader<R: Runtime> {
    runtime: Arc<R>,
    http_client: HttpClient,
}

impl<R: Runtime> HttpDownloader<R> {
    pub fn new(runtime: Arc<R>, http_client: HttpClient) -> Self {
        Self {
            runtime,
            http_client,
        }
    }

    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }
}

#[async_trait]
impl<R: Runtime + 'static> Downloader for HttpDownloader<R> {
    #[tracing::instrument(skip(self, progress))]
    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Arc<dyn ProgressSink>,
    ) -> Result<()> {
        info!("Downloading {}...", url);

        let runtime = self.runtime.as_ref();
        let bytes = self
            .http_client
            .download_file(
                url,
                || {
                    runtime
                        .create_file(dest)
                        .with_context(|| format!("Failed to create download file at {:?}", dest))
                },
                progress.as_ref(),
            )
            .await
            .with_context(|| format!("Failed to download {}", url))?;

        info!("Download complete ({} bytes).", bytes);
        Ok(())
    }
}
