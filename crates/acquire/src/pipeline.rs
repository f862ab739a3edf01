//! Download-extract-promote with retry

use modelvault_config::Config;
use modelvault_storage::DirectoryProvisioner;
use reqwest::Url;
use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::archive::{self, InstallPaths};
use crate::bundle::{AcquireReport, AttemptOutcome, DownloadAttempt, ModelBundle};
use crate::source::{BundleSource, HttpBundleSource};
use crate::{AcquireError, AttemptError, Result};

/// How many times to try and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): `attempt * backoff_step`
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

type CodeLocks = Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;

/// Fetches and installs model bundles under sandboxed roots
pub struct ModelAcquisitionPipeline {
    provisioner: DirectoryProvisioner,
    source: Arc<dyn BundleSource>,
    policy: RetryPolicy,
    locks: CodeLocks,
}

impl ModelAcquisitionPipeline {
    pub fn new(
        provisioner: DirectoryProvisioner,
        source: Arc<dyn BundleSource>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            provisioner,
            source,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Pipeline with an HTTP source and retry settings from `config`
    pub fn from_config(config: &Config, provisioner: DirectoryProvisioner) -> Result<Self> {
        let source = HttpBundleSource::new(config.connect_timeout(), config.read_timeout())
            .map_err(|e| AcquireError::InvalidArgument(format!("cannot build HTTP client: {e}")))?;
        let policy = RetryPolicy {
            max_attempts: config.download.max_attempts,
            backoff_step: config.backoff_step(),
        };
        Ok(Self::new(provisioner, Arc::new(source), policy))
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn provisioner(&self) -> &DirectoryProvisioner {
        &self.provisioner
    }

    /// Make sure the bundle for `code` is installed under `destination_root`.
    ///
    /// Arguments are checked before anything touches the disk. An installed,
    /// non-empty bundle is returned as is. Concurrent calls for the same code
    /// share one download.
    pub async fn acquire(
        &self,
        url: &str,
        code: &str,
        destination_root: &Path,
    ) -> Result<AcquireReport> {
        let url = parse_url(url)?;
        validate_code(code)?;

        let mut warnings = self.provisioner.ensure_data_root().await?;
        let root = self.provisioner.validate(destination_root)?;
        warnings.extend(self.provisioner.ensure_directory(&root).await?);

        // dropped in reverse: guard, our handle, then the map entry
        let _release = LockRelease {
            locks: &self.locks,
            code,
        };
        let lock = self.lock_for(code);
        let _guard = lock.lock().await;
        let report = self.acquire_locked(&url, code, root.as_path()).await?;

        Ok(AcquireReport { warnings, ..report })
    }

    async fn acquire_locked(&self, url: &Url, code: &str, root: &Path) -> Result<AcquireReport> {
        let paths = InstallPaths::new(root, code);

        let existing = {
            let root = root.to_path_buf();
            let owned = code.to_string();
            tokio::task::spawn_blocking(move || ModelBundle::inspect(&root, &owned))
                .await
                .map_err(|e| acquisition_error(code, 0, e.into()))?
        };
        if let Some(bundle) = existing {
            info!("model '{}' already installed at {:?}", code, bundle.path);
            return Ok(AcquireReport {
                bundle,
                attempts: Vec::new(),
                warnings: Vec::new(),
                reused: true,
            });
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = Vec::new();

        let mut index = 0;
        loop {
            index += 1;
            info!("downloading model '{}' (attempt {}/{})", code, index, max_attempts);
            match self.attempt(url, code, &paths).await {
                Ok(bundle) => {
                    attempts.push(DownloadAttempt {
                        index,
                        outcome: AttemptOutcome::Succeeded,
                        error: None,
                        backoff: None,
                    });
                    if bundle.is_complete() {
                        info!("model '{}' installed at {:?}", code, bundle.path);
                    } else {
                        warn!(
                            "model '{}' installed with missing files: {:?}",
                            code, bundle.missing_files
                        );
                    }
                    return Ok(AcquireReport {
                        bundle,
                        attempts,
                        warnings: Vec::new(),
                        reused: false,
                    });
                }
                Err(e) if index < max_attempts => {
                    error!("attempt {} for '{}' failed: {}", index, code, e);
                    let wait = self.policy.backoff_after(index);
                    attempts.push(DownloadAttempt {
                        index,
                        outcome: AttemptOutcome::Failed,
                        error: Some(e.to_string()),
                        backoff: Some(wait),
                    });
                    debug!("retrying '{}' in {:?}", code, wait);
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    error!("attempt {} for '{}' failed, giving up: {}", index, code, e);
                    if let Err(e) = archive::remove_file_if_exists(&paths.archive) {
                        warn!("failed to remove leftover archive: {}", e);
                    }
                    return Err(acquisition_error(code, max_attempts, e));
                }
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        code: &str,
        paths: &InstallPaths,
    ) -> std::result::Result<ModelBundle, AttemptError> {
        let outcome = self.download_and_install(url, code, paths).await;

        let cleanup_paths = paths.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || archive::cleanup(&cleanup_paths)).await
        {
            warn!("cleanup task for '{}' failed: {}", code, e);
        }
        outcome?;

        let bundle = paths.bundle.clone();
        let missing = tokio::task::spawn_blocking(move || archive::missing_files(&bundle)).await?;
        Ok(ModelBundle {
            code: code.to_string(),
            path: paths.bundle.clone(),
            missing_files: missing,
        })
    }

    async fn download_and_install(
        &self,
        url: &Url,
        code: &str,
        paths: &InstallPaths,
    ) -> std::result::Result<(), AttemptError> {
        let bytes = self.source.fetch(url, &paths.archive).await?;
        debug!("downloaded {} bytes for '{}'", bytes, code);

        let install_paths = paths.clone();
        tokio::task::spawn_blocking(move || archive::install(&install_paths)).await?
    }

    fn lock_for(&self, code: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(code.to_string()).or_default().clone()
    }

    #[cfg(test)]
    fn held_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Drops the map entry for `code` once no caller holds its lock.
///
/// Runs on every exit from `acquire`, including when the future is dropped
/// while waiting or downloading.
struct LockRelease<'a> {
    locks: &'a CodeLocks,
    code: &'a str,
}

impl Drop for LockRelease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks
            .get(self.code)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(self.code);
        }
    }
}

fn acquisition_error(code: &str, attempts: u32, source: AttemptError) -> AcquireError {
    AcquireError::Acquisition {
        code: code.to_string(),
        attempts,
        source,
    }
}

/// Accept only absolute http(s) URLs
pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AcquireError::InvalidArgument(format!("malformed url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        scheme => Err(AcquireError::InvalidArgument(format!(
            "unsupported url scheme '{scheme}' in '{raw}'"
        ))),
    }
}

/// A code names exactly one directory under the models root.
///
/// Names that collide with the pipeline's scratch entries are refused.
pub fn validate_code(code: &str) -> Result<()> {
    let invalid = |why: &str| {
        Err(AcquireError::InvalidArgument(format!(
            "model code '{code}' {why}"
        )))
    };

    if code.is_empty() {
        return invalid("is empty");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return invalid("contains unsupported characters");
    }
    let mut components = Path::new(code).components();
    if !matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) {
        return invalid("is not a single path segment");
    }
    if code.starts_with('.') || code.starts_with("temp_") || code.ends_with(".zip") {
        return invalid("collides with reserved names");
    }
    Ok(())
}
