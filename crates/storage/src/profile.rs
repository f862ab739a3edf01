//! Storage profiles: where data lives and which roots are trusted

use async_trait::async_trait;
use modelvault_config::{Config, ProfileKind};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::gate::{ensure_storage_access, PollSettings, StorageCapabilityGate};

/// Platform storage layout, selected once at startup
#[async_trait]
pub trait StorageProfile: Send + Sync {
    fn name(&self) -> &'static str;

    /// Base data directory for this process
    async fn data_root(&self) -> PathBuf;

    /// Unresolved candidates for the sandbox roots, read from current state
    fn root_candidates(&self) -> Vec<PathBuf>;
}

/// Plain filesystem with a configured data root
#[derive(Debug, Clone)]
pub struct DesktopProfile {
    data_root: PathBuf,
    extra_roots: Vec<PathBuf>,
}

impl DesktopProfile {
    /// Data root plus the system temp directory as trusted roots
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            extra_roots: vec![std::env::temp_dir()],
        }
    }

    /// Only the data root is trusted
    pub fn isolated(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            extra_roots: Vec::new(),
        }
    }
}

#[async_trait]
impl StorageProfile for DesktopProfile {
    fn name(&self) -> &'static str {
        "desktop"
    }

    async fn data_root(&self) -> PathBuf {
        self.data_root.clone()
    }

    fn root_candidates(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.data_root.clone()];
        roots.extend(self.extra_roots.iter().cloned());
        roots
    }
}

/// Mobile-style storage: shared cache behind a capability gate, with private
/// internal storage as the fallback
pub struct RestrictedProfile {
    shared_cache: Option<PathBuf>,
    internal_files: PathBuf,
    gate: Arc<dyn StorageCapabilityGate>,
    poll: PollSettings,
    extra_roots: Vec<PathBuf>,
}

impl RestrictedProfile {
    pub fn new(
        shared_cache: Option<PathBuf>,
        internal_files: impl Into<PathBuf>,
        gate: Arc<dyn StorageCapabilityGate>,
    ) -> Self {
        Self {
            shared_cache,
            internal_files: internal_files.into(),
            gate,
            poll: PollSettings::default(),
            extra_roots: vec![std::env::temp_dir()],
        }
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Replace the extra trusted roots (system temp by default)
    pub fn with_extra_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.extra_roots = roots;
        self
    }

    /// Private storage location for a package
    pub fn internal_files_for(package_name: &str) -> PathBuf {
        PathBuf::from(format!("/data/data/{}/files", package_name))
    }
}

#[async_trait]
impl StorageProfile for RestrictedProfile {
    fn name(&self) -> &'static str {
        "restricted"
    }

    async fn data_root(&self) -> PathBuf {
        let Some(shared) = &self.shared_cache else {
            warn!("shared storage unavailable, using internal storage");
            return self.internal_files.clone();
        };

        if ensure_storage_access(self.gate.as_ref(), &self.poll).await {
            debug!("using shared storage at {:?}", shared);
            shared.join("app_data")
        } else {
            warn!("storage permission denied, using internal storage");
            self.internal_files.clone()
        }
    }

    fn root_candidates(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = self.shared_cache.iter().cloned().collect();
        roots.push(self.internal_files.clone());
        roots.extend(self.extra_roots.iter().cloned());
        roots
    }
}

/// Pick the profile named in `config`; `gate` is only consulted by the
/// restricted profile
pub fn profile_from_config(
    config: &Config,
    gate: Arc<dyn StorageCapabilityGate>,
) -> Arc<dyn StorageProfile> {
    match config.storage.profile {
        ProfileKind::Desktop => Arc::new(DesktopProfile::new(config.data_root())),
        ProfileKind::Restricted => {
            let shared = config
                .storage
                .shared_cache_dir
                .as_deref()
                .filter(|dir| !dir.is_empty())
                .map(modelvault_config::expand_tilde);
            let internal = RestrictedProfile::internal_files_for(&config.storage.package_name);
            let poll = PollSettings {
                timeout: config.permission_timeout(),
                interval: config.permission_poll_interval(),
            };
            Arc::new(RestrictedProfile::new(shared, internal, gate).with_poll(poll))
        }
    }
}
