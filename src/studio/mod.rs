pub mod config;
pub mod credentials;
pub mod day_default;
pub mod indexer;
pub mod lock;
pub mod model;
pub mod paths;
pub mod payload;
pub mod prompts;
pub mod remote;
pub mod scanner;
pub mod settings;
pub mod store;
pub mod sync_gate;
pub mod sync_log;
pub mod util;
pub mod warn;

use anyhow::{Context, Result};

use crate::studio::config::{StudioConfig, load_config};
use crate::studio::credentials::{CredentialResolver, EnvOrFileCredentials};
use crate::studio::indexer::Indexer;
use crate::studio::lock::{DEFAULT_LOCK_WAIT, WriterLock};
use crate::studio::model::SyncReadiness;
use crate::studio::paths::{StudioPaths, resolve_paths};
use crate::studio::prompts::{BootstrapReport, PromptStore};
use crate::studio::settings::SettingsSource;
use crate::studio::store::EntryStore;

/// Everything one command needs: resolved paths, config and the open store.
pub struct Studio {
    pub paths: StudioPaths,
    pub config: StudioConfig,
    pub store: EntryStore,
}

impl Studio {
    pub fn open() -> Result<Self> {
        let paths = resolve_paths()?;
        let config = load_config(&paths.studio_home)?;
        Self::from_parts(paths, config)
    }

    pub fn from_parts(paths: StudioPaths, config: StudioConfig) -> Result<Self> {
        paths.ensure_dirs()?;
        let store = EntryStore::open(&paths.db_path)
            .with_context(|| format!("failed to open {}", paths.db_path.display()))?;
        Ok(Self {
            paths,
            config,
            store,
        })
    }

    pub fn indexer(&self) -> Indexer<'_> {
        Indexer::new(&self.store, &self.paths.diary_dir)
    }

    pub fn credentials(&self) -> EnvOrFileCredentials {
        EnvOrFileCredentials::from_env(&self.paths.credentials_file)
    }

    pub fn writer_lock(&self) -> Result<WriterLock> {
        WriterLock::acquire(&self.paths.lock_file, DEFAULT_LOCK_WAIT)
    }

    /// Open the prompt catalog, seeding or migrating it on first use.
    pub fn prompts(&self) -> Result<(PromptStore<'_>, BootstrapReport)> {
        Ok(PromptStore::open(
            &self.store,
            &self.paths.legacy_prompts,
            crate::assets::bundled_diary_prompt(),
            crate::assets::LEGACY_MINIMAL_PROMPT,
        )?)
    }

    /// Sync switches for `canSync`; an unreadable credential file counts
    /// as not configured here and is reported properly by the sync gate.
    pub fn readiness(&self) -> Result<SyncReadiness> {
        let cloud_sync_enabled = self.store.cloud_sync_enabled()?;
        let api_key_configured = match self.credentials().resolve() {
            Ok(credential) => credential.is_some(),
            Err(err) => {
                tracing::debug!("credential state unreadable: {err}");
                false
            }
        };
        Ok(SyncReadiness {
            cloud_sync_enabled,
            api_key_configured,
        })
    }
}
