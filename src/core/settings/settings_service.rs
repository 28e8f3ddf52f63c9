// Settings snapshot management - load, refresh, swap.
//
// The store is a port; the infra layer provides the SQLite implementation.
// The service keeps exactly one Arc'd snapshot and swaps it wholesale on
// refresh, so rule evaluation never sees a half-updated configuration. A
// failed refresh keeps the last-known snapshot; message processing is never
// blocked on configuration.

use crate::core::automod::ModerationSettings;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Trait for persisting the moderation settings snapshot.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Load the stored settings, or `None` if nothing has been saved yet.
    async fn load(&self) -> Result<Option<ModerationSettings>, SettingsError>;

    /// Persist the full settings snapshot.
    async fn save(&self, settings: &ModerationSettings) -> Result<(), SettingsError>;
}

/// Holds the current settings snapshot and refreshes it from the store.
pub struct SettingsService<S: SettingsStore> {
    store: S,
    current: RwLock<Arc<ModerationSettings>>,
}

impl<S: SettingsStore> SettingsService<S> {
    /// Create the service with compiled defaults until the first refresh.
    pub fn new(store: S) -> Self {
        Self {
            store,
            current: RwLock::new(Arc::new(ModerationSettings::default())),
        }
    }

    /// The current snapshot. Callers hold the Arc for one message and never
    /// cache it beyond that.
    pub fn current(&self) -> Arc<ModerationSettings> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .unwrap_or_else(|poisoned| Arc::clone(&poisoned.into_inner()))
    }

    fn swap(&self, settings: ModerationSettings) {
        let next = Arc::new(settings);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Write a default row if none exists, so the dashboard has something
    /// to edit.
    pub async fn ensure_defaults(&self) -> Result<(), SettingsError> {
        if self.store.load().await?.is_none() {
            self.store.save(&ModerationSettings::default()).await?;
        }
        Ok(())
    }

    /// Reload from the store and swap the snapshot. A load failure keeps the
    /// last-known snapshot and is reported to the caller for logging.
    pub async fn refresh(&self) -> Result<(), SettingsError> {
        match self.store.load().await {
            Ok(Some(settings)) => {
                self.swap(settings);
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Apply an edit to the stored settings, persist it, and swap the
    /// snapshot immediately rather than waiting for the next refresh tick.
    pub async fn update<F>(&self, edit: F) -> Result<ModerationSettings, SettingsError>
    where
        F: FnOnce(&mut ModerationSettings),
    {
        let mut settings = self.store.load().await?.unwrap_or_else(|| (*self.current()).clone());
        edit(&mut settings);
        self.store.save(&settings).await?;
        self.swap(settings.clone());
        Ok(settings)
    }
}
