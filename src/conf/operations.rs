//! Settings panel: edit a draft of the persisted settings and write it back.
//!
//! Only one panel can be open at a time; the panel holds an exclusive lock
//! on a file next to the settings file for as long as it lives.

use super::{ConfError, Settings, SettingsStore};
use crate::bible::{BibleClient, BibleSummary, SearchError};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};

pub struct SettingsPanel {
    store: SettingsStore,
    draft: Settings,
    _lock: File,
}

impl SettingsPanel {
    pub fn open(store: SettingsStore) -> Result<Self, ConfError> {
        let lock_path = store.path().with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&lock_path)?;
        FileExt::try_lock_exclusive(&lock).map_err(|_| ConfError::PanelBusy(lock_path.clone()))?;

        let draft = store.load();
        tracing::debug!(path = %store.path().display(), "settings panel opened");

        Ok(Self {
            store,
            draft,
            _lock: lock,
        })
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfError> {
        self.draft.set_value(key, value)
    }

    /// Store `key` right away, then check what it can see
    pub async fn test_key(&mut self, client: &BibleClient, key: &str) -> String {
        self.draft.api_bible_key = key.trim().to_string();

        let mut persisted = self.store.load();
        persisted.api_bible_key = self.draft.api_bible_key.clone();
        if let Err(e) = self.store.save(&persisted) {
            tracing::warn!("failed to store API key: {:#}", e);
        }

        match client.list_bibles(&self.draft.api_bible_key).await {
            Ok(bibles) => format!("Success. Your key can see {} Bible entries.", bibles.len()),
            Err(e) => format!("Failed: {}", e),
        }
    }

    /// Bibles available to the draft key, for choosing per-version ids
    pub async fn load_bibles(&self, client: &BibleClient) -> Result<Vec<BibleSummary>, SearchError> {
        client.list_bibles(&self.draft.api_bible_key).await
    }

    pub fn save(&self) -> anyhow::Result<&'static str> {
        self.store.save(&self.draft)?;
        Ok("Saved. You can close this window.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Version;

    #[test]
    fn test_only_one_panel_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_path(dir.path().join("settings.toml"));

        let panel = SettingsPanel::open(store.clone()).unwrap();
        assert!(matches!(
            SettingsPanel::open(store.clone()),
            Err(ConfError::PanelBusy(_))
        ));

        drop(panel);
        assert!(SettingsPanel::open(store).is_ok());
    }

    #[test]
    fn test_draft_is_written_only_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_path(dir.path().join("config").join("settings.toml"));

        let mut panel = SettingsPanel::open(store.clone()).unwrap();
        panel.set("defaultVersion", "KJV").unwrap();
        panel.set("bibleIds.KJV", "kjv-id").unwrap();
        assert_eq!(store.load().default_version, Version::Nlt);

        assert_eq!(panel.save().unwrap(), "Saved. You can close this window.");
        let saved = store.load();
        assert_eq!(saved.default_version, Version::Kjv);
        assert_eq!(saved.bible_ids_by_version.get(Version::Kjv), Some("kjv-id"));
    }

    #[tokio::test]
    async fn test_key_is_stored_even_when_check_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::with_path(dir.path().join("settings.toml"));
        let client = BibleClient::with_base_url("not a url");

        let mut panel = SettingsPanel::open(store.clone()).unwrap();
        panel.set("overlayReturnMs", "5000").unwrap();
        let status = panel.test_key(&client, " abc ").await;

        assert!(status.starts_with("Failed: "));
        let saved = store.load();
        assert_eq!(saved.api_bible_key, "abc");
        // the rest of the draft is still unsaved
        assert_eq!(saved.overlay_return_ms, 60_000);
    }
}
