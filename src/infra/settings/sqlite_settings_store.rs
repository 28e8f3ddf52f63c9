// SQLite-backed settings store.
//
// One row per guild; the snapshot is stored as a JSON document so newly
// added fields deserialize with their defaults instead of requiring a
// schema migration.

use crate::core::automod::ModerationSettings;
use crate::core::settings::{SettingsError, SettingsStore};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteSettingsStore {
    pool: Pool<Sqlite>,
    guild_id: u64,
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool<Sqlite>, guild_id: u64) -> Self {
        Self { pool, guild_id }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), SettingsError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS automod_settings (
                guild_id INTEGER PRIMARY KEY,
                settings TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for SqliteSettingsStore {
    async fn load(&self) -> Result<Option<ModerationSettings>, SettingsError> {
        let row = sqlx::query("SELECT settings FROM automod_settings WHERE guild_id = ?")
            .bind(self.guild_id as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SettingsError::StorageError(e.to_string()))?;

        match row {
            Some(row) => {
                let raw: String = row.get("settings");
                let settings = serde_json::from_str(&raw)
                    .map_err(|e| SettingsError::SerializationError(e.to_string()))?;
                Ok(Some(settings))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, settings: &ModerationSettings) -> Result<(), SettingsError> {
        let raw = serde_json::to_string(settings)
            .map_err(|e| SettingsError::SerializationError(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO automod_settings (guild_id, settings, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id) DO UPDATE SET
                settings = excluded.settings,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(self.guild_id as i64)
        .bind(&raw)
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| SettingsError::StorageError(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::NamedTempFile;

    async fn open_store(path: &std::path::Path) -> SqliteSettingsStore {
        let pool = SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap();
        let store = SqliteSettingsStore::new(pool, 900);
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn missing_row_loads_as_none() {
        let tmp = NamedTempFile::new().unwrap();
        let store = open_store(tmp.path()).await;
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let tmp = NamedTempFile::new().unwrap();
        let store = open_store(tmp.path()).await;

        let mut settings = ModerationSettings::default();
        settings.flood_max_messages = 7;
        settings.ignored_channel_ids.insert(123);
        store.save(&settings).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, settings);

        // Saving again overwrites the same row.
        settings.flood_max_messages = 2;
        store.save(&settings).await.unwrap();
        let reloaded = store.load().await.unwrap().unwrap();
        assert_eq!(reloaded.flood_max_messages, 2);
    }

    #[tokio::test]
    async fn rows_from_older_versions_load_with_defaults() {
        let tmp = NamedTempFile::new().unwrap();
        let store = open_store(tmp.path()).await;

        sqlx::query("INSERT INTO automod_settings (guild_id, settings, updated_at) VALUES (?, ?, ?)")
            .bind(900i64)
            .bind(r#"{"flood_max_messages": 9}"#)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&store.pool)
            .await
            .unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.flood_max_messages, 9);
        assert_eq!(loaded.repeat_max_repeats, 3);
    }
}
