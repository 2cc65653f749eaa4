// src/subscribers/store.rs
use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{SubscriberConfig, SubscriberId, UserId};

/// Read access the pipeline needs. Every `get` reflects the latest saved state.
#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    async fn list_subscriber_ids(&self) -> Result<Vec<SubscriberId>>;
    async fn get(&self, id: SubscriberId) -> Result<SubscriberConfig>;
}

/// Bot-wide settings: who runs the bot and which chats it serves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSettings {
    pub bot_admins: BTreeSet<UserId>,
    pub chat_ids: Vec<SubscriberId>,
}

/// Settings file plus one `<id>.json` per subscriber in `configs_dir`.
pub struct JsonConfigStore {
    settings_file: PathBuf,
    configs_dir: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonConfigStore {
    /// Creates the configs dir and an empty settings file when missing.
    pub async fn open(settings_file: impl Into<PathBuf>, configs_dir: impl Into<PathBuf>) -> Result<Self> {
        let settings_file = settings_file.into();
        let configs_dir = configs_dir.into();
        fs::create_dir_all(&configs_dir)
            .await
            .with_context(|| format!("creating configs dir {}", configs_dir.display()))?;
        let store = Self {
            settings_file,
            configs_dir,
            write_lock: tokio::sync::Mutex::new(()),
        };
        if fs::metadata(&store.settings_file).await.is_err() {
            store.write_settings(&BotSettings::default()).await?;
        }
        Ok(store)
    }

    fn config_path(&self, id: SubscriberId) -> PathBuf {
        self.configs_dir.join(format!("{id}.json"))
    }

    pub async fn settings(&self) -> Result<BotSettings> {
        let raw = fs::read_to_string(&self.settings_file)
            .await
            .with_context(|| format!("reading {}", self.settings_file.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing {}", self.settings_file.display()))
    }

    async fn write_settings(&self, s: &BotSettings) -> Result<()> {
        write_json_atomic(&self.settings_file, s).await
    }

    pub async fn save(&self, id: SubscriberId, cfg: &SubscriberConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_json_atomic(&self.config_path(id), cfg).await
    }

    /// Load, mutate and save one subscriber's config; returns the saved value.
    pub async fn update<F>(&self, id: SubscriberId, edit: F) -> Result<SubscriberConfig>
    where
        F: FnOnce(&mut SubscriberConfig) + Send,
    {
        let _guard = self.write_lock.lock().await;
        let mut cfg = self.get(id).await?;
        edit(&mut cfg);
        write_json_atomic(&self.config_path(id), &cfg).await?;
        Ok(cfg)
    }

    /// Start serving `id`; writes a default config if it has none.
    pub async fn register(&self, id: SubscriberId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.settings().await?;
        if !settings.chat_ids.contains(&id) {
            settings.chat_ids.push(id);
            self.write_settings(&settings).await?;
        }
        let path = self.config_path(id);
        if fs::metadata(&path).await.is_err() {
            write_json_atomic(&path, &SubscriberConfig::default()).await?;
        }
        Ok(())
    }

    /// Stop serving `id` once it has no admins left. Returns whether it was removed.
    pub async fn unregister_if_orphaned(&self, id: SubscriberId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        if !self.get(id).await?.admins.is_empty() {
            return Ok(false);
        }
        let mut settings = self.settings().await?;
        let before = settings.chat_ids.len();
        settings.chat_ids.retain(|c| *c != id);
        let removed = settings.chat_ids.len() != before;
        if removed {
            self.write_settings(&settings).await?;
        }
        Ok(removed)
    }

    pub async fn is_bot_admin(&self, user: UserId) -> Result<bool> {
        Ok(self.settings().await?.bot_admins.contains(&user))
    }
}

#[async_trait::async_trait]
impl SubscriberStore for JsonConfigStore {
    async fn list_subscriber_ids(&self) -> Result<Vec<SubscriberId>> {
        Ok(self.settings().await?.chat_ids)
    }

    async fn get(&self, id: SubscriberId) -> Result<SubscriberConfig> {
        let path = self.config_path(id);
        match fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing subscriber config {}", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SubscriberConfig::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let body = serde_json::to_vec_pretty(value).context("encoding json")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, body)
        .await
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .await
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    configs: Mutex<BTreeMap<SubscriberId, SubscriberConfig>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, id: SubscriberId, cfg: SubscriberConfig) -> &Self {
        self.configs.lock().insert(id, cfg);
        self
    }

    pub fn edit<F: FnOnce(&mut SubscriberConfig)>(&self, id: SubscriberId, f: F) {
        f(self.configs.lock().entry(id).or_default());
    }
}

#[async_trait::async_trait]
impl SubscriberStore for MemoryStore {
    async fn list_subscriber_ids(&self) -> Result<Vec<SubscriberId>> {
        Ok(self.configs.lock().keys().copied().collect())
    }

    async fn get(&self, id: SubscriberId) -> Result<SubscriberConfig> {
        Ok(self.configs.lock().get(&id).cloned().unwrap_or_default())
    }
}
